//! Object streams (`/Type /ObjStm`).
//!
//! An object stream packs several objects into one (usually compressed)
//! stream:
//!
//! ```text
//! 12 0 obj
//! << /Type /ObjStm /N 2 /First 10 /Filter /FlateDecode >>
//! stream
//! 10 0 11 15          % (object number, offset from /First) pairs
//! << /Type /Page >>   % object 10
//! [1 2 3]             % object 11
//! endstream
//! ```
//!
//! Members carry no `obj`/`endobj` wrapper and always have generation 0.

use crate::decoders::DecodeOptions;
use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::Object;
use crate::parser::parse_object_limited;

/// Upper bound on `/N`.
const MAX_MEMBERS: i64 = 1_000_000;

/// Parse an object stream into `(object number, object)` pairs, in the
/// order the stream lists them.
///
/// A member that fails to parse is skipped with a warning.
pub fn parse_object_stream(
    stream: &Object,
    options: &DecodeOptions,
    max_nesting: usize,
) -> Result<Vec<(u32, Object)>> {
    let dict = match stream {
        Object::Stream { dict, .. } => dict,
        other => {
            return Err(Error::InvalidObjectType {
                expected: "Stream".to_string(),
                found: other.type_name().to_string(),
            })
        },
    };
    if stream.dict_type().is_some_and(|t| t != "ObjStm") {
        return Err(Error::parse(0, "expected /Type /ObjStm"));
    }

    let n = dict
        .get("N")
        .and_then(Object::as_integer)
        .ok_or_else(|| Error::parse(0, "object stream missing /N"))?;
    let first = dict
        .get("First")
        .and_then(Object::as_integer)
        .ok_or_else(|| Error::parse(0, "object stream missing /First"))?;
    if !(0..=MAX_MEMBERS).contains(&n) || first < 0 {
        return Err(Error::parse(0, format!("invalid object stream /N {} /First {}", n, first)));
    }
    let (n, first) = (n as usize, first as usize);

    let decoded = stream.decode_stream_data_with(options)?;
    if decoded.len() < first {
        return Err(Error::parse(
            0,
            format!("object stream holds {} bytes, /First is {}", decoded.len(), first),
        ));
    }

    let pairs = parse_offset_pairs(&decoded[..first], n)?;
    let body = &decoded[first..];
    let mut members = Vec::with_capacity(pairs.len());

    for (id, offset) in pairs {
        let Some(input) = body.get(offset..) else {
            log::warn!("object {} offset {} lies outside its object stream", id, offset);
            continue;
        };
        match parse_object_limited(input, max_nesting) {
            Ok((_, obj)) => members.push((id, obj)),
            Err(e) => log::warn!("skipping unparsable object {} in object stream: {:?}", id, e),
        }
    }

    Ok(members)
}

fn parse_offset_pairs(data: &[u8], count: usize) -> Result<Vec<(u32, usize)>> {
    let mut pairs = Vec::with_capacity(count);
    let mut rest = data;
    for i in 0..count {
        let (after_id, id) = match token(rest) {
            Ok((r, Token::Integer(v))) => (r, v),
            _ => return Err(Error::parse(0, format!("bad object number in pair {}", i))),
        };
        let (after_offset, offset) = match token(after_id) {
            Ok((r, Token::Integer(v))) => (r, v),
            _ => return Err(Error::parse(0, format!("bad offset in pair {}", i))),
        };
        let (Ok(id), Ok(offset)) = (u32::try_from(id), usize::try_from(offset)) else {
            return Err(Error::parse(0, format!("pair {} out of range", i)));
        };
        pairs.push((id, offset));
        rest = after_offset;
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::dict;
    use crate::parser::DEFAULT_MAX_NESTING;

    fn objstm(n: i64, first: i64, body: &[u8]) -> Object {
        Object::stream(
            dict([
                ("Type", Object::name("ObjStm")),
                ("N", Object::Integer(n)),
                ("First", Object::Integer(first)),
            ]),
            body.to_vec(),
        )
    }

    #[test]
    fn test_parse_object_stream_basic() {
        let pairs = b"10 0 11 18 ";
        let mut body = pairs.to_vec();
        body.extend_from_slice(b"<< /Type /Page >> [1 2 3]");
        let stream = objstm(2, pairs.len() as i64, &body);

        let members = parse_object_stream(&stream, &DecodeOptions::default(), DEFAULT_MAX_NESTING).unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].0, 10);
        assert_eq!(members[0].1.dict_type(), Some("Page"));
        assert_eq!(members[1].0, 11);
        assert_eq!(members[1].1.as_array().map(Vec::len), Some(3));
    }

    #[test]
    fn test_parse_object_stream_not_stream() {
        let result = parse_object_stream(&Object::Null, &DecodeOptions::default(), DEFAULT_MAX_NESTING);
        assert!(matches!(result, Err(Error::InvalidObjectType { .. })));
    }

    #[test]
    fn test_parse_object_stream_missing_n() {
        let stream = Object::stream(dict([("First", Object::Integer(0))]), Vec::new());
        let err = parse_object_stream(&stream, &DecodeOptions::default(), DEFAULT_MAX_NESTING).unwrap_err();
        assert!(err.is_parse_error());
    }

    #[test]
    fn test_parse_object_stream_data_too_short() {
        let stream = objstm(1, 100, b"1 0");
        assert!(parse_object_stream(&stream, &DecodeOptions::default(), DEFAULT_MAX_NESTING).is_err());
    }

    #[test]
    fn test_member_offset_out_of_range_is_skipped() {
        let stream = objstm(2, 9, b"1 0 2 99 (one)");
        let members = parse_object_stream(&stream, &DecodeOptions::default(), DEFAULT_MAX_NESTING).unwrap();
        assert_eq!(members, vec![(1, Object::String(b"one".to_vec()))]);
    }
}
