//! Object parser.
//!
//! Combines lexer tokens into complete objects using recursive descent:
//! read a token, decide what it starts, and recurse for arrays and
//! dictionaries. A nesting limit stops hostile inputs from exhausting the
//! stack.
//!
//! All parsing functions return nom's `IResult`; callers that own a byte
//! offset convert failures into [`Error::Parse`].

use crate::error::{Error, Result};
use crate::lexer::{is_whitespace, token, Token};
use crate::object::{Dictionary, Object, ObjectRef};
use nom::IResult;

/// Default limit on array/dictionary nesting.
pub const DEFAULT_MAX_NESTING: usize = 256;

/// Decode escape sequences in a literal string.
///
/// Handles `\n \r \t \b \f \( \) \\`, octal `\ddd` (1-3 digits) and line
/// continuations. An unknown escape keeps the backslash.
pub fn decode_literal_string_escapes(raw: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        if raw[i] != b'\\' || i + 1 >= raw.len() {
            result.push(raw[i]);
            i += 1;
            continue;
        }

        let next = raw[i + 1];
        let simple = match next {
            b'n' => Some(b'\n'),
            b'r' => Some(b'\r'),
            b't' => Some(b'\t'),
            b'b' => Some(8),
            b'f' => Some(12),
            b'(' | b')' | b'\\' => Some(next),
            _ => None,
        };
        if let Some(byte) = simple {
            result.push(byte);
            i += 2;
            continue;
        }

        match next {
            b'\n' => i += 2,
            b'\r' => {
                i += 2;
                if raw.get(i) == Some(&b'\n') {
                    i += 1;
                }
            },
            b'0'..=b'7' => {
                let mut value = 0u32;
                let mut len = 0;
                while len < 3 {
                    match raw.get(i + 1 + len) {
                        Some(&d @ b'0'..=b'7') => {
                            value = value * 8 + (d - b'0') as u32;
                            len += 1;
                        },
                        _ => break,
                    }
                }
                result.push((value & 0xFF) as u8);
                i += 1 + len;
            },
            _ => {
                result.push(b'\\');
                i += 1;
            },
        }
    }

    result
}

/// Decode the digits of a hex string. Whitespace is ignored and an odd
/// final digit is padded with 0.
pub fn decode_hex(hex_bytes: &[u8]) -> Result<Vec<u8>> {
    let digits: Vec<u8> = hex_bytes
        .iter()
        .copied()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    let value = |c: u8| -> Result<u8> {
        crate::decoders::hex_digit_to_value(c)
            .ok_or_else(|| Error::parse(0, format!("invalid hex digit {:?}", c as char)))
    };

    digits
        .chunks(2)
        .map(|pair| {
            let high = value(pair[0])?;
            let low = match pair.get(1) {
                Some(&c) => value(c)?,
                None => 0,
            };
            Ok(high << 4 | low)
        })
        .collect()
}

fn fail<T>(input: &[u8], kind: nom::error::ErrorKind) -> IResult<&[u8], T> {
    Err(nom::Err::Error(nom::error::Error::new(input, kind)))
}

/// Parse one object: primitives, arrays, dictionaries, streams and
/// `n g R` references.
pub fn parse_object(input: &[u8]) -> IResult<&[u8], Object> {
    parse_object_limited(input, DEFAULT_MAX_NESTING)
}

/// [`parse_object`] with an explicit nesting limit.
pub fn parse_object_limited(input: &[u8], max_nesting: usize) -> IResult<&[u8], Object> {
    parse_value(input, 0, max_nesting)
}

fn parse_value(input: &[u8], depth: usize, max: usize) -> IResult<&[u8], Object> {
    let start = input;
    let (input, tok) = token(input)?;

    match tok {
        Token::Null => Ok((input, Object::Null)),
        Token::True => Ok((input, Object::Boolean(true))),
        Token::False => Ok((input, Object::Boolean(false))),

        Token::Integer(i) => {
            // `id gen R` is a reference; anything else leaves a plain integer.
            if let Ok((after_gen, Token::Integer(gen))) = token(input) {
                if let Ok((after_r, Token::R)) = token(after_gen) {
                    if let (Ok(id), Ok(gen)) = (u32::try_from(i), u16::try_from(gen)) {
                        return Ok((after_r, Object::Reference(ObjectRef::new(id, gen))));
                    }
                }
            }
            Ok((input, Object::Integer(i)))
        },

        Token::Real(r) => Ok((input, Object::Real(r))),

        Token::LiteralString(raw) => Ok((input, Object::String(decode_literal_string_escapes(raw)))),

        Token::HexString(digits) => match decode_hex(digits) {
            Ok(bytes) => Ok((input, Object::String(bytes))),
            Err(_) => Err(nom::Err::Failure(nom::error::Error::new(
                start,
                nom::error::ErrorKind::HexDigit,
            ))),
        },

        Token::Name(name) => Ok((input, Object::Name(name))),

        Token::ArrayStart => {
            if depth >= max {
                return Err(nom::Err::Failure(nom::error::Error::new(
                    start,
                    nom::error::ErrorKind::TooLarge,
                )));
            }
            parse_array(input, depth + 1, max)
        },

        Token::DictStart => {
            if depth >= max {
                return Err(nom::Err::Failure(nom::error::Error::new(
                    start,
                    nom::error::ErrorKind::TooLarge,
                )));
            }
            let (rest, dict) = parse_dictionary(input, depth + 1, max)?;
            match token(rest) {
                Ok((body, Token::StreamStart)) => {
                    let (rest, data) = parse_stream_data(body, &dict)?;
                    Ok((rest, Object::stream(dict, data)))
                },
                _ => Ok((rest, Object::Dictionary(dict))),
            }
        },

        _ => fail(start, nom::error::ErrorKind::Tag),
    }
}

fn parse_array(input: &[u8], depth: usize, max: usize) -> IResult<&[u8], Object> {
    let mut items = Vec::new();
    let mut remaining = input;

    loop {
        match token(remaining) {
            Ok((rest, Token::ArrayEnd)) => return Ok((rest, Object::Array(items))),
            Ok(_) => {
                let (rest, obj) = parse_value(remaining, depth, max)?;
                items.push(obj);
                remaining = rest;
            },
            Err(e) => return Err(e),
        }
    }
}

fn parse_dictionary(input: &[u8], depth: usize, max: usize) -> IResult<&[u8], Dictionary> {
    let mut dict = Dictionary::new();
    let mut remaining = input;

    loop {
        match token(remaining)? {
            (rest, Token::DictEnd) => return Ok((rest, dict)),
            (rest, Token::Name(key)) => {
                // `/Key >>` with the value missing reads as null.
                if let Ok((after, Token::DictEnd)) = token(rest) {
                    dict.insert(key, Object::Null);
                    return Ok((after, dict));
                }
                let (rest, value) = parse_value(rest, depth, max)?;
                // A null value is equivalent to an absent entry.
                if !value.is_null() {
                    dict.insert(key, value);
                }
                remaining = rest;
            },
            _ => return fail(remaining, nom::error::ErrorKind::Tag),
        }
    }
}

/// Parse stream data following the `stream` keyword.
///
/// A direct `/Length` is trusted when `endstream` follows it; otherwise
/// the payload runs to the next `endstream`, minus the EOL before it.
fn parse_stream_data<'a>(input: &'a [u8], dict: &Dictionary) -> IResult<&'a [u8], Vec<u8>> {
    let body = if input.starts_with(b"\r\n") {
        &input[2..]
    } else if input.starts_with(b"\n") || input.starts_with(b"\r") {
        &input[1..]
    } else {
        input
    };

    if let Some(length) = dict.get("Length").and_then(Object::as_integer) {
        if let Ok(length) = usize::try_from(length) {
            if length <= body.len() {
                if let Ok((rest, Token::StreamEnd)) = token(&body[length..]) {
                    return Ok((rest, body[..length].to_vec()));
                }
            }
            log::debug!("stream /Length {} does not reach endstream, scanning", length);
        }
    }

    match find_endstream(body) {
        Some(pos) => {
            let mut end = pos;
            if end > 0 && body[end - 1] == b'\n' {
                end -= 1;
            }
            if end > 0 && body[end - 1] == b'\r' {
                end -= 1;
            }
            let (rest, _) = token(&body[pos..])?;
            Ok((rest, body[..end].to_vec()))
        },
        None => fail(input, nom::error::ErrorKind::Eof),
    }
}

fn find_endstream(input: &[u8]) -> Option<usize> {
    let keyword = b"endstream";
    input.windows(keyword.len()).position(|w| w == keyword)
}

/// Parse `id gen obj <object> endobj`.
///
/// A missing `endobj` is tolerated.
pub fn parse_indirect_object(input: &[u8]) -> IResult<&[u8], (ObjectRef, Object)> {
    parse_indirect_object_limited(input, DEFAULT_MAX_NESTING)
}

/// [`parse_indirect_object`] with an explicit nesting limit.
pub fn parse_indirect_object_limited(
    input: &[u8],
    max_nesting: usize,
) -> IResult<&[u8], (ObjectRef, Object)> {
    let start = input;
    let (input, id) = match token(input)? {
        (rest, Token::Integer(id)) if id >= 0 => (rest, id),
        _ => return fail(start, nom::error::ErrorKind::Digit),
    };
    let (input, gen) = match token(input)? {
        (rest, Token::Integer(gen)) if gen >= 0 => (rest, gen),
        _ => return fail(start, nom::error::ErrorKind::Digit),
    };
    let (input, _) = match token(input)? {
        (rest, Token::ObjStart) => (rest, ()),
        _ => return fail(start, nom::error::ErrorKind::Tag),
    };

    let (input, object) = parse_value(input, 0, max_nesting)?;
    let input = match token(input) {
        Ok((rest, Token::ObjEnd)) => rest,
        _ => input,
    };

    let (Ok(id), Ok(gen)) = (u32::try_from(id), u16::try_from(gen)) else {
        return fail(start, nom::error::ErrorKind::TooLarge);
    };
    Ok((input, (ObjectRef::new(id, gen), object)))
}

/// Parse the indirect object starting at `offset` in `data`.
pub fn parse_indirect_object_at(
    data: &[u8],
    offset: usize,
    max_nesting: usize,
) -> Result<(ObjectRef, Object)> {
    let slice = data.get(offset..).ok_or(Error::UnexpectedEof)?;
    // Tolerate whitespace before the object header.
    let skip = slice.iter().take_while(|&&c| is_whitespace(c)).count();
    match parse_indirect_object_limited(&slice[skip..], max_nesting) {
        Ok((_, parsed)) => Ok(parsed),
        Err(nom::Err::Failure(e)) if e.code == nom::error::ErrorKind::TooLarge => {
            Err(Error::RecursionLimitExceeded(max_nesting as u32))
        },
        Err(e) => Err(Error::parse(offset, format!("invalid indirect object: {:?}", e.map(|e| e.code)))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_primitives() {
        assert_eq!(parse_object(b"null").unwrap().1, Object::Null);
        assert_eq!(parse_object(b"true").unwrap().1, Object::Boolean(true));
        assert_eq!(parse_object(b"-123").unwrap().1, Object::Integer(-123));
        assert_eq!(parse_object(b"2.5").unwrap().1, Object::Real(2.5));
        assert_eq!(parse_object(b"/Type").unwrap().1, Object::name("Type"));
    }

    #[test]
    fn test_parse_literal_string() {
        let (remaining, obj) = parse_object(b"(Hello World)").unwrap();
        assert_eq!(remaining, &b""[..]);
        assert_eq!(obj, Object::String(b"Hello World".to_vec()));
    }

    #[test]
    fn test_escape_sequences() {
        assert_eq!(decode_literal_string_escapes(b"a\\nb\\tc"), b"a\nb\tc");
        assert_eq!(decode_literal_string_escapes(b"\\(x\\)\\\\"), b"(x)\\");
        assert_eq!(decode_literal_string_escapes(b"Section \\247 71"), b"Section \xa7 71");
        assert_eq!(decode_literal_string_escapes(b"\\0053"), b"\x053");
        assert_eq!(decode_literal_string_escapes(b"\\7"), b"\x07");
        assert_eq!(decode_literal_string_escapes(b"ab\\\ncd"), b"abcd");
        assert_eq!(decode_literal_string_escapes(b"ab\\\r\ncd"), b"abcd");
        assert_eq!(decode_literal_string_escapes(b"\\q"), b"\\q");
    }

    #[test]
    fn test_parse_hex_string() {
        assert_eq!(parse_object(b"<48656C6C6F>").unwrap().1, Object::String(b"Hello".to_vec()));
        assert_eq!(parse_object(b"<48 65>").unwrap().1, Object::String(b"He".to_vec()));
        assert_eq!(parse_object(b"<901FA>").unwrap().1, Object::String(vec![0x90, 0x1F, 0xA0]));
        assert_eq!(parse_object(b"<>").unwrap().1, Object::String(Vec::new()));
    }

    #[test]
    fn test_parse_reference() {
        let (_, obj) = parse_object(b"10 2 R").unwrap();
        assert_eq!(obj, Object::Reference(ObjectRef::new(10, 2)));
    }

    #[test]
    fn test_parse_integer_not_reference() {
        let (remaining, obj) = parse_object(b"10 20 30").unwrap();
        assert_eq!(obj, Object::Integer(10));
        assert_eq!(remaining, &b" 20 30"[..]);
    }

    #[test]
    fn test_parse_array_with_references() {
        let (_, obj) = parse_object(b"[1 0 R 2 0 R /Name (s) [3]]").unwrap();
        let arr = obj.as_array().unwrap();
        assert_eq!(arr.len(), 5);
        assert_eq!(arr[1], Object::Reference(ObjectRef::new(2, 0)));
        assert_eq!(arr[4], Object::Array(vec![Object::Integer(3)]));
    }

    #[test]
    fn test_parse_dictionary() {
        let (_, obj) = parse_object(b"<< /Type /Page /Count 3 /Kids [4 0 R] >>").unwrap();
        let dict = obj.as_dict().unwrap();
        assert_eq!(dict.get("Type").unwrap().as_name(), Some("Page"));
        assert_eq!(dict.get("Count").unwrap().as_integer(), Some(3));
        assert!(dict.get("Kids").unwrap().as_array().is_some());
    }

    #[test]
    fn test_dictionary_null_value_is_absent() {
        let (_, obj) = parse_object(b"<< /A null /B 1 >>").unwrap();
        let dict = obj.as_dict().unwrap();
        assert!(!dict.contains_key("A"));
        assert!(dict.contains_key("B"));
    }

    #[test]
    fn test_unclosed_array_is_error() {
        assert!(parse_object(b"[1 2 3").is_err());
        assert!(parse_object(b"<< /A 1").is_err());
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{}{}", "[".repeat(10), "]".repeat(10));
        assert!(parse_object_limited(deep.as_bytes(), 10).is_ok());
        assert!(matches!(
            parse_object_limited(deep.as_bytes(), 5),
            Err(nom::Err::Failure(_))
        ));
    }

    #[test]
    fn test_parse_stream_with_length() {
        let input = b"<< /Length 5 >>\nstream\nHello\nendstream";
        let (_, obj) = parse_object(input).unwrap();
        match obj {
            Object::Stream { data, .. } => assert_eq!(&data[..], b"Hello"),
            other => panic!("expected stream, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_stream_wrong_length_scans_for_endstream() {
        let input = b"<< /Length 99 >>\r\nstream\r\nHello World\r\nendstream";
        let (_, obj) = parse_object(input).unwrap();
        match obj {
            Object::Stream { data, .. } => assert_eq!(&data[..], b"Hello World"),
            other => panic!("expected stream, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_stream_indirect_length() {
        let input = b"<< /Length 9 0 R >>\nstream\nabc\nendstream";
        let (_, obj) = parse_object(input).unwrap();
        match obj {
            Object::Stream { data, .. } => assert_eq!(&data[..], b"abc"),
            other => panic!("expected stream, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_indirect_object() {
        let input = b"12 0 obj\n<< /Type /Catalog >>\nendobj\n";
        let (_, (id, obj)) = parse_indirect_object(input).unwrap();
        assert_eq!(id, ObjectRef::new(12, 0));
        assert_eq!(obj.dict_type(), Some("Catalog"));
    }

    #[test]
    fn test_parse_indirect_object_missing_endobj() {
        let (_, (id, obj)) = parse_indirect_object(b"3 0 obj 42").unwrap();
        assert_eq!(id.id, 3);
        assert_eq!(obj, Object::Integer(42));
    }

    #[test]
    fn test_parse_indirect_object_at_offset() {
        let data = b"%PDF-1.4\n1 0 obj (x) endobj";
        let (id, obj) = parse_indirect_object_at(data, 9, DEFAULT_MAX_NESTING).unwrap();
        assert_eq!(id.id, 1);
        assert_eq!(obj, Object::String(b"x".to_vec()));
        assert!(parse_indirect_object_at(data, 0, DEFAULT_MAX_NESTING).unwrap_err().is_parse_error());
        assert!(matches!(
            parse_indirect_object_at(data, 999, DEFAULT_MAX_NESTING),
            Err(Error::UnexpectedEof)
        ));
    }
}
