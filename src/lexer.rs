//! Tokenizer for the object syntax.
//!
//! Built on nom. Recognizes numbers, literal and hex strings, names,
//! keywords and delimiters. Whitespace (space, \t, \r, \n, \0, \f) and
//! comments (`%` to end of line) between tokens are skipped.
//!
//! String tokens keep their raw bytes; escape and hex decoding happen in
//! the parser so the content-stream tokenizer can reuse these primitives
//! and still splice the original bytes.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_while},
    character::complete::{char, digit1, one_of},
    combinator::{opt, value},
    multi::many0,
    sequence::preceded,
    IResult,
};

/// Token types recognized by the lexer.
#[derive(Debug, PartialEq, Clone)]
pub enum Token<'a> {
    /// Integer number (e.g., 42, -123)
    Integer(i64),
    /// Real number (e.g., 3.14, -2.5, .5)
    Real(f64),
    /// Literal string bytes between the outer parentheses, escapes not decoded
    LiteralString(&'a [u8]),
    /// Hex string digits between `<` and `>`, whitespace preserved
    HexString(&'a [u8]),
    /// Name with `#XX` escapes decoded (e.g., "Type" from "/Type")
    Name(String),
    /// `true`
    True,
    /// `false`
    False,
    /// `null`
    Null,
    /// `[`
    ArrayStart,
    /// `]`
    ArrayEnd,
    /// `<<`
    DictStart,
    /// `>>`
    DictEnd,
    /// `obj`
    ObjStart,
    /// `endobj`
    ObjEnd,
    /// `stream`
    StreamStart,
    /// `endstream`
    StreamEnd,
    /// `R` (as in "10 0 R")
    R,
}

/// PDF whitespace characters.
pub(crate) fn is_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C)
}

/// PDF delimiter characters.
pub(crate) fn is_delimiter(c: u8) -> bool {
    matches!(c, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

/// Regular characters: neither whitespace nor delimiter.
pub(crate) fn is_regular(c: u8) -> bool {
    !is_whitespace(c) && !is_delimiter(c)
}

fn comment(input: &[u8]) -> IResult<&[u8], ()> {
    value((), preceded(char('%'), take_till(|c| c == b'\r' || c == b'\n')))(input)
}

/// Skip any run of whitespace and comments. Never fails.
pub(crate) fn skip_ws(input: &[u8]) -> IResult<&[u8], ()> {
    let mut remaining = input;
    loop {
        let (rest, _) = take_while(is_whitespace)(remaining)?;
        remaining = rest;
        match comment(remaining) {
            Ok((rest, _)) => remaining = rest,
            Err(_) => return Ok((remaining, ())),
        }
    }
}

fn error<T>(input: &[u8], kind: nom::error::ErrorKind) -> IResult<&[u8], T> {
    Err(nom::Err::Error(nom::error::Error::new(input, kind)))
}

/// Parse an integer or real: `42`, `-123`, `+17`, `3.14`, `.5`, `5.`, `-.002`.
///
/// Integers that overflow i64 are returned as reals.
pub(crate) fn parse_number(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let start = input;
    let (input, _sign) = opt(one_of("+-"))(input)?;
    let (input, int_part) = opt(digit1)(input)?;
    let (input, frac_part) = opt(preceded(char('.'), opt(digit1)))(input)?;

    // A lone sign or a lone "." is not a number.
    if int_part.is_none() && !matches!(frac_part, Some(Some(_))) {
        return error(start, nom::error::ErrorKind::Digit);
    }

    let text = &start[..start.len() - input.len()];
    // Only ASCII digits, sign and '.' were consumed.
    let text = std::str::from_utf8(text).unwrap_or("0");
    let text = text.strip_prefix('+').unwrap_or(text);

    if frac_part.is_some() {
        let normalized = if text.ends_with('.') {
            format!("{}0", text)
        } else {
            text.replacen("-.", "-0.", 1)
        };
        return match normalized.parse::<f64>() {
            Ok(v) => Ok((input, Token::Real(v))),
            Err(_) => error(start, nom::error::ErrorKind::Float),
        };
    }

    match text.parse::<i64>() {
        Ok(v) => Ok((input, Token::Integer(v))),
        Err(_) => match text.parse::<f64>() {
            Ok(v) => Ok((input, Token::Real(v))),
            Err(_) => error(start, nom::error::ErrorKind::Digit),
        },
    }
}

/// Parse a literal string with balanced parentheses.
///
/// Returns the raw bytes between the outer parentheses; a backslash skips
/// the next byte, so `\(` and `\)` do not affect nesting.
pub(crate) fn parse_literal_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (body, _) = char('(')(input)?;
    let mut depth = 1usize;
    let mut pos = 0;

    while pos < body.len() {
        match body[pos] {
            b'\\' => pos += 2,
            b'(' => {
                depth += 1;
                pos += 1;
            },
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&body[pos + 1..], Token::LiteralString(&body[..pos])));
                }
                pos += 1;
            },
            _ => pos += 1,
        }
    }

    error(input, nom::error::ErrorKind::Tag)
}

/// Parse a hexadecimal string `<...>` (but not a dictionary start `<<`).
pub(crate) fn parse_hex_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    if input.starts_with(b"<<") {
        return error(input, nom::error::ErrorKind::Tag);
    }
    let (rest, _) = char('<')(input)?;
    let (rest, digits) = take_while(|c: u8| c.is_ascii_hexdigit() || is_whitespace(c))(rest)?;
    let (rest, _) = char('>')(rest)?;
    Ok((rest, Token::HexString(digits)))
}

/// Decode `#XX` escape sequences in a raw name.
///
/// Each resulting byte maps to the char with the same code point, so
/// arbitrary bytes survive a parse/serialize round trip. Invalid escapes
/// are kept literally.
pub fn decode_name_escapes(raw: &[u8]) -> String {
    let mut result = String::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'#' && i + 2 < raw.len() {
            let hex = &raw[i + 1..i + 3];
            if let Some(byte) = std::str::from_utf8(hex)
                .ok()
                .and_then(|h| u8::from_str_radix(h, 16).ok())
            {
                result.push(byte as char);
                i += 3;
                continue;
            }
        }
        result.push(raw[i] as char);
        i += 1;
    }
    result
}

/// Parse a name: `/` followed by regular characters.
pub(crate) fn parse_name(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (rest, _) = char('/')(input)?;
    let (rest, raw) = take_while(is_regular)(rest)?;
    Ok((rest, Token::Name(decode_name_escapes(raw))))
}

/// A keyword must not run into further regular characters ("nullx").
fn keyword<'a>(word: &'static [u8], tok: Token<'static>) -> impl Fn(&'a [u8]) -> IResult<&'a [u8], Token<'a>> {
    move |input: &'a [u8]| {
        let (rest, _) = tag(word)(input)?;
        if rest.first().is_some_and(|&c| is_regular(c)) {
            return error(input, nom::error::ErrorKind::Tag);
        }
        Ok((rest, tok.clone()))
    }
}

fn parse_keyword(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    alt((
        keyword(b"false", Token::False),
        keyword(b"true", Token::True),
        keyword(b"null", Token::Null),
        keyword(b"obj", Token::ObjStart),
        keyword(b"endobj", Token::ObjEnd),
        keyword(b"endstream", Token::StreamEnd),
        keyword(b"stream", Token::StreamStart),
        value(Token::DictStart, tag(b"<<")),
        value(Token::DictEnd, tag(b">>")),
        value(Token::ArrayStart, tag(b"[")),
        value(Token::ArrayEnd, tag(b"]")),
        keyword(b"R", Token::R),
    ))(input)
}

/// Parse a single token after skipping whitespace and comments.
pub fn token(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (input, _) = skip_ws(input)?;
    alt((
        parse_keyword,
        parse_name,
        parse_number,
        parse_literal_string,
        parse_hex_string,
    ))(input)
}

/// Parse tokens until the input is exhausted or no token matches.
pub fn tokens(input: &[u8]) -> IResult<&[u8], Vec<Token<'_>>> {
    many0(token)(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_integers() {
        assert_eq!(token(b"42"), Ok((&b""[..], Token::Integer(42))));
        assert_eq!(token(b"-123"), Ok((&b""[..], Token::Integer(-123))));
        assert_eq!(token(b"+17"), Ok((&b""[..], Token::Integer(17))));
    }

    #[test]
    fn test_parse_reals() {
        assert_eq!(token(b"-2.5"), Ok((&b""[..], Token::Real(-2.5))));
        assert_eq!(token(b".5"), Ok((&b""[..], Token::Real(0.5))));
        assert_eq!(token(b"5."), Ok((&b""[..], Token::Real(5.0))));
        assert_eq!(token(b"-.002"), Ok((&b""[..], Token::Real(-0.002))));
    }

    #[test]
    fn test_huge_integer_becomes_real() {
        let (_, tok) = token(b"99999999999999999999").unwrap();
        assert!(matches!(tok, Token::Real(v) if v > 9.0e19));
    }

    #[test]
    fn test_lone_sign_is_not_a_number() {
        assert!(parse_number(b"-").is_err());
        assert!(parse_number(b".").is_err());
    }

    #[test]
    fn test_parse_literal_string_with_nested_parens() {
        let result = token(b"(Hello (nested) World)");
        assert_eq!(result, Ok((&b""[..], Token::LiteralString(b"Hello (nested) World"))));
    }

    #[test]
    fn test_parse_literal_string_with_escaped_paren() {
        let result = token(b"(a\\)b) rest");
        assert_eq!(result, Ok((&b" rest"[..], Token::LiteralString(b"a\\)b"))));
    }

    #[test]
    fn test_unbalanced_literal_string_fails() {
        assert!(token(b"(never closed").is_err());
    }

    #[test]
    fn test_parse_hex_string_with_whitespace() {
        let result = token(b"<48 65>");
        assert_eq!(result, Ok((&b""[..], Token::HexString(b"48 65"))));
    }

    #[test]
    fn test_dict_vs_hex_string() {
        assert_eq!(token(b"<<"), Ok((&b""[..], Token::DictStart)));
        assert_eq!(token(b"<>"), Ok((&b""[..], Token::HexString(b""))));
    }

    #[test]
    fn test_parse_name_with_hex_escape() {
        assert_eq!(token(b"/A#20B"), Ok((&b""[..], Token::Name("A B".to_string()))));
        assert_eq!(token(b"/Type/Page"), Ok((&b"/Page"[..], Token::Name("Type".to_string()))));
    }

    #[test]
    fn test_decode_name_escapes_directly() {
        assert_eq!(decode_name_escapes(b"A#20B#23C"), "A B#C");
        assert_eq!(decode_name_escapes(b"A#"), "A#");
        assert_eq!(decode_name_escapes(b"A#G1"), "A#G1");
        assert_eq!(decode_name_escapes(b"#E9"), "\u{e9}");
    }

    #[test]
    fn test_keywords_need_a_boundary() {
        assert_eq!(token(b"null"), Ok((&b""[..], Token::Null)));
        assert_eq!(token(b"true]"), Ok((&b"]"[..], Token::True)));
        assert!(token(b"nullx").is_err());
        assert_eq!(token(b"endstream"), Ok((&b""[..], Token::StreamEnd)));
    }

    #[test]
    fn test_skip_comments_between_tokens() {
        let result = token(b"  % comment\n %another\r\n 7");
        assert_eq!(result, Ok((&b""[..], Token::Integer(7))));
    }

    #[test]
    fn test_reference_tokens() {
        let (rest, toks) = tokens(b"10 0 R").unwrap();
        assert!(rest.is_empty());
        assert_eq!(toks, vec![Token::Integer(10), Token::Integer(0), Token::R]);
    }
}
