//! Content stream tokenizer.
//!
//! Content streams use postfix notation: operands precede their operator.
//!
//! ```text
//! BT
//!   /F1 12 Tf
//!   100 700 Td
//!   (Hello, World!) Tj
//! ET
//! ```
//!
//! Every operand and instruction keeps the byte range it was read from so
//! that rewrites can splice new bytes in and copy everything else verbatim.

use crate::lexer::{is_regular, is_whitespace};
use crate::object::Object;
use crate::parser::{parse_object_limited, DEFAULT_MAX_NESTING};
use std::ops::Range;

/// One operand with its source range.
#[derive(Debug, Clone, PartialEq)]
pub struct Operand {
    /// Parsed value
    pub value: Object,
    /// Byte range in the content stream
    pub span: Range<usize>,
}

/// An operator with its operands.
///
/// Inline images (`BI ... ID <data> EI`) become a single `BI` instruction
/// whose operands are the alternating keys and values of the image
/// dictionary; the image data is covered by `span` only.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Operator keyword, e.g. `Tj`
    pub operator: String,
    /// Operands in stream order
    pub operands: Vec<Operand>,
    /// Range from the first operand to the end of the operator
    pub span: Range<usize>,
}

impl Instruction {
    /// Operand `i` as a number.
    pub fn number(&self, i: usize) -> Option<f64> {
        self.operands.get(i)?.value.as_number()
    }

    /// Operand `i` as a name.
    pub fn name(&self, i: usize) -> Option<&str> {
        self.operands.get(i)?.value.as_name()
    }

    /// All operands as numbers, when every one of them is numeric.
    pub fn numbers(&self) -> Option<Vec<f64>> {
        self.operands.iter().map(|o| o.value.as_number()).collect()
    }
}

fn skip_ws_and_comments(data: &[u8], mut pos: usize) -> usize {
    while pos < data.len() {
        if is_whitespace(data[pos]) {
            pos += 1;
        } else if data[pos] == b'%' {
            while pos < data.len() && data[pos] != b'\n' && data[pos] != b'\r' {
                pos += 1;
            }
        } else {
            break;
        }
    }
    pos
}

fn starts_operand(c: u8) -> bool {
    matches!(c, b'0'..=b'9' | b'+' | b'-' | b'.' | b'(' | b'<' | b'[' | b'/')
}

fn keyword_end(data: &[u8], start: usize) -> usize {
    let mut end = start;
    while end < data.len() && is_regular(data[end]) {
        end += 1;
    }
    end
}

/// Position just past the `EI` that ends inline image data starting at
/// `from`, or the end of the stream.
fn inline_image_end(data: &[u8], from: usize) -> usize {
    let mut i = from;
    while i + 1 < data.len() {
        let preceded = i == from || is_whitespace(data[i - 1]);
        let followed = data.get(i + 2).map_or(true, |&c| !is_regular(c));
        if preceded && data[i] == b'E' && data[i + 1] == b'I' && followed {
            return i + 2;
        }
        i += 1;
    }
    data.len()
}

/// Split a content stream into instructions.
///
/// Bytes that cannot be parsed are skipped; the spans of everything else
/// stay exact.
pub fn tokenize(data: &[u8]) -> Vec<Instruction> {
    let mut instructions = Vec::new();
    let mut operands: Vec<Operand> = Vec::new();
    let mut pos = 0;

    loop {
        pos = skip_ws_and_comments(data, pos);
        if pos >= data.len() {
            break;
        }
        let c = data[pos];

        if starts_operand(c) {
            match parse_object_limited(&data[pos..], DEFAULT_MAX_NESTING) {
                Ok((rest, value)) => {
                    let end = data.len() - rest.len();
                    operands.push(Operand {
                        value,
                        span: pos..end,
                    });
                    pos = end;
                },
                Err(_) => {
                    log::debug!("skipping unparsable content byte {:#04x} at {}", c, pos);
                    pos += 1;
                },
            }
            continue;
        }

        if !is_regular(c) {
            log::debug!("skipping stray delimiter {:?} at {}", c as char, pos);
            pos += 1;
            continue;
        }

        let end = keyword_end(data, pos);
        let keyword = String::from_utf8_lossy(&data[pos..end]).into_owned();
        let value = match keyword.as_str() {
            "true" => Some(Object::Boolean(true)),
            "false" => Some(Object::Boolean(false)),
            "null" => Some(Object::Null),
            _ => None,
        };
        if let Some(value) = value {
            operands.push(Operand {
                value,
                span: pos..end,
            });
            pos = end;
            continue;
        }

        let start = operands.first().map_or(pos, |o| o.span.start);
        if keyword == "BI" {
            let (entries, image_end) = read_inline_image(data, end);
            instructions.push(Instruction {
                operator: keyword,
                operands: entries,
                span: start..image_end,
            });
            operands.clear();
            pos = image_end;
            continue;
        }

        instructions.push(Instruction {
            operator: keyword,
            operands: std::mem::take(&mut operands),
            span: start..end,
        });
        pos = end;
    }

    instructions
}

/// Read the dictionary entries between `BI` and `ID`, then skip the data.
fn read_inline_image(data: &[u8], mut pos: usize) -> (Vec<Operand>, usize) {
    let mut entries = Vec::new();
    loop {
        pos = skip_ws_and_comments(data, pos);
        if pos >= data.len() {
            return (entries, data.len());
        }
        if data[pos..].starts_with(b"ID") && data.get(pos + 2).map_or(true, |&c| !is_regular(c)) {
            // One whitespace byte separates ID from the data.
            let data_start = (pos + 3).min(data.len());
            return (entries, inline_image_end(data, data_start));
        }
        match parse_object_limited(&data[pos..], DEFAULT_MAX_NESTING) {
            Ok((rest, value)) => {
                let end = data.len() - rest.len();
                entries.push(Operand {
                    value,
                    span: pos..end,
                });
                pos = end;
            },
            Err(_) => {
                // Bare keywords are allowed as values (`/IM true`).
                let end = keyword_end(data, pos).max(pos + 1);
                pos = end;
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_text_object() {
        let data = b"BT /F1 12 Tf 100 700 Td (Hello) Tj ET";
        let ops = tokenize(data);
        let names: Vec<&str> = ops.iter().map(|i| i.operator.as_str()).collect();
        assert_eq!(names, vec!["BT", "Tf", "Td", "Tj", "ET"]);
        assert_eq!(ops[1].name(0), Some("F1"));
        assert_eq!(ops[1].number(1), Some(12.0));
        assert_eq!(ops[3].operands[0].value, Object::String(b"Hello".to_vec()));
        assert_eq!(&data[ops[3].operands[0].span.clone()], b"(Hello)");
        assert_eq!(&data[ops[2].span.clone()], b"100 700 Td");
    }

    #[test]
    fn test_tokenize_tj_array_and_quotes() {
        let ops = tokenize(b"[(A) -120 (B)] TJ (x)' 1 2 (y)\"");
        assert_eq!(ops.len(), 3);
        assert!(matches!(&ops[0].operands[0].value, Object::Array(a) if a.len() == 3));
        assert_eq!(ops[1].operator, "'");
        assert_eq!(ops[2].operator, "\"");
        assert_eq!(ops[2].operands.len(), 3);
    }

    #[test]
    fn test_tokenize_comments_and_booleans() {
        let ops = tokenize(b"% comment\nq 1 0 0 1 5 5 cm Q /Span << /MCID 0 >> BDC EMC");
        let names: Vec<&str> = ops.iter().map(|i| i.operator.as_str()).collect();
        assert_eq!(names, vec!["q", "cm", "Q", "BDC", "EMC"]);
        assert_eq!(ops[1].numbers().unwrap(), vec![1.0, 0.0, 0.0, 1.0, 5.0, 5.0]);
        assert!(ops[3].operands[1].value.as_dict().is_some());
    }

    #[test]
    fn test_inline_image_is_one_instruction() {
        let data = b"q BI /W 2 /H 1 /CS /RGB /BPC 8 ID \x00EI\xff\x10\x20\x30\nEI Q";
        let ops = tokenize(data);
        let names: Vec<&str> = ops.iter().map(|i| i.operator.as_str()).collect();
        assert_eq!(names, vec!["q", "BI", "Q"]);
        assert_eq!(ops[1].operands.len(), 8);
        assert_eq!(ops[1].name(5), Some("RGB"));
        assert!(data[ops[1].span.clone()].ends_with(b"\nEI"));
    }

    #[test]
    fn test_garbage_is_skipped() {
        let ops = tokenize(b") 1 0 m ] 5 5 l S");
        let names: Vec<&str> = ops.iter().map(|i| i.operator.as_str()).collect();
        assert_eq!(names, vec!["m", "l", "S"]);
    }
}
