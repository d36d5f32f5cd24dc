//! ASCII85Decode (base-85).
//!
//! Four bytes map to five characters in `!`..=`u`; `z` stands for four
//! zero bytes and `~>` ends the data.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};

/// ASCII85Decode filter implementation.
pub struct Ascii85Decoder;

impl StreamDecoder for Ascii85Decoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let input = input.strip_prefix(b"<~").unwrap_or(input);
        let mut output = Vec::with_capacity(input.len() * 4 / 5);
        let mut acc: u32 = 0;
        let mut count = 0;

        for &byte in input {
            match byte {
                b'~' => break,
                b'z' if count == 0 => output.extend_from_slice(&[0; 4]),
                b'z' => {
                    return Err(Error::Decode(
                        "ASCII85Decode: 'z' inside a group".to_string(),
                    ))
                },
                b'!'..=b'u' => {
                    acc = acc
                        .checked_mul(85)
                        .and_then(|v| v.checked_add((byte - b'!') as u32))
                        .ok_or_else(|| Error::Decode("ASCII85Decode: group overflow".to_string()))?;
                    count += 1;
                    if count == 5 {
                        output.extend_from_slice(&acc.to_be_bytes());
                        acc = 0;
                        count = 0;
                    }
                },
                _ if byte.is_ascii_whitespace() => {},
                _ => {
                    return Err(Error::Decode(format!(
                        "ASCII85Decode: invalid character '{}'",
                        byte as char
                    )))
                },
            }
        }

        match count {
            0 => {},
            1 => {
                return Err(Error::Decode(
                    "ASCII85Decode: final group has a single character".to_string(),
                ))
            },
            _ => {
                for _ in count..5 {
                    acc = acc
                        .checked_mul(85)
                        .and_then(|v| v.checked_add(84))
                        .ok_or_else(|| Error::Decode("ASCII85Decode: group overflow".to_string()))?;
                }
                output.extend_from_slice(&acc.to_be_bytes()[..count - 1]);
            },
        }

        Ok(output)
    }

    fn encode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::with_capacity(input.len() * 5 / 4 + 2);

        for chunk in input.chunks(4) {
            let mut group = [0u8; 4];
            group[..chunk.len()].copy_from_slice(chunk);
            let mut value = u32::from_be_bytes(group);

            if chunk.len() == 4 && value == 0 {
                output.push(b'z');
                continue;
            }

            let mut digits = [0u8; 5];
            for digit in digits.iter_mut().rev() {
                *digit = (value % 85) as u8 + b'!';
                value /= 85;
            }
            output.extend_from_slice(&digits[..chunk.len() + 1]);
        }

        output.extend_from_slice(b"~>");
        Ok(output)
    }

    fn can_encode(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "ASCII85Decode"
    }
}
