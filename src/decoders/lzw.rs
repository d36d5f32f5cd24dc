//! LZWDecode.
//!
//! PDF's LZW variant is MSB-first with 9 to 12 bit codes, clear code 256,
//! end code 257 and the code width switching one code early
//! (EarlyChange = 1). weezl's TIFF size switch implements exactly that.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};
use weezl::{decode::Decoder as WeezlDecoder, encode::Encoder as WeezlEncoder, BitOrder};

/// LZWDecode filter implementation.
pub struct LzwDecoder;

impl StreamDecoder for LzwDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        match WeezlDecoder::with_tiff_size_switch(BitOrder::Msb, 8).decode(input) {
            Ok(data) => Ok(data),
            Err(e) => {
                log::debug!("weezl LZW decode failed ({:?}), using table decoder", e);
                decode_table(input)
            },
        }
    }

    fn encode(&self, input: &[u8]) -> Result<Vec<u8>> {
        WeezlEncoder::with_tiff_size_switch(BitOrder::Msb, 8)
            .encode(input)
            .map_err(|e| Error::Encoding {
                filter: "LZWDecode".to_string(),
                reason: format!("{:?}", e),
            })
    }

    fn can_encode(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "LZWDecode"
    }
}

const CLEAR: u16 = 256;
const EOD: u16 = 257;

/// Table-driven decoder tolerant of a missing end code.
fn decode_table(input: &[u8]) -> Result<Vec<u8>> {
    let mut table: Vec<Vec<u8>> = Vec::with_capacity(4096);
    let reset = |table: &mut Vec<Vec<u8>>| {
        table.clear();
        table.extend((0..=255u8).map(|b| vec![b]));
        table.push(Vec::new());
        table.push(Vec::new());
    };
    reset(&mut table);

    let mut output = Vec::new();
    let mut width = 9u32;
    let mut prev: Option<Vec<u8>> = None;
    let mut bits = 0u32;
    let mut acc = 0u32;

    for &byte in input {
        acc = (acc << 8) | byte as u32;
        bits += 8;

        while bits >= width {
            bits -= width;
            let code = ((acc >> bits) & ((1 << width) - 1)) as u16;

            match code {
                CLEAR => {
                    reset(&mut table);
                    width = 9;
                    prev = None;
                    continue;
                },
                EOD => return Ok(output),
                _ => {},
            }

            let entry = if (code as usize) < table.len() {
                table[code as usize].clone()
            } else if let Some(p) = &prev {
                // KwKwK case: the code being defined right now.
                let mut e = p.clone();
                e.push(p[0]);
                e
            } else {
                return Err(Error::Decode(format!("LZWDecode: invalid code {}", code)));
            };

            output.extend_from_slice(&entry);
            if let Some(mut p) = prev.take() {
                if table.len() < 4096 {
                    p.push(entry[0]);
                    table.push(p);
                }
            }
            prev = Some(entry);

            if table.len() + 1 >= (1 << width) && width < 12 {
                width += 1;
            }
        }
    }

    Ok(output)
}
