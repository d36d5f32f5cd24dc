//! FlateDecode (zlib/deflate).
//!
//! Uses the flate2 crate in both directions. Decoding falls back to raw
//! deflate for payloads with a damaged zlib header.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// FlateDecode filter implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlateDecoder {
    /// Return what was inflated before a corrupt region instead of failing.
    pub recover_partial: bool,
}

impl StreamDecoder for FlateDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        let zlib_err = match ZlibDecoder::new(input).read_to_end(&mut output) {
            Ok(_) => return Ok(output),
            Err(e) => e,
        };

        if self.recover_partial && !output.is_empty() {
            log::warn!(
                "FlateDecode partial recovery: kept {} bytes before corruption: {}",
                output.len(),
                zlib_err
            );
            return Ok(output);
        }

        // Some writers emit raw deflate data behind a broken or missing zlib header.
        log::debug!("zlib decode failed ({}), trying raw deflate", zlib_err);
        let body = if input.len() > 2 && input[0] & 0x0F == 8 {
            &input[2..]
        } else {
            input
        };
        output.clear();
        match DeflateDecoder::new(body).read_to_end(&mut output) {
            Ok(_) => Ok(output),
            Err(_) if self.recover_partial && !output.is_empty() => {
                log::warn!("raw deflate partial recovery: kept {} bytes", output.len());
                Ok(output)
            },
            Err(e) => Err(Error::Decode(format!("FlateDecode: {}", e))),
        }
    }

    fn encode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(input)?;
        Ok(encoder.finish()?)
    }

    fn can_encode(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "FlateDecode"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flate_round_trip() {
        let codec = FlateDecoder::default();
        let original = b"q 1 0 0 1 72 720 cm BT /F1 12 Tf (Hello) Tj ET Q";
        let compressed = codec.encode(original).unwrap();
        assert_ne!(compressed.as_slice(), &original[..]);
        assert_eq!(codec.decode(&compressed).unwrap(), original);
    }

    #[test]
    fn test_flate_decode_empty() {
        let codec = FlateDecoder::default();
        let compressed = codec.encode(b"").unwrap();
        assert!(codec.decode(&compressed).unwrap().is_empty());
    }

    #[test]
    fn test_flate_decode_raw_deflate() {
        use flate2::write::DeflateEncoder;
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"raw deflate body").unwrap();
        let raw = encoder.finish().unwrap();

        let codec = FlateDecoder::default();
        assert_eq!(codec.decode(&raw).unwrap(), b"raw deflate body");
    }

    #[test]
    fn test_flate_decode_invalid_data() {
        let codec = FlateDecoder {
            recover_partial: false,
        };
        // Reserved deflate block type (BTYPE=11) after an invalid zlib header.
        assert!(codec.decode(b"\x07\xff\xff\xff").is_err());
    }
}
