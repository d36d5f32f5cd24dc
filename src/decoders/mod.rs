//! Stream filters.
//!
//! Reading needs every filter a content or structure stream may carry;
//! rewriting a stream in place additionally needs the inverse. Filters
//! that have an encoder here are the ones [`encode_stream`] accepts:
//! - FlateDecode (zlib/deflate), both directions
//! - LZWDecode, both directions
//! - ASCIIHexDecode, both directions
//! - ASCII85Decode, both directions
//! - RunLengthDecode, decode only
//!
//! Image codecs (DCT, JPX, JBIG2, CCITTFax) are never decoded. Their
//! payloads are copied as opaque bytes.

use crate::error::{Error, Result};

mod ascii85;
mod ascii_hex;
mod flate;
mod lzw;
mod predictor;
mod runlength;

pub use ascii85::Ascii85Decoder;
pub use ascii_hex::AsciiHexDecoder;
pub(crate) use ascii_hex::hex_digit_to_value;
pub use flate::FlateDecoder;
pub use lzw::LzwDecoder;
pub use predictor::{decode_predictor, DecodeParams};
pub use runlength::RunLengthDecoder;

/// Default cap on decoded stream size (decompression bomb protection).
pub const DEFAULT_MAX_DECOMPRESSED_SIZE: usize = 256 * 1024 * 1024;

/// Stream filter identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    /// FlateDecode (zlib)
    FlateDecode,
    /// LZWDecode
    LZWDecode,
    /// ASCIIHexDecode
    ASCIIHexDecode,
    /// ASCII85Decode
    ASCII85Decode,
    /// RunLengthDecode
    RunLengthDecode,
    /// DCTDecode (JPEG, opaque)
    DCTDecode,
    /// JPXDecode (JPEG 2000, opaque)
    JPXDecode,
    /// JBIG2Decode (opaque)
    JBIG2Decode,
    /// CCITTFaxDecode (opaque)
    CCITTFaxDecode,
}

impl Filter {
    /// Look a filter up by its full or abbreviated (inline image) name.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "FlateDecode" | "Fl" => Filter::FlateDecode,
            "LZWDecode" | "LZW" => Filter::LZWDecode,
            "ASCIIHexDecode" | "AHx" => Filter::ASCIIHexDecode,
            "ASCII85Decode" | "A85" => Filter::ASCII85Decode,
            "RunLengthDecode" | "RL" => Filter::RunLengthDecode,
            "DCTDecode" | "DCT" => Filter::DCTDecode,
            "JPXDecode" => Filter::JPXDecode,
            "JBIG2Decode" => Filter::JBIG2Decode,
            "CCITTFaxDecode" | "CCF" => Filter::CCITTFaxDecode,
            _ => return None,
        })
    }

    /// Canonical filter name as written in a `/Filter` entry.
    pub fn name(&self) -> &'static str {
        match self {
            Filter::FlateDecode => "FlateDecode",
            Filter::LZWDecode => "LZWDecode",
            Filter::ASCIIHexDecode => "ASCIIHexDecode",
            Filter::ASCII85Decode => "ASCII85Decode",
            Filter::RunLengthDecode => "RunLengthDecode",
            Filter::DCTDecode => "DCTDecode",
            Filter::JPXDecode => "JPXDecode",
            Filter::JBIG2Decode => "JBIG2Decode",
            Filter::CCITTFaxDecode => "CCITTFaxDecode",
        }
    }

    /// Image codecs are carried as opaque bytes and never decoded.
    pub fn is_image_codec(&self) -> bool {
        matches!(
            self,
            Filter::DCTDecode | Filter::JPXDecode | Filter::JBIG2Decode | Filter::CCITTFaxDecode
        )
    }

    fn codec(&self, recover_partial: bool) -> Option<Box<dyn StreamDecoder>> {
        match self {
            Filter::FlateDecode => Some(Box::new(FlateDecoder { recover_partial })),
            Filter::LZWDecode => Some(Box::new(LzwDecoder)),
            Filter::ASCIIHexDecode => Some(Box::new(AsciiHexDecoder)),
            Filter::ASCII85Decode => Some(Box::new(Ascii85Decoder)),
            Filter::RunLengthDecode => Some(Box::new(RunLengthDecoder)),
            _ => None,
        }
    }
}

/// A single stream filter.
///
/// `decode` reverses the filter. `encode` applies it, and is only
/// implemented by filters that can be round-tripped without loss.
pub trait StreamDecoder {
    /// Decode the input data.
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Encode the input data. The default rejects the filter.
    fn encode(&self, _input: &[u8]) -> Result<Vec<u8>> {
        Err(Error::Encoding {
            filter: self.name().to_string(),
            reason: "filter has no encoder".to_string(),
        })
    }

    /// Whether `encode` is implemented.
    fn can_encode(&self) -> bool {
        false
    }

    /// Get the name of this filter (e.g., "FlateDecode").
    fn name(&self) -> &str;
}

/// Limits and recovery policy applied while decoding.
#[derive(Debug, Clone, Copy)]
pub struct DecodeOptions {
    /// Maximum decoded size in bytes, 0 disables the check
    pub max_decompressed_size: usize,
    /// Accept the bytes recovered before a corrupt region of a Flate payload
    pub recover_partial: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_decompressed_size: DEFAULT_MAX_DECOMPRESSED_SIZE,
            recover_partial: true,
        }
    }
}

impl DecodeOptions {
    /// Options for data that will be re-encoded: no partial recovery.
    pub fn exact() -> Self {
        Self {
            recover_partial: false,
            ..Self::default()
        }
    }
}

/// Resolve filter names into [`Filter`] values.
///
/// Unknown names yield [`Error::UnsupportedFilter`].
pub fn parse_filters(names: &[String]) -> Result<Vec<Filter>> {
    names
        .iter()
        .map(|n| Filter::from_name(n).ok_or_else(|| Error::UnsupportedFilter(n.clone())))
        .collect()
}

/// Decode stream data through a filter pipeline.
///
/// Filters are applied in order; the predictor in `params` (if any) runs
/// after the last filter. An image codec anywhere in the chain yields
/// [`Error::UnsupportedFilter`].
pub fn decode_stream(
    data: &[u8],
    filters: &[String],
    params: Option<&DecodeParams>,
    options: &DecodeOptions,
) -> Result<Vec<u8>> {
    let mut current = data.to_vec();

    for filter in parse_filters(filters)? {
        let codec = filter
            .codec(options.recover_partial)
            .ok_or_else(|| Error::UnsupportedFilter(filter.name().to_string()))?;
        current = codec.decode(&current)?;

        if options.max_decompressed_size > 0 && current.len() > options.max_decompressed_size {
            return Err(Error::Decode(format!(
                "decoded size {} bytes exceeds limit {} bytes",
                current.len(),
                options.max_decompressed_size
            )));
        }
    }

    if let Some(params) = params {
        if params.predictor > 1 {
            current = decode_predictor(&current, params)?;
        }
    }

    Ok(current)
}

/// Check that every filter in the chain can be re-applied after decoding.
///
/// Returns [`Error::Encoding`] naming the first filter that cannot.
pub fn check_round_trip(filters: &[String]) -> Result<()> {
    for name in filters {
        let supported = Filter::from_name(name)
            .and_then(|f| f.codec(false))
            .is_some_and(|codec| codec.can_encode());
        if !supported {
            return Err(Error::Encoding {
                filter: name.clone(),
                reason: "filter cannot be re-encoded".to_string(),
            });
        }
    }
    Ok(())
}

/// Re-apply a filter chain to decoded data.
///
/// The chain is listed in decode order, so encoders run last-to-first.
pub fn encode_stream(data: &[u8], filters: &[String]) -> Result<Vec<u8>> {
    check_round_trip(filters)?;

    let mut current = data.to_vec();
    for name in filters.iter().rev() {
        let codec = Filter::from_name(name)
            .and_then(|f| f.codec(false))
            .ok_or_else(|| Error::UnsupportedFilter(name.clone()))?;
        current = codec.encode(&current)?;
    }
    Ok(current)
}
