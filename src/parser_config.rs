//! Parse options controlling strict/lenient handling of malformed input.
//!
//! # Example
//!
//! ```
//! use pdf_forge::parser_config::ParseOptions;
//!
//! // Tolerate malformed files (default)
//! let lenient = ParseOptions::lenient();
//!
//! // Refuse malformed input
//! let strict = ParseOptions::strict();
//!
//! let custom = ParseOptions::default().with_max_nesting(64).with_reconstruct_xref(false);
//! assert!(!custom.reconstruct_xref);
//! ```

use crate::decoders::{DecodeOptions, DEFAULT_MAX_DECOMPRESSED_SIZE};
use crate::parser::DEFAULT_MAX_NESTING;

/// Options applied while opening a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Fail on tolerated malformations (bad `/Length`, missing `endobj`,
    /// dangling xref offsets) instead of recovering.
    pub strict: bool,

    /// Maximum array/dictionary nesting depth.
    pub max_nesting: usize,

    /// Maximum input size in bytes, 0 disables the check.
    pub max_file_size: usize,

    /// Maximum decoded size of a single stream in bytes, 0 disables the check.
    pub max_decompressed_size: usize,

    /// Rebuild the cross-reference table by scanning the file when the
    /// stored one is unusable.
    pub reconstruct_xref: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self::lenient()
    }
}

impl ParseOptions {
    /// Strict mode: fail on the first structural irregularity.
    pub fn strict() -> Self {
        Self {
            strict: true,
            max_nesting: DEFAULT_MAX_NESTING,
            max_file_size: 500 * 1024 * 1024,
            max_decompressed_size: DEFAULT_MAX_DECOMPRESSED_SIZE,
            reconstruct_xref: false,
        }
    }

    /// Lenient mode: recover from damage wherever possible.
    pub fn lenient() -> Self {
        Self {
            strict: false,
            reconstruct_xref: true,
            ..Self::strict()
        }
    }

    /// Set the nesting limit.
    pub fn with_max_nesting(mut self, max_nesting: usize) -> Self {
        self.max_nesting = max_nesting;
        self
    }

    /// Set the input size limit.
    pub fn with_max_file_size(mut self, max_file_size: usize) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    /// Enable or disable xref reconstruction.
    pub fn with_reconstruct_xref(mut self, reconstruct: bool) -> Self {
        self.reconstruct_xref = reconstruct;
        self
    }

    /// Decoder settings matching these options.
    pub(crate) fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            max_decompressed_size: self.max_decompressed_size,
            recover_partial: !self.strict,
        }
    }
}
