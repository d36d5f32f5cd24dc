//! Error types for document manipulation.
//!
//! Every fallible operation in the crate returns [`Result`]. The variants
//! follow the failure classes callers need to tell apart: structural
//! corruption found while parsing, bad arguments, missing pages, streams
//! that cannot be rewritten, and failed authentication.

use crate::object::ObjectRef;
use std::path::PathBuf;

/// Result type alias for document operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while parsing, editing or writing a document.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// Invalid file header (expected '%PDF-')
    #[error("Invalid PDF header: expected '%PDF-', found '{0}'")]
    InvalidHeader(String),

    /// Parse error at a specific byte offset
    #[error("Failed to parse object at byte {offset}: {reason}")]
    Parse {
        /// Byte offset where parsing failed
        offset: usize,
        /// Reason for the failure
        reason: String,
    },

    /// Invalid or missing cross-reference data
    #[error("Invalid cross-reference table")]
    InvalidXref,

    /// Input ended in the middle of an object
    #[error("End of file reached unexpectedly")]
    UnexpectedEof,

    /// Object has the wrong type for the requested use
    #[error("Invalid object type: expected {expected}, found {found}")]
    InvalidObjectType {
        /// Expected object type
        expected: String,
        /// Actual object type found
        found: String,
    },

    /// An argument was out of range or malformed
    #[error("Invalid argument to {operation}: {reason}")]
    InvalidArgument {
        /// Operation that rejected the argument
        operation: &'static str,
        /// What was wrong with it
        reason: String,
    },

    /// A 1-based page index has no corresponding leaf in the page tree
    #[error("{operation}: page {page} not found (document has {page_count} pages)")]
    PageNotFound {
        /// Operation that looked the page up
        operation: &'static str,
        /// Requested 1-based page index
        page: usize,
        /// Page count at the time of the lookup
        page_count: usize,
    },

    /// A content stream cannot be decoded and re-encoded with its filter chain
    #[error("Cannot rewrite stream encoded with {filter}: {reason}")]
    Encoding {
        /// Offending filter name
        filter: String,
        /// Why the round trip is impossible
        reason: String,
    },

    /// Neither the owner nor the user password matched
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Malformed or unsupported encryption dictionary
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stream payload could not be decoded
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// Stream filter not implemented
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// Circular reference detected in the object graph
    #[error("Circular reference detected: object {0}")]
    CircularReference(ObjectRef),

    /// Recursion depth limit exceeded
    #[error("Recursion depth limit exceeded (max: {0})")]
    RecursionLimitExceeded(u32),

    /// Reading or writing a named file failed
    #[error("{}: {source}", path.display())]
    Input {
        /// The file involved
        path: PathBuf,
        /// The underlying failure
        source: Box<Error>,
    },
}

impl Error {
    /// True for failures caused by structurally corrupt input bytes.
    pub fn is_parse_error(&self) -> bool {
        match self {
            Error::InvalidHeader(_)
            | Error::Parse { .. }
            | Error::InvalidXref
            | Error::UnexpectedEof
            | Error::RecursionLimitExceeded(_) => true,
            Error::Input { source, .. } => source.is_parse_error(),
            _ => false,
        }
    }

    pub(crate) fn parse(offset: usize, reason: impl Into<String>) -> Self {
        Error::Parse {
            offset,
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_argument(operation: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidArgument {
            operation,
            reason: reason.into(),
        }
    }

    /// Attach the path of the input that produced this error.
    pub(crate) fn for_input(self, path: impl Into<PathBuf>) -> Self {
        Error::Input {
            path: path.into(),
            source: Box::new(self),
        }
    }
}
