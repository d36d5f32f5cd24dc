//! Serialization of a [`Document`](crate::document::Document) back to bytes.
//!
//! ```text
//! Document
//!     ↓
//! [pdf_writer::serialize] (object selection, compression, encryption)
//!     ↓
//! [ObjectSerializer] (object syntax)
//!     ↓
//! bytes → [atomic::save_atomic]
//! ```

pub mod atomic;
mod object_serializer;
mod pdf_writer;

pub use object_serializer::{format_real, write_name, write_string, ObjectSerializer};
pub(crate) use pdf_writer::write_document;
pub use pdf_writer::{
    format_date, generate_file_id, serialize, serialize_with, EncryptionContext, WriterConfig,
};
