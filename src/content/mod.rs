//! Content stream processing.
//!
//! Content streams hold the operators that paint a page. This module
//! tokenizes them with byte spans, tracks text state while scanning, and
//! rewrites them in place:
//!
//! - [`tokenizer`] splits a stream into operator instructions
//! - [`text_state`] tracks the matrices and text parameters
//! - [`scanner`] produces positioned text and implements redaction and
//!   replacement on top of it
//! - [`rewrite`] splices new names and strings into existing bytes
//! - [`images`] hands out image XObjects as stored

pub mod images;
pub mod rewrite;
pub mod scanner;
pub mod text_state;
pub mod tokenizer;

pub use images::{extract_images, save_images, ExtractedImage};
pub use rewrite::{rename_resources, replace_in_strings, ResourceRenames};
pub use scanner::{extract_page_text, extract_text, redact, replace_text, text_fragments, TextFragment};
pub use text_state::{FontMetrics, TextState};
pub use tokenizer::{tokenize, Instruction, Operand};

use crate::document::Document;
use crate::error::Result;
use crate::object::{Dictionary, Object, ObjectRef};

/// References to the content streams of a page, in drawing order.
///
/// `/Contents` may be a single reference or an array of references; direct
/// streams are not addressable and are skipped.
pub fn content_refs(doc: &Document, page_ref: ObjectRef) -> Vec<ObjectRef> {
    let Some(contents) = doc
        .get(page_ref)
        .and_then(Object::as_dict)
        .and_then(|d| d.get("Contents"))
    else {
        return Vec::new();
    };
    match contents {
        Object::Reference(r) => match doc.resolve_ref(*r) {
            Object::Array(items) => items.iter().filter_map(Object::as_reference).collect(),
            _ => vec![*r],
        },
        Object::Array(items) => items.iter().filter_map(Object::as_reference).collect(),
        _ => {
            log::warn!("page {} has direct /Contents", page_ref);
            Vec::new()
        },
    }
}

/// Decoded content of a page: every content stream joined by a newline.
pub fn page_content(doc: &Document, page_ref: ObjectRef) -> Result<Vec<u8>> {
    let options = doc.options().decode_options();
    let mut out = Vec::new();
    for r in content_refs(doc, page_ref) {
        let stream = doc.resolve_ref(r);
        if !stream.is_stream() {
            log::debug!("content entry {} is not a stream", r);
            continue;
        }
        if !out.is_empty() {
            out.push(b'\n');
        }
        out.extend(stream.decode_stream_data_with(&options)?);
    }
    Ok(out)
}

/// Effective resources of a page, empty when none are set.
pub fn page_resources(doc: &Document, page_ref: ObjectRef) -> Dictionary {
    doc.effective_attribute(page_ref, "Resources")
        .and_then(Object::as_dict)
        .cloned()
        .unwrap_or_default()
}
