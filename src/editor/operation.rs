//! A closed set of in-place document operations.

use super::annotations::{annotate_page, Annotation};
use super::compositor::{composite_page, stamp_page, Overlay};
use super::{PageEditor, PageMove};
use crate::audit::AuditEvent;
use crate::content::scanner::{redact_boxes, replace_in_pages};
use crate::document::Document;
use crate::error::Result;
use crate::geometry::Rect;
use serde::Serialize;

/// One in-place edit of a document.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Insert a blank page at a 1-based position (clamped)
    InsertBlank {
        /// Insertion point
        position: usize,
    },
    /// Remove pages; out-of-range positions are ignored
    Remove {
        /// Pages to remove
        positions: Vec<usize>,
    },
    /// Rotate one page by a multiple of 90 degrees
    Rotate {
        /// Page to rotate
        position: usize,
        /// Clockwise degrees, may be negative
        degrees: i64,
    },
    /// Insert `count` deep copies of a page
    Duplicate {
        /// Page to copy
        position: usize,
        /// Number of copies
        count: usize,
        /// Where the first copy goes (clamped)
        target: usize,
    },
    /// Arrange pages in the given order
    Reorder {
        /// New order as original 1-based indices
        permutation: Vec<usize>,
    },
    /// Move selected pages
    Move(PageMove),
    /// Set the crop box of a page
    Crop {
        /// Page to crop
        position: usize,
        /// Visible region
        rect: Rect,
    },
    /// Draw one page on top of another
    Composite {
        /// Page drawn on
        target: usize,
        /// Page drawn
        overlay: usize,
    },
    /// Draw a prepared fragment on a page
    Stamp {
        /// Page drawn on
        target: usize,
        /// What to draw
        overlay: Overlay,
    },
    /// Paint over text matching a pattern
    Redact {
        /// Text to hide
        pattern: String,
    },
    /// Replace text inside content streams
    ReplaceText {
        /// Text to find
        from: String,
        /// Replacement
        to: String,
    },
    /// Add a note or link annotation to a page
    Annotate {
        /// Page annotated
        position: usize,
        /// Annotation to add
        annotation: Annotation,
    },
}

/// What an applied operation changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OperationOutcome {
    /// Page count afterwards
    pub page_count: usize,
    /// Pages, boxes or replacements affected, depending on the operation
    pub affected: usize,
}

impl Operation {
    /// Name used in audit events.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::InsertBlank { .. } => "insert_blank",
            Operation::Remove { .. } => "remove",
            Operation::Rotate { .. } => "rotate",
            Operation::Duplicate { .. } => "duplicate",
            Operation::Reorder { .. } => "reorder",
            Operation::Move(_) => "move_pages",
            Operation::Crop { .. } => "crop",
            Operation::Composite { .. } => "composite",
            Operation::Stamp { .. } => "stamp",
            Operation::Redact { .. } => "redact",
            Operation::ReplaceText { .. } => "replace_text",
            Operation::Annotate { .. } => "add_annotation",
        }
    }

    fn run(&self, doc: &mut Document) -> Result<usize> {
        match self {
            Operation::InsertBlank { position } => doc.insert_blank(*position).map(|_| 1),
            Operation::Remove { positions } => doc.remove(positions),
            Operation::Rotate { position, degrees } => doc.rotate(*position, *degrees).map(|_| 1),
            Operation::Duplicate {
                position,
                count,
                target,
            } => doc.duplicate(*position, *count, *target).map(|_| *count),
            Operation::Reorder { permutation } => {
                doc.reorder(permutation).map(|_| permutation.len())
            },
            Operation::Move(mv) => doc.move_pages(mv).map(|_| mv.selection_len()),
            Operation::Crop { position, rect } => doc.crop(*position, *rect).map(|_| 1),
            Operation::Composite { target, overlay } => composite_page(doc, *target, *overlay).map(|_| 1),
            Operation::Stamp { target, overlay } => stamp_page(doc, *target, overlay).map(|_| 1),
            Operation::Redact { pattern } => redact_boxes(doc, pattern),
            Operation::ReplaceText { from, to } => replace_in_pages(doc, from, to),
            Operation::Annotate {
                position,
                annotation,
            } => annotate_page(doc, *position, annotation).map(|_| 1),
        }
    }

    /// Apply to `doc`. On error the document is unchanged.
    pub fn apply(&self, doc: &mut Document) -> Result<OperationOutcome> {
        let result = self.run(doc).map(|affected| OperationOutcome {
            page_count: doc.page_count(),
            affected,
        });
        let mut event = AuditEvent::from_result(self.name(), &result);
        if let Ok(outcome) = &result {
            event = event.with_pages(outcome.page_count);
        }
        event.emit();
        result
    }
}

/// Apply operations in order, stopping at the first failure.
pub fn apply_all(doc: &mut Document, operations: &[Operation]) -> Result<Vec<OperationOutcome>> {
    operations.iter().map(|op| op.apply(doc)).collect()
}
