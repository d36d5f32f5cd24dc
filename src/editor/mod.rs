//! Document editing.
//!
//! Structural page operations live on [`PageEditor`], implemented for
//! [`Document`](crate::Document). Operations that produce new documents ([`split`],
//! [`merge`], [`extract_pages`], [`merge_files`]) are free functions, as
//! are the compositor entry points.
//!
//! ## Page positions
//!
//! All positions are 1-based indices into the flattened page order.
//!
//! - Insertion points clamp into `1..=page_count + 1`.
//! - Selections ignore positions outside the document and fail with
//!   [`Error::InvalidArgument`](crate::Error::InvalidArgument) when nothing
//!   valid remains.
//! - A single page reference must exist, otherwise
//!   [`Error::PageNotFound`](crate::Error::PageNotFound).
//!
//! A failed operation leaves the document unchanged.
//!
//! ## Example
//!
//! ```
//! use pdf_forge::editor::PageEditor;
//! use pdf_forge::Document;
//!
//! let mut doc = Document::new();
//! doc.insert_blank(1)?;
//! doc.duplicate(1, 2, 2)?;
//! doc.rotate(3, 90)?;
//! assert_eq!(doc.page_count(), 3);
//! # Ok::<(), pdf_forge::Error>(())
//! ```

pub mod annotations;
pub mod compositor;
pub mod deep_copy;
pub mod operation;
pub mod page_ops;
pub mod resource_manager;

pub use annotations::{add_annotation, add_link, Annotation, LinkTarget};
pub use compositor::{composite, composite_from, stamp, Overlay};
pub use deep_copy::Copier;
pub use operation::{apply_all, Operation, OperationOutcome};
pub use page_ops::{extract_pages, merge, merge_files, split};
pub use resource_manager::ResourceManager;

use crate::error::Result;
use crate::geometry::Rect;

/// A page rearrangement, expressed in 1-based positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageMove {
    /// Move each selected page one place towards the front
    Up(Vec<usize>),
    /// Move each selected page one place towards the back
    Down(Vec<usize>),
    /// Move the selected pages to the front, in the listed order
    First(Vec<usize>),
    /// Move the selected pages to the back, in the listed order
    Last(Vec<usize>),
    /// Exchange two pages
    Swap(usize, usize),
    /// Move one page so it ends up at `to` (clamped)
    MoveTo {
        /// Page to move
        from: usize,
        /// Final position
        to: usize,
    },
}

impl PageMove {
    /// Number of pages the move names.
    pub fn selection_len(&self) -> usize {
        match self {
            PageMove::Up(p) | PageMove::Down(p) | PageMove::First(p) | PageMove::Last(p) => p.len(),
            PageMove::Swap(..) => 2,
            PageMove::MoveTo { .. } => 1,
        }
    }
}

/// Structural page operations.
pub trait PageEditor {
    /// Insert an empty page at `position`. Returns the position used.
    fn insert_blank(&mut self, position: usize) -> Result<usize>;

    /// Insert an empty page at each position, all relative to the current
    /// page order.
    fn insert_blank_pages(&mut self, positions: &[usize]) -> Result<()>;

    /// Remove the given pages. Returns how many were removed.
    fn remove(&mut self, positions: &[usize]) -> Result<usize>;

    /// Add `delta_degrees` (a multiple of 90) to a page's rotation.
    /// Returns the new, normalized rotation.
    fn rotate(&mut self, position: usize, delta_degrees: i64) -> Result<i64>;

    /// Rotate several pages by the same amount.
    fn rotate_pages(&mut self, positions: &[usize], delta_degrees: i64) -> Result<()>;

    /// Insert `count` deep copies of page `position`, the first at
    /// `target_position`.
    fn duplicate(&mut self, position: usize, count: usize, target_position: usize) -> Result<()>;

    /// Arrange pages so that page `permutation[i]` comes at position `i + 1`.
    fn reorder(&mut self, permutation: &[usize]) -> Result<()>;

    /// Rearrange pages.
    fn move_pages(&mut self, mv: &PageMove) -> Result<()>;

    /// Set a page's `/CropBox`.
    fn crop(&mut self, position: usize, rect: Rect) -> Result<()>;
}

