//! Adding annotations to pages.
//!
//! New annotations are written as indirect objects, back-linked to their
//! page with `/P`, and appended to the page's own `/Annots` array.

use crate::audit;
use crate::document::{encode_text_string, Document};
use crate::error::{Error, Result};
use crate::geometry::Rect;
use crate::object::{dict, Dictionary, Object, ObjectRef};

/// `/F` bit 3: print the annotation with the page.
const PRINT_FLAG: i64 = 4;

/// Where a link goes.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkTarget {
    /// Open a URI
    Uri(String),
    /// Jump to a 1-based page of the same document
    Page(usize),
}

/// An annotation to add.
#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    /// Sticky note showing `contents` when opened
    Text {
        /// Icon area
        rect: Rect,
        /// Note text
        contents: String,
    },
    /// Clickable area
    Link {
        /// Active area
        rect: Rect,
        /// Link destination
        target: LinkTarget,
    },
}

impl Annotation {
    /// Sticky note at `rect`.
    pub fn note(rect: Rect, contents: impl Into<String>) -> Self {
        Annotation::Text {
            rect,
            contents: contents.into(),
        }
    }

    /// Link from `rect` to a URI.
    pub fn uri(rect: Rect, uri: impl Into<String>) -> Self {
        Annotation::Link {
            rect,
            target: LinkTarget::Uri(uri.into()),
        }
    }

    /// Annotation rectangle.
    pub fn rect(&self) -> Rect {
        match self {
            Annotation::Text { rect, .. } | Annotation::Link { rect, .. } => *rect,
        }
    }

    fn build(&self, doc: &Document, page: ObjectRef) -> Result<Dictionary> {
        let rect = self.rect();
        if !rect.is_positive() {
            return Err(Error::invalid_argument(
                "add_annotation",
                format!("rectangle {}x{} has no area", rect.width, rect.height),
            ));
        }
        let mut d = dict([
            ("Type", Object::name("Annot")),
            ("Rect", rect.to_object()),
            ("P", Object::Reference(page)),
            ("F", Object::Integer(PRINT_FLAG)),
        ]);
        match self {
            Annotation::Text { contents, .. } => {
                d.insert("Subtype".into(), Object::name("Text"));
                d.insert("Contents".into(), Object::String(encode_text_string(contents)));
                d.insert("Name".into(), Object::name("Note"));
                d.insert("Open".into(), Object::Boolean(false));
            },
            Annotation::Link { target, .. } => {
                d.insert("Subtype".into(), Object::name("Link"));
                d.insert("Border".into(), Object::number_array(&[0.0, 0.0, 0.0]));
                match target {
                    LinkTarget::Uri(uri) if uri.is_empty() => {
                        return Err(Error::invalid_argument("add_link", "URI is empty"));
                    },
                    LinkTarget::Uri(uri) => {
                        let action = dict([
                            ("S", Object::name("URI")),
                            ("URI", Object::String(uri.as_bytes().to_vec())),
                        ]);
                        d.insert("A".into(), Object::Dictionary(action));
                    },
                    LinkTarget::Page(index) => {
                        let dest = doc.page_for("add_link", *index)?;
                        d.insert(
                            "Dest".into(),
                            Object::Array(vec![Object::Reference(dest.object_ref), Object::name("Fit")]),
                        );
                    },
                }
            },
        }
        Ok(d)
    }
}

/// [`add_annotation`] without the audit event.
pub(crate) fn annotate_page(doc: &mut Document, position: usize, annotation: &Annotation) -> Result<ObjectRef> {
    doc.ensure_unlocked("add_annotation")?;
    let page = doc.page_for("add_annotation", position)?.object_ref;
    let annot = annotation.build(doc, page)?;

    // An indirect /Annots may be shared; the page gets its own direct copy.
    let mut annots = match doc.get(page).and_then(Object::as_dict).and_then(|d| d.get("Annots")) {
        Some(a) => doc.resolve(a).as_array().cloned().unwrap_or_default(),
        None => Vec::new(),
    };
    let r = doc.add_object(Object::Dictionary(annot));
    annots.push(Object::Reference(r));
    if let Some(d) = doc.get_mut(page).and_then(Object::as_dict_mut) {
        d.insert("Annots".into(), Object::Array(annots));
    }
    Ok(r)
}

/// Add `annotation` to page `position`. Returns the new annotation object.
pub fn add_annotation(doc: &mut Document, position: usize, annotation: &Annotation) -> Result<ObjectRef> {
    let result = annotate_page(doc, position, annotation);
    audit::record("add_annotation", result, Some(doc.page_count()))
}

/// Add a link from `rect` on page `position` to `target`.
pub fn add_link(doc: &mut Document, position: usize, rect: Rect, target: LinkTarget) -> Result<ObjectRef> {
    let result = annotate_page(doc, position, &Annotation::Link { rect, target });
    audit::record("add_link", result, Some(doc.page_count()))
}
