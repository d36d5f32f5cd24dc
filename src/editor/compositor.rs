//! Content compositing.
//!
//! Draws overlay content on top of a page. The page's own content streams
//! are never rewritten: a stream holding `q` is put in front of them and
//! the overlay follows as `Q q <overlay> Q`, so graphics state cannot leak
//! in either direction. Overlay resources are merged into the page's
//! resources, and overlay operands naming a renamed resource are rewritten.

use super::deep_copy::Copier;
use super::resource_manager::ResourceManager;
use crate::audit;
use crate::content::{page_content, page_resources, rename_resources};
use crate::document::Document;
use crate::error::Result;
use crate::geometry::Rect;
use crate::object::{Dictionary, Object, ObjectRef};

/// A ready-made content fragment to draw on a page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overlay {
    /// Content stream bytes, unencoded
    pub content: Vec<u8>,
    /// Resources the content refers to
    pub resources: Dictionary,
    /// Clip rectangle; drawing outside it is discarded
    pub bbox: Option<Rect>,
}

impl Overlay {
    /// Overlay with no resources and no clip.
    pub fn new(content: impl Into<Vec<u8>>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    /// Set the resources.
    pub fn with_resources(mut self, resources: Dictionary) -> Self {
        self.resources = resources;
        self
    }

    /// Clip to `bbox`.
    pub fn with_bbox(mut self, bbox: Rect) -> Self {
        self.bbox = Some(bbox);
        self
    }
}

/// `/Contents` of a page as a list of stream references.
fn contents_list(doc: &mut Document, page: ObjectRef) -> Vec<Object> {
    let raw = doc
        .get(page)
        .and_then(Object::as_dict)
        .and_then(|d| d.get("Contents"))
        .cloned();
    match raw {
        Some(Object::Reference(r)) => match doc.resolve_ref(r) {
            Object::Array(items) => items.clone(),
            _ => vec![Object::Reference(r)],
        },
        Some(Object::Array(items)) => items,
        Some(stream @ Object::Stream { .. }) => vec![Object::Reference(doc.add_object(stream))],
        _ => Vec::new(),
    }
}

fn wrap_overlay(content: &[u8], bbox: Option<Rect>) -> Vec<u8> {
    let mut out = b"Q\nq\n".to_vec();
    if let Some(b) = bbox {
        out.extend_from_slice(format!("{} {} {} {} re W n\n", b.x, b.y, b.width, b.height).as_bytes());
    }
    out.extend_from_slice(content);
    out.extend_from_slice(b"\nQ\n");
    out
}

/// Draw `content` on `page`. `resources` must refer to objects of `doc`.
fn apply(doc: &mut Document, page: ObjectRef, content: &[u8], resources: &Dictionary, bbox: Option<Rect>) {
    let mut manager = ResourceManager::from_resources(doc, &page_resources(doc, page));
    let renames = manager.merge(doc, resources);
    if !renames.is_empty() {
        log::debug!("composite onto {} renamed {:?}", page, renames);
    }
    let content = rename_resources(content, &renames);

    let mut contents = contents_list(doc, page);
    let open = doc.add_object(Object::stream(Dictionary::new(), &b"q\n"[..]));
    let overlay = doc.add_object(Object::stream(Dictionary::new(), wrap_overlay(&content, bbox)));
    contents.insert(0, Object::Reference(open));
    contents.push(Object::Reference(overlay));

    if let Some(d) = doc.get_mut(page).and_then(Object::as_dict_mut) {
        d.insert("Contents".into(), Object::Array(contents));
        d.insert("Resources".into(), Object::Dictionary(manager.into_resources()));
    }
}

/// Draw page `overlay_page` on top of page `target` of the same document.
pub fn composite(doc: &mut Document, target: usize, overlay_page: usize) -> Result<()> {
    let result = composite_page(doc, target, overlay_page);
    audit::record("composite", result, Some(doc.page_count()))
}

/// [`composite`] without the audit event.
pub(crate) fn composite_page(doc: &mut Document, target: usize, overlay_page: usize) -> Result<()> {
    doc.ensure_unlocked("composite")?;
    let target = doc.page_for("composite", target)?;
    let overlay = doc.page_for("composite", overlay_page)?;
    let content = page_content(doc, overlay.object_ref)?;
    let resources = page_resources(doc, overlay.object_ref);
    apply(doc, target.object_ref, &content, &resources, None);
    Ok(())
}

/// Draw page `overlay_page` of `source` on top of page `target` of `doc`.
///
/// The overlay's resources are deep-copied into `doc` first.
pub fn composite_from(
    doc: &mut Document,
    target: usize,
    source: &Document,
    overlay_page: usize,
) -> Result<()> {
    let result = (|| -> Result<()> {
        doc.ensure_unlocked("composite_from")?;
        source.ensure_unlocked("composite_from")?;
        let target = doc.page_for("composite_from", target)?;
        let overlay = source.page_for("composite_from", overlay_page)?;
        let content = page_content(source, overlay.object_ref)?;

        let mut copier = Copier::new(source, doc.next_object_id());
        let resources = copier.copy_value(&Object::Dictionary(page_resources(source, overlay.object_ref)));
        copier.commit(doc);
        let resources = match resources {
            Object::Dictionary(d) => d,
            _ => Dictionary::new(),
        };
        apply(doc, target.object_ref, &content, &resources, None);
        Ok(())
    })();
    audit::record("composite_from", result, Some(doc.page_count()))
}

/// Draw a prepared fragment on top of page `target`.
pub fn stamp(doc: &mut Document, target: usize, overlay: &Overlay) -> Result<()> {
    let result = stamp_page(doc, target, overlay);
    audit::record("stamp", result, Some(doc.page_count()))
}

/// [`stamp`] without the audit event.
pub(crate) fn stamp_page(doc: &mut Document, target: usize, overlay: &Overlay) -> Result<()> {
    doc.ensure_unlocked("stamp")?;
    let page = doc.page_for("stamp", target)?;
    apply(doc, page.object_ref, &overlay.content, &overlay.resources, overlay.bbox);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::content_refs;
    use crate::editor::PageEditor;
    use crate::error::Error;
    use crate::object::dict;

    fn page_with(doc: &mut Document, content: &[u8], font: ObjectRef) {
        let index = doc.page_count() + 1;
        doc.insert_blank(index).unwrap();
        let page = doc.page(index).unwrap();
        let stream = doc.add_object(Object::stream(Dictionary::new(), content.to_vec()));
        let d = doc.get_mut(page.object_ref).unwrap().as_dict_mut().unwrap();
        d.insert("Contents".into(), Object::Reference(stream));
        d.insert(
            "Resources".into(),
            Object::Dictionary(dict([(
                "Font",
                Object::Dictionary(dict([("F1", Object::Reference(font))])),
            )])),
        );
    }

    fn font(doc: &mut Document, base: &str) -> ObjectRef {
        doc.add_object(Object::Dictionary(dict([
            ("Type", Object::name("Font")),
            ("BaseFont", Object::name(base)),
        ])))
    }

    #[test]
    fn test_composite_renames_colliding_font() {
        let mut doc = Document::new();
        let helv = font(&mut doc, "Helvetica");
        let times = font(&mut doc, "Times-Roman");
        page_with(&mut doc, b"BT /F1 12 Tf (A) Tj ET", helv);
        page_with(&mut doc, b"BT /F1 12 Tf (B) Tj ET", times);

        composite(&mut doc, 1, 2).unwrap();

        let page = doc.page(1).unwrap();
        let fonts = doc.page_dict(&page).unwrap()["Resources"].as_dict().unwrap()["Font"]
            .as_dict()
            .unwrap()
            .clone();
        assert_eq!(fonts.len(), 2);
        assert_eq!(fonts["F1"].as_reference(), Some(helv));
        assert_eq!(fonts["F2"].as_reference(), Some(times));

        let content = page_content(&doc, page.object_ref).unwrap();
        assert_eq!(
            content,
            b"q\n\nBT /F1 12 Tf (A) Tj ET\nQ\nq\nBT /F2 12 Tf (B) Tj ET\nQ\n".to_vec()
        );
    }

    #[test]
    fn test_composite_shares_identical_font() {
        let mut doc = Document::new();
        let helv = font(&mut doc, "Helvetica");
        page_with(&mut doc, b"BT /F1 9 Tf (A) Tj ET", helv);
        page_with(&mut doc, b"BT /F1 9 Tf (B) Tj ET", helv);
        composite(&mut doc, 1, 2).unwrap();
        let page = doc.page(1).unwrap();
        let content = String::from_utf8(page_content(&doc, page.object_ref).unwrap()).unwrap();
        assert!(content.contains("/F1 9 Tf (B)"));
    }

    #[test]
    fn test_target_streams_untouched() {
        let mut doc = Document::new();
        let helv = font(&mut doc, "Helvetica");
        page_with(&mut doc, b"1 0 0 1 5 5 cm", helv);
        let page = doc.page(1).unwrap();
        let original = content_refs(&doc, page.object_ref)[0];
        let before = doc.get(original).cloned();
        stamp(&mut doc, 1, &Overlay::new(&b"0 g 0 0 10 10 re f"[..])).unwrap();
        assert_eq!(doc.get(original).cloned(), before);
        let refs = content_refs(&doc, page.object_ref);
        assert_eq!(refs.len(), 3);
        assert_eq!(refs[1], original);
    }

    #[test]
    fn test_composite_missing_page() {
        let mut doc = Document::new();
        doc.insert_blank(1).unwrap();
        assert!(matches!(
            composite(&mut doc, 1, 4),
            Err(Error::PageNotFound { page: 4, .. })
        ));
    }

    #[test]
    fn test_composite_from_copies_resources() {
        let mut src = Document::new();
        let times = font(&mut src, "Times-Roman");
        page_with(&mut src, b"BT /F1 10 Tf (S) Tj ET", times);

        let mut doc = Document::new();
        let helv = font(&mut doc, "Helvetica");
        page_with(&mut doc, b"BT /F1 10 Tf (D) Tj ET", helv);

        composite_from(&mut doc, 1, &src, 1).unwrap();
        let page = doc.page(1).unwrap();
        let fonts = doc.page_dict(&page).unwrap()["Resources"].as_dict().unwrap()["Font"]
            .as_dict()
            .unwrap()
            .clone();
        let copied = fonts["F2"].as_reference().unwrap();
        assert_ne!(copied, times);
        assert_eq!(
            doc.resolve_ref(copied).as_dict().unwrap()["BaseFont"].as_name(),
            Some("Times-Roman")
        );
    }
}
