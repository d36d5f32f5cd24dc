//! Image XObject export.
//!
//! Images are handed out as stored: still encoded, with the filter chain
//! that decodes them. DCT and JPX payloads are complete JPEG and JPEG 2000
//! files; other payloads need the image dictionary to be interpreted.

use super::page_resources;
use crate::audit;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use bytes::Bytes;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Forms nested deeper than this are not searched for images.
const MAX_FORM_DEPTH: usize = 16;

/// One image XObject found on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedImage {
    /// 1-based page index
    pub page: usize,
    /// Resource name the image is drawn under
    pub name: String,
    /// Image object, `None` for a direct stream
    pub object_ref: Option<ObjectRef>,
    /// `/Width` in samples
    pub width: Option<u32>,
    /// `/Height` in samples
    pub height: Option<u32>,
    /// `/BitsPerComponent`
    pub bits_per_component: Option<u8>,
    /// `/ColorSpace` family, e.g. `DeviceRGB` or `ICCBased`
    pub color_space: Option<String>,
    /// Filter chain, outermost first
    pub filters: Vec<String>,
    /// Stream payload, still encoded
    pub data: Bytes,
}

impl ExtractedImage {
    /// File extension matching the payload's format.
    pub fn extension(&self) -> &'static str {
        match self.filters.last().map(String::as_str) {
            Some("DCTDecode") => "jpg",
            Some("JPXDecode") => "jp2",
            Some("CCITTFaxDecode") => "tiff",
            Some("JBIG2Decode") => "jb2",
            _ => "raw",
        }
    }
}

fn to_u32(doc: &Document, d: &Dictionary, key: &str) -> Option<u32> {
    d.get(key)
        .map(|o| doc.resolve(o))
        .and_then(Object::as_integer)
        .and_then(|v| u32::try_from(v).ok())
}

fn color_space(doc: &Document, d: &Dictionary) -> Option<String> {
    match d.get("ColorSpace").map(|o| doc.resolve(o))? {
        Object::Name(n) => Some(n.clone()),
        Object::Array(items) => items.first().and_then(Object::as_name).map(str::to_string),
        _ => None,
    }
}

struct Collector<'a> {
    doc: &'a Document,
    page: usize,
    seen: HashSet<ObjectRef>,
    images: Vec<ExtractedImage>,
}

impl Collector<'_> {
    fn walk(&mut self, resources: &Dictionary, depth: usize) {
        let doc = self.doc;
        let Some(xobjects) = resources.get("XObject").map(|x| doc.resolve(x)).and_then(Object::as_dict) else {
            return;
        };
        let mut entries: Vec<_> = xobjects.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        for (name, entry) in entries {
            let object_ref = entry.as_reference();
            if let Some(r) = object_ref {
                if !self.seen.insert(r) {
                    continue;
                }
            }
            let Object::Stream { dict, data } = doc.resolve(entry) else {
                continue;
            };
            match dict.get("Subtype").and_then(Object::as_name) {
                Some("Image") => self.images.push(ExtractedImage {
                    page: self.page,
                    name: name.clone(),
                    object_ref,
                    width: to_u32(doc, dict, "Width"),
                    height: to_u32(doc, dict, "Height"),
                    bits_per_component: to_u32(doc, dict, "BitsPerComponent").and_then(|v| u8::try_from(v).ok()),
                    color_space: color_space(doc, dict),
                    filters: doc.resolve(entry).filters(),
                    data: data.clone(),
                }),
                Some("Form") if depth < MAX_FORM_DEPTH => {
                    if let Some(inner) = dict.get("Resources").map(|r| doc.resolve(r)).and_then(Object::as_dict) {
                        self.walk(inner, depth + 1);
                    }
                },
                Some("Form") => log::warn!("form {} nested too deep, skipping its images", name),
                _ => {},
            }
        }
    }
}

fn collect(doc: &Document) -> Result<Vec<ExtractedImage>> {
    doc.ensure_unlocked("extract_images")?;
    let mut images = Vec::new();
    for handle in doc.pages() {
        let mut collector = Collector {
            doc,
            page: handle.index,
            seen: HashSet::new(),
            images: Vec::new(),
        };
        collector.walk(&page_resources(doc, handle.object_ref), 0);
        images.append(&mut collector.images);
    }
    Ok(images)
}

/// Every image XObject reachable from each page's resources, in page
/// order and by resource name within a page.
///
/// An image used by several pages is listed once per page.
pub fn extract_images(doc: &Document) -> Result<Vec<ExtractedImage>> {
    let result = collect(doc);
    audit::record("extract_images", result, Some(doc.page_count()))
}

/// Write every image to `dir` as `page_<n>_image_<i>.<ext>`, numbering
/// images across the whole document from 1. Returns the written paths.
pub fn save_images(doc: &Document, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let result = (|| -> Result<Vec<PathBuf>> {
        let images = collect(doc)?;
        std::fs::create_dir_all(dir).map_err(|e| Error::from(e).for_input(dir))?;
        let mut written = Vec::with_capacity(images.len());
        for (i, image) in images.iter().enumerate() {
            let path = dir.join(format!("page_{}_image_{}.{}", image.page, i + 1, image.extension()));
            std::fs::write(&path, &image.data).map_err(|e| Error::from(e).for_input(&path))?;
            log::debug!("wrote {} ({} bytes)", path.display(), image.data.len());
            written.push(path);
        }
        Ok(written)
    })();
    let pages = Some(doc.page_count());
    audit::record_file("save_images", dir, result, pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::PageEditor;
    use crate::object::dict;

    fn image(doc: &mut Document, filter: &str, data: &'static [u8]) -> ObjectRef {
        doc.add_object(Object::stream(
            dict([
                ("Type", Object::name("XObject")),
                ("Subtype", Object::name("Image")),
                ("Width", Object::Integer(2)),
                ("Height", Object::Integer(1)),
                ("BitsPerComponent", Object::Integer(8)),
                ("ColorSpace", Object::name("DeviceGray")),
                ("Filter", Object::name(filter)),
            ]),
            data,
        ))
    }

    fn set_xobjects(doc: &mut Document, page: usize, xobjects: Dictionary) {
        let page = doc.page(page).unwrap().object_ref;
        doc.get_mut(page).unwrap().as_dict_mut().unwrap().insert(
            "Resources".into(),
            Object::Dictionary(dict([("XObject", Object::Dictionary(xobjects))])),
        );
    }

    #[test]
    fn test_images_keep_encoded_payload() {
        let mut doc = Document::new();
        doc.insert_blank(1).unwrap();
        let jpeg = image(&mut doc, "DCTDecode", b"\xFF\xD8\xFF\xE0jpeg");
        set_xobjects(&mut doc, 1, dict([("Im0", Object::Reference(jpeg))]));

        let images = extract_images(&doc).unwrap();
        assert_eq!(images.len(), 1);
        let im = &images[0];
        assert_eq!((im.page, im.name.as_str()), (1, "Im0"));
        assert_eq!(im.object_ref, Some(jpeg));
        assert_eq!((im.width, im.height, im.bits_per_component), (Some(2), Some(1), Some(8)));
        assert_eq!(im.color_space.as_deref(), Some("DeviceGray"));
        assert_eq!(im.filters, vec!["DCTDecode".to_string()]);
        assert_eq!(&im.data[..], b"\xFF\xD8\xFF\xE0jpeg");
        assert_eq!(im.extension(), "jpg");
    }

    #[test]
    fn test_images_inside_forms_are_found() {
        let mut doc = Document::new();
        doc.insert_blank(1).unwrap();
        doc.insert_blank(2).unwrap();
        let flate = image(&mut doc, "FlateDecode", b"x");
        let form = doc.add_object(Object::stream(
            dict([
                ("Subtype", Object::name("Form")),
                (
                    "Resources",
                    Object::Dictionary(dict([(
                        "XObject",
                        Object::Dictionary(dict([("Inner", Object::Reference(flate))])),
                    )])),
                ),
            ]),
            &b"/Inner Do"[..],
        ));
        set_xobjects(&mut doc, 2, dict([("Fm0", Object::Reference(form))]));

        let images = extract_images(&doc).unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].page, 2);
        assert_eq!(images[0].name, "Inner");
        assert_eq!(images[0].extension(), "raw");
    }

    #[test]
    fn test_save_images_names_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = Document::new();
        doc.insert_blank(1).unwrap();
        let a = image(&mut doc, "DCTDecode", b"a");
        let b = image(&mut doc, "JPXDecode", b"b");
        set_xobjects(
            &mut doc,
            1,
            dict([("Im1", Object::Reference(a)), ("Im2", Object::Reference(b))]),
        );

        let written = save_images(&doc, dir.path().join("out")).unwrap();
        let names: Vec<String> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["page_1_image_1.jpg", "page_1_image_2.jp2"]);
        assert_eq!(std::fs::read(&written[1]).unwrap(), b"b");
    }
}
