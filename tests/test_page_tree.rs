//! Integration tests for page tree editing on parsed files.

mod common;

use common::{build_pdf, expected, label_content, labelled_pdf, labels, nested_pdf, open, stream};
use pdf_forge::object::{Object, ObjectRef};
use pdf_forge::editor::{extract_pages, merge, merge_files, split, PageEditor, PageMove};
use pdf_forge::geometry::Rect;
use pdf_forge::writer::{serialize, WriterConfig};
use pdf_forge::{Document, Error};
use std::fs;
use tempfile::tempdir;

fn reopen(doc: &Document) -> Document {
    let bytes = serialize(doc, &WriterConfig::default()).unwrap();
    Document::open(&bytes).unwrap()
}

mod structure_tests {
    use super::*;

    #[test]
    fn test_parsed_fixture_order() {
        let doc = open(&labelled_pdf(3));
        assert_eq!(doc.page_count(), 3);
        assert_eq!(labels(&doc), expected(&[1, 2, 3]));
    }

    #[test]
    fn test_insert_blank_inherits_media_box() {
        let mut doc = open(&labelled_pdf(2));
        assert_eq!(doc.insert_blank(2).unwrap(), 2);
        let doc = reopen(&doc);
        assert_eq!(doc.page_count(), 3);
        assert_eq!(doc.dimensions(2).unwrap(), (612.0, 792.0));
        assert_eq!(labels(&doc), vec!["Page 1".to_string(), String::new(), "Page 2".to_string()]);
    }

    #[test]
    fn test_remove_then_save() {
        let mut doc = open(&labelled_pdf(4));
        assert_eq!(doc.remove(&[2, 4, 9]).unwrap(), 2);
        let doc = reopen(&doc);
        assert_eq!(labels(&doc), expected(&[1, 3]));
    }

    #[test]
    fn test_remove_nothing_valid_is_rejected() {
        let mut doc = open(&labelled_pdf(2));
        assert!(matches!(doc.remove(&[0, 7]), Err(Error::InvalidArgument { .. })));
        assert_eq!(doc.page_count(), 2);
    }

    #[test]
    fn test_duplicate_is_independent() {
        let mut doc = open(&labelled_pdf(2));
        doc.duplicate(1, 2, 3).unwrap();
        assert_eq!(labels(&doc), expected(&[1, 2, 1, 1]));

        let copy = doc.page(3).unwrap().object_ref;
        let original = doc.page(1).unwrap().object_ref;
        assert_ne!(copy, original);

        doc.rotate(3, 90).unwrap();
        assert_eq!(doc.page_info(1).unwrap().rotation, 0);
        assert_eq!(doc.page_info(4).unwrap().rotation, 0);
        assert_eq!(reopen(&doc).page_info(3).unwrap().rotation, 90);
    }

    fn page_object_count(doc: &Document) -> usize {
        doc.objects()
            .filter(|(_, o)| o.as_dict().and_then(|d| d.get("Type")).and_then(Object::as_name) == Some("Page"))
            .count()
    }

    fn link_dest(doc: &Document, page: usize) -> ObjectRef {
        let page = doc.page(page).unwrap();
        let annots = doc.page_dict(&page).unwrap()["Annots"].as_array().unwrap();
        let link = doc.resolve(&annots[0]).as_dict().unwrap();
        doc.resolve(&link["Dest"]).as_array().unwrap()[0].as_reference().unwrap()
    }

    #[test]
    fn test_duplicate_keeps_links_to_other_pages() {
        let mut objects = vec![
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            "<< /Type /Pages /Kids [4 0 R 6 0 R 8 0 R] /Count 3 /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 3 0 R >> >> >>"
                .to_string(),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
        ];
        for i in 0..3 {
            let annots = if i == 0 { " /Annots [10 0 R]" } else { "" };
            objects.push(format!("<< /Type /Page /Parent 2 0 R /Contents {} 0 R{} >>", 5 + 2 * i, annots));
            objects.push(stream(&label_content(&format!("Page {}", i + 1))));
        }
        objects.push("<< /Type /Annot /Subtype /Link /Rect [72 700 200 720] /Dest [8 0 R /Fit] >>".to_string());
        let mut doc = open(&build_pdf(&objects));
        let third = doc.page(3).unwrap().object_ref;
        assert_eq!(link_dest(&doc, 1), third);

        doc.duplicate(1, 1, 2).unwrap();
        assert_eq!(labels(&doc), expected(&[1, 1, 2, 3]));
        assert_eq!(page_object_count(&doc), 4);
        assert_ne!(doc.page(2).unwrap().object_ref, doc.page(1).unwrap().object_ref);
        assert_eq!(link_dest(&doc, 2), third);
        assert_eq!(link_dest(&doc, 1), third);
    }

    #[test]
    fn test_reorder_and_move() {
        let mut doc = open(&labelled_pdf(4));
        doc.reorder(&[4, 3, 2, 1]).unwrap();
        assert_eq!(labels(&doc), expected(&[4, 3, 2, 1]));

        doc.move_pages(&PageMove::Swap(1, 4)).unwrap();
        assert_eq!(labels(&doc), expected(&[1, 3, 2, 4]));

        doc.move_pages(&PageMove::MoveTo { from: 1, to: 9 }).unwrap();
        assert_eq!(labels(&doc), expected(&[3, 2, 4, 1]));
    }

    #[test]
    fn test_reorder_rejects_duplicates() {
        let mut doc = open(&labelled_pdf(3));
        assert!(matches!(doc.reorder(&[1, 1, 2]), Err(Error::InvalidArgument { .. })));
        assert!(matches!(doc.reorder(&[1, 2]), Err(Error::InvalidArgument { .. })));
        assert_eq!(labels(&doc), expected(&[1, 2, 3]));
    }

    #[test]
    fn test_crop_written_to_leaf() {
        let mut doc = open(&labelled_pdf(1));
        doc.crop(1, Rect::new(10.0, 10.0, 200.0, 300.0)).unwrap();
        let doc = reopen(&doc);
        let page = doc.page(1).unwrap();
        let crop = doc.page_dict(&page).unwrap()["CropBox"].clone();
        assert_eq!(Rect::from_object(&crop), Some(Rect::new(10.0, 10.0, 200.0, 300.0)));
        assert!(matches!(
            doc.clone().crop(1, Rect::new(0.0, 0.0, 0.0, 5.0)),
            Err(Error::InvalidArgument { .. })
        ));
    }
}

mod inheritance_tests {
    use super::*;

    #[test]
    fn test_nested_tree_attributes() {
        let doc = open(&nested_pdf());
        assert_eq!(doc.page_count(), 3);
        assert_eq!(doc.page_info(1).unwrap().rotation, 90);
        assert_eq!(doc.dimensions(2).unwrap(), (420.0, 595.0));
        assert_eq!(doc.page_info(3).unwrap().rotation, 0);
        assert_eq!(doc.dimensions(3).unwrap(), (612.0, 792.0));
    }

    #[test]
    fn test_rotate_adds_to_inherited_value() {
        let mut doc = open(&nested_pdf());
        assert_eq!(doc.rotate(1, 90).unwrap(), 180);
        assert_eq!(doc.page_info(2).unwrap().rotation, 90);
        assert_eq!(doc.rotate(3, -90).unwrap(), 270);
    }

    #[test]
    fn test_flattening_keeps_appearance() {
        let mut doc = open(&nested_pdf());
        doc.reorder(&[3, 2, 1]).unwrap();
        let doc = reopen(&doc);
        assert_eq!(labels(&doc), expected(&[3, 2, 1]));
        assert_eq!(doc.page_info(1).unwrap().rotation, 0);
        assert_eq!(doc.page_info(2).unwrap().rotation, 90);
        assert_eq!(doc.dimensions(3).unwrap(), (420.0, 595.0));
    }

    #[test]
    fn test_remove_from_intermediate_node() {
        let mut doc = open(&nested_pdf());
        doc.remove(&[1]).unwrap();
        let doc = reopen(&doc);
        assert_eq!(labels(&doc), expected(&[2, 3]));
        assert_eq!(doc.page_info(1).unwrap().rotation, 90);
    }
}

mod multi_document_tests {
    use super::*;

    #[test]
    fn test_split_halves() {
        let doc = open(&labelled_pdf(5));
        let (a, b) = split(&doc, 2).unwrap();
        assert_eq!(labels(&reopen(&a)), expected(&[1, 2]));
        assert_eq!(labels(&reopen(&b)), expected(&[3, 4, 5]));
        assert!(matches!(split(&doc, 5), Err(Error::InvalidArgument { .. })));
        assert!(matches!(split(&doc, 0), Err(Error::InvalidArgument { .. })));
    }

    #[test]
    fn test_merge_keeps_order_and_resources() {
        let a = open(&labelled_pdf(2));
        let b = open(&nested_pdf());
        let merged = reopen(&merge(&[&a, &b]).unwrap());
        assert_eq!(labels(&merged), expected(&[1, 2, 1, 2, 3]));
        assert_eq!(merged.page_info(3).unwrap().rotation, 90);
    }

    #[test]
    fn test_extract_pages_repeats_as_copies() {
        let doc = open(&labelled_pdf(3));
        let out = extract_pages(&doc, &[3, 1, 3]).unwrap();
        assert_eq!(labels(&out), expected(&[3, 1, 3]));
        let first = out.page(1).unwrap().object_ref;
        let last = out.page(3).unwrap().object_ref;
        assert_ne!(first, last);
    }

    #[test]
    fn test_merge_files_reports_failing_input() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("good.pdf");
        let bad = dir.path().join("bad.pdf");
        fs::write(&good, labelled_pdf(1)).unwrap();
        fs::write(&bad, b"not a pdf").unwrap();

        let merged = merge_files(&[&good, &good]).unwrap();
        assert_eq!(merged.page_count(), 2);

        match merge_files(&[&good, &bad]) {
            Err(Error::Input { path, .. }) => assert_eq!(path, bad),
            other => panic!("expected input error, got {:?}", other.map(|d| d.page_count())),
        }
    }
}
