//! Integration tests for serialization and saving.

mod common;

use common::{build_pdf, expected, labelled_pdf, labels, open, stream};
use pdf_forge::editor::PageEditor;
use pdf_forge::writer::{serialize, WriterConfig};
use pdf_forge::Document;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_save_and_load_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("out.pdf");

    let mut doc = open(&labelled_pdf(3));
    doc.rotate(2, 270).unwrap();
    doc.save(&path, &WriterConfig::default()).unwrap();

    let loaded = Document::load(&path).unwrap();
    assert_eq!(labels(&loaded), expected(&[1, 2, 3]));
    assert_eq!(loaded.page_info(2).unwrap().rotation, 270);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn test_output_starts_with_header_and_ends_with_eof() {
    let doc = open(&labelled_pdf(1));
    let bytes = serialize(&doc, &WriterConfig::default().with_version("1.4")).unwrap();
    assert!(bytes.starts_with(b"%PDF-1.4\n"));
    assert!(bytes.ends_with(b"%%EOF\n"));
}

#[test]
fn test_removed_pages_are_collected() {
    let mut doc = open(&labelled_pdf(4));
    doc.remove(&[2, 3, 4]).unwrap();
    let kept = serialize(&doc, &WriterConfig::default().with_garbage_collect(false)).unwrap();
    let collected = serialize(&doc, &WriterConfig::default()).unwrap();
    assert!(collected.len() < kept.len());
    assert_eq!(Document::open(&collected).unwrap().object_count(), 5);
}

#[test]
fn test_compression_round_trip() {
    let long_text = "Lorem ipsum dolor sit amet ".repeat(40);
    let content = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", long_text);
    let bytes = build_pdf(&[
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R \
         /Resources << /Font << /F1 5 0 R >> >> >>"
            .to_string(),
        stream(&content),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ]);
    let doc = open(&bytes);
    let plain = serialize(&doc, &WriterConfig::default()).unwrap();
    let compressed = serialize(&doc, &WriterConfig::default().with_compress(true)).unwrap();
    assert!(compressed.len() < plain.len());

    let reopened = Document::open(&compressed).unwrap();
    assert_eq!(labels(&reopened), vec![long_text]);
}

#[test]
fn test_producer_and_mod_date() {
    let doc = open(&labelled_pdf(1));
    let config = WriterConfig::default()
        .with_producer("pdf_forge tests")
        .with_update_modification_date(true);
    let reopened = Document::open(&serialize(&doc, &config).unwrap()).unwrap();
    let info = reopened.metadata();
    assert_eq!(info.producer.as_deref(), Some("pdf_forge tests"));
    assert!(info.mod_date.is_some_and(|d| d.starts_with("D:")));
}

#[test]
fn test_failed_save_keeps_existing_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("missing").join("out.pdf");
    let doc = open(&labelled_pdf(1));
    assert!(doc.save(&path, &WriterConfig::default()).is_err());
    assert!(!path.exists());
}
