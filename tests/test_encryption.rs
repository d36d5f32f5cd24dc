//! Integration tests for writing and reading encrypted files.

mod common;

use common::{expected, labelled_pdf, labels, open};
use pdf_forge::editor::PageEditor;
use pdf_forge::encryption::{decrypt, encrypt, encrypt_files, Algorithm, EncryptionConfig, Permissions};
use pdf_forge::writer::WriterConfig;
use pdf_forge::{Document, Error};
use std::fs;
use tempfile::tempdir;

const ALGORITHMS: [Algorithm; 3] = [Algorithm::Rc4_40, Algorithm::Rc4_128, Algorithm::Aes128];

fn encrypted_bytes(algorithm: Algorithm) -> Vec<u8> {
    let doc = open(&labelled_pdf(2));
    let config = EncryptionConfig::new("user", "owner").with_algorithm(algorithm);
    encrypt(&doc, &config)
        .unwrap()
        .serialize(&WriterConfig::default())
        .unwrap()
}

#[test]
fn test_user_password_unlocks_every_algorithm() {
    for algorithm in ALGORITHMS {
        let bytes = encrypted_bytes(algorithm);
        let mut doc = Document::open(&bytes).unwrap();
        assert!(doc.is_encrypted(), "{:?}", algorithm);
        doc.unlock(b"user").unwrap();
        assert!(!doc.is_encrypted());
        assert_eq!(labels(&doc), expected(&[1, 2]), "{:?}", algorithm);
    }
}

#[test]
fn test_owner_password_unlocks() {
    let doc = Document::open(&encrypted_bytes(Algorithm::Aes128)).unwrap();
    let plain = decrypt(&doc, "owner").unwrap();
    assert_eq!(labels(&plain), expected(&[1, 2]));
}

#[test]
fn test_wrong_password_is_rejected() {
    let mut doc = Document::open(&encrypted_bytes(Algorithm::Rc4_128)).unwrap();
    assert!(matches!(doc.unlock(b"guess"), Err(Error::Auth(_))));
    assert!(doc.is_encrypted());
}

#[test]
fn test_locked_document_refuses_edits() {
    let mut doc = Document::open(&encrypted_bytes(Algorithm::Aes128)).unwrap();
    assert!(matches!(doc.rotate(1, 90), Err(Error::Encryption(_))));
    assert!(matches!(
        pdf_forge::content::extract_text(&doc),
        Err(Error::Encryption(_))
    ));
}

#[test]
fn test_empty_user_password_opens_directly() {
    let doc = open(&labelled_pdf(1));
    let config = EncryptionConfig::new("", "owner").with_algorithm(Algorithm::Rc4_128);
    let bytes = encrypt(&doc, &config)
        .unwrap()
        .serialize(&WriterConfig::default())
        .unwrap();
    let reopened = Document::open(&bytes).unwrap();
    assert!(!reopened.is_encrypted());
    assert_eq!(labels(&reopened), expected(&[1]));
}

#[test]
fn test_decrypted_copy_can_be_edited_and_saved() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("plain.pdf");

    let locked = Document::open(&encrypted_bytes(Algorithm::Rc4_40)).unwrap();
    let mut doc = decrypt(&locked, "user").unwrap();
    doc.remove(&[1]).unwrap();
    doc.save(&path, &WriterConfig::default()).unwrap();

    let reopened = Document::load(&path).unwrap();
    assert!(!reopened.is_encrypted());
    assert_eq!(labels(&reopened), expected(&[2]));
}

#[test]
fn test_permissions_are_written() {
    let doc = open(&labelled_pdf(1));
    let permissions = Permissions::PRINT | Permissions::ACCESSIBILITY;
    let config = EncryptionConfig::new("user", "owner").with_permissions(permissions);
    let encrypted = encrypt(&doc, &config).unwrap();
    assert_eq!(encrypted.encrypt_dict().permissions(), permissions);
}

#[test]
fn test_encrypt_files_batch() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.pdf");
    let output = dir.path().join("out.pdf");
    let missing = dir.path().join("missing.pdf");
    fs::write(&input, labelled_pdf(1)).unwrap();

    let config = EncryptionConfig::new("pw", "");
    encrypt_files(&[(&input, &output)], &config, &WriterConfig::default()).unwrap();
    let mut doc = Document::load(&output).unwrap();
    doc.unlock(b"pw").unwrap();
    assert_eq!(labels(&doc), expected(&[1]));

    let result = encrypt_files(&[(&missing, &output)], &config, &WriterConfig::default());
    assert!(matches!(result, Err(Error::Input { .. })));
}
