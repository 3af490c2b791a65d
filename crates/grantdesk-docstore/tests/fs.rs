// grantdesk-docstore/tests/fs.rs
// ============================================================================
// Module: Filesystem Document Store Tests
// Description: Contract tests for FsDocumentStore.
// Purpose: Verify validation, atomic persistence, and safe deletion.
// Dependencies: grantdesk-core, grantdesk-docstore, tempfile
// ============================================================================

//! ## Overview
//! Exercises the filesystem store through the [`DocumentStore`] port:
//! acceptance of valid PDFs, rejection of oversized or mistyped payloads,
//! and key validation on delete.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use grantdesk_core::DocumentError;
use grantdesk_core::DocumentStore;
use grantdesk_core::DocumentUpload;
use grantdesk_core::MAX_DOCUMENT_BYTES;
use grantdesk_core::PDF_CONTENT_TYPE;
use grantdesk_docstore::FsDocumentStore;
use tempfile::TempDir;

/// Opens a store rooted in a fresh temporary directory.
fn open_store(dir: &TempDir) -> FsDocumentStore {
    FsDocumentStore::new(dir.path().join("documents"), "/documents")
        .expect("store should open")
}

/// Builds a minimal valid PDF upload.
fn pdf_upload() -> DocumentUpload {
    DocumentUpload {
        file_name: "proposal.pdf".to_string(),
        content_type: PDF_CONTENT_TYPE.to_string(),
        bytes: b"%PDF-1.7 minimal body".to_vec(),
    }
}

#[test]
fn stores_and_serves_a_valid_pdf() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let stored = store.store(&pdf_upload()).unwrap();

    assert!(stored.key.ends_with(".pdf"));
    assert_eq!(stored.url, format!("/documents/{}", stored.key));
    let on_disk = std::fs::read(store.root().join(&stored.key)).unwrap();
    assert_eq!(on_disk, pdf_upload().bytes);
}

#[test]
fn each_upload_gets_a_distinct_key() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let first = store.store(&pdf_upload()).unwrap();
    let second = store.store(&pdf_upload()).unwrap();
    assert_ne!(first.key, second.key);
}

#[test]
fn rejects_wrong_content_type() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let mut upload = pdf_upload();
    upload.content_type = "text/plain".to_string();
    let result = store.store(&upload);
    assert!(matches!(result, Err(DocumentError::Rejected(_))));
}

#[test]
fn rejects_non_pdf_bytes() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let mut upload = pdf_upload();
    upload.bytes = b"GIF89a not a pdf".to_vec();
    let result = store.store(&upload);
    assert!(matches!(result, Err(DocumentError::Rejected(_))));
}

#[test]
fn rejects_empty_and_oversized_payloads() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let mut empty = pdf_upload();
    empty.bytes.clear();
    assert!(matches!(store.store(&empty), Err(DocumentError::Rejected(_))));

    let mut oversized = pdf_upload();
    oversized.bytes.resize(MAX_DOCUMENT_BYTES + 1, 0);
    assert!(matches!(store.store(&oversized), Err(DocumentError::Rejected(_))));

    // Nothing should have been written for rejected uploads.
    let entries = std::fs::read_dir(store.root()).unwrap().count();
    assert_eq!(entries, 0);
}

#[test]
fn exactly_max_size_is_accepted() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let mut upload = pdf_upload();
    upload.bytes.resize(MAX_DOCUMENT_BYTES, 0);
    assert!(store.store(&upload).is_ok());
}

#[test]
fn delete_removes_the_document() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let stored = store.store(&pdf_upload()).unwrap();

    store.delete(&stored.key).unwrap();
    assert!(!store.root().join(&stored.key).exists());

    let again = store.delete(&stored.key);
    assert!(matches!(again, Err(DocumentError::NotFound(_))));
}

#[test]
fn delete_refuses_keys_outside_the_issued_shape() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    for key in ["../escape.pdf", "nested/file.pdf", "UPPER.pdf", "", "plain", ".pdf"] {
        let result = store.delete(key);
        assert!(matches!(result, Err(DocumentError::NotFound(_))), "key {key:?}");
    }
}
