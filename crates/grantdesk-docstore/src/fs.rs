// grantdesk-docstore/src/fs.rs
// ============================================================================
// Module: Filesystem Document Store
// Description: DocumentStore implementation writing PDFs under a root dir.
// Purpose: Validate, persist, and delete proposal documents atomically.
// Dependencies: grantdesk-core, rand
// ============================================================================

//! ## Overview
//! Stores each accepted document as `<root>/<key>` where the key is a random
//! 128-bit hex name with a `.pdf` suffix. Uploads are rejected before any
//! disk write when the declared content type is not `application/pdf`, the
//! payload exceeds [`MAX_DOCUMENT_BYTES`], or the bytes do not start with
//! the PDF magic prefix. Writes go to a `.tmp` sibling first and are renamed
//! into place. Keys are validated on delete so a handle can never escape the
//! root directory.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use grantdesk_core::DocumentError;
use grantdesk_core::DocumentStore;
use grantdesk_core::DocumentUpload;
use grantdesk_core::MAX_DOCUMENT_BYTES;
use grantdesk_core::PDF_CONTENT_TYPE;
use grantdesk_core::StoredDocument;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Leading bytes every PDF document must carry.
const PDF_MAGIC: &[u8] = b"%PDF-";
/// Suffix attached to every stored document key.
const KEY_SUFFIX: &str = ".pdf";
/// Suffix used for in-flight temporary writes.
const TEMP_SUFFIX: &str = ".tmp";

// ============================================================================
// SECTION: Store
// ============================================================================

/// Filesystem-backed document store.
#[derive(Debug)]
pub struct FsDocumentStore {
    /// Directory holding every stored document.
    root: PathBuf,
    /// Public URL prefix under which documents are served.
    public_base_url: String,
}

impl FsDocumentStore {
    /// Opens a document store rooted at `root`, creating the directory when
    /// absent. `public_base_url` is the URL prefix joined with each key to
    /// form the stable document URL.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Failed`] when the root directory cannot be
    /// created.
    pub fn new(
        root: impl Into<PathBuf>,
        public_base_url: impl Into<String>,
    ) -> Result<Self, DocumentError> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .map_err(|err| DocumentError::Failed(format!("create document root: {err}")))?;
        Ok(Self {
            root,
            public_base_url: public_base_url.into(),
        })
    }

    /// Returns the directory holding stored documents.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the on-disk path for a stored key.
    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    /// Returns the public URL for a stored key.
    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }
}

impl DocumentStore for FsDocumentStore {
    fn store(&self, upload: &DocumentUpload) -> Result<StoredDocument, DocumentError> {
        validate_upload(upload)?;
        let key = format!("{:032x}{KEY_SUFFIX}", rand::random::<u128>());
        let final_path = self.path_for(&key);
        let temp_path = self.path_for(&format!("{key}{TEMP_SUFFIX}"));
        std::fs::write(&temp_path, &upload.bytes)
            .map_err(|err| DocumentError::Failed(format!("write document: {err}")))?;
        if let Err(err) = std::fs::rename(&temp_path, &final_path) {
            // Leftover temp files are harmless but unserved; sweep this one.
            let _ = std::fs::remove_file(&temp_path);
            return Err(DocumentError::Failed(format!("publish document: {err}")));
        }
        Ok(StoredDocument {
            url: self.url_for(&key),
            key,
        })
    }

    fn delete(&self, key: &str) -> Result<(), DocumentError> {
        if !is_valid_key(key) {
            return Err(DocumentError::NotFound(key.to_string()));
        }
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(DocumentError::NotFound(key.to_string()))
            }
            Err(err) => Err(DocumentError::Failed(format!("delete document: {err}"))),
        }
    }
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Validates an upload against the document contract.
fn validate_upload(upload: &DocumentUpload) -> Result<(), DocumentError> {
    if upload.content_type != PDF_CONTENT_TYPE {
        return Err(DocumentError::Rejected(format!(
            "unsupported content type: {}",
            upload.content_type
        )));
    }
    if upload.bytes.is_empty() {
        return Err(DocumentError::Rejected("document is empty".to_string()));
    }
    if upload.bytes.len() > MAX_DOCUMENT_BYTES {
        return Err(DocumentError::Rejected(format!(
            "document exceeds {MAX_DOCUMENT_BYTES} bytes"
        )));
    }
    if !upload.bytes.starts_with(PDF_MAGIC) {
        return Err(DocumentError::Rejected(
            "document content is not a PDF".to_string(),
        ));
    }
    Ok(())
}

/// Returns true when a key matches the shape this store issues.
///
/// Keys are lowercase hex plus the `.pdf` suffix; anything else (path
/// separators, dot segments, foreign names) is treated as nonexistent.
fn is_valid_key(key: &str) -> bool {
    let Some(stem) = key.strip_suffix(KEY_SUFFIX) else {
        return false;
    };
    !stem.is_empty() && stem.chars().all(|ch| ch.is_ascii_hexdigit() && !ch.is_ascii_uppercase())
}
