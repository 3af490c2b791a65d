// grantdesk-docstore/src/lib.rs
// ============================================================================
// Module: Grantdesk Docstore
// Description: Filesystem-backed implementation of the document store port.
// Purpose: Persist proposal PDFs under a configured root directory.
// Dependencies: grantdesk-core, rand
// ============================================================================

//! ## Overview
//! This crate provides [`FsDocumentStore`], a filesystem implementation of
//! the [`grantdesk_core::DocumentStore`] port. Documents are validated
//! (content type, size, PDF magic bytes) before they touch disk, written to
//! a temporary file, and renamed into place so a crash never leaves a
//! half-written document under a served key.

/// Filesystem document store implementation.
pub mod fs;

pub use fs::FsDocumentStore;
