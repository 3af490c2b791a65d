// grantdesk-core/src/lib.rs
// ============================================================================
// Module: Grantdesk Core Library
// Description: Public API surface for the Grantdesk core.
// Purpose: Expose domain types, port interfaces, and the lifecycle engine.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Grantdesk core owns the proposal lifecycle state machine and its
//! invariants. It is backend-agnostic and integrates with storage, document
//! stores, and notifiers through explicit interfaces rather than embedding
//! any HTTP framework or database driver.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::DocumentError;
pub use interfaces::MAX_DOCUMENT_BYTES;
pub use interfaces::PDF_CONTENT_TYPE;
pub use interfaces::DocumentStore;
pub use interfaces::DocumentUpload;
pub use interfaces::Notifier;
pub use interfaces::NotifyRequest;
pub use interfaces::SharedStorage;
pub use interfaces::Storage;
pub use interfaces::StoreError;
pub use interfaces::StoredDocument;
pub use runtime::CallPatch;
pub use runtime::DashboardStats;
pub use runtime::EngineError;
pub use runtime::InMemoryStorage;
pub use runtime::LifecycleEngine;
pub use runtime::MemoryDocumentStore;
pub use runtime::NewCall;
pub use runtime::NewProposal;
pub use runtime::NewRevision;
pub use runtime::ProposalDetail;
pub use runtime::RecordingNotifier;
pub use runtime::ReviewDecision;
