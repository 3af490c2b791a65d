// grantdesk-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Storage
// Description: Durable Storage backend using SQLite WAL.
// Purpose: Provide production-grade persistence for Grantdesk entities.
// Dependencies: grantdesk-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides the SQLite-backed [`grantdesk_core::Storage`]
//! implementation. It keeps a normalized relational schema with foreign-key
//! enforcement, performs single-row compare-and-swap status transitions, and
//! records revisions transactionally so a proposal's document pointer and
//! status never diverge from its revision history.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqliteJournalMode;
pub use store::SqliteStorage;
pub use store::SqliteStorageConfig;
pub use store::SqliteStoreError;
pub use store::SqliteSyncMode;
