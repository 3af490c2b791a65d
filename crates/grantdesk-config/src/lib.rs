// grantdesk-config/src/lib.rs
// ============================================================================
// Module: Grantdesk Config Library
// Description: Canonical config model, validation, and example generation.
// Purpose: Single source of truth for grantdesk.toml semantics.
// Dependencies: grantdesk-core, grantdesk-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `grantdesk-config` defines the canonical configuration model for the
//! Grantdesk portal. Loading is strict and fail-closed: unknown values,
//! out-of-range limits, and unparseable addresses are rejected before the
//! server binds a socket.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod examples;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use examples::config_toml_example;
