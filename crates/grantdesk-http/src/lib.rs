// grantdesk-http/src/lib.rs
// ============================================================================
// Module: Grantdesk HTTP
// Description: Versioned REST surface over the lifecycle engine.
// Purpose: Expose proposals, calls, users, and admin operations via axum.
// Dependencies: grantdesk-core, axum, tokio, argon2, sha2, subtle
// ============================================================================

//! ## Overview
//! This crate fronts the lifecycle engine with an `/api/v1` REST surface.
//! Requests authenticate with bearer session tokens issued at login; the
//! identity service owns password hashing (argon2id), session fingerprints
//! (sha256), and the single-use reset and verification token flows. Engine
//! and identity errors map to stable machine-readable kinds with
//! conventional status codes; internal detail is logged server-side, never
//! returned to the caller.

/// Identity service: registration, sessions, and token flows.
pub mod auth;
/// API error taxonomy and response mapping.
pub mod error;
/// Router, application state, and request handlers.
pub mod server;

pub use auth::IdentityError;
pub use auth::IdentityService;
pub use auth::Registration;
pub use error::ApiError;
pub use server::AppEngine;
pub use server::AppState;
pub use server::build_router;
pub use server::serve;
