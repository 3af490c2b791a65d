// grantdesk-core/src/core/user.rs
// ============================================================================
// Module: Grantdesk User Model
// Description: User accounts, roles, sessions, and password resets.
// Purpose: Define the identity records consumed by the access layer.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Users carry a closed [`Role`] enumeration and an opaque password hash.
//! Plaintext passwords never appear in these records; the access layer hands
//! the storage port a finished salted hash. Sessions and password resets are
//! stored as hashed token fingerprints only.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::UserId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Role
// ============================================================================

/// Caller role gating every mutating operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Researchers own proposals and submit against calls.
    Researcher,
    /// Admins manage calls, review proposals, and administer users.
    Admin,
}

impl Role {
    /// Returns the canonical wire label for the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Researcher => "RESEARCHER",
            Self::Admin => "ADMIN",
        }
    }

    /// Parses a role label, rejecting anything outside the closed set.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "RESEARCHER" => Some(Self::Researcher),
            "ADMIN" => Some(Self::Admin),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: User
// ============================================================================

/// A registered portal user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User identifier.
    pub id: UserId,
    /// Display name.
    pub full_name: String,
    /// Unique login email.
    pub email: String,
    /// Salted irreversible password hash (argon2id PHC string).
    pub password_hash: String,
    /// Caller role.
    pub role: Role,
    /// Whether the email address has been verified.
    pub verified: bool,
    /// Creation time.
    pub created_at: Timestamp,
}

/// Authenticated caller identity attached to every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Authenticated user identifier.
    pub user_id: UserId,
    /// Authenticated role.
    pub role: Role,
}

impl Identity {
    /// Returns true when the identity carries the admin role.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }
}

// ============================================================================
// SECTION: Session
// ============================================================================

/// Server-side session record for a bearer token.
///
/// Only the sha256 fingerprint of the token is stored; the token itself is
/// returned once at login and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Lowercase hex sha256 fingerprint of the bearer token.
    pub token_fingerprint: String,
    /// Owning user.
    pub user_id: UserId,
    /// Expiry time; sessions past this instant fail closed.
    pub expires_at: Timestamp,
    /// Issue time.
    pub created_at: Timestamp,
}

// ============================================================================
// SECTION: Password Reset
// ============================================================================

/// Single-use password reset record; at most one live reset per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordReset {
    /// Owning user (unique key).
    pub user_id: UserId,
    /// Lowercase hex sha256 fingerprint of the reset token.
    pub token_fingerprint: String,
    /// Expiry time.
    pub expires_at: Timestamp,
}

// ============================================================================
// SECTION: Email Verification
// ============================================================================

/// Single-use email verification record; at most one live token per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailVerification {
    /// Owning user (unique key).
    pub user_id: UserId,
    /// Lowercase hex sha256 fingerprint of the verification token.
    pub token_fingerprint: String,
    /// Expiry time.
    pub expires_at: Timestamp,
}
