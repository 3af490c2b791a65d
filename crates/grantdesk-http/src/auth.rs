// grantdesk-http/src/auth.rs
// ============================================================================
// Module: Identity Service
// Description: Registration, login sessions, and single-use token flows.
// Purpose: Fail-closed authentication for every API request.
// Dependencies: grantdesk-core, argon2, base64, rand, sha2, subtle
// ============================================================================

//! ## Overview
//! The identity service owns every credential concern the engine stays out
//! of: argon2id password hashing, bearer session issuance and verification,
//! and the single-use password-reset and email-verification tokens. Tokens
//! are never persisted; storage holds only sha256 fingerprints, and
//! fingerprint comparisons are constant-time. Credential failures are
//! deliberately indistinguishable (unknown email and wrong password both
//! return [`IdentityError::InvalidCredentials`]).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Write as _;

use argon2::Argon2;
use argon2::PasswordHash;
use argon2::PasswordHasher;
use argon2::PasswordVerifier;
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use grantdesk_core::EmailVerification;
use grantdesk_core::Identity;
use grantdesk_core::Notifier;
use grantdesk_core::NotifyRequest;
use grantdesk_core::PasswordReset;
use grantdesk_core::Role;
use grantdesk_core::Session;
use grantdesk_core::Storage;
use grantdesk_core::StoreError;
use grantdesk_core::Timestamp;
use grantdesk_core::User;
use grantdesk_core::UserId;
use rand::RngCore;
use sha2::Digest;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted authorization header size.
const MAX_AUTH_HEADER_BYTES: usize = 8 * 1024;
/// Random bytes behind each issued token.
const TOKEN_BYTES: usize = 32;
/// Minimum accepted password length.
const MIN_PASSWORD_LENGTH: usize = 8;
/// Maximum accepted password length (argon2 input cap).
const MAX_PASSWORD_LENGTH: usize = 512;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Identity service errors.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// A user with this email already exists.
    #[error("duplicate user: {0}")]
    DuplicateUser(String),
    /// Unknown email or wrong password; deliberately indistinguishable.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// Missing, malformed, expired, or revoked session.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    /// Request payload failed validation.
    #[error("validation: {0}")]
    Validation(String),
    /// Referenced user does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Password hashing backend failure.
    #[error("hash failure: {0}")]
    Hash(String),
    /// Storage backend failure.
    #[error("storage: {0}")]
    Store(String),
}

impl From<StoreError> for IdentityError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(message) => Self::DuplicateUser(message),
            StoreError::Io(message)
            | StoreError::Constraint(message)
            | StoreError::Invalid(message)
            | StoreError::Store(message) => Self::Store(message),
        }
    }
}

// ============================================================================
// SECTION: Inputs and Outputs
// ============================================================================

/// Input for registering a new user.
#[derive(Debug, Clone)]
pub struct Registration {
    /// Display name.
    pub full_name: String,
    /// Login email; must be unique.
    pub email: String,
    /// Plaintext password; hashed immediately, never stored or logged.
    pub password: String,
    /// Requested role; defaults to researcher.
    pub role: Option<Role>,
}

/// A registered user plus their single-use email verification token.
#[derive(Debug, Clone)]
pub struct Registered {
    /// The created user.
    pub user: User,
    /// Verification token to deliver out of band.
    pub verification_token: String,
}

/// A logged-in user plus their bearer session token.
#[derive(Debug, Clone)]
pub struct LoggedIn {
    /// The authenticated user.
    pub user: User,
    /// Bearer token; shown once, stored only as a fingerprint.
    pub token: String,
}

// ============================================================================
// SECTION: Identity Service
// ============================================================================

/// Authentication and account service over the storage port.
pub struct IdentityService<S> {
    /// Storage backend for users, sessions, and token rows.
    storage: S,
    /// Notifier for account-change messages.
    notifier: Box<dyn Notifier>,
    /// Session lifetime in milliseconds.
    session_ttl_ms: i64,
    /// Reset and verification token lifetime in milliseconds.
    reset_ttl_ms: i64,
}

impl<S: Storage> IdentityService<S> {
    /// Builds an identity service with the given token lifetimes.
    #[must_use]
    pub fn new(
        storage: S,
        notifier: Box<dyn Notifier>,
        session_ttl_ms: i64,
        reset_ttl_ms: i64,
    ) -> Self {
        Self {
            storage,
            notifier,
            session_ttl_ms,
            reset_ttl_ms,
        }
    }

    /// Registers a new user and issues their email verification token.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::DuplicateUser`] for a taken email and
    /// [`IdentityError::Validation`] for malformed input.
    pub fn register(
        &self,
        input: &Registration,
        now: Timestamp,
    ) -> Result<Registered, IdentityError> {
        let full_name = require_text("full_name", &input.full_name)?;
        let email = require_email(&input.email)?;
        require_password(&input.password)?;
        let password_hash = hash_password(&input.password)?;
        let user = User {
            id: UserId::generate(),
            full_name,
            email,
            password_hash,
            role: input.role.unwrap_or(Role::Researcher),
            verified: false,
            created_at: now,
        };
        self.storage.create_user(&user)?;

        let secret = random_token();
        self.storage.upsert_email_verification(&EmailVerification {
            user_id: user.id.clone(),
            token_fingerprint: fingerprint(&secret),
            expires_at: now.plus_millis(self.reset_ttl_ms),
        })?;
        Ok(Registered {
            verification_token: compose_token(&user.id, &secret),
            user,
        })
    }

    /// Authenticates an email/password pair and issues a session.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::InvalidCredentials`] for an unknown email or
    /// wrong password.
    pub fn login(
        &self,
        email: &str,
        password: &str,
        now: Timestamp,
    ) -> Result<LoggedIn, IdentityError> {
        let user = self
            .storage
            .user_by_email(email.trim())?
            .ok_or(IdentityError::InvalidCredentials)?;
        if !verify_password(&user.password_hash, password) {
            return Err(IdentityError::InvalidCredentials);
        }
        let token = random_token();
        self.storage.create_session(&Session {
            token_fingerprint: fingerprint(&token),
            user_id: user.id.clone(),
            expires_at: now.plus_millis(self.session_ttl_ms),
            created_at: now,
        })?;
        Ok(LoggedIn {
            user,
            token,
        })
    }

    /// Resolves a bearer header into an authenticated identity.
    ///
    /// Expired sessions are deleted on sight.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Unauthenticated`] for a missing, malformed,
    /// unknown, or expired session.
    pub fn authenticate(
        &self,
        auth_header: Option<&str>,
        now: Timestamp,
    ) -> Result<Identity, IdentityError> {
        let token = parse_bearer_token(auth_header)?;
        let session = self
            .storage
            .session_by_fingerprint(&fingerprint(&token))?
            .ok_or_else(|| IdentityError::Unauthenticated("invalid session".to_string()))?;
        if session.expires_at.as_millis() <= now.as_millis() {
            self.storage.delete_session(&session.token_fingerprint)?;
            return Err(IdentityError::Unauthenticated("session expired".to_string()));
        }
        let user = self
            .storage
            .user_by_id(&session.user_id)?
            .ok_or_else(|| IdentityError::Unauthenticated("invalid session".to_string()))?;
        Ok(Identity {
            user_id: user.id,
            role: user.role,
        })
    }

    /// Loads the full user record behind an identity.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::NotFound`] when the user row is gone.
    pub fn current_user(&self, identity: &Identity) -> Result<User, IdentityError> {
        self.storage
            .user_by_id(&identity.user_id)?
            .ok_or_else(|| IdentityError::NotFound(format!("user {}", identity.user_id)))
    }

    /// Deletes the session behind a bearer header (logout).
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Unauthenticated`] for a malformed header.
    pub fn logout(&self, auth_header: Option<&str>) -> Result<(), IdentityError> {
        let token = parse_bearer_token(auth_header)?;
        self.storage.delete_session(&fingerprint(&token))?;
        Ok(())
    }

    /// Consumes an email verification token and marks the user verified.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Validation`] for an invalid or expired
    /// token; the reasons are deliberately not distinguished.
    pub fn verify_email(&self, token: &str, now: Timestamp) -> Result<(), IdentityError> {
        let (user_id, secret) = split_token(token)?;
        let record = self
            .storage
            .email_verification_by_user(&user_id)?
            .ok_or_else(invalid_token)?;
        check_token(&record.token_fingerprint, &secret, record.expires_at, now)?;
        self.storage.set_user_verified(&user_id)?;
        self.storage.delete_email_verification(&user_id)?;
        Ok(())
    }

    /// Issues a single-use password reset token for an email.
    ///
    /// Returns `None` for an unknown email so the endpoint can answer
    /// identically either way (no account enumeration).
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Store`] when persistence fails.
    pub fn forgot_password(
        &self,
        email: &str,
        now: Timestamp,
    ) -> Result<Option<String>, IdentityError> {
        let Some(user) = self.storage.user_by_email(email.trim())? else {
            return Ok(None);
        };
        let secret = random_token();
        self.storage.upsert_password_reset(&PasswordReset {
            user_id: user.id.clone(),
            token_fingerprint: fingerprint(&secret),
            expires_at: now.plus_millis(self.reset_ttl_ms),
        })?;
        Ok(Some(compose_token(&user.id, &secret)))
    }

    /// Consumes a reset token and replaces the user's password.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Validation`] for an invalid or expired
    /// token or a malformed new password.
    pub fn reset_password(
        &self,
        token: &str,
        new_password: &str,
        now: Timestamp,
    ) -> Result<(), IdentityError> {
        require_password(new_password)?;
        let (user_id, secret) = split_token(token)?;
        let record = self.storage.password_reset_by_user(&user_id)?.ok_or_else(invalid_token)?;
        check_token(&record.token_fingerprint, &secret, record.expires_at, now)?;
        let password_hash = hash_password(new_password)?;
        if !self.storage.update_user_password(&user_id, &password_hash)? {
            return Err(invalid_token());
        }
        self.storage.delete_password_reset(&user_id)?;
        Ok(())
    }

    /// Updates the caller's profile and notifies them of the change.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Validation`] for an empty patch or a
    /// malformed email and [`IdentityError::DuplicateUser`] for a taken one.
    pub fn update_profile(
        &self,
        identity: &Identity,
        full_name: Option<&str>,
        email: Option<&str>,
    ) -> Result<User, IdentityError> {
        if full_name.is_none() && email.is_none() {
            return Err(IdentityError::Validation("nothing to update".to_string()));
        }
        let full_name = match full_name {
            Some(value) => Some(require_text("full_name", value)?),
            None => None,
        };
        let email = match email {
            Some(value) => Some(require_email(value)?),
            None => None,
        };
        let user = self
            .storage
            .update_user_profile(&identity.user_id, full_name.as_deref(), email.as_deref())?
            .ok_or_else(|| IdentityError::NotFound(format!("user {}", identity.user_id)))?;
        self.notifier.notify(NotifyRequest::to_user(
            user.id.clone(),
            "Your profile was updated.",
        ));
        Ok(user)
    }

    /// Replaces a user's role (admin operation).
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::NotFound`] for an unknown user.
    pub fn set_role(&self, user_id: &UserId, role: Role) -> Result<User, IdentityError> {
        self.storage
            .update_user_role(user_id, role)?
            .ok_or_else(|| IdentityError::NotFound(format!("user {user_id}")))
    }

    /// Deletes every expired session (startup and periodic sweep).
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Store`] when the sweep fails.
    pub fn sweep_sessions(&self, now: Timestamp) -> Result<u64, IdentityError> {
        Ok(self.storage.delete_expired_sessions(now)?)
    }
}

// ============================================================================
// SECTION: Token Helpers
// ============================================================================

/// Generates a 32-byte base64url token.
fn random_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Returns the lowercase hex sha256 fingerprint of a token.
fn fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    let mut out = String::with_capacity(64);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Joins a user id and secret into a deliverable single-use token.
fn compose_token(user_id: &UserId, secret: &str) -> String {
    format!("{}.{secret}", user_id.as_str())
}

/// Splits a single-use token into its user id and secret.
fn split_token(token: &str) -> Result<(UserId, String), IdentityError> {
    let trimmed = token.trim();
    if trimmed.len() > MAX_AUTH_HEADER_BYTES {
        return Err(invalid_token());
    }
    let (user_id, secret) = trimmed.split_once('.').ok_or_else(invalid_token)?;
    if user_id.is_empty() || secret.is_empty() {
        return Err(invalid_token());
    }
    Ok((UserId::new(user_id), secret.to_string()))
}

/// Verifies a single-use token secret against its stored record.
fn check_token(
    stored_fingerprint: &str,
    secret: &str,
    expires_at: Timestamp,
    now: Timestamp,
) -> Result<(), IdentityError> {
    let presented = fingerprint(secret);
    let matches: bool = presented.as_bytes().ct_eq(stored_fingerprint.as_bytes()).into();
    if !matches || expires_at.as_millis() <= now.as_millis() {
        return Err(invalid_token());
    }
    Ok(())
}

/// The uniform error for every bad single-use token.
fn invalid_token() -> IdentityError {
    IdentityError::Validation("invalid or expired token".to_string())
}

/// Extracts the token from a `Bearer` authorization header.
fn parse_bearer_token(auth_header: Option<&str>) -> Result<String, IdentityError> {
    let header = auth_header
        .ok_or_else(|| IdentityError::Unauthenticated("missing authorization".to_string()))?;
    if header.len() > MAX_AUTH_HEADER_BYTES {
        return Err(IdentityError::Unauthenticated(
            "authorization header too large".to_string(),
        ));
    }
    let mut parts = header.trim().splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().unwrap_or_default().trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(IdentityError::Unauthenticated(
            "invalid authorization header".to_string(),
        ));
    }
    Ok(token.to_string())
}

// ============================================================================
// SECTION: Password Helpers
// ============================================================================

/// Hashes a password with argon2id and a fresh salt.
fn hash_password(password: &str) -> Result<String, IdentityError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| IdentityError::Hash(err.to_string()))
}

/// Verifies a password against a stored PHC hash string.
fn verify_password(stored_hash: &str, password: &str) -> bool {
    PasswordHash::new(stored_hash).is_ok_and(|parsed| {
        Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
    })
}

// ============================================================================
// SECTION: Validation Helpers
// ============================================================================

/// Requires a non-empty trimmed string field.
fn require_text(field: &str, value: &str) -> Result<String, IdentityError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(IdentityError::Validation(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

/// Requires a plausibly shaped email address.
fn require_email(value: &str) -> Result<String, IdentityError> {
    let trimmed = value.trim();
    let well_formed = trimmed
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !well_formed {
        return Err(IdentityError::Validation("email is malformed".to_string()));
    }
    Ok(trimmed.to_lowercase())
}

/// Requires a password inside the accepted length band.
fn require_password(password: &str) -> Result<(), IdentityError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(IdentityError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(IdentityError::Validation("password is too long".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests;
