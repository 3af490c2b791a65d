// grantdesk-http/src/error.rs
// ============================================================================
// Module: API Errors
// Description: Stable error kinds and HTTP response mapping.
// Purpose: Map engine and identity failures to JSON error responses.
// Dependencies: grantdesk-core, axum, serde, serde_json
// ============================================================================

//! ## Overview
//! Every failed request returns `{"error": {"kind", "message"}}` with a
//! stable machine-readable kind. Internal failures (storage, upload backend,
//! worker) return a generic message; the detail is emitted as a JSON line to
//! stderr so operators see it and callers do not.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use grantdesk_core::EngineError;
use serde::Serialize;

use crate::auth::IdentityError;

// ============================================================================
// SECTION: API Error
// ============================================================================

/// A request failure carrying a status code and a stable kind.
#[derive(Debug, Clone)]
pub struct ApiError {
    /// HTTP status to respond with.
    pub status: StatusCode,
    /// Stable machine-readable kind.
    pub kind: &'static str,
    /// Human-readable message safe to return to the caller.
    pub message: String,
}

impl ApiError {
    /// Builds an error from its parts.
    #[must_use]
    pub fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }

    /// Builds a 500 with a generic caller-facing message, logging `detail`
    /// server-side.
    #[must_use]
    pub fn internal(detail: impl Into<String>) -> Self {
        log_internal("internal", &detail.into());
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", "internal server error")
    }

    /// Builds a 400 validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION", message)
    }

    /// Builds a 401 for a missing or invalid session.
    #[must_use]
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHENTICATED", message)
    }

    /// Builds a 404 for an unknown resource.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }
}

// ============================================================================
// SECTION: Response Mapping
// ============================================================================

/// Wire shape of an error response body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    /// Error payload.
    error: ErrorDetail,
}

/// Wire shape of the error payload.
#[derive(Debug, Serialize)]
struct ErrorDetail {
    /// Stable machine-readable kind.
    kind: &'static str,
    /// Human-readable message.
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                kind: self.kind,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(error: EngineError) -> Self {
        match error {
            EngineError::Validation(message) => Self::validation(message),
            EngineError::NotFound(message) => Self::not_found(message),
            EngineError::Forbidden(message) => {
                Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
            }
            EngineError::InvalidState(message) => {
                Self::new(StatusCode::CONFLICT, "INVALID_STATE", message)
            }
            EngineError::Conflict(message) => {
                Self::new(StatusCode::CONFLICT, "CONFLICT", message)
            }
            EngineError::UploadFailed(detail) => {
                log_internal("upload_failed", &detail);
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "UPLOAD_FAILED",
                    "document storage failed",
                )
            }
            EngineError::Store(detail) => Self::internal(detail),
        }
    }
}

impl From<IdentityError> for ApiError {
    fn from(error: IdentityError) -> Self {
        match error {
            IdentityError::DuplicateUser(message) => {
                Self::new(StatusCode::CONFLICT, "DUPLICATE_USER", message)
            }
            IdentityError::InvalidCredentials => Self::new(
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
                "invalid email or password",
            ),
            IdentityError::Unauthenticated(message) => Self::unauthenticated(message),
            IdentityError::Validation(message) => Self::validation(message),
            IdentityError::NotFound(message) => Self::not_found(message),
            IdentityError::Hash(detail) | IdentityError::Store(detail) => Self::internal(detail),
        }
    }
}

// ============================================================================
// SECTION: Internal Logging
// ============================================================================

/// Server-side error event emitted for internal failures.
#[derive(Debug, Serialize)]
struct InternalErrorEvent<'a> {
    /// Fixed event discriminator.
    event: &'static str,
    /// Milliseconds since the Unix epoch.
    timestamp_ms: u128,
    /// Failure category.
    category: &'static str,
    /// Failure detail withheld from the caller.
    detail: &'a str,
}

/// Emits an internal failure as a JSON line to stderr.
fn log_internal(category: &'static str, detail: &str) {
    let event = InternalErrorEvent {
        event: "api_internal_error",
        timestamp_ms: SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis(),
        category,
        detail,
    };
    if let Ok(payload) = serde_json::to_string(&event) {
        let _ = writeln!(std::io::stderr(), "{payload}");
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test fixtures use explicit asserts and unwraps for clarity."
    )]

    use super::*;

    #[test]
    fn engine_errors_map_to_expected_statuses() {
        let cases = [
            (EngineError::Validation("bad".into()), StatusCode::BAD_REQUEST, "VALIDATION"),
            (EngineError::NotFound("gone".into()), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (EngineError::Forbidden("no".into()), StatusCode::FORBIDDEN, "FORBIDDEN"),
            (EngineError::InvalidState("held".into()), StatusCode::CONFLICT, "INVALID_STATE"),
            (EngineError::Conflict("raced".into()), StatusCode::CONFLICT, "CONFLICT"),
        ];
        for (error, status, kind) in cases {
            let mapped = ApiError::from(error);
            assert_eq!(mapped.status, status);
            assert_eq!(mapped.kind, kind);
        }
    }

    #[test]
    fn internal_errors_hide_detail_from_the_caller() {
        let mapped = ApiError::from(EngineError::Store("sqlite exploded at row 7".into()));
        assert_eq!(mapped.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(mapped.kind, "INTERNAL");
        assert!(!mapped.message.contains("sqlite"));

        let upload = ApiError::from(EngineError::UploadFailed("disk path /srv/x".into()));
        assert_eq!(upload.kind, "UPLOAD_FAILED");
        assert!(!upload.message.contains("/srv"));
    }

    #[test]
    fn credential_failures_are_indistinguishable() {
        let mapped = ApiError::from(IdentityError::InvalidCredentials);
        assert_eq!(mapped.status, StatusCode::UNAUTHORIZED);
        assert_eq!(mapped.message, "invalid email or password");
    }
}
