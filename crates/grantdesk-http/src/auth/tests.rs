// grantdesk-http/src/auth/tests.rs
// ============================================================================
// Module: Identity Service Tests
// Description: Unit tests for registration, sessions, and token flows.
// Purpose: Exercise the identity service against the in-memory storage.
// Dependencies: grantdesk-core
// ============================================================================

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test fixtures use explicit asserts and unwraps for clarity."
)]

use std::sync::Arc;

use grantdesk_core::InMemoryStorage;
use grantdesk_core::RecordingNotifier;
use grantdesk_core::Role;
use grantdesk_core::SharedStorage;
use grantdesk_core::Storage;
use grantdesk_core::Timestamp;

use super::IdentityError;
use super::IdentityService;
use super::Registration;

/// Session lifetime used by the fixtures.
const SESSION_TTL_MS: i64 = 60_000;
/// Token lifetime used by the fixtures.
const RESET_TTL_MS: i64 = 30_000;

/// Builds a service over fresh in-memory storage plus its recorder.
fn service() -> (IdentityService<SharedStorage>, SharedStorage, Arc<RecordingNotifier>) {
    let storage = SharedStorage::from_store(InMemoryStorage::new());
    let recorder = Arc::new(RecordingNotifier::new());
    let identity = IdentityService::new(
        storage.clone(),
        Box::new(Arc::clone(&recorder)),
        SESSION_TTL_MS,
        RESET_TTL_MS,
    );
    (identity, storage, recorder)
}

/// A well-formed registration payload.
fn registration(email: &str) -> Registration {
    Registration {
        full_name: "Ada Lovelace".to_string(),
        email: email.to_string(),
        password: "correct horse".to_string(),
        role: None,
    }
}

#[test]
fn registration_defaults_to_researcher_and_normalizes_email() {
    let (identity, _storage, _recorder) = service();
    let registered = identity
        .register(&registration("  Ada@Example.COM "), Timestamp(1_000))
        .unwrap();
    assert_eq!(registered.user.email, "ada@example.com");
    assert_eq!(registered.user.role, Role::Researcher);
    assert!(!registered.user.verified);
    assert!(!registered.verification_token.is_empty());
}

#[test]
fn duplicate_registration_is_rejected() {
    let (identity, _storage, _recorder) = service();
    let now = Timestamp(1_000);
    identity.register(&registration("ada@example.com"), now).unwrap();
    let result = identity.register(&registration("ada@example.com"), now);
    assert!(matches!(result, Err(IdentityError::DuplicateUser(_))));
}

#[test]
fn malformed_registrations_fail_validation() {
    let (identity, _storage, _recorder) = service();
    let now = Timestamp(1_000);
    let mut missing_name = registration("ada@example.com");
    missing_name.full_name = "   ".to_string();
    assert!(matches!(
        identity.register(&missing_name, now),
        Err(IdentityError::Validation(_))
    ));
    let mut bad_email = registration("not-an-email");
    bad_email.email = "not-an-email".to_string();
    assert!(matches!(
        identity.register(&bad_email, now),
        Err(IdentityError::Validation(_))
    ));
    let mut short_password = registration("ada@example.com");
    short_password.password = "short".to_string();
    assert!(matches!(
        identity.register(&short_password, now),
        Err(IdentityError::Validation(_))
    ));
}

#[test]
fn login_issues_a_usable_session() {
    let (identity, _storage, _recorder) = service();
    let now = Timestamp(1_000);
    let registered = identity.register(&registration("ada@example.com"), now).unwrap();
    let logged_in = identity
        .login("ada@example.com", "correct horse", now)
        .unwrap();
    let header = format!("Bearer {}", logged_in.token);
    let caller = identity
        .authenticate(Some(&header), Timestamp(2_000))
        .unwrap();
    assert_eq!(caller.user_id, registered.user.id);
    assert_eq!(caller.role, Role::Researcher);
}

#[test]
fn unknown_email_and_wrong_password_are_indistinguishable() {
    let (identity, _storage, _recorder) = service();
    let now = Timestamp(1_000);
    identity.register(&registration("ada@example.com"), now).unwrap();
    let unknown = identity.login("nobody@example.com", "correct horse", now);
    let wrong = identity.login("ada@example.com", "wrong password", now);
    assert!(matches!(unknown, Err(IdentityError::InvalidCredentials)));
    assert!(matches!(wrong, Err(IdentityError::InvalidCredentials)));
}

#[test]
fn expired_sessions_are_rejected_and_deleted() {
    let (identity, storage, _recorder) = service();
    let now = Timestamp(1_000);
    identity.register(&registration("ada@example.com"), now).unwrap();
    let logged_in = identity.login("ada@example.com", "correct horse", now).unwrap();
    let header = format!("Bearer {}", logged_in.token);
    let later = Timestamp(1_000 + SESSION_TTL_MS);
    let result = identity.authenticate(Some(&header), later);
    assert!(matches!(result, Err(IdentityError::Unauthenticated(_))));
    assert_eq!(storage.delete_expired_sessions(later).unwrap(), 0);
}

#[test]
fn malformed_bearer_headers_are_rejected() {
    let (identity, _storage, _recorder) = service();
    let now = Timestamp(1_000);
    for header in [None, Some(""), Some("Basic abc"), Some("Bearer"), Some("Bearer ")] {
        let result = identity.authenticate(header, now);
        assert!(
            matches!(result, Err(IdentityError::Unauthenticated(_))),
            "header {header:?} should be rejected"
        );
    }
}

#[test]
fn logout_revokes_the_session() {
    let (identity, _storage, _recorder) = service();
    let now = Timestamp(1_000);
    identity.register(&registration("ada@example.com"), now).unwrap();
    let logged_in = identity.login("ada@example.com", "correct horse", now).unwrap();
    let header = format!("Bearer {}", logged_in.token);
    identity.logout(Some(&header)).unwrap();
    let result = identity.authenticate(Some(&header), now);
    assert!(matches!(result, Err(IdentityError::Unauthenticated(_))));
}

#[test]
fn verification_token_marks_the_user_verified_once() {
    let (identity, storage, _recorder) = service();
    let now = Timestamp(1_000);
    let registered = identity.register(&registration("ada@example.com"), now).unwrap();
    identity.verify_email(&registered.verification_token, now).unwrap();
    let user = storage.user_by_id(&registered.user.id).unwrap().unwrap();
    assert!(user.verified);
    let replay = identity.verify_email(&registered.verification_token, now);
    assert!(matches!(replay, Err(IdentityError::Validation(_))));
}

#[test]
fn expired_verification_token_is_rejected() {
    let (identity, _storage, _recorder) = service();
    let now = Timestamp(1_000);
    let registered = identity.register(&registration("ada@example.com"), now).unwrap();
    let later = Timestamp(1_000 + RESET_TTL_MS);
    let result = identity.verify_email(&registered.verification_token, later);
    assert!(matches!(result, Err(IdentityError::Validation(_))));
}

#[test]
fn password_reset_round_trip_changes_the_password() {
    let (identity, _storage, _recorder) = service();
    let now = Timestamp(1_000);
    identity.register(&registration("ada@example.com"), now).unwrap();
    let token = identity
        .forgot_password("ada@example.com", now)
        .unwrap()
        .expect("known email should yield a token");
    identity.reset_password(&token, "new password!", now).unwrap();
    assert!(matches!(
        identity.login("ada@example.com", "correct horse", now),
        Err(IdentityError::InvalidCredentials)
    ));
    identity.login("ada@example.com", "new password!", now).unwrap();
    let replay = identity.reset_password(&token, "another password", now);
    assert!(matches!(replay, Err(IdentityError::Validation(_))));
}

#[test]
fn forgot_password_does_not_reveal_unknown_emails() {
    let (identity, _storage, _recorder) = service();
    let token = identity
        .forgot_password("nobody@example.com", Timestamp(1_000))
        .unwrap();
    assert!(token.is_none());
}

#[test]
fn tampered_reset_token_is_rejected() {
    let (identity, _storage, _recorder) = service();
    let now = Timestamp(1_000);
    identity.register(&registration("ada@example.com"), now).unwrap();
    let token = identity.forgot_password("ada@example.com", now).unwrap().unwrap();
    let (user_id, _secret) = token.split_once('.').unwrap();
    let forged = format!("{user_id}.{}", "A".repeat(43));
    let result = identity.reset_password(&forged, "new password!", now);
    assert!(matches!(result, Err(IdentityError::Validation(_))));
}

#[test]
fn profile_update_notifies_the_user() {
    let (identity, _storage, recorder) = service();
    let now = Timestamp(1_000);
    let registered = identity.register(&registration("ada@example.com"), now).unwrap();
    let logged_in = identity.login("ada@example.com", "correct horse", now).unwrap();
    let header = format!("Bearer {}", logged_in.token);
    let caller = identity.authenticate(Some(&header), now).unwrap();
    let updated = identity
        .update_profile(&caller, Some("Ada King"), None)
        .unwrap();
    assert_eq!(updated.full_name, "Ada King");
    let requests = recorder.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].recipient.as_ref(), Some(&registered.user.id));
}

#[test]
fn empty_profile_update_is_rejected() {
    let (identity, _storage, _recorder) = service();
    let now = Timestamp(1_000);
    let registered = identity.register(&registration("ada@example.com"), now).unwrap();
    let caller = grantdesk_core::Identity {
        user_id: registered.user.id,
        role: Role::Researcher,
    };
    let result = identity.update_profile(&caller, None, None);
    assert!(matches!(result, Err(IdentityError::Validation(_))));
}

#[test]
fn role_update_promotes_a_user() {
    let (identity, _storage, _recorder) = service();
    let now = Timestamp(1_000);
    let registered = identity.register(&registration("ada@example.com"), now).unwrap();
    let updated = identity.set_role(&registered.user.id, Role::Admin).unwrap();
    assert_eq!(updated.role, Role::Admin);
}
