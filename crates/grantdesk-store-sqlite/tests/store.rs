// grantdesk-store-sqlite/tests/store.rs
// ============================================================================
// Module: SQLite Storage Tests
// Description: Durability and relational-integrity tests for SqliteStorage.
// Purpose: Verify persistence across reopen, CAS transitions, and FK rules.
// Dependencies: grantdesk-core, grantdesk-store-sqlite, tempfile
// ============================================================================

//! ## Overview
//! Exercises the `SQLite` store through the [`Storage`] port: reopen
//! persistence, unique-email enforcement, compare-and-swap status updates,
//! transactional revision recording, restrict-on-delete for calls, and
//! wildcard-safe search.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use grantdesk_core::CallForProposal;
use grantdesk_core::CallId;
use grantdesk_core::Notification;
use grantdesk_core::PageRequest;
use grantdesk_core::PasswordReset;
use grantdesk_core::Proposal;
use grantdesk_core::ProposalFilter;
use grantdesk_core::ProposalId;
use grantdesk_core::ProposalRevision;
use grantdesk_core::ProposalStatus;
use grantdesk_core::RevisionId;
use grantdesk_core::Role;
use grantdesk_core::Session;
use grantdesk_core::Storage;
use grantdesk_core::StoreError;
use grantdesk_core::Timestamp;
use grantdesk_core::User;
use grantdesk_core::UserId;
use grantdesk_store_sqlite::SqliteJournalMode;
use grantdesk_store_sqlite::SqliteStorage;
use grantdesk_store_sqlite::SqliteStorageConfig;
use grantdesk_store_sqlite::SqliteSyncMode;
use tempfile::TempDir;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Opens a store rooted in the given temporary directory.
fn open_store(dir: &TempDir) -> SqliteStorage {
    let config = SqliteStorageConfig {
        path: dir.path().join("grantdesk.db"),
        busy_timeout_ms: 1_000,
        journal_mode: SqliteJournalMode::Wal,
        sync_mode: SqliteSyncMode::Normal,
    };
    SqliteStorage::new(&config).expect("store should open")
}

/// Builds a user fixture.
fn user(id: &str, email: &str, role: Role) -> User {
    User {
        id: UserId::new(id),
        full_name: format!("User {id}"),
        email: email.to_string(),
        password_hash: "$argon2id$stub".to_string(),
        role,
        verified: true,
        created_at: Timestamp(1_000),
    }
}

/// Builds a call fixture owned by `created_by`.
fn call(id: &str, created_by: &str, deadline: i64) -> CallForProposal {
    CallForProposal {
        id: CallId::new(id),
        title: format!("Call {id}"),
        description: "A funding opportunity.".to_string(),
        deadline: Timestamp(deadline),
        created_by: UserId::new(created_by),
        created_at: Timestamp(1_000),
    }
}

/// Builds a proposal fixture.
fn proposal(
    id: &str,
    researcher: &str,
    call_id: &str,
    status: ProposalStatus,
    created_at: i64,
) -> Proposal {
    Proposal {
        id: ProposalId::new(id),
        researcher_id: UserId::new(researcher),
        call_id: CallId::new(call_id),
        title: format!("Proposal {id}"),
        abstract_text: "An abstract.".to_string(),
        document_url: format!("/documents/{id}.pdf"),
        document_key: format!("{id}.pdf"),
        status,
        rejection_reason: None,
        created_at: Timestamp(created_at),
    }
}

/// Seeds one researcher, one admin, and one open call.
fn seed(store: &SqliteStorage) {
    store.create_user(&user("u-alice", "alice@example.org", Role::Researcher)).unwrap();
    store.create_user(&user("u-root", "root@example.org", Role::Admin)).unwrap();
    store.create_call(&call("c-1", "u-root", 10_000)).unwrap();
}

/// Default first page.
fn first_page() -> PageRequest {
    PageRequest::new(1, 10).unwrap()
}

// ============================================================================
// SECTION: Persistence
// ============================================================================

#[test]
fn reopen_preserves_rows() {
    let dir = TempDir::new().unwrap();
    {
        let store = open_store(&dir);
        seed(&store);
        store
            .create_proposal(&proposal("p-1", "u-alice", "c-1", ProposalStatus::Submitted, 2_000))
            .unwrap();
    }
    let store = open_store(&dir);
    let found = store.user_by_email("alice@example.org").unwrap().unwrap();
    assert_eq!(found.id.as_str(), "u-alice");
    assert_eq!(found.role, Role::Researcher);
    let loaded = store.proposal_by_id(&ProposalId::new("p-1")).unwrap().unwrap();
    assert_eq!(loaded.status, ProposalStatus::Submitted);
    assert_eq!(loaded.document_key, "p-1.pdf");
}

#[test]
fn duplicate_email_is_rejected() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store.create_user(&user("u-1", "same@example.org", Role::Researcher)).unwrap();
    let result = store.create_user(&user("u-2", "same@example.org", Role::Researcher));
    assert!(matches!(result, Err(StoreError::Duplicate(_))));
}

#[test]
fn profile_update_to_taken_email_is_duplicate() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store.create_user(&user("u-1", "one@example.org", Role::Researcher)).unwrap();
    store.create_user(&user("u-2", "two@example.org", Role::Researcher)).unwrap();
    let result = store.update_user_profile(&UserId::new("u-2"), None, Some("one@example.org"));
    assert!(matches!(result, Err(StoreError::Duplicate(_))));
}

// ============================================================================
// SECTION: Status Transitions
// ============================================================================

#[test]
fn status_swap_requires_expected_state() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    seed(&store);
    store
        .create_proposal(&proposal("p-1", "u-alice", "c-1", ProposalStatus::Submitted, 2_000))
        .unwrap();

    let stale = store
        .update_proposal_status(
            &ProposalId::new("p-1"),
            ProposalStatus::UnderReview,
            ProposalStatus::Approved,
            None,
        )
        .unwrap();
    assert!(!stale);
    let unchanged = store.proposal_by_id(&ProposalId::new("p-1")).unwrap().unwrap();
    assert_eq!(unchanged.status, ProposalStatus::Submitted);

    let swapped = store
        .update_proposal_status(
            &ProposalId::new("p-1"),
            ProposalStatus::Submitted,
            ProposalStatus::UnderReview,
            None,
        )
        .unwrap();
    assert!(swapped);
}

#[test]
fn rejection_reason_is_stored_and_cleared() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    seed(&store);
    store
        .create_proposal(&proposal("p-1", "u-alice", "c-1", ProposalStatus::UnderReview, 2_000))
        .unwrap();
    store
        .update_proposal_status(
            &ProposalId::new("p-1"),
            ProposalStatus::UnderReview,
            ProposalStatus::Rejected,
            Some("Out of scope."),
        )
        .unwrap();
    let rejected = store.proposal_by_id(&ProposalId::new("p-1")).unwrap().unwrap();
    assert_eq!(rejected.rejection_reason.as_deref(), Some("Out of scope."));
}

#[test]
fn record_revision_moves_document_pointer() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    seed(&store);
    store
        .create_proposal(&proposal(
            "p-1",
            "u-alice",
            "c-1",
            ProposalStatus::RevisionRequested,
            2_000,
        ))
        .unwrap();
    let revision = ProposalRevision {
        id: RevisionId::new("r-1"),
        proposal_id: ProposalId::new("p-1"),
        revised_document_url: "/documents/r-1.pdf".to_string(),
        revised_document_key: "r-1.pdf".to_string(),
        comments: "Addressed feedback.".to_string(),
        submitted_at: Timestamp(3_000),
    };
    let recorded = store
        .record_revision(
            &revision,
            ProposalStatus::RevisionRequested,
            ProposalStatus::RevisionSubmitted,
        )
        .unwrap();
    assert!(recorded);

    let updated = store.proposal_by_id(&ProposalId::new("p-1")).unwrap().unwrap();
    assert_eq!(updated.status, ProposalStatus::RevisionSubmitted);
    assert_eq!(updated.document_key, "r-1.pdf");
    let history = store.revisions_for_proposal(&ProposalId::new("p-1")).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].comments, "Addressed feedback.");
}

#[test]
fn stale_revision_records_nothing() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    seed(&store);
    store
        .create_proposal(&proposal("p-1", "u-alice", "c-1", ProposalStatus::UnderReview, 2_000))
        .unwrap();
    let revision = ProposalRevision {
        id: RevisionId::new("r-1"),
        proposal_id: ProposalId::new("p-1"),
        revised_document_url: "/documents/r-1.pdf".to_string(),
        revised_document_key: "r-1.pdf".to_string(),
        comments: String::new(),
        submitted_at: Timestamp(3_000),
    };
    let recorded = store
        .record_revision(
            &revision,
            ProposalStatus::RevisionRequested,
            ProposalStatus::RevisionSubmitted,
        )
        .unwrap();
    assert!(!recorded);
    assert!(store.revisions_for_proposal(&ProposalId::new("p-1")).unwrap().is_empty());
    let untouched = store.proposal_by_id(&ProposalId::new("p-1")).unwrap().unwrap();
    assert_eq!(untouched.document_key, "p-1.pdf");
}

// ============================================================================
// SECTION: Relational Integrity
// ============================================================================

#[test]
fn call_with_proposals_cannot_be_deleted() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    seed(&store);
    store
        .create_proposal(&proposal("p-1", "u-alice", "c-1", ProposalStatus::Submitted, 2_000))
        .unwrap();

    let blocked = store.delete_call(&CallId::new("c-1"));
    assert!(matches!(blocked, Err(StoreError::Constraint(_))));

    assert!(store.delete_proposal(&ProposalId::new("p-1")).unwrap());
    assert!(store.delete_call(&CallId::new("c-1")).unwrap());
    assert!(store.call_by_id(&CallId::new("c-1")).unwrap().is_none());
}

#[test]
fn deleting_proposal_cascades_revisions() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    seed(&store);
    store
        .create_proposal(&proposal(
            "p-1",
            "u-alice",
            "c-1",
            ProposalStatus::RevisionRequested,
            2_000,
        ))
        .unwrap();
    let revision = ProposalRevision {
        id: RevisionId::new("r-1"),
        proposal_id: ProposalId::new("p-1"),
        revised_document_url: "/documents/r-1.pdf".to_string(),
        revised_document_key: "r-1.pdf".to_string(),
        comments: String::new(),
        submitted_at: Timestamp(3_000),
    };
    store
        .record_revision(
            &revision,
            ProposalStatus::RevisionRequested,
            ProposalStatus::RevisionSubmitted,
        )
        .unwrap();
    assert!(store.delete_proposal(&ProposalId::new("p-1")).unwrap());
    assert!(store.revisions_for_proposal(&ProposalId::new("p-1")).unwrap().is_empty());
}

// ============================================================================
// SECTION: Listing and Search
// ============================================================================

#[test]
fn list_filters_and_orders_newest_first() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    seed(&store);
    store.create_user(&user("u-bob", "bob@example.org", Role::Researcher)).unwrap();
    store
        .create_proposal(&proposal("p-1", "u-alice", "c-1", ProposalStatus::Submitted, 2_000))
        .unwrap();
    store
        .create_proposal(&proposal("p-2", "u-alice", "c-1", ProposalStatus::UnderReview, 3_000))
        .unwrap();
    store
        .create_proposal(&proposal("p-3", "u-bob", "c-1", ProposalStatus::Submitted, 4_000))
        .unwrap();

    let filter = ProposalFilter {
        researcher_id: Some(UserId::new("u-alice")),
        ..ProposalFilter::default()
    };
    let page = store.list_proposals(&filter, first_page()).unwrap();
    assert_eq!(page.pagination.total_count, 2);
    let ids: Vec<&str> = page.data.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["p-2", "p-1"]);

    let submitted = ProposalFilter {
        status: Some(ProposalStatus::Submitted),
        ..ProposalFilter::default()
    };
    assert_eq!(store.count_proposals(&submitted).unwrap(), 2);

    let counts = store.proposal_status_counts().unwrap();
    let total: u64 = counts.iter().map(|(_, count)| count).sum();
    assert_eq!(total, 3);
}

#[test]
fn second_page_continues_the_listing() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    seed(&store);
    for index in 0..5 {
        let id = format!("p-{index}");
        store
            .create_proposal(&proposal(
                &id,
                "u-alice",
                "c-1",
                ProposalStatus::Submitted,
                2_000 + index,
            ))
            .unwrap();
    }
    let request = PageRequest::new(2, 2).unwrap();
    let page = store.list_proposals(&ProposalFilter::default(), request).unwrap();
    assert_eq!(page.pagination.total_count, 5);
    assert_eq!(page.pagination.total_pages, 3);
    let ids: Vec<&str> = page.data.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["p-2", "p-1"]);
}

#[test]
fn search_treats_wildcards_as_literals() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    seed(&store);
    let mut noisy = proposal("p-1", "u-alice", "c-1", ProposalStatus::Submitted, 2_000);
    noisy.title = "100% Renewable Storage".to_string();
    store.create_proposal(&noisy).unwrap();
    let mut plain = proposal("p-2", "u-alice", "c-1", ProposalStatus::Submitted, 3_000);
    plain.title = "1000 Reasons".to_string();
    store.create_proposal(&plain).unwrap();

    let filter = ProposalFilter {
        search_term: Some("100%".to_string()),
        ..ProposalFilter::default()
    };
    let page = store.list_proposals(&filter, first_page()).unwrap();
    assert_eq!(page.data.len(), 1);
    assert_eq!(page.data[0].id.as_str(), "p-1");
}

#[test]
fn search_is_case_insensitive_over_title_and_abstract() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    seed(&store);
    let mut titled = proposal("p-1", "u-alice", "c-1", ProposalStatus::Submitted, 2_000);
    titled.title = "Quantum Sensing".to_string();
    store.create_proposal(&titled).unwrap();
    let mut abstracted = proposal("p-2", "u-alice", "c-1", ProposalStatus::Submitted, 3_000);
    abstracted.abstract_text = "A study of QUANTUM noise.".to_string();
    store.create_proposal(&abstracted).unwrap();
    let mut unrelated = proposal("p-3", "u-alice", "c-1", ProposalStatus::Submitted, 4_000);
    unrelated.title = "Soil Chemistry".to_string();
    store.create_proposal(&unrelated).unwrap();

    let filter = ProposalFilter {
        search_term: Some("quantum".to_string()),
        ..ProposalFilter::default()
    };
    assert_eq!(store.count_proposals(&filter).unwrap(), 2);
}

// ============================================================================
// SECTION: Notifications
// ============================================================================

#[test]
fn notifications_are_scoped_to_their_owner() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    seed(&store);
    let note = Notification::new(UserId::new("u-alice"), "Hello", Timestamp(2_000));
    store.create_notification(&note).unwrap();

    let foreign = store.mark_notification_read(&note.id, &UserId::new("u-root")).unwrap();
    assert!(foreign.is_none());

    let marked = store
        .mark_notification_read(&note.id, &UserId::new("u-alice"))
        .unwrap()
        .unwrap();
    assert!(marked.is_read);

    let page = store.notifications_for_user(&UserId::new("u-root"), first_page()).unwrap();
    assert!(page.data.is_empty());
}

// ============================================================================
// SECTION: Sessions and Resets
// ============================================================================

#[test]
fn expired_sessions_are_swept() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    seed(&store);
    let live = Session {
        token_fingerprint: "fp-live".to_string(),
        user_id: UserId::new("u-alice"),
        expires_at: Timestamp(9_000),
        created_at: Timestamp(1_000),
    };
    let stale = Session {
        token_fingerprint: "fp-stale".to_string(),
        user_id: UserId::new("u-alice"),
        expires_at: Timestamp(2_000),
        created_at: Timestamp(1_000),
    };
    store.create_session(&live).unwrap();
    store.create_session(&stale).unwrap();

    let removed = store.delete_expired_sessions(Timestamp(5_000)).unwrap();
    assert_eq!(removed, 1);
    assert!(store.session_by_fingerprint("fp-stale").unwrap().is_none());
    assert!(store.session_by_fingerprint("fp-live").unwrap().is_some());

    store.delete_session("fp-live").unwrap();
    assert!(store.session_by_fingerprint("fp-live").unwrap().is_none());
}

#[test]
fn password_reset_upsert_replaces_the_live_token() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    seed(&store);
    let first = PasswordReset {
        user_id: UserId::new("u-alice"),
        token_fingerprint: "fp-1".to_string(),
        expires_at: Timestamp(4_000),
    };
    let second = PasswordReset {
        user_id: UserId::new("u-alice"),
        token_fingerprint: "fp-2".to_string(),
        expires_at: Timestamp(6_000),
    };
    store.upsert_password_reset(&first).unwrap();
    store.upsert_password_reset(&second).unwrap();

    let live = store.password_reset_by_user(&UserId::new("u-alice")).unwrap().unwrap();
    assert_eq!(live.token_fingerprint, "fp-2");
    assert_eq!(live.expires_at, Timestamp(6_000));

    store.delete_password_reset(&UserId::new("u-alice")).unwrap();
    assert!(store.password_reset_by_user(&UserId::new("u-alice")).unwrap().is_none());
}

// ============================================================================
// SECTION: Users
// ============================================================================

#[test]
fn user_updates_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store.create_user(&user("u-1", "one@example.org", Role::Researcher)).unwrap();

    let renamed = store
        .update_user_profile(&UserId::new("u-1"), Some("Dr. One"), None)
        .unwrap()
        .unwrap();
    assert_eq!(renamed.full_name, "Dr. One");
    assert_eq!(renamed.email, "one@example.org");

    assert!(store.update_user_password(&UserId::new("u-1"), "$argon2id$new").unwrap());
    assert!(store.set_user_verified(&UserId::new("u-1")).unwrap());
    let promoted = store.update_user_role(&UserId::new("u-1"), Role::Admin).unwrap().unwrap();
    assert_eq!(promoted.role, Role::Admin);

    assert_eq!(store.count_users_with_role(Role::Admin).unwrap(), 1);
    assert_eq!(store.count_users_with_role(Role::Researcher).unwrap(), 0);
    assert!(store.update_user_role(&UserId::new("u-missing"), Role::Admin).unwrap().is_none());

    let listed = store.list_users(first_page()).unwrap();
    assert_eq!(listed.pagination.total_count, 1);
    assert_eq!(store.all_user_ids().unwrap().len(), 1);
}

#[test]
fn open_call_count_respects_the_deadline() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    seed(&store);
    store.create_call(&call("c-closed", "u-root", 2_000)).unwrap();
    assert_eq!(store.count_open_calls(Timestamp(5_000)).unwrap(), 1);
    assert_eq!(store.count_open_calls(Timestamp(20_000)).unwrap(), 0);

    let updated = store
        .update_call(&CallId::new("c-closed"), None, None, Some(Timestamp(30_000)))
        .unwrap()
        .unwrap();
    assert_eq!(updated.deadline, Timestamp(30_000));
    assert_eq!(store.count_open_calls(Timestamp(20_000)).unwrap(), 1);
}
