// grantdesk-core/tests/memory.rs
// ============================================================================
// Module: In-Memory Storage Tests
// Description: Tests for the in-memory storage backend.
// Purpose: Validate storage contract semantics engines depend on.
// Dependencies: grantdesk-core
// ============================================================================
//! ## Overview
//! Pins the storage contract behaviors the lifecycle engine relies on:
//! unique emails, compare-and-swap status updates, atomic revision
//! recording, referential restriction on call deletion, notification
//! ownership, and session expiry.

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
use grantdesk_core::InMemoryStorage;
use grantdesk_core::Notification;
use grantdesk_core::PageRequest;
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

fn user(name: &str) -> User {
    User {
        id: UserId::new(name),
        full_name: name.to_string(),
        email: format!("{name}@example.org"),
        password_hash: "hash".to_string(),
        role: Role::Researcher,
        verified: false,
        created_at: Timestamp(0),
    }
}

fn call(id: &str) -> CallForProposal {
    CallForProposal {
        id: CallId::new(id),
        title: id.to_string(),
        description: "call".to_string(),
        deadline: Timestamp(10_000),
        created_by: UserId::new("root"),
        created_at: Timestamp(0),
    }
}

fn proposal(id: &str, owner: &str, call_id: &str, created_at: i64) -> Proposal {
    Proposal {
        id: ProposalId::new(id),
        researcher_id: UserId::new(owner),
        call_id: CallId::new(call_id),
        title: id.to_string(),
        abstract_text: "abstract".to_string(),
        document_url: format!("/documents/{id}.pdf"),
        document_key: format!("{id}.pdf"),
        status: ProposalStatus::Submitted,
        rejection_reason: None,
        created_at: Timestamp(created_at),
    }
}

#[test]
fn duplicate_emails_are_refused() {
    let store = InMemoryStorage::new();
    store.create_user(&user("alice")).expect("first");
    let mut clone = user("other");
    clone.email = "alice@example.org".to_string();
    let err = store.create_user(&clone).expect_err("duplicate");
    assert!(matches!(err, StoreError::Duplicate(_)), "{err}");
}

#[test]
fn status_update_is_compare_and_swap() {
    let store = InMemoryStorage::new();
    store.create_call(&call("c1")).expect("call");
    store
        .create_proposal(&proposal("p1", "alice", "c1", 0))
        .expect("proposal");
    let id = ProposalId::new("p1");

    let swapped = store
        .update_proposal_status(
            &id,
            ProposalStatus::Submitted,
            ProposalStatus::UnderReview,
            None,
        )
        .expect("first swap");
    assert!(swapped);

    // A second writer holding the stale expected status loses.
    let swapped = store
        .update_proposal_status(
            &id,
            ProposalStatus::Submitted,
            ProposalStatus::UnderReview,
            None,
        )
        .expect("stale swap");
    assert!(!swapped);

    let row = store.proposal_by_id(&id).expect("load").expect("exists");
    assert_eq!(row.status, ProposalStatus::UnderReview);
}

#[test]
fn record_revision_moves_the_document_pointer_atomically() {
    let store = InMemoryStorage::new();
    store.create_call(&call("c1")).expect("call");
    let mut row = proposal("p1", "alice", "c1", 0);
    row.status = ProposalStatus::RevisionRequested;
    store.create_proposal(&row).expect("proposal");

    let revision = ProposalRevision {
        id: RevisionId::new("r1"),
        proposal_id: ProposalId::new("p1"),
        revised_document_url: "/documents/p1-v2.pdf".to_string(),
        revised_document_key: "p1-v2.pdf".to_string(),
        comments: String::new(),
        submitted_at: Timestamp(100),
    };
    let swapped = store
        .record_revision(
            &revision,
            ProposalStatus::RevisionRequested,
            ProposalStatus::RevisionSubmitted,
        )
        .expect("record");
    assert!(swapped);

    let row = store
        .proposal_by_id(&ProposalId::new("p1"))
        .expect("load")
        .expect("exists");
    assert_eq!(row.status, ProposalStatus::RevisionSubmitted);
    assert_eq!(row.document_key, "p1-v2.pdf");

    // A stale writer records nothing at all.
    let stale = ProposalRevision {
        id: RevisionId::new("r2"),
        submitted_at: Timestamp(200),
        ..revision
    };
    let swapped = store
        .record_revision(
            &stale,
            ProposalStatus::RevisionRequested,
            ProposalStatus::RevisionSubmitted,
        )
        .expect("stale record");
    assert!(!swapped);
    let revisions = store
        .revisions_for_proposal(&ProposalId::new("p1"))
        .expect("revisions");
    assert_eq!(revisions.len(), 1);
}

#[test]
fn calls_with_proposals_cannot_be_deleted() {
    let store = InMemoryStorage::new();
    store.create_call(&call("c1")).expect("call");
    store
        .create_proposal(&proposal("p1", "alice", "c1", 0))
        .expect("proposal");

    let err = store.delete_call(&CallId::new("c1")).expect_err("in use");
    assert!(matches!(err, StoreError::Constraint(_)), "{err}");

    store.delete_proposal(&ProposalId::new("p1")).expect("delete proposal");
    assert!(store.delete_call(&CallId::new("c1")).expect("delete call"));
    assert!(!store.delete_call(&CallId::new("c1")).expect("already gone"));
}

#[test]
fn listing_filters_and_orders_newest_first() {
    let store = InMemoryStorage::new();
    store.create_call(&call("c1")).expect("call");
    store.create_call(&call("c2")).expect("call");
    store
        .create_proposal(&proposal("old", "alice", "c1", 100))
        .expect("old");
    store
        .create_proposal(&proposal("new", "alice", "c1", 200))
        .expect("new");
    store
        .create_proposal(&proposal("other", "bob", "c2", 300))
        .expect("other");

    let filter = ProposalFilter {
        researcher_id: Some(UserId::new("alice")),
        ..ProposalFilter::default()
    };
    let page = store
        .list_proposals(&filter, PageRequest::default())
        .expect("list");
    assert_eq!(page.pagination.total_count, 2);
    assert_eq!(page.data[0].id, ProposalId::new("new"));
    assert_eq!(page.data[1].id, ProposalId::new("old"));

    let narrow = PageRequest::new(2, 1).expect("request");
    let page = store.list_proposals(&filter, narrow).expect("second page");
    assert_eq!(page.data.len(), 1);
    assert_eq!(page.data[0].id, ProposalId::new("old"));
    assert_eq!(page.pagination.total_pages, 2);
}

#[test]
fn notifications_are_owner_scoped() {
    let store = InMemoryStorage::new();
    let note = Notification::new(UserId::new("alice"), "hello", Timestamp(1));
    store.create_notification(&note).expect("create");

    let updated = store
        .mark_notification_read(&note.id, &UserId::new("bob"))
        .expect("foreign mark");
    assert!(updated.is_none());

    let updated = store
        .mark_notification_read(&note.id, &UserId::new("alice"))
        .expect("owner mark")
        .expect("exists");
    assert!(updated.is_read);
}

#[test]
fn expired_sessions_are_swept() {
    let store = InMemoryStorage::new();
    for (fingerprint, expires_at) in [("live", 2_000), ("dead", 500)] {
        store
            .create_session(&Session {
                token_fingerprint: fingerprint.to_string(),
                user_id: UserId::new("alice"),
                expires_at: Timestamp(expires_at),
                created_at: Timestamp(0),
            })
            .expect("session");
    }

    let removed = store.delete_expired_sessions(Timestamp(1_000)).expect("sweep");
    assert_eq!(removed, 1);
    assert!(store.session_by_fingerprint("dead").expect("dead").is_none());
    assert!(store.session_by_fingerprint("live").expect("live").is_some());

    store.delete_session("live").expect("logout");
    assert!(store.session_by_fingerprint("live").expect("gone").is_none());
}
