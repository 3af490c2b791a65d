// grantdesk-notify/tests/queue.rs
// ============================================================================
// Module: Queue Notifier Tests
// Description: Delivery semantics tests for QueueNotifier.
// Purpose: Verify direct delivery, broadcast fan-out, and drop logging.
// Dependencies: grantdesk-core, grantdesk-notify
// ============================================================================

//! ## Overview
//! Drives the queue notifier against the in-memory storage. Shutdown joins
//! the worker, so dropping the notifier makes every accepted request
//! observable in storage without polling.

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

use std::sync::Arc;
use std::sync::Mutex;

use grantdesk_core::InMemoryStorage;
use grantdesk_core::Notifier;
use grantdesk_core::NotifyRequest;
use grantdesk_core::PageRequest;
use grantdesk_core::Role;
use grantdesk_core::Storage;
use grantdesk_core::Timestamp;
use grantdesk_core::User;
use grantdesk_core::UserId;
use grantdesk_notify::DeliveryEvent;
use grantdesk_notify::DeliveryLog;
use grantdesk_notify::QueueNotifier;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Delivery log that records events for assertions.
struct RecordingLog {
    /// Recorded events in arrival order.
    events: Mutex<Vec<DeliveryEvent>>,
}

impl RecordingLog {
    /// Creates an empty recording log.
    fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
        })
    }

    /// Snapshot of recorded events.
    fn events(&self) -> Vec<DeliveryEvent> {
        self.events.lock().expect("log mutex").clone()
    }
}

impl DeliveryLog for RecordingLog {
    fn record(&self, event: &DeliveryEvent) {
        self.events.lock().expect("log mutex").push(event.clone());
    }
}

/// Seeds a storage with `count` users named `u-0`, `u-1`, ...
fn seeded_storage(count: usize) -> Arc<InMemoryStorage> {
    let storage = Arc::new(InMemoryStorage::new());
    for index in 0..count {
        let id = format!("u-{index}");
        storage
            .create_user(&User {
                id: UserId::new(&id),
                full_name: format!("User {index}"),
                email: format!("{id}@example.org"),
                password_hash: "$argon2id$stub".to_string(),
                role: Role::Researcher,
                verified: true,
                created_at: Timestamp(1_000),
            })
            .unwrap();
    }
    storage
}

/// First page of ten.
fn first_page() -> PageRequest {
    PageRequest::new(1, 10).unwrap()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn direct_request_reaches_one_user() {
    let storage = seeded_storage(2);
    let log = RecordingLog::new();
    let notifier = QueueNotifier::start(Arc::clone(&storage), log.clone(), 16);

    notifier.notify(NotifyRequest::to_user(UserId::new("u-0"), "Your proposal was received."));
    drop(notifier);

    let inbox = storage.notifications_for_user(&UserId::new("u-0"), first_page()).unwrap();
    assert_eq!(inbox.data.len(), 1);
    assert_eq!(inbox.data[0].message, "Your proposal was received.");
    assert!(!inbox.data[0].is_read);

    let other = storage.notifications_for_user(&UserId::new("u-1"), first_page()).unwrap();
    assert!(other.data.is_empty());

    let events = log.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].outcome, "delivered");
    assert_eq!(events[0].recipients, 1);
    assert!(!events[0].broadcast);
}

#[test]
fn broadcast_fans_out_to_every_user() {
    let storage = seeded_storage(3);
    let log = RecordingLog::new();
    let notifier = QueueNotifier::start(Arc::clone(&storage), log.clone(), 16);

    notifier.notify(NotifyRequest::broadcast("A new call is open."));
    drop(notifier);

    for index in 0..3 {
        let user_id = UserId::new(format!("u-{index}"));
        let inbox = storage.notifications_for_user(&user_id, first_page()).unwrap();
        assert_eq!(inbox.data.len(), 1, "user u-{index}");
    }
    let events = log.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].outcome, "delivered");
    assert_eq!(events[0].recipients, 3);
    assert!(events[0].broadcast);
}

#[test]
fn accepted_backlog_is_drained_before_shutdown() {
    let storage = seeded_storage(1);
    let log = RecordingLog::new();
    let notifier = QueueNotifier::start(Arc::clone(&storage), log.clone(), 64);

    for index in 0..20 {
        notifier.notify(NotifyRequest::to_user(UserId::new("u-0"), format!("Message {index}")));
    }
    drop(notifier);

    let inbox = storage.notifications_for_user(&UserId::new("u-0"), first_page()).unwrap();
    assert_eq!(inbox.pagination.total_count, 20);
    assert_eq!(log.events().len(), 20);
}

#[test]
fn broadcast_with_no_users_delivers_nothing() {
    let storage = seeded_storage(0);
    let log = RecordingLog::new();
    let notifier = QueueNotifier::start(Arc::clone(&storage), log.clone(), 16);

    notifier.notify(NotifyRequest::broadcast("Anyone there?"));
    drop(notifier);

    let events = log.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].outcome, "delivered");
    assert_eq!(events[0].recipients, 0);
}
