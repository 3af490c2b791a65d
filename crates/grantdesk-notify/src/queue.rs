// grantdesk-notify/src/queue.rs
// ============================================================================
// Module: Queue Notifier
// Description: Bounded-queue Notifier implementation with a worker thread.
// Purpose: Persist notification rows off the request path, fail-soft.
// Dependencies: grantdesk-core
// ============================================================================

//! ## Overview
//! [`QueueNotifier`] accepts requests through a bounded channel and drains
//! them on a dedicated worker thread. A full queue drops the request and
//! logs it; the triggering write has already committed and must not block
//! or fail on notification backpressure. Dropping the notifier closes the
//! channel and joins the worker, so every accepted request is delivered
//! before shutdown completes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::SyncSender;
use std::sync::mpsc::TrySendError;
use std::sync::mpsc::sync_channel;
use std::thread::JoinHandle;

use grantdesk_core::Notification;
use grantdesk_core::Notifier;
use grantdesk_core::NotifyRequest;
use grantdesk_core::Storage;
use grantdesk_core::Timestamp;

use crate::log::DeliveryEvent;
use crate::log::DeliveryLog;

// ============================================================================
// SECTION: Notifier
// ============================================================================

/// Bounded-queue notifier backed by a worker thread.
pub struct QueueNotifier {
    /// Channel into the worker; `None` once shutdown has begun.
    sender: Option<SyncSender<NotifyRequest>>,
    /// Worker handle joined on drop.
    worker: Option<JoinHandle<()>>,
    /// Sink shared with the worker for drop events.
    log: Arc<dyn DeliveryLog>,
}

impl QueueNotifier {
    /// Starts a notifier draining into `storage` with the given queue
    /// capacity. The worker owns a handle to the storage and resolves
    /// broadcast recipients at delivery time.
    #[must_use]
    pub fn start<S>(storage: Arc<S>, log: Arc<dyn DeliveryLog>, capacity: usize) -> Self
    where
        S: Storage + 'static,
    {
        let (sender, receiver) = sync_channel(capacity);
        let worker_log = Arc::clone(&log);
        let worker = std::thread::spawn(move || {
            drain(&receiver, storage.as_ref(), worker_log.as_ref());
        });
        Self {
            sender: Some(sender),
            worker: Some(worker),
            log,
        }
    }
}

impl Notifier for QueueNotifier {
    fn notify(&self, request: NotifyRequest) {
        let Some(sender) = self.sender.as_ref() else {
            return;
        };
        match sender.try_send(request) {
            Ok(()) => {}
            Err(TrySendError::Full(request) | TrySendError::Disconnected(request)) => {
                let event = DeliveryEvent::new("dropped", request.recipient.is_none(), 0)
                    .with_detail("notification queue unavailable or full");
                self.log.record(&event);
            }
        }
    }
}

impl Drop for QueueNotifier {
    fn drop(&mut self) {
        // Closing the channel lets the worker finish the backlog and exit.
        drop(self.sender.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

// ============================================================================
// SECTION: Worker
// ============================================================================

/// Drains the queue until every sender is gone.
fn drain(receiver: &Receiver<NotifyRequest>, storage: &dyn Storage, log: &dyn DeliveryLog) {
    while let Ok(request) = receiver.recv() {
        deliver(storage, log, &request);
    }
}

/// Persists one notification row per resolved recipient.
fn deliver(storage: &dyn Storage, log: &dyn DeliveryLog, request: &NotifyRequest) {
    let broadcast = request.recipient.is_none();
    let recipients = match &request.recipient {
        Some(recipient) => vec![recipient.clone()],
        None => match storage.all_user_ids() {
            Ok(ids) => ids,
            Err(err) => {
                let event =
                    DeliveryEvent::new("store_error", broadcast, 0).with_detail(err.to_string());
                log.record(&event);
                return;
            }
        },
    };

    let mut delivered: u64 = 0;
    for recipient in recipients {
        let row = Notification::new(recipient, request.message.clone(), Timestamp::now());
        match storage.create_notification(&row) {
            Ok(()) => delivered += 1,
            Err(err) => {
                let event = DeliveryEvent::new("store_error", broadcast, delivered)
                    .with_detail(err.to_string());
                log.record(&event);
                return;
            }
        }
    }
    log.record(&DeliveryEvent::new("delivered", broadcast, delivered));
}
