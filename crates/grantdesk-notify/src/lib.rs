// grantdesk-notify/src/lib.rs
// ============================================================================
// Module: Grantdesk Notify
// Description: Queued, best-effort notification delivery.
// Purpose: Decouple notification persistence from the write path.
// Dependencies: grantdesk-core, serde, serde_json
// ============================================================================

//! ## Overview
//! This crate implements the [`grantdesk_core::Notifier`] port with a
//! bounded queue drained by a background worker thread. Delivery persists
//! one [`grantdesk_core::Notification`] row per recipient; broadcast
//! requests resolve the recipient set at delivery time so users registered
//! after enqueue still receive the message. Every delivery outcome is
//! recorded as a JSON line through a [`DeliveryLog`] sink.

/// Delivery event model and log sinks.
pub mod log;
/// Bounded-queue notifier worker.
pub mod queue;

pub use log::DeliveryEvent;
pub use log::DeliveryLog;
pub use log::StderrDeliveryLog;
pub use queue::QueueNotifier;
