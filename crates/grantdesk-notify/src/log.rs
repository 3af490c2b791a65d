// grantdesk-notify/src/log.rs
// ============================================================================
// Module: Delivery Log
// Description: Structured delivery events and log sinks.
// Purpose: Record every notification delivery outcome as a JSON line.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Delivery is best-effort, so the log is the only place failures surface.
//! Events serialize as single JSON lines; the stderr sink is the production
//! default and tests substitute a recording sink.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

// ============================================================================
// SECTION: Event
// ============================================================================

/// Outcome of one notification delivery attempt.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryEvent {
    /// Fixed event discriminator.
    pub event: &'static str,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: u128,
    /// Delivery outcome label.
    pub outcome: &'static str,
    /// Whether the request was a broadcast.
    pub broadcast: bool,
    /// Number of notification rows persisted.
    pub recipients: u64,
    /// Failure detail, when the outcome is not a success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl DeliveryEvent {
    /// Builds a delivery event stamped with the current time.
    #[must_use]
    pub fn new(outcome: &'static str, broadcast: bool, recipients: u64) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event: "notification_delivery",
            timestamp_ms,
            outcome,
            broadcast,
            recipients,
            detail: None,
        }
    }

    /// Attaches a failure detail to the event.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Sink for notification delivery events.
pub trait DeliveryLog: Send + Sync {
    /// Records a delivery event.
    fn record(&self, event: &DeliveryEvent);
}

/// Delivery log that writes JSON lines to stderr.
pub struct StderrDeliveryLog;

impl DeliveryLog for StderrDeliveryLog {
    fn record(&self, event: &DeliveryEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}
