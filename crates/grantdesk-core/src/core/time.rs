// grantdesk-core/src/core/time.rs
// ============================================================================
// Module: Grantdesk Time Model
// Description: Canonical timestamp representation for entity records.
// Purpose: Provide explicit time values for deadlines, expiries, and audit.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Grantdesk stores all times as unix epoch milliseconds. The lifecycle
//! engine never reads wall-clock time directly; hosts supply the current
//! time to every operation so tests stay deterministic. [`Timestamp::now`]
//! exists for those hosts, not for the engine.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Unix epoch milliseconds.
///
/// # Invariants
/// - Values are explicitly provided by callers; the engine never reads the
///   wall clock.
/// - No monotonicity is enforced; ordering guarantees come from the storage
///   port's creation-time columns.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Returns the current wall-clock time as unix milliseconds.
    #[must_use]
    pub fn now() -> Self {
        let elapsed = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        Self(i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
    }

    /// Returns the raw unix-millisecond value.
    #[must_use]
    pub const fn as_millis(self) -> i64 {
        self.0
    }

    /// Returns this timestamp shifted forward by the given milliseconds.
    #[must_use]
    pub const fn plus_millis(self, millis: i64) -> Self {
        Self(self.0.saturating_add(millis))
    }
}

impl From<i64> for Timestamp {
    fn from(value: i64) -> Self {
        Self(value)
    }
}
