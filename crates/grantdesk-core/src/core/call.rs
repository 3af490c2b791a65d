// grantdesk-core/src/core/call.rs
// ============================================================================
// Module: Grantdesk Call Model
// Description: Call-for-proposal records.
// Purpose: Define the admin-owned call entity with its deadline gate.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Calls are simple admin-owned entities. Whether a call accepts submissions
//! is governed solely by `deadline > now`; no other gating exists. Deleting a
//! call with existing proposals is a defined failure, never a cascade.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::CallId;
use crate::core::identifiers::UserId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Call
// ============================================================================

/// A call for proposals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallForProposal {
    /// Call identifier.
    pub id: CallId,
    /// Call title.
    pub title: String,
    /// Call description.
    pub description: String,
    /// Submission deadline; proposals are accepted strictly before this.
    pub deadline: Timestamp,
    /// Admin who created the call.
    pub created_by: UserId,
    /// Creation time.
    pub created_at: Timestamp,
}

impl CallForProposal {
    /// Returns true when the call still accepts submissions at `now`.
    #[must_use]
    pub fn is_open(&self, now: Timestamp) -> bool {
        self.deadline > now
    }
}
