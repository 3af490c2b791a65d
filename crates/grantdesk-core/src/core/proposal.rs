// grantdesk-core/src/core/proposal.rs
// ============================================================================
// Module: Grantdesk Proposal Model
// Description: Proposal records, revisions, and the review state machine.
// Purpose: Define the status graph every transition must satisfy.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The proposal status graph is closed and enforced:
//!
//! ```text
//! Submitted -> UnderReview -> {RevisionRequested, Approved, Rejected}
//! RevisionRequested -> RevisionSubmitted -> UnderReview
//! ```
//!
//! `Approved` and `Rejected` are terminal. `UnderReview` is entered only by
//! an explicit admin action; `RevisionSubmitted` is entered only by the
//! researcher's revision upload. Any other requested transition is invalid.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::CallId;
use crate::core::identifiers::ProposalId;
use crate::core::identifiers::RevisionId;
use crate::core::identifiers::UserId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Proposal Status
// ============================================================================

/// Review status of a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProposalStatus {
    /// Submitted and awaiting an admin to begin evaluation.
    Submitted,
    /// Under active admin evaluation.
    UnderReview,
    /// Admin requested changes; awaiting a researcher revision.
    RevisionRequested,
    /// Researcher uploaded a revision; awaiting re-review.
    RevisionSubmitted,
    /// Accepted (terminal).
    Approved,
    /// Declined (terminal).
    Rejected,
}

impl ProposalStatus {
    /// All statuses, in graph order.
    pub const ALL: [Self; 6] = [
        Self::Submitted,
        Self::UnderReview,
        Self::RevisionRequested,
        Self::RevisionSubmitted,
        Self::Approved,
        Self::Rejected,
    ];

    /// Returns the canonical wire label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Submitted => "SUBMITTED",
            Self::UnderReview => "UNDER_REVIEW",
            Self::RevisionRequested => "REVISION_REQUESTED",
            Self::RevisionSubmitted => "REVISION_SUBMITTED",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }

    /// Parses a status label, rejecting anything outside the closed set.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "SUBMITTED" => Some(Self::Submitted),
            "UNDER_REVIEW" => Some(Self::UnderReview),
            "REVISION_REQUESTED" => Some(Self::RevisionRequested),
            "REVISION_SUBMITTED" => Some(Self::RevisionSubmitted),
            "APPROVED" => Some(Self::Approved),
            "REJECTED" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Returns true when the status admits no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }

    /// Returns true when the graph permits moving from `self` to `next`.
    #[must_use]
    pub const fn can_transition(self, next: Self) -> bool {
        match self {
            Self::Submitted => matches!(next, Self::UnderReview),
            Self::UnderReview => {
                matches!(next, Self::RevisionRequested | Self::Approved | Self::Rejected)
            }
            Self::RevisionRequested => matches!(next, Self::RevisionSubmitted),
            Self::RevisionSubmitted => matches!(next, Self::UnderReview),
            Self::Approved | Self::Rejected => false,
        }
    }

    /// Returns true when `next` is a status an admin review action may set.
    ///
    /// `Submitted` is the creation state and `RevisionSubmitted` is reserved
    /// for the researcher's revision upload; neither is an admin target.
    #[must_use]
    pub const fn is_review_target(next: Self) -> bool {
        matches!(
            next,
            Self::UnderReview | Self::RevisionRequested | Self::Approved | Self::Rejected
        )
    }
}

// ============================================================================
// SECTION: Proposal
// ============================================================================

/// A research proposal submitted against a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    /// Proposal identifier.
    pub id: ProposalId,
    /// Owning researcher; immutable after creation.
    pub researcher_id: UserId,
    /// Target call; immutable after creation.
    pub call_id: CallId,
    /// Proposal title.
    pub title: String,
    /// Proposal abstract.
    pub abstract_text: String,
    /// Stable URL of the current document version.
    pub document_url: String,
    /// Document store handle of the current document version.
    pub document_key: String,
    /// Review status.
    pub status: ProposalStatus,
    /// Rejection reason; `Some` if and only if `status` is `Rejected`.
    pub rejection_reason: Option<String>,
    /// Creation time.
    pub created_at: Timestamp,
}

// ============================================================================
// SECTION: Revision
// ============================================================================

/// An append-only revision of a proposal document.
///
/// Revisions are never mutated after creation and are listed by
/// `submitted_at` descending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalRevision {
    /// Revision identifier.
    pub id: RevisionId,
    /// Owning proposal.
    pub proposal_id: ProposalId,
    /// Stable URL of the revised document.
    pub revised_document_url: String,
    /// Document store handle of the revised document.
    pub revised_document_key: String,
    /// Researcher comments accompanying the revision.
    pub comments: String,
    /// Submission time.
    pub submitted_at: Timestamp,
}
