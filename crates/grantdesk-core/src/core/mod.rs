// grantdesk-core/src/core/mod.rs
// ============================================================================
// Module: Grantdesk Core Domain
// Description: Domain entities, identifiers, and pagination types.
// Purpose: Group the data model shared by every Grantdesk surface.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The core domain module defines the entity records persisted by the
//! storage port and the closed enumerations (roles, proposal statuses) that
//! gate every transition. Invalid role or status values are rejected at the
//! boundary instead of being persisted as free-form strings.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod call;
pub mod identifiers;
pub mod notification;
pub mod page;
pub mod proposal;
pub mod time;
pub mod user;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use call::CallForProposal;
pub use identifiers::CallId;
pub use identifiers::NotificationId;
pub use identifiers::ProposalId;
pub use identifiers::RevisionId;
pub use identifiers::UserId;
pub use notification::Notification;
pub use page::Page;
pub use page::PageInfo;
pub use page::PageRequest;
pub use page::ProposalFilter;
pub use proposal::Proposal;
pub use proposal::ProposalRevision;
pub use proposal::ProposalStatus;
pub use time::Timestamp;
pub use user::EmailVerification;
pub use user::Identity;
pub use user::PasswordReset;
pub use user::Role;
pub use user::Session;
pub use user::User;
