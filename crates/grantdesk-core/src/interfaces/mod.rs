// grantdesk-core/src/interfaces/mod.rs
// ============================================================================
// Module: Grantdesk Interfaces
// Description: Backend-agnostic ports for storage, documents, and notify.
// Purpose: Define the contract surfaces used by the lifecycle engine.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Interfaces define how Grantdesk integrates with external systems without
//! embedding backend-specific details. Implementations must fail closed on
//! missing or invalid data. The lifecycle engine is generic over these
//! traits; hosts construct the implementations explicitly at startup and
//! inject them, never through ambient module state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use thiserror::Error;

use crate::core::CallForProposal;
use crate::core::CallId;
use crate::core::EmailVerification;
use crate::core::Notification;
use crate::core::NotificationId;
use crate::core::Page;
use crate::core::PageRequest;
use crate::core::PasswordReset;
use crate::core::Proposal;
use crate::core::ProposalFilter;
use crate::core::ProposalId;
use crate::core::ProposalRevision;
use crate::core::ProposalStatus;
use crate::core::Role;
use crate::core::Session;
use crate::core::Timestamp;
use crate::core::User;
use crate::core::UserId;

// ============================================================================
// SECTION: Document Limits
// ============================================================================

/// Maximum accepted proposal document size in bytes (5 MB ceiling).
pub const MAX_DOCUMENT_BYTES: usize = 5 * 1024 * 1024;
/// The only accepted document content type.
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

// ============================================================================
// SECTION: Storage Port
// ============================================================================

/// Storage port errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("storage io error: {0}")]
    Io(String),
    /// A uniqueness constraint (for example user email) was violated.
    #[error("storage duplicate: {0}")]
    Duplicate(String),
    /// A referential-integrity constraint blocked the operation.
    #[error("storage constraint: {0}")]
    Constraint(String),
    /// Store data is invalid or fails closed-enum parsing.
    #[error("storage invalid data: {0}")]
    Invalid(String),
    /// Store reported an error.
    #[error("storage error: {0}")]
    Store(String),
}

/// Transactional relational store for every Grantdesk entity.
///
/// Implementations must support safe concurrent use and atomic single-row
/// status transitions (the `expected`-status compare-and-swap methods).
pub trait Storage: Send + Sync {
    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    /// Persists a new user.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Duplicate`] when the email is already taken.
    fn create_user(&self, user: &User) -> Result<(), StoreError>;

    /// Loads a user by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn user_by_id(&self, id: &UserId) -> Result<Option<User>, StoreError>;

    /// Loads a user by email.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Updates profile fields, returning the updated user when it exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Duplicate`] when the new email is taken.
    fn update_user_profile(
        &self,
        id: &UserId,
        full_name: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, StoreError>;

    /// Replaces a user's password hash.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the update fails.
    fn update_user_password(&self, id: &UserId, password_hash: &str) -> Result<bool, StoreError>;

    /// Marks a user's email as verified.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the update fails.
    fn set_user_verified(&self, id: &UserId) -> Result<bool, StoreError>;

    /// Replaces a user's role, returning the updated user when it exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the update fails.
    fn update_user_role(&self, id: &UserId, role: Role) -> Result<Option<User>, StoreError>;

    /// Lists users by creation time descending.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn list_users(&self, page: PageRequest) -> Result<Page<User>, StoreError>;

    /// Counts users holding the given role.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn count_users_with_role(&self, role: Role) -> Result<u64, StoreError>;

    /// Returns every user identifier (broadcast fan-out).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn all_user_ids(&self) -> Result<Vec<UserId>, StoreError>;

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    /// Persists a new call.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    fn create_call(&self, call: &CallForProposal) -> Result<(), StoreError>;

    /// Loads a call by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn call_by_id(&self, id: &CallId) -> Result<Option<CallForProposal>, StoreError>;

    /// Updates call fields, returning the updated call when it exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the update fails.
    fn update_call(
        &self,
        id: &CallId,
        title: Option<&str>,
        description: Option<&str>,
        deadline: Option<Timestamp>,
    ) -> Result<Option<CallForProposal>, StoreError>;

    /// Deletes a call, returning false when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Constraint`] when proposals still reference it.
    fn delete_call(&self, id: &CallId) -> Result<bool, StoreError>;

    /// Lists calls by creation time descending.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn list_calls(&self, page: PageRequest) -> Result<Page<CallForProposal>, StoreError>;

    /// Counts calls whose deadline is still in the future.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn count_open_calls(&self, now: Timestamp) -> Result<u64, StoreError>;

    // ------------------------------------------------------------------
    // Proposals
    // ------------------------------------------------------------------

    /// Persists a new proposal.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    fn create_proposal(&self, proposal: &Proposal) -> Result<(), StoreError>;

    /// Loads a proposal by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn proposal_by_id(&self, id: &ProposalId) -> Result<Option<Proposal>, StoreError>;

    /// Updates title/abstract, returning the updated proposal when it exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the update fails.
    fn update_proposal_content(
        &self,
        id: &ProposalId,
        title: Option<&str>,
        abstract_text: Option<&str>,
    ) -> Result<Option<Proposal>, StoreError>;

    /// Atomically moves a proposal from `expected` to `next` status and
    /// replaces its rejection reason. Returns false when the proposal is
    /// missing or its status no longer matches `expected` (compare-and-swap
    /// miss).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the update fails.
    fn update_proposal_status(
        &self,
        id: &ProposalId,
        expected: ProposalStatus,
        next: ProposalStatus,
        rejection_reason: Option<&str>,
    ) -> Result<bool, StoreError>;

    /// Atomically appends a revision, points the proposal at the revised
    /// document, and moves its status from `expected` to `next`. Returns
    /// false (and persists nothing) on a compare-and-swap miss.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the transaction fails.
    fn record_revision(
        &self,
        revision: &ProposalRevision,
        expected: ProposalStatus,
        next: ProposalStatus,
    ) -> Result<bool, StoreError>;

    /// Deletes a proposal and its revisions, returning false when missing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the delete fails.
    fn delete_proposal(&self, id: &ProposalId) -> Result<bool, StoreError>;

    /// Lists proposals matching the filter, creation time descending.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn list_proposals(
        &self,
        filter: &ProposalFilter,
        page: PageRequest,
    ) -> Result<Page<Proposal>, StoreError>;

    /// Counts proposals matching the filter.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn count_proposals(&self, filter: &ProposalFilter) -> Result<u64, StoreError>;

    /// Returns per-status proposal counts (dashboard stats).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn proposal_status_counts(&self) -> Result<Vec<(ProposalStatus, u64)>, StoreError>;

    /// Lists a proposal's revisions by submission time descending.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn revisions_for_proposal(
        &self,
        id: &ProposalId,
    ) -> Result<Vec<ProposalRevision>, StoreError>;

    // ------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------

    /// Persists a new in-app notification.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    fn create_notification(&self, notification: &Notification) -> Result<(), StoreError>;

    /// Lists a user's notifications by creation time descending.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn notifications_for_user(
        &self,
        user_id: &UserId,
        page: PageRequest,
    ) -> Result<Page<Notification>, StoreError>;

    /// Flips `is_read` for a notification owned by `user_id`, returning the
    /// updated record, or `None` when no matching row exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the update fails.
    fn mark_notification_read(
        &self,
        id: &NotificationId,
        user_id: &UserId,
    ) -> Result<Option<Notification>, StoreError>;

    // ------------------------------------------------------------------
    // Password Resets
    // ------------------------------------------------------------------

    /// Inserts or replaces the single live reset for a user.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the upsert fails.
    fn upsert_password_reset(&self, reset: &PasswordReset) -> Result<(), StoreError>;

    /// Loads the live reset for a user, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn password_reset_by_user(&self, user_id: &UserId)
    -> Result<Option<PasswordReset>, StoreError>;

    /// Deletes a user's reset record (token consumption).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the delete fails.
    fn delete_password_reset(&self, user_id: &UserId) -> Result<(), StoreError>;

    // ------------------------------------------------------------------
    // Email Verifications
    // ------------------------------------------------------------------

    /// Inserts or replaces the single live verification token for a user.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the upsert fails.
    fn upsert_email_verification(
        &self,
        verification: &EmailVerification,
    ) -> Result<(), StoreError>;

    /// Loads the live verification token for a user, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn email_verification_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<EmailVerification>, StoreError>;

    /// Deletes a user's verification record (token consumption).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the delete fails.
    fn delete_email_verification(&self, user_id: &UserId) -> Result<(), StoreError>;

    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    /// Persists a new session.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    fn create_session(&self, session: &Session) -> Result<(), StoreError>;

    /// Loads a session by token fingerprint.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn session_by_fingerprint(&self, fingerprint: &str) -> Result<Option<Session>, StoreError>;

    /// Deletes a session by token fingerprint (logout).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the delete fails.
    fn delete_session(&self, fingerprint: &str) -> Result<(), StoreError>;

    /// Deletes every session expired at `now`, returning the count removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the delete fails.
    fn delete_expired_sessions(&self, now: Timestamp) -> Result<u64, StoreError>;
}

// ============================================================================
// SECTION: Document Store Port
// ============================================================================

/// Document store errors.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// Document content violated the port contract (type or size).
    #[error("document rejected: {0}")]
    Rejected(String),
    /// The backing store failed to persist or remove the document.
    #[error("document store failure: {0}")]
    Failed(String),
    /// No document exists under the given handle.
    #[error("document not found: {0}")]
    NotFound(String),
}

/// A document submitted for storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentUpload {
    /// Client-supplied file name (informational only).
    pub file_name: String,
    /// Declared content type; must be `application/pdf`.
    pub content_type: String,
    /// Raw document bytes.
    pub bytes: Vec<u8>,
}

/// Handle returned for a stored document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    /// Stable URL for serving the document.
    pub url: String,
    /// Opaque handle for later deletion.
    pub key: String,
}

/// Stores and deletes proposal documents.
///
/// Implementations accept only PDF content up to [`MAX_DOCUMENT_BYTES`].
pub trait DocumentStore: Send + Sync {
    /// Stores a document, returning its stable URL and handle.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Rejected`] for contract violations and
    /// [`DocumentError::Failed`] for backend failures.
    fn store(&self, upload: &DocumentUpload) -> Result<StoredDocument, DocumentError>;

    /// Deletes a document by handle.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::NotFound`] when no such handle exists and
    /// [`DocumentError::Failed`] for backend failures.
    fn delete(&self, key: &str) -> Result<(), DocumentError>;
}

// ============================================================================
// SECTION: Notifier Port
// ============================================================================

/// A notification request handed to the notifier port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyRequest {
    /// Recipient; `None` broadcasts to every user at delivery time.
    pub recipient: Option<UserId>,
    /// Human-readable message.
    pub message: String,
}

impl NotifyRequest {
    /// Builds a request addressed to a single user.
    #[must_use]
    pub fn to_user(recipient: UserId, message: impl Into<String>) -> Self {
        Self {
            recipient: Some(recipient),
            message: message.into(),
        }
    }

    /// Builds a broadcast request delivered to every user.
    #[must_use]
    pub fn broadcast(message: impl Into<String>) -> Self {
        Self {
            recipient: None,
            message: message.into(),
        }
    }
}

/// Fire-and-forget notification dispatch.
///
/// Delivery is best-effort: implementations log failures and never surface
/// them to the caller, so notifier latency or outage cannot fail the write
/// path that triggered the notification.
pub trait Notifier: Send + Sync {
    /// Enqueues a notification for delivery after the triggering commit.
    fn notify(&self, request: NotifyRequest);
}

// ============================================================================
// SECTION: Shared Handles
// ============================================================================

/// Shares any notifier behind an [`Arc`].
impl<T: Notifier + ?Sized> Notifier for Arc<T> {
    fn notify(&self, request: NotifyRequest) {
        (**self).notify(request);
    }
}

/// Shares any document store behind an [`Arc`].
impl<T: DocumentStore + ?Sized> DocumentStore for Arc<T> {
    fn store(&self, upload: &DocumentUpload) -> Result<StoredDocument, DocumentError> {
        (**self).store(upload)
    }

    fn delete(&self, key: &str) -> Result<(), DocumentError> {
        (**self).delete(key)
    }
}

// ============================================================================
// SECTION: Shared Storage Wrapper
// ============================================================================

/// Shared storage handle backed by an `Arc` trait object.
///
/// Hosts that need one storage behind multiple components (engine, identity
/// service, notifier worker) wrap it once and clone the handle.
#[derive(Clone)]
pub struct SharedStorage {
    /// Inner storage implementation.
    inner: Arc<dyn Storage>,
}

impl SharedStorage {
    /// Wraps a storage backend in a shared, clonable handle.
    #[must_use]
    pub fn from_store(store: impl Storage + 'static) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }

    /// Wraps an existing shared storage trait object.
    #[must_use]
    pub const fn new(store: Arc<dyn Storage>) -> Self {
        Self {
            inner: store,
        }
    }
}

impl Storage for SharedStorage {
    fn create_user(&self, user: &User) -> Result<(), StoreError> {
        self.inner.create_user(user)
    }

    fn user_by_id(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        self.inner.user_by_id(id)
    }

    fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.inner.user_by_email(email)
    }

    fn update_user_profile(
        &self,
        id: &UserId,
        full_name: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, StoreError> {
        self.inner.update_user_profile(id, full_name, email)
    }

    fn update_user_password(&self, id: &UserId, password_hash: &str) -> Result<bool, StoreError> {
        self.inner.update_user_password(id, password_hash)
    }

    fn set_user_verified(&self, id: &UserId) -> Result<bool, StoreError> {
        self.inner.set_user_verified(id)
    }

    fn update_user_role(&self, id: &UserId, role: Role) -> Result<Option<User>, StoreError> {
        self.inner.update_user_role(id, role)
    }

    fn list_users(&self, page: PageRequest) -> Result<Page<User>, StoreError> {
        self.inner.list_users(page)
    }

    fn count_users_with_role(&self, role: Role) -> Result<u64, StoreError> {
        self.inner.count_users_with_role(role)
    }

    fn all_user_ids(&self) -> Result<Vec<UserId>, StoreError> {
        self.inner.all_user_ids()
    }

    fn create_call(&self, call: &CallForProposal) -> Result<(), StoreError> {
        self.inner.create_call(call)
    }

    fn call_by_id(&self, id: &CallId) -> Result<Option<CallForProposal>, StoreError> {
        self.inner.call_by_id(id)
    }

    fn update_call(
        &self,
        id: &CallId,
        title: Option<&str>,
        description: Option<&str>,
        deadline: Option<Timestamp>,
    ) -> Result<Option<CallForProposal>, StoreError> {
        self.inner.update_call(id, title, description, deadline)
    }

    fn delete_call(&self, id: &CallId) -> Result<bool, StoreError> {
        self.inner.delete_call(id)
    }

    fn list_calls(&self, page: PageRequest) -> Result<Page<CallForProposal>, StoreError> {
        self.inner.list_calls(page)
    }

    fn count_open_calls(&self, now: Timestamp) -> Result<u64, StoreError> {
        self.inner.count_open_calls(now)
    }

    fn create_proposal(&self, proposal: &Proposal) -> Result<(), StoreError> {
        self.inner.create_proposal(proposal)
    }

    fn proposal_by_id(&self, id: &ProposalId) -> Result<Option<Proposal>, StoreError> {
        self.inner.proposal_by_id(id)
    }

    fn update_proposal_content(
        &self,
        id: &ProposalId,
        title: Option<&str>,
        abstract_text: Option<&str>,
    ) -> Result<Option<Proposal>, StoreError> {
        self.inner.update_proposal_content(id, title, abstract_text)
    }

    fn update_proposal_status(
        &self,
        id: &ProposalId,
        expected: ProposalStatus,
        next: ProposalStatus,
        rejection_reason: Option<&str>,
    ) -> Result<bool, StoreError> {
        self.inner.update_proposal_status(id, expected, next, rejection_reason)
    }

    fn record_revision(
        &self,
        revision: &ProposalRevision,
        expected: ProposalStatus,
        next: ProposalStatus,
    ) -> Result<bool, StoreError> {
        self.inner.record_revision(revision, expected, next)
    }

    fn delete_proposal(&self, id: &ProposalId) -> Result<bool, StoreError> {
        self.inner.delete_proposal(id)
    }

    fn list_proposals(
        &self,
        filter: &ProposalFilter,
        page: PageRequest,
    ) -> Result<Page<Proposal>, StoreError> {
        self.inner.list_proposals(filter, page)
    }

    fn count_proposals(&self, filter: &ProposalFilter) -> Result<u64, StoreError> {
        self.inner.count_proposals(filter)
    }

    fn proposal_status_counts(&self) -> Result<Vec<(ProposalStatus, u64)>, StoreError> {
        self.inner.proposal_status_counts()
    }

    fn revisions_for_proposal(
        &self,
        id: &ProposalId,
    ) -> Result<Vec<ProposalRevision>, StoreError> {
        self.inner.revisions_for_proposal(id)
    }

    fn create_notification(&self, notification: &Notification) -> Result<(), StoreError> {
        self.inner.create_notification(notification)
    }

    fn notifications_for_user(
        &self,
        user_id: &UserId,
        page: PageRequest,
    ) -> Result<Page<Notification>, StoreError> {
        self.inner.notifications_for_user(user_id, page)
    }

    fn mark_notification_read(
        &self,
        id: &NotificationId,
        user_id: &UserId,
    ) -> Result<Option<Notification>, StoreError> {
        self.inner.mark_notification_read(id, user_id)
    }

    fn upsert_password_reset(&self, reset: &PasswordReset) -> Result<(), StoreError> {
        self.inner.upsert_password_reset(reset)
    }

    fn password_reset_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<PasswordReset>, StoreError> {
        self.inner.password_reset_by_user(user_id)
    }

    fn delete_password_reset(&self, user_id: &UserId) -> Result<(), StoreError> {
        self.inner.delete_password_reset(user_id)
    }

    fn upsert_email_verification(
        &self,
        verification: &EmailVerification,
    ) -> Result<(), StoreError> {
        self.inner.upsert_email_verification(verification)
    }

    fn email_verification_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<EmailVerification>, StoreError> {
        self.inner.email_verification_by_user(user_id)
    }

    fn delete_email_verification(&self, user_id: &UserId) -> Result<(), StoreError> {
        self.inner.delete_email_verification(user_id)
    }

    fn create_session(&self, session: &Session) -> Result<(), StoreError> {
        self.inner.create_session(session)
    }

    fn session_by_fingerprint(&self, fingerprint: &str) -> Result<Option<Session>, StoreError> {
        self.inner.session_by_fingerprint(fingerprint)
    }

    fn delete_session(&self, fingerprint: &str) -> Result<(), StoreError> {
        self.inner.delete_session(fingerprint)
    }

    fn delete_expired_sessions(&self, now: Timestamp) -> Result<u64, StoreError> {
        self.inner.delete_expired_sessions(now)
    }
}
