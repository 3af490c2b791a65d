// grantdesk-core/src/runtime/engine.rs
// ============================================================================
// Module: Lifecycle Engine
// Description: Proposal lifecycle evaluation over injected port traits.
// Purpose: Enforce ownership, status transitions, and side-effect ordering.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! The lifecycle engine owns every state-changing rule for calls and
//! proposals. Hosts construct it with a storage backend, a document store,
//! and a notifier; the engine never reads the wall clock and instead takes
//! the current time as an explicit argument, which keeps evaluation
//! deterministic under test.
//!
//! Side effects follow a fixed order: upload the document, persist the row,
//! then enqueue notifications. A failed row write after a successful upload
//! triggers a best-effort delete of the uploaded document so the store does
//! not accumulate unreferenced files.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::CallForProposal;
use crate::core::CallId;
use crate::core::Identity;
use crate::core::Notification;
use crate::core::NotificationId;
use crate::core::Page;
use crate::core::PageRequest;
use crate::core::Proposal;
use crate::core::ProposalFilter;
use crate::core::ProposalId;
use crate::core::ProposalRevision;
use crate::core::ProposalStatus;
use crate::core::RevisionId;
use crate::core::Role;
use crate::core::Timestamp;
use crate::interfaces::DocumentError;
use crate::interfaces::DocumentStore;
use crate::interfaces::DocumentUpload;
use crate::interfaces::Notifier;
use crate::interfaces::NotifyRequest;
use crate::interfaces::Storage;
use crate::interfaces::StoreError;
use crate::interfaces::StoredDocument;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Lifecycle engine errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Request payload failed validation.
    #[error("validation: {0}")]
    Validation(String),
    /// Referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Caller lacks the role or ownership the operation requires.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Entity exists but its current status rules the operation out.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Concurrent writer won, or a uniqueness/integrity rule blocked us.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Document store failed to persist the upload.
    #[error("upload failed: {0}")]
    UploadFailed(String),
    /// Storage backend failure.
    #[error("storage: {0}")]
    Store(String),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(msg) | StoreError::Constraint(msg) => Self::Conflict(msg),
            StoreError::Io(msg) | StoreError::Invalid(msg) | StoreError::Store(msg) => {
                Self::Store(msg)
            }
        }
    }
}

impl From<DocumentError> for EngineError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::Rejected(msg) => Self::Validation(msg),
            DocumentError::Failed(msg) | DocumentError::NotFound(msg) => Self::UploadFailed(msg),
        }
    }
}

// ============================================================================
// SECTION: Inputs
// ============================================================================

/// Input for submitting a new proposal.
#[derive(Debug, Clone)]
pub struct NewProposal {
    /// Call the proposal targets.
    pub call_id: CallId,
    /// Proposal title.
    pub title: String,
    /// Proposal abstract.
    pub abstract_text: String,
    /// Proposal document (PDF).
    pub document: DocumentUpload,
}

/// Input for submitting a revised document.
#[derive(Debug, Clone)]
pub struct NewRevision {
    /// Researcher's notes accompanying the revision.
    pub comments: Option<String>,
    /// Revised document (PDF).
    pub document: DocumentUpload,
}

/// An administrator's review decision for a proposal.
#[derive(Debug, Clone)]
pub struct ReviewDecision {
    /// Target status; must be an admin review target.
    pub next: ProposalStatus,
    /// Reviewer comment; required when rejecting.
    pub comment: Option<String>,
}

/// Input for publishing a new call.
#[derive(Debug, Clone)]
pub struct NewCall {
    /// Call title.
    pub title: String,
    /// Call description.
    pub description: String,
    /// Submission deadline; must lie in the future.
    pub deadline: Timestamp,
}

/// Partial update for an existing call. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct CallPatch {
    /// Replacement title.
    pub title: Option<String>,
    /// Replacement description.
    pub description: Option<String>,
    /// Replacement deadline; must lie in the future.
    pub deadline: Option<Timestamp>,
}

impl CallPatch {
    /// True when the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.deadline.is_none()
    }
}

// ============================================================================
// SECTION: Outputs
// ============================================================================

/// A proposal together with its revision history.
#[derive(Debug, Clone)]
pub struct ProposalDetail {
    /// The proposal record.
    pub proposal: Proposal,
    /// Revisions, newest first.
    pub revisions: Vec<ProposalRevision>,
}

/// Aggregate counts for the administrator dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardStats {
    /// Proposal counts keyed by status.
    pub proposals_by_status: Vec<(ProposalStatus, u64)>,
    /// Total proposals across all statuses.
    pub total_proposals: u64,
    /// Calls whose deadline has not passed.
    pub open_calls: u64,
    /// Registered researchers.
    pub researchers: u64,
}

// ============================================================================
// SECTION: Notification Messages
// ============================================================================

/// Message sent to the owner when a proposal is first submitted.
fn submitted_message(title: &str) -> String {
    format!("Your proposal \"{title}\" has been submitted.")
}

/// Message sent to the owner when their revision is recorded.
fn revision_received_message(title: &str) -> String {
    format!("Your revised proposal \"{title}\" has been submitted for review.")
}

/// Message sent to the owner after a review decision.
fn status_message(title: &str, next: ProposalStatus, comment: Option<&str>) -> String {
    match next {
        ProposalStatus::UnderReview => {
            format!("Your proposal \"{title}\" is now under review.")
        }
        ProposalStatus::RevisionRequested => match comment {
            Some(comment) => format!(
                "Revisions have been requested for your proposal \"{title}\": {comment}"
            ),
            None => format!("Revisions have been requested for your proposal \"{title}\"."),
        },
        ProposalStatus::Approved => {
            format!("Congratulations! Your proposal \"{title}\" has been approved.")
        }
        ProposalStatus::Rejected => match comment {
            Some(comment) => {
                format!("Your proposal \"{title}\" has been rejected. Reason: {comment}")
            }
            None => format!("Your proposal \"{title}\" has been rejected."),
        },
        ProposalStatus::Submitted | ProposalStatus::RevisionSubmitted => {
            format!("Your proposal \"{title}\" has been updated.")
        }
    }
}

/// Broadcast message announcing a newly published call.
fn call_published_message(title: &str) -> String {
    format!("A new call for proposals is open: \"{title}\".")
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Proposal lifecycle engine generic over the three port traits.
pub struct LifecycleEngine<S, D, N> {
    /// Relational storage backend.
    storage: S,
    /// Proposal document store.
    documents: D,
    /// Fire-and-forget notification dispatch.
    notifier: N,
}

impl<S, D, N> LifecycleEngine<S, D, N>
where
    S: Storage,
    D: DocumentStore,
    N: Notifier,
{
    /// Builds an engine from its injected dependencies.
    #[must_use]
    pub fn new(storage: S, documents: D, notifier: N) -> Self {
        Self {
            storage,
            documents,
            notifier,
        }
    }

    /// Borrows the underlying storage backend.
    #[must_use]
    pub fn storage(&self) -> &S {
        &self.storage
    }

    // ------------------------------------------------------------------
    // Proposals
    // ------------------------------------------------------------------

    /// Submits a new proposal against an open call.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Forbidden`] for non-researchers,
    /// [`EngineError::NotFound`] for an unknown call,
    /// [`EngineError::Validation`] for a closed call or bad payload, and
    /// upload/storage errors from the ports.
    pub fn submit_proposal(
        &self,
        identity: &Identity,
        input: NewProposal,
        now: Timestamp,
    ) -> Result<Proposal, EngineError> {
        require_role(identity, Role::Researcher, "only researchers submit proposals")?;
        let title = require_text("title", &input.title)?;
        let abstract_text = require_text("abstract", &input.abstract_text)?;
        let call = self
            .storage
            .call_by_id(&input.call_id)?
            .ok_or_else(|| EngineError::NotFound(format!("call {}", input.call_id)))?;
        if !call.is_open(now) {
            return Err(EngineError::Validation(format!(
                "call {} deadline has passed",
                call.id
            )));
        }

        let stored = self.documents.store(&input.document)?;
        let proposal = Proposal {
            id: ProposalId::generate(),
            researcher_id: identity.user_id.clone(),
            call_id: call.id.clone(),
            title,
            abstract_text,
            document_url: stored.url.clone(),
            document_key: stored.key.clone(),
            status: ProposalStatus::Submitted,
            rejection_reason: None,
            created_at: now,
        };
        if let Err(err) = self.storage.create_proposal(&proposal) {
            self.discard_document(&stored);
            return Err(err.into());
        }

        self.notifier.notify(NotifyRequest::to_user(
            identity.user_id.clone(),
            submitted_message(&proposal.title),
        ));
        Ok(proposal)
    }

    /// Submits a revised document for a proposal awaiting revision.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Forbidden`] unless the caller owns the
    /// proposal, [`EngineError::InvalidState`] unless the proposal status is
    /// `REVISION_REQUESTED`, and [`EngineError::Conflict`] when a concurrent
    /// transition wins the compare-and-swap.
    pub fn revise_proposal(
        &self,
        identity: &Identity,
        proposal_id: &ProposalId,
        input: NewRevision,
        now: Timestamp,
    ) -> Result<Proposal, EngineError> {
        let proposal = self.require_proposal(proposal_id)?;
        require_owner(identity, &proposal)?;
        if proposal.status != ProposalStatus::RevisionRequested {
            return Err(EngineError::InvalidState(format!(
                "proposal {} is {}, not awaiting revision",
                proposal.id,
                proposal.status.as_str()
            )));
        }

        let stored = self.documents.store(&input.document)?;
        let revision = ProposalRevision {
            id: RevisionId::generate(),
            proposal_id: proposal.id.clone(),
            revised_document_url: stored.url.clone(),
            revised_document_key: stored.key.clone(),
            comments: input.comments.unwrap_or_default(),
            submitted_at: now,
        };
        let swapped = match self.storage.record_revision(
            &revision,
            ProposalStatus::RevisionRequested,
            ProposalStatus::RevisionSubmitted,
        ) {
            Ok(swapped) => swapped,
            Err(err) => {
                self.discard_document(&stored);
                return Err(err.into());
            }
        };
        if !swapped {
            self.discard_document(&stored);
            return Err(EngineError::Conflict(format!(
                "proposal {} changed status before the revision landed",
                proposal.id
            )));
        }

        self.notifier.notify(NotifyRequest::to_user(
            identity.user_id.clone(),
            revision_received_message(&proposal.title),
        ));
        self.require_proposal(proposal_id)
    }

    /// Applies an administrator review decision to a proposal.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Forbidden`] for non-admins,
    /// [`EngineError::Validation`] for non-review target statuses or a
    /// missing rejection reason, [`EngineError::InvalidState`] for
    /// disallowed transitions, and [`EngineError::Conflict`] on a
    /// compare-and-swap miss.
    pub fn review_proposal(
        &self,
        identity: &Identity,
        proposal_id: &ProposalId,
        decision: ReviewDecision,
    ) -> Result<Proposal, EngineError> {
        require_role(identity, Role::Admin, "only admins review proposals")?;
        let proposal = self.require_proposal(proposal_id)?;
        if !ProposalStatus::is_review_target(decision.next) {
            return Err(EngineError::Validation(format!(
                "{} is not a valid review decision",
                decision.next.as_str()
            )));
        }
        if !proposal.status.can_transition(decision.next) {
            return Err(EngineError::InvalidState(format!(
                "proposal {} cannot move from {} to {}",
                proposal.id,
                proposal.status.as_str(),
                decision.next.as_str()
            )));
        }
        let comment = decision
            .comment
            .as_deref()
            .map(str::trim)
            .filter(|comment| !comment.is_empty());
        if decision.next == ProposalStatus::Rejected && comment.is_none() {
            return Err(EngineError::Validation(
                "a rejection reason is required".to_string(),
            ));
        }
        let rejection_reason = (decision.next == ProposalStatus::Rejected)
            .then(|| comment.unwrap_or_default());

        let swapped = self.storage.update_proposal_status(
            &proposal.id,
            proposal.status,
            decision.next,
            rejection_reason,
        )?;
        if !swapped {
            return Err(EngineError::Conflict(format!(
                "proposal {} was updated by another reviewer",
                proposal.id
            )));
        }

        self.notifier.notify(NotifyRequest::to_user(
            proposal.researcher_id.clone(),
            status_message(&proposal.title, decision.next, comment),
        ));
        self.require_proposal(proposal_id)
    }

    /// Edits the title and abstract of an undecided proposal.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Forbidden`] unless the caller owns the
    /// proposal and [`EngineError::InvalidState`] once a terminal decision
    /// has been recorded.
    pub fn edit_proposal(
        &self,
        identity: &Identity,
        proposal_id: &ProposalId,
        title: Option<String>,
        abstract_text: Option<String>,
    ) -> Result<Proposal, EngineError> {
        let proposal = self.require_proposal(proposal_id)?;
        require_owner(identity, &proposal)?;
        if proposal.status.is_terminal() {
            return Err(EngineError::InvalidState(format!(
                "proposal {} is {} and can no longer be edited",
                proposal.id,
                proposal.status.as_str()
            )));
        }
        let title = match title {
            Some(title) => Some(require_text("title", &title)?),
            None => None,
        };
        let abstract_text = match abstract_text {
            Some(text) => Some(require_text("abstract", &text)?),
            None => None,
        };
        if title.is_none() && abstract_text.is_none() {
            return Err(EngineError::Validation("nothing to update".to_string()));
        }

        self.storage
            .update_proposal_content(&proposal.id, title.as_deref(), abstract_text.as_deref())?
            .ok_or_else(|| EngineError::NotFound(format!("proposal {}", proposal.id)))
    }

    /// Deletes a proposal and its stored documents.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Forbidden`] unless the caller owns the
    /// proposal, admins included, and [`EngineError::InvalidState`] for
    /// approved proposals, which form the permanent award record.
    pub fn delete_proposal(
        &self,
        identity: &Identity,
        proposal_id: &ProposalId,
    ) -> Result<(), EngineError> {
        let proposal = self.require_proposal(proposal_id)?;
        require_owner(identity, &proposal)?;
        if proposal.status == ProposalStatus::Approved {
            return Err(EngineError::InvalidState(format!(
                "approved proposal {} cannot be deleted",
                proposal.id
            )));
        }

        let revisions = self.storage.revisions_for_proposal(&proposal.id)?;
        if !self.storage.delete_proposal(&proposal.id)? {
            return Err(EngineError::NotFound(format!("proposal {}", proposal.id)));
        }
        // Row is gone; document cleanup is best effort from here.
        self.discard_key(&proposal.document_key);
        for revision in &revisions {
            self.discard_key(&revision.revised_document_key);
        }
        Ok(())
    }

    /// Loads a proposal with its revision history.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Forbidden`] unless the caller owns the
    /// proposal or is an admin.
    pub fn proposal_detail(
        &self,
        identity: &Identity,
        proposal_id: &ProposalId,
    ) -> Result<ProposalDetail, EngineError> {
        let proposal = self.require_proposal(proposal_id)?;
        if !identity.is_admin() {
            require_owner(identity, &proposal)?;
        }
        let revisions = self.storage.revisions_for_proposal(&proposal.id)?;
        Ok(ProposalDetail {
            proposal,
            revisions,
        })
    }

    /// Lists proposals visible to the caller. Researchers only ever see
    /// their own; admins see everything the filter matches.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] when the query fails.
    pub fn list_proposals(
        &self,
        identity: &Identity,
        filter: ProposalFilter,
        page: PageRequest,
    ) -> Result<Page<Proposal>, EngineError> {
        let filter = if identity.is_admin() {
            filter
        } else {
            filter.scoped_to(identity.user_id.clone())
        };
        Ok(self.storage.list_proposals(&filter, page)?)
    }

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    /// Publishes a new call and broadcasts its announcement.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Forbidden`] for non-admins and
    /// [`EngineError::Validation`] for an empty payload or past deadline.
    pub fn create_call(
        &self,
        identity: &Identity,
        input: NewCall,
        now: Timestamp,
    ) -> Result<CallForProposal, EngineError> {
        require_role(identity, Role::Admin, "only admins publish calls")?;
        let title = require_text("title", &input.title)?;
        let description = require_text("description", &input.description)?;
        require_future("deadline", input.deadline, now)?;

        let call = CallForProposal {
            id: CallId::generate(),
            title,
            description,
            deadline: input.deadline,
            created_by: identity.user_id.clone(),
            created_at: now,
        };
        self.storage.create_call(&call)?;
        self.notifier
            .notify(NotifyRequest::broadcast(call_published_message(&call.title)));
        Ok(call)
    }

    /// Updates call fields.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Forbidden`] for non-admins,
    /// [`EngineError::Validation`] for an empty patch, and
    /// [`EngineError::NotFound`] for an unknown call.
    pub fn update_call(
        &self,
        identity: &Identity,
        call_id: &CallId,
        patch: CallPatch,
        now: Timestamp,
    ) -> Result<CallForProposal, EngineError> {
        require_role(identity, Role::Admin, "only admins edit calls")?;
        if patch.is_empty() {
            return Err(EngineError::Validation("nothing to update".to_string()));
        }
        let title = match patch.title {
            Some(title) => Some(require_text("title", &title)?),
            None => None,
        };
        let description = match patch.description {
            Some(description) => Some(require_text("description", &description)?),
            None => None,
        };
        if let Some(deadline) = patch.deadline {
            require_future("deadline", deadline, now)?;
        }

        self.storage
            .update_call(call_id, title.as_deref(), description.as_deref(), patch.deadline)?
            .ok_or_else(|| EngineError::NotFound(format!("call {call_id}")))
    }

    /// Deletes a call that has no proposals.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Forbidden`] for non-admins,
    /// [`EngineError::NotFound`] for an unknown call, and
    /// [`EngineError::Conflict`] when proposals still reference it.
    pub fn delete_call(&self, identity: &Identity, call_id: &CallId) -> Result<(), EngineError> {
        require_role(identity, Role::Admin, "only admins delete calls")?;
        if self.storage.delete_call(call_id)? {
            Ok(())
        } else {
            Err(EngineError::NotFound(format!("call {call_id}")))
        }
    }

    /// Loads a single call. Calls are public.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] for an unknown call.
    pub fn get_call(&self, call_id: &CallId) -> Result<CallForProposal, EngineError> {
        self.storage
            .call_by_id(call_id)?
            .ok_or_else(|| EngineError::NotFound(format!("call {call_id}")))
    }

    /// Lists calls, newest first. Calls are public.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] when the query fails.
    pub fn list_calls(&self, page: PageRequest) -> Result<Page<CallForProposal>, EngineError> {
        Ok(self.storage.list_calls(page)?)
    }

    // ------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------

    /// Lists the caller's notifications, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] when the query fails.
    pub fn notifications(
        &self,
        identity: &Identity,
        page: PageRequest,
    ) -> Result<Page<Notification>, EngineError> {
        Ok(self
            .storage
            .notifications_for_user(&identity.user_id, page)?)
    }

    /// Marks one of the caller's notifications as read.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] when no notification with that id
    /// belongs to the caller.
    pub fn mark_notification_read(
        &self,
        identity: &Identity,
        id: &NotificationId,
    ) -> Result<Notification, EngineError> {
        self.storage
            .mark_notification_read(id, &identity.user_id)?
            .ok_or_else(|| EngineError::NotFound(format!("notification {id}")))
    }

    // ------------------------------------------------------------------
    // Dashboard
    // ------------------------------------------------------------------

    /// Computes aggregate counts for the administrator dashboard.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Forbidden`] for non-admins.
    pub fn dashboard_stats(
        &self,
        identity: &Identity,
        now: Timestamp,
    ) -> Result<DashboardStats, EngineError> {
        require_role(identity, Role::Admin, "only admins view dashboard stats")?;
        let proposals_by_status = self.storage.proposal_status_counts()?;
        let total_proposals = proposals_by_status.iter().map(|(_, count)| count).sum();
        Ok(DashboardStats {
            proposals_by_status,
            total_proposals,
            open_calls: self.storage.count_open_calls(now)?,
            researchers: self.storage.count_users_with_role(Role::Researcher)?,
        })
    }

    // ------------------------------------------------------------------
    // Internal helpers
    // ------------------------------------------------------------------

    /// Loads a proposal or reports it missing.
    fn require_proposal(&self, id: &ProposalId) -> Result<Proposal, EngineError> {
        self.storage
            .proposal_by_id(id)?
            .ok_or_else(|| EngineError::NotFound(format!("proposal {id}")))
    }

    /// Best-effort removal of a freshly stored document.
    fn discard_document(&self, stored: &StoredDocument) {
        self.discard_key(&stored.key);
    }

    // Failures are swallowed: the caller already has a primary error (or a
    // completed delete) to report, and the document store logs its own.
    fn discard_key(&self, key: &str) {
        let _ = self.documents.delete(key);
    }
}

// ============================================================================
// SECTION: Validation Helpers
// ============================================================================

/// Requires the caller to hold exactly `role`.
fn require_role(identity: &Identity, role: Role, denial: &str) -> Result<(), EngineError> {
    if identity.role == role {
        Ok(())
    } else {
        Err(EngineError::Forbidden(denial.to_string()))
    }
}

/// Requires the caller to own the proposal.
fn require_owner(identity: &Identity, proposal: &Proposal) -> Result<(), EngineError> {
    if identity.user_id == proposal.researcher_id {
        Ok(())
    } else {
        Err(EngineError::Forbidden(format!(
            "proposal {} belongs to another researcher",
            proposal.id
        )))
    }
}

/// Requires a non-blank value, returning it trimmed.
fn require_text(field: &str, value: &str) -> Result<String, EngineError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(EngineError::Validation(format!("{field} must not be empty")))
    } else {
        Ok(trimmed.to_string())
    }
}

/// Requires a timestamp strictly after `now`.
fn require_future(field: &str, value: Timestamp, now: Timestamp) -> Result<(), EngineError> {
    if value.as_millis() > now.as_millis() {
        Ok(())
    } else {
        Err(EngineError::Validation(format!(
            "{field} must lie in the future"
        )))
    }
}
