// grantdesk-core/src/runtime/memory.rs
// ============================================================================
// Module: In-Memory Backends
// Description: Mutex-guarded in-memory implementations of the port traits.
// Purpose: Back tests and ephemeral tooling without external services.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! [`InMemoryStorage`] implements the full [`Storage`] contract over plain
//! vectors behind a mutex, matching the relational backend's semantics
//! (uniqueness, compare-and-swap transitions, referential restrictions) so
//! engine tests exercise the same behavior the production store exhibits.
//! [`MemoryDocumentStore`] and [`RecordingNotifier`] round out the ports for
//! tests that need to observe uploads and notifications.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::core::CallForProposal;
use crate::core::CallId;
use crate::core::EmailVerification;
use crate::core::Notification;
use crate::core::NotificationId;
use crate::core::Page;
use crate::core::PageInfo;
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
use crate::interfaces::DocumentError;
use crate::interfaces::DocumentStore;
use crate::interfaces::DocumentUpload;
use crate::interfaces::MAX_DOCUMENT_BYTES;
use crate::interfaces::Notifier;
use crate::interfaces::NotifyRequest;
use crate::interfaces::PDF_CONTENT_TYPE;
use crate::interfaces::Storage;
use crate::interfaces::StoreError;
use crate::interfaces::StoredDocument;

// ============================================================================
// SECTION: In-Memory Storage
// ============================================================================

/// Mutable backing state for [`InMemoryStorage`].
#[derive(Default)]
struct State {
    /// Registered users.
    users: Vec<User>,
    /// Published calls.
    calls: Vec<CallForProposal>,
    /// Submitted proposals.
    proposals: Vec<Proposal>,
    /// Recorded revisions.
    revisions: Vec<ProposalRevision>,
    /// In-app notifications.
    notifications: Vec<Notification>,
    /// Live password resets.
    resets: Vec<PasswordReset>,
    /// Live email verification tokens.
    verifications: Vec<EmailVerification>,
    /// Live sessions.
    sessions: Vec<Session>,
}

/// In-memory [`Storage`] implementation.
#[derive(Default)]
pub struct InMemoryStorage {
    /// Mutex-guarded backing state.
    state: Mutex<State>,
}

impl InMemoryStorage {
    /// Builds an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the state lock, failing closed on poison.
    fn lock(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Store("storage mutex poisoned".to_string()))
    }
}

/// Slices filtered rows into a page envelope.
fn paginate<T: Clone>(rows: Vec<&T>, page: PageRequest) -> Page<T> {
    let total = rows.len() as u64;
    let data = rows
        .into_iter()
        .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
        .take(usize::try_from(page.limit).unwrap_or(usize::MAX))
        .cloned()
        .collect();
    Page::new(data, PageInfo::new(page, total))
}

/// True when a proposal satisfies every set filter field.
fn matches(filter: &ProposalFilter, proposal: &Proposal) -> bool {
    filter
        .status
        .is_none_or(|status| proposal.status == status)
        && filter
            .call_id
            .as_ref()
            .is_none_or(|call_id| &proposal.call_id == call_id)
        && filter
            .researcher_id
            .as_ref()
            .is_none_or(|researcher| &proposal.researcher_id == researcher)
        && filter.matches_search(&proposal.title, &proposal.abstract_text)
}

impl Storage for InMemoryStorage {
    fn create_user(&self, user: &User) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if state.users.iter().any(|existing| existing.email == user.email) {
            return Err(StoreError::Duplicate(format!(
                "email {} is already registered",
                user.email
            )));
        }
        state.users.push(user.clone());
        Ok(())
    }

    fn user_by_id(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        let state = self.lock()?;
        Ok(state.users.iter().find(|user| &user.id == id).cloned())
    }

    fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let state = self.lock()?;
        Ok(state.users.iter().find(|user| user.email == email).cloned())
    }

    fn update_user_profile(
        &self,
        id: &UserId,
        full_name: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, StoreError> {
        let mut state = self.lock()?;
        if let Some(email) = email
            && state
                .users
                .iter()
                .any(|user| user.email == email && &user.id != id)
        {
            return Err(StoreError::Duplicate(format!(
                "email {email} is already registered"
            )));
        }
        let Some(user) = state.users.iter_mut().find(|user| &user.id == id) else {
            return Ok(None);
        };
        if let Some(full_name) = full_name {
            user.full_name = full_name.to_string();
        }
        if let Some(email) = email {
            user.email = email.to_string();
        }
        Ok(Some(user.clone()))
    }

    fn update_user_password(&self, id: &UserId, password_hash: &str) -> Result<bool, StoreError> {
        let mut state = self.lock()?;
        let Some(user) = state.users.iter_mut().find(|user| &user.id == id) else {
            return Ok(false);
        };
        user.password_hash = password_hash.to_string();
        Ok(true)
    }

    fn set_user_verified(&self, id: &UserId) -> Result<bool, StoreError> {
        let mut state = self.lock()?;
        let Some(user) = state.users.iter_mut().find(|user| &user.id == id) else {
            return Ok(false);
        };
        user.verified = true;
        Ok(true)
    }

    fn update_user_role(&self, id: &UserId, role: Role) -> Result<Option<User>, StoreError> {
        let mut state = self.lock()?;
        let Some(user) = state.users.iter_mut().find(|user| &user.id == id) else {
            return Ok(None);
        };
        user.role = role;
        Ok(Some(user.clone()))
    }

    fn list_users(&self, page: PageRequest) -> Result<Page<User>, StoreError> {
        let state = self.lock()?;
        let mut rows: Vec<&User> = state.users.iter().collect();
        rows.sort_by_key(|user| std::cmp::Reverse(user.created_at.as_millis()));
        Ok(paginate(rows, page))
    }

    fn count_users_with_role(&self, role: Role) -> Result<u64, StoreError> {
        let state = self.lock()?;
        Ok(state.users.iter().filter(|user| user.role == role).count() as u64)
    }

    fn all_user_ids(&self) -> Result<Vec<UserId>, StoreError> {
        let state = self.lock()?;
        Ok(state.users.iter().map(|user| user.id.clone()).collect())
    }

    fn create_call(&self, call: &CallForProposal) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.calls.push(call.clone());
        Ok(())
    }

    fn call_by_id(&self, id: &CallId) -> Result<Option<CallForProposal>, StoreError> {
        let state = self.lock()?;
        Ok(state.calls.iter().find(|call| &call.id == id).cloned())
    }

    fn update_call(
        &self,
        id: &CallId,
        title: Option<&str>,
        description: Option<&str>,
        deadline: Option<Timestamp>,
    ) -> Result<Option<CallForProposal>, StoreError> {
        let mut state = self.lock()?;
        let Some(call) = state.calls.iter_mut().find(|call| &call.id == id) else {
            return Ok(None);
        };
        if let Some(title) = title {
            call.title = title.to_string();
        }
        if let Some(description) = description {
            call.description = description.to_string();
        }
        if let Some(deadline) = deadline {
            call.deadline = deadline;
        }
        Ok(Some(call.clone()))
    }

    fn delete_call(&self, id: &CallId) -> Result<bool, StoreError> {
        let mut state = self.lock()?;
        if state
            .proposals
            .iter()
            .any(|proposal| &proposal.call_id == id)
        {
            return Err(StoreError::Constraint(format!(
                "call {id} still has proposals"
            )));
        }
        let before = state.calls.len();
        state.calls.retain(|call| &call.id != id);
        Ok(state.calls.len() < before)
    }

    fn list_calls(&self, page: PageRequest) -> Result<Page<CallForProposal>, StoreError> {
        let state = self.lock()?;
        let mut rows: Vec<&CallForProposal> = state.calls.iter().collect();
        rows.sort_by_key(|call| std::cmp::Reverse(call.created_at.as_millis()));
        Ok(paginate(rows, page))
    }

    fn count_open_calls(&self, now: Timestamp) -> Result<u64, StoreError> {
        let state = self.lock()?;
        Ok(state.calls.iter().filter(|call| call.is_open(now)).count() as u64)
    }

    fn create_proposal(&self, proposal: &Proposal) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.proposals.push(proposal.clone());
        Ok(())
    }

    fn proposal_by_id(&self, id: &ProposalId) -> Result<Option<Proposal>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .proposals
            .iter()
            .find(|proposal| &proposal.id == id)
            .cloned())
    }

    fn update_proposal_content(
        &self,
        id: &ProposalId,
        title: Option<&str>,
        abstract_text: Option<&str>,
    ) -> Result<Option<Proposal>, StoreError> {
        let mut state = self.lock()?;
        let Some(proposal) = state.proposals.iter_mut().find(|proposal| &proposal.id == id)
        else {
            return Ok(None);
        };
        if let Some(title) = title {
            proposal.title = title.to_string();
        }
        if let Some(abstract_text) = abstract_text {
            proposal.abstract_text = abstract_text.to_string();
        }
        Ok(Some(proposal.clone()))
    }

    fn update_proposal_status(
        &self,
        id: &ProposalId,
        expected: ProposalStatus,
        next: ProposalStatus,
        rejection_reason: Option<&str>,
    ) -> Result<bool, StoreError> {
        let mut state = self.lock()?;
        let Some(proposal) = state
            .proposals
            .iter_mut()
            .find(|proposal| &proposal.id == id && proposal.status == expected)
        else {
            return Ok(false);
        };
        proposal.status = next;
        proposal.rejection_reason = rejection_reason.map(str::to_string);
        Ok(true)
    }

    fn record_revision(
        &self,
        revision: &ProposalRevision,
        expected: ProposalStatus,
        next: ProposalStatus,
    ) -> Result<bool, StoreError> {
        let mut state = self.lock()?;
        let Some(proposal) = state
            .proposals
            .iter_mut()
            .find(|proposal| proposal.id == revision.proposal_id && proposal.status == expected)
        else {
            return Ok(false);
        };
        proposal.status = next;
        proposal.document_url = revision.revised_document_url.clone();
        proposal.document_key = revision.revised_document_key.clone();
        state.revisions.push(revision.clone());
        Ok(true)
    }

    fn delete_proposal(&self, id: &ProposalId) -> Result<bool, StoreError> {
        let mut state = self.lock()?;
        let before = state.proposals.len();
        state.proposals.retain(|proposal| &proposal.id != id);
        state.revisions.retain(|revision| &revision.proposal_id != id);
        Ok(state.proposals.len() < before)
    }

    fn list_proposals(
        &self,
        filter: &ProposalFilter,
        page: PageRequest,
    ) -> Result<Page<Proposal>, StoreError> {
        let state = self.lock()?;
        let mut rows: Vec<&Proposal> = state
            .proposals
            .iter()
            .filter(|proposal| matches(filter, proposal))
            .collect();
        rows.sort_by_key(|proposal| std::cmp::Reverse(proposal.created_at.as_millis()));
        Ok(paginate(rows, page))
    }

    fn count_proposals(&self, filter: &ProposalFilter) -> Result<u64, StoreError> {
        let state = self.lock()?;
        Ok(state
            .proposals
            .iter()
            .filter(|proposal| matches(filter, proposal))
            .count() as u64)
    }

    fn proposal_status_counts(&self) -> Result<Vec<(ProposalStatus, u64)>, StoreError> {
        let state = self.lock()?;
        let mut counts: HashMap<ProposalStatus, u64> = HashMap::new();
        for proposal in &state.proposals {
            *counts.entry(proposal.status).or_default() += 1;
        }
        Ok(ProposalStatus::ALL
            .into_iter()
            .filter_map(|status| counts.get(&status).map(|count| (status, *count)))
            .collect())
    }

    fn revisions_for_proposal(
        &self,
        id: &ProposalId,
    ) -> Result<Vec<ProposalRevision>, StoreError> {
        let state = self.lock()?;
        let mut rows: Vec<ProposalRevision> = state
            .revisions
            .iter()
            .filter(|revision| &revision.proposal_id == id)
            .cloned()
            .collect();
        rows.sort_by_key(|revision| std::cmp::Reverse(revision.submitted_at.as_millis()));
        Ok(rows)
    }

    fn create_notification(&self, notification: &Notification) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.notifications.push(notification.clone());
        Ok(())
    }

    fn notifications_for_user(
        &self,
        user_id: &UserId,
        page: PageRequest,
    ) -> Result<Page<Notification>, StoreError> {
        let state = self.lock()?;
        let mut rows: Vec<&Notification> = state
            .notifications
            .iter()
            .filter(|notification| &notification.user_id == user_id)
            .collect();
        rows.sort_by_key(|notification| std::cmp::Reverse(notification.created_at.as_millis()));
        Ok(paginate(rows, page))
    }

    fn mark_notification_read(
        &self,
        id: &NotificationId,
        user_id: &UserId,
    ) -> Result<Option<Notification>, StoreError> {
        let mut state = self.lock()?;
        let Some(notification) = state
            .notifications
            .iter_mut()
            .find(|notification| &notification.id == id && &notification.user_id == user_id)
        else {
            return Ok(None);
        };
        notification.is_read = true;
        Ok(Some(notification.clone()))
    }

    fn upsert_password_reset(&self, reset: &PasswordReset) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.resets.retain(|existing| existing.user_id != reset.user_id);
        state.resets.push(reset.clone());
        Ok(())
    }

    fn password_reset_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<PasswordReset>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .resets
            .iter()
            .find(|reset| &reset.user_id == user_id)
            .cloned())
    }

    fn delete_password_reset(&self, user_id: &UserId) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.resets.retain(|reset| &reset.user_id != user_id);
        Ok(())
    }

    fn upsert_email_verification(
        &self,
        verification: &EmailVerification,
    ) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.verifications.retain(|existing| existing.user_id != verification.user_id);
        state.verifications.push(verification.clone());
        Ok(())
    }

    fn email_verification_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<EmailVerification>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .verifications
            .iter()
            .find(|verification| &verification.user_id == user_id)
            .cloned())
    }

    fn delete_email_verification(&self, user_id: &UserId) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.verifications.retain(|verification| &verification.user_id != user_id);
        Ok(())
    }

    fn create_session(&self, session: &Session) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.sessions.push(session.clone());
        Ok(())
    }

    fn session_by_fingerprint(&self, fingerprint: &str) -> Result<Option<Session>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .sessions
            .iter()
            .find(|session| session.token_fingerprint == fingerprint)
            .cloned())
    }

    fn delete_session(&self, fingerprint: &str) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state
            .sessions
            .retain(|session| session.token_fingerprint != fingerprint);
        Ok(())
    }

    fn delete_expired_sessions(&self, now: Timestamp) -> Result<u64, StoreError> {
        let mut state = self.lock()?;
        let before = state.sessions.len();
        state
            .sessions
            .retain(|session| session.expires_at.as_millis() > now.as_millis());
        Ok((before - state.sessions.len()) as u64)
    }
}

// ============================================================================
// SECTION: In-Memory Document Store
// ============================================================================

/// In-memory [`DocumentStore`] enforcing the PDF and size contract.
#[derive(Default)]
pub struct MemoryDocumentStore {
    /// Stored document bytes keyed by handle.
    documents: Mutex<HashMap<String, Vec<u8>>>,
    /// Monotonic handle counter.
    next_key: Mutex<u64>,
}

impl MemoryDocumentStore {
    /// Builds an empty document store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently held.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Failed`] when the mutex is poisoned.
    pub fn len(&self) -> Result<usize, DocumentError> {
        Ok(self
            .documents
            .lock()
            .map_err(|_| DocumentError::Failed("document mutex poisoned".to_string()))?
            .len())
    }

    /// True when no documents are held.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Failed`] when the mutex is poisoned.
    pub fn is_empty(&self) -> Result<bool, DocumentError> {
        Ok(self.len()? == 0)
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn store(&self, upload: &DocumentUpload) -> Result<StoredDocument, DocumentError> {
        if upload.content_type != PDF_CONTENT_TYPE {
            return Err(DocumentError::Rejected(format!(
                "unsupported content type {}",
                upload.content_type
            )));
        }
        if upload.bytes.len() > MAX_DOCUMENT_BYTES {
            return Err(DocumentError::Rejected(format!(
                "document exceeds {MAX_DOCUMENT_BYTES} bytes"
            )));
        }
        let mut next_key = self
            .next_key
            .lock()
            .map_err(|_| DocumentError::Failed("document mutex poisoned".to_string()))?;
        *next_key += 1;
        let key = format!("doc-{next_key}.pdf");
        self.documents
            .lock()
            .map_err(|_| DocumentError::Failed("document mutex poisoned".to_string()))?
            .insert(key.clone(), upload.bytes.clone());
        Ok(StoredDocument {
            url: format!("/documents/{key}"),
            key,
        })
    }

    fn delete(&self, key: &str) -> Result<(), DocumentError> {
        let removed = self
            .documents
            .lock()
            .map_err(|_| DocumentError::Failed("document mutex poisoned".to_string()))?
            .remove(key);
        match removed {
            Some(_) => Ok(()),
            None => Err(DocumentError::NotFound(key.to_string())),
        }
    }
}

// ============================================================================
// SECTION: Recording Notifier
// ============================================================================

/// Notifier that records every request for later inspection in tests.
#[derive(Default)]
pub struct RecordingNotifier {
    /// Recorded requests in arrival order.
    requests: Mutex<Vec<NotifyRequest>>,
}

impl RecordingNotifier {
    /// Builds an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of every recorded request.
    #[must_use]
    pub fn requests(&self) -> Vec<NotifyRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, request: NotifyRequest) {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
    }
}
