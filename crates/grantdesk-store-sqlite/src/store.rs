// grantdesk-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Storage
// Description: Durable Storage implementation backed by SQLite WAL.
// Purpose: Persist users, calls, proposals, revisions, and notifications.
// Dependencies: grantdesk-core, rusqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! This module implements the [`Storage`] port over `SQLite`. The schema is
//! normalized with foreign keys enforced: proposals restrict call deletion,
//! revisions cascade with their proposal, and sessions and notifications
//! cascade with their user. Status transitions execute as single-row
//! compare-and-swap updates so concurrent reviewers cannot clobber each
//! other, and revision recording shares one transaction with the proposal's
//! document pointer and status update.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use grantdesk_core::CallForProposal;
use grantdesk_core::CallId;
use grantdesk_core::EmailVerification;
use grantdesk_core::Notification;
use grantdesk_core::NotificationId;
use grantdesk_core::Page;
use grantdesk_core::PageInfo;
use grantdesk_core::PageRequest;
use grantdesk_core::PasswordReset;
use grantdesk_core::Proposal;
use grantdesk_core::ProposalFilter;
use grantdesk_core::ProposalId;
use grantdesk_core::ProposalRevision;
use grantdesk_core::ProposalStatus;
use grantdesk_core::Role;
use grantdesk_core::Session;
use grantdesk_core::Storage;
use grantdesk_core::StoreError;
use grantdesk_core::Timestamp;
use grantdesk_core::User;
use grantdesk_core::UserId;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use rusqlite::params_from_iter;
use rusqlite::types::Value;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteJournalMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteJournalMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` storage backend.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStorageConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) | SqliteStoreError::VersionMismatch(message) => {
                Self::Store(message)
            }
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed storage with WAL support.
#[derive(Clone)]
pub struct SqliteStorage {
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Opens an `SQLite`-backed store, creating the schema when absent.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: &SqliteStorageConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Acquires the connection lock, failing closed on poison.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.connection
            .lock()
            .map_err(|_| StoreError::Store("connection mutex poisoned".to_string()))
    }
}

// ============================================================================
// SECTION: Storage Implementation
// ============================================================================

impl Storage for SqliteStorage {
    fn create_user(&self, user: &User) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO users (user_id, full_name, email, password_hash, role, verified, \
             created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                user.id.as_str(),
                user.full_name,
                user.email,
                user.password_hash,
                user.role.as_str(),
                i64::from(user.verified),
                user.created_at.as_millis()
            ],
        )
        .map_err(classify)?;
        Ok(())
    }

    fn user_by_id(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"),
            params![id.as_str()],
            map_user,
        )
        .optional()
        .map_err(classify)?
        .transpose()
    }

    fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
            params![email],
            map_user,
        )
        .optional()
        .map_err(classify)?
        .transpose()
    }

    fn update_user_profile(
        &self,
        id: &UserId,
        full_name: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, StoreError> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE users SET full_name = COALESCE(?2, full_name), email = COALESCE(?3, \
                 email) WHERE user_id = ?1",
                params![id.as_str(), full_name, email],
            )
            .map_err(classify)?;
        if changed == 0 {
            return Ok(None);
        }
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"),
            params![id.as_str()],
            map_user,
        )
        .optional()
        .map_err(classify)?
        .transpose()
    }

    fn update_user_password(&self, id: &UserId, password_hash: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE users SET password_hash = ?2 WHERE user_id = ?1",
                params![id.as_str(), password_hash],
            )
            .map_err(classify)?;
        Ok(changed == 1)
    }

    fn set_user_verified(&self, id: &UserId) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let changed = conn
            .execute("UPDATE users SET verified = 1 WHERE user_id = ?1", params![id.as_str()])
            .map_err(classify)?;
        Ok(changed == 1)
    }

    fn update_user_role(&self, id: &UserId, role: Role) -> Result<Option<User>, StoreError> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE users SET role = ?2 WHERE user_id = ?1",
                params![id.as_str(), role.as_str()],
            )
            .map_err(classify)?;
        if changed == 0 {
            return Ok(None);
        }
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"),
            params![id.as_str()],
            map_user,
        )
        .optional()
        .map_err(classify)?
        .transpose()
    }

    fn list_users(&self, page: PageRequest) -> Result<Page<User>, StoreError> {
        let conn = self.lock()?;
        let total: i64 = conn
            .query_row("SELECT COUNT(*) FROM users", params![], |row| row.get(0))
            .map_err(classify)?;
        let mut statement = conn
            .prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, user_id DESC LIMIT \
                 ?1 OFFSET ?2"
            ))
            .map_err(classify)?;
        let rows = statement
            .query_map(params![to_limit(page.limit), to_limit(page.offset())], map_user)
            .map_err(classify)?;
        let data = collect_rows(rows)?;
        Ok(Page::new(data, PageInfo::new(page, to_count(total))))
    }

    fn count_users_with_role(&self, role: Role) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let total: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM users WHERE role = ?1",
                params![role.as_str()],
                |row| row.get(0),
            )
            .map_err(classify)?;
        Ok(to_count(total))
    }

    fn all_user_ids(&self) -> Result<Vec<UserId>, StoreError> {
        let conn = self.lock()?;
        let mut statement =
            conn.prepare("SELECT user_id FROM users ORDER BY created_at ASC").map_err(classify)?;
        let rows = statement
            .query_map(params![], |row| {
                let id: String = row.get(0)?;
                Ok(UserId::new(id))
            })
            .map_err(classify)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(classify)
    }

    fn create_call(&self, call: &CallForProposal) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO calls (call_id, title, description, deadline, created_by, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                call.id.as_str(),
                call.title,
                call.description,
                call.deadline.as_millis(),
                call.created_by.as_str(),
                call.created_at.as_millis()
            ],
        )
        .map_err(classify)?;
        Ok(())
    }

    fn call_by_id(&self, id: &CallId) -> Result<Option<CallForProposal>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {CALL_COLUMNS} FROM calls WHERE call_id = ?1"),
            params![id.as_str()],
            map_call,
        )
        .optional()
        .map_err(classify)
    }

    fn update_call(
        &self,
        id: &CallId,
        title: Option<&str>,
        description: Option<&str>,
        deadline: Option<Timestamp>,
    ) -> Result<Option<CallForProposal>, StoreError> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE calls SET title = COALESCE(?2, title), description = COALESCE(?3, \
                 description), deadline = COALESCE(?4, deadline) WHERE call_id = ?1",
                params![id.as_str(), title, description, deadline.map(Timestamp::as_millis)],
            )
            .map_err(classify)?;
        if changed == 0 {
            return Ok(None);
        }
        conn.query_row(
            &format!("SELECT {CALL_COLUMNS} FROM calls WHERE call_id = ?1"),
            params![id.as_str()],
            map_call,
        )
        .optional()
        .map_err(classify)
    }

    fn delete_call(&self, id: &CallId) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let changed = conn
            .execute("DELETE FROM calls WHERE call_id = ?1", params![id.as_str()])
            .map_err(classify)?;
        Ok(changed == 1)
    }

    fn list_calls(&self, page: PageRequest) -> Result<Page<CallForProposal>, StoreError> {
        let conn = self.lock()?;
        let total: i64 = conn
            .query_row("SELECT COUNT(*) FROM calls", params![], |row| row.get(0))
            .map_err(classify)?;
        let mut statement = conn
            .prepare(&format!(
                "SELECT {CALL_COLUMNS} FROM calls ORDER BY created_at DESC, call_id DESC LIMIT \
                 ?1 OFFSET ?2"
            ))
            .map_err(classify)?;
        let rows = statement
            .query_map(params![to_limit(page.limit), to_limit(page.offset())], map_call)
            .map_err(classify)?;
        let data = rows.collect::<Result<Vec<_>, _>>().map_err(classify)?;
        Ok(Page::new(data, PageInfo::new(page, to_count(total))))
    }

    fn count_open_calls(&self, now: Timestamp) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let total: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM calls WHERE deadline > ?1",
                params![now.as_millis()],
                |row| row.get(0),
            )
            .map_err(classify)?;
        Ok(to_count(total))
    }

    fn create_proposal(&self, proposal: &Proposal) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO proposals (proposal_id, researcher_id, call_id, title, abstract_text, \
             document_url, document_key, status, rejection_reason, created_at) VALUES (?1, ?2, \
             ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                proposal.id.as_str(),
                proposal.researcher_id.as_str(),
                proposal.call_id.as_str(),
                proposal.title,
                proposal.abstract_text,
                proposal.document_url,
                proposal.document_key,
                proposal.status.as_str(),
                proposal.rejection_reason,
                proposal.created_at.as_millis()
            ],
        )
        .map_err(classify)?;
        Ok(())
    }

    fn proposal_by_id(&self, id: &ProposalId) -> Result<Option<Proposal>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {PROPOSAL_COLUMNS} FROM proposals WHERE proposal_id = ?1"),
            params![id.as_str()],
            map_proposal,
        )
        .optional()
        .map_err(classify)?
        .transpose()
    }

    fn update_proposal_content(
        &self,
        id: &ProposalId,
        title: Option<&str>,
        abstract_text: Option<&str>,
    ) -> Result<Option<Proposal>, StoreError> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE proposals SET title = COALESCE(?2, title), abstract_text = COALESCE(?3, \
                 abstract_text) WHERE proposal_id = ?1",
                params![id.as_str(), title, abstract_text],
            )
            .map_err(classify)?;
        if changed == 0 {
            return Ok(None);
        }
        conn.query_row(
            &format!("SELECT {PROPOSAL_COLUMNS} FROM proposals WHERE proposal_id = ?1"),
            params![id.as_str()],
            map_proposal,
        )
        .optional()
        .map_err(classify)?
        .transpose()
    }

    fn update_proposal_status(
        &self,
        id: &ProposalId,
        expected: ProposalStatus,
        next: ProposalStatus,
        rejection_reason: Option<&str>,
    ) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE proposals SET status = ?3, rejection_reason = ?4 WHERE proposal_id = ?1 \
                 AND status = ?2",
                params![id.as_str(), expected.as_str(), next.as_str(), rejection_reason],
            )
            .map_err(classify)?;
        Ok(changed == 1)
    }

    fn record_revision(
        &self,
        revision: &ProposalRevision,
        expected: ProposalStatus,
        next: ProposalStatus,
    ) -> Result<bool, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(classify)?;
        let swapped = tx
            .execute(
                "UPDATE proposals SET status = ?3, document_url = ?4, document_key = ?5 WHERE \
                 proposal_id = ?1 AND status = ?2",
                params![
                    revision.proposal_id.as_str(),
                    expected.as_str(),
                    next.as_str(),
                    revision.revised_document_url,
                    revision.revised_document_key
                ],
            )
            .map_err(classify)?;
        if swapped == 0 {
            // No commit: the transaction rolls back on drop.
            return Ok(false);
        }
        tx.execute(
            "INSERT INTO revisions (revision_id, proposal_id, revised_document_url, \
             revised_document_key, comments, submitted_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                revision.id.as_str(),
                revision.proposal_id.as_str(),
                revision.revised_document_url,
                revision.revised_document_key,
                revision.comments,
                revision.submitted_at.as_millis()
            ],
        )
        .map_err(classify)?;
        tx.commit().map_err(classify)?;
        Ok(true)
    }

    fn delete_proposal(&self, id: &ProposalId) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let changed = conn
            .execute("DELETE FROM proposals WHERE proposal_id = ?1", params![id.as_str()])
            .map_err(classify)?;
        Ok(changed == 1)
    }

    fn list_proposals(
        &self,
        filter: &ProposalFilter,
        page: PageRequest,
    ) -> Result<Page<Proposal>, StoreError> {
        let (clause, mut values) = filter_clause(filter);
        let conn = self.lock()?;
        let total: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM proposals{clause}"),
                params_from_iter(values.iter()),
                |row| row.get(0),
            )
            .map_err(classify)?;
        values.push(Value::Integer(to_limit(page.limit)));
        values.push(Value::Integer(to_limit(page.offset())));
        let mut statement = conn
            .prepare(&format!(
                "SELECT {PROPOSAL_COLUMNS} FROM proposals{clause} ORDER BY created_at DESC, \
                 proposal_id DESC LIMIT ? OFFSET ?"
            ))
            .map_err(classify)?;
        let rows = statement
            .query_map(params_from_iter(values.iter()), map_proposal)
            .map_err(classify)?;
        let data = collect_rows(rows)?;
        Ok(Page::new(data, PageInfo::new(page, to_count(total))))
    }

    fn count_proposals(&self, filter: &ProposalFilter) -> Result<u64, StoreError> {
        let (clause, values) = filter_clause(filter);
        let conn = self.lock()?;
        let total: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM proposals{clause}"),
                params_from_iter(values.iter()),
                |row| row.get(0),
            )
            .map_err(classify)?;
        Ok(to_count(total))
    }

    fn proposal_status_counts(&self) -> Result<Vec<(ProposalStatus, u64)>, StoreError> {
        let conn = self.lock()?;
        let mut statement = conn
            .prepare("SELECT status, COUNT(*) FROM proposals GROUP BY status ORDER BY status")
            .map_err(classify)?;
        let rows = statement
            .query_map(params![], |row| {
                let status: String = row.get(0)?;
                let count: i64 = row.get(1)?;
                Ok((status, count))
            })
            .map_err(classify)?;
        let mut counts = Vec::new();
        for row in rows {
            let (status, count) = row.map_err(classify)?;
            let status = parse_status(&status)?;
            counts.push((status, to_count(count)));
        }
        Ok(counts)
    }

    fn revisions_for_proposal(
        &self,
        id: &ProposalId,
    ) -> Result<Vec<ProposalRevision>, StoreError> {
        let conn = self.lock()?;
        let mut statement = conn
            .prepare(
                "SELECT revision_id, proposal_id, revised_document_url, revised_document_key, \
                 comments, submitted_at FROM revisions WHERE proposal_id = ?1 ORDER BY \
                 submitted_at DESC, revision_id DESC",
            )
            .map_err(classify)?;
        let rows = statement.query_map(params![id.as_str()], map_revision).map_err(classify)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(classify)
    }

    fn create_notification(&self, notification: &Notification) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO notifications (notification_id, user_id, message, is_read, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                notification.id.as_str(),
                notification.user_id.as_str(),
                notification.message,
                i64::from(notification.is_read),
                notification.created_at.as_millis()
            ],
        )
        .map_err(classify)?;
        Ok(())
    }

    fn notifications_for_user(
        &self,
        user_id: &UserId,
        page: PageRequest,
    ) -> Result<Page<Notification>, StoreError> {
        let conn = self.lock()?;
        let total: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM notifications WHERE user_id = ?1",
                params![user_id.as_str()],
                |row| row.get(0),
            )
            .map_err(classify)?;
        let mut statement = conn
            .prepare(
                "SELECT notification_id, user_id, message, is_read, created_at FROM \
                 notifications WHERE user_id = ?1 ORDER BY created_at DESC, notification_id \
                 DESC LIMIT ?2 OFFSET ?3",
            )
            .map_err(classify)?;
        let rows = statement
            .query_map(
                params![user_id.as_str(), to_limit(page.limit), to_limit(page.offset())],
                map_notification,
            )
            .map_err(classify)?;
        let data = rows.collect::<Result<Vec<_>, _>>().map_err(classify)?;
        Ok(Page::new(data, PageInfo::new(page, to_count(total))))
    }

    fn mark_notification_read(
        &self,
        id: &NotificationId,
        user_id: &UserId,
    ) -> Result<Option<Notification>, StoreError> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE notifications SET is_read = 1 WHERE notification_id = ?1 AND user_id = \
                 ?2",
                params![id.as_str(), user_id.as_str()],
            )
            .map_err(classify)?;
        if changed == 0 {
            return Ok(None);
        }
        conn.query_row(
            "SELECT notification_id, user_id, message, is_read, created_at FROM notifications \
             WHERE notification_id = ?1",
            params![id.as_str()],
            map_notification,
        )
        .optional()
        .map_err(classify)
    }

    fn upsert_password_reset(&self, reset: &PasswordReset) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO password_resets (user_id, token_fingerprint, expires_at) VALUES (?1, \
             ?2, ?3) ON CONFLICT(user_id) DO UPDATE SET token_fingerprint = \
             excluded.token_fingerprint, expires_at = excluded.expires_at",
            params![
                reset.user_id.as_str(),
                reset.token_fingerprint,
                reset.expires_at.as_millis()
            ],
        )
        .map_err(classify)?;
        Ok(())
    }

    fn password_reset_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<PasswordReset>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT user_id, token_fingerprint, expires_at FROM password_resets WHERE user_id = \
             ?1",
            params![user_id.as_str()],
            |row| {
                let user_id: String = row.get(0)?;
                Ok(PasswordReset {
                    user_id: UserId::new(user_id),
                    token_fingerprint: row.get(1)?,
                    expires_at: Timestamp(row.get(2)?),
                })
            },
        )
        .optional()
        .map_err(classify)
    }

    fn delete_password_reset(&self, user_id: &UserId) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM password_resets WHERE user_id = ?1",
            params![user_id.as_str()],
        )
        .map_err(classify)?;
        Ok(())
    }

    fn upsert_email_verification(
        &self,
        verification: &EmailVerification,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO email_verifications (user_id, token_fingerprint, expires_at) VALUES \
             (?1, ?2, ?3) ON CONFLICT(user_id) DO UPDATE SET token_fingerprint = \
             excluded.token_fingerprint, expires_at = excluded.expires_at",
            params![
                verification.user_id.as_str(),
                verification.token_fingerprint,
                verification.expires_at.as_millis()
            ],
        )
        .map_err(classify)?;
        Ok(())
    }

    fn email_verification_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<EmailVerification>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT user_id, token_fingerprint, expires_at FROM email_verifications WHERE \
             user_id = ?1",
            params![user_id.as_str()],
            |row| {
                let user_id: String = row.get(0)?;
                Ok(EmailVerification {
                    user_id: UserId::new(user_id),
                    token_fingerprint: row.get(1)?,
                    expires_at: Timestamp(row.get(2)?),
                })
            },
        )
        .optional()
        .map_err(classify)
    }

    fn delete_email_verification(&self, user_id: &UserId) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM email_verifications WHERE user_id = ?1",
            params![user_id.as_str()],
        )
        .map_err(classify)?;
        Ok(())
    }

    fn create_session(&self, session: &Session) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO sessions (token_fingerprint, user_id, expires_at, created_at) VALUES \
             (?1, ?2, ?3, ?4)",
            params![
                session.token_fingerprint,
                session.user_id.as_str(),
                session.expires_at.as_millis(),
                session.created_at.as_millis()
            ],
        )
        .map_err(classify)?;
        Ok(())
    }

    fn session_by_fingerprint(&self, fingerprint: &str) -> Result<Option<Session>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT token_fingerprint, user_id, expires_at, created_at FROM sessions WHERE \
             token_fingerprint = ?1",
            params![fingerprint],
            |row| {
                let user_id: String = row.get(1)?;
                Ok(Session {
                    token_fingerprint: row.get(0)?,
                    user_id: UserId::new(user_id),
                    expires_at: Timestamp(row.get(2)?),
                    created_at: Timestamp(row.get(3)?),
                })
            },
        )
        .optional()
        .map_err(classify)
    }

    fn delete_session(&self, fingerprint: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM sessions WHERE token_fingerprint = ?1", params![fingerprint])
            .map_err(classify)?;
        Ok(())
    }

    fn delete_expired_sessions(&self, now: Timestamp) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let changed = conn
            .execute("DELETE FROM sessions WHERE expires_at <= ?1", params![now.as_millis()])
            .map_err(classify)?;
        Ok(changed as u64)
    }
}

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

/// Column list shared by every user query.
const USER_COLUMNS: &str =
    "user_id, full_name, email, password_hash, role, verified, created_at";
/// Column list shared by every call query.
const CALL_COLUMNS: &str = "call_id, title, description, deadline, created_by, created_at";
/// Column list shared by every proposal query.
const PROPOSAL_COLUMNS: &str = "proposal_id, researcher_id, call_id, title, abstract_text, \
                                document_url, document_key, status, rejection_reason, created_at";

/// Maps a user row; role parsing is deferred so bad data fails closed.
fn map_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<User, StoreError>> {
    let id: String = row.get(0)?;
    let full_name: String = row.get(1)?;
    let email: String = row.get(2)?;
    let password_hash: String = row.get(3)?;
    let role: String = row.get(4)?;
    let verified: i64 = row.get(5)?;
    let created_at: i64 = row.get(6)?;
    Ok(parse_role(&role).map(|role| User {
        id: UserId::new(id),
        full_name,
        email,
        password_hash,
        role,
        verified: verified != 0,
        created_at: Timestamp(created_at),
    }))
}

/// Maps a call row.
fn map_call(row: &rusqlite::Row<'_>) -> rusqlite::Result<CallForProposal> {
    let id: String = row.get(0)?;
    let created_by: String = row.get(4)?;
    Ok(CallForProposal {
        id: CallId::new(id),
        title: row.get(1)?,
        description: row.get(2)?,
        deadline: Timestamp(row.get(3)?),
        created_by: UserId::new(created_by),
        created_at: Timestamp(row.get(5)?),
    })
}

/// Maps a proposal row; status parsing is deferred so bad data fails closed.
fn map_proposal(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<Proposal, StoreError>> {
    let id: String = row.get(0)?;
    let researcher_id: String = row.get(1)?;
    let call_id: String = row.get(2)?;
    let title: String = row.get(3)?;
    let abstract_text: String = row.get(4)?;
    let document_url: String = row.get(5)?;
    let document_key: String = row.get(6)?;
    let status: String = row.get(7)?;
    let rejection_reason: Option<String> = row.get(8)?;
    let created_at: i64 = row.get(9)?;
    Ok(parse_status(&status).map(|status| Proposal {
        id: ProposalId::new(id),
        researcher_id: UserId::new(researcher_id),
        call_id: CallId::new(call_id),
        title,
        abstract_text,
        document_url,
        document_key,
        status,
        rejection_reason,
        created_at: Timestamp(created_at),
    }))
}

/// Maps a revision row.
fn map_revision(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProposalRevision> {
    let id: String = row.get(0)?;
    let proposal_id: String = row.get(1)?;
    Ok(ProposalRevision {
        id: grantdesk_core::RevisionId::new(id),
        proposal_id: ProposalId::new(proposal_id),
        revised_document_url: row.get(2)?,
        revised_document_key: row.get(3)?,
        comments: row.get(4)?,
        submitted_at: Timestamp(row.get(5)?),
    })
}

/// Maps a notification row.
fn map_notification(row: &rusqlite::Row<'_>) -> rusqlite::Result<Notification> {
    let id: String = row.get(0)?;
    let user_id: String = row.get(1)?;
    let is_read: i64 = row.get(3)?;
    Ok(Notification {
        id: NotificationId::new(id),
        user_id: UserId::new(user_id),
        message: row.get(2)?,
        is_read: is_read != 0,
        created_at: Timestamp(row.get(4)?),
    })
}

/// Collects two-stage rows, surfacing deferred parse failures.
fn collect_rows<T>(
    rows: impl Iterator<Item = rusqlite::Result<Result<T, StoreError>>>,
) -> Result<Vec<T>, StoreError> {
    let mut data = Vec::new();
    for row in rows {
        data.push(row.map_err(classify)??);
    }
    Ok(data)
}

/// Parses a stored role label, failing closed on unknown data.
fn parse_role(label: &str) -> Result<Role, StoreError> {
    Role::parse(label).ok_or_else(|| StoreError::Invalid(format!("unknown role: {label}")))
}

/// Parses a stored status label, failing closed on unknown data.
fn parse_status(label: &str) -> Result<ProposalStatus, StoreError> {
    ProposalStatus::parse(label)
        .ok_or_else(|| StoreError::Invalid(format!("unknown proposal status: {label}")))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds the WHERE clause and parameter values for a proposal filter.
fn filter_clause(filter: &ProposalFilter) -> (String, Vec<Value>) {
    let mut clauses = Vec::new();
    let mut values = Vec::new();
    if let Some(status) = filter.status {
        values.push(Value::Text(status.as_str().to_string()));
        clauses.push(format!("status = ?{}", values.len()));
    }
    if let Some(call_id) = &filter.call_id {
        values.push(Value::Text(call_id.as_str().to_string()));
        clauses.push(format!("call_id = ?{}", values.len()));
    }
    if let Some(researcher_id) = &filter.researcher_id {
        values.push(Value::Text(researcher_id.as_str().to_string()));
        clauses.push(format!("researcher_id = ?{}", values.len()));
    }
    if let Some(term) = filter.search_term.as_deref()
        && !term.is_empty()
    {
        values.push(Value::Text(like_pattern(term)));
        let index = values.len();
        clauses.push(format!(
            "(LOWER(title) LIKE ?{index} ESCAPE '\\' OR LOWER(abstract_text) LIKE ?{index} \
             ESCAPE '\\')"
        ));
    }
    if clauses.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), values)
    }
}

/// Builds a case-folded LIKE pattern with wildcards escaped.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.to_lowercase().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

/// Converts an unsigned limit or offset into an `SQLite` integer.
fn to_limit(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Converts a `COUNT(*)` result into an unsigned total.
fn to_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

/// Classifies a `SQLite` error into the storage error taxonomy.
fn classify(err: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(failure, ref message) = err
        && failure.code == rusqlite::ErrorCode::ConstraintViolation
    {
        let detail = message.clone().unwrap_or_else(|| failure.to_string());
        if detail.contains("UNIQUE") {
            return StoreError::Duplicate(detail);
        }
        return StoreError::Constraint(detail);
    }
    StoreError::Store(err.to_string())
}

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.exists() && path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStorageConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStorageConfig,
) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS users (
                    user_id TEXT PRIMARY KEY,
                    full_name TEXT NOT NULL,
                    email TEXT NOT NULL UNIQUE,
                    password_hash TEXT NOT NULL,
                    role TEXT NOT NULL,
                    verified INTEGER NOT NULL DEFAULT 0,
                    created_at INTEGER NOT NULL
                );
                CREATE TABLE IF NOT EXISTS calls (
                    call_id TEXT PRIMARY KEY,
                    title TEXT NOT NULL,
                    description TEXT NOT NULL,
                    deadline INTEGER NOT NULL,
                    created_by TEXT NOT NULL,
                    created_at INTEGER NOT NULL,
                    FOREIGN KEY (created_by) REFERENCES users(user_id)
                );
                CREATE TABLE IF NOT EXISTS proposals (
                    proposal_id TEXT PRIMARY KEY,
                    researcher_id TEXT NOT NULL,
                    call_id TEXT NOT NULL,
                    title TEXT NOT NULL,
                    abstract_text TEXT NOT NULL,
                    document_url TEXT NOT NULL,
                    document_key TEXT NOT NULL,
                    status TEXT NOT NULL,
                    rejection_reason TEXT,
                    created_at INTEGER NOT NULL,
                    FOREIGN KEY (researcher_id) REFERENCES users(user_id),
                    FOREIGN KEY (call_id) REFERENCES calls(call_id) ON DELETE RESTRICT
                );
                CREATE TABLE IF NOT EXISTS revisions (
                    revision_id TEXT PRIMARY KEY,
                    proposal_id TEXT NOT NULL,
                    revised_document_url TEXT NOT NULL,
                    revised_document_key TEXT NOT NULL,
                    comments TEXT NOT NULL,
                    submitted_at INTEGER NOT NULL,
                    FOREIGN KEY (proposal_id) REFERENCES proposals(proposal_id) ON DELETE CASCADE
                );
                CREATE TABLE IF NOT EXISTS notifications (
                    notification_id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    message TEXT NOT NULL,
                    is_read INTEGER NOT NULL DEFAULT 0,
                    created_at INTEGER NOT NULL,
                    FOREIGN KEY (user_id) REFERENCES users(user_id) ON DELETE CASCADE
                );
                CREATE TABLE IF NOT EXISTS password_resets (
                    user_id TEXT PRIMARY KEY,
                    token_fingerprint TEXT NOT NULL,
                    expires_at INTEGER NOT NULL,
                    FOREIGN KEY (user_id) REFERENCES users(user_id) ON DELETE CASCADE
                );
                CREATE TABLE IF NOT EXISTS email_verifications (
                    user_id TEXT PRIMARY KEY,
                    token_fingerprint TEXT NOT NULL,
                    expires_at INTEGER NOT NULL,
                    FOREIGN KEY (user_id) REFERENCES users(user_id) ON DELETE CASCADE
                );
                CREATE TABLE IF NOT EXISTS sessions (
                    token_fingerprint TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    expires_at INTEGER NOT NULL,
                    created_at INTEGER NOT NULL,
                    FOREIGN KEY (user_id) REFERENCES users(user_id) ON DELETE CASCADE
                );
                CREATE INDEX IF NOT EXISTS idx_proposals_researcher
                    ON proposals (researcher_id);
                CREATE INDEX IF NOT EXISTS idx_proposals_call
                    ON proposals (call_id);
                CREATE INDEX IF NOT EXISTS idx_proposals_status
                    ON proposals (status);
                CREATE INDEX IF NOT EXISTS idx_revisions_proposal
                    ON revisions (proposal_id);
                CREATE INDEX IF NOT EXISTS idx_notifications_user
                    ON notifications (user_id);
                CREATE INDEX IF NOT EXISTS idx_sessions_user
                    ON sessions (user_id);",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}
