// grantdesk-core/src/core/notification.rs
// ============================================================================
// Module: Grantdesk Notification Model
// Description: In-app notification records.
// Purpose: Define the per-user notification entity.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Every delivered notification is a per-user record; broadcast requests fan
//! out to one record per user at send time. After creation, only `is_read`
//! may change.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::NotificationId;
use crate::core::identifiers::UserId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Notification
// ============================================================================

/// An in-app notification delivered to a single user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Notification identifier.
    pub id: NotificationId,
    /// Recipient user.
    pub user_id: UserId,
    /// Human-readable message.
    pub message: String,
    /// Read flag; the only mutable field.
    pub is_read: bool,
    /// Creation time.
    pub created_at: Timestamp,
}

impl Notification {
    /// Builds an unread notification for a recipient.
    #[must_use]
    pub fn new(user_id: UserId, message: impl Into<String>, created_at: Timestamp) -> Self {
        Self {
            id: NotificationId::generate(),
            user_id,
            message: message.into(),
            is_read: false,
            created_at,
        }
    }
}
