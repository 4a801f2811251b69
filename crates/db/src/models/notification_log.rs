//! Notification ledger models.

use courier_core::error::CoreError;
use courier_core::notification_status::NotificationStatus;
use courier_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from `notification_logs`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct NotificationLog {
    pub id: DbId,
    pub user_id: DbId,
    pub client_id: DbId,
    pub trigger_id: Option<DbId>,
    pub channel: String,
    pub status: String,
    pub sent_at: Timestamp,
    pub read_at: Option<Timestamp>,
    pub template_title: Option<String>,
    pub message: String,
    pub external_message_id: Option<String>,
    pub external_peer_id: Option<String>,
    pub error_message: Option<String>,
    pub updated_at: Timestamp,
}

impl NotificationLog {
    pub fn status(&self) -> Result<NotificationStatus, CoreError> {
        self.status.parse().map_err(CoreError::Internal)
    }

    /// The external message id as an ordinal, when it is numeric.
    pub fn external_ordinal(&self) -> Option<i64> {
        self.external_message_id.as_deref()?.trim().parse().ok()
    }
}

/// DTO for enqueueing a ledger row.
#[derive(Debug, Clone)]
pub struct CreateNotificationLog {
    pub user_id: DbId,
    pub client_id: DbId,
    pub trigger_id: Option<DbId>,
    pub channel: String,
    pub status: NotificationStatus,
    pub template_title: Option<String>,
    pub message: String,
}

/// Fields written alongside a status transition.
#[derive(Debug, Clone, Default)]
pub struct TransitionFields {
    pub external_message_id: Option<String>,
    pub external_peer_id: Option<String>,
    pub error_message: Option<String>,
    pub read_at: Option<Timestamp>,
}

/// Filter parameters for the history projection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationLogQuery {
    pub channel: Option<String>,
    pub status: Option<String>,
    pub client_id: Option<DbId>,
    pub from: Option<Timestamp>,
    pub to: Option<Timestamp>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
