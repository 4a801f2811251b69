//! Notification trigger and template models.

use courier_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from `notification_triggers`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct NotificationTrigger {
    pub id: DbId,
    pub user_id: DbId,
    pub event_type: String,
    pub template_id: DbId,
    pub days_before: i32,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a trigger (`id = None`) or replacing one.
#[derive(Debug, Clone, Deserialize)]
pub struct UpsertTrigger {
    pub id: Option<DbId>,
    pub event_type: String,
    pub template_id: DbId,
    pub days_before: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// A row from `notification_templates`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct NotificationTemplate {
    pub id: DbId,
    pub user_id: DbId,
    pub title: String,
    pub content: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
