//! Audit rule, blacklist and access log models.
//!
//! Access logs have no `updated_at` field (immutable records).

use courier_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// A row from `audit_rules`: whether `action_type` is logged for `target_role`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AuditRule {
    pub id: DbId,
    pub target_role: String,
    pub action_type: String,
    pub is_enabled: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating or replacing a rule.
#[derive(Debug, Clone, Deserialize)]
pub struct UpsertAuditRule {
    pub target_role: String,
    pub action_type: String,
    pub is_enabled: bool,
}

// ---------------------------------------------------------------------------
// Blacklist
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AuditBlacklistEntry {
    pub id: DbId,
    pub target_user_id: DbId,
    pub created_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Access logs
// ---------------------------------------------------------------------------

/// A single access log entry. Immutable once created.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AccessLog {
    pub id: DbId,
    pub user_id: DbId,
    pub action: String,
    pub category: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<DbId>,
    pub client_id: Option<DbId>,
    pub field_accessed: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub details: Option<serde_json::Value>,
    pub timestamp: Timestamp,
}

/// DTO for inserting an access log entry.
///
/// `category` is filled in by the audit gate from the normalized action.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateAccessLog {
    pub user_id: DbId,
    pub action: String,
    #[serde(default)]
    pub category: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<DbId>,
    pub client_id: Option<DbId>,
    pub field_accessed: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub details: Option<serde_json::Value>,
}

impl CreateAccessLog {
    pub fn new(user_id: DbId, action: impl Into<String>) -> Self {
        Self {
            user_id,
            action: action.into(),
            ..Default::default()
        }
    }

    pub fn with_entity(mut self, entity_type: impl Into<String>, entity_id: DbId) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id);
        self
    }

    pub fn with_client(mut self, client_id: DbId) -> Self {
        self.client_id = Some(client_id);
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field_accessed = Some(field.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Filter parameters for querying access logs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccessLogQuery {
    pub user_id: Option<DbId>,
    pub action: Option<String>,
    pub client_id: Option<DbId>,
    pub from: Option<Timestamp>,
    pub to: Option<Timestamp>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
