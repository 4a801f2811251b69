//! Audit action normalization and log categories.
//!
//! Callers log free-form action strings (`"login_failed"`, `"import"`,
//! `"reveal_phone"`, ...). Audit rules are configured per *normalized*
//! action, so every raw action is first folded into an [`AuditAction`]
//! through a fixed mapping table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Normalized actions
// ---------------------------------------------------------------------------

/// The closed set of actions an audit rule can be configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Login,
    ViewContact,
    ViewPhone,
    Create,
    Update,
    Delete,
    Export,
    SettingsChange,
    SendMessage,
}

/// Action used when a raw action string is not in the mapping table.
///
/// `view_contact` rules are the ones administrators keep enabled for every
/// role, so an unmapped action is logged unless that rule is switched off.
pub const FALLBACK_ACTION: AuditAction = AuditAction::ViewContact;

impl AuditAction {
    pub const ALL: [AuditAction; 9] = [
        AuditAction::Login,
        AuditAction::ViewContact,
        AuditAction::ViewPhone,
        AuditAction::Create,
        AuditAction::Update,
        AuditAction::Delete,
        AuditAction::Export,
        AuditAction::SettingsChange,
        AuditAction::SendMessage,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::Login => "login",
            AuditAction::ViewContact => "view_contact",
            AuditAction::ViewPhone => "view_phone",
            AuditAction::Create => "create",
            AuditAction::Update => "update",
            AuditAction::Delete => "delete",
            AuditAction::Export => "export",
            AuditAction::SettingsChange => "settings_change",
            AuditAction::SendMessage => "send_message",
        }
    }

    /// Log category used for grouping and retention.
    pub fn category(self) -> &'static str {
        match self {
            AuditAction::Login => log_categories::AUTHENTICATION,
            AuditAction::ViewContact | AuditAction::ViewPhone | AuditAction::Export => {
                log_categories::DATA_ACCESS
            }
            AuditAction::Create | AuditAction::Update | AuditAction::Delete => {
                log_categories::DATA_CHANGE
            }
            AuditAction::SettingsChange => log_categories::CONFIGURATION,
            AuditAction::SendMessage => log_categories::MESSAGING,
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = String;

    /// Strict parse of a normalized action name (used for rule rows).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuditAction::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("Unknown audit action '{s}'"))
    }
}

// ---------------------------------------------------------------------------
// Raw action mapping
// ---------------------------------------------------------------------------

/// Raw action aliases and the normalized action they fold into.
const ACTION_ALIASES: &[(&str, AuditAction)] = &[
    ("login", AuditAction::Login),
    ("login_failed", AuditAction::Login),
    ("logout", AuditAction::Login),
    ("view", AuditAction::ViewContact),
    ("view_contact", AuditAction::ViewContact),
    ("view_client", AuditAction::ViewContact),
    ("open_card", AuditAction::ViewContact),
    ("view_phone", AuditAction::ViewPhone),
    ("reveal_phone", AuditAction::ViewPhone),
    ("copy_phone", AuditAction::ViewPhone),
    ("create", AuditAction::Create),
    ("import", AuditAction::Create),
    ("update", AuditAction::Update),
    ("edit", AuditAction::Update),
    ("status_change", AuditAction::Update),
    ("delete", AuditAction::Delete),
    ("archive", AuditAction::Delete),
    ("export", AuditAction::Export),
    ("download", AuditAction::Export),
    ("settings_change", AuditAction::SettingsChange),
    ("settings_update", AuditAction::SettingsChange),
    ("permission_change", AuditAction::SettingsChange),
    ("send", AuditAction::SendMessage),
    ("send_message", AuditAction::SendMessage),
    ("broadcast", AuditAction::SendMessage),
    ("notification_sent", AuditAction::SendMessage),
];

/// Fold a raw action string into its normalized [`AuditAction`].
///
/// Matching is case-insensitive and ignores surrounding whitespace.
/// Unknown actions fall back to [`FALLBACK_ACTION`].
pub fn normalize_action(raw: &str) -> AuditAction {
    lookup_action(raw).unwrap_or(FALLBACK_ACTION)
}

/// Like [`normalize_action`] but reports unmapped actions as `None`.
pub fn lookup_action(raw: &str) -> Option<AuditAction> {
    let key = raw.trim().to_ascii_lowercase();
    ACTION_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, action)| *action)
}

// ---------------------------------------------------------------------------
// Log category constants
// ---------------------------------------------------------------------------

/// Known log categories for `access_logs.category`.
pub mod log_categories {
    pub const AUTHENTICATION: &str = "authentication";
    pub const DATA_ACCESS: &str = "data_access";
    pub const DATA_CHANGE: &str = "data_change";
    pub const CONFIGURATION: &str = "configuration";
    pub const MESSAGING: &str = "messaging";
}

// ---------------------------------------------------------------------------
// Sensitive field redaction
// ---------------------------------------------------------------------------

/// Keys whose values never reach `access_logs.details`.
pub const SENSITIVE_FIELDS: &[&str] = &[
    "password",
    "token",
    "secret",
    "api_key",
    "api_hash",
    "session_string",
    "authorization",
    "credential",
];

/// Redact sensitive fields from a JSON value, recursively.
///
/// Replaces the value of any key containing one of [`SENSITIVE_FIELDS`]
/// with `"[REDACTED]"`.
pub fn redact_sensitive_fields(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut redacted = serde_json::Map::new();
            for (key, val) in map {
                let lower_key = key.to_lowercase();
                if SENSITIVE_FIELDS.iter().any(|f| lower_key.contains(f)) {
                    redacted.insert(
                        key.clone(),
                        serde_json::Value::String("[REDACTED]".to_string()),
                    );
                } else {
                    redacted.insert(key.clone(), redact_sensitive_fields(val));
                }
            }
            serde_json::Value::Object(redacted)
        }
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.iter().map(redact_sensitive_fields).collect())
        }
        other => other.clone(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
