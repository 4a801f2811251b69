//! Read-only client projections used to address outbound notifications.

use courier_core::types::{Date, DbId};
use serde::Serialize;
use sqlx::FromRow;

/// A client whose business event falls on the requested date.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EventRecipient {
    pub client_id: DbId,
    pub full_name: String,
    pub phone: Option<String>,
    pub telegram_peer: Option<String>,
    pub preferred_channel: Option<String>,
    pub policy_number: Option<String>,
    pub event_date: Date,
}

/// Contact fields of a single client.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ClientContact {
    pub id: DbId,
    pub user_id: DbId,
    pub full_name: String,
    pub phone: Option<String>,
    pub telegram_peer: Option<String>,
}
