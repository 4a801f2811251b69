//! Outbound provider contracts.
//!
//! [`MessageSender`] pushes one message through a channel's API.
//! [`SessionConnector`] / [`ReadStateSession`] model the stateful protocol
//! session the reconciler needs: connect, resolve a peer, read the peer's
//! outgoing read watermark, disconnect.

use std::time::Duration;

use async_trait::async_trait;
use courier_core::channels::{Channel, ChannelConfig, TelegramConfig};
use courier_core::types::DbId;
use serde::Serialize;

pub mod http_sender;
pub mod mtproto_bridge;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// Network, DNS or TLS failure before a response arrived.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Provider returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// The provider answered but refused the message.
    #[error("Provider rejected the message: {0}")]
    Rejected(String),

    #[error("Provider response could not be understood: {0}")]
    InvalidResponse(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0} has no automatic sender")]
    Unsupported(Channel),

    #[error("Recipient has no {0}")]
    MissingAddress(&'static str),

    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),

    #[error("MTProto bridge is not configured")]
    BridgeUnavailable,
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Addressing data for one client.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Recipient {
    pub client_id: DbId,
    pub phone: Option<String>,
    pub telegram_peer: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutboundMessage {
    /// Ledger row this send belongs to.
    pub log_id: DbId,
    pub recipient: Recipient,
    pub text: String,
}

/// What a provider returned on acceptance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderReceipt {
    pub external_message_id: String,
    pub external_peer_id: Option<String>,
}

#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(
        &self,
        config: &ChannelConfig,
        message: &OutboundMessage,
    ) -> Result<ProviderReceipt, DeliveryError>;
}

// ---------------------------------------------------------------------------
// Read-state sessions
// ---------------------------------------------------------------------------

/// A resolved peer entity inside an open session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerHandle {
    pub peer_id: String,
    /// Opaque reference the session hands back for follow-up calls.
    pub entity_ref: String,
}

#[async_trait]
pub trait SessionConnector: Send + Sync {
    async fn connect(
        &self,
        config: &TelegramConfig,
    ) -> Result<Box<dyn ReadStateSession>, DeliveryError>;
}

/// One open protocol session. Not shared between tasks.
#[async_trait]
pub trait ReadStateSession: Send {
    async fn resolve_entity(&mut self, peer_id: &str) -> Result<PeerHandle, DeliveryError>;

    /// Highest outgoing message id the peer has read.
    async fn read_watermark(&mut self, peer: &PeerHandle) -> Result<i64, DeliveryError>;

    async fn disconnect(&mut self) -> Result<(), DeliveryError>;
}

/// Error body helper: keep provider bodies short in logs and ledger rows.
pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 300;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
