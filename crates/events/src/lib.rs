//! In-process events and outbound provider transport.
//!
//! - [`EventBus`]: publish/subscribe hub used to invalidate cached settings.
//! - [`delivery`]: provider traits plus the HTTP senders and the MTProto
//!   bridge session used by read-receipt reconciliation.

pub mod bus;
pub mod delivery;

pub use bus::{event_types, EventBus, PipelineEvent};
pub use delivery::http_sender::{HttpChannelSender, ProviderEndpoints};
pub use delivery::mtproto_bridge::MtprotoBridgeConnector;
pub use delivery::{
    DeliveryError, MessageSender, OutboundMessage, PeerHandle, ProviderReceipt, ReadStateSession,
    Recipient, SessionConnector,
};
