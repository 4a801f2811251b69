//! HTTP senders for channels with a provider API.
//!
//! | Channel | Endpoint |
//! |---|---|
//! | Telegram (bot) | `POST {telegram}/bot{token}/sendMessage` |
//! | Telegram (user session) | `POST {bridge}/messages` |
//! | WhatsApp Business API | `POST {whatsapp}/{phone_number_id}/messages` (bearer) |
//! | Max | `POST {max}/messages?access_token=..` |
//!
//! Web-bridge channels and SMS have no sender and are rejected with
//! [`DeliveryError::Unsupported`].

use std::time::Duration;

use async_trait::async_trait;
use courier_core::channels::{
    Channel, ChannelConfig, MaxConfig, TelegramConfig, WhatsappConfig, WhatsappMode,
};
use serde::Deserialize;

use super::{truncate_body, DeliveryError, MessageSender, OutboundMessage, ProviderReceipt};

/// Base URLs of the provider APIs.
#[derive(Debug, Clone)]
pub struct ProviderEndpoints {
    pub telegram_api_base: String,
    pub whatsapp_api_base: String,
    pub max_api_base: String,
    /// Sidecar that owns MTProto user sessions. `None` disables user-mode sends.
    pub mtproto_bridge_url: Option<String>,
}

impl Default for ProviderEndpoints {
    fn default() -> Self {
        Self {
            telegram_api_base: "https://api.telegram.org".into(),
            whatsapp_api_base: "https://graph.facebook.com/v19.0".into(),
            max_api_base: "https://botapi.max.ru".into(),
            mtproto_bridge_url: None,
        }
    }
}

pub struct HttpChannelSender {
    client: reqwest::Client,
    endpoints: ProviderEndpoints,
}

impl HttpChannelSender {
    pub fn new(endpoints: ProviderEndpoints, timeout: Duration) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoints })
    }

    async fn send_telegram(
        &self,
        cfg: &TelegramConfig,
        message: &OutboundMessage,
    ) -> Result<ProviderReceipt, DeliveryError> {
        let peer = message
            .recipient
            .telegram_peer
            .as_deref()
            .or(message.recipient.phone.as_deref())
            .ok_or(DeliveryError::MissingAddress("Telegram peer or phone"))?;

        if cfg.is_user_session() {
            return self.send_telegram_user(cfg, peer, &message.text).await;
        }

        let token = non_blank(&cfg.bot_token).ok_or(DeliveryError::MissingCredential("bot_token"))?;
        let url = format!(
            "{}/bot{token}/sendMessage",
            self.endpoints.telegram_api_base.trim_end_matches('/')
        );
        let body = serde_json::json!({ "chat_id": peer, "text": message.text });
        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        let parsed: TelegramResponse = serde_json::from_str(&text).map_err(|_| {
            if status.is_success() {
                DeliveryError::InvalidResponse(truncate_body(&text))
            } else {
                DeliveryError::HttpStatus {
                    status: status.as_u16(),
                    body: truncate_body(&text),
                }
            }
        })?;
        match parsed {
            TelegramResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(ProviderReceipt {
                external_message_id: result.message_id.to_string(),
                external_peer_id: Some(result.chat.id.to_string()),
            }),
            TelegramResponse { description, .. } => Err(DeliveryError::Rejected(
                description.unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
            )),
        }
    }

    async fn send_telegram_user(
        &self,
        cfg: &TelegramConfig,
        peer: &str,
        text: &str,
    ) -> Result<ProviderReceipt, DeliveryError> {
        let bridge = self
            .endpoints
            .mtproto_bridge_url
            .as_deref()
            .ok_or(DeliveryError::BridgeUnavailable)?;
        let session = non_blank(&cfg.session_string)
            .ok_or(DeliveryError::MissingCredential("session_string"))?;
        let url = format!("{}/messages", bridge.trim_end_matches('/'));
        let body = serde_json::json!({
            "session_string": session,
            "api_id": cfg.api_id,
            "api_hash": cfg.api_hash,
            "peer": peer,
            "text": text,
        });
        let response = self.client.post(&url).json(&body).send().await?;
        let sent: BridgeSent = read_json(response).await?;
        Ok(ProviderReceipt {
            external_message_id: sent.message_id.to_string(),
            external_peer_id: Some(sent.peer_id),
        })
    }

    async fn send_whatsapp(
        &self,
        cfg: &WhatsappConfig,
        message: &OutboundMessage,
    ) -> Result<ProviderReceipt, DeliveryError> {
        if cfg.mode != WhatsappMode::BusinessApi {
            return Err(DeliveryError::Unsupported(Channel::Whatsapp));
        }
        let api_key = non_blank(&cfg.api_key).ok_or(DeliveryError::MissingCredential("api_key"))?;
        let phone_number_id = non_blank(&cfg.phone_number_id)
            .ok_or(DeliveryError::MissingCredential("phone_number_id"))?;
        let to = message
            .recipient
            .phone
            .as_deref()
            .ok_or(DeliveryError::MissingAddress("phone number"))?;

        let url = format!(
            "{}/{phone_number_id}/messages",
            self.endpoints.whatsapp_api_base.trim_end_matches('/')
        );
        let body = serde_json::json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "text",
            "text": { "body": message.text },
        });
        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;
        let parsed: WhatsappResponse = read_json(response).await?;
        let id = parsed
            .messages
            .into_iter()
            .next()
            .map(|m| m.id)
            .ok_or_else(|| DeliveryError::InvalidResponse("no message id returned".into()))?;
        Ok(ProviderReceipt {
            external_message_id: id,
            external_peer_id: parsed.contacts.into_iter().next().map(|c| c.wa_id),
        })
    }

    async fn send_max(
        &self,
        cfg: &MaxConfig,
        message: &OutboundMessage,
    ) -> Result<ProviderReceipt, DeliveryError> {
        let api_key = non_blank(&cfg.api_key).ok_or(DeliveryError::MissingCredential("api_key"))?;
        let phone = message
            .recipient
            .phone
            .as_deref()
            .ok_or(DeliveryError::MissingAddress("phone number"))?;
        let url = format!("{}/messages", self.endpoints.max_api_base.trim_end_matches('/'));
        let body = serde_json::json!({ "phone": phone, "text": message.text });
        let response = self
            .client
            .post(&url)
            .query(&[("access_token", api_key)])
            .json(&body)
            .send()
            .await?;
        let parsed: MaxResponse = read_json(response).await?;
        Ok(ProviderReceipt {
            external_message_id: parsed.message.body.mid,
            external_peer_id: parsed.message.recipient.and_then(|r| r.chat_id).map(|id| id.to_string()),
        })
    }
}

#[async_trait]
impl MessageSender for HttpChannelSender {
    async fn send(
        &self,
        config: &ChannelConfig,
        message: &OutboundMessage,
    ) -> Result<ProviderReceipt, DeliveryError> {
        let result = match config {
            ChannelConfig::Telegram(cfg) => self.send_telegram(cfg, message).await,
            ChannelConfig::Whatsapp(cfg) => self.send_whatsapp(cfg, message).await,
            ChannelConfig::Max(cfg) => self.send_max(cfg, message).await,
            other => Err(DeliveryError::Unsupported(other.channel())),
        };
        match &result {
            Ok(receipt) => tracing::debug!(
                log_id = message.log_id,
                channel = %config.channel(),
                external_message_id = %receipt.external_message_id,
                "Provider accepted message"
            ),
            Err(e) => tracing::warn!(
                log_id = message.log_id,
                channel = %config.channel(),
                error = %e,
                "Provider send failed"
            ),
        }
        result
    }
}

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    result: Option<TelegramMessage>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    message_id: i64,
    chat: TelegramChat,
}

#[derive(Debug, Deserialize)]
struct TelegramChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct BridgeSent {
    message_id: i64,
    peer_id: String,
}

#[derive(Debug, Deserialize)]
struct WhatsappResponse {
    #[serde(default)]
    messages: Vec<WhatsappMessageId>,
    #[serde(default)]
    contacts: Vec<WhatsappContact>,
}

#[derive(Debug, Deserialize)]
struct WhatsappMessageId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct WhatsappContact {
    wa_id: String,
}

#[derive(Debug, Deserialize)]
struct MaxResponse {
    message: MaxMessage,
}

#[derive(Debug, Deserialize)]
struct MaxMessage {
    body: MaxBody,
    recipient: Option<MaxRecipient>,
}

#[derive(Debug, Deserialize)]
struct MaxBody {
    mid: String,
}

#[derive(Debug, Deserialize)]
struct MaxRecipient {
    chat_id: Option<i64>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Check the status, then decode the body as `T`.
pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, DeliveryError> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(DeliveryError::HttpStatus {
            status: status.as_u16(),
            body: truncate_body(&text),
        });
    }
    serde_json::from_str(&text).map_err(|e| DeliveryError::InvalidResponse(e.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
