//! MTProto user sessions through an HTTP bridge sidecar.
//!
//! The sidecar owns the actual MTProto client. One bridge session maps to one
//! authorized `session_string`:
//!
//! - `POST   /sessions` -> `{ "session_id" }`
//! - `POST   /sessions/{id}/resolve` `{ "peer" }` -> `{ "peer_id", "entity_ref" }`
//! - `POST   /sessions/{id}/dialog-read-state` `{ "entity_ref" }` -> `{ "read_outbox_max_id" }`
//! - `DELETE /sessions/{id}`

use std::time::Duration;

use async_trait::async_trait;
use courier_core::channels::TelegramConfig;
use serde::Deserialize;

use super::http_sender::read_json;
use super::{DeliveryError, PeerHandle, ReadStateSession, SessionConnector};

pub struct MtprotoBridgeConnector {
    client: reqwest::Client,
    base_url: String,
}

impl MtprotoBridgeConnector {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct OpenedSession {
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct ResolvedPeer {
    peer_id: String,
    entity_ref: String,
}

#[derive(Debug, Deserialize)]
struct DialogReadState {
    read_outbox_max_id: i64,
}

#[async_trait]
impl SessionConnector for MtprotoBridgeConnector {
    async fn connect(
        &self,
        config: &TelegramConfig,
    ) -> Result<Box<dyn ReadStateSession>, DeliveryError> {
        let session_string = config
            .session_string
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or(DeliveryError::MissingCredential("session_string"))?;

        let response = self
            .client
            .post(format!("{}/sessions", self.base_url))
            .json(&serde_json::json!({
                "session_string": session_string,
                "api_id": config.api_id,
                "api_hash": config.api_hash,
            }))
            .send()
            .await?;
        let opened: OpenedSession = read_json(response).await?;
        tracing::debug!(session_id = %opened.session_id, "Bridge session opened");

        Ok(Box::new(BridgeSession {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            session_id: opened.session_id,
            open: true,
        }))
    }
}

struct BridgeSession {
    client: reqwest::Client,
    base_url: String,
    session_id: String,
    open: bool,
}

impl BridgeSession {
    fn url(&self, suffix: &str) -> String {
        format!("{}/sessions/{}{suffix}", self.base_url, self.session_id)
    }
}

#[async_trait]
impl ReadStateSession for BridgeSession {
    async fn resolve_entity(&mut self, peer_id: &str) -> Result<PeerHandle, DeliveryError> {
        let response = self
            .client
            .post(self.url("/resolve"))
            .json(&serde_json::json!({ "peer": peer_id }))
            .send()
            .await?;
        let resolved: ResolvedPeer = read_json(response).await?;
        Ok(PeerHandle {
            peer_id: resolved.peer_id,
            entity_ref: resolved.entity_ref,
        })
    }

    async fn read_watermark(&mut self, peer: &PeerHandle) -> Result<i64, DeliveryError> {
        let response = self
            .client
            .post(self.url("/dialog-read-state"))
            .json(&serde_json::json!({ "entity_ref": peer.entity_ref }))
            .send()
            .await?;
        let state: DialogReadState = read_json(response).await?;
        Ok(state.read_outbox_max_id)
    }

    async fn disconnect(&mut self) -> Result<(), DeliveryError> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        let response = self.client.delete(self.url("")).send().await?;
        if !response.status().is_success() {
            return Err(DeliveryError::HttpStatus {
                status: response.status().as_u16(),
                body: String::new(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::channels::TelegramConnection;
    use httpmock::Method::{DELETE, POST};
    use httpmock::MockServer;
    use serde_json::json;

    fn user_config() -> TelegramConfig {
        TelegramConfig {
            connection_type: TelegramConnection::User,
            session_string: Some("1BVts".into()),
            api_id: Some(42),
            api_hash: Some("hash".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn full_session_round() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/sessions");
                then.status(200).json_body(json!({"session_id": "s1"}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/sessions/s1/resolve");
                then.status(200)
                    .json_body(json!({"peer_id": "777", "entity_ref": "user:777:abc"}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/sessions/s1/dialog-read-state");
                then.status(200).json_body(json!({"read_outbox_max_id": 105}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(DELETE).path("/sessions/s1");
                then.status(204);
            })
            .await;

        let connector = MtprotoBridgeConnector::new(server.base_url(), Duration::from_secs(5)).unwrap();
        let mut session = connector.connect(&user_config()).await.unwrap();
        let peer = session.resolve_entity("777").await.unwrap();
        assert_eq!(peer.entity_ref, "user:777:abc");
        assert_eq!(session.read_watermark(&peer).await.unwrap(), 105);
        session.disconnect().await.unwrap();
        // A second disconnect is a no-op.
        session.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn unresolvable_peer_surfaces_http_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/sessions");
                then.status(200).json_body(json!({"session_id": "s2"}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/sessions/s2/resolve");
                then.status(404).body("PEER_ID_INVALID");
            })
            .await;

        let connector = MtprotoBridgeConnector::new(server.base_url(), Duration::from_secs(5)).unwrap();
        let mut session = connector.connect(&user_config()).await.unwrap();
        let err = session.resolve_entity("nobody").await.unwrap_err();
        assert!(matches!(err, DeliveryError::HttpStatus { status: 404, ref body } if body == "PEER_ID_INVALID"));
    }

    #[tokio::test]
    async fn connect_without_session_string_fails_fast() {
        let connector = MtprotoBridgeConnector::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let cfg = TelegramConfig {
            connection_type: TelegramConnection::User,
            ..Default::default()
        };
        let err = connector.connect(&cfg).await.err().unwrap();
        assert!(matches!(err, DeliveryError::MissingCredential("session_string")));
    }
}
