//! Hands ledger rows to provider senders.

use std::sync::Arc;

use courier_core::error::CoreError;
use courier_core::notification_status::NotificationStatus;
use courier_db::models::notification_log::NotificationLog;
use courier_events::{MessageSender, OutboundMessage, Recipient};
use serde::Serialize;

use crate::channel_validator::UsableChannel;
use crate::error::PipelineError;
use crate::ledger::Ledger;

/// What happened to a row after dispatch.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Sent { log: NotificationLog },
    Failed { log: NotificationLog, reason: String },
    /// Left `pending` for an operator to send by hand.
    AwaitingConfirmation { log: NotificationLog },
    /// Test-mode row; no provider was contacted.
    Simulated { log: NotificationLog },
}

#[derive(Clone)]
pub struct Dispatcher {
    ledger: Ledger,
    sender: Arc<dyn MessageSender>,
}

impl Dispatcher {
    pub fn new(ledger: Ledger, sender: Arc<dyn MessageSender>) -> Self {
        Self { ledger, sender }
    }

    /// Dispatch a freshly enqueued row through `channel`.
    ///
    /// A provider rejection is not an error here: the row ends in `error`
    /// and the outcome says so. Only ledger failures propagate.
    pub async fn dispatch(
        &self,
        row: NotificationLog,
        channel: &UsableChannel,
        recipient: Recipient,
    ) -> Result<DispatchOutcome, PipelineError> {
        match row.status()? {
            NotificationStatus::TestPrepared => return Ok(DispatchOutcome::Simulated { log: row }),
            NotificationStatus::Pending => {}
            other => {
                return Err(CoreError::InvalidTransition {
                    from: other.to_string(),
                    to: NotificationStatus::Sending.to_string(),
                }
                .into())
            }
        }

        if channel.requires_manual_confirmation || !channel.channel.supports_automatic_send() {
            return Ok(DispatchOutcome::AwaitingConfirmation { log: row });
        }

        let log_id = row.id;
        let message = OutboundMessage {
            log_id,
            recipient,
            text: row.message.clone(),
        };
        self.ledger.start_dispatch(log_id).await?;

        match self.sender.send(&channel.setting.config, &message).await {
            Ok(receipt) => {
                let external_id = receipt.external_message_id.clone();
                // The provider already has the message; a failed write here
                // leaves the row in `sending` and must not be retried blindly.
                let log = self
                    .ledger
                    .mark_sent(log_id, Some(receipt))
                    .await
                    .inspect_err(|e| {
                        tracing::error!(
                            log_id,
                            external_message_id = %external_id,
                            error = %e,
                            "Provider accepted message but ledger update failed"
                        );
                    })?;
                tracing::info!(log_id, channel = %channel.channel, "Notification sent");
                Ok(DispatchOutcome::Sent { log })
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::warn!(log_id, channel = %channel.channel, error = %reason, "Notification rejected");
                let log = self.ledger.mark_error(log_id, reason.clone()).await?;
                Ok(DispatchOutcome::Failed { log, reason })
            }
        }
    }
}
