//! Drops the audit gate's cached rules whenever they change.

use std::sync::Arc;

use courier_events::{event_types, PipelineEvent};
use courier_pipeline::AuditGate;
use tokio::sync::broadcast;

/// Invalidate `gate` on every `audit.settings_changed` event.
///
/// A lagged receiver may have missed an invalidation, so lag invalidates
/// too. Exits when the bus is closed.
pub async fn run(gate: Arc<AuditGate>, mut receiver: broadcast::Receiver<PipelineEvent>) {
    loop {
        match receiver.recv().await {
            Ok(event) if event.is(event_types::AUDIT_SETTINGS_CHANGED) => {
                gate.invalidate().await;
                tracing::debug!(actor = ?event.actor_user_id, "Audit cache invalidated");
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(skipped = n, "Audit cache subscriber lagged, invalidating");
                gate.invalidate().await;
            }
            Err(broadcast::error::RecvError::Closed) => {
                tracing::info!("Event bus closed, audit cache subscriber shutting down");
                break;
            }
        }
    }
}
