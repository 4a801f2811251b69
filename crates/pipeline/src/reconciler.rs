//! Read-receipt reconciliation for channels that do not push read receipts.
//!
//! Telegram user sessions (MTProto) only expose a per-dialog "read outbox up
//! to" watermark. Each pass opens one session per active configuration,
//! serially, and promotes every `sent` row at or below its peer's watermark
//! to `read`.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use courier_core::channels::{Channel, ChannelConfig, TelegramConfig};
use courier_core::types::DbId;
use courier_db::models::messenger_setting::MessengerSetting;
use courier_events::{DeliveryError, ReadStateSession, SessionConnector};
use serde::Serialize;

use crate::error::{PipelineError, StoreError};
use crate::ledger::Ledger;
use crate::store::SettingsStore;

/// Summary of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Rows promoted to `read`.
    pub updated: u64,
    /// Configurations a session was opened for.
    pub configurations: usize,
    pub failed_configurations: usize,
    pub failed_peers: usize,
}

pub struct ReadReceiptReconciler {
    settings: Arc<dyn SettingsStore>,
    ledger: Ledger,
    connector: Option<Arc<dyn SessionConnector>>,
    timeout: Duration,
}

/// Outcome of processing one configuration's open session.
#[derive(Default)]
struct SessionTally {
    updated: u64,
    failed_peers: usize,
}

impl ReadReceiptReconciler {
    /// `connector = None` disables reconciliation (no bridge configured).
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        ledger: Ledger,
        connector: Option<Arc<dyn SessionConnector>>,
        timeout: Duration,
    ) -> Self {
        Self {
            settings,
            ledger,
            connector,
            timeout,
        }
    }

    /// Run one pass over every active Telegram user-session configuration.
    ///
    /// Connection and per-peer failures are counted and skipped. Only store
    /// failures abort the pass.
    pub async fn run(&self) -> Result<ReconcileReport, PipelineError> {
        let mut report = ReconcileReport::default();
        let Some(connector) = &self.connector else {
            tracing::debug!("No MTProto bridge configured, skipping read-receipt pass");
            return Ok(report);
        };

        let rows = self
            .settings
            .active_settings_for_channel(Channel::Telegram)
            .await?;

        for row in rows {
            let Some(config) = user_session_config(&row) else {
                continue;
            };

            let groups = self.unread_by_peer(row.user_id).await?;
            if groups.is_empty() {
                continue;
            }

            report.configurations += 1;
            let session = match self.bounded(connector.connect(&config)).await {
                Ok(session) => session,
                Err(e) => {
                    tracing::warn!(user_id = row.user_id, error = %e, "Session connect failed");
                    report.failed_configurations += 1;
                    continue;
                }
            };

            let tally = self.reconcile_session(row.user_id, session, groups).await?;
            report.updated += tally.updated;
            report.failed_peers += tally.failed_peers;
        }

        tracing::info!(
            updated = report.updated,
            configurations = report.configurations,
            failed_configurations = report.failed_configurations,
            failed_peers = report.failed_peers,
            "Read-receipt pass finished"
        );
        Ok(report)
    }

    /// Unread `sent` rows with a numeric external id, grouped by peer.
    async fn unread_by_peer(
        &self,
        user_id: DbId,
    ) -> Result<BTreeMap<String, Vec<(DbId, i64)>>, StoreError> {
        let mut groups: BTreeMap<String, Vec<(DbId, i64)>> = BTreeMap::new();
        for log in self.ledger.unread_sent(user_id, Channel::Telegram).await? {
            let (Some(peer), Some(ordinal)) = (log.external_peer_id.clone(), log.external_ordinal())
            else {
                tracing::debug!(log_id = log.id, "Skipping row without numeric external id");
                continue;
            };
            groups.entry(peer).or_default().push((log.id, ordinal));
        }
        Ok(groups)
    }

    /// Process every peer group, then close the session.
    ///
    /// If this future is dropped before finishing, the guard closes the
    /// session from a spawned task instead.
    async fn reconcile_session(
        &self,
        user_id: DbId,
        session: Box<dyn ReadStateSession>,
        groups: BTreeMap<String, Vec<(DbId, i64)>>,
    ) -> Result<SessionTally, StoreError> {
        let mut guard = SessionGuard {
            session: Some(session),
            user_id,
            timeout: self.timeout,
        };
        let result = match guard.session.as_deref_mut() {
            Some(session) => self.reconcile_peers(user_id, session, groups).await,
            None => Ok(SessionTally::default()),
        };
        guard.close().await;
        result
    }

    async fn reconcile_peers(
        &self,
        user_id: DbId,
        session: &mut dyn ReadStateSession,
        groups: BTreeMap<String, Vec<(DbId, i64)>>,
    ) -> Result<SessionTally, StoreError> {
        let mut tally = SessionTally::default();
        for (peer, rows) in groups {
            let watermark = match self.watermark(session, &peer).await {
                Ok(w) => w,
                Err(e) => {
                    tracing::warn!(user_id, peer = %peer, error = %e, "Peer read state lookup failed");
                    tally.failed_peers += 1;
                    continue;
                }
            };

            let read: Vec<DbId> = rows
                .iter()
                .filter(|(_, ordinal)| *ordinal <= watermark)
                .map(|(id, _)| *id)
                .collect();
            if read.is_empty() {
                continue;
            }
            let updated = self.ledger.mark_read(&read).await?;
            tracing::debug!(user_id, peer = %peer, watermark, updated, "Rows marked read");
            tally.updated += updated;
        }
        Ok(tally)
    }

    async fn watermark(
        &self,
        session: &mut dyn ReadStateSession,
        peer: &str,
    ) -> Result<i64, DeliveryError> {
        let handle = self.bounded(session.resolve_entity(peer)).await?;
        self.bounded(session.read_watermark(&handle)).await
    }

    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, DeliveryError>>,
    ) -> Result<T, DeliveryError> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| DeliveryError::Timeout(self.timeout))?
    }
}

/// Owns an open session until it is closed.
struct SessionGuard {
    session: Option<Box<dyn ReadStateSession>>,
    user_id: DbId,
    timeout: Duration,
}

impl SessionGuard {
    async fn close(mut self) {
        if let Some(session) = self.session.take() {
            disconnect(session, self.user_id, self.timeout).await;
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        let (user_id, timeout) = (self.user_id, self.timeout);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::debug!(user_id, "Read-receipt pass cancelled, closing session");
                handle.spawn(disconnect(session, user_id, timeout));
            }
            Err(_) => tracing::warn!(user_id, "Session dropped outside a runtime, not closed"),
        }
    }
}

async fn disconnect(mut session: Box<dyn ReadStateSession>, user_id: DbId, timeout: Duration) {
    match tokio::time::timeout(timeout, session.disconnect()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(user_id, error = %e, "Session disconnect failed"),
        Err(_) => tracing::warn!(user_id, "Session disconnect timed out"),
    }
}

fn user_session_config(row: &MessengerSetting) -> Option<TelegramConfig> {
    match row.to_domain() {
        Ok(setting) => match setting.config {
            ChannelConfig::Telegram(cfg) if cfg.is_user_session() => Some(cfg),
            _ => None,
        },
        Err(e) => {
            tracing::warn!(user_id = row.user_id, error = %e, "Undecodable Telegram config");
            None
        }
    }
}
