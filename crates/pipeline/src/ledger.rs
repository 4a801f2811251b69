//! Dispatch & status ledger.
//!
//! Every status change goes through [`NotificationStatus::apply`] first and
//! is then written as a conditional update guarded on the event's legal
//! source statuses, so concurrent writers can never move a row backwards.

use std::sync::Arc;

use courier_core::channels::Channel;
use courier_core::clock::Clock;
use courier_core::error::CoreError;
use courier_core::notification_status::{LedgerEvent, LedgerStats, NotificationStatus};
use courier_core::types::{DbId, Timestamp};
use courier_db::models::notification_log::{
    CreateNotificationLog, NotificationLog, NotificationLogQuery, TransitionFields,
};
use courier_events::ProviderReceipt;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, StoreError};
use crate::store::LedgerStore;

/// A message about to be recorded.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: DbId,
    pub client_id: DbId,
    pub trigger_id: Option<DbId>,
    pub channel: Channel,
    pub template_title: Option<String>,
    pub message: String,
}

/// Receipt kinds a provider can push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptKind {
    Delivered,
    Read,
}

impl ReceiptKind {
    fn event(self) -> LedgerEvent {
        match self {
            ReceiptKind::Delivered => LedgerEvent::DeliveryReceipt,
            ReceiptKind::Read => LedgerEvent::ReadConfirmed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ReceiptOutcome {
    Applied { log: NotificationLog },
    /// Late or duplicate receipt for a row that already moved past it.
    Ignored { log_id: DbId, status: String },
}

#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
}

impl Ledger {
    pub fn new(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Append a row: `pending`, or `test_prepared` in test mode.
    pub async fn enqueue(
        &self,
        new: NewNotification,
        test_mode: bool,
    ) -> Result<NotificationLog, StoreError> {
        let dto = CreateNotificationLog {
            user_id: new.user_id,
            client_id: new.client_id,
            trigger_id: new.trigger_id,
            channel: new.channel.as_str().to_string(),
            status: NotificationStatus::initial(test_mode),
            template_title: new.template_title,
            message: new.message,
        };
        self.store.insert_log(&dto).await
    }

    /// Apply `event` to row `id`.
    ///
    /// Fails with `InvalidTransition` if the edge is illegal, including when
    /// a concurrent writer moved the row first. The row is never partially
    /// updated.
    pub async fn apply(
        &self,
        id: DbId,
        event: LedgerEvent,
        mut fields: TransitionFields,
    ) -> Result<NotificationLog, PipelineError> {
        let row = self.find(id).await?;
        let from = row.status()?;
        let to = from.apply(event)?;

        if to == NotificationStatus::Read {
            fields.read_at = Some(self.clock.now());
        } else {
            fields.read_at = None;
        }

        match self
            .store
            .transition_log(id, &event.sources(), to, &fields)
            .await?
        {
            Some(updated) => {
                tracing::debug!(log_id = id, from = %from, to = %to, "Ledger transition");
                Ok(updated)
            }
            None => {
                let current = self.find(id).await?;
                Err(CoreError::InvalidTransition {
                    from: current.status,
                    to: to.to_string(),
                }
                .into())
            }
        }
    }

    pub async fn start_dispatch(&self, id: DbId) -> Result<NotificationLog, PipelineError> {
        self.apply(id, LedgerEvent::DispatchStarted, TransitionFields::default())
            .await
    }

    pub async fn mark_sent(
        &self,
        id: DbId,
        receipt: Option<ProviderReceipt>,
    ) -> Result<NotificationLog, PipelineError> {
        let fields = receipt
            .map(|r| TransitionFields {
                external_message_id: Some(r.external_message_id),
                external_peer_id: r.external_peer_id,
                ..Default::default()
            })
            .unwrap_or_default();
        self.apply(id, LedgerEvent::ProviderAck, fields).await
    }

    pub async fn mark_error(
        &self,
        id: DbId,
        reason: impl Into<String>,
    ) -> Result<NotificationLog, PipelineError> {
        let fields = TransitionFields {
            error_message: Some(reason.into()),
            ..Default::default()
        };
        self.apply(id, LedgerEvent::ProviderReject, fields).await
    }

    /// Operator confirms a queued row was sent by hand.
    pub async fn confirm_manual(
        &self,
        user_id: DbId,
        id: DbId,
    ) -> Result<NotificationLog, PipelineError> {
        self.find_owned(user_id, id).await?;
        self.start_dispatch(id).await?;
        self.mark_sent(id, None).await
    }

    /// Operator gives up on a queued row.
    pub async fn reject_manual(
        &self,
        user_id: DbId,
        id: DbId,
        reason: Option<String>,
    ) -> Result<NotificationLog, PipelineError> {
        self.find_owned(user_id, id).await?;
        self.start_dispatch(id).await?;
        self.mark_error(id, reason.unwrap_or_else(|| "Rejected by operator".into()))
            .await
    }

    /// Apply a receipt pushed by a provider.
    pub async fn record_receipt(
        &self,
        channel: Channel,
        external_message_id: &str,
        kind: ReceiptKind,
    ) -> Result<ReceiptOutcome, PipelineError> {
        let row = self
            .store
            .find_by_external_id(channel, external_message_id)
            .await?
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "No {channel} message with external id '{external_message_id}'"
                ))
            })?;

        match self.apply(row.id, kind.event(), TransitionFields::default()).await {
            Ok(log) => Ok(ReceiptOutcome::Applied { log }),
            Err(PipelineError::Core(CoreError::InvalidTransition { from, .. })) => {
                tracing::debug!(log_id = row.id, status = %from, ?kind, "Receipt ignored");
                Ok(ReceiptOutcome::Ignored {
                    log_id: row.id,
                    status: from,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Promote `sent`/`delivered` rows to `read` with `read_at = now`.
    pub async fn mark_read(&self, ids: &[DbId]) -> Result<u64, StoreError> {
        self.store.mark_read(ids, self.clock.now()).await
    }

    pub async fn unread_sent(
        &self,
        user_id: DbId,
        channel: Channel,
    ) -> Result<Vec<NotificationLog>, StoreError> {
        self.store.list_unread_sent(user_id, channel).await
    }

    pub async fn queue(
        &self,
        user_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<NotificationLog>, StoreError> {
        self.store.list_queue(user_id, limit, offset).await
    }

    pub async fn history(
        &self,
        user_id: DbId,
        query: &NotificationLogQuery,
    ) -> Result<Vec<NotificationLog>, StoreError> {
        self.store.list_history(user_id, query).await
    }

    /// Bucketed counts for rows with `sent_at` in `[from, to)`.
    pub async fn stats(
        &self,
        user_id: DbId,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<LedgerStats, PipelineError> {
        if from >= to {
            return Err(CoreError::Validation("'from' must be before 'to'".into()).into());
        }
        let counts = self.store.status_counts(user_id, from, to).await?;
        Ok(LedgerStats::from_counts(
            counts.iter().map(|(status, n)| (status.as_str(), *n)),
        ))
    }

    async fn find(&self, id: DbId) -> Result<NotificationLog, PipelineError> {
        self.store.find_log(id).await?.ok_or_else(|| {
            CoreError::NotFound {
                entity: "NotificationLog",
                id,
            }
            .into()
        })
    }

    async fn find_owned(&self, user_id: DbId, id: DbId) -> Result<NotificationLog, PipelineError> {
        let row = self.find(id).await?;
        if row.user_id != user_id {
            return Err(CoreError::NotFound {
                entity: "NotificationLog",
                id,
            }
            .into());
        }
        Ok(row)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixed_now, MemoryStore};
    use assert_matches::assert_matches;
    use courier_core::clock::ManualClock;

    fn ledger(store: &Arc<MemoryStore>) -> Ledger {
        Ledger::new(store.clone(), Arc::new(ManualClock::new(fixed_now())))
    }

    fn new_notification() -> NewNotification {
        NewNotification {
            user_id: 1,
            client_id: 7,
            trigger_id: None,
            channel: Channel::Telegram,
            template_title: Some("Renewal".into()),
            message: "Hi".into(),
        }
    }

    #[tokio::test]
    async fn enqueue_respects_test_mode() {
        let store = Arc::new(MemoryStore::default());
        let ledger = ledger(&store);
        assert_eq!(ledger.enqueue(new_notification(), false).await.unwrap().status, "pending");
        assert_eq!(
            ledger.enqueue(new_notification(), true).await.unwrap().status,
            "test_prepared"
        );
    }

    #[tokio::test]
    async fn full_lifecycle_stamps_read_at_once() {
        let store = Arc::new(MemoryStore::default());
        let ledger = ledger(&store);
        let row = ledger.enqueue(new_notification(), false).await.unwrap();
        ledger.start_dispatch(row.id).await.unwrap();
        let sent = ledger
            .mark_sent(
                row.id,
                Some(ProviderReceipt {
                    external_message_id: "55".into(),
                    external_peer_id: Some("peer".into()),
                }),
            )
            .await
            .unwrap();
        assert_eq!(sent.external_message_id.as_deref(), Some("55"));
        assert!(sent.read_at.is_none());

        let read = ledger
            .apply(row.id, LedgerEvent::ReadConfirmed, TransitionFields::default())
            .await
            .unwrap();
        assert_eq!(read.status, "read");
        assert_eq!(read.read_at, Some(fixed_now()));

        let again = ledger
            .apply(row.id, LedgerEvent::ReadConfirmed, TransitionFields::default())
            .await;
        assert_matches!(again, Err(PipelineError::Core(CoreError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn illegal_edge_leaves_row_unchanged() {
        let store = Arc::new(MemoryStore::default());
        let ledger = ledger(&store);
        let row = ledger.enqueue(new_notification(), false).await.unwrap();
        let result = ledger.mark_sent(row.id, None).await;
        assert_matches!(result, Err(PipelineError::Core(CoreError::InvalidTransition { .. })));
        assert_eq!(store.log(row.id).status, "pending");
    }

    #[tokio::test]
    async fn store_failure_does_not_partially_apply() {
        let store = Arc::new(MemoryStore::default());
        let ledger = ledger(&store);
        let row = ledger.enqueue(new_notification(), false).await.unwrap();
        store.fail_ledger_writes(true);
        assert_matches!(ledger.start_dispatch(row.id).await, Err(PipelineError::Store(_)));
        assert_eq!(store.log(row.id).status, "pending");
    }

    #[tokio::test]
    async fn reject_manual_records_reason() {
        let store = Arc::new(MemoryStore::default());
        let ledger = ledger(&store);
        let row = ledger.enqueue(new_notification(), false).await.unwrap();
        let rejected = ledger
            .reject_manual(1, row.id, Some("wrong number".into()))
            .await
            .unwrap();
        assert_eq!(rejected.status, "error");
        assert_eq!(rejected.error_message.as_deref(), Some("wrong number"));
    }

    #[tokio::test]
    async fn confirm_manual_checks_ownership() {
        let store = Arc::new(MemoryStore::default());
        let ledger = ledger(&store);
        let row = ledger.enqueue(new_notification(), false).await.unwrap();
        assert_matches!(
            ledger.confirm_manual(2, row.id).await,
            Err(PipelineError::Core(CoreError::NotFound { .. }))
        );
        assert_eq!(ledger.confirm_manual(1, row.id).await.unwrap().status, "sent");
    }

    #[tokio::test]
    async fn delivery_receipt_after_read_is_ignored() {
        let store = Arc::new(MemoryStore::default());
        let ledger = ledger(&store);
        let id = store.seed_sent(1, "wamid.1", "peer");

        let read = ledger
            .record_receipt(Channel::Telegram, "wamid.1", ReceiptKind::Read)
            .await
            .unwrap();
        assert_matches!(read, ReceiptOutcome::Applied { .. });

        let late = ledger
            .record_receipt(Channel::Telegram, "wamid.1", ReceiptKind::Delivered)
            .await
            .unwrap();
        assert_matches!(late, ReceiptOutcome::Ignored { log_id, ref status } if log_id == id && status == "read");
    }

    #[tokio::test]
    async fn stats_fold_every_row_once() {
        let store = Arc::new(MemoryStore::default());
        let ledger = ledger(&store);
        ledger.enqueue(new_notification(), false).await.unwrap();
        ledger.enqueue(new_notification(), true).await.unwrap();
        store.seed_sent(1, "1", "p");
        let errored = ledger.enqueue(new_notification(), false).await.unwrap();
        ledger.start_dispatch(errored.id).await.unwrap();
        ledger.mark_error(errored.id, "boom").await.unwrap();

        let stats = ledger
            .stats(
                1,
                fixed_now() - chrono::Duration::days(1),
                fixed_now() + chrono::Duration::days(1),
            )
            .await
            .unwrap();
        assert_eq!(stats.total_prepared, 4);
        assert_eq!(stats.sent, 2);
        assert_eq!(stats.test_prepared, 1);
        assert_eq!(stats.error, 1);
        assert_eq!(stats.bucket_sum(), stats.total_prepared);
    }

    #[tokio::test]
    async fn stats_reject_inverted_window() {
        let store = Arc::new(MemoryStore::default());
        let result = ledger(&store).stats(1, fixed_now(), fixed_now()).await;
        assert_matches!(result, Err(PipelineError::Core(CoreError::Validation(_))));
    }
}
