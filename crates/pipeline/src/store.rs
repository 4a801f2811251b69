//! Store contracts the pipeline components depend on, and their Postgres
//! implementation.
//!
//! Components hold `Arc<dyn ...Store>` so tests can substitute in-memory
//! fakes. The contracts only need equality/range filters and ordering.

use async_trait::async_trait;
use courier_core::channels::Channel;
use courier_core::notification_status::NotificationStatus;
use courier_core::types::{Date, DbId, Timestamp};
use courier_db::models::agent_settings::{AgentSettings, UpdateAgentSettings};
use courier_db::models::audit::{AuditRule, CreateAccessLog};
use courier_db::models::client::EventRecipient;
use courier_db::models::messenger_setting::MessengerSetting;
use courier_db::models::notification_log::{
    CreateNotificationLog, NotificationLog, NotificationLogQuery, TransitionFields,
};
use courier_db::models::notification_trigger::{
    NotificationTemplate, NotificationTrigger, UpsertTrigger,
};
use courier_db::repositories::{
    AccessLogRepo, AgentSettingsRepo, AuditBlacklistRepo, AuditRuleRepo, ClientRepo,
    MessengerSettingRepo, NotificationLogRepo, NotificationTemplateRepo, NotificationTriggerRepo,
    UserRepo,
};
use courier_db::DbPool;

use crate::error::StoreError;

// ---------------------------------------------------------------------------
// Contracts
// ---------------------------------------------------------------------------

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn load_rules(&self) -> Result<Vec<AuditRule>, StoreError>;
    async fn load_blacklist(&self) -> Result<Vec<DbId>, StoreError>;
    async fn find_role(&self, user_id: DbId) -> Result<Option<String>, StoreError>;
    async fn append_access_log(&self, entry: &CreateAccessLog) -> Result<(), StoreError>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn channel_settings(&self, user_id: DbId) -> Result<Vec<MessengerSetting>, StoreError>;
    async fn active_settings_for_channel(
        &self,
        channel: Channel,
    ) -> Result<Vec<MessengerSetting>, StoreError>;
}

#[async_trait]
pub trait TriggerStore: Send + Sync {
    async fn list_triggers(&self, user_id: DbId) -> Result<Vec<NotificationTrigger>, StoreError>;
    async fn list_active_triggers(
        &self,
        user_id: DbId,
    ) -> Result<Vec<NotificationTrigger>, StoreError>;
    async fn create_trigger(
        &self,
        user_id: DbId,
        dto: &UpsertTrigger,
    ) -> Result<NotificationTrigger, StoreError>;
    async fn update_trigger(
        &self,
        user_id: DbId,
        id: DbId,
        dto: &UpsertTrigger,
    ) -> Result<Option<NotificationTrigger>, StoreError>;
    async fn set_trigger_active(
        &self,
        user_id: DbId,
        id: DbId,
        is_active: bool,
    ) -> Result<Option<NotificationTrigger>, StoreError>;
    async fn delete_trigger(&self, user_id: DbId, id: DbId) -> Result<bool, StoreError>;
    async fn find_template(
        &self,
        user_id: DbId,
        id: DbId,
    ) -> Result<Option<NotificationTemplate>, StoreError>;

    async fn list_agent_settings(&self) -> Result<Vec<AgentSettings>, StoreError>;
    async fn find_agent_settings(&self, user_id: DbId)
        -> Result<Option<AgentSettings>, StoreError>;
    async fn upsert_agent_settings(
        &self,
        user_id: DbId,
        dto: &UpdateAgentSettings,
    ) -> Result<AgentSettings, StoreError>;
    /// Returns `false` when `date` was already recorded.
    async fn record_auto_run(&self, user_id: DbId, date: Date) -> Result<bool, StoreError>;

    /// Clients of `user_id` whose `event_type` business event falls on `date`.
    async fn event_recipients(
        &self,
        user_id: DbId,
        event_type: &str,
        date: Date,
    ) -> Result<Vec<EventRecipient>, StoreError>;
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn insert_log(&self, dto: &CreateNotificationLog) -> Result<NotificationLog, StoreError>;
    async fn find_log(&self, id: DbId) -> Result<Option<NotificationLog>, StoreError>;
    /// Conditional transition; `None` if the row is not in one of `from`.
    async fn transition_log(
        &self,
        id: DbId,
        from: &[NotificationStatus],
        to: NotificationStatus,
        fields: &TransitionFields,
    ) -> Result<Option<NotificationLog>, StoreError>;
    async fn mark_read(&self, ids: &[DbId], read_at: Timestamp) -> Result<u64, StoreError>;
    async fn list_unread_sent(
        &self,
        user_id: DbId,
        channel: Channel,
    ) -> Result<Vec<NotificationLog>, StoreError>;
    async fn find_by_external_id(
        &self,
        channel: Channel,
        external_message_id: &str,
    ) -> Result<Option<NotificationLog>, StoreError>;
    async fn list_queue(
        &self,
        user_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<NotificationLog>, StoreError>;
    async fn list_history(
        &self,
        user_id: DbId,
        query: &NotificationLogQuery,
    ) -> Result<Vec<NotificationLog>, StoreError>;
    async fn status_counts(
        &self,
        user_id: DbId,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<(String, i64)>, StoreError>;
}

// ---------------------------------------------------------------------------
// PgStore
// ---------------------------------------------------------------------------

/// Postgres-backed implementation of every store contract.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditStore for PgStore {
    async fn load_rules(&self) -> Result<Vec<AuditRule>, StoreError> {
        Ok(AuditRuleRepo::list_all(&self.pool).await?)
    }

    async fn load_blacklist(&self) -> Result<Vec<DbId>, StoreError> {
        let entries = AuditBlacklistRepo::list_all(&self.pool).await?;
        Ok(entries.into_iter().map(|e| e.target_user_id).collect())
    }

    async fn find_role(&self, user_id: DbId) -> Result<Option<String>, StoreError> {
        Ok(UserRepo::find_role(&self.pool, user_id).await?)
    }

    async fn append_access_log(&self, entry: &CreateAccessLog) -> Result<(), StoreError> {
        AccessLogRepo::insert(&self.pool, entry).await?;
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for PgStore {
    async fn channel_settings(&self, user_id: DbId) -> Result<Vec<MessengerSetting>, StoreError> {
        Ok(MessengerSettingRepo::list_for_user(&self.pool, user_id).await?)
    }

    async fn active_settings_for_channel(
        &self,
        channel: Channel,
    ) -> Result<Vec<MessengerSetting>, StoreError> {
        Ok(MessengerSettingRepo::list_active_by_channel(&self.pool, channel.as_str()).await?)
    }
}

#[async_trait]
impl TriggerStore for PgStore {
    async fn list_triggers(&self, user_id: DbId) -> Result<Vec<NotificationTrigger>, StoreError> {
        Ok(NotificationTriggerRepo::list_for_user(&self.pool, user_id).await?)
    }

    async fn list_active_triggers(
        &self,
        user_id: DbId,
    ) -> Result<Vec<NotificationTrigger>, StoreError> {
        Ok(NotificationTriggerRepo::list_active(&self.pool, user_id).await?)
    }

    async fn create_trigger(
        &self,
        user_id: DbId,
        dto: &UpsertTrigger,
    ) -> Result<NotificationTrigger, StoreError> {
        Ok(NotificationTriggerRepo::create(&self.pool, user_id, dto).await?)
    }

    async fn update_trigger(
        &self,
        user_id: DbId,
        id: DbId,
        dto: &UpsertTrigger,
    ) -> Result<Option<NotificationTrigger>, StoreError> {
        Ok(NotificationTriggerRepo::update(&self.pool, user_id, id, dto).await?)
    }

    async fn set_trigger_active(
        &self,
        user_id: DbId,
        id: DbId,
        is_active: bool,
    ) -> Result<Option<NotificationTrigger>, StoreError> {
        Ok(NotificationTriggerRepo::set_active(&self.pool, user_id, id, is_active).await?)
    }

    async fn delete_trigger(&self, user_id: DbId, id: DbId) -> Result<bool, StoreError> {
        Ok(NotificationTriggerRepo::delete(&self.pool, user_id, id).await?)
    }

    async fn find_template(
        &self,
        user_id: DbId,
        id: DbId,
    ) -> Result<Option<NotificationTemplate>, StoreError> {
        Ok(NotificationTemplateRepo::find(&self.pool, user_id, id).await?)
    }

    async fn list_agent_settings(&self) -> Result<Vec<AgentSettings>, StoreError> {
        Ok(AgentSettingsRepo::list_all(&self.pool).await?)
    }

    async fn find_agent_settings(
        &self,
        user_id: DbId,
    ) -> Result<Option<AgentSettings>, StoreError> {
        Ok(AgentSettingsRepo::find(&self.pool, user_id).await?)
    }

    async fn upsert_agent_settings(
        &self,
        user_id: DbId,
        dto: &UpdateAgentSettings,
    ) -> Result<AgentSettings, StoreError> {
        Ok(AgentSettingsRepo::upsert(&self.pool, user_id, dto).await?)
    }

    async fn record_auto_run(&self, user_id: DbId, date: Date) -> Result<bool, StoreError> {
        Ok(AgentSettingsRepo::record_auto_run(&self.pool, user_id, date).await?)
    }

    async fn event_recipients(
        &self,
        user_id: DbId,
        event_type: &str,
        date: Date,
    ) -> Result<Vec<EventRecipient>, StoreError> {
        use courier_core::autopilot::event_types;
        let recipients = match event_type {
            event_types::POLICY_EXPIRY => {
                ClientRepo::policies_ending_on(&self.pool, user_id, date).await?
            }
            event_types::BIRTHDAY => ClientRepo::birthdays_on(&self.pool, user_id, date).await?,
            _ => Vec::new(),
        };
        Ok(recipients)
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn insert_log(&self, dto: &CreateNotificationLog) -> Result<NotificationLog, StoreError> {
        Ok(NotificationLogRepo::create(&self.pool, dto).await?)
    }

    async fn find_log(&self, id: DbId) -> Result<Option<NotificationLog>, StoreError> {
        Ok(NotificationLogRepo::find_by_id(&self.pool, id).await?)
    }

    async fn transition_log(
        &self,
        id: DbId,
        from: &[NotificationStatus],
        to: NotificationStatus,
        fields: &TransitionFields,
    ) -> Result<Option<NotificationLog>, StoreError> {
        let from: Vec<&str> = from.iter().map(|s| s.as_str()).collect();
        Ok(NotificationLogRepo::transition(&self.pool, id, &from, to.as_str(), fields).await?)
    }

    async fn mark_read(&self, ids: &[DbId], read_at: Timestamp) -> Result<u64, StoreError> {
        Ok(NotificationLogRepo::mark_read(&self.pool, ids, read_at).await?)
    }

    async fn list_unread_sent(
        &self,
        user_id: DbId,
        channel: Channel,
    ) -> Result<Vec<NotificationLog>, StoreError> {
        Ok(NotificationLogRepo::list_unread_sent(&self.pool, user_id, channel.as_str()).await?)
    }

    async fn find_by_external_id(
        &self,
        channel: Channel,
        external_message_id: &str,
    ) -> Result<Option<NotificationLog>, StoreError> {
        Ok(
            NotificationLogRepo::find_by_external_id(&self.pool, channel.as_str(), external_message_id)
                .await?,
        )
    }

    async fn list_queue(
        &self,
        user_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<NotificationLog>, StoreError> {
        Ok(NotificationLogRepo::list_queue(&self.pool, user_id, limit, offset).await?)
    }

    async fn list_history(
        &self,
        user_id: DbId,
        query: &NotificationLogQuery,
    ) -> Result<Vec<NotificationLog>, StoreError> {
        Ok(NotificationLogRepo::list_history(&self.pool, user_id, query).await?)
    }

    async fn status_counts(
        &self,
        user_id: DbId,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<(String, i64)>, StoreError> {
        Ok(NotificationLogRepo::status_counts(&self.pool, user_id, from, to).await?)
    }
}
