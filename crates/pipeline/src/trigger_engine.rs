//! Notification trigger CRUD and autopilot settings.
//!
//! The engine validates and persists triggers and owns the
//! `last_auto_run_date` guard. Executing the schedule is the job of
//! [`crate::autopilot::AutopilotRunner`].

use std::sync::Arc;

use courier_core::autopilot::{validate_days_before, validate_event_type, validate_process_days};
use courier_core::error::CoreError;
use courier_core::types::{Date, DbId};
use courier_db::models::agent_settings::{AgentSettings, UpdateAgentSettings};
use courier_db::models::client::EventRecipient;
use courier_db::models::notification_trigger::{
    NotificationTemplate, NotificationTrigger, UpsertTrigger,
};

use crate::channel_validator::ChannelValidator;
use crate::error::{PipelineError, StoreError};
use crate::store::TriggerStore;

#[derive(Clone)]
pub struct TriggerEngine {
    store: Arc<dyn TriggerStore>,
    validator: ChannelValidator,
}

impl TriggerEngine {
    pub fn new(store: Arc<dyn TriggerStore>, validator: ChannelValidator) -> Self {
        Self { store, validator }
    }

    pub fn validator(&self) -> &ChannelValidator {
        &self.validator
    }

    // -----------------------------------------------------------------------
    // Triggers
    // -----------------------------------------------------------------------

    pub async fn list_triggers(
        &self,
        user_id: DbId,
    ) -> Result<Vec<NotificationTrigger>, StoreError> {
        self.store.list_triggers(user_id).await
    }

    pub async fn list_active_triggers(
        &self,
        user_id: DbId,
    ) -> Result<Vec<NotificationTrigger>, StoreError> {
        self.store.list_active_triggers(user_id).await
    }

    /// Create (`dto.id = None`) or replace a trigger.
    pub async fn upsert_trigger(
        &self,
        user_id: DbId,
        dto: &UpsertTrigger,
    ) -> Result<NotificationTrigger, PipelineError> {
        validate_days_before(dto.days_before)?;
        validate_event_type(&dto.event_type)?;
        self.template(user_id, dto.template_id).await?;

        match dto.id {
            Some(id) => self
                .store
                .update_trigger(user_id, id, dto)
                .await?
                .ok_or(not_found(id)),
            None => Ok(self.store.create_trigger(user_id, dto).await?),
        }
    }

    pub async fn toggle(
        &self,
        user_id: DbId,
        id: DbId,
        is_active: bool,
    ) -> Result<NotificationTrigger, PipelineError> {
        let trigger = self
            .store
            .set_trigger_active(user_id, id, is_active)
            .await?
            .ok_or(not_found(id))?;
        tracing::info!(user_id, trigger_id = id, is_active, "Trigger toggled");
        Ok(trigger)
    }

    pub async fn delete(&self, user_id: DbId, id: DbId) -> Result<(), PipelineError> {
        if self.store.delete_trigger(user_id, id).await? {
            Ok(())
        } else {
            Err(not_found(id))
        }
    }

    pub async fn template(
        &self,
        user_id: DbId,
        id: DbId,
    ) -> Result<NotificationTemplate, PipelineError> {
        self.store
            .find_template(user_id, id)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound {
                    entity: "NotificationTemplate",
                    id,
                }
                .into()
            })
    }

    /// Clients whose `event_type` event falls on `date`.
    pub async fn recipients(
        &self,
        user_id: DbId,
        event_type: &str,
        date: Date,
    ) -> Result<Vec<EventRecipient>, StoreError> {
        self.store.event_recipients(user_id, event_type, date).await
    }

    // -----------------------------------------------------------------------
    // Autopilot settings
    // -----------------------------------------------------------------------

    /// Record a scheduled pass for `date`.
    ///
    /// Idempotent: a second call for the same date, or a call for an earlier
    /// date, is a no-op and returns `false`.
    pub async fn record_auto_run(&self, user_id: DbId, date: Date) -> Result<bool, StoreError> {
        let changed = self.store.record_auto_run(user_id, date).await?;
        if changed {
            tracing::info!(user_id, %date, "Autopilot run recorded");
        } else {
            tracing::debug!(user_id, %date, "Autopilot run already recorded");
        }
        Ok(changed)
    }

    pub async fn all_autopilot_settings(&self) -> Result<Vec<AgentSettings>, StoreError> {
        self.store.list_agent_settings().await
    }

    /// The agent's settings, creating the default row on first access.
    pub async fn autopilot_settings(&self, user_id: DbId) -> Result<AgentSettings, StoreError> {
        match self.store.find_agent_settings(user_id).await? {
            Some(settings) => Ok(settings),
            None => {
                let defaults = UpdateAgentSettings {
                    auto_process_time: None,
                    auto_process_days: None,
                    is_test_mode: None,
                };
                self.store.upsert_agent_settings(user_id, &defaults).await
            }
        }
    }

    pub async fn update_autopilot_settings(
        &self,
        user_id: DbId,
        dto: &UpdateAgentSettings,
    ) -> Result<AgentSettings, PipelineError> {
        if let Some(days) = &dto.auto_process_days {
            validate_process_days(days)?;
        }
        Ok(self.store.upsert_agent_settings(user_id, dto).await?)
    }
}

fn not_found(id: DbId) -> PipelineError {
    CoreError::NotFound {
        entity: "NotificationTrigger",
        id,
    }
    .into()
}
