//! The scheduled autopilot pass.
//!
//! For every agent whose schedule is due, render each active trigger's
//! template for the clients whose event falls `days_before` days from local
//! today, claim the day, then enqueue and dispatch. A pass with no usable
//! channel is reported and leaves `last_auto_run_date` alone so the next
//! window retries.
//!
//! The day is claimed through `record_auto_run` before the first provider
//! call. Once claimed, store failures on individual sends are counted
//! instead of aborting, so a message a provider already accepted is never
//! sent again on the same day.

use chrono::{Duration, FixedOffset};
use courier_core::autopilot::{evaluate_schedule, event_types, ScheduleDecision};
use courier_core::channels::Channel;
use courier_core::templates::{render, TemplateContext};
use courier_core::types::{Date, DbId, Timestamp};
use courier_db::models::agent_settings::AgentSettings;
use courier_db::models::client::EventRecipient;
use courier_db::models::notification_trigger::NotificationTrigger;
use courier_events::Recipient;
use serde::Serialize;

use crate::channel_validator::UsableChannel;
use crate::dispatcher::{DispatchOutcome, Dispatcher};
use crate::error::PipelineError;
use crate::ledger::{Ledger, NewNotification};
use crate::trigger_engine::TriggerEngine;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchCounts {
    pub prepared: usize,
    pub sent: usize,
    pub awaiting_confirmation: usize,
    pub failed: usize,
    pub simulated: usize,
    /// Sends abandoned because the ledger could not be written.
    pub store_errors: usize,
}

impl DispatchCounts {
    fn record(&mut self, outcome: &DispatchOutcome) {
        self.prepared += 1;
        match outcome {
            DispatchOutcome::Sent { .. } => self.sent += 1,
            DispatchOutcome::Failed { .. } => self.failed += 1,
            DispatchOutcome::AwaitingConfirmation { .. } => self.awaiting_confirmation += 1,
            DispatchOutcome::Simulated { .. } => self.simulated += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AgentPassOutcome {
    Skipped { reason: ScheduleDecision },
    /// Retryable on the next window.
    NoEligibleChannels,
    Dispatched(DispatchCounts),
    /// The pass stopped before claiming the day; nothing was sent and the
    /// next window retries.
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentPass {
    pub user_id: DbId,
    pub outcome: AgentPassOutcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PassReport {
    pub agents: Vec<AgentPass>,
    /// Ledger rows prepared across all agents.
    pub dispatched: usize,
    /// Agents whose pass ended in [`AgentPassOutcome::Failed`].
    pub failed_agents: usize,
}

/// One message ready to go out once the day is claimed.
struct PlannedSend {
    notification: NewNotification,
    channel: UsableChannel,
    recipient: Recipient,
}

#[derive(Clone)]
pub struct AutopilotRunner {
    engine: TriggerEngine,
    ledger: Ledger,
    dispatcher: Dispatcher,
    utc_offset: FixedOffset,
}

impl AutopilotRunner {
    pub fn new(
        engine: TriggerEngine,
        ledger: Ledger,
        dispatcher: Dispatcher,
        utc_offset: FixedOffset,
    ) -> Self {
        Self {
            engine,
            ledger,
            dispatcher,
            utc_offset,
        }
    }

    /// Run one pass for every agent at instant `now`.
    ///
    /// Safe to invoke repeatedly in the same window: an agent that already
    /// ran today is skipped. One agent's failure is reported in its
    /// [`AgentPass`] and does not stop the others; only failing to list the
    /// agents at all is an error.
    pub async fn run_pass(&self, now: Timestamp) -> Result<PassReport, PipelineError> {
        let mut report = PassReport::default();
        for settings in self.engine.all_autopilot_settings().await? {
            let user_id = settings.user_id;
            let outcome = match self.run_agent(&settings, now).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(user_id, error = %e, "Autopilot pass failed for agent");
                    AgentPassOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };
            match &outcome {
                AgentPassOutcome::Dispatched(counts) => report.dispatched += counts.prepared,
                AgentPassOutcome::Failed { .. } => report.failed_agents += 1,
                _ => {}
            }
            report.agents.push(AgentPass { user_id, outcome });
        }
        Ok(report)
    }

    async fn run_agent(
        &self,
        settings: &AgentSettings,
        now: Timestamp,
    ) -> Result<AgentPassOutcome, PipelineError> {
        let user_id = settings.user_id;
        let local = now.with_timezone(&self.utc_offset).naive_local();
        let today = local.date();

        let decision = evaluate_schedule(local, &settings.schedule());
        if decision != ScheduleDecision::Due {
            tracing::debug!(user_id, ?decision, "Autopilot not due");
            return Ok(AgentPassOutcome::Skipped { reason: decision });
        }

        let channels = self.engine.validator().configured_channels(user_id).await?;
        if channels.is_empty() {
            tracing::warn!(user_id, %today, "Autopilot due but no channel is configured");
            return Ok(AgentPassOutcome::NoEligibleChannels);
        }

        let mut plan = Vec::new();
        for trigger in self.engine.list_active_triggers(user_id).await? {
            self.plan_trigger(&trigger, today, &channels, &mut plan).await?;
        }

        // Claim the day before any provider is contacted. A concurrent or
        // earlier pass that already holds it wins.
        if !self.engine.record_auto_run(user_id, today).await? {
            return Ok(AgentPassOutcome::Skipped {
                reason: ScheduleDecision::AlreadyRanToday,
            });
        }

        let mut counts = DispatchCounts::default();
        for send in plan {
            let client_id = send.notification.client_id;
            match self.send(send, settings.is_test_mode).await {
                Ok(outcome) => counts.record(&outcome),
                Err(e) => {
                    counts.store_errors += 1;
                    tracing::error!(user_id, client_id, error = %e, "Autopilot send abandoned");
                }
            }
        }

        tracing::info!(
            user_id,
            prepared = counts.prepared,
            sent = counts.sent,
            failed = counts.failed,
            store_errors = counts.store_errors,
            "Autopilot pass complete"
        );
        Ok(AgentPassOutcome::Dispatched(counts))
    }

    async fn plan_trigger(
        &self,
        trigger: &NotificationTrigger,
        today: Date,
        channels: &[UsableChannel],
        plan: &mut Vec<PlannedSend>,
    ) -> Result<(), PipelineError> {
        let template = self.engine.template(trigger.user_id, trigger.template_id).await?;
        let event_date = today + Duration::days(i64::from(trigger.days_before));
        let recipients = self
            .engine
            .recipients(trigger.user_id, &trigger.event_type, event_date)
            .await?;

        for client in recipients {
            let Some(channel) = pick_channel(&client, channels) else {
                continue;
            };
            let ctx = TemplateContext {
                client_name: client.full_name.clone(),
                policy_number: client.policy_number.clone(),
                end_date: (trigger.event_type == event_types::POLICY_EXPIRY)
                    .then_some(client.event_date),
                days_left: Some(trigger.days_before),
            };
            plan.push(PlannedSend {
                notification: NewNotification {
                    user_id: trigger.user_id,
                    client_id: client.client_id,
                    trigger_id: Some(trigger.id),
                    channel: channel.channel,
                    template_title: Some(template.title.clone()),
                    message: render(&template.content, &ctx),
                },
                channel: channel.clone(),
                recipient: Recipient {
                    client_id: client.client_id,
                    phone: client.phone,
                    telegram_peer: client.telegram_peer,
                },
            });
        }
        Ok(())
    }

    async fn send(&self, send: PlannedSend, test_mode: bool) -> Result<DispatchOutcome, PipelineError> {
        let row = self.ledger.enqueue(send.notification, test_mode).await?;
        self.dispatcher.dispatch(row, &send.channel, send.recipient).await
    }
}

/// The client's preferred channel when usable, else the first in priority
/// order.
fn pick_channel<'a>(
    client: &EventRecipient,
    channels: &'a [UsableChannel],
) -> Option<&'a UsableChannel> {
    client
        .preferred_channel
        .as_deref()
        .and_then(|p| p.parse::<Channel>().ok())
        .and_then(|preferred| channels.iter().find(|c| c.channel == preferred))
        .or_else(|| channels.first())
}
