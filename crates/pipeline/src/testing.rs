//! In-memory store and provider fakes for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{NaiveTime, TimeZone, Utc};
use courier_core::channels::{Channel, ChannelConfig, TelegramConfig};
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
use courier_events::{
    DeliveryError, MessageSender, OutboundMessage, PeerHandle, ProviderReceipt, ReadStateSession,
    SessionConnector,
};

use crate::error::StoreError;
use crate::store::{AuditStore, LedgerStore, SettingsStore, TriggerStore};

/// Monday 2026-03-02 10:00 UTC.
pub fn fixed_now() -> Timestamp {
    Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap()
}

fn unavailable() -> StoreError {
    StoreError::Unavailable("connection refused".into())
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Inner {
    next_id: DbId,
    roles: HashMap<DbId, String>,
    rules: Vec<AuditRule>,
    blacklist: HashSet<DbId>,
    access_logs: Vec<CreateAccessLog>,
    settings: Vec<MessengerSetting>,
    triggers: Vec<NotificationTrigger>,
    templates: Vec<NotificationTemplate>,
    agent_settings: Vec<AgentSettings>,
    recipients: Vec<(DbId, String, Date, EventRecipient)>,
    logs: Vec<NotificationLog>,
    fail_reads: bool,
    fail_access_log_writes: bool,
    fail_ledger_writes: bool,
}

impl Inner {
    fn id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }
}

/// Implements every store contract over plain vectors.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    rule_loads: AtomicUsize,
    role_lookups: AtomicUsize,
    auto_run_calls: AtomicUsize,
}

impl MemoryStore {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    fn check_reads(&self) -> Result<(), StoreError> {
        if self.lock().fail_reads {
            Err(unavailable())
        } else {
            Ok(())
        }
    }

    // -- audit --------------------------------------------------------------

    pub fn add_user(&self, user_id: DbId, role: &str) {
        self.lock().roles.insert(user_id, role.to_string());
    }

    pub fn set_rule(&self, role: &str, action: &str, is_enabled: bool) {
        let mut inner = self.lock();
        inner
            .rules
            .retain(|r| !(r.target_role == role && r.action_type == action));
        let id = inner.id();
        inner.rules.push(AuditRule {
            id,
            target_role: role.into(),
            action_type: action.into(),
            is_enabled,
            created_at: fixed_now(),
            updated_at: fixed_now(),
        });
    }

    pub fn blacklist(&self, user_id: DbId) {
        self.lock().blacklist.insert(user_id);
    }

    pub fn access_logs(&self) -> Vec<CreateAccessLog> {
        self.lock().access_logs.clone()
    }

    pub fn rule_loads(&self) -> usize {
        self.rule_loads.load(Ordering::SeqCst)
    }

    pub fn role_lookups(&self) -> usize {
        self.role_lookups.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }

    pub fn fail_access_log_writes(&self, fail: bool) {
        self.lock().fail_access_log_writes = fail;
    }

    pub fn fail_ledger_writes(&self, fail: bool) {
        self.lock().fail_ledger_writes = fail;
    }

    // -- settings -----------------------------------------------------------

    pub fn set_channel(&self, user_id: DbId, channel: Channel, is_active: bool, config: serde_json::Value) {
        let mut inner = self.lock();
        inner
            .settings
            .retain(|s| !(s.user_id == user_id && s.channel == channel.as_str()));
        let id = inner.id();
        inner.settings.push(MessengerSetting {
            id,
            user_id,
            channel: channel.as_str().into(),
            is_active,
            config,
            created_at: fixed_now(),
            updated_at: fixed_now(),
        });
    }

    // -- triggers -----------------------------------------------------------

    pub fn add_template(&self, user_id: DbId, title: &str, content: &str) -> DbId {
        let mut inner = self.lock();
        let id = inner.id();
        inner.templates.push(NotificationTemplate {
            id,
            user_id,
            title: title.into(),
            content: content.into(),
            created_at: fixed_now(),
            updated_at: fixed_now(),
        });
        id
    }

    pub fn add_trigger(&self, user_id: DbId, event_type: &str, template_id: DbId, days_before: i32) -> DbId {
        let mut inner = self.lock();
        let id = inner.id();
        inner.triggers.push(NotificationTrigger {
            id,
            user_id,
            event_type: event_type.into(),
            template_id,
            days_before,
            is_active: true,
            created_at: fixed_now(),
            updated_at: fixed_now(),
        });
        id
    }

    pub fn set_agent_settings(&self, user_id: DbId, days: Vec<i16>, last_run: Option<Date>, test_mode: bool) {
        let mut inner = self.lock();
        inner.agent_settings.retain(|s| s.user_id != user_id);
        let id = inner.id();
        inner.agent_settings.push(AgentSettings {
            id,
            user_id,
            auto_process_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            auto_process_days: days,
            last_auto_run_date: last_run,
            is_test_mode: test_mode,
            created_at: fixed_now(),
            updated_at: fixed_now(),
        });
    }

    pub fn last_auto_run(&self, user_id: DbId) -> Option<Date> {
        self.lock()
            .agent_settings
            .iter()
            .find(|s| s.user_id == user_id)
            .and_then(|s| s.last_auto_run_date)
    }

    pub fn auto_run_calls(&self) -> usize {
        self.auto_run_calls.load(Ordering::SeqCst)
    }

    pub fn add_recipient(&self, user_id: DbId, event_type: &str, date: Date, recipient: EventRecipient) {
        self.lock()
            .recipients
            .push((user_id, event_type.into(), date, recipient));
    }

    // -- ledger -------------------------------------------------------------

    /// Insert a `sent` row as if a provider had accepted it.
    pub fn seed_sent(&self, user_id: DbId, external_id: &str, peer: &str) -> DbId {
        let mut inner = self.lock();
        let id = inner.id();
        inner.logs.push(NotificationLog {
            id,
            user_id,
            client_id: 1,
            trigger_id: None,
            channel: Channel::Telegram.as_str().into(),
            status: NotificationStatus::Sent.as_str().into(),
            sent_at: fixed_now(),
            read_at: None,
            template_title: None,
            message: "hello".into(),
            external_message_id: Some(external_id.into()),
            external_peer_id: Some(peer.into()),
            error_message: None,
            updated_at: fixed_now(),
        });
        id
    }

    pub fn log(&self, id: DbId) -> NotificationLog {
        self.lock()
            .logs
            .iter()
            .find(|l| l.id == id)
            .cloned()
            .expect("log row")
    }

    pub fn logs(&self) -> Vec<NotificationLog> {
        self.lock().logs.clone()
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn load_rules(&self) -> Result<Vec<AuditRule>, StoreError> {
        self.check_reads()?;
        self.rule_loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.lock().rules.clone())
    }

    async fn load_blacklist(&self) -> Result<Vec<DbId>, StoreError> {
        self.check_reads()?;
        Ok(self.lock().blacklist.iter().copied().collect())
    }

    async fn find_role(&self, user_id: DbId) -> Result<Option<String>, StoreError> {
        self.check_reads()?;
        self.role_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.lock().roles.get(&user_id).cloned())
    }

    async fn append_access_log(&self, entry: &CreateAccessLog) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.fail_access_log_writes {
            return Err(unavailable());
        }
        inner.access_logs.push(entry.clone());
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn channel_settings(&self, user_id: DbId) -> Result<Vec<MessengerSetting>, StoreError> {
        self.check_reads()?;
        Ok(self
            .lock()
            .settings
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn active_settings_for_channel(
        &self,
        channel: Channel,
    ) -> Result<Vec<MessengerSetting>, StoreError> {
        self.check_reads()?;
        let mut rows: Vec<MessengerSetting> = self
            .lock()
            .settings
            .iter()
            .filter(|s| s.channel == channel.as_str() && s.is_active)
            .cloned()
            .collect();
        rows.sort_by_key(|s| s.user_id);
        Ok(rows)
    }
}

#[async_trait]
impl TriggerStore for MemoryStore {
    async fn list_triggers(&self, user_id: DbId) -> Result<Vec<NotificationTrigger>, StoreError> {
        self.check_reads()?;
        Ok(self
            .lock()
            .triggers
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_active_triggers(
        &self,
        user_id: DbId,
    ) -> Result<Vec<NotificationTrigger>, StoreError> {
        Ok(self
            .list_triggers(user_id)
            .await?
            .into_iter()
            .filter(|t| t.is_active)
            .collect())
    }

    async fn create_trigger(
        &self,
        user_id: DbId,
        dto: &UpsertTrigger,
    ) -> Result<NotificationTrigger, StoreError> {
        let id = self.add_trigger(user_id, &dto.event_type, dto.template_id, dto.days_before);
        let mut inner = self.lock();
        let trigger = inner
            .triggers
            .iter_mut()
            .find(|t| t.id == id)
            .expect("just inserted");
        trigger.is_active = dto.is_active;
        Ok(trigger.clone())
    }

    async fn update_trigger(
        &self,
        user_id: DbId,
        id: DbId,
        dto: &UpsertTrigger,
    ) -> Result<Option<NotificationTrigger>, StoreError> {
        let mut inner = self.lock();
        Ok(inner
            .triggers
            .iter_mut()
            .find(|t| t.id == id && t.user_id == user_id)
            .map(|t| {
                t.event_type = dto.event_type.clone();
                t.template_id = dto.template_id;
                t.days_before = dto.days_before;
                t.is_active = dto.is_active;
                t.clone()
            }))
    }

    async fn set_trigger_active(
        &self,
        user_id: DbId,
        id: DbId,
        is_active: bool,
    ) -> Result<Option<NotificationTrigger>, StoreError> {
        let mut inner = self.lock();
        Ok(inner
            .triggers
            .iter_mut()
            .find(|t| t.id == id && t.user_id == user_id)
            .map(|t| {
                t.is_active = is_active;
                t.clone()
            }))
    }

    async fn delete_trigger(&self, user_id: DbId, id: DbId) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        let before = inner.triggers.len();
        inner.triggers.retain(|t| !(t.id == id && t.user_id == user_id));
        Ok(inner.triggers.len() < before)
    }

    async fn find_template(
        &self,
        user_id: DbId,
        id: DbId,
    ) -> Result<Option<NotificationTemplate>, StoreError> {
        Ok(self
            .lock()
            .templates
            .iter()
            .find(|t| t.id == id && t.user_id == user_id)
            .cloned())
    }

    async fn list_agent_settings(&self) -> Result<Vec<AgentSettings>, StoreError> {
        self.check_reads()?;
        Ok(self.lock().agent_settings.clone())
    }

    async fn find_agent_settings(
        &self,
        user_id: DbId,
    ) -> Result<Option<AgentSettings>, StoreError> {
        self.check_reads()?;
        Ok(self
            .lock()
            .agent_settings
            .iter()
            .find(|s| s.user_id == user_id)
            .cloned())
    }

    async fn upsert_agent_settings(
        &self,
        user_id: DbId,
        dto: &UpdateAgentSettings,
    ) -> Result<AgentSettings, StoreError> {
        if self.find_agent_settings(user_id).await?.is_none() {
            self.set_agent_settings(user_id, vec![1, 2, 3, 4, 5], None, false);
        }
        let mut inner = self.lock();
        let settings = inner
            .agent_settings
            .iter_mut()
            .find(|s| s.user_id == user_id)
            .expect("row exists");
        if let Some(time) = dto.auto_process_time {
            settings.auto_process_time = time;
        }
        if let Some(days) = &dto.auto_process_days {
            settings.auto_process_days = days.clone();
        }
        if let Some(test_mode) = dto.is_test_mode {
            settings.is_test_mode = test_mode;
        }
        Ok(settings.clone())
    }

    async fn record_auto_run(&self, user_id: DbId, date: Date) -> Result<bool, StoreError> {
        self.auto_run_calls.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.lock();
        match inner.agent_settings.iter_mut().find(|s| s.user_id == user_id) {
            Some(s) if s.last_auto_run_date.map_or(true, |last| last < date) => {
                s.last_auto_run_date = Some(date);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn event_recipients(
        &self,
        user_id: DbId,
        event_type: &str,
        date: Date,
    ) -> Result<Vec<EventRecipient>, StoreError> {
        self.check_reads()?;
        Ok(self
            .lock()
            .recipients
            .iter()
            .filter(|(u, e, d, _)| *u == user_id && e == event_type && *d == date)
            .map(|(_, _, _, r)| r.clone())
            .collect())
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn insert_log(&self, dto: &CreateNotificationLog) -> Result<NotificationLog, StoreError> {
        let mut inner = self.lock();
        if inner.fail_ledger_writes {
            return Err(unavailable());
        }
        let id = inner.id();
        let row = NotificationLog {
            id,
            user_id: dto.user_id,
            client_id: dto.client_id,
            trigger_id: dto.trigger_id,
            channel: dto.channel.clone(),
            status: dto.status.as_str().into(),
            sent_at: fixed_now(),
            read_at: None,
            template_title: dto.template_title.clone(),
            message: dto.message.clone(),
            external_message_id: None,
            external_peer_id: None,
            error_message: None,
            updated_at: fixed_now(),
        };
        inner.logs.push(row.clone());
        Ok(row)
    }

    async fn find_log(&self, id: DbId) -> Result<Option<NotificationLog>, StoreError> {
        self.check_reads()?;
        Ok(self.lock().logs.iter().find(|l| l.id == id).cloned())
    }

    async fn transition_log(
        &self,
        id: DbId,
        from: &[NotificationStatus],
        to: NotificationStatus,
        fields: &TransitionFields,
    ) -> Result<Option<NotificationLog>, StoreError> {
        let mut inner = self.lock();
        if inner.fail_ledger_writes {
            return Err(unavailable());
        }
        let Some(row) = inner.logs.iter_mut().find(|l| l.id == id) else {
            return Ok(None);
        };
        if !from.iter().any(|s| s.as_str() == row.status) {
            return Ok(None);
        }
        row.status = to.as_str().into();
        if fields.external_message_id.is_some() {
            row.external_message_id = fields.external_message_id.clone();
        }
        if fields.external_peer_id.is_some() {
            row.external_peer_id = fields.external_peer_id.clone();
        }
        if fields.error_message.is_some() {
            row.error_message = fields.error_message.clone();
        }
        if fields.read_at.is_some() {
            row.read_at = fields.read_at;
        }
        Ok(Some(row.clone()))
    }

    async fn mark_read(&self, ids: &[DbId], read_at: Timestamp) -> Result<u64, StoreError> {
        let mut inner = self.lock();
        if inner.fail_ledger_writes {
            return Err(unavailable());
        }
        let mut updated = 0;
        for row in inner.logs.iter_mut().filter(|l| ids.contains(&l.id)) {
            if (row.status == "sent" || row.status == "delivered") && row.read_at.is_none() {
                row.status = "read".into();
                row.read_at = Some(read_at);
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn list_unread_sent(
        &self,
        user_id: DbId,
        channel: Channel,
    ) -> Result<Vec<NotificationLog>, StoreError> {
        self.check_reads()?;
        Ok(self
            .lock()
            .logs
            .iter()
            .filter(|l| {
                l.user_id == user_id
                    && l.channel == channel.as_str()
                    && l.status == "sent"
                    && l.read_at.is_none()
                    && l.external_message_id.is_some()
                    && l.external_peer_id.is_some()
            })
            .cloned()
            .collect())
    }

    async fn find_by_external_id(
        &self,
        channel: Channel,
        external_message_id: &str,
    ) -> Result<Option<NotificationLog>, StoreError> {
        self.check_reads()?;
        Ok(self
            .lock()
            .logs
            .iter()
            .rev()
            .find(|l| {
                l.channel == channel.as_str()
                    && l.external_message_id.as_deref() == Some(external_message_id)
            })
            .cloned())
    }

    async fn list_queue(
        &self,
        user_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<NotificationLog>, StoreError> {
        self.check_reads()?;
        Ok(self
            .lock()
            .logs
            .iter()
            .filter(|l| l.user_id == user_id && (l.status == "pending" || l.status == "sending"))
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn list_history(
        &self,
        user_id: DbId,
        _query: &NotificationLogQuery,
    ) -> Result<Vec<NotificationLog>, StoreError> {
        self.check_reads()?;
        Ok(self
            .lock()
            .logs
            .iter()
            .rev()
            .filter(|l| l.user_id == user_id && l.status != "pending" && l.status != "sending")
            .cloned()
            .collect())
    }

    async fn status_counts(
        &self,
        user_id: DbId,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<(String, i64)>, StoreError> {
        self.check_reads()?;
        let mut counts: HashMap<String, i64> = HashMap::new();
        for row in self
            .lock()
            .logs
            .iter()
            .filter(|l| l.user_id == user_id && l.sent_at >= from && l.sent_at < to)
        {
            *counts.entry(row.status.clone()).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Provider fakes
// ---------------------------------------------------------------------------

/// Records every send and answers from a script keyed by recipient phone.
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<(Channel, OutboundMessage)>>,
    rejected_phones: Mutex<HashSet<String>>,
}

impl RecordingSender {
    pub fn reject_phone(&self, phone: &str) {
        self.rejected_phones.lock().unwrap().insert(phone.into());
    }

    pub fn sent(&self) -> Vec<(Channel, OutboundMessage)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send(
        &self,
        config: &ChannelConfig,
        message: &OutboundMessage,
    ) -> Result<ProviderReceipt, DeliveryError> {
        let phone = message.recipient.phone.clone().unwrap_or_default();
        if self.rejected_phones.lock().unwrap().contains(&phone) {
            return Err(DeliveryError::Rejected("recipient blocked the bot".into()));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push((config.channel(), message.clone()));
        Ok(ProviderReceipt {
            external_message_id: (1000 + sent.len()).to_string(),
            external_peer_id: Some(format!("peer-{}", message.recipient.client_id)),
        })
    }
}

/// Scripted MTProto-like sessions.
#[derive(Default)]
pub struct FakeBridge {
    /// `session_string -> peer -> watermark`.
    watermarks: Mutex<HashMap<String, HashMap<String, i64>>>,
    failing_sessions: Mutex<HashSet<String>>,
    failing_peers: Mutex<HashSet<String>>,
    /// Peers whose lookup never completes.
    hanging_peers: Mutex<HashSet<String>>,
    pub connects: AtomicUsize,
    pub disconnects: Arc<AtomicUsize>,
    pub watermark_calls: Arc<AtomicUsize>,
}

impl FakeBridge {
    pub fn set_watermark(&self, session: &str, peer: &str, watermark: i64) {
        self.watermarks
            .lock()
            .unwrap()
            .entry(session.into())
            .or_default()
            .insert(peer.into(), watermark);
    }

    pub fn fail_session(&self, session: &str) {
        self.failing_sessions.lock().unwrap().insert(session.into());
    }

    pub fn fail_peer(&self, peer: &str) {
        self.failing_peers.lock().unwrap().insert(peer.into());
    }

    pub fn hang_peer(&self, peer: &str) {
        self.hanging_peers.lock().unwrap().insert(peer.into());
    }
}

struct FakeSession {
    watermarks: HashMap<String, i64>,
    failing_peers: HashSet<String>,
    hanging_peers: HashSet<String>,
    disconnects: Arc<AtomicUsize>,
    watermark_calls: Arc<AtomicUsize>,
}

#[async_trait]
impl SessionConnector for FakeBridge {
    async fn connect(
        &self,
        config: &TelegramConfig,
    ) -> Result<Box<dyn ReadStateSession>, DeliveryError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let session = config.session_string.clone().unwrap_or_default();
        if self.failing_sessions.lock().unwrap().contains(&session) {
            return Err(DeliveryError::Rejected("AUTH_KEY_UNREGISTERED".into()));
        }
        Ok(Box::new(FakeSession {
            watermarks: self
                .watermarks
                .lock()
                .unwrap()
                .get(&session)
                .cloned()
                .unwrap_or_default(),
            failing_peers: self.failing_peers.lock().unwrap().clone(),
            hanging_peers: self.hanging_peers.lock().unwrap().clone(),
            disconnects: self.disconnects.clone(),
            watermark_calls: self.watermark_calls.clone(),
        }))
    }
}

#[async_trait]
impl ReadStateSession for FakeSession {
    async fn resolve_entity(&mut self, peer_id: &str) -> Result<PeerHandle, DeliveryError> {
        if self.hanging_peers.contains(peer_id) {
            std::future::pending::<()>().await;
        }
        if self.failing_peers.contains(peer_id) {
            return Err(DeliveryError::Rejected("PEER_ID_INVALID".into()));
        }
        Ok(PeerHandle {
            peer_id: peer_id.into(),
            entity_ref: format!("entity:{peer_id}"),
        })
    }

    async fn read_watermark(&mut self, peer: &PeerHandle) -> Result<i64, DeliveryError> {
        self.watermark_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.watermarks.get(&peer.peer_id).copied().unwrap_or(0))
    }

    async fn disconnect(&mut self) -> Result<(), DeliveryError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
