//! Repository layer: one zero-sized struct per table group, each method
//! taking `&PgPool`.

pub mod agent_settings_repo;
pub mod audit_repo;
pub mod client_repo;
pub mod messenger_setting_repo;
pub mod notification_log_repo;
pub mod notification_trigger_repo;
pub mod user_repo;

pub use agent_settings_repo::AgentSettingsRepo;
pub use audit_repo::{AccessLogRepo, AuditBlacklistRepo, AuditRuleRepo};
pub use client_repo::ClientRepo;
pub use messenger_setting_repo::MessengerSettingRepo;
pub use notification_log_repo::NotificationLogRepo;
pub use notification_trigger_repo::{NotificationTemplateRepo, NotificationTriggerRepo};
pub use user_repo::UserRepo;
