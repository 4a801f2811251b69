pub mod audit;
pub mod clients;
pub mod jobs;
pub mod messengers;
pub mod notification_logs;
pub mod triggers;
