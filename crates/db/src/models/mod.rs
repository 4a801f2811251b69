//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A `Deserialize` create DTO for inserts
//! - A `Deserialize` update DTO (all `Option` fields) for patches

pub mod agent_settings;
pub mod audit;
pub mod client;
pub mod messenger_setting;
pub mod notification_log;
pub mod notification_trigger;
