//! Autopilot settings (`agent_settings`), singleton per agent.

use chrono::NaiveTime;
use courier_core::autopilot::AutopilotSchedule;
use courier_core::types::{Date, DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AgentSettings {
    pub id: DbId,
    pub user_id: DbId,
    pub auto_process_time: NaiveTime,
    pub auto_process_days: Vec<i16>,
    pub last_auto_run_date: Option<Date>,
    pub is_test_mode: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl AgentSettings {
    pub fn schedule(&self) -> AutopilotSchedule {
        AutopilotSchedule {
            auto_process_time: self.auto_process_time,
            auto_process_days: self.auto_process_days.clone(),
            last_auto_run_date: self.last_auto_run_date,
        }
    }
}

/// DTO for updating autopilot settings. `last_auto_run_date` is only ever
/// written by the scheduled pass.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateAgentSettings {
    pub auto_process_time: Option<NaiveTime>,
    pub auto_process_days: Option<Vec<i16>>,
    pub is_test_mode: Option<bool>,
}
