//! Autopilot schedule evaluation and trigger validation.
//!
//! The scheduler fires once per day at `auto_process_time` on the ISO
//! weekdays listed in `auto_process_days` (1 = Monday .. 7 = Sunday).
//! `last_auto_run_date` is the durable guard against a second pass on the
//! same local calendar day. It only moves forward, so a backdated pass never
//! reopens a day that already ran.

use chrono::{Datelike, NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::error::CoreError;
use crate::types::Date;

/// Upper bound on `days_before`; a year ahead is the furthest any business
/// event is announced.
pub const MAX_DAYS_BEFORE: i32 = 365;

/// Known business event types a trigger can react to.
pub mod event_types {
    /// Fires `days_before` days before a policy's end date.
    pub const POLICY_EXPIRY: &str = "policy_expiry";
    /// Fires `days_before` days before a client's birthday.
    pub const BIRTHDAY: &str = "birthday";

    pub const ALL: &[&str] = &[POLICY_EXPIRY, BIRTHDAY];
}

/// The schedule-relevant part of `agent_settings`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutopilotSchedule {
    pub auto_process_time: NaiveTime,
    pub auto_process_days: Vec<i16>,
    pub last_auto_run_date: Option<Date>,
}

/// Whether a scheduled pass should run right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleDecision {
    Due,
    NotScheduledDay,
    BeforeWindow,
    /// The guard is on or after the evaluated day.
    AlreadyRanToday,
}

/// Evaluate the schedule at local wall-clock time `now_local`.
pub fn evaluate_schedule(now_local: NaiveDateTime, schedule: &AutopilotSchedule) -> ScheduleDecision {
    let today = now_local.date();
    if schedule.last_auto_run_date.is_some_and(|last| last >= today) {
        return ScheduleDecision::AlreadyRanToday;
    }
    let weekday = today.weekday().number_from_monday() as i16;
    if !schedule.auto_process_days.contains(&weekday) {
        return ScheduleDecision::NotScheduledDay;
    }
    if now_local.time() < schedule.auto_process_time {
        return ScheduleDecision::BeforeWindow;
    }
    ScheduleDecision::Due
}

/// Validate a trigger's `days_before`.
pub fn validate_days_before(days_before: i32) -> Result<(), CoreError> {
    if days_before < 0 {
        return Err(CoreError::Validation(
            "days_before must be zero or positive".into(),
        ));
    }
    if days_before > MAX_DAYS_BEFORE {
        return Err(CoreError::Validation(format!(
            "days_before must not exceed {MAX_DAYS_BEFORE}"
        )));
    }
    Ok(())
}

/// Validate a trigger's `event_type`.
pub fn validate_event_type(event_type: &str) -> Result<(), CoreError> {
    if event_types::ALL.contains(&event_type) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Unknown event type '{event_type}'. Must be one of: {}",
            event_types::ALL.join(", ")
        )))
    }
}

/// Validate a weekday list (ISO numbering, no duplicates).
pub fn validate_process_days(days: &[i16]) -> Result<(), CoreError> {
    if let Some(bad) = days.iter().find(|d| !(1..=7).contains(*d)) {
        return Err(CoreError::Validation(format!(
            "auto_process_days entries must be between 1 and 7, got {bad}"
        )));
    }
    let mut sorted = days.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    if sorted.len() != days.len() {
        return Err(CoreError::Validation(
            "auto_process_days must not contain duplicates".into(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
