//! Repository for `agent_settings` (autopilot schedule, one row per agent).

use courier_core::types::{Date, DbId};
use sqlx::PgPool;

use crate::models::agent_settings::{AgentSettings, UpdateAgentSettings};

const COLUMNS: &str = "\
    id, user_id, auto_process_time, auto_process_days, last_auto_run_date, \
    is_test_mode, created_at, updated_at";

pub struct AgentSettingsRepo;

impl AgentSettingsRepo {
    pub async fn list_all(pool: &PgPool) -> Result<Vec<AgentSettings>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM agent_settings ORDER BY user_id");
        sqlx::query_as::<_, AgentSettings>(&query)
            .fetch_all(pool)
            .await
    }

    pub async fn find(pool: &PgPool, user_id: DbId) -> Result<Option<AgentSettings>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM agent_settings WHERE user_id = $1");
        sqlx::query_as::<_, AgentSettings>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Create the row with defaults if missing, then apply the provided fields.
    pub async fn upsert(
        pool: &PgPool,
        user_id: DbId,
        dto: &UpdateAgentSettings,
    ) -> Result<AgentSettings, sqlx::Error> {
        let query = format!(
            "INSERT INTO agent_settings (user_id, auto_process_time, auto_process_days, is_test_mode) \
             VALUES ($1, COALESCE($2, '09:00'::TIME), COALESCE($3, '{{1,2,3,4,5}}'::SMALLINT[]), \
                     COALESCE($4, false)) \
             ON CONFLICT ON CONSTRAINT uq_agent_settings_user DO UPDATE SET \
                 auto_process_time = COALESCE($2, agent_settings.auto_process_time), \
                 auto_process_days = COALESCE($3, agent_settings.auto_process_days), \
                 is_test_mode = COALESCE($4, agent_settings.is_test_mode), \
                 updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AgentSettings>(&query)
            .bind(user_id)
            .bind(dto.auto_process_time)
            .bind(&dto.auto_process_days)
            .bind(dto.is_test_mode)
            .fetch_one(pool)
            .await
    }

    /// Advance `last_auto_run_date` to `date`.
    ///
    /// Returns `false` when the stored date is already `date` or later (no
    /// row changed). Repeated calls for the same day are no-ops and the guard
    /// never moves backwards. The caller that gets `true` owns the day.
    pub async fn record_auto_run(
        pool: &PgPool,
        user_id: DbId,
        date: Date,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE agent_settings SET last_auto_run_date = $2, updated_at = NOW() \
             WHERE user_id = $1 AND (last_auto_run_date IS NULL OR last_auto_run_date < $2)",
        )
        .bind(user_id)
        .bind(date)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
