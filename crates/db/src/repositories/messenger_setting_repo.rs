//! Repository for the `messenger_settings` table.

use courier_core::types::DbId;
use sqlx::PgPool;

use crate::models::messenger_setting::{MessengerSetting, UpsertMessengerSetting};

const COLUMNS: &str = "id, user_id, channel, is_active, config, created_at, updated_at";

/// Per-agent channel settings. Rows are deactivated, never deleted.
pub struct MessengerSettingRepo;

impl MessengerSettingRepo {
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<MessengerSetting>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM messenger_settings WHERE user_id = $1 ORDER BY channel");
        sqlx::query_as::<_, MessengerSetting>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    pub async fn find(
        pool: &PgPool,
        user_id: DbId,
        channel: &str,
    ) -> Result<Option<MessengerSetting>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM messenger_settings WHERE user_id = $1 AND channel = $2"
        );
        sqlx::query_as::<_, MessengerSetting>(&query)
            .bind(user_id)
            .bind(channel)
            .fetch_optional(pool)
            .await
    }

    /// Insert or replace the setting for `(user_id, channel)`.
    pub async fn upsert(
        pool: &PgPool,
        user_id: DbId,
        channel: &str,
        dto: &UpsertMessengerSetting,
    ) -> Result<MessengerSetting, sqlx::Error> {
        let query = format!(
            "INSERT INTO messenger_settings (user_id, channel, is_active, config) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT ON CONSTRAINT uq_messenger_settings_user_channel \
             DO UPDATE SET is_active = EXCLUDED.is_active, config = EXCLUDED.config, \
                           updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        let config = if dto.config.is_null() {
            serde_json::json!({})
        } else {
            dto.config.clone()
        };
        sqlx::query_as::<_, MessengerSetting>(&query)
            .bind(user_id)
            .bind(channel)
            .bind(dto.is_active)
            .bind(config)
            .fetch_one(pool)
            .await
    }

    /// Every active row for `channel`, across all agents.
    pub async fn list_active_by_channel(
        pool: &PgPool,
        channel: &str,
    ) -> Result<Vec<MessengerSetting>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM messenger_settings \
             WHERE channel = $1 AND is_active = true \
             ORDER BY user_id"
        );
        sqlx::query_as::<_, MessengerSetting>(&query)
            .bind(channel)
            .fetch_all(pool)
            .await
    }
}
