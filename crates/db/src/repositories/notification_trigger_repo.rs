//! Repository for `notification_triggers` and `notification_templates`.

use courier_core::types::DbId;
use sqlx::PgPool;

use crate::models::notification_trigger::{NotificationTemplate, NotificationTrigger, UpsertTrigger};

const COLUMNS: &str =
    "id, user_id, event_type, template_id, days_before, is_active, created_at, updated_at";

const TEMPLATE_COLUMNS: &str = "id, user_id, title, content, created_at, updated_at";

// ---------------------------------------------------------------------------
// NotificationTriggerRepo
// ---------------------------------------------------------------------------

pub struct NotificationTriggerRepo;

impl NotificationTriggerRepo {
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<NotificationTrigger>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM notification_triggers WHERE user_id = $1 ORDER BY id");
        sqlx::query_as::<_, NotificationTrigger>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    pub async fn list_active(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<NotificationTrigger>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM notification_triggers \
             WHERE user_id = $1 AND is_active = true ORDER BY id"
        );
        sqlx::query_as::<_, NotificationTrigger>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    pub async fn create(
        pool: &PgPool,
        user_id: DbId,
        dto: &UpsertTrigger,
    ) -> Result<NotificationTrigger, sqlx::Error> {
        let query = format!(
            "INSERT INTO notification_triggers \
             (user_id, event_type, template_id, days_before, is_active) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, NotificationTrigger>(&query)
            .bind(user_id)
            .bind(&dto.event_type)
            .bind(dto.template_id)
            .bind(dto.days_before)
            .bind(dto.is_active)
            .fetch_one(pool)
            .await
    }

    /// Replace a trigger owned by `user_id`. `None` if it does not exist.
    pub async fn update(
        pool: &PgPool,
        user_id: DbId,
        id: DbId,
        dto: &UpsertTrigger,
    ) -> Result<Option<NotificationTrigger>, sqlx::Error> {
        let query = format!(
            "UPDATE notification_triggers \
             SET event_type = $3, template_id = $4, days_before = $5, is_active = $6, \
                 updated_at = NOW() \
             WHERE id = $1 AND user_id = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, NotificationTrigger>(&query)
            .bind(id)
            .bind(user_id)
            .bind(&dto.event_type)
            .bind(dto.template_id)
            .bind(dto.days_before)
            .bind(dto.is_active)
            .fetch_optional(pool)
            .await
    }

    pub async fn set_active(
        pool: &PgPool,
        user_id: DbId,
        id: DbId,
        is_active: bool,
    ) -> Result<Option<NotificationTrigger>, sqlx::Error> {
        let query = format!(
            "UPDATE notification_triggers SET is_active = $3, updated_at = NOW() \
             WHERE id = $1 AND user_id = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, NotificationTrigger>(&query)
            .bind(id)
            .bind(user_id)
            .bind(is_active)
            .fetch_optional(pool)
            .await
    }

    /// Returns `true` if a row was deleted.
    pub async fn delete(pool: &PgPool, user_id: DbId, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM notification_triggers WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ---------------------------------------------------------------------------
// NotificationTemplateRepo
// ---------------------------------------------------------------------------

/// Templates are authored elsewhere; the pipeline only reads them.
pub struct NotificationTemplateRepo;

impl NotificationTemplateRepo {
    pub async fn find(
        pool: &PgPool,
        user_id: DbId,
        id: DbId,
    ) -> Result<Option<NotificationTemplate>, sqlx::Error> {
        let query = format!(
            "SELECT {TEMPLATE_COLUMNS} FROM notification_templates WHERE id = $1 AND user_id = $2"
        );
        sqlx::query_as::<_, NotificationTemplate>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Insert a template and return it (seeding and tests).
    pub async fn create(
        pool: &PgPool,
        user_id: DbId,
        title: &str,
        content: &str,
    ) -> Result<NotificationTemplate, sqlx::Error> {
        let query = format!(
            "INSERT INTO notification_templates (user_id, title, content) \
             VALUES ($1, $2, $3) RETURNING {TEMPLATE_COLUMNS}"
        );
        sqlx::query_as::<_, NotificationTemplate>(&query)
            .bind(user_id)
            .bind(title)
            .bind(content)
            .fetch_one(pool)
            .await
    }
}
