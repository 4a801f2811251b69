//! Repository for the `notification_logs` ledger.
//!
//! Rows are only ever inserted and transitioned. Every transition is a
//! conditional UPDATE guarded on the current status, so a row either moves
//! atomically along a legal edge or is left untouched.

use courier_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::notification_log::{
    CreateNotificationLog, NotificationLog, NotificationLogQuery, TransitionFields,
};

/// Column list for `notification_logs` SELECT queries.
const COLUMNS: &str = "\
    id, user_id, client_id, trigger_id, channel, status, sent_at, read_at, \
    template_title, message, external_message_id, external_peer_id, \
    error_message, updated_at";

/// Statuses shown in the outbound queue projection.
const QUEUED_STATUSES: &[&str] = &["pending", "sending"];

pub struct NotificationLogRepo;

impl NotificationLogRepo {
    pub async fn create(
        pool: &PgPool,
        dto: &CreateNotificationLog,
    ) -> Result<NotificationLog, sqlx::Error> {
        let query = format!(
            "INSERT INTO notification_logs \
             (user_id, client_id, trigger_id, channel, status, template_title, message) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, NotificationLog>(&query)
            .bind(dto.user_id)
            .bind(dto.client_id)
            .bind(dto.trigger_id)
            .bind(&dto.channel)
            .bind(dto.status.as_str())
            .bind(&dto.template_title)
            .bind(&dto.message)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<NotificationLog>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM notification_logs WHERE id = $1");
        sqlx::query_as::<_, NotificationLog>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Move a row to `to` if its current status is one of `from`.
    ///
    /// Non-null `fields` overwrite their columns; null ones keep the stored
    /// value. Returns `None` when the row does not exist or is not in an
    /// allowed source status.
    pub async fn transition(
        pool: &PgPool,
        id: DbId,
        from: &[&str],
        to: &str,
        fields: &TransitionFields,
    ) -> Result<Option<NotificationLog>, sqlx::Error> {
        let query = format!(
            "UPDATE notification_logs SET \
                 status = $3, \
                 external_message_id = COALESCE($4, external_message_id), \
                 external_peer_id = COALESCE($5, external_peer_id), \
                 error_message = COALESCE($6, error_message), \
                 read_at = COALESCE($7, read_at), \
                 updated_at = NOW() \
             WHERE id = $1 AND status = ANY($2) \
             RETURNING {COLUMNS}"
        );
        let from: Vec<String> = from.iter().map(|s| s.to_string()).collect();
        sqlx::query_as::<_, NotificationLog>(&query)
            .bind(id)
            .bind(&from)
            .bind(to)
            .bind(&fields.external_message_id)
            .bind(&fields.external_peer_id)
            .bind(&fields.error_message)
            .bind(fields.read_at)
            .fetch_optional(pool)
            .await
    }

    /// Promote rows to `read`, stamping `read_at` once.
    ///
    /// Only rows still in `sent` or `delivered` with no `read_at` are touched.
    /// Returns the number of rows updated.
    pub async fn mark_read(
        pool: &PgPool,
        ids: &[DbId],
        read_at: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            "UPDATE notification_logs SET status = 'read', read_at = $2, updated_at = NOW() \
             WHERE id = ANY($1) AND status IN ('sent', 'delivered') AND read_at IS NULL",
        )
        .bind(ids)
        .bind(read_at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// `sent` rows of one agent and channel that carry external ids and
    /// have not been read yet.
    pub async fn list_unread_sent(
        pool: &PgPool,
        user_id: DbId,
        channel: &str,
    ) -> Result<Vec<NotificationLog>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM notification_logs \
             WHERE user_id = $1 AND channel = $2 AND status = 'sent' \
               AND read_at IS NULL \
               AND external_message_id IS NOT NULL \
               AND external_peer_id IS NOT NULL \
             ORDER BY id"
        );
        sqlx::query_as::<_, NotificationLog>(&query)
            .bind(user_id)
            .bind(channel)
            .fetch_all(pool)
            .await
    }

    /// Look up a row by the provider's message id (for pushed receipts).
    pub async fn find_by_external_id(
        pool: &PgPool,
        channel: &str,
        external_message_id: &str,
    ) -> Result<Option<NotificationLog>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM notification_logs \
             WHERE channel = $1 AND external_message_id = $2 \
             ORDER BY id DESC LIMIT 1"
        );
        sqlx::query_as::<_, NotificationLog>(&query)
            .bind(channel)
            .bind(external_message_id)
            .fetch_optional(pool)
            .await
    }

    /// Outbound queue: `pending` and `sending` rows, oldest first.
    pub async fn list_queue(
        pool: &PgPool,
        user_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<NotificationLog>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM notification_logs \
             WHERE user_id = $1 AND status = ANY($2) \
             ORDER BY sent_at ASC, id ASC \
             LIMIT $3 OFFSET $4"
        );
        let queued: Vec<String> = QUEUED_STATUSES.iter().map(|s| s.to_string()).collect();
        sqlx::query_as::<_, NotificationLog>(&query)
            .bind(user_id)
            .bind(&queued)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Historical log: everything that has left the queue, newest first.
    pub async fn list_history(
        pool: &PgPool,
        user_id: DbId,
        params: &NotificationLogQuery,
    ) -> Result<Vec<NotificationLog>, sqlx::Error> {
        let limit = crate::clamp_limit(params.limit, 50, 500);
        let offset = crate::clamp_offset(params.offset);

        let mut conditions = vec!["user_id = $1".to_string(), "status <> ALL($2)".to_string()];
        let mut bind_idx = 3u32;
        let mut bind_values: Vec<BindValue> = Vec::new();

        if let Some(ref channel) = params.channel {
            conditions.push(format!("channel = ${bind_idx}"));
            bind_idx += 1;
            bind_values.push(BindValue::Text(channel.clone()));
        }
        if let Some(ref status) = params.status {
            conditions.push(format!("status = ${bind_idx}"));
            bind_idx += 1;
            bind_values.push(BindValue::Text(status.clone()));
        }
        if let Some(client_id) = params.client_id {
            conditions.push(format!("client_id = ${bind_idx}"));
            bind_idx += 1;
            bind_values.push(BindValue::BigInt(client_id));
        }
        if let Some(from) = params.from {
            conditions.push(format!("sent_at >= ${bind_idx}"));
            bind_idx += 1;
            bind_values.push(BindValue::Timestamp(from));
        }
        if let Some(to) = params.to {
            conditions.push(format!("sent_at <= ${bind_idx}"));
            bind_idx += 1;
            bind_values.push(BindValue::Timestamp(to));
        }

        let query = format!(
            "SELECT {COLUMNS} FROM notification_logs WHERE {} \
             ORDER BY sent_at DESC, id DESC \
             LIMIT ${bind_idx} OFFSET ${}",
            conditions.join(" AND "),
            bind_idx + 1
        );

        let queued: Vec<String> = QUEUED_STATUSES.iter().map(|s| s.to_string()).collect();
        let mut q = sqlx::query_as::<_, NotificationLog>(&query)
            .bind(user_id)
            .bind(queued);
        for val in &bind_values {
            q = match val {
                BindValue::BigInt(v) => q.bind(*v),
                BindValue::Text(v) => q.bind(v.as_str()),
                BindValue::Timestamp(v) => q.bind(*v),
            };
        }
        q.bind(limit).bind(offset).fetch_all(pool).await
    }

    /// `(status, count)` pairs for rows of `user_id` with `sent_at` in `[from, to)`.
    pub async fn status_counts(
        pool: &PgPool,
        user_id: DbId,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<(String, i64)>, sqlx::Error> {
        sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*)::BIGINT FROM notification_logs \
             WHERE user_id = $1 AND sent_at >= $2 AND sent_at < $3 \
             GROUP BY status ORDER BY status",
        )
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await
    }
}

enum BindValue {
    BigInt(i64),
    Text(String),
    Timestamp(Timestamp),
}
