//! Repository for the `audit_rules`, `audit_blacklist` and `access_logs` tables.

use courier_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::audit::{
    AccessLog, AccessLogQuery, AuditBlacklistEntry, AuditRule, CreateAccessLog, UpsertAuditRule,
};

// ---------------------------------------------------------------------------
// Column lists
// ---------------------------------------------------------------------------

const RULE_COLUMNS: &str = "id, target_role, action_type, is_enabled, created_at, updated_at";

const BLACKLIST_COLUMNS: &str = "id, target_user_id, created_at";

/// Column list for `access_logs` SELECT queries.
const LOG_COLUMNS: &str = "\
    id, user_id, action, category, entity_type, entity_id, client_id, \
    field_accessed, old_value, new_value, details, timestamp";

// ---------------------------------------------------------------------------
// AuditRuleRepo
// ---------------------------------------------------------------------------

/// Provides CRUD operations for the role/action audit matrix.
pub struct AuditRuleRepo;

impl AuditRuleRepo {
    /// List every rule, ordered by role then action.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<AuditRule>, sqlx::Error> {
        let query =
            format!("SELECT {RULE_COLUMNS} FROM audit_rules ORDER BY target_role, action_type");
        sqlx::query_as::<_, AuditRule>(&query).fetch_all(pool).await
    }

    /// Insert or replace the rule for `(target_role, action_type)`.
    pub async fn upsert(pool: &PgPool, dto: &UpsertAuditRule) -> Result<AuditRule, sqlx::Error> {
        let query = format!(
            "INSERT INTO audit_rules (target_role, action_type, is_enabled) \
             VALUES ($1, $2, $3) \
             ON CONFLICT ON CONSTRAINT uq_audit_rules_role_action \
             DO UPDATE SET is_enabled = EXCLUDED.is_enabled, updated_at = NOW() \
             RETURNING {RULE_COLUMNS}"
        );
        sqlx::query_as::<_, AuditRule>(&query)
            .bind(&dto.target_role)
            .bind(&dto.action_type)
            .bind(dto.is_enabled)
            .fetch_one(pool)
            .await
    }

    /// Remove a rule, reverting the pair to the default ("log").
    ///
    /// Returns `true` if a row was deleted.
    pub async fn delete(
        pool: &PgPool,
        target_role: &str,
        action_type: &str,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM audit_rules WHERE target_role = $1 AND action_type = $2")
                .bind(target_role)
                .bind(action_type)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ---------------------------------------------------------------------------
// AuditBlacklistRepo
// ---------------------------------------------------------------------------

/// Users exempt from access logging.
pub struct AuditBlacklistRepo;

impl AuditBlacklistRepo {
    pub async fn list_all(pool: &PgPool) -> Result<Vec<AuditBlacklistEntry>, sqlx::Error> {
        let query = format!("SELECT {BLACKLIST_COLUMNS} FROM audit_blacklist ORDER BY target_user_id");
        sqlx::query_as::<_, AuditBlacklistEntry>(&query)
            .fetch_all(pool)
            .await
    }

    /// Add a user to the blacklist. Adding an existing entry is a no-op that
    /// returns the existing row.
    pub async fn add(pool: &PgPool, target_user_id: DbId) -> Result<AuditBlacklistEntry, sqlx::Error> {
        let query = format!(
            "INSERT INTO audit_blacklist (target_user_id) VALUES ($1) \
             ON CONFLICT ON CONSTRAINT uq_audit_blacklist_user \
             DO UPDATE SET target_user_id = EXCLUDED.target_user_id \
             RETURNING {BLACKLIST_COLUMNS}"
        );
        sqlx::query_as::<_, AuditBlacklistEntry>(&query)
            .bind(target_user_id)
            .fetch_one(pool)
            .await
    }

    /// Returns `true` if the user was on the blacklist.
    pub async fn remove(pool: &PgPool, target_user_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM audit_blacklist WHERE target_user_id = $1")
            .bind(target_user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ---------------------------------------------------------------------------
// AccessLogRepo
// ---------------------------------------------------------------------------

/// Append-only access log. There is deliberately no update or delete.
pub struct AccessLogRepo;

impl AccessLogRepo {
    pub async fn insert(pool: &PgPool, dto: &CreateAccessLog) -> Result<AccessLog, sqlx::Error> {
        let query = format!(
            "INSERT INTO access_logs \
             (user_id, action, category, entity_type, entity_id, client_id, \
              field_accessed, old_value, new_value, details) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {LOG_COLUMNS}"
        );
        sqlx::query_as::<_, AccessLog>(&query)
            .bind(dto.user_id)
            .bind(&dto.action)
            .bind(&dto.category)
            .bind(&dto.entity_type)
            .bind(dto.entity_id)
            .bind(dto.client_id)
            .bind(&dto.field_accessed)
            .bind(&dto.old_value)
            .bind(&dto.new_value)
            .bind(&dto.details)
            .fetch_one(pool)
            .await
    }

    /// Query access logs with filtering and pagination, newest first.
    pub async fn query(
        pool: &PgPool,
        params: &AccessLogQuery,
    ) -> Result<Vec<AccessLog>, sqlx::Error> {
        let limit = crate::clamp_limit(params.limit, 50, 500);
        let offset = crate::clamp_offset(params.offset);

        let (where_clause, bind_values, bind_idx) = build_access_log_filter(params);

        let query = format!(
            "SELECT {LOG_COLUMNS} FROM access_logs {where_clause} \
             ORDER BY timestamp DESC, id DESC \
             LIMIT ${bind_idx} OFFSET ${}",
            bind_idx + 1
        );

        let mut q = sqlx::query_as::<_, AccessLog>(&query);
        for val in &bind_values {
            q = match val {
                BindValue::BigInt(v) => q.bind(*v),
                BindValue::Text(v) => q.bind(v.as_str()),
                BindValue::Timestamp(v) => q.bind(*v),
            };
        }
        q.bind(limit).bind(offset).fetch_all(pool).await
    }

    /// Count access logs matching the filter (for pagination metadata).
    pub async fn count(pool: &PgPool, params: &AccessLogQuery) -> Result<i64, sqlx::Error> {
        let (where_clause, bind_values, _) = build_access_log_filter(params);
        let query = format!("SELECT COUNT(*)::BIGINT FROM access_logs {where_clause}");

        let mut q = sqlx::query_scalar::<_, i64>(&query);
        for val in &bind_values {
            q = match val {
                BindValue::BigInt(v) => q.bind(*v),
                BindValue::Text(v) => q.bind(v.as_str()),
                BindValue::Timestamp(v) => q.bind(*v),
            };
        }
        q.fetch_one(pool).await
    }
}

// ---------------------------------------------------------------------------
// Internal helpers for dynamic query building
// ---------------------------------------------------------------------------

enum BindValue {
    BigInt(i64),
    Text(String),
    Timestamp(Timestamp),
}

/// Returns `(where_clause, bind_values, next_bind_index)`.
fn build_access_log_filter(params: &AccessLogQuery) -> (String, Vec<BindValue>, u32) {
    let mut conditions: Vec<String> = Vec::new();
    let mut bind_idx = 1u32;
    let mut bind_values: Vec<BindValue> = Vec::new();

    if let Some(user_id) = params.user_id {
        conditions.push(format!("user_id = ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::BigInt(user_id));
    }

    if let Some(ref action) = params.action {
        conditions.push(format!("action = ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::Text(action.clone()));
    }

    if let Some(client_id) = params.client_id {
        conditions.push(format!("client_id = ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::BigInt(client_id));
    }

    if let Some(from) = params.from {
        conditions.push(format!("timestamp >= ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::Timestamp(from));
    }

    if let Some(to) = params.to {
        conditions.push(format!("timestamp <= ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::Timestamp(to));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    (where_clause, bind_values, bind_idx)
}
