//! Handlers for the audit rule matrix, the blacklist and the access log.
//!
//! All endpoints require the admin role. Every rule or blacklist edit
//! publishes `audit.settings_changed` so the audit gate drops its cache.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use courier_core::audit::AuditAction;
use courier_core::error::CoreError;
use courier_core::roles::{is_valid_role, ALL_ROLES};
use courier_core::types::DbId;
use courier_db::models::audit::{AccessLogQuery, CreateAccessLog, UpsertAuditRule};
use courier_db::repositories::{AccessLogRepo, AuditBlacklistRepo, AuditRuleRepo};
use courier_events::{event_types, PipelineEvent};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::middleware::rbac::RequireAdmin;
use crate::query::parse_timestamp;
use crate::response::{DataResponse, Page};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / query parameter types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RuleKey {
    pub target_role: String,
    pub action_type: String,
}

#[derive(Debug, Deserialize)]
pub struct AddBlacklistEntry {
    pub user_id: DbId,
}

#[derive(Debug, Deserialize)]
pub struct AccessLogQueryParams {
    pub user_id: Option<DbId>,
    pub action: Option<String>,
    pub client_id: Option<DbId>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn validate_rule_key(target_role: &str, action_type: &str) -> AppResult<()> {
    if !is_valid_role(target_role) {
        return Err(AppError::Core(CoreError::Validation(format!(
            "Unknown role '{target_role}'. Must be one of: {}",
            ALL_ROLES.join(", ")
        ))));
    }
    action_type
        .parse::<AuditAction>()
        .map_err(|e| AppError::Core(CoreError::Validation(e)))?;
    Ok(())
}

/// Announce the change and record who made it.
async fn settings_changed(state: &AppState, admin_id: DbId, details: serde_json::Value) {
    state.event_bus.publish(
        PipelineEvent::new(event_types::AUDIT_SETTINGS_CHANGED)
            .with_actor(admin_id)
            .with_payload(details.clone()),
    );
    state
        .pipeline
        .audit
        .log_best_effort(
            CreateAccessLog::new(admin_id, "settings_update")
                .with_entity("audit_settings", admin_id)
                .with_details(details),
        )
        .await;
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// GET /admin/audit/rules
pub async fn list_rules(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> AppResult<impl IntoResponse> {
    let rules = AuditRuleRepo::list_all(&state.pool).await?;
    Ok(Json(DataResponse { data: rules }))
}

/// PUT /admin/audit/rules
pub async fn upsert_rule(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(input): Json<UpsertAuditRule>,
) -> AppResult<impl IntoResponse> {
    validate_rule_key(&input.target_role, &input.action_type)?;

    let rule = AuditRuleRepo::upsert(&state.pool, &input).await?;
    tracing::info!(
        admin_id = admin.user_id,
        target_role = %rule.target_role,
        action_type = %rule.action_type,
        is_enabled = rule.is_enabled,
        "Audit rule updated"
    );
    settings_changed(
        &state,
        admin.user_id,
        serde_json::json!({
            "target_role": rule.target_role,
            "action_type": rule.action_type,
            "is_enabled": rule.is_enabled,
        }),
    )
    .await;

    Ok(Json(DataResponse { data: rule }))
}

/// DELETE /admin/audit/rules?target_role=&action_type=
///
/// Removing a rule restores the default (logged).
pub async fn delete_rule(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Query(key): Query<RuleKey>,
) -> AppResult<StatusCode> {
    if !AuditRuleRepo::delete(&state.pool, &key.target_role, &key.action_type).await? {
        return Err(AppError::Database(sqlx::Error::RowNotFound));
    }
    settings_changed(
        &state,
        admin.user_id,
        serde_json::json!({
            "target_role": key.target_role,
            "action_type": key.action_type,
            "deleted": true,
        }),
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Blacklist
// ---------------------------------------------------------------------------

/// GET /admin/audit/blacklist
pub async fn list_blacklist(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> AppResult<impl IntoResponse> {
    let entries = AuditBlacklistRepo::list_all(&state.pool).await?;
    Ok(Json(DataResponse { data: entries }))
}

/// POST /admin/audit/blacklist
///
/// Idempotent: adding a user twice returns the existing entry.
pub async fn add_to_blacklist(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(input): Json<AddBlacklistEntry>,
) -> AppResult<impl IntoResponse> {
    let entry = AuditBlacklistRepo::add(&state.pool, input.user_id).await?;
    settings_changed(
        &state,
        admin.user_id,
        serde_json::json!({ "blacklisted_user_id": input.user_id }),
    )
    .await;
    Ok((StatusCode::CREATED, Json(DataResponse { data: entry })))
}

/// DELETE /admin/audit/blacklist/{user_id}
pub async fn remove_from_blacklist(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(user_id): Path<DbId>,
) -> AppResult<StatusCode> {
    if !AuditBlacklistRepo::remove(&state.pool, user_id).await? {
        return Err(AppError::Database(sqlx::Error::RowNotFound));
    }
    settings_changed(
        &state,
        admin.user_id,
        serde_json::json!({ "unblacklisted_user_id": user_id }),
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Access logs
// ---------------------------------------------------------------------------

/// GET /admin/audit/access-logs
pub async fn query_access_logs(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(params): Query<AccessLogQueryParams>,
) -> AppResult<impl IntoResponse> {
    let query = AccessLogQuery {
        user_id: params.user_id,
        action: params.action,
        client_id: params.client_id,
        from: parse_timestamp("from", params.from.as_deref())?,
        to: parse_timestamp("to", params.to.as_deref())?,
        limit: params.limit,
        offset: params.offset,
    };

    let items = AccessLogRepo::query(&state.pool, &query).await?;
    let total = AccessLogRepo::count(&state.pool, &query).await?;

    Ok(Json(DataResponse {
        data: Page { items, total },
    }))
}
