//! Handlers for notification triggers and autopilot settings.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use courier_core::types::DbId;
use courier_db::models::agent_settings::UpdateAgentSettings;
use courier_db::models::audit::CreateAccessLog;
use courier_db::models::notification_trigger::{NotificationTrigger, UpsertTrigger};
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub is_active: bool,
}

/// Access-log entry for a change to `trigger`.
fn trigger_entry(user_id: DbId, action: &str, trigger: &NotificationTrigger) -> CreateAccessLog {
    CreateAccessLog::new(user_id, action)
        .with_entity("notification_trigger", trigger.id)
        .with_details(serde_json::json!({
            "event_type": trigger.event_type,
            "days_before": trigger.days_before,
            "is_active": trigger.is_active,
        }))
}

/// GET /triggers
pub async fn list_triggers(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<impl IntoResponse> {
    let triggers = state.pipeline.triggers.list_triggers(auth.user_id).await?;
    Ok(Json(DataResponse { data: triggers }))
}

/// POST /triggers
pub async fn create_trigger(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(mut input): Json<UpsertTrigger>,
) -> AppResult<impl IntoResponse> {
    input.id = None;
    let trigger = state
        .pipeline
        .triggers
        .upsert_trigger(auth.user_id, &input)
        .await?;
    state
        .pipeline
        .audit
        .log_best_effort(trigger_entry(auth.user_id, "create", &trigger))
        .await;
    Ok((StatusCode::CREATED, Json(DataResponse { data: trigger })))
}

/// PUT /triggers/{id}
pub async fn update_trigger(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
    Json(mut input): Json<UpsertTrigger>,
) -> AppResult<impl IntoResponse> {
    input.id = Some(id);
    let trigger = state
        .pipeline
        .triggers
        .upsert_trigger(auth.user_id, &input)
        .await?;
    state
        .pipeline
        .audit
        .log_best_effort(trigger_entry(auth.user_id, "update", &trigger))
        .await;
    Ok(Json(DataResponse { data: trigger }))
}

/// DELETE /triggers/{id}
pub async fn delete_trigger(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    state.pipeline.triggers.delete(auth.user_id, id).await?;
    state
        .pipeline
        .audit
        .log_best_effort(
            CreateAccessLog::new(auth.user_id, "delete").with_entity("notification_trigger", id),
        )
        .await;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /triggers/{id}/toggle
pub async fn toggle_trigger(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
    Json(input): Json<ToggleRequest>,
) -> AppResult<impl IntoResponse> {
    let trigger = state
        .pipeline
        .triggers
        .toggle(auth.user_id, id, input.is_active)
        .await?;
    state
        .pipeline
        .audit
        .log_best_effort(trigger_entry(auth.user_id, "status_change", &trigger))
        .await;
    Ok(Json(DataResponse { data: trigger }))
}

/// GET /autopilot/settings
///
/// Creates the default settings row on first access.
pub async fn get_autopilot_settings(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<impl IntoResponse> {
    let settings = state
        .pipeline
        .triggers
        .autopilot_settings(auth.user_id)
        .await?;
    Ok(Json(DataResponse { data: settings }))
}

/// PUT /autopilot/settings
pub async fn update_autopilot_settings(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<UpdateAgentSettings>,
) -> AppResult<impl IntoResponse> {
    let settings = state
        .pipeline
        .triggers
        .update_autopilot_settings(auth.user_id, &input)
        .await?;
    state
        .pipeline
        .audit
        .log_best_effort(
            CreateAccessLog::new(auth.user_id, "settings_update")
                .with_entity("agent_settings", settings.id)
                .with_details(serde_json::json!({
                    "auto_process_time": settings.auto_process_time,
                    "auto_process_days": settings.auto_process_days,
                    "is_test_mode": settings.is_test_mode,
                })),
        )
        .await;
    Ok(Json(DataResponse { data: settings }))
}
