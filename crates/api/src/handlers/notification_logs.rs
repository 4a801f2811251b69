//! Handlers for the notification ledger: outbound queue, history, window
//! statistics, manual confirmation and provider receipts.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Duration;
use courier_core::channels::Channel;
use courier_core::error::CoreError;
use courier_core::notification_status::NotificationStatus;
use courier_core::types::DbId;
use courier_db::models::audit::CreateAccessLog;
use courier_db::models::notification_log::{NotificationLog, NotificationLogQuery};
use courier_db::{clamp_limit, clamp_offset};
use courier_pipeline::{ReceiptKind, ReceiptOutcome};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireAdmin;
use crate::query::{parse_timestamp, PaginationParams};
use crate::response::DataResponse;
use crate::state::AppState;

/// Default statistics window when `from` is omitted.
const DEFAULT_STATS_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Deserialize)]
pub struct StatsParams {
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RejectRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReceiptRequest {
    pub channel: String,
    pub external_message_id: String,
    pub kind: ReceiptKind,
}

fn validation(msg: String) -> AppError {
    AppError::Core(CoreError::Validation(msg))
}

/// GET /notification-logs/queue
///
/// Rows still `pending` or `sending`, oldest first.
pub async fn queue(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<PaginationParams>,
) -> AppResult<impl IntoResponse> {
    let limit = clamp_limit(params.limit, 50, 200);
    let offset = clamp_offset(params.offset);
    let rows = state.pipeline.ledger.queue(auth.user_id, limit, offset).await?;
    Ok(Json(DataResponse { data: rows }))
}

/// GET /notification-logs/history
pub async fn history(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(mut params): Query<NotificationLogQuery>,
) -> AppResult<impl IntoResponse> {
    if let Some(channel) = params.channel.as_deref() {
        channel.parse::<Channel>().map_err(validation)?;
    }
    if let Some(status) = params.status.as_deref() {
        status.parse::<NotificationStatus>().map_err(validation)?;
    }
    params.limit = Some(clamp_limit(params.limit, 50, 200));
    params.offset = Some(clamp_offset(params.offset));

    let rows = state.pipeline.ledger.history(auth.user_id, &params).await?;
    Ok(Json(DataResponse { data: rows }))
}

/// GET /notification-logs/stats?from&to
///
/// `to` defaults to now, `from` to thirty days before `to`.
pub async fn stats(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<StatsParams>,
) -> AppResult<impl IntoResponse> {
    let to = parse_timestamp("to", params.to.as_deref())?.unwrap_or_else(chrono::Utc::now);
    let from = parse_timestamp("from", params.from.as_deref())?
        .unwrap_or(to - Duration::days(DEFAULT_STATS_WINDOW_DAYS));

    let stats = state.pipeline.ledger.stats(auth.user_id, from, to).await?;
    Ok(Json(DataResponse { data: stats }))
}

/// Access-log entry for an operator acting on a ledger row.
fn ledger_entry(user_id: DbId, action: &str, log: &NotificationLog) -> CreateAccessLog {
    CreateAccessLog::new(user_id, action)
        .with_client(log.client_id)
        .with_entity("notification_log", log.id)
        .with_details(serde_json::json!({
            "channel": log.channel,
            "status": log.status,
        }))
}

/// POST /notification-logs/{id}/confirm
pub async fn confirm(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let log = state.pipeline.ledger.confirm_manual(auth.user_id, id).await?;
    tracing::info!(user_id = auth.user_id, log_id = id, "Queued notification confirmed");
    state
        .pipeline
        .audit
        .log_best_effort(ledger_entry(auth.user_id, "send_message", &log))
        .await;
    Ok(Json(DataResponse { data: log }))
}

/// POST /notification-logs/{id}/reject
pub async fn reject(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
    body: Option<Json<RejectRequest>>,
) -> AppResult<impl IntoResponse> {
    let reason = body.and_then(|Json(b)| b.reason);
    let log = state
        .pipeline
        .ledger
        .reject_manual(auth.user_id, id, reason)
        .await?;
    tracing::info!(user_id = auth.user_id, log_id = id, "Queued notification rejected");
    state
        .pipeline
        .audit
        .log_best_effort(ledger_entry(auth.user_id, "status_change", &log))
        .await;
    Ok(Json(DataResponse { data: log }))
}

/// POST /notification-logs/receipts
///
/// Delivery and read receipts relayed from provider webhooks.
pub async fn receipts(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(input): Json<ReceiptRequest>,
) -> AppResult<impl IntoResponse> {
    let channel = input.channel.parse::<Channel>().map_err(validation)?;
    let outcome = state
        .pipeline
        .ledger
        .record_receipt(channel, &input.external_message_id, input.kind)
        .await?;
    if let ReceiptOutcome::Applied { log } = &outcome {
        state
            .pipeline
            .audit
            .log_best_effort(ledger_entry(admin.user_id, "status_change", log))
            .await;
    }
    Ok(Json(DataResponse { data: outcome }))
}
