//! Handlers for an agent's messenger channel settings.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use courier_core::audit::redact_sensitive_fields;
use courier_core::channels::{Channel, ChannelConfig, ChannelValidation};
use courier_core::error::CoreError;
use courier_db::models::audit::CreateAccessLog;
use courier_db::models::messenger_setting::{MessengerSetting, UpsertMessengerSetting};
use courier_db::repositories::MessengerSettingRepo;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// A channel's stored settings with secrets redacted, plus its validation.
#[derive(Debug, Serialize)]
pub struct MessengerView {
    pub channel: Channel,
    pub is_active: bool,
    pub config: serde_json::Value,
    #[serde(flatten)]
    pub validation: ChannelValidation,
}

#[derive(Debug, Serialize)]
pub struct MessengerStatus {
    pub has_any_active_channel: bool,
}

fn parse_channel(raw: &str) -> AppResult<Channel> {
    raw.parse::<Channel>()
        .map_err(|e| AppError::Core(CoreError::Validation(e)))
}

fn view(channel: Channel, row: Option<&MessengerSetting>, validation: ChannelValidation) -> MessengerView {
    MessengerView {
        channel,
        is_active: row.is_some_and(|r| r.is_active),
        config: row
            .map(|r| redact_sensitive_fields(&r.config))
            .unwrap_or(serde_json::Value::Null),
        validation,
    }
}

/// GET /messengers
///
/// Every known channel, configured or not.
pub async fn list_settings(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<impl IntoResponse> {
    let rows = MessengerSettingRepo::list_for_user(&state.pool, auth.user_id).await?;
    let reports = state.pipeline.validator.validate_all(auth.user_id).await?;

    let views: Vec<MessengerView> = reports
        .into_iter()
        .map(|report| {
            let row = rows.iter().find(|r| r.channel == report.channel.as_str());
            view(report.channel, row, report.validation)
        })
        .collect();

    Ok(Json(DataResponse { data: views }))
}

/// PUT /messengers/{channel}
///
/// Rejects a config that does not decode for the channel. A config that
/// decodes but lacks credentials is stored and reported as not configured.
pub async fn upsert_setting(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(channel): Path<String>,
    Json(input): Json<UpsertMessengerSetting>,
) -> AppResult<impl IntoResponse> {
    let channel = parse_channel(&channel)?;
    ChannelConfig::decode(channel, &input.config).map_err(|e| {
        AppError::Core(CoreError::Validation(format!(
            "Invalid {} configuration: {e}",
            channel.display_name()
        )))
    })?;

    let row =
        MessengerSettingRepo::upsert(&state.pool, auth.user_id, channel.as_str(), &input).await?;
    let validation = state.pipeline.validator.validate(auth.user_id, channel).await?;

    tracing::info!(
        user_id = auth.user_id,
        channel = %channel,
        is_active = row.is_active,
        is_configured = validation.is_configured,
        "Messenger settings updated"
    );
    state
        .pipeline
        .audit
        .log_best_effort(
            CreateAccessLog::new(auth.user_id, "settings_update")
                .with_entity("messenger_settings", row.id)
                .with_details(serde_json::json!({
                    "channel": channel,
                    "is_active": row.is_active,
                    "config": input.config,
                })),
        )
        .await;

    Ok(Json(DataResponse {
        data: view(channel, Some(&row), validation),
    }))
}

/// GET /messengers/{channel}/validation
pub async fn validate_channel(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(channel): Path<String>,
) -> AppResult<impl IntoResponse> {
    let channel = parse_channel(&channel)?;
    let validation = state.pipeline.validator.validate(auth.user_id, channel).await?;
    Ok(Json(DataResponse { data: validation }))
}

/// GET /messengers/status
pub async fn status(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<impl IntoResponse> {
    let has_any_active_channel = state
        .pipeline
        .validator
        .has_any_active_channel(auth.user_id)
        .await?;
    Ok(Json(DataResponse {
        data: MessengerStatus {
            has_any_active_channel,
        },
    }))
}
