//! HTTP-level tests for messenger channel settings and validation.

mod common;

use axum::http::StatusCode;
use common::{body_json, get_auth, put_json_auth};
use serde_json::json;
use sqlx::PgPool;

#[sqlx::test(migrations = "../../db/migrations")]
async fn fresh_agent_has_no_configured_channel(pool: PgPool) {
    let (_, token) = common::create_user(&pool, "agent@example.com", "agent").await;
    let app = common::build_test_app(pool);

    let response = get_auth(app.clone(), "/api/v1/messengers", &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let channels = json["data"].as_array().unwrap();
    assert_eq!(channels.len(), 6);
    assert!(channels.iter().all(|c| c["is_configured"] == false));

    let response = get_auth(app, "/api/v1/messengers/status", &token).await;
    assert_eq!(body_json(response).await["data"]["has_any_active_channel"], false);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn telegram_bot_without_token_is_not_configured(pool: PgPool) {
    let (_, token) = common::create_user(&pool, "agent@example.com", "agent").await;
    let app = common::build_test_app(pool);

    let body = json!({ "is_active": true, "config": { "connection_type": "bot" } });
    let response = put_json_auth(app.clone(), "/api/v1/messengers/telegram", body, &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["is_configured"], false);
    assert!(json["data"]["error_reason"].as_str().unwrap().contains("Telegram"));

    let response = get_auth(app, "/api/v1/messengers/status", &token).await;
    assert_eq!(body_json(response).await["data"]["has_any_active_channel"], false);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn configured_bot_token_is_redacted_in_listing(pool: PgPool) {
    let (_, token) = common::create_user(&pool, "agent@example.com", "agent").await;
    let app = common::build_test_app(pool);

    let body = json!({
        "is_active": true,
        "config": { "connection_type": "bot", "bot_token": "123456:secret" }
    });
    let response = put_json_auth(app.clone(), "/api/v1/messengers/telegram", body, &token).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = get_auth(app.clone(), "/api/v1/messengers", &token).await;
    let json = body_json(response).await;
    let telegram = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["channel"] == "telegram")
        .cloned()
        .unwrap();
    assert_eq!(telegram["is_configured"], true);
    assert_eq!(telegram["config"]["bot_token"], "[REDACTED]");

    let response = get_auth(app, "/api/v1/messengers/status", &token).await;
    assert_eq!(body_json(response).await["data"]["has_any_active_channel"], true);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn whatsapp_web_mode_requires_manual_confirmation(pool: PgPool) {
    let (_, token) = common::create_user(&pool, "agent@example.com", "agent").await;
    let app = common::build_test_app(pool);

    let body = json!({ "is_active": true, "config": { "mode": "web" } });
    put_json_auth(app.clone(), "/api/v1/messengers/whatsapp", body, &token).await;

    let response = get_auth(app, "/api/v1/messengers/whatsapp/validation", &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["is_configured"], true);
    assert_eq!(json["data"]["requires_manual_confirmation"], true);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn inactive_channel_is_not_configured(pool: PgPool) {
    let (_, token) = common::create_user(&pool, "agent@example.com", "agent").await;
    let app = common::build_test_app(pool);

    let body = json!({ "is_active": false, "config": { "api_key": "k" } });
    put_json_auth(app.clone(), "/api/v1/messengers/max", body, &token).await;

    let response = get_auth(app, "/api/v1/messengers/max/validation", &token).await;
    let json = body_json(response).await;
    assert_eq!(json["data"]["is_configured"], false);
    assert_eq!(json["data"]["error_reason"], "Max: channel disabled");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn settings_change_is_audited_without_secrets(pool: PgPool) {
    let (user_id, token) = common::create_user(&pool, "agent@example.com", "agent").await;
    let app = common::build_test_app(pool.clone());

    let body = json!({ "is_active": true, "config": { "connection_type": "bot", "bot_token": "123:abc" } });
    let response = put_json_auth(app, "/api/v1/messengers/telegram", body, &token).await;
    assert_eq!(response.status(), StatusCode::OK);

    let entries = common::access_log_entries(&pool, user_id).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0, "settings_update");
    assert_eq!(entries[0].1.as_deref(), Some("messenger_settings"));

    let (details,): (serde_json::Value,) =
        sqlx::query_as("SELECT details FROM access_logs WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(details["channel"], "telegram");
    assert_eq!(details["config"]["bot_token"], "[REDACTED]");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unknown_channel_is_rejected(pool: PgPool) {
    let (_, token) = common::create_user(&pool, "agent@example.com", "agent").await;
    let app = common::build_test_app(pool);

    let response = get_auth(app, "/api/v1/messengers/pigeon/validation", &token).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn malformed_config_is_rejected(pool: PgPool) {
    let (_, token) = common::create_user(&pool, "agent@example.com", "agent").await;
    let app = common::build_test_app(pool);

    let body = json!({ "is_active": true, "config": { "connection_type": "carrier" } });
    let response = put_json_auth(app, "/api/v1/messengers/telegram", body, &token).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}
