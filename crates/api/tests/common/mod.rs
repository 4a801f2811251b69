#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use courier_api::auth::jwt::{generate_access_token, JwtConfig};
use courier_api::background;
use courier_api::config::ServerConfig;
use courier_api::router::build_app_router;
use courier_api::state::AppState;
use courier_db::repositories::UserRepo;
use courier_events::EventBus;
use courier_pipeline::{Pipeline, PipelineConfig};

/// Build a test `ServerConfig` with safe defaults.
///
/// The audit cache TTL is zero so every request sees the current rules.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        jwt: JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            access_token_expiry_mins: 15,
        },
        pipeline: PipelineConfig {
            audit_cache_ttl: Duration::ZERO,
            provider_timeout: Duration::from_secs(2),
            ..PipelineConfig::default()
        },
    }
}

/// Build the full application router, with the same middleware stack and
/// audit cache subscriber that production uses.
pub fn build_test_app(pool: PgPool) -> Router {
    let config = test_config();
    let pipeline = Pipeline::new(pool.clone(), &config.pipeline).expect("pipeline wiring");
    let event_bus = Arc::new(EventBus::new(64));
    tokio::spawn(background::audit_cache::run(
        Arc::clone(&pipeline.audit),
        event_bus.subscribe(),
    ));

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        pipeline,
        event_bus,
    };
    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Seeding
// ---------------------------------------------------------------------------

/// Insert a user with `role` and return `(user_id, bearer token)`.
pub async fn create_user(pool: &PgPool, email: &str, role: &str) -> (i64, String) {
    let user_id = UserRepo::create(pool, email, email, role)
        .await
        .expect("user creation should succeed");
    let token = generate_access_token(user_id, role, &test_config().jwt)
        .expect("token generation should succeed");
    (user_id, token)
}

/// `(action, entity_type, entity_id)` of every access log row written for
/// `user_id`, oldest first.
pub async fn access_log_entries(
    pool: &PgPool,
    user_id: i64,
) -> Vec<(String, Option<String>, Option<i64>)> {
    sqlx::query_as(
        "SELECT action, entity_type, entity_id FROM access_logs WHERE user_id = $1 ORDER BY id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .expect("access log query should succeed")
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

async fn send(
    app: Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None, None).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn post_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::POST, uri, Some(token), None).await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

pub async fn put_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    send(app, Method::PUT, uri, Some(token), Some(body)).await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, Some(token), None).await
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
