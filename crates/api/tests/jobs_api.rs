//! HTTP-level tests for the scheduler entry points.

mod common;

use axum::http::StatusCode;
use chrono::NaiveDate;
use common::{body_json, get_auth, post_auth, put_json_auth};
use courier_db::models::agent_settings::UpdateAgentSettings;
use courier_db::repositories::{AgentSettingsRepo, ClientRepo, NotificationTemplateRepo};
use serde_json::json;
use sqlx::PgPool;

/// Monday 2026-03-02, after the default 09:00 window.
const MONDAY_MORNING: &str = "2026-03-02T10:00:00Z";

/// An agent with WhatsApp Web enabled and one trigger firing three days
/// before a policy ends on Thursday 2026-03-05.
async fn seed_agent(pool: &PgPool, app: axum::Router) -> (i64, String) {
    let (agent_id, token) = common::create_user(pool, "agent@example.com", "agent").await;
    AgentSettingsRepo::upsert(
        pool,
        agent_id,
        &UpdateAgentSettings {
            auto_process_time: None,
            auto_process_days: None,
            is_test_mode: None,
        },
    )
    .await
    .unwrap();

    let client_id = ClientRepo::create(pool, agent_id, "Anna Petrova", Some("+79990001122"), None, None)
        .await
        .unwrap();
    ClientRepo::add_policy(pool, client_id, "OSAGO-77", NaiveDate::from_ymd_opt(2026, 3, 5).unwrap())
        .await
        .unwrap();
    let template = NotificationTemplateRepo::create(
        pool,
        agent_id,
        "Renewal",
        "{{client_name}}, policy {{policy_number}} ends {{end_date}}",
    )
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO notification_triggers (user_id, event_type, template_id, days_before) \
         VALUES ($1, 'policy_expiry', $2, 3)",
    )
    .bind(agent_id)
    .bind(template.id)
    .execute(pool)
    .await
    .unwrap();

    let body = json!({ "is_active": true, "config": {} });
    let response = put_json_auth(app, "/api/v1/messengers/whatsapp_web", body, &token).await;
    assert_eq!(response.status(), StatusCode::OK);

    (agent_id, token)
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn autopilot_job_dispatches_once_per_day(pool: PgPool) {
    let (_, admin_token) = common::create_user(&pool, "admin@example.com", "admin").await;
    let app = common::build_test_app(pool.clone());
    let (agent_id, agent_token) = seed_agent(&pool, app.clone()).await;

    let uri = format!("/api/v1/jobs/autopilot?at={MONDAY_MORNING}");
    let response = post_auth(app.clone(), &uri, &admin_token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["dispatched"], 1);
    let pass = json["data"]["agents"]
        .as_array()
        .unwrap()
        .iter()
        .find(|a| a["user_id"] == agent_id)
        .cloned()
        .unwrap();
    assert_eq!(pass["outcome"]["result"], "dispatched");
    assert_eq!(pass["outcome"]["awaiting_confirmation"], 1);

    // Manual channel: the row waits in the queue with the rendered text.
    let response = get_auth(app.clone(), "/api/v1/notification-logs/queue", &agent_token).await;
    let queue = body_json(response).await;
    assert_eq!(queue["data"][0]["channel"], "whatsapp_web");
    assert_eq!(
        queue["data"][0]["message"],
        "Anna Petrova, policy OSAGO-77 ends 05.03.2026"
    );

    let response = post_auth(app, &uri, &admin_token).await;
    let json = body_json(response).await;
    assert_eq!(json["data"]["dispatched"], 0);
    assert_eq!(json["data"]["failed_agents"], 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn backdated_autopilot_job_does_not_reopen_today(pool: PgPool) {
    let (_, admin_token) = common::create_user(&pool, "admin@example.com", "admin").await;
    let app = common::build_test_app(pool.clone());
    seed_agent(&pool, app.clone()).await;

    let today = format!("/api/v1/jobs/autopilot?at={MONDAY_MORNING}");
    let response = post_auth(app.clone(), &today, &admin_token).await;
    assert_eq!(body_json(response).await["data"]["dispatched"], 1);

    let response = post_auth(app.clone(), "/api/v1/jobs/autopilot?at=2026-02-27T10:00:00Z", &admin_token).await;
    assert_eq!(body_json(response).await["data"]["dispatched"], 0);

    let response = post_auth(app, &today, &admin_token).await;
    assert_eq!(body_json(response).await["data"]["dispatched"], 0);

    let (rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM notification_logs")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn job_runs_are_audited_for_the_admin(pool: PgPool) {
    let (admin_id, admin_token) = common::create_user(&pool, "admin@example.com", "admin").await;
    let app = common::build_test_app(pool.clone());

    let uri = format!("/api/v1/jobs/autopilot?at={MONDAY_MORNING}");
    assert_eq!(post_auth(app.clone(), &uri, &admin_token).await.status(), StatusCode::OK);
    assert_eq!(
        post_auth(app, "/api/v1/jobs/read-receipts", &admin_token).await.status(),
        StatusCode::OK
    );

    let actions: Vec<String> = common::access_log_entries(&pool, admin_id)
        .await
        .into_iter()
        .map(|(action, _, _)| action)
        .collect();
    assert_eq!(actions, ["broadcast", "status_change"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn autopilot_job_requires_admin(pool: PgPool) {
    let (_, agent_token) = common::create_user(&pool, "agent@example.com", "agent").await;
    let app = common::build_test_app(pool);

    let response = post_auth(app, "/api/v1/jobs/autopilot", &agent_token).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn autopilot_job_rejects_bad_instant(pool: PgPool) {
    let (_, admin_token) = common::create_user(&pool, "admin@example.com", "admin").await;
    let app = common::build_test_app(pool);

    let response = post_auth(app, "/api/v1/jobs/autopilot?at=yesterday", &admin_token).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn read_receipt_job_without_bridge_updates_nothing(pool: PgPool) {
    let (_, admin_token) = common::create_user(&pool, "admin@example.com", "admin").await;
    let app = common::build_test_app(pool);

    let response = post_auth(app, "/api/v1/jobs/read-receipts", &admin_token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["updated"], 0);
    assert_eq!(json["data"]["configurations"], 0);
}
