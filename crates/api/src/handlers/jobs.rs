//! Scheduler entry points for externally-timed invocation.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use courier_db::models::audit::CreateAccessLog;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::middleware::rbac::RequireAdmin;
use crate::query::parse_timestamp;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AutopilotParams {
    /// Evaluate the schedule as of this instant instead of now.
    pub at: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AutopilotJobResult {
    pub dispatched: usize,
    pub failed_agents: usize,
    pub agents: Vec<courier_pipeline::AgentPass>,
}

/// POST /jobs/autopilot
pub async fn run_autopilot(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Query(params): Query<AutopilotParams>,
) -> AppResult<impl IntoResponse> {
    let now = parse_timestamp("at", params.at.as_deref())?.unwrap_or_else(chrono::Utc::now);
    let report = state.pipeline.autopilot.run_pass(now).await?;
    tracing::info!(
        admin_id = admin.user_id,
        dispatched = report.dispatched,
        agents = report.agents.len(),
        "Autopilot pass triggered"
    );
    state
        .pipeline
        .audit
        .log_best_effort(
            CreateAccessLog::new(admin.user_id, "broadcast").with_details(serde_json::json!({
                "job": "autopilot",
                "at": now,
                "dispatched": report.dispatched,
                "failed_agents": report.failed_agents,
            })),
        )
        .await;
    Ok(Json(DataResponse {
        data: AutopilotJobResult {
            dispatched: report.dispatched,
            failed_agents: report.failed_agents,
            agents: report.agents,
        },
    }))
}

/// POST /jobs/read-receipts
pub async fn run_read_receipts(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> AppResult<impl IntoResponse> {
    let report = state.pipeline.reconciler.run().await?;
    tracing::info!(admin_id = admin.user_id, updated = report.updated, "Read-receipt pass triggered");
    state
        .pipeline
        .audit
        .log_best_effort(
            CreateAccessLog::new(admin.user_id, "status_change").with_details(serde_json::json!({
                "job": "read_receipts",
                "updated": report.updated,
            })),
        )
        .await;
    Ok(Json(DataResponse { data: report }))
}
