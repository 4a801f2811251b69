//! Route definitions for the `/jobs` scheduler entry points.

use axum::routing::post;
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted at `/jobs`. Admin only.
///
/// ```text
/// POST   /autopilot?at=            -> run_autopilot
/// POST   /read-receipts            -> run_read_receipts
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/autopilot", post(jobs::run_autopilot))
        .route("/read-receipts", post(jobs::run_read_receipts))
}
