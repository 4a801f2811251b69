//! Route definitions for the `/notification-logs` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::notification_logs;
use crate::state::AppState;

/// Routes mounted at `/notification-logs`.
///
/// ```text
/// GET    /queue                    -> queue
/// GET    /history                  -> history
/// GET    /stats                    -> stats
/// POST   /receipts                 -> receipts (admin)
/// POST   /{id}/confirm             -> confirm
/// POST   /{id}/reject              -> reject
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/queue", get(notification_logs::queue))
        .route("/history", get(notification_logs::history))
        .route("/stats", get(notification_logs::stats))
        .route("/receipts", post(notification_logs::receipts))
        .route("/{id}/confirm", post(notification_logs::confirm))
        .route("/{id}/reject", post(notification_logs::reject))
}
