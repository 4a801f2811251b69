//! Route definitions for the `/admin/audit` resource.

use axum::routing::{delete, get};
use axum::Router;

use crate::handlers::audit;
use crate::state::AppState;

/// Routes mounted at `/admin/audit`.
///
/// All routes require the `admin` role (enforced by handler extractors).
///
/// ```text
/// GET    /rules                    -> list_rules
/// PUT    /rules                    -> upsert_rule
/// DELETE /rules?target_role&action_type -> delete_rule
/// GET    /blacklist                -> list_blacklist
/// POST   /blacklist                -> add_to_blacklist
/// DELETE /blacklist/{user_id}      -> remove_from_blacklist
/// GET    /access-logs              -> query_access_logs
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/rules",
            get(audit::list_rules)
                .put(audit::upsert_rule)
                .delete(audit::delete_rule),
        )
        .route(
            "/blacklist",
            get(audit::list_blacklist).post(audit::add_to_blacklist),
        )
        .route("/blacklist/{user_id}", delete(audit::remove_from_blacklist))
        .route("/access-logs", get(audit::query_access_logs))
}
