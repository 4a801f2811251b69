pub mod audit;
pub mod clients;
pub mod health;
pub mod jobs;
pub mod messengers;
pub mod notification_logs;
pub mod triggers;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /admin/audit/rules                               list, upsert, delete (admin only)
/// /admin/audit/blacklist                           list, add (admin only)
/// /admin/audit/blacklist/{user_id}                 remove (admin only)
/// /admin/audit/access-logs                         query access log (admin only)
///
/// /messengers                                      list channel settings
/// /messengers/status                               has_any_active_channel (GET)
/// /messengers/{channel}                            upsert channel settings (PUT)
/// /messengers/{channel}/validation                 validate one channel (GET)
///
/// /triggers                                        list, create
/// /triggers/{id}                                   update, delete
/// /triggers/{id}/toggle                            activate / deactivate (POST)
///
/// /autopilot/settings                              get, update
///
/// /notification-logs/queue                         outbound queue (GET)
/// /notification-logs/history                       filtered history (GET)
/// /notification-logs/stats                         window statistics (GET)
/// /notification-logs/receipts                      provider receipt (POST, admin only)
/// /notification-logs/{id}/confirm                  confirm manual send (POST)
/// /notification-logs/{id}/reject                   reject queued row (POST)
///
/// /clients/{id}/reveal-phone                       logged phone reveal (POST)
///
/// /jobs/autopilot                                  run autopilot pass (POST, admin only)
/// /jobs/read-receipts                              run reconciler pass (POST, admin only)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Audit rule matrix, blacklist and access log.
        .nest("/admin/audit", audit::router())
        // Per-agent messenger channel settings.
        .nest("/messengers", messengers::router())
        // Notification triggers and autopilot settings.
        .nest("/triggers", triggers::router())
        .nest("/autopilot", triggers::autopilot_router())
        // Dispatch ledger projections and transitions.
        .nest("/notification-logs", notification_logs::router())
        .nest("/clients", clients::router())
        // Scheduler entry points.
        .nest("/jobs", jobs::router())
}
