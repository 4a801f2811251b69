//! Route definitions for the `/messengers` resource.

use axum::routing::{get, put};
use axum::Router;

use crate::handlers::messengers;
use crate::state::AppState;

/// Routes mounted at `/messengers`.
///
/// ```text
/// GET    /                         -> list_settings
/// GET    /status                   -> status
/// PUT    /{channel}                -> upsert_setting
/// GET    /{channel}/validation     -> validate_channel
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(messengers::list_settings))
        .route("/status", get(messengers::status))
        .route("/{channel}", put(messengers::upsert_setting))
        .route("/{channel}/validation", get(messengers::validate_channel))
}
