//! Route definitions for notification triggers and autopilot settings.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::triggers;
use crate::state::AppState;

/// Routes mounted at `/triggers`.
///
/// ```text
/// GET    /                         -> list_triggers
/// POST   /                         -> create_trigger
/// PUT    /{id}                     -> update_trigger
/// DELETE /{id}                     -> delete_trigger
/// POST   /{id}/toggle              -> toggle_trigger
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(triggers::list_triggers).post(triggers::create_trigger),
        )
        .route(
            "/{id}",
            put(triggers::update_trigger).delete(triggers::delete_trigger),
        )
        .route("/{id}/toggle", post(triggers::toggle_trigger))
}

/// Routes mounted at `/autopilot`.
///
/// ```text
/// GET    /settings                 -> get_autopilot_settings
/// PUT    /settings                 -> update_autopilot_settings
/// ```
pub fn autopilot_router() -> Router<AppState> {
    Router::new().route(
        "/settings",
        get(triggers::get_autopilot_settings).put(triggers::update_autopilot_settings),
    )
}
