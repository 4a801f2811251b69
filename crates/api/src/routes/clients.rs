use axum::routing::post;
use axum::Router;

use crate::handlers::clients;
use crate::state::AppState;

/// Routes mounted at `/clients`.
///
/// ```text
/// POST   /{id}/reveal-phone        -> reveal_phone
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/{id}/reveal-phone", post(clients::reveal_phone))
}
