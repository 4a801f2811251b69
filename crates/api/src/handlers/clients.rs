use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use courier_core::error::CoreError;
use courier_core::roles::ROLE_ADMIN;
use courier_core::types::DbId;
use courier_db::models::audit::CreateAccessLog;
use courier_db::repositories::ClientRepo;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct RevealedPhone {
    pub client_id: DbId,
    pub phone: Option<String>,
}

/// POST /clients/{id}/reveal-phone
///
/// The phone is only returned once the access is durably logged; a failed
/// log write yields 403.
pub async fn reveal_phone(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(client_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let contact = ClientRepo::find_contact(&state.pool, client_id)
        .await?
        .filter(|c| c.user_id == auth.user_id || auth.role == ROLE_ADMIN)
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Client",
            id: client_id,
        }))?;

    let logged = state
        .pipeline
        .audit
        .log_or_block(
            CreateAccessLog::new(auth.user_id, "reveal_phone")
                .with_client(contact.id)
                .with_entity("client", contact.id)
                .with_field("phone"),
        )
        .await;
    if !logged {
        tracing::warn!(user_id = auth.user_id, client_id, "Phone reveal blocked: access log unavailable");
        return Err(AppError::Core(CoreError::Forbidden(
            "Access could not be recorded; phone reveal blocked".into(),
        )));
    }

    Ok(Json(DataResponse {
        data: RevealedPhone {
            client_id: contact.id,
            phone: contact.phone,
        },
    }))
}
