use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::error;

use crate::state::AppState;
use crate::users::services;

#[derive(Debug, Deserialize)]
pub struct UserDeletedEvent {
    pub uid: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/hooks/user-deleted", post(user_deleted))
}

/// Account-deletion push delivery. A failure answers 500 so the identity
/// platform redelivers the event; the cleanup itself is idempotent.
pub async fn user_deleted(
    State(state): State<AppState>,
    Json(event): Json<UserDeletedEvent>,
) -> Result<StatusCode, (StatusCode, String)> {
    services::cleanup_user(&state, &event.uid)
        .await
        .map_err(|e| {
            error!(uid = %event.uid, error = %e, "user cleanup failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;
    Ok(StatusCode::OK)
}
