use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::error;

use crate::scans::services;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ScanCreatedEvent {
    pub scan_id: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/hooks/scan-created", post(scan_created))
}

/// Document-created push delivery. Always answers 200: failures are settled
/// on the scan record itself, and a non-2xx here would only make the platform
/// redeliver an event we have already handled.
pub async fn scan_created(
    State(state): State<AppState>,
    Json(event): Json<ScanCreatedEvent>,
) -> StatusCode {
    if let Err(err) = services::process_scan(&state, &event.scan_id).await {
        error!(scan_id = %event.scan_id, error = %err, "could not record scan outcome");
    }
    StatusCode::OK
}
