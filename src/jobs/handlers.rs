use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use chrono::Utc;
use tracing::error;

use crate::jobs::{daily_reset, scan_cleanup};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/jobs/daily-reset", post(run_daily_reset))
        .route("/jobs/scan-cleanup", post(run_scan_cleanup))
}

/// Scheduled daily at 00:00 in the configured timezone. A 500 lets the
/// scheduler retry; the sentinel keeps retries from double-applying.
pub async fn run_daily_reset(
    State(state): State<AppState>,
) -> Result<StatusCode, (StatusCode, String)> {
    let today = Utc::now().with_timezone(&state.config.timezone).date_naive();
    daily_reset::run(&state, today).await.map_err(|e| {
        error!(error = %e, "daily reset failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    Ok(StatusCode::OK)
}

/// Scheduled weekly, Saturday 03:15 in the configured timezone. Safe to
/// retry: orphan status is recomputed from scratch every run.
pub async fn run_scan_cleanup(
    State(state): State<AppState>,
) -> Result<StatusCode, (StatusCode, String)> {
    scan_cleanup::run(&state).await.map_err(|e| {
        error!(error = %e, "weekly scan cleanup failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    Ok(StatusCode::OK)
}
