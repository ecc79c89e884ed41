//! Refresh trigger and status endpoints.

use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

use crate::AppState;

/// GET /refresh_cache
///
/// Starts a refresh in the background and returns immediately. A refresh
/// already in progress is reported as busy, not an error.
pub async fn refresh_cache(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.refresher.trigger().await {
        Json(json!({
            "status": "Started",
            "message": "Refresh started in background. Check /status for progress."
        }))
    } else {
        Json(json!({
            "status": "Busy",
            "message": "Refresh already in progress"
        }))
    }
}

/// GET /status
pub async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.refresher.status().await)
}
