use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::sync::Arc;

use crate::models::{ContentKind, RefreshState};
use crate::AppState;

/// Root endpoint - basic status
pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "xtream-proxy",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

/// Per-kind catalog sizes
#[derive(Serialize)]
struct KindStats {
    categories: usize,
    streams: usize,
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    uptime: u64,
    refresh_state: RefreshState,
    #[serde(skip_serializing_if = "Option::is_none")]
    snapshot_generated_at: Option<DateTime<Utc>>,
    live: KindStats,
    vod: KindStats,
    series: KindStats,
}

/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let uptime = state.start_time.elapsed().as_secs();
    let status = state.refresher.status().await;
    let snapshot = state.store.current().await;

    let stats = |kind: ContentKind| {
        let catalog = snapshot.kind(kind);
        KindStats {
            categories: catalog.categories.len(),
            streams: catalog.streams.len(),
        }
    };

    // Degraded until the first catalog is available; an error state with a
    // previously good snapshot still serves data.
    let overall = if snapshot.is_empty() {
        "degraded"
    } else {
        "ok"
    };

    Json(HealthResponse {
        status: overall.to_string(),
        uptime,
        refresh_state: status.state,
        snapshot_generated_at: if snapshot.is_empty() {
            None
        } else {
            Some(snapshot.generated_at)
        },
        live: stats(ContentKind::Live),
        vod: stats(ContentKind::Vod),
        series: stats(ContentKind::Series),
    })
}

/// GET /metrics - Prometheus metrics
pub async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                b"Internal Server Error".to_vec(),
            )
        }
    }
}
