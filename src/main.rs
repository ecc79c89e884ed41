mod config;
mod models;
mod routes;
mod services;

use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, GatewayConfig};
use crate::services::{catalog::CatalogStore, refresher::Refresher, upstream::XtreamClient};

/// Application state shared across handlers
pub struct AppState {
    pub gateway: GatewayConfig,
    /// Client used on the request path (enrichment); short timeout.
    pub upstream: XtreamClient,
    pub store: Arc<CatalogStore>,
    pub refresher: Arc<Refresher<XtreamClient>>,
    pub start_time: Instant,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "xtream_proxy=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();
    let port = config.port;

    tracing::info!("Starting xtream-proxy v{}", env!("CARGO_PKG_VERSION"));

    let gateway = config::load_gateway_config(&config.config_path)?;
    tracing::info!("Provider endpoint: {}", gateway.xtream.base_url);

    // Full catalog downloads get a long timeout; per-item enrichment
    // lookups a short one.
    let fetch_client = XtreamClient::new(
        &gateway.xtream,
        Duration::from_secs(config.fetch_timeout_secs),
        &config.user_agent,
    )?;
    let enrich_client = XtreamClient::new(
        &gateway.xtream,
        Duration::from_secs(config.enrich_timeout_secs),
        &config.user_agent,
    )?;

    // Snapshot store, restored from the last persisted catalog if present
    let store = Arc::new(CatalogStore::new(&config.cache_file));
    match store.load_from_disk().await {
        Ok(true) => tracing::info!("Restored catalog snapshot from {}", config.cache_file),
        Ok(false) => tracing::info!("No persisted catalog; serving empty until first refresh"),
        Err(e) => tracing::warn!("Ignoring persisted catalog: {:#}", e),
    }

    let refresher = Arc::new(Refresher::new(
        fetch_client,
        Arc::clone(&store),
        gateway.filters.clone(),
    ));

    // Build application state
    let state = Arc::new(AppState {
        gateway,
        upstream: enrich_client,
        store,
        refresher,
        start_time: Instant::now(),
    });

    // Build router
    let app = Router::new()
        // Health endpoints
        .route("/", get(routes::health::root))
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        // Refresh control
        .route("/refresh_cache", get(routes::control::refresh_cache))
        .route("/status", get(routes::control::status))
        // Xtream facade
        .route("/player_api.php", get(routes::player_api::player_api))
        // Playback redirects
        .route(
            "/live/:username/:password/:file",
            get(routes::redirect::live),
        )
        .route(
            "/movie/:username/:password/:file",
            get(routes::redirect::movie),
        )
        .route(
            "/series/:username/:password/:file",
            get(routes::redirect::series),
        )
        // Middleware
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Trace span for incoming requests. Records the sanitized path and never
/// the query string: player_api URLs carry the shared secret as query
/// parameters, and the playback routes carry it as path segments.
fn request_span(request: &axum::http::Request<axum::body::Body>) -> tracing::Span {
    tracing::info_span!(
        "request",
        method = %request.method(),
        path = %sanitized_path(request.uri().path()),
    )
}

/// Mask the credential segments of playback paths
/// (`/live/{user}/{pass}/{file}` and friends).
fn sanitized_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').collect();
    match segments.as_slice() {
        ["", kind, _, _, file] if matches!(*kind, "live" | "movie" | "series") => {
            format!("/{}/<redacted>/{}", kind, file)
        }
        _ => path.to_string(),
    }
}
