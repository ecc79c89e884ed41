//! The Xtream-facing API facade.
//!
//! Speaks the same player_api.php dialect as the upstream provider, but
//! serves listings from the filtered in-memory snapshot. Only the two
//! enrichment actions reach out to the upstream on the request path.

use axum::{
    extract::{Host, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::warn;

use crate::models::{ContentKind, FlexId};
use crate::AppState;

#[derive(Deserialize, Default)]
pub struct PlayerApiQuery {
    pub username: Option<String>,
    pub password: Option<String>,
    pub action: Option<String>,
    pub vod_id: Option<String>,
    pub series_id: Option<String>,
}

/// GET /player_api.php
pub async fn player_api(
    State(state): State<Arc<AppState>>,
    Host(host): Host,
    Query(query): Query<PlayerApiQuery>,
) -> Response {
    if !credentials_match(
        &state,
        query.username.as_deref(),
        query.password.as_deref(),
    ) {
        return auth_rejected();
    }

    let Some(action) = query.action.as_deref() else {
        return login_response(&state, &host);
    };

    let snapshot = state.store.current().await;
    match action {
        "get_live_streams" => json_body(&snapshot.live.streams),
        "get_live_categories" => json_body(&snapshot.live.categories),
        "get_vod_streams" => json_body(&snapshot.vod.streams),
        "get_vod_categories" => json_body(&snapshot.vod.categories),
        "get_series" => json_body(&snapshot.series.streams),
        "get_series_categories" => json_body(&snapshot.series.categories),
        "get_vod_info" => match query.vod_id.as_deref() {
            Some(id) => enrich(&state, ContentKind::Vod, id).await,
            None => empty_list(),
        },
        "get_series_info" => match query.series_id.as_deref() {
            Some(id) => enrich(&state, ContentKind::Series, id).await,
            None => empty_list(),
        },
        _ => empty_list(),
    }
}

/// Shared-secret check against the configured provider credentials.
/// Credentials are never logged.
pub fn credentials_match(
    state: &AppState,
    username: Option<&str>,
    password: Option<&str>,
) -> bool {
    let endpoint = &state.gateway.xtream;
    username == Some(endpoint.username.as_str()) && password == Some(endpoint.password.as_str())
}

/// Xtream-shaped rejection: clients understand `auth: 0`, not HTML errors.
pub fn auth_rejected() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"user_info": {"auth": 0}})),
    )
        .into_response()
}

/// Fixed-shape login payload. Does not touch the cache; the values mirror
/// what real Xtream panels hand out so players accept the account.
fn login_response(state: &AppState, host: &str) -> Response {
    let endpoint = &state.gateway.xtream;
    let (hostname, port) = match host.rsplit_once(':') {
        Some((h, p)) => (h, p),
        None => (host, "8000"),
    };
    let now = Utc::now();

    Json(json!({
        "user_info": {
            "username": endpoint.username,
            "password": endpoint.password,
            "message": "Logged In",
            "auth": 1,
            "status": "Active",
            "exp_date": "1999999999",
            "created_at": "1600000000",
            "max_connections": "10",
            "allowed_output_formats": ["m3u8", "ts", "rtmp"]
        },
        "server_info": {
            "url": format!("http://{}", hostname),
            "port": port,
            "https_port": port,
            "server_protocol": "http",
            "rtmp_port": "8000",
            "timezone": "Europe/London",
            "timestamp_now": now.timestamp(),
            "time_now": now.format("%Y-%m-%d %H:%M:%S").to_string(),
            "process": 1
        }
    }))
    .into_response()
}

/// Proxy get_vod_info / get_series_info to the upstream, overlaying fields
/// the matching cached entry has and the upstream record lacks. Upstream
/// wins every conflict. An upstream failure degrades to the cached entry
/// when one exists; it is never fatal.
async fn enrich(state: &AppState, kind: ContentKind, id: &str) -> Response {
    // Normalize the same way cached ids are: "007", "7" and 7 all match.
    let key = FlexId::String(id.to_string()).key();
    let snapshot = state.store.current().await;
    let cached = snapshot
        .kind(kind)
        .streams
        .iter()
        .find(|entry| entry.id(kind).as_deref() == Some(key.as_str()));

    let fetched = match kind {
        ContentKind::Series => state.upstream.fetch_series_info(&key).await,
        _ => state.upstream.fetch_vod_info(&key).await,
    };

    match fetched {
        Ok(mut info) => {
            if let (Value::Object(record), Some(entry)) = (&mut info, cached) {
                overlay_missing(record, entry.fields());
            }
            json_body(&info)
        }
        Err(e) => {
            warn!(kind = %kind, "enrichment fetch failed: {}", e);
            match cached {
                Some(entry) => json_body(entry),
                None => (
                    StatusCode::BAD_GATEWAY,
                    Json(json!({"error": format!("Upstream error: {}", e)})),
                )
                    .into_response(),
            }
        }
    }
}

/// Copy fields from `source` into `target` only where `target` has no
/// value for the key.
fn overlay_missing(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        target
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }
}

/// Serialize by reference; listing vectors can be large and are never
/// cloned on the request path.
fn json_body<T: Serialize>(value: &T) -> Response {
    match serde_json::to_vec(value) {
        Ok(body) => (
            [(header::CONTENT_TYPE, "application/json; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": format!("serialization failed: {}", e)})),
        )
            .into_response(),
    }
}

/// Unknown or incomplete actions answer an empty list, matching provider
/// behavior players expect.
fn empty_list() -> Response {
    json_body(&Vec::<Value>::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::get;
    use axum::Router;
    use std::time::{Duration, Instant};
    use tower::util::ServiceExt;

    use crate::config::{FilterRules, GatewayConfig, ProviderEndpoint};
    use crate::models::{decode_streams, CacheSnapshot};
    use crate::services::{catalog::CatalogStore, refresher::Refresher, upstream::XtreamClient};

    /// State wired against an unreachable upstream (closed port) so the
    /// request-path fetches fail fast.
    fn test_state(dir: &tempfile::TempDir) -> Arc<AppState> {
        let endpoint = ProviderEndpoint {
            base_url: "http://127.0.0.1:9".to_string(),
            username: "user".to_string(),
            password: "pass".to_string(),
        };
        let upstream =
            XtreamClient::new(&endpoint, Duration::from_millis(250), "test-agent").unwrap();
        let store = Arc::new(CatalogStore::new(dir.path().join("cache.json")));
        let refresher = Arc::new(Refresher::new(
            upstream.clone(),
            store.clone(),
            FilterRules::default(),
        ));
        Arc::new(AppState {
            gateway: GatewayConfig {
                xtream: endpoint,
                filters: FilterRules::default(),
            },
            upstream,
            store,
            refresher,
            start_time: Instant::now(),
        })
    }

    async fn seed_catalog(state: &AppState) {
        let mut snapshot = CacheSnapshot::empty();
        let (live, _) = decode_streams(
            ContentKind::Live,
            vec![json!({
                "stream_id": 10,
                "category_id": "1",
                "name": "UK| News",
                "custom_key": "kept"
            })],
        );
        snapshot.live.streams = live;
        let (vod, _) = decode_streams(
            ContentKind::Vod,
            vec![json!({
                "stream_id": "007",
                "category_id": "1",
                "name": "cached name",
                "rating": 8.1
            })],
        );
        snapshot.vod.streams = vod;
        state.store.publish(snapshot).await;
    }

    fn app(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/player_api.php", get(player_api))
            .with_state(state)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .uri(uri)
            .header("host", "gw.local:8000")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn wrong_credentials_get_the_xtream_rejection_shape() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(test_state(&dir));

        let (status, body) =
            get_json(app, "/player_api.php?username=user&password=wrong").await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({"user_info": {"auth": 0}}));
    }

    #[tokio::test]
    async fn login_reports_the_requested_host() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(test_state(&dir));

        let (status, body) =
            get_json(app, "/player_api.php?username=user&password=pass").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user_info"]["auth"], 1);
        assert_eq!(body["user_info"]["status"], "Active");
        assert_eq!(body["server_info"]["url"], "http://gw.local");
        assert_eq!(body["server_info"]["port"], "8000");
    }

    #[tokio::test]
    async fn listings_pass_cached_fields_through_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        seed_catalog(&state).await;

        let (status, body) = get_json(
            app(state),
            "/player_api.php?username=user&password=pass&action=get_live_streams",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["stream_id"], 10);
        assert_eq!(body[0]["custom_key"], "kept");
    }

    #[tokio::test]
    async fn enrichment_degrades_to_the_cached_entry() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        seed_catalog(&state).await;

        // Cached id is the string "007"; the request uses the bare number.
        let (status, body) = get_json(
            app(state),
            "/player_api.php?username=user&password=pass&action=get_vod_info&vod_id=7",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "cached name");
        assert_eq!(body["rating"], 8.1);
    }

    #[tokio::test]
    async fn enrichment_without_a_cached_entry_is_bad_gateway() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        seed_catalog(&state).await;

        let (status, body) = get_json(
            app(state),
            "/player_api.php?username=user&password=pass&action=get_vod_info&vod_id=999",
        )
        .await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].as_str().unwrap().starts_with("Upstream error"));
    }

    #[test]
    fn overlay_keeps_upstream_values_and_fills_gaps() {
        let mut upstream = json!({"name": "X", "year": 2020});
        let cached = json!({"name": "cached name", "rating": 8.1});

        let (Value::Object(target), Value::Object(source)) = (&mut upstream, &cached) else {
            unreachable!()
        };
        overlay_missing(target, source);

        assert_eq!(upstream["name"], "X"); // upstream wins the conflict
        assert_eq!(upstream["year"], 2020);
        assert_eq!(upstream["rating"], 8.1); // cache fills the gap
    }

    #[test]
    fn overlay_with_empty_source_is_identity() {
        let mut upstream = json!({"info": {"plot": "..."}});
        let before = upstream.clone();
        let Value::Object(target) = &mut upstream else {
            unreachable!()
        };
        overlay_missing(target, &Map::new());
        assert_eq!(upstream, before);
    }
}
