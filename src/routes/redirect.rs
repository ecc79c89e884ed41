//! Playback redirect routes.
//!
//! `/live/{u}/{p}/{id}.ts`, `/movie/{u}/{p}/{id}.{ext}`, and
//! `/series/{u}/{p}/{id}.{ext}` answer a 307 to the upstream playback URL.
//! No media bytes pass through the gateway.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::models::ContentKind;
use crate::routes::player_api::{auth_rejected, credentials_match};
use crate::AppState;

/// GET /live/:username/:password/:file
pub async fn live(
    State(state): State<Arc<AppState>>,
    Path((username, password, file)): Path<(String, String, String)>,
) -> Response {
    resolve(&state, ContentKind::Live, &username, &password, &file)
}

/// GET /movie/:username/:password/:file
pub async fn movie(
    State(state): State<Arc<AppState>>,
    Path((username, password, file)): Path<(String, String, String)>,
) -> Response {
    resolve(&state, ContentKind::Vod, &username, &password, &file)
}

/// GET /series/:username/:password/:file
pub async fn series(
    State(state): State<Arc<AppState>>,
    Path((username, password, file)): Path<(String, String, String)>,
) -> Response {
    resolve(&state, ContentKind::Series, &username, &password, &file)
}

/// The last path segment arrives as `{stream_id}.{ext}`; split it, check
/// credentials, and hand back the upstream URL as a redirect.
fn resolve(
    state: &AppState,
    kind: ContentKind,
    username: &str,
    password: &str,
    file: &str,
) -> Response {
    if !credentials_match(state, Some(username), Some(password)) {
        return auth_rejected();
    }

    let Some((stream_id, ext)) = split_stream_file(file) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "missing stream extension"})),
        )
            .into_response();
    };

    let target = state
        .upstream
        .media_url(kind, username, password, stream_id, ext);
    Redirect::temporary(&target).into_response()
}

/// Split `"123.ts"` into `("123", "ts")`. Dots inside the id are fine:
/// only the last one separates the extension.
fn split_stream_file(file: &str) -> Option<(&str, &str)> {
    match file.rsplit_once('.') {
        Some((id, ext)) if !id.is_empty() && !ext.is_empty() => Some((id, ext)),
        _ => None,
    }
}
