//! Upstream Xtream Codes client.
//!
//! Thin reqwest wrapper over the provider's player_api.php plus the pure
//! playback-URL builders. The gateway never relays media bytes; playback
//! requests are answered with a redirect to the URLs built here.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::ProviderEndpoint;
use crate::models::ContentKind;

/// All upstream failures collapse into this one error; callers never
/// distinguish transport subtypes.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("network error: {0}")]
    Network(String),
    #[error("upstream returned HTTP {0}")]
    Http(u16),
    #[error("failed to decode upstream response: {0}")]
    Decode(String),
    #[error("empty response from upstream")]
    EmptyBody,
}

/// Catalog fetch contract consumed by the refresh orchestrator. Split out
/// so the orchestrator can be exercised against a fake provider in tests.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_categories(&self, kind: ContentKind) -> Result<Vec<Value>, UpstreamError>;
    async fn fetch_streams(&self, kind: ContentKind) -> Result<Vec<Value>, UpstreamError>;
}

/// HTTP client for a single Xtream provider.
#[derive(Clone)]
pub struct XtreamClient {
    http: Client,
    base_url: String,
    api_url: String,
}

impl XtreamClient {
    pub fn new(
        endpoint: &ProviderEndpoint,
        timeout: Duration,
        user_agent: &str,
    ) -> anyhow::Result<Self> {
        let base_url = endpoint.base_url.trim_end_matches('/').to_string();
        let api_url = format!(
            "{}/player_api.php?username={}&password={}",
            base_url,
            urlencoding::encode(&endpoint.username),
            urlencoding::encode(&endpoint.password),
        );

        let http = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .gzip(true)
            .build()?;

        Ok(Self {
            http,
            base_url,
            api_url,
        })
    }

    /// GET player_api.php with an action suffix and decode the JSON body.
    async fn get_json(&self, action: &str) -> Result<Value, UpstreamError> {
        let url = format!("{}&action={}", self.api_url, action);

        debug!(action, "upstream request");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| UpstreamError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Http(status.as_u16()));
        }

        let text = response
            .text()
            .await
            .map_err(|e| UpstreamError::Network(e.to_string()))?;

        if text.trim().is_empty() {
            return Err(UpstreamError::EmptyBody);
        }

        serde_json::from_str(&text).map_err(|e| UpstreamError::Decode(e.to_string()))
    }

    /// Fetch and require a JSON array; anything else is a decode failure.
    async fn get_rows(&self, action: &str) -> Result<Vec<Value>, UpstreamError> {
        match self.get_json(action).await? {
            Value::Array(rows) => Ok(rows),
            other => Err(UpstreamError::Decode(format!(
                "expected a JSON array for {}, got {}",
                action,
                json_type_name(&other)
            ))),
        }
    }

    /// Full metadata for one movie.
    pub async fn fetch_vod_info(&self, vod_id: &str) -> Result<Value, UpstreamError> {
        self.get_json(&format!("get_vod_info&vod_id={}", urlencoding::encode(vod_id)))
            .await
    }

    /// Full metadata for one series, episodes included.
    pub async fn fetch_series_info(&self, series_id: &str) -> Result<Value, UpstreamError> {
        self.get_json(&format!(
            "get_series_info&series_id={}",
            urlencoding::encode(series_id)
        ))
        .await
    }

    /// Upstream playback URL for a stream. Pure string construction; no
    /// media bytes ever pass through the gateway.
    pub fn media_url(
        &self,
        kind: ContentKind,
        username: &str,
        password: &str,
        stream_id: &str,
        ext: &str,
    ) -> String {
        format!(
            "{}/{}/{}/{}/{}.{}",
            self.base_url,
            kind.path_segment(),
            username,
            password,
            stream_id,
            ext
        )
    }
}

#[async_trait]
impl CatalogSource for XtreamClient {
    async fn fetch_categories(&self, kind: ContentKind) -> Result<Vec<Value>, UpstreamError> {
        self.get_rows(kind.categories_action()).await
    }

    async fn fetch_streams(&self, kind: ContentKind) -> Result<Vec<Value>, UpstreamError> {
        self.get_rows(kind.streams_action()).await
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
