use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;

use crate::models::ContentKind;

/// Upstream provider credentials. Opaque strings; only non-emptiness is
/// checked at load time.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderEndpoint {
    pub base_url: String,
    pub username: String,
    pub password: String,
}

/// Per-kind category name prefixes. An empty list keeps everything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterRules {
    #[serde(default)]
    pub live: Vec<String>,
    #[serde(default)]
    pub vod: Vec<String>,
    #[serde(default)]
    pub series: Vec<String>,
}

impl FilterRules {
    pub fn for_kind(&self, kind: ContentKind) -> &[String] {
        match kind {
            ContentKind::Live => &self.live,
            ContentKind::Vod => &self.vod,
            ContentKind::Series => &self.series,
        }
    }
}

/// Contents of `config.json`: provider endpoint plus filter prefixes.
/// Same file format the gateway has always used, so existing deployments
/// keep working.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub xtream: ProviderEndpoint,
    #[serde(default)]
    pub filters: FilterRules,
}

/// Load and validate `config.json`.
pub fn load_gateway_config(path: &str) -> Result<GatewayConfig> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read config file {}", path))?;
    let config: GatewayConfig =
        serde_json::from_str(&raw).with_context(|| format!("invalid config file {}", path))?;

    let endpoint = &config.xtream;
    if endpoint.base_url.trim().is_empty()
        || endpoint.username.trim().is_empty()
        || endpoint.password.trim().is_empty()
    {
        bail!(
            "config file {}: xtream base_url/username/password must be non-empty",
            path
        );
    }

    Ok(config)
}

/// Server knobs loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub config_path: String,
    pub cache_file: String,
    /// Timeout for full catalog downloads during a refresh.
    pub fetch_timeout_secs: u64,
    /// Timeout for per-item enrichment lookups.
    pub enrich_timeout_secs: u64,
    pub user_agent: String,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .unwrap_or(8000),

            config_path: env::var("CONFIG_PATH").unwrap_or_else(|_| "config.json".to_string()),

            cache_file: env::var("CACHE_FILE").unwrap_or_else(|_| "local_cache.json".to_string()),

            fetch_timeout_secs: env::var("FETCH_TIMEOUT_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .unwrap_or(300), // full catalog listings can be tens of MB

            enrich_timeout_secs: env::var("ENRICH_TIMEOUT_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(60),

            // Use a VLC user agent to avoid IPTV server blocks
            user_agent: env::var("USER_AGENT")
                .unwrap_or_else(|_| "VLC/3.0.20 LibVLC/3.0.20".to_string()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_config_parses_original_format() {
        let raw = r#"{
            "xtream": {"base_url": "http://host:8080", "username": "u", "password": "p"},
            "filters": {"live": ["UK", "EN"], "vod": []}
        }"#;
        let config: GatewayConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.xtream.base_url, "http://host:8080");
        assert_eq!(config.filters.for_kind(ContentKind::Live), ["UK", "EN"]);
        assert!(config.filters.for_kind(ContentKind::Series).is_empty());
    }

    #[test]
    fn missing_filters_section_defaults_to_match_all() {
        let raw = r#"{"xtream": {"base_url": "http://h", "username": "u", "password": "p"}}"#;
        let config: GatewayConfig = serde_json::from_str(raw).unwrap();
        for kind in ContentKind::ALL {
            assert!(config.filters.for_kind(kind).is_empty());
        }
    }
}
