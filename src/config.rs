use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::common::constants::{
    DEFAULT_CACHE_TTL_MINUTES, DEFAULT_GEOCODER_URL, DEFAULT_JSON_FEED_URL, DEFAULT_TABLE_SELECTOR,
    DEFAULT_TIMEOUT_SECONDS, HTML_TABLE_SOURCE, JSON_FEED_SOURCE,
};
use crate::common::error::{FeedError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "powercheck.toml";

/// Which upstream shape the feed URL serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedKind {
    Json,
    Html,
}

impl FeedKind {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            JSON_FEED_SOURCE => Ok(FeedKind::Json),
            HTML_TABLE_SOURCE => Ok(FeedKind::Html),
            other => Err(FeedError::Config(format!("Unknown feed kind '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub geocoder: GeocoderConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_feed_kind")]
    pub kind: FeedKind,
    #[serde(default = "default_feed_url")]
    pub url: String,
    #[serde(default = "default_table_selector")]
    pub table_selector: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeocoderConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_geocoder_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: u64,
}

fn default_feed_kind() -> FeedKind { FeedKind::Json }
fn default_feed_url() -> String { DEFAULT_JSON_FEED_URL.to_string() }
fn default_table_selector() -> String { DEFAULT_TABLE_SELECTOR.to_string() }
fn default_timeout_seconds() -> u64 { DEFAULT_TIMEOUT_SECONDS }
fn default_true() -> bool { true }
fn default_geocoder_url() -> String { DEFAULT_GEOCODER_URL.to_string() }
fn default_ttl_minutes() -> u64 { DEFAULT_CACHE_TTL_MINUTES }

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            kind: default_feed_kind(),
            url: default_feed_url(),
            table_selector: default_table_selector(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_geocoder_url(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_minutes: default_ttl_minutes() }
    }
}

impl Config {
    /// Load `path` if it exists, otherwise start from defaults. Environment
    /// overrides are applied on top either way.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let config_content = fs::read_to_string(path).map_err(|e| {
                FeedError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
            })?;
            Self::from_toml(&config_content)?
        } else {
            debug!("No config file at {}, using defaults", path.display());
            Self::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply `POWERCHECK_*` overrides. `lookup` is injected so tests don't
    /// have to mutate the process environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("POWERCHECK_FEED_URL") {
            self.feed.url = url;
        }
        if let Some(kind) = lookup("POWERCHECK_FEED_KIND") {
            self.feed.kind = FeedKind::parse(&kind)?;
        }
        if let Some(url) = lookup("POWERCHECK_GEOCODER_URL") {
            self.geocoder.base_url = url;
        }
        if let Some(ttl) = lookup("POWERCHECK_CACHE_TTL_MINUTES") {
            self.cache.ttl_minutes = ttl.trim().parse().map_err(|e| {
                FeedError::Config(format!("POWERCHECK_CACHE_TTL_MINUTES '{}' is not a number: {}", ttl, e))
            })?;
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Result<chrono::Duration> {
        i64::try_from(self.cache.ttl_minutes)
            .ok()
            .and_then(chrono::Duration::try_minutes)
            .ok_or_else(|| {
                FeedError::Config(format!("cache.ttl_minutes {} is out of range", self.cache.ttl_minutes))
            })
    }
}
