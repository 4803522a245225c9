use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;

use super::platform;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub detail: DetailConfig,
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Live bounds-filtered feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Engine source that receives the committed feed URL.
    #[serde(default = "default_source_id")]
    pub source_id: String,
    /// Quiet period after the last viewport change before the URL commits.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

/// Station detail lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-attempt timeout.
    #[serde(default = "default_detail_timeout_ms")]
    pub timeout_ms: u64,
    /// Total attempts before the popup shows "details unavailable".
    #[serde(default = "default_detail_attempts")]
    pub attempts: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapConfig {
    #[serde(default = "default_initial_longitude")]
    pub initial_longitude: f64,
    #[serde(default = "default_initial_latitude")]
    pub initial_latitude: f64,
    #[serde(default = "default_initial_zoom")]
    pub initial_zoom: f64,
    /// Close-up zoom used when a single station is selected.
    #[serde(default = "default_station_zoom")]
    pub station_zoom: f64,
    /// Highest zoom at which the engine still clusters points.
    #[serde(default = "default_cluster_max_zoom")]
    pub cluster_max_zoom: f64,
    #[serde(default = "default_min_zoom")]
    pub min_zoom: f64,
    #[serde(default = "default_max_zoom")]
    pub max_zoom: f64,
}

/// Development backend serving the feed and detail endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_catalog")]
    pub catalog: PathBuf,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            source_id: default_source_id(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl Default for DetailConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_detail_timeout_ms(),
            attempts: default_detail_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            initial_longitude: default_initial_longitude(),
            initial_latitude: default_initial_latitude(),
            initial_zoom: default_initial_zoom(),
            station_zoom: default_station_zoom(),
            cluster_max_zoom: default_cluster_max_zoom(),
            min_zoom: default_min_zoom(),
            max_zoom: default_max_zoom(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            catalog: default_catalog(),
        }
    }
}

impl FeedConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl DetailConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

fn default_base_url() -> String {
    format!("http://{}:{}", default_bind_address(), default_port())
}

fn default_source_id() -> String {
    "stations".to_string()
}

fn default_debounce_ms() -> u64 {
    10
}

fn default_detail_timeout_ms() -> u64 {
    10_000
}

fn default_detail_attempts() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    250
}

fn default_initial_longitude() -> f64 {
    -122.676483
}

fn default_initial_latitude() -> f64 {
    45.523064
}

fn default_initial_zoom() -> f64 {
    12.0
}

fn default_station_zoom() -> f64 {
    17.0
}

fn default_cluster_max_zoom() -> f64 {
    14.0
}

fn default_min_zoom() -> f64 {
    0.0
}

fn default_max_zoom() -> f64 {
    22.0
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8990
}

fn default_catalog() -> PathBuf {
    platform::config_dir().join("stations.toml")
}

impl Config {
    /// Load from the default location, writing defaults on first run.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(config_path: &Path) -> anyhow::Result<Self> {
        if !config_path.exists() {
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("parsing {}", config_path.display()))?;
        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}
