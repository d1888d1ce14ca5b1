//! File-based configuration.
//!
//! All settings can be given in a TOML file; every field is optional and
//! falls back to the same defaults as the builder-style runtime configs.
//!
//! ```toml
//! [client]
//! base_url = "http://localhost:8080"
//! resource = "api/identifications"
//! debounce_ms = 100
//!
//! [cache]
//! ttl_secs = 300
//! batch_delay_ms = 100
//!
//! [metrics]
//! max_count = 1000
//! max_age_secs = 86400
//! save_delay_ms = 1000
//! store_dir = "/var/lib/app/metrics"
//! ```
//!
//! [`Config::load()`] resolves the file in this order:
//! 1. Explicit path (if provided; must exist)
//! 2. `~/.muninn/config.toml`
//!
//! With no explicit path and no user file, defaults are used.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::cache::CacheConfig;
use crate::client::ClientConfig;
use crate::metrics_log::{FileStore, MetricsConfig};
use crate::{MuninnError, Result};

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub client: ClientSection,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub metrics: MetricsSection,
}

/// `[client]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_resource")]
    pub resource: String,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Transport timeout in seconds (default: none).
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            resource: default_resource(),
            debounce_ms: default_debounce_ms(),
            timeout_secs: None,
        }
    }
}

fn default_base_url() -> String {
    ClientConfig::default().base_url
}

fn default_resource() -> String {
    ClientConfig::default().resource
}

fn default_debounce_ms() -> u64 {
    100
}

/// `[cache]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            batch_delay_ms: default_batch_delay_ms(),
            max_entries: default_max_entries(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    300
}

fn default_batch_delay_ms() -> u64 {
    100
}

fn default_max_entries() -> u64 {
    10_000
}

/// `[metrics]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSection {
    #[serde(default = "default_max_count")]
    pub max_count: usize,
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,
    #[serde(default = "default_save_delay_ms")]
    pub save_delay_ms: u64,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
    /// Directory for the persisted snapshot (default: `~/.cache/muninn`).
    #[serde(default)]
    pub store_dir: Option<PathBuf>,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            max_count: default_max_count(),
            max_age_secs: default_max_age_secs(),
            save_delay_ms: default_save_delay_ms(),
            page_size: default_page_size(),
            token_ttl_secs: default_token_ttl_secs(),
            store_dir: None,
        }
    }
}

fn default_max_count() -> usize {
    1_000
}

fn default_max_age_secs() -> u64 {
    24 * 3600
}

fn default_save_delay_ms() -> u64 {
    1_000
}

fn default_page_size() -> usize {
    999
}

fn default_token_ttl_secs() -> u64 {
    3600
}

impl Config {
    /// Load configuration from an explicit path or the user location.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => {
                let content = fs::read_to_string(&path).map_err(|e| {
                    MuninnError::Configuration(format!("Failed to read config file {path:?}: {e}"))
                })?;
                toml::from_str(&content).map_err(|e| {
                    MuninnError::Configuration(format!(
                        "Failed to parse config file {path:?}: {e}"
                    ))
                })
            }
            None => Ok(Self::default()),
        }
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| MuninnError::Configuration(format!("Failed to parse config: {e}")))
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(MuninnError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        let user_config = dirs::home_dir().map(|home| home.join(".muninn").join("config.toml"));
        Ok(user_config.filter(|path| path.exists()))
    }

    /// Runtime settings for [`ApiClient`](crate::ApiClient).
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.client.base_url.clone(),
            resource: self.client.resource.clone(),
            debounce_delay: Duration::from_millis(self.client.debounce_ms),
            timeout: self.client.timeout_secs.map(Duration::from_secs),
        }
    }

    /// Runtime settings for [`ResponseCache`](crate::ResponseCache).
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .max_entries(self.cache.max_entries)
            .ttl(Duration::from_secs(self.cache.ttl_secs))
            .batch_delay(Duration::from_millis(self.cache.batch_delay_ms))
    }

    /// Runtime settings for [`MetricsLog`](crate::MetricsLog).
    pub fn metrics_config(&self) -> MetricsConfig {
        MetricsConfig::new()
            .max_count(self.metrics.max_count)
            .max_age(Duration::from_secs(self.metrics.max_age_secs))
            .save_delay(Duration::from_millis(self.metrics.save_delay_ms))
            .page_size(self.metrics.page_size)
            .token_ttl(Duration::from_secs(self.metrics.token_ttl_secs))
    }

    /// File store for the metrics snapshot.
    pub fn metrics_store(&self) -> FileStore {
        match &self.metrics.store_dir {
            Some(dir) => FileStore::new(dir),
            None => FileStore::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_runtime_defaults() {
        let config = Config::default();
        let cache = config.cache_config();
        assert_eq!(cache.ttl, CacheConfig::default().ttl);
        assert_eq!(cache.batch_delay, CacheConfig::default().batch_delay);

        let metrics = config.metrics_config();
        assert_eq!(metrics.max_count, 1_000);
        assert_eq!(metrics.page_size, 999);
        assert_eq!(metrics.save_delay, Duration::from_secs(1));

        let client = config.client_config();
        assert_eq!(client.debounce_delay, Duration::from_millis(100));
        assert_eq!(client.timeout, None);
    }

    #[test]
    fn parse_partial_config_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            [cache]
            ttl_secs = 60
        "#,
        )
        .unwrap();
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.cache.batch_delay_ms, 100);
        assert_eq!(config.metrics.max_count, 1_000);
    }

    #[test]
    fn config_not_found_returns_error() {
        let result = Config::load(Some(Path::new("/nonexistent/config.toml")));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Config file not found"));
    }
}
