//! Configuration management for signalctl
//!
//! ```toml
//! metadata_store = "/var/lib/signalhouse/metadata.db"
//! log_level = "info"
//!
//! [tsdb]
//! url = "http://localhost:6041"
//! user = "root"
//! password = "taosdata"
//!
//! [retry]
//! max_attempts = 3
//! initial_backoff_ms = 200
//! ```
//!
//! Every field has a default. `METADATA_STORE`, `TSDB_URL`, `TSDB_USER` and
//! `TSDB_PASSWORD` override the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use signalhouse_core::RetryPolicy;
use signalhouse_tsdb::TsdbConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn home_dir() -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".to_string())).join(".signalhouse")
}

fn default_metadata_store() -> String {
    home_dir().join("metadata.db").display().to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// SQLite file path, or `sqlite::memory:`
    #[serde(default = "default_metadata_store")]
    pub metadata_store: String,

    #[serde(default)]
    pub tsdb: TsdbConfig,

    #[serde(default)]
    pub retry: RetrySettings,

    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            metadata_store: default_metadata_store(),
            tsdb: TsdbConfig::default(),
            retry: RetrySettings::default(),
            log_level: default_log_level(),
        }
    }
}

/// `[retry]` section, mirrored into a [`RetryPolicy`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: usize,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
    pub attempt_timeout_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 200,
            max_backoff_ms: 5000,
            multiplier: 2.0,
            attempt_timeout_ms: 10_000,
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            backoff_multiplier: self.multiplier,
            attempt_timeout: Duration::from_millis(self.attempt_timeout_ms),
        }
    }
}

impl Config {
    /// Load the config file (if present) and apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path(),
        };

        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            Config::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Write the config as TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// `~/.signalhouse/config.toml`
    pub fn default_path() -> PathBuf {
        home_dir().join("config.toml")
    }

    fn apply_overrides<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) {
        if let Some(store) = lookup("METADATA_STORE") {
            self.metadata_store = store;
        }
        if let Some(url) = lookup("TSDB_URL") {
            self.tsdb.url = url;
        }
        if let Some(user) = lookup("TSDB_USER") {
            self.tsdb.user = user;
        }
        if let Some(password) = lookup("TSDB_PASSWORD") {
            self.tsdb.password = password;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.metadata_store.ends_with("metadata.db"));
        assert_eq!(config.tsdb.url, "http://localhost:6041");
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            metadata_store = "sqlite::memory:"

            [tsdb]
            url = "memory://"

            [retry]
            max_attempts = 5
            "#,
        )
        .unwrap();
        assert!(config.tsdb.is_memory());
        assert_eq!(config.tsdb.user, "root");
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_backoff_ms, 200);

        let policy = config.retry.policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.attempt_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("METADATA_STORE", "/tmp/catalog.db"),
            ("TSDB_URL", "http://tsdb:6041"),
            ("TSDB_PASSWORD", "secret"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.metadata_store, "/tmp/catalog.db");
        assert_eq!(config.tsdb.url, "http://tsdb:6041");
        assert_eq!(config.tsdb.user, "root");
        assert_eq!(config.tsdb.password, "secret");
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.metadata_store = "sqlite::memory:".to_string();
        config.tsdb = TsdbConfig::memory();
        config.retry.max_attempts = 1;
        config.save(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.metadata_store, "sqlite::memory:");
        assert!(loaded.tsdb.is_memory());
        assert_eq!(loaded.retry, config.retry);
    }

    #[test]
    fn test_zero_attempts_still_tries_once() {
        let settings = RetrySettings {
            max_attempts: 0,
            ..Default::default()
        };
        assert_eq!(settings.policy().max_attempts, 1);
    }
}
