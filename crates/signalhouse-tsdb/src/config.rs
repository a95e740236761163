//! Engine connection settings

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// URL scheme that selects the in-process engine instead of REST.
pub const MEMORY_URL: &str = "memory://";

fn default_url() -> String {
    "http://localhost:6041".to_string()
}

fn default_user() -> String {
    "root".to_string()
}

fn default_password() -> String {
    "taosdata".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TsdbConfig {
    /// REST endpoint base URL, or `memory://`
    #[serde(default = "default_url")]
    pub url: String,

    #[serde(default = "default_user")]
    pub user: String,

    #[serde(default = "default_password")]
    pub password: String,

    /// HTTP request timeout
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for TsdbConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            user: default_user(),
            password: default_password(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl TsdbConfig {
    /// Configuration for the in-process engine.
    pub fn memory() -> Self {
        Self {
            url: MEMORY_URL.to_string(),
            ..Default::default()
        }
    }

    pub fn is_memory(&self) -> bool {
        self.url.starts_with(MEMORY_URL)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: TsdbConfig = serde_json::from_str(r#"{"url":"http://tsdb:6041"}"#).unwrap();
        assert_eq!(config.user, "root");
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert!(!config.is_memory());
        assert!(TsdbConfig::memory().is_memory());
    }
}
