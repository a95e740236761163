//! Command handlers for signalctl
//!
//! - category: create, inspect, synchronize and soft-disable categories
//! - signal: add and list signals
//! - asset: provision assets (row + child table)
//! - feature: register, list and compile feature definitions
//! - stream: stream task lifecycle, status and logs

pub mod asset;
pub mod category;
pub mod feature;
pub mod signal;
pub mod stream;

pub use asset::AssetCommands;
pub use category::CategoryCommands;
pub use feature::FeatureCommands;
pub use signal::SignalCommands;
pub use stream::StreamCommands;

use crate::config::Config;
use anyhow::{Context, Result};
use signalhouse_metadata::{MetadataStore, SqliteMetadataStore};
use signalhouse_schema::SchemaSynchronizer;
use signalhouse_stream::StreamTaskManager;
use std::path::Path;
use std::sync::Arc;

/// Shared handles every command runs against.
pub struct App {
    pub metadata: Arc<dyn MetadataStore>,
    pub sync: SchemaSynchronizer,
    pub streams: StreamTaskManager,
}

impl App {
    pub async fn connect(config: &Config) -> Result<Self> {
        let location = config.metadata_store.as_str();
        if !location.contains(":memory:") {
            let file = Path::new(location.trim_start_matches("sqlite://"));
            if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create metadata directory {}", parent.display())
                })?;
            }
        }

        let metadata: Arc<dyn MetadataStore> = Arc::new(
            SqliteMetadataStore::connect(location)
                .await
                .with_context(|| format!("Failed to open metadata store {}", location))?,
        );
        let engine = signalhouse_tsdb::connect(&config.tsdb)
            .with_context(|| format!("Failed to connect to time-series engine {}", config.tsdb.url))?;

        let policy = config.retry.policy();
        Ok(Self {
            sync: SchemaSynchronizer::new(metadata.clone(), engine.clone())
                .with_retry_policy(policy.clone()),
            streams: StreamTaskManager::new(metadata.clone(), engine).with_retry_policy(policy),
            metadata,
        })
    }
}

/// Read a JSON document from a file, or from stdin when `path` is `-`.
pub fn read_json(path: &Path) -> Result<serde_json::Value> {
    let text = if path.as_os_str() == "-" {
        std::io::read_to_string(std::io::stdin()).context("Failed to read stdin")?
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?
    };
    serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", path.display()))
}
