//! SignalHouse Metadata Store
//!
//! The relational catalog that describes what the time-series engine should
//! look like: asset categories, their signals, the assets themselves, feature
//! definitions and the stream tasks compiled from them.
//!
//! ## Ownership
//!
//! The catalog is the single writer of record for categories, signals,
//! assets and features. The synchronization engine only writes back:
//! - schema fingerprint and last-sync timestamp on categories
//! - child-table names on assets
//! - stream task state and task log lines
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────┐  mutations   ┌──────────────────┐
//! │  API / CLI     │ ───────────► │  Metadata Store  │ ◄── You are here
//! └────────────────┘              │  (SQLite)        │
//!                                 └────────┬─────────┘
//!                                          │ reads / sync state
//!                                 ┌────────┴─────────┐
//!                                 │ Schema sync +    │
//!                                 │ stream manager   │
//!                                 └──────────────────┘
//! ```
//!
//! ## Usage Example
//!
//! ```ignore
//! use signalhouse_metadata::{CategoryConfig, MetadataStore, SqliteMetadataStore};
//!
//! let store = SqliteMetadataStore::new("metadata.db").await?;
//! store.create_category(CategoryConfig {
//!     code: "motor".to_string(),
//!     name: "Motor".to_string(),
//!     industry: None,
//!     database: "plant".to_string(),
//!     stable_prefix: "raw".to_string(),
//! }).await?;
//! ```
//!
//! ## Transactions
//!
//! The transactional boundary is per entity. No operation spans two
//! categories, and no caller should rely on cross-entity atomicity.

pub mod error;
pub mod store;
pub mod types;

pub use error::{MetadataError, Result};
pub use store::SqliteMetadataStore;
pub use types::*;

use async_trait::async_trait;

/// Metadata store trait - abstracts over catalog backends.
///
/// All implementations must be `Send + Sync` so they can be shared as
/// `Arc<dyn MetadataStore>` between the schema synchronizer and the stream
/// task manager.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    // ============================================================
    // CATEGORY OPERATIONS
    // ============================================================

    /// Create a new asset category.
    ///
    /// # Errors
    ///
    /// - `Validation`: code, database or prefix is not a safe identifier
    /// - `CategoryAlreadyExists`: duplicate code
    async fn create_category(&self, config: CategoryConfig) -> Result<AssetCategory>;

    /// Get a category by code, including its derived asset count.
    async fn get_category(&self, code: &str) -> Result<Option<AssetCategory>>;

    /// List all categories ordered by code.
    async fn list_categories(&self) -> Result<Vec<AssetCategory>>;

    /// Soft-enable or soft-disable a category.
    async fn set_category_active(&self, code: &str, active: bool) -> Result<()>;

    /// Hard-delete a category.
    ///
    /// # Errors
    ///
    /// - `CategoryInUse`: assets still reference it, or a stream task is live
    async fn delete_category(&self, code: &str) -> Result<()>;

    /// Record a successful schema synchronization.
    ///
    /// Called by the synchronizer while it holds the category lock.
    async fn record_category_sync(&self, code: &str, fingerprint: &str, synced_at: i64)
        -> Result<()>;

    // ============================================================
    // SIGNAL OPERATIONS
    // ============================================================

    /// Add a signal to a category.
    ///
    /// # Errors
    ///
    /// - `CategoryNotFound`
    /// - `SignalAlreadyExists`: code already used within the category
    /// - `Validation`: unsafe or reserved code, inverted value range
    async fn add_signal(&self, config: SignalConfig) -> Result<SignalDefinition>;

    /// Get one signal.
    async fn get_signal(&self, category: &str, code: &str) -> Result<Option<SignalDefinition>>;

    /// List a category's signals ordered by display order, then code.
    async fn list_signals(&self, category: &str) -> Result<Vec<SignalDefinition>>;

    /// Update a signal in place.
    ///
    /// Once the category has been synchronized, a stored signal's data type
    /// may only be widened; anything else is rejected with
    /// `ValidationError::IncompatibleRetype`.
    async fn update_signal(&self, config: SignalConfig) -> Result<SignalDefinition>;

    /// Remove a signal definition. Materialized columns are left in place.
    async fn remove_signal(&self, category: &str, code: &str) -> Result<()>;

    // ============================================================
    // ASSET OPERATIONS
    // ============================================================

    /// Insert an asset row. Callers provision the child table separately.
    async fn create_asset(&self, config: AssetConfig) -> Result<Asset>;

    async fn get_asset(&self, code: &str) -> Result<Option<Asset>>;

    async fn list_assets(&self, category: &str) -> Result<Vec<Asset>>;

    /// Write back the provisioned child-table name.
    async fn set_asset_child_table(&self, code: &str, child_table: &str) -> Result<()>;

    async fn set_asset_status(&self, code: &str, status: AssetStatus) -> Result<()>;

    // ============================================================
    // FEATURE OPERATIONS
    // ============================================================

    /// Insert or update a feature's canonical config.
    ///
    /// The generation counter starts at 1 and increments only when the
    /// stored canonical text actually changes.
    async fn upsert_feature(
        &self,
        category: &str,
        name: &str,
        config: serde_json::Value,
    ) -> Result<FeatureDefinition>;

    async fn get_feature(&self, category: &str, name: &str) -> Result<Option<FeatureDefinition>>;

    async fn list_features(&self, category: &str) -> Result<Vec<FeatureDefinition>>;

    async fn delete_feature(&self, category: &str, name: &str) -> Result<()>;

    // ============================================================
    // STREAM TASK OPERATIONS
    // ============================================================

    /// Persist a compiled task in the `created` state.
    async fn create_stream_task(&self, task: NewStreamTask) -> Result<StreamTask>;

    async fn get_stream_task(&self, id: &str) -> Result<Option<StreamTask>>;

    /// List tasks, optionally restricted to one category, oldest first.
    async fn list_stream_tasks(&self, category: Option<&str>) -> Result<Vec<StreamTask>>;

    /// Persist a state transition. `last_error` replaces the stored message.
    async fn update_stream_task_status(
        &self,
        id: &str,
        status: StreamStatus,
        last_error: Option<&str>,
    ) -> Result<StreamTask>;

    /// Delete a task and its log.
    async fn delete_stream_task(&self, id: &str) -> Result<()>;

    async fn append_task_log(&self, task_id: &str, level: TaskLogLevel, message: &str)
        -> Result<()>;

    /// A task's log lines, oldest first.
    async fn list_task_logs(&self, task_id: &str) -> Result<Vec<TaskLogEntry>>;
}
