//! SignalHouse Feature Streams
//!
//! Declarative feature definitions in, continuous queries out.
//!
//! ## Architecture
//!
//! ```text
//! feature JSON ──► dsl::parse_feature_config ──► FeatureConfig (normalized)
//!                                                   │
//!                         compiler::generate_stream_sql (pure)
//!                                                   │
//!                                                   ▼
//!                  StreamTaskManager ──► TsdbClient (CREATE/PAUSE/RESUME/DROP STREAM)
//!                         │
//!                         └──► MetadataStore (features, tasks, task logs)
//! ```
//!
//! Parsing and compilation never touch the network, so every failure they
//! produce is a deterministic [`signalhouse_core::ValidationError`]. Retries
//! and engine error handling live in [`StreamTaskManager`] only.
//!
//! ## Usage Example
//!
//! ```ignore
//! let manager = StreamTaskManager::new(metadata, engine);
//! manager.register_feature("motor", &json!({
//!     "name": "avg_current_1h",
//!     "source_signal": "current",
//!     "function": "avg",
//!     "window": "1h",
//!     "slide_interval": "10m"
//! })).await?;
//! let task = manager.create_stream("motor", "avg_current_1h").await?;
//! manager.deploy(&task.id).await?;
//! ```

pub mod compiler;
pub mod dsl;
pub mod error;
pub mod lifecycle;
pub mod manager;

pub use compiler::{check_signals, generate_stream_sql, CompiledStream};
pub use dsl::{
    parse_feature_config, to_canonical_json, validate_function, AggregateFunction, FeatureConfig,
    FilterClause, FilterOp, FilterValue,
};
pub use error::{Result, StreamError};
pub use lifecycle::StreamAction;
pub use manager::StreamTaskManager;
