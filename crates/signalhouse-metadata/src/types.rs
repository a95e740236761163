//! Metadata Type Definitions
//!
//! ## Types Overview
//!
//! ### AssetCategory
//! A family of industrial assets (motors, pumps, transformers) that share one
//! signal set. Each category maps to exactly one super-table in the
//! time-series engine.
//!
//! ### SignalDefinition
//! One measured quantity of a category. Stored signals become super-table
//! columns.
//!
//! ### Asset
//! A concrete device. Each asset gets a child table bound to its category's
//! super-table.
//!
//! ### FeatureDefinition
//! A canonical feature DSL document plus a generation counter that increases
//! whenever the canonical text changes.
//!
//! ### StreamTask
//! A compiled continuous query and its lifecycle state.
//!
//! ## Design Decisions
//!
//! - `*Config` structs are creation requests; the stored types add identity
//!   and timestamps
//! - Timestamps are i64 (milliseconds since epoch)
//! - Attribute bags use `BTreeMap` so serialized output is ordered

use serde::{Deserialize, Serialize};
use signalhouse_core::ValidationError;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============================================================
// SIGNAL DATA TYPES
// ============================================================

/// Declared data type of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalDataType {
    Numeric,
    Integer,
    Boolean,
    String,
    Timestamp,
}

impl SignalDataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalDataType::Numeric => "numeric",
            SignalDataType::Integer => "integer",
            SignalDataType::Boolean => "boolean",
            SignalDataType::String => "string",
            SignalDataType::Timestamp => "timestamp",
        }
    }

    /// Whether values of this type can be stored losslessly in `to`.
    ///
    /// Identity and `integer -> numeric` are the only permitted moves.
    pub fn can_widen_to(&self, to: SignalDataType) -> bool {
        *self == to || matches!((self, to), (SignalDataType::Integer, SignalDataType::Numeric))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, SignalDataType::Numeric | SignalDataType::Integer)
    }
}

impl fmt::Display for SignalDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalDataType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "numeric" | "float" | "double" => Ok(SignalDataType::Numeric),
            "integer" | "int" => Ok(SignalDataType::Integer),
            "boolean" | "bool" => Ok(SignalDataType::Boolean),
            "string" | "text" => Ok(SignalDataType::String),
            "timestamp" => Ok(SignalDataType::Timestamp),
            other => Err(ValidationError::invalid_field(
                "data_type",
                format!("unknown data type '{}'", other),
            )),
        }
    }
}

// ============================================================
// ASSET CATEGORIES
// ============================================================

fn default_stable_prefix() -> String {
    "raw".to_string()
}

/// Request to create a new asset category.
///
/// ```ignore
/// let config = CategoryConfig {
///     code: "motor".to_string(),
///     name: "Induction motor".to_string(),
///     industry: Some("manufacturing".to_string()),
///     database: "plant".to_string(),
///     stable_prefix: "raw".to_string(),
/// };
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryConfig {
    /// Unique, immutable category code
    pub code: String,

    /// Human-readable name
    pub name: String,

    /// Industry tag
    #[serde(default)]
    pub industry: Option<String>,

    /// Target time-series database
    pub database: String,

    /// Prefix for the super-table name (`{prefix}_{code}`)
    #[serde(default = "default_stable_prefix")]
    pub stable_prefix: String,
}

/// An asset category as stored in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetCategory {
    pub code: String,
    pub name: String,
    pub industry: Option<String>,
    pub database: String,
    pub stable_prefix: String,

    /// Soft-disable flag; inactive categories refuse sync and new assets
    pub is_active: bool,

    /// Number of assets referencing this category
    pub asset_count: u64,

    /// Fingerprint of the last successfully applied super-table structure
    pub schema_fingerprint: Option<String>,

    /// When the super-table was last confirmed in sync (ms since epoch)
    pub last_synced_at: Option<i64>,

    pub created_at: i64,
    pub updated_at: i64,
}

impl AssetCategory {
    /// Whether a super-table has ever been materialized for this category.
    pub fn is_synced(&self) -> bool {
        self.last_synced_at.is_some()
    }
}

// ============================================================
// SIGNALS
// ============================================================

fn default_true() -> bool {
    true
}

/// Request to add (or update) a signal of a category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    pub category_code: String,
    pub code: String,
    pub name: String,
    pub data_type: SignalDataType,

    #[serde(default)]
    pub unit: Option<String>,

    /// Materialize as a super-table column
    #[serde(default = "default_true")]
    pub is_stored: bool,

    #[serde(default)]
    pub is_realtime: bool,

    #[serde(default)]
    pub is_feature: bool,

    #[serde(default)]
    pub min_value: Option<f64>,

    #[serde(default)]
    pub max_value: Option<f64>,

    /// Free-form validation rule metadata
    #[serde(default)]
    pub validation_rule: Option<serde_json::Value>,

    #[serde(default)]
    pub display_order: i32,
}

impl SignalConfig {
    /// A stored signal with defaults for everything optional.
    pub fn stored(
        category_code: impl Into<String>,
        code: impl Into<String>,
        data_type: SignalDataType,
    ) -> Self {
        let code = code.into();
        Self {
            category_code: category_code.into(),
            name: code.clone(),
            code,
            data_type,
            unit: None,
            is_stored: true,
            is_realtime: false,
            is_feature: false,
            min_value: None,
            max_value: None,
            validation_rule: None,
            display_order: 0,
        }
    }
}

/// A signal as stored in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalDefinition {
    pub id: i64,
    pub category_code: String,
    pub code: String,
    pub name: String,
    pub data_type: SignalDataType,
    pub unit: Option<String>,
    pub is_stored: bool,
    pub is_realtime: bool,
    pub is_feature: bool,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub validation_rule: Option<serde_json::Value>,
    pub display_order: i32,
    pub created_at: i64,
    pub updated_at: i64,
}

// ============================================================
// ASSETS
// ============================================================

/// Lifecycle status of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetStatus {
    #[default]
    Active,
    Inactive,
    Maintenance,
    Retired,
}

impl AssetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetStatus::Active => "active",
            AssetStatus::Inactive => "inactive",
            AssetStatus::Maintenance => "maintenance",
            AssetStatus::Retired => "retired",
        }
    }
}

impl FromStr for AssetStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(AssetStatus::Active),
            "inactive" => Ok(AssetStatus::Inactive),
            "maintenance" => Ok(AssetStatus::Maintenance),
            "retired" => Ok(AssetStatus::Retired),
            other => Err(ValidationError::invalid_field(
                "status",
                format!("unknown asset status '{}'", other),
            )),
        }
    }
}

/// Request to create an asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetConfig {
    pub category_code: String,
    pub code: String,
    pub name: String,

    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,

    #[serde(default)]
    pub status: AssetStatus,
}

/// An asset as stored in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    /// Numeric identity, also written as the `asset_id` tag
    pub id: i64,
    pub category_code: String,
    pub code: String,
    pub name: String,
    pub attributes: BTreeMap<String, serde_json::Value>,
    pub status: AssetStatus,

    /// Child table name once provisioned
    pub child_table: Option<String>,

    pub created_at: i64,
    pub updated_at: i64,
}

// ============================================================
// FEATURES
// ============================================================

/// A registered feature definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDefinition {
    pub id: i64,
    pub category_code: String,
    pub name: String,

    /// Canonical feature DSL document
    pub config: serde_json::Value,

    /// Increments whenever the canonical config changes
    pub generation: i64,

    pub created_at: i64,
    pub updated_at: i64,
}

// ============================================================
// STREAM TASKS
// ============================================================

/// Lifecycle state of a stream task.
///
/// ```text
/// created -(deploy)-> running -(pause)-> paused -(resume)-> running -(stop)-> stopped
///    └──────────────────┴────────────────────┴──(engine failure)──> error
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    Created,
    Running,
    Paused,
    Stopped,
    Error,
}

impl StreamStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamStatus::Created => "created",
            StreamStatus::Running => "running",
            StreamStatus::Paused => "paused",
            StreamStatus::Stopped => "stopped",
            StreamStatus::Error => "error",
        }
    }

    /// Whether a continuous query may currently exist on the engine.
    pub fn is_live(&self) -> bool {
        matches!(self, StreamStatus::Running | StreamStatus::Paused)
    }
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(StreamStatus::Created),
            "running" => Ok(StreamStatus::Running),
            "paused" => Ok(StreamStatus::Paused),
            "stopped" => Ok(StreamStatus::Stopped),
            "error" => Ok(StreamStatus::Error),
            other => Err(ValidationError::invalid_field(
                "status",
                format!("unknown stream status '{}'", other),
            )),
        }
    }
}

/// Request to persist a freshly compiled stream task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewStreamTask {
    pub category_code: String,
    pub feature_name: String,
    pub generation: i64,
    pub stream_name: String,
    pub target_table: String,
    pub sql: String,
}

/// A stream task as stored in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamTask {
    pub id: String,
    pub category_code: String,
    pub feature_name: String,
    pub generation: i64,
    pub stream_name: String,
    pub target_table: String,
    pub sql: String,
    pub status: StreamStatus,

    /// Engine message that moved the task into `error`
    pub last_error: Option<String>,

    pub created_at: i64,
    pub updated_at: i64,
}

/// Severity of a task log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskLogLevel {
    Info,
    Warn,
    Error,
}

impl TaskLogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskLogLevel::Info => "info",
            TaskLogLevel::Warn => "warn",
            TaskLogLevel::Error => "error",
        }
    }
}

impl FromStr for TaskLogLevel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(TaskLogLevel::Info),
            "warn" => Ok(TaskLogLevel::Warn),
            "error" => Ok(TaskLogLevel::Error),
            other => Err(ValidationError::invalid_field(
                "level",
                format!("unknown log level '{}'", other),
            )),
        }
    }
}

/// One line of a stream task's log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskLogEntry {
    pub id: i64,
    pub task_id: String,
    pub level: TaskLogLevel,
    pub message: String,
    pub created_at: i64,
}
