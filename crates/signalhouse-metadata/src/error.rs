//! Metadata Error Types
//!
//! All metadata store operations return `Result<T>`, aliased to
//! `Result<T, MetadataError>`.
//!
//! - Lookup errors (`CategoryNotFound`, `AssetNotFound`, ...) name the key
//! - Uniqueness errors (`*AlreadyExists`) are raised from the database's
//!   unique constraints
//! - `Validation` wraps checks that run before any write
//! - `DatabaseError` and `Timeout` are the only transient classes

use signalhouse_core::{Retryable, ValidationError};
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MetadataError>;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Category not found: {0}")]
    CategoryNotFound(String),

    #[error("Category already exists: {0}")]
    CategoryAlreadyExists(String),

    #[error("Category {code} is in use: {reason}")]
    CategoryInUse { code: String, reason: String },

    #[error("Signal not found: {category}/{signal}")]
    SignalNotFound { category: String, signal: String },

    #[error("Signal already exists: {category}/{signal}")]
    SignalAlreadyExists { category: String, signal: String },

    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    #[error("Asset already exists: {0}")]
    AssetAlreadyExists(String),

    #[error("Feature not found: {category}/{feature}")]
    FeatureNotFound { category: String, feature: String },

    #[error("Stream task not found: {0}")]
    TaskNotFound(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Metadata operation {operation} timed out after {after_ms}ms")]
    Timeout { operation: String, after_ms: u64 },
}

impl From<sqlx::migrate::MigrateError> for MetadataError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        MetadataError::MigrationError(e.to_string())
    }
}

impl Retryable for MetadataError {
    fn is_retryable(&self) -> bool {
        match self {
            MetadataError::DatabaseError(e) => matches!(
                e,
                sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::WorkerCrashed
            ),
            MetadataError::Timeout { .. } => true,
            _ => false,
        }
    }

    fn timed_out(operation: &str, after: Duration) -> Self {
        MetadataError::Timeout {
            operation: operation.to_string(),
            after_ms: after.as_millis() as u64,
        }
    }
}

/// Whether a database error is a unique-constraint violation.
pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}
