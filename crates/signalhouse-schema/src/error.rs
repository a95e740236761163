//! Schema synchronization errors
//!
//! - `Validation`: unsafe identifiers, caught before anything is issued
//! - `Schema`: the engine refused a structural change; fix the catalog and resubmit
//! - `Precondition`: ordering violation (e.g. child table before the super-table)
//! - `Transient`: engine or catalog unreachable after all retries

use signalhouse_core::{RetryFailure, ValidationError};
use signalhouse_metadata::MetadataError;
use signalhouse_tsdb::TsdbError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

fn signal_suffix(signal: &Option<String>) -> String {
    signal
        .as_ref()
        .map(|s| format!(" (signal {})", s))
        .unwrap_or_default()
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Category not found: {0}")]
    CategoryNotFound(String),

    #[error("Category {0} is inactive")]
    CategoryInactive(String),

    #[error("Precondition failed for category {category}: {reason}")]
    Precondition { category: String, reason: String },

    #[error("Schema error in category {category}{}: {reason}", signal_suffix(.signal))]
    Schema {
        category: String,
        signal: Option<String>,
        reason: String,
    },

    #[error("Transient failure in {operation} after {attempts} attempts: {cause}")]
    Transient {
        operation: String,
        attempts: usize,
        cause: String,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),
}

impl SyncError {
    /// Map a failed engine call. Exhausted retries are transient; anything
    /// else was a structural rejection.
    pub(crate) fn from_engine(
        category: &str,
        operation: &str,
        failure: RetryFailure<TsdbError>,
    ) -> Self {
        if failure.is_exhausted() {
            SyncError::Transient {
                operation: operation.to_string(),
                attempts: failure.attempts,
                cause: failure.error.to_string(),
            }
        } else {
            SyncError::Schema {
                category: category.to_string(),
                signal: None,
                reason: failure.error.to_string(),
            }
        }
    }

    pub(crate) fn from_metadata(operation: &str, failure: RetryFailure<MetadataError>) -> Self {
        if failure.is_exhausted() {
            SyncError::Transient {
                operation: operation.to_string(),
                attempts: failure.attempts,
                cause: failure.error.to_string(),
            }
        } else {
            SyncError::Metadata(failure.error)
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::Transient { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signalhouse_tsdb::ErrorCode;

    #[test]
    fn test_engine_failure_classification() {
        let transient = SyncError::from_engine(
            "motor",
            "describe",
            RetryFailure {
                attempts: 3,
                error: TsdbError::Transport("refused".into()),
            },
        );
        assert!(transient.is_transient());

        let structural = SyncError::from_engine(
            "motor",
            "alter",
            RetryFailure {
                attempts: 1,
                error: TsdbError::rejected(ErrorCode::INVALID_ALTER, "no"),
            },
        );
        assert!(matches!(structural, SyncError::Schema { .. }));
    }

    #[test]
    fn test_schema_message_names_signal() {
        let err = SyncError::Schema {
            category: "motor".into(),
            signal: Some("rpm".into()),
            reason: "narrowing".into(),
        };
        assert_eq!(
            err.to_string(),
            "Schema error in category motor (signal rpm): narrowing"
        );
    }
}
