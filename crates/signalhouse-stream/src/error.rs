//! Stream errors
//!
//! - `Validation`: rejected feature configs; nothing is persisted or issued
//! - `StateConflict`: the action is not valid in the task's current state
//! - `GenerationLive`: another generation of the feature still owns the
//!   target table
//! - `Engine`: the engine refused a stream statement; the task is now `error`
//! - `Transient`: engine or catalog unreachable after all retries; the task
//!   keeps its previous state

use crate::lifecycle::StreamAction;
use signalhouse_core::{RetryFailure, ValidationError};
use signalhouse_metadata::{MetadataError, StreamStatus};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StreamError>;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Category not found: {0}")]
    CategoryNotFound(String),

    #[error("Feature not found: {category}/{feature}")]
    FeatureNotFound { category: String, feature: String },

    #[error("Stream task not found: {0}")]
    TaskNotFound(String),

    #[error("Cannot {action} stream task {task_id} while it is {status}")]
    StateConflict {
        task_id: String,
        status: StreamStatus,
        action: StreamAction,
    },

    #[error(
        "Cannot deploy stream task {task_id}: generation {generation} of the same feature is still live in task {live_task_id}"
    )]
    GenerationLive {
        task_id: String,
        live_task_id: String,
        generation: i64,
    },

    #[error("Stream {stream_name} already has task {task_id}")]
    AlreadyExists { stream_name: String, task_id: String },

    #[error("Engine rejected {action} of stream task {task_id}: {message}")]
    Engine {
        task_id: String,
        action: StreamAction,
        message: String,
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
    Metadata(MetadataError),
}

impl From<MetadataError> for StreamError {
    fn from(e: MetadataError) -> Self {
        match e {
            MetadataError::TaskNotFound(id) => StreamError::TaskNotFound(id),
            MetadataError::CategoryNotFound(code) => StreamError::CategoryNotFound(code),
            MetadataError::FeatureNotFound { category, feature } => {
                StreamError::FeatureNotFound { category, feature }
            }
            MetadataError::Validation(e) => StreamError::Validation(e),
            other => StreamError::Metadata(other),
        }
    }
}

impl StreamError {
    pub(crate) fn from_metadata(operation: &str, failure: RetryFailure<MetadataError>) -> Self {
        if failure.is_exhausted() {
            StreamError::Transient {
                operation: operation.to_string(),
                attempts: failure.attempts,
                cause: failure.error.to_string(),
            }
        } else {
            failure.error.into()
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, StreamError::Transient { .. })
    }
}
