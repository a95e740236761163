//! Time-series engine error types
//!
//! The engine answers every statement with a numeric status code. Codes that
//! mean "the object already exists" are treated as success by idempotent
//! callers; transport failures and timeouts are the only retryable class.

use signalhouse_core::Retryable;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TsdbError>;

/// Engine status code as returned in the `code` field of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode(pub i32);

impl ErrorCode {
    pub const SUCCESS: ErrorCode = ErrorCode(0);
    pub const NETWORK_UNAVAILABLE: ErrorCode = ErrorCode(0x000B);
    pub const DB_NOT_EXIST: ErrorCode = ErrorCode(0x0388);
    pub const DB_ALREADY_EXISTS: ErrorCode = ErrorCode(0x0396);
    pub const STABLE_ALREADY_EXISTS: ErrorCode = ErrorCode(0x0360);
    pub const STABLE_NOT_EXIST: ErrorCode = ErrorCode(0x0362);
    pub const COLUMN_ALREADY_EXISTS: ErrorCode = ErrorCode(0x0371);
    pub const COLUMN_NOT_EXIST: ErrorCode = ErrorCode(0x0372);
    pub const STREAM_ALREADY_EXISTS: ErrorCode = ErrorCode(0x03F0);
    pub const STREAM_NOT_EXIST: ErrorCode = ErrorCode(0x03F1);
    pub const TABLE_ALREADY_EXISTS: ErrorCode = ErrorCode(0x0604);
    pub const SYNTAX_ERROR: ErrorCode = ErrorCode(0x2600);
    pub const INVALID_ALTER: ErrorCode = ErrorCode(0x2651);
    pub const TABLE_NOT_EXIST: ErrorCode = ErrorCode(0x2662);

    /// Whether the statement failed only because its target already exists.
    pub fn is_already_exists(&self) -> bool {
        matches!(
            *self,
            ErrorCode::DB_ALREADY_EXISTS
                | ErrorCode::STABLE_ALREADY_EXISTS
                | ErrorCode::TABLE_ALREADY_EXISTS
                | ErrorCode::STREAM_ALREADY_EXISTS
                | ErrorCode::COLUMN_ALREADY_EXISTS
        )
    }

    /// Whether the statement referenced a database, table or stream that is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(
            *self,
            ErrorCode::DB_NOT_EXIST
                | ErrorCode::STABLE_NOT_EXIST
                | ErrorCode::TABLE_NOT_EXIST
                | ErrorCode::STREAM_NOT_EXIST
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

#[derive(Debug, Clone, Error)]
pub enum TsdbError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Engine call {operation} timed out after {after_ms}ms")]
    Timeout { operation: String, after_ms: u64 },

    #[error("Engine rejected statement [{code}]: {message}")]
    Rejected { code: ErrorCode, message: String },

    #[error("Invalid engine response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl TsdbError {
    pub fn rejected(code: ErrorCode, message: impl Into<String>) -> Self {
        TsdbError::Rejected {
            code,
            message: message.into(),
        }
    }

    /// The engine status code, for rejections.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            TsdbError::Rejected { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_already_exists(&self) -> bool {
        self.code().map(|c| c.is_already_exists()).unwrap_or(false)
    }

    pub fn is_not_found(&self) -> bool {
        self.code().map(|c| c.is_not_found()).unwrap_or(false)
    }
}

impl From<reqwest::Error> for TsdbError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TsdbError::Timeout {
                operation: "http request".to_string(),
                after_ms: 0,
            }
        } else if e.is_decode() {
            TsdbError::InvalidResponse(e.to_string())
        } else {
            TsdbError::Transport(e.to_string())
        }
    }
}

impl Retryable for TsdbError {
    fn is_retryable(&self) -> bool {
        match self {
            TsdbError::Transport(_) | TsdbError::Timeout { .. } => true,
            TsdbError::Rejected { code, .. } => *code == ErrorCode::NETWORK_UNAVAILABLE,
            TsdbError::InvalidResponse(_) | TsdbError::Config(_) => false,
        }
    }

    fn timed_out(operation: &str, after: Duration) -> Self {
        TsdbError::Timeout {
            operation: operation.to_string(),
            after_ms: after.as_millis() as u64,
        }
    }
}
