//! Validation Error Types
//!
//! `ValidationError` covers every failure that can be decided from the input
//! alone: bad identifiers, malformed feature configurations, disallowed
//! aggregation functions, incompatible signal retypes.
//!
//! These errors are produced by pure functions (the DDL generator and the
//! feature compiler) and by metadata checks. They are never retried: the
//! caller must correct the metadata and resubmit.

use thiserror::Error;

pub type ValidationResult<T> = std::result::Result<T, ValidationError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Invalid {kind} identifier '{value}': {reason}")]
    InvalidIdentifier {
        kind: String,
        value: String,
        reason: String,
    },

    #[error("{kind} '{value}' collides with a reserved column name")]
    ReservedName { kind: String, value: String },

    #[error("Aggregation function not allowed: {0}")]
    DisallowedFunction(String),

    #[error("Invalid duration for {field} ('{value}'): {reason}")]
    InvalidDuration {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Slide interval {slide} exceeds window {window}")]
    SlideExceedsWindow { window: String, slide: String },

    #[error("Unknown signal {category}/{signal}")]
    UnknownSignal { category: String, signal: String },

    #[error("Signal {category}/{signal} is not stored and cannot feed a feature")]
    SignalNotStored { category: String, signal: String },

    #[error("Function {function} cannot aggregate {data_type} signal {signal}")]
    IncompatibleAggregation {
        function: String,
        signal: String,
        data_type: String,
    },

    #[error("Signal {signal} cannot be retyped from {from} to {to}: only widening is allowed")]
    IncompatibleRetype {
        signal: String,
        from: String,
        to: String,
    },
}

impl ValidationError {
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
