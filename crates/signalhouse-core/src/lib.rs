//! SignalHouse Core
//!
//! Building blocks shared by every SignalHouse crate. Nothing in here performs
//! I/O against the metadata store or the time-series engine; the crate only
//! defines the vocabulary the other crates agree on.
//!
//! ## Contents
//!
//! - [`ValidationError`]: the single error type for malformed or semantically
//!   invalid metadata. Deterministic, never retried.
//! - [`ident`]: identifier rules and quoting for engine-facing SQL text.
//! - [`duration`]: the window/slide duration grammar (`10m`, `1h`, ...).
//! - [`retry`]: bounded exponential backoff with a per-attempt timeout.
//! - [`locks`]: a per-key async mutual-exclusion map.

pub mod duration;
pub mod error;
pub mod ident;
pub mod locks;
pub mod retry;

pub use duration::WindowDuration;
pub use error::{ValidationError, ValidationResult};
pub use locks::KeyedLocks;
pub use retry::{retry_with_backoff, RetryFailure, RetryPolicy, Retryable};

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
