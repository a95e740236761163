//! Retry Logic with Exponential Backoff
//!
//! Orchestration layers (schema synchronizer, stream task manager) wrap every
//! call to the time-series engine and the metadata store in
//! [`retry_with_backoff`]. Each attempt carries its own timeout; a timed-out
//! attempt is treated as failed but possibly applied, which is why every
//! statement issued through this path is idempotent.
//!
//! ```text
//! ┌──────────────────────────────┐
//! │  RetryPolicy                 │
//! │  - max_attempts: 3           │
//! │  - initial_backoff: 200ms    │
//! │  - max_backoff: 5s           │
//! │  - backoff_multiplier: 2.0   │
//! │  - attempt_timeout: 10s      │
//! └──────┬───────────────────────┘
//!        ├─→ Attempt 1: Immediate
//!        ├─→ Attempt 2: Wait 200ms
//!        └─→ Attempt 3: Wait 400ms, then give up
//! ```
//!
//! Only errors whose [`Retryable::is_retryable`] returns `true` are retried.
//! Structural failures (type conflicts, malformed identifiers) surface on the
//! first attempt.

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// Classification hook implemented by every error that can flow through
/// [`retry_with_backoff`].
pub trait Retryable: Sized {
    /// `true` for transient failures (connectivity, timeouts).
    fn is_retryable(&self) -> bool;

    /// Build the error reported when a single attempt exceeds its timeout.
    fn timed_out(operation: &str, after: Duration) -> Self;
}

/// Retry policy configuration for exponential backoff.
///
/// ```text
/// backoff = min(initial_backoff * multiplier^attempt, max_backoff)
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one
    pub max_attempts: usize,

    /// Wait before the second attempt
    pub initial_backoff: Duration,

    /// Upper bound for any single wait
    pub max_backoff: Duration,

    /// Growth factor between consecutive waits
    pub backoff_multiplier: f64,

    /// Deadline for each individual attempt
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            attempt_timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Backoff to wait after the given (0-indexed) failed attempt.
    pub fn backoff(&self, attempt: usize) -> Duration {
        let backoff_ms =
            self.initial_backoff.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        let backoff = Duration::from_millis(backoff_ms as u64);
        backoff.min(self.max_backoff)
    }
}

/// The error returned once [`retry_with_backoff`] gives up.
#[derive(Debug)]
pub struct RetryFailure<E> {
    /// Number of attempts that were made
    pub attempts: usize,
    /// The last error observed
    pub error: E,
}

impl<E: Retryable> RetryFailure<E> {
    /// `true` when the operation failed only because attempts ran out.
    pub fn is_exhausted(&self) -> bool {
        self.error.is_retryable()
    }
}

/// Run `operation` until it succeeds, fails permanently, or the policy's
/// attempts are used up.
pub async fn retry_with_backoff<F, Fut, T, E>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, RetryFailure<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let error = match timeout(policy.attempt_timeout, operation()).await {
            Ok(Ok(result)) => {
                if attempt > 1 {
                    debug!(operation = operation_name, attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Ok(Err(e)) => e,
            Err(_) => E::timed_out(operation_name, policy.attempt_timeout),
        };

        if !error.is_retryable() {
            debug!(
                operation = operation_name,
                attempt,
                error = %error,
                "Non-retryable error, giving up"
            );
            return Err(RetryFailure {
                attempts: attempt,
                error,
            });
        }

        if attempt >= max_attempts {
            warn!(
                operation = operation_name,
                attempt,
                max_attempts,
                error = %error,
                "Max attempts exhausted, giving up"
            );
            return Err(RetryFailure {
                attempts: attempt,
                error,
            });
        }

        let backoff = policy.backoff(attempt - 1);
        warn!(
            operation = operation_name,
            attempt,
            max_attempts,
            backoff_ms = backoff.as_millis() as u64,
            error = %error,
            "Retryable error, backing off"
        );
        sleep(backoff).await;
    }
}
