//! Timeout policy for bounding async operation duration.
//!
//! Semantics
//! - Wraps an async operation and returns a `NetworkTimeout` [`ConnectorError`] when the
//!   deadline elapses.
//! - Uses `tokio::time::timeout`; on timeout the inner future is dropped (not forcibly
//!   aborted), so cancellation-unsafe work may leave partial state.
//! - Elapsed is measured from just before invoking the closure to timeout firing and can be
//!   slightly greater than the configured duration due to scheduling overhead.
//! - Requires a Tokio runtime.

use crate::error::{ConnectorError, ErrorCode};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Maximum allowed timeout duration (30 days) to avoid runaway timers while permitting long jobs.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(30 * 24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutError {
    ZeroDuration,
    ExceedsMaximum { requested: Duration, limit: Duration },
}

impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeoutError::ZeroDuration => write!(f, "timeout duration must be > 0"),
            TimeoutError::ExceedsMaximum { requested, limit } => write!(
                f,
                "timeout duration {:?} exceeds maximum allowed {:?}; use new_with_max to override",
                requested, limit
            ),
        }
    }
}

impl std::error::Error for TimeoutError {}

/// Policy that enforces a maximum duration on async operations.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutPolicy {
    duration: Duration,
}

impl TimeoutPolicy {
    #[must_use = "the result must be checked for validation errors"]
    pub fn new(duration: Duration) -> Result<Self, TimeoutError> {
        Self::new_with_max(duration, MAX_TIMEOUT)
    }

    pub fn new_with_max(duration: Duration, max: Duration) -> Result<Self, TimeoutError> {
        if duration.is_zero() {
            return Err(TimeoutError::ZeroDuration);
        }
        if duration > max {
            return Err(TimeoutError::ExceedsMaximum { requested: duration, limit: max });
        }
        Ok(Self { duration })
    }

    #[must_use]
    #[inline]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Execute an operation with a timeout.
    ///
    /// On timeout the inner future is dropped (Tokio does not forcibly abort); ensure the
    /// operation is cancellation-safe if partial work matters.
    pub async fn execute<T, Fut, Op>(&self, operation: Op) -> Result<T, ConnectorError>
    where
        Fut: Future<Output = Result<T, ConnectorError>>,
        Op: FnOnce() -> Fut,
    {
        let start = Instant::now();
        match tokio::time::timeout(self.duration, operation()).await {
            Ok(result) => result,
            Err(_) => {
                let elapsed = start.elapsed();
                Err(ConnectorError::new(
                    ErrorCode::NetworkTimeout,
                    format!("operation timed out after {:?} (limit: {:?})", elapsed, self.duration),
                ))
            }
        }
    }
}
