//! Retry execution with configurable backoff, jitter, and retry classification.

use crate::cancellation::CancellationToken;
use crate::error::{ConnectorError, ErrorCode};
use crate::sleeper::{Sleeper, TokioSleeper};
use crate::{Backoff, Jitter};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

/// Accumulated statistics across every `execute` call on a [`RetryExecutor`].
#[derive(Debug, Clone, Default)]
pub struct RetryStats {
    pub total_attempts: u64,
    pub total_retries: u64,
    pub succeeded_after_retry: u64,
    pub failed_after_retries: u64,
    pub by_error_code: HashMap<ErrorCode, u64>,
    pub by_provider: HashMap<String, u64>,
    pub last_retry_at: Option<SystemTime>,
}

/// Configuration for a [`RetryExecutor`].
#[derive(Clone)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub backoff: Backoff,
    pub jitter: Jitter,
    /// Error codes that are never retried regardless of the error's `retryable` flag.
    pub non_retryable_codes: HashSet<ErrorCode>,
    /// Error codes that are always retried regardless of the error's `retryable` flag.
    pub retryable_codes: HashSet<ErrorCode>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::exponential(std::time::Duration::from_millis(200)),
            jitter: Jitter::full(),
            non_retryable_codes: HashSet::new(),
            retryable_codes: HashSet::new(),
        }
    }
}

/// Decides whether a classified error should be retried.
///
/// Precedence: a cancelled operation is always terminal; a configured
/// non-retryable code always wins; a configured retryable code always wins
/// next; otherwise the error's own `retryable` flag (set at construction,
/// defaulting to the network-keyword heuristic) decides.
fn should_retry(config: &RetryConfig, cancelled: bool, err: &ConnectorError) -> bool {
    if cancelled {
        return false;
    }
    if config.non_retryable_codes.contains(&err.code) {
        return false;
    }
    if config.retryable_codes.contains(&err.code) {
        return true;
    }
    err.retryable
}

/// Executes an operation with retry, backoff, jitter, and cancellation support,
/// and tracks [`RetryStats`] across every call.
pub struct RetryExecutor {
    config: RetryConfig,
    sleeper: Arc<dyn Sleeper>,
    stats: Mutex<RetryStats>,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self { config, sleeper: Arc::new(TokioSleeper), stats: Mutex::new(RetryStats::default()) }
    }

    pub fn with_sleeper(mut self, sleeper: impl Sleeper + 'static) -> Self {
        self.sleeper = Arc::new(sleeper);
        self
    }

    pub fn stats(&self) -> RetryStats {
        self.stats.lock().expect("retry stats mutex poisoned").clone()
    }

    /// Run `operation` until it succeeds, a non-retryable error is returned, the
    /// cancellation token fires, or `max_attempts` is exhausted.
    pub async fn execute<T, Fut, Op>(
        &self,
        provider: &str,
        cancellation: &CancellationToken,
        operation: Op,
    ) -> Result<T, ConnectorError>
    where
        Fut: Future<Output = Result<T, ConnectorError>>,
        Op: FnMut() -> Fut,
    {
        self.execute_with_override(provider, cancellation, None, operation).await
    }

    /// Like [`RetryExecutor::execute`], but `max_attempts_override` (when
    /// `Some`) replaces the configured `max_attempts` for this call only —
    /// used to honor a request's own retry-count override.
    pub async fn execute_with_override<T, Fut, Op>(
        &self,
        provider: &str,
        cancellation: &CancellationToken,
        max_attempts_override: Option<usize>,
        mut operation: Op,
    ) -> Result<T, ConnectorError>
    where
        Fut: Future<Output = Result<T, ConnectorError>>,
        Op: FnMut() -> Fut,
    {
        let max_attempts = max_attempts_override.unwrap_or(self.config.max_attempts);
        let mut last_err: Option<ConnectorError> = None;

        for attempt in 1..=max_attempts {
            if cancellation.is_cancelled() {
                return Err(ConnectorError::cancelled());
            }

            self.record_attempt(provider);

            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        self.record_success_after_retry();
                    }
                    return Ok(value);
                }
                Err(err) => {
                    let cancelled = cancellation.is_cancelled();
                    self.record_failure(provider, &err);

                    if !should_retry(&self.config, cancelled, &err) {
                        return Err(err);
                    }

                    if attempt >= max_attempts {
                        self.record_exhausted();
                        last_err = Some(err);
                        break;
                    }

                    self.record_retry();

                    let delay = self.config.jitter.apply(self.config.backoff.delay(attempt));
                    self.sleeper.sleep(delay).await;
                    last_err = Some(err);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            ConnectorError::new(ErrorCode::InternalError, "retry loop exited without a result")
        }))
    }

    fn record_attempt(&self, provider: &str) {
        let mut stats = self.stats.lock().expect("retry stats mutex poisoned");
        stats.total_attempts += 1;
        *stats.by_provider.entry(provider.to_string()).or_insert(0) += 1;
    }

    fn record_failure(&self, _provider: &str, err: &ConnectorError) {
        let mut stats = self.stats.lock().expect("retry stats mutex poisoned");
        *stats.by_error_code.entry(err.code).or_insert(0) += 1;
    }

    fn record_retry(&self) {
        let mut stats = self.stats.lock().expect("retry stats mutex poisoned");
        stats.total_retries += 1;
        stats.last_retry_at = Some(SystemTime::now());
    }

    fn record_success_after_retry(&self) {
        let mut stats = self.stats.lock().expect("retry stats mutex poisoned");
        stats.succeeded_after_retry += 1;
    }

    fn record_exhausted(&self) {
        let mut stats = self.stats.lock().expect("retry stats mutex poisoned");
        stats.failed_after_retries += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sleeper::{InstantSleeper, TrackingSleeper};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn config(max_attempts: usize, backoff: Backoff) -> RetryConfig {
        RetryConfig { max_attempts, backoff, jitter: Jitter::None, ..RetryConfig::default() }
    }

    #[tokio::test]
    async fn succeeds_on_first_attempt_without_retry_stats() {
        let executor = RetryExecutor::new(config(3, Backoff::constant(Duration::from_millis(10))))
            .with_sleeper(InstantSleeper);
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();

        let result = executor
            .execute("stripe", &CancellationToken::new(), || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ConnectorError>(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(executor.stats().succeeded_after_retry, 0);
    }

    #[tokio::test]
    async fn succeeds_after_retries_and_records_stats() {
        let executor = RetryExecutor::new(config(5, Backoff::constant(Duration::from_millis(1))))
            .with_sleeper(InstantSleeper);
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();

        let result = executor
            .execute("stripe", &CancellationToken::new(), || {
                let c = c.clone();
                async move {
                    let attempt = c.fetch_add(1, Ordering::SeqCst);
                    if attempt < 2 {
                        Err(ConnectorError::new(ErrorCode::NetworkTimeout, "timeout"))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        let stats = executor.stats();
        assert_eq!(stats.total_attempts, 3);
        assert_eq!(stats.total_retries, 2);
        assert_eq!(stats.succeeded_after_retry, 1);
    }

    #[tokio::test]
    async fn exhausts_after_max_attempts() {
        let executor = RetryExecutor::new(config(3, Backoff::constant(Duration::from_millis(1))))
            .with_sleeper(InstantSleeper);

        let result: Result<(), _> = executor
            .execute("stripe", &CancellationToken::new(), || async {
                Err(ConnectorError::new(ErrorCode::ServiceUnavailable, "down"))
            })
            .await;

        assert!(result.is_err());
        let stats = executor.stats();
        assert_eq!(stats.total_attempts, 3);
        assert_eq!(stats.failed_after_retries, 1);
    }

    #[tokio::test]
    async fn non_retryable_error_short_circuits() {
        let executor = RetryExecutor::new(config(5, Backoff::constant(Duration::from_millis(1))))
            .with_sleeper(InstantSleeper);
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();

        let result: Result<(), _> = executor
            .execute("stripe", &CancellationToken::new(), || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(ConnectorError::new(ErrorCode::AuthenticationFailed, "bad key"))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn configured_retryable_code_overrides_default() {
        let mut cfg = config(3, Backoff::constant(Duration::from_millis(1)));
        cfg.retryable_codes.insert(ErrorCode::AuthenticationFailed);
        let executor = RetryExecutor::new(cfg).with_sleeper(InstantSleeper);
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();

        let _ = executor
            .execute("stripe", &CancellationToken::new(), || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(ConnectorError::new(ErrorCode::AuthenticationFailed, "bad key"))
                }
            })
            .await;

        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn configured_non_retryable_code_overrides_default() {
        let mut cfg = config(5, Backoff::constant(Duration::from_millis(1)));
        cfg.non_retryable_codes.insert(ErrorCode::NetworkTimeout);
        let executor = RetryExecutor::new(cfg).with_sleeper(InstantSleeper);
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();

        let _ = executor
            .execute("stripe", &CancellationToken::new(), || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(ConnectorError::new(ErrorCode::NetworkTimeout, "timeout"))
                }
            })
            .await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_preempts_before_first_attempt() {
        let executor = RetryExecutor::new(config(5, Backoff::constant(Duration::from_millis(1))))
            .with_sleeper(InstantSleeper);
        let token = CancellationToken::new();
        token.cancel();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();

        let result: Result<(), _> = executor
            .execute("stripe", &token, || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn backoff_and_jitter_are_applied_between_attempts() {
        let sleeper = TrackingSleeper::new();
        let executor = RetryExecutor::new(config(4, Backoff::linear(Duration::from_millis(100))))
            .with_sleeper(sleeper.clone());

        let _: Result<(), _> = executor
            .execute("stripe", &CancellationToken::new(), || async {
                Err(ConnectorError::new(ErrorCode::ServiceUnavailable, "down"))
            })
            .await;

        let calls = sleeper.all();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0], Duration::from_millis(100));
        assert_eq!(calls[1], Duration::from_millis(200));
        assert_eq!(calls[2], Duration::from_millis(300));
    }

    #[tokio::test]
    async fn execute_with_override_honors_a_smaller_attempt_count() {
        let executor = RetryExecutor::new(config(5, Backoff::constant(Duration::from_millis(1))))
            .with_sleeper(InstantSleeper);
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();

        let result: Result<(), _> = executor
            .execute_with_override("stripe", &CancellationToken::new(), Some(2), || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(ConnectorError::new(ErrorCode::ServiceUnavailable, "down"))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn execute_with_override_of_none_falls_back_to_configured_max_attempts() {
        let executor = RetryExecutor::new(config(3, Backoff::constant(Duration::from_millis(1))))
            .with_sleeper(InstantSleeper);
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();

        let result: Result<(), _> = executor
            .execute_with_override("stripe", &CancellationToken::new(), None, || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(ConnectorError::new(ErrorCode::ServiceUnavailable, "down"))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stats_track_per_provider_and_per_error_code() {
        let executor = RetryExecutor::new(config(2, Backoff::constant(Duration::from_millis(1))))
            .with_sleeper(InstantSleeper);

        let _: Result<(), _> = executor
            .execute("stripe", &CancellationToken::new(), || async {
                Err(ConnectorError::new(ErrorCode::ServiceUnavailable, "down"))
            })
            .await;

        let stats = executor.stats();
        assert_eq!(stats.by_provider.get("stripe"), Some(&2));
        assert_eq!(stats.by_error_code.get(&ErrorCode::ServiceUnavailable), Some(&2));
    }
}
