//! Per-integration circuit breaker.
//!
//! Closed → Open → Half-Open → Closed, with a decrementing admission-ticket
//! counter in Half-Open (`half_open_allowed`) kept distinct from the
//! cumulative close-threshold counter (`success_count`). State transitions
//! are computed under a single mutex; listener callbacks fire after the
//! guard is dropped so a slow or panicking listener can never cause lock
//! inversion with a concurrent `execute` call.

use crate::clock::{Clock, MonotonicClock};
use crate::error::ConnectorError;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: usize,
    pub reset_timeout: Duration,
    /// Number of trial calls admitted while Half-Open; also the number of
    /// consecutive successes required to close the circuit again.
    pub half_open_calls: usize,
}

impl CircuitBreakerConfig {
    pub fn new(failure_threshold: usize, reset_timeout: Duration) -> Self {
        Self { failure_threshold, reset_timeout, half_open_calls: 1 }
    }

    /// A breaker that never opens, used when a provider integration opts out.
    pub fn disabled() -> Self {
        Self {
            failure_threshold: usize::MAX,
            reset_timeout: Duration::from_secs(0),
            half_open_calls: usize::MAX,
        }
    }

    pub fn with_half_open_calls(mut self, calls: usize) -> Self {
        self.half_open_calls = calls;
        self
    }
}

/// Point-in-time snapshot of a breaker, for metrics and health reporting.
#[derive(Debug, Clone)]
pub struct BreakerStats {
    pub state: CircuitState,
    pub failures: usize,
    pub success_count: usize,
    pub half_open_allowed: usize,
    pub last_failure_time: Option<Duration>,
}

/// Emitted whenever a breaker changes state.
#[derive(Debug, Clone)]
pub struct CircuitStateChange {
    pub from: CircuitState,
    pub to: CircuitState,
    pub failures: usize,
}

type Listener = Arc<dyn Fn(&CircuitStateChange) + Send + Sync>;

struct Fields {
    state: CircuitState,
    failures: usize,
    success_count: usize,
    half_open_allowed: usize,
    last_failure_time_millis: Option<u64>,
}

impl Fields {
    fn new() -> Self {
        Self { state: CircuitState::Closed, failures: 0, success_count: 0, half_open_allowed: 0, last_failure_time_millis: None }
    }
}

pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    fields: Mutex<Fields>,
    listeners: Mutex<Vec<Listener>>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            clock: Arc::new(MonotonicClock::default()),
            fields: Mutex::new(Fields::new()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn on_state_change(&self, listener: impl Fn(&CircuitStateChange) + Send + Sync + 'static) {
        self.listeners.lock().expect("circuit breaker listeners mutex poisoned").push(Arc::new(listener));
    }

    pub fn stats(&self) -> BreakerStats {
        let f = self.fields.lock().expect("circuit breaker mutex poisoned");
        BreakerStats {
            state: f.state,
            failures: f.failures,
            success_count: f.success_count,
            half_open_allowed: f.half_open_allowed,
            last_failure_time: f.last_failure_time_millis.map(Duration::from_millis),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.fields.lock().expect("circuit breaker mutex poisoned").state
    }

    /// Force the breaker back to Closed with all counters cleared.
    pub fn reset(&self) {
        let mut f = self.fields.lock().expect("circuit breaker mutex poisoned");
        let from = f.state;
        *f = Fields::new();
        drop(f);
        if from != CircuitState::Closed {
            self.notify(&CircuitStateChange { from, to: CircuitState::Closed, failures: 0 });
        }
    }

    pub async fn execute<T, Fut, Op>(&self, mut operation: Op) -> Result<T, ConnectorError>
    where
        Fut: Future<Output = Result<T, ConnectorError>>,
        Op: FnMut() -> Fut,
    {
        self.can_execute()?;
        let result = operation().await;
        match &result {
            Ok(_) => self.record_success(),
            Err(_) => self.record_failure(),
        }
        result
    }

    fn can_execute(&self) -> Result<(), ConnectorError> {
        let mut f = self.fields.lock().expect("circuit breaker mutex poisoned");
        match f.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let now = self.clock.now_millis();
                let opened_at = f.last_failure_time_millis.unwrap_or(0);
                let elapsed = now.saturating_sub(opened_at);
                if elapsed > self.config.reset_timeout.as_millis() as u64 {
                    let change = CircuitStateChange { from: CircuitState::Open, to: CircuitState::HalfOpen, failures: f.failures };
                    f.state = CircuitState::HalfOpen;
                    f.half_open_allowed = self.config.half_open_calls;
                    f.success_count = 0;
                    drop(f);
                    self.notify(&change);
                    Ok(())
                } else {
                    let failures = f.failures;
                    let open_duration = Duration::from_millis(elapsed);
                    drop(f);
                    Err(ConnectorError::circuit_open(open_duration, failures))
                }
            }
            CircuitState::HalfOpen => {
                if f.half_open_allowed > 0 {
                    f.half_open_allowed -= 1;
                    Ok(())
                } else {
                    let failures = f.failures;
                    drop(f);
                    Err(ConnectorError::circuit_open(Duration::from_millis(0), failures))
                }
            }
        }
    }

    fn record_success(&self) {
        let mut f = self.fields.lock().expect("circuit breaker mutex poisoned");
        match f.state {
            CircuitState::Closed => {
                f.failures = 0;
            }
            CircuitState::HalfOpen => {
                f.success_count += 1;
                if f.success_count >= self.config.half_open_calls {
                    let change = CircuitStateChange { from: CircuitState::HalfOpen, to: CircuitState::Closed, failures: 0 };
                    f.state = CircuitState::Closed;
                    f.failures = 0;
                    f.success_count = 0;
                    f.half_open_allowed = 0;
                    f.last_failure_time_millis = None;
                    drop(f);
                    self.notify(&change);
                }
            }
            CircuitState::Open => {}
        }
    }

    fn record_failure(&self) {
        let mut f = self.fields.lock().expect("circuit breaker mutex poisoned");
        match f.state {
            CircuitState::Closed => {
                f.failures += 1;
                if f.failures >= self.config.failure_threshold {
                    let change = CircuitStateChange { from: CircuitState::Closed, to: CircuitState::Open, failures: f.failures };
                    f.state = CircuitState::Open;
                    f.last_failure_time_millis = Some(self.clock.now_millis());
                    drop(f);
                    self.notify(&change);
                }
            }
            CircuitState::HalfOpen => {
                let change = CircuitStateChange { from: CircuitState::HalfOpen, to: CircuitState::Open, failures: f.failures };
                f.state = CircuitState::Open;
                f.success_count = 0;
                f.half_open_allowed = 0;
                f.last_failure_time_millis = Some(self.clock.now_millis());
                drop(f);
                self.notify(&change);
            }
            CircuitState::Open => {}
        }
    }

    fn notify(&self, change: &CircuitStateChange) {
        let listeners = self.listeners.lock().expect("circuit breaker listeners mutex poisoned").clone();
        for listener in listeners.iter() {
            listener(change);
        }
    }
}
