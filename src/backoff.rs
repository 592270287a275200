//! Backoff strategies for the retry executor.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Backoff strategy for retries.
#[derive(Clone)]
pub enum Backoff {
    /// Fixed delay between retries.
    Constant { delay: Duration },
    /// Linearly increasing delay.
    Linear { base: Duration },
    /// Exponentially increasing delay with optional cap.
    Exponential { base: Duration, max: Option<Duration> },
    /// Delay grows along the Fibonacci sequence, scaled by `base`.
    Fibonacci { base: Duration, max: Option<Duration> },
    /// Caller-supplied delay function, keyed by attempt number (1-indexed).
    Custom(Arc<dyn Fn(usize) -> Duration + Send + Sync>),
}

impl fmt::Debug for Backoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backoff::Constant { delay } => f.debug_struct("Constant").field("delay", delay).finish(),
            Backoff::Linear { base } => f.debug_struct("Linear").field("base", base).finish(),
            Backoff::Exponential { base, max } => {
                f.debug_struct("Exponential").field("base", base).field("max", max).finish()
            }
            Backoff::Fibonacci { base, max } => {
                f.debug_struct("Fibonacci").field("base", base).field("max", max).finish()
            }
            Backoff::Custom(_) => f.debug_struct("Custom").finish_non_exhaustive(),
        }
    }
}

impl Backoff {
    pub fn constant(delay: Duration) -> Self {
        Backoff::Constant { delay }
    }

    pub fn linear(base: Duration) -> Self {
        Backoff::Linear { base }
    }

    pub fn exponential(base: Duration) -> Self {
        Backoff::Exponential { base, max: None }
    }

    pub fn fibonacci(base: Duration) -> Self {
        Backoff::Fibonacci { base, max: None }
    }

    pub fn custom(f: impl Fn(usize) -> Duration + Send + Sync + 'static) -> Self {
        Backoff::Custom(Arc::new(f))
    }

    /// Set a maximum delay. Applies to `Exponential` and `Fibonacci`; ignored otherwise.
    pub fn with_max(mut self, max: Duration) -> Self {
        match &mut self {
            Backoff::Exponential { max: m, .. } => *m = Some(max),
            Backoff::Fibonacci { max: m, .. } => *m = Some(max),
            _ => {}
        }
        self
    }

    /// Calculate the delay for a given attempt number (1-indexed).
    pub fn delay(&self, attempt: usize) -> Duration {
        match self {
            Backoff::Constant { delay } => *delay,
            Backoff::Linear { base } => {
                base.checked_mul(attempt as u32).unwrap_or(Duration::from_secs(u64::MAX))
            }
            Backoff::Exponential { base, max } => {
                let exponent = (attempt.saturating_sub(1)) as u32;
                let multiplier = 2u32.saturating_pow(exponent);
                let exp_delay =
                    base.checked_mul(multiplier).unwrap_or(Duration::from_secs(u64::MAX));
                clamp(exp_delay, *max)
            }
            Backoff::Fibonacci { base, max } => {
                let fib = fibonacci(attempt);
                let scaled = base.checked_mul(fib).unwrap_or(Duration::from_secs(u64::MAX));
                clamp(scaled, *max)
            }
            Backoff::Custom(f) => f(attempt),
        }
    }
}

fn clamp(delay: Duration, max: Option<Duration>) -> Duration {
    match max {
        Some(max) => delay.min(max),
        None => delay,
    }
}

/// The `n`-th Fibonacci number (1-indexed, `fibonacci(1) == fibonacci(2) == 1`),
/// saturating instead of overflowing for large attempt counts.
fn fibonacci(n: usize) -> u32 {
    if n == 0 {
        return 0;
    }
    let (mut a, mut b) = (0u32, 1u32);
    for _ in 1..n {
        let next = a.saturating_add(b);
        a = b;
        b = next;
    }
    b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_backoff_returns_same_delay() {
        let backoff = Backoff::constant(Duration::from_secs(1));
        assert_eq!(backoff.delay(1), Duration::from_secs(1));
        assert_eq!(backoff.delay(2), Duration::from_secs(1));
        assert_eq!(backoff.delay(100), Duration::from_secs(1));
    }

    #[test]
    fn linear_backoff_increases_linearly() {
        let backoff = Backoff::linear(Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(100));
        assert_eq!(backoff.delay(2), Duration::from_millis(200));
        assert_eq!(backoff.delay(3), Duration::from_millis(300));
        assert_eq!(backoff.delay(10), Duration::from_millis(1000));
    }

    #[test]
    fn exponential_backoff_doubles_each_time() {
        let backoff = Backoff::exponential(Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(100));
        assert_eq!(backoff.delay(2), Duration::from_millis(200));
        assert_eq!(backoff.delay(3), Duration::from_millis(400));
        assert_eq!(backoff.delay(4), Duration::from_millis(800));
        assert_eq!(backoff.delay(5), Duration::from_millis(1600));
    }

    #[test]
    fn exponential_backoff_respects_max() {
        let backoff = Backoff::exponential(Duration::from_millis(100)).with_max(Duration::from_secs(1));
        assert_eq!(backoff.delay(5), Duration::from_secs(1));
        assert_eq!(backoff.delay(10), Duration::from_secs(1));
    }

    #[test]
    fn exponential_backoff_handles_overflow() {
        let backoff = Backoff::exponential(Duration::from_secs(1));
        let delay = backoff.delay(64);
        assert!(delay > Duration::from_secs(1_000_000));
    }

    #[test]
    fn linear_backoff_handles_overflow() {
        let backoff = Backoff::linear(Duration::from_secs(u64::MAX / 2));
        let delay = backoff.delay(10);
        assert!(delay >= Duration::from_secs(u64::MAX / 2));
    }

    #[test]
    fn with_max_only_affects_exponential_and_fibonacci() {
        let constant = Backoff::constant(Duration::from_secs(5)).with_max(Duration::from_secs(1));
        assert_eq!(constant.delay(1), Duration::from_secs(5));

        let linear = Backoff::linear(Duration::from_secs(5)).with_max(Duration::from_secs(1));
        assert_eq!(linear.delay(2), Duration::from_secs(10));
    }

    #[test]
    fn fibonacci_backoff_follows_sequence() {
        let backoff = Backoff::fibonacci(Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(100)); // fib(1) = 1
        assert_eq!(backoff.delay(2), Duration::from_millis(100)); // fib(2) = 1
        assert_eq!(backoff.delay(3), Duration::from_millis(200)); // fib(3) = 2
        assert_eq!(backoff.delay(4), Duration::from_millis(300)); // fib(4) = 3
        assert_eq!(backoff.delay(5), Duration::from_millis(500)); // fib(5) = 5
        assert_eq!(backoff.delay(6), Duration::from_millis(800)); // fib(6) = 8
    }

    #[test]
    fn fibonacci_backoff_respects_max() {
        let backoff =
            Backoff::fibonacci(Duration::from_millis(100)).with_max(Duration::from_millis(400));
        assert_eq!(backoff.delay(6), Duration::from_millis(400));
    }

    #[test]
    fn custom_backoff_invokes_closure() {
        let backoff = Backoff::custom(|attempt| Duration::from_millis(attempt as u64 * 17));
        assert_eq!(backoff.delay(3), Duration::from_millis(51));
    }
}
