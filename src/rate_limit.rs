//! Per-provider rate limiting: a single token bucket refilled once per minute.

use crate::clock::{Clock, MonotonicClock};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Snapshot of a rate limiter's window, for metrics and health reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitWindow {
    pub requests_per_minute: u32,
    pub requests_remaining: u32,
    /// Milliseconds (on the injected clock) until the window resets.
    pub resets_in_millis: u64,
}

struct Fields {
    remaining: u32,
    window_started_at_millis: u64,
}

/// A single token bucket, one per provider integration, refilled to
/// `requests_per_minute` whenever a full minute has elapsed since the window
/// started. Refill happens lazily, on the next call, rather than via a timer.
pub struct RateLimiter {
    requests_per_minute: u32,
    clock: Arc<dyn Clock>,
    fields: Mutex<Fields>,
}

const WINDOW_MILLIS: u64 = 60_000;

impl RateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            requests_per_minute,
            clock: Arc::new(MonotonicClock::default()),
            fields: Mutex::new(Fields { remaining: requests_per_minute, window_started_at_millis: 0 }),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    fn refill_if_elapsed(&self, fields: &mut Fields) {
        let now = self.clock.now_millis();
        if now.saturating_sub(fields.window_started_at_millis) >= WINDOW_MILLIS {
            fields.remaining = self.requests_per_minute;
            fields.window_started_at_millis = now;
        }
    }

    pub fn can_make_request(&self) -> bool {
        let mut fields = self.fields.lock().expect("rate limiter mutex poisoned");
        self.refill_if_elapsed(&mut fields);
        fields.remaining > 0
    }

    /// Consume one token if available. Returns `true` if the request may proceed.
    pub fn consume_request(&self) -> bool {
        let mut fields = self.fields.lock().expect("rate limiter mutex poisoned");
        self.refill_if_elapsed(&mut fields);
        if fields.remaining > 0 {
            fields.remaining -= 1;
            true
        } else {
            false
        }
    }

    /// How long until the window resets and tokens become available again.
    pub fn get_wait_time(&self) -> Duration {
        let mut fields = self.fields.lock().expect("rate limiter mutex poisoned");
        self.refill_if_elapsed(&mut fields);
        if fields.remaining > 0 {
            return Duration::from_millis(0);
        }
        let now = self.clock.now_millis();
        let elapsed = now.saturating_sub(fields.window_started_at_millis);
        Duration::from_millis(WINDOW_MILLIS.saturating_sub(elapsed))
    }

    pub fn window(&self) -> RateLimitWindow {
        let mut fields = self.fields.lock().expect("rate limiter mutex poisoned");
        self.refill_if_elapsed(&mut fields);
        let now = self.clock.now_millis();
        let elapsed = now.saturating_sub(fields.window_started_at_millis);
        RateLimitWindow {
            requests_per_minute: self.requests_per_minute,
            requests_remaining: fields.remaining,
            resets_in_millis: WINDOW_MILLIS.saturating_sub(elapsed),
        }
    }
}
