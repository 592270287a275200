//! Response cache: keeps recent successful driver responses keyed by
//! `providerId:method:endpoint` so identical requests skip the driver.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::clock::{Clock, MonotonicClock};
use crate::integration::IntegrationResponse;

struct Entry {
    value: IntegrationResponse,
    expires_at_millis: u64,
}

/// Abstract response cache. The Manager is agnostic to whether this is
/// backed by memory or an external store.
pub trait ResponseCache: Send + Sync {
    fn get(&self, key: &str) -> Option<IntegrationResponse>;
    fn set(&self, key: &str, value: IntegrationResponse, ttl: Duration);
    fn delete(&self, key: &str);
    /// Remove every entry whose key starts with `prefix`.
    fn clear(&self, prefix: &str);
}

pub struct InMemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self { entries: Mutex::new(HashMap::new()), clock: Arc::new(MonotonicClock::default()) }
    }
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }
}

impl ResponseCache for InMemoryCache {
    fn get(&self, key: &str) -> Option<IntegrationResponse> {
        let mut entries = self.entries.lock().expect("response cache mutex poisoned");
        let now = self.clock.now_millis();
        match entries.get(key) {
            Some(entry) if entry.expires_at_millis > now => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn set(&self, key: &str, value: IntegrationResponse, ttl: Duration) {
        let expires_at_millis = self.clock.now_millis().saturating_add(ttl.as_millis() as u64);
        self.entries
            .lock()
            .expect("response cache mutex poisoned")
            .insert(key.to_string(), Entry { value, expires_at_millis });
    }

    fn delete(&self, key: &str) {
        self.entries.lock().expect("response cache mutex poisoned").remove(key);
    }

    fn clear(&self, prefix: &str) {
        self.entries.lock().expect("response cache mutex poisoned").retain(|key, _| !key.starts_with(prefix));
    }
}
