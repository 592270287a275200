//! Registry of named circuit breakers, one per provider integration.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::circuit_breaker::{BreakerStats, CircuitBreaker, CircuitBreakerConfig};
use crate::error::ConnectorError;

/// Owns one [`CircuitBreaker`] per integration id, created lazily on first use.
pub struct CircuitBreakerManager {
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
    default_config: CircuitBreakerConfig,
}

impl CircuitBreakerManager {
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        Self { breakers: RwLock::new(HashMap::new()), default_config }
    }

    /// Double-checked-locking lookup: a shared read first, an exclusive write
    /// only when the entry is actually missing, re-checked once inside the
    /// write guard in case another caller raced us to create it.
    pub fn get_or_create(&self, id: &str) -> Arc<CircuitBreaker> {
        self.get_or_create_with(id, || CircuitBreaker::new(self.default_config.clone()))
    }

    pub fn get_or_create_with(
        &self,
        id: &str,
        make: impl FnOnce() -> CircuitBreaker,
    ) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.read().expect("breaker registry poisoned").get(id) {
            return existing.clone();
        }
        let mut write = self.breakers.write().expect("breaker registry poisoned");
        if let Some(existing) = write.get(id) {
            return existing.clone();
        }
        let breaker = Arc::new(make());
        write.insert(id.to_string(), breaker.clone());
        breaker
    }

    pub fn get(&self, id: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.read().expect("breaker registry poisoned").get(id).cloned()
    }

    pub fn reset(&self, id: &str) -> Result<(), ConnectorError> {
        match self.get(id) {
            Some(breaker) => {
                breaker.reset();
                Ok(())
            }
            None => Err(ConnectorError::not_found(id)),
        }
    }

    pub fn reset_all(&self) {
        let breakers = self.breakers.read().expect("breaker registry poisoned");
        for breaker in breakers.values() {
            breaker.reset();
        }
    }

    pub fn remove(&self, id: &str) {
        self.breakers.write().expect("breaker registry poisoned").remove(id);
    }

    /// Snapshot of every breaker's stats, sorted by integration id.
    pub fn all_stats(&self) -> Vec<(String, BreakerStats)> {
        let breakers = self.breakers.read().expect("breaker registry poisoned");
        let mut entries: Vec<_> =
            breakers.iter().map(|(id, breaker)| (id.clone(), breaker.stats())).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}
