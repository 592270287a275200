//! Named default constants and the Manager's top-level config struct.
//!
//! There is no hidden global configuration singleton: every default lives
//! here as a named constant, and the Manager is always constructed with an
//! explicit [`ManagerConfig`].

use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 100;
pub const DEFAULT_RESPONSE_CACHE_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_CREDENTIAL_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

pub const DEFAULT_MAX_FAILURES: usize = 5;
pub const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_HALF_OPEN_CALLS: usize = 1;

pub const DEFAULT_MAX_ATTEMPTS: usize = 3;
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(200);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Top-level Manager configuration. Constructed explicitly by the caller;
/// `Default` resolves every field to the named constants above.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub enable_circuit_breaker: bool,
    pub enable_caching: bool,
    pub enable_metrics: bool,
    pub default_timeout: Duration,
    pub health_check_interval: Duration,
    pub max_concurrent_requests: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            enable_circuit_breaker: true,
            enable_caching: true,
            enable_metrics: true,
            default_timeout: DEFAULT_TIMEOUT,
            health_check_interval: DEFAULT_HEALTH_CHECK_INTERVAL,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_manager_config_enables_all_resilience_features() {
        let config = ManagerConfig::default();
        assert!(config.enable_circuit_breaker);
        assert!(config.enable_caching);
        assert!(config.enable_metrics);
        assert_eq!(config.max_concurrent_requests, DEFAULT_MAX_CONCURRENT_REQUESTS);
    }
}
