//! Identity, configuration, and wire data model for a registered integration.

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

/// Broad category of third-party system a driver talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntegrationType {
    Marketplace,
    Payment,
    Shipping,
    Erp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationStatus {
    Active,
    Inactive,
    Error,
}

/// Running counters and timestamps the Manager maintains alongside each
/// integration. Never mutated by anything but the Manager under its write
/// lock.
#[derive(Debug, Clone)]
pub struct IntegrationMetadata {
    pub success_count: u64,
    pub error_count: u64,
    pub last_health_check: Option<SystemTime>,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

impl Default for IntegrationMetadata {
    fn default() -> Self {
        let now = SystemTime::now();
        Self { success_count: 0, error_count: 0, last_health_check: None, created_at: now, updated_at: now }
    }
}

/// Identity and configuration unit: the registered binding of a driver,
/// its credentials, and its dynamic config map.
#[derive(Debug, Clone)]
pub struct Integration {
    pub id: String,
    pub name: String,
    pub integration_type: IntegrationType,
    pub provider: String,
    pub status: IntegrationStatus,
    pub config: HashMap<String, String>,
    pub metadata: IntegrationMetadata,
}

impl Integration {
    pub fn new(id: impl Into<String>, name: impl Into<String>, integration_type: IntegrationType, provider: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            integration_type,
            provider: provider.into(),
            status: IntegrationStatus::Active,
            config: HashMap::new(),
            metadata: IntegrationMetadata::default(),
        }
    }

    pub fn with_config(mut self, config: HashMap<String, String>) -> Self {
        self.config = config;
        self
    }
}

/// An outbound call the Manager dispatches to a driver.
#[derive(Debug, Clone)]
pub struct IntegrationRequest {
    pub id: String,
    pub method: String,
    pub endpoint: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Vec<u8>>,
    pub timeout: Option<Duration>,
    /// Per-request override of the configured retry attempt count.
    pub retries: Option<usize>,
}

impl IntegrationRequest {
    pub fn new(id: impl Into<String>, method: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            endpoint: endpoint.into(),
            headers: HashMap::new(),
            body: None,
            timeout: None,
            retries: None,
        }
    }

    /// Key this request is cached under: `providerId:method:endpoint`. Headers,
    /// body and timeout are deliberately excluded — a differing method or
    /// endpoint misses the cache, everything else does not participate in
    /// identity.
    pub fn cache_key(&self, provider_id: &str) -> String {
        format!("{provider_id}:{}:{}", self.method, self.endpoint)
    }

    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = Some(retries);
        self
    }
}

/// A side-effect-free data carrier returned from a driver call. Nothing
/// mutates a response after it is handed off to the Manager.
#[derive(Debug, Clone)]
pub struct IntegrationResponse {
    pub id: String,
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: Option<Vec<u8>>,
    pub duration: Duration,
    pub timestamp: SystemTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_is_stable_for_identical_requests() {
        let a = IntegrationRequest::new("req-1", "GET", "/orders");
        let b = IntegrationRequest::new("req-2", "GET", "/orders");
        assert_eq!(a.cache_key("stripe"), b.cache_key("stripe"));
    }

    #[test]
    fn cache_key_differs_on_endpoint() {
        let a = IntegrationRequest::new("req-1", "GET", "/orders");
        let b = IntegrationRequest::new("req-1", "GET", "/products");
        assert_ne!(a.cache_key("stripe"), b.cache_key("stripe"));
    }
}
