//! End-to-end scenarios driven through the public `Manager` API only.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use connector_core::prelude::*;

struct StubDriver {
    should_fail: AtomicBool,
    calls: AtomicUsize,
}

impl StubDriver {
    fn new(should_fail: bool) -> Self {
        Self { should_fail: AtomicBool::new(should_fail), calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl ProviderDriver for StubDriver {
    async fn initialize(&self, _config: &HashMap<String, String>, _credentials: &CredentialBundle) -> Result<(), ConnectorError> {
        Ok(())
    }
    async fn health_check(&self) -> Result<(), ConnectorError> {
        Ok(())
    }
    async fn close(&self) -> Result<(), ConnectorError> {
        Ok(())
    }
    fn capabilities(&self) -> Vec<DriverCapability> {
        vec![]
    }
    fn rate_limit(&self) -> RateLimitWindow {
        RateLimitWindow { requests_per_minute: 60, requests_remaining: 60, resets_in_millis: 60_000 }
    }
    async fn execute_request(&self, request: &IntegrationRequest) -> Result<IntegrationResponse, ConnectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.should_fail.load(Ordering::SeqCst) {
            Err(ConnectorError::new(ErrorCode::ServiceUnavailable, "down").with_retryable(true))
        } else {
            Ok(IntegrationResponse {
                id: request.id.clone(),
                status_code: 200,
                headers: HashMap::new(),
                body: None,
                duration: Duration::from_millis(1),
                timestamp: SystemTime::now(),
            })
        }
    }
    fn kind(&self) -> ProviderKind {
        ProviderKind::Marketplace
    }
}

fn manager(breaker: CircuitBreakerConfig) -> Manager {
    Manager::new(
        ManagerConfig { health_check_interval: Duration::ZERO, ..ManagerConfig::default() },
        breaker,
        RetryConfig { max_attempts: 1, ..RetryConfig::default() },
        Some(Arc::new(InMemoryCache::new())),
        Arc::new(InMemoryMetrics::new()),
        Arc::new(TracingLogger),
        Arc::new(InMemoryEventBus::new()),
    )
}

#[tokio::test]
async fn breaker_reopens_admission_after_reset_timeout_then_closes_on_success() {
    let manager = manager(CircuitBreakerConfig::new(1, Duration::from_millis(20)));
    let driver = Arc::new(StubDriver::new(true));
    manager
        .register(Integration::new("mkt-1", "A", IntegrationType::Marketplace, "acme"), driver.clone(), &CredentialBundle::new().with_field("apiKey", "k"))
        .await
        .unwrap();

    let cancellation = CancellationToken::new();
    let _ = manager.execute_request("mkt-1", IntegrationRequest::new("r1", "GET", "/x"), &cancellation).await;
    assert_eq!(manager.breaker_state("mkt-1"), Some(CircuitState::Open));

    tokio::time::sleep(Duration::from_millis(40)).await;

    driver.should_fail.store(false, Ordering::SeqCst);
    let response = manager.execute_request("mkt-1", IntegrationRequest::new("r2", "GET", "/y"), &cancellation).await.unwrap();
    assert_eq!(response.status_code, 200);
    assert_eq!(manager.breaker_state("mkt-1"), Some(CircuitState::Closed));
}

#[tokio::test]
async fn per_request_retries_override_replaces_the_configured_max_attempts() {
    let manager = manager(CircuitBreakerConfig::new(10, Duration::from_secs(30)));
    let driver = Arc::new(StubDriver::new(true));
    manager
        .register(Integration::new("mkt-1", "A", IntegrationType::Marketplace, "acme"), driver.clone(), &CredentialBundle::new().with_field("apiKey", "k"))
        .await
        .unwrap();

    let cancellation = CancellationToken::new();
    let request = IntegrationRequest::new("r1", "GET", "/x").with_retries(4);
    let err = manager.execute_request("mkt-1", request, &cancellation).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::ServiceUnavailable);
    assert_eq!(driver.calls.load(Ordering::SeqCst), 4);
}

struct RejectingHandler;

#[async_trait]
impl WebhookHandler for RejectingHandler {
    fn validate(&self, _headers: &HashMap<String, String>, _body: &[u8], _signature: &[u8]) -> Result<(), ConnectorError> {
        Err(ConnectorError::webhook_invalid("signature mismatch"))
    }
    async fn process(&self, _event: &WebhookEvent) -> Result<(), ConnectorError> {
        Ok(())
    }
}

#[tokio::test]
async fn webhook_validation_failure_is_terminal_and_not_recorded_as_a_success() {
    let manager = manager(CircuitBreakerConfig::new(3, Duration::from_secs(30)));
    let driver = Arc::new(StubDriver::new(false));
    manager
        .register(Integration::new("mkt-1", "A", IntegrationType::Marketplace, "acme"), driver, &CredentialBundle::new().with_field("apiKey", "k"))
        .await
        .unwrap();
    manager.register_webhook_handler("mkt-1", Arc::new(RejectingHandler));

    let event = WebhookEvent {
        id: "evt-1".to_string(),
        event_type: "order.created".to_string(),
        provider: "acme".to_string(),
        headers: HashMap::new(),
        body: b"payload".to_vec(),
        signature: b"bad-signature".to_vec(),
        timestamp: SystemTime::now(),
    };

    let err = manager.process_webhook("mkt-1", event).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::WebhookInvalid);
    assert!(!err.retryable);
}

#[tokio::test]
async fn update_config_leaves_previous_config_authoritative_on_failure() {
    struct FlakyDriver {
        accept: AtomicBool,
    }

    #[async_trait]
    impl ProviderDriver for FlakyDriver {
        async fn initialize(&self, _config: &HashMap<String, String>, _credentials: &CredentialBundle) -> Result<(), ConnectorError> {
            if self.accept.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(ConnectorError::new(ErrorCode::ConfigInvalid, "rejected").with_retryable(false))
            }
        }
        async fn health_check(&self) -> Result<(), ConnectorError> {
            Ok(())
        }
        async fn close(&self) -> Result<(), ConnectorError> {
            Ok(())
        }
        fn capabilities(&self) -> Vec<DriverCapability> {
            vec![]
        }
        fn rate_limit(&self) -> RateLimitWindow {
            RateLimitWindow { requests_per_minute: 60, requests_remaining: 60, resets_in_millis: 60_000 }
        }
        async fn execute_request(&self, _request: &IntegrationRequest) -> Result<IntegrationResponse, ConnectorError> {
            unreachable!("not exercised by this test")
        }
        fn kind(&self) -> ProviderKind {
            ProviderKind::Marketplace
        }
    }

    let manager = manager(CircuitBreakerConfig::new(3, Duration::from_secs(30)));
    let driver = Arc::new(FlakyDriver { accept: AtomicBool::new(true) });
    let mut original_config = HashMap::new();
    original_config.insert("region".to_string(), "us".to_string());
    manager
        .register(
            Integration::new("mkt-1", "A", IntegrationType::Marketplace, "acme").with_config(original_config.clone()),
            driver.clone(),
            &CredentialBundle::new().with_field("apiKey", "k"),
        )
        .await
        .unwrap();

    driver.accept.store(false, Ordering::SeqCst);
    let mut new_config = HashMap::new();
    new_config.insert("region".to_string(), "eu".to_string());
    let err = manager.update_config("mkt-1", new_config, &CredentialBundle::new().with_field("apiKey", "k")).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ConfigInvalid);

    let integration = manager.get("mkt-1").unwrap();
    assert_eq!(integration.config, original_config);
}
