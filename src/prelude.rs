//! Convenient re-exports for building a Manager-backed integration runtime.

pub use crate::{
    Backoff, BreakerStats, BulkheadPolicy, CancellationToken, CircuitBreaker,
    CircuitBreakerConfig, CircuitBreakerManager, CircuitState, CircuitStateChange, Clock,
    ConnectorError, CredentialBackingStore, CredentialBundle, CredentialRecord, CredentialVault,
    DriverCapability, EncryptionKey, ErrorCode, Event, EventBus, HmacSha256Handler, InMemoryCache,
    InMemoryCredentialStore, InMemoryEventBus, InMemoryMetrics, Integration, IntegrationMetadata,
    IntegrationRequest, IntegrationResponse, IntegrationStatus, IntegrationType, Jitter, Logger,
    Manager, ManagerConfig, Metrics, MetricsSnapshot, MonotonicClock, OrderSync, PaymentCapable,
    ProviderDriver, ProviderKind, RateLimitWindow, RateLimiter, ResponseCache, RetryConfig,
    RetryExecutor, RetryStats, Sleeper, TimeoutError, TimeoutPolicy, TracingLogger,
    WebhookEvent, WebhookHandler,
};
