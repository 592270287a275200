#![forbid(unsafe_code)]
//! # connector-core
//!
//! The integration runtime for a multi-provider commerce connector: a
//! provider registry that owns driver lifecycle, dispatches requests through
//! a cache, a per-provider circuit breaker, and a retry executor, and takes
//! in webhooks through signature-verified handlers.
//!
//! The pieces compose independently — circuit breakers, retry, rate
//! limiting, and the credential vault are all usable on their own — but the
//! [`Manager`] is the piece most callers want: register an integration with
//! a driver and credentials, then call [`Manager::execute_request`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use connector_core::prelude::*;
//!
//! # async fn example(driver: Arc<dyn ProviderDriver>) -> Result<(), ConnectorError> {
//! let manager = Manager::new(
//!     ManagerConfig::default(),
//!     CircuitBreakerConfig::new(5, Duration::from_secs(30)),
//!     RetryConfig::default(),
//!     Some(Arc::new(InMemoryCache::new())),
//!     Arc::new(InMemoryMetrics::new()),
//!     Arc::new(TracingLogger),
//!     Arc::new(InMemoryEventBus::new()),
//! );
//!
//! let integration = Integration::new("stripe-main", "Stripe", IntegrationType::Payment, "stripe");
//! let credentials = CredentialBundle::new().with_field("apiKey", "sk_live_...");
//! manager.register(integration, driver, &credentials).await?;
//! # Ok(()) }
//! ```

mod backoff;
mod bulkhead;
mod cache;
mod cancellation;
mod circuit_breaker;
mod circuit_breaker_registry;
mod clock;
mod config;
mod credential_store;
mod driver;
mod error;
mod integration;
mod jitter;
mod manager;
mod observability;
mod rate_limit;
mod retry;
mod sleeper;
mod timeout;
mod validation;
mod webhook;

pub use backoff::Backoff;
pub use bulkhead::BulkheadPolicy;
pub use cache::{InMemoryCache, ResponseCache};
pub use cancellation::CancellationToken;
pub use circuit_breaker::{
    BreakerStats, CircuitBreaker, CircuitBreakerConfig, CircuitState, CircuitStateChange,
};
pub use circuit_breaker_registry::CircuitBreakerManager;
pub use clock::{Clock, MonotonicClock};
pub use config::{
    ManagerConfig, DEFAULT_CREDENTIAL_CACHE_TTL, DEFAULT_HALF_OPEN_CALLS,
    DEFAULT_HEALTH_CHECK_INTERVAL, DEFAULT_INITIAL_DELAY, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_CONCURRENT_REQUESTS, DEFAULT_MAX_DELAY, DEFAULT_MAX_FAILURES,
    DEFAULT_RESET_TIMEOUT, DEFAULT_RESPONSE_CACHE_TTL, DEFAULT_TIMEOUT,
};
pub use credential_store::{
    CredentialBackingStore, CredentialBundle, CredentialRecord, CredentialVault, EncryptionKey,
    InMemoryCredentialStore,
};
pub use driver::{DriverCapability, OrderSync, PaymentCapable, ProviderDriver, ProviderKind};
pub use error::{ConnectorError, ErrorCode};
pub use integration::{
    Integration, IntegrationMetadata, IntegrationRequest, IntegrationResponse, IntegrationStatus,
    IntegrationType,
};
pub use jitter::Jitter;
pub use manager::Manager;
pub use observability::{
    Event, EventBus, InMemoryEventBus, InMemoryMetrics, Logger, Metrics, MetricsSnapshot,
    TracingLogger,
};
pub use rate_limit::{RateLimitWindow, RateLimiter};
pub use retry::{RetryConfig, RetryExecutor, RetryStats};
pub use sleeper::{InstantSleeper, Sleeper, TokioSleeper, TrackingSleeper};
pub use timeout::{TimeoutError, TimeoutPolicy, MAX_TIMEOUT};
pub use validation::{validate_config, validate_credential_bundle, FieldRule, RECOGNIZED_CREDENTIAL_FIELDS};
pub use webhook::{HmacSha256Handler, WebhookEvent, WebhookHandler};

pub mod prelude;
