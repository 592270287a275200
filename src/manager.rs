//! Provider registry: owns integration and driver lifecycle, dispatches
//! requests through cache, circuit breaker, retry, and bulkhead, and runs the
//! per-integration health-check loop.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use crate::bulkhead::BulkheadPolicy;
use crate::cache::ResponseCache;
use crate::cancellation::CancellationToken;
use crate::circuit_breaker::{CircuitBreakerConfig, CircuitState};
use crate::circuit_breaker_registry::CircuitBreakerManager;
use crate::config::{ManagerConfig, DEFAULT_RESPONSE_CACHE_TTL};
use crate::credential_store::CredentialBundle;
use crate::driver::ProviderDriver;
use crate::error::{ConnectorError, ErrorCode};
use crate::integration::{Integration, IntegrationRequest, IntegrationResponse, IntegrationStatus, IntegrationType};
use crate::observability::{Event, EventBus, Logger, Metrics};
use crate::retry::{RetryConfig, RetryExecutor};
use crate::webhook::{WebhookEvent, WebhookHandler};

struct Registered {
    integration: Integration,
    driver: Arc<dyn ProviderDriver>,
}

struct Inner {
    integrations: RwLock<HashMap<String, Registered>>,
    webhook_handlers: RwLock<HashMap<String, Arc<dyn WebhookHandler>>>,
    breakers: CircuitBreakerManager,
    retry: RetryExecutor,
    bulkhead: BulkheadPolicy,
    cache: Option<Arc<dyn ResponseCache>>,
    metrics: Arc<dyn Metrics>,
    logger: Arc<dyn Logger>,
    event_bus: Arc<dyn EventBus>,
    config: ManagerConfig,
    health_check_tasks: AsyncMutex<HashMap<String, JoinHandle<()>>>,
}

/// Owns every registered integration's driver, breaker, and health loop.
/// Cheap to clone: internally an `Arc`.
#[derive(Clone)]
pub struct Manager {
    inner: Arc<Inner>,
}

impl Manager {
    pub fn new(
        config: ManagerConfig,
        breaker_config: CircuitBreakerConfig,
        retry_config: RetryConfig,
        cache: Option<Arc<dyn ResponseCache>>,
        metrics: Arc<dyn Metrics>,
        logger: Arc<dyn Logger>,
        event_bus: Arc<dyn EventBus>,
    ) -> Self {
        let bulkhead = BulkheadPolicy::new(config.max_concurrent_requests);
        Self {
            inner: Arc::new(Inner {
                integrations: RwLock::new(HashMap::new()),
                webhook_handlers: RwLock::new(HashMap::new()),
                breakers: CircuitBreakerManager::new(breaker_config),
                retry: RetryExecutor::new(retry_config),
                bulkhead,
                cache,
                metrics,
                logger,
                event_bus,
                config,
                health_check_tasks: AsyncMutex::new(HashMap::new()),
            }),
        }
    }

    /// Registers a new integration and initializes its driver under the
    /// configured default timeout. On success, starts a breaker (if enabled)
    /// and a health-check ticker, and publishes `integration_registered`.
    pub async fn register(
        &self,
        integration: Integration,
        driver: Arc<dyn ProviderDriver>,
        credentials: &CredentialBundle,
    ) -> Result<(), ConnectorError> {
        {
            let integrations = self.inner.integrations.read().expect("integrations lock poisoned");
            if integrations.contains_key(&integration.id) {
                return Err(ConnectorError::new(
                    ErrorCode::AlreadyExists,
                    format!("integration already registered: {}", integration.id),
                )
                .with_retryable(false));
            }
        }

        tokio::time::timeout(self.inner.config.default_timeout, driver.initialize(&integration.config, credentials))
            .await
            .map_err(|_| ConnectorError::new(ErrorCode::NetworkTimeout, "driver initialization timed out"))??;

        let id = integration.id.clone();
        {
            let mut integrations = self.inner.integrations.write().expect("integrations lock poisoned");
            integrations.insert(id.clone(), Registered { integration, driver });
        }

        if self.inner.config.enable_circuit_breaker {
            self.inner.breakers.get_or_create(&id);
        }

        if !self.inner.config.health_check_interval.is_zero() {
            self.spawn_health_loop(id.clone()).await;
        }

        self.inner.event_bus.publish(Event::new("integration_registered", id, HashMap::new()));
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<Integration> {
        self.inner.integrations.read().expect("integrations lock poisoned").get(id).map(|r| r.integration.clone())
    }

    pub fn by_type(&self, integration_type: IntegrationType) -> Vec<Integration> {
        let integrations = self.inner.integrations.read().expect("integrations lock poisoned");
        let mut matches: Vec<_> = integrations
            .values()
            .filter(|r| r.integration.integration_type == integration_type)
            .map(|r| r.integration.clone())
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        matches
    }

    pub fn all(&self) -> Vec<Integration> {
        let integrations = self.inner.integrations.read().expect("integrations lock poisoned");
        let mut all: Vec<_> = integrations.values().map(|r| r.integration.clone()).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    pub fn register_webhook_handler(&self, id: &str, handler: Arc<dyn WebhookHandler>) {
        self.inner.webhook_handlers.write().expect("webhook handler lock poisoned").insert(id.to_string(), handler);
    }

    /// Dispatches a request: cache lookup, breaker guard, retry executor,
    /// driver call, then metrics/logging/cache population.
    pub async fn execute_request(
        &self,
        id: &str,
        request: IntegrationRequest,
        cancellation: &CancellationToken,
    ) -> Result<IntegrationResponse, ConnectorError> {
        let (driver, provider) = {
            let integrations = self.inner.integrations.read().expect("integrations lock poisoned");
            let registered = integrations.get(id).ok_or_else(|| ConnectorError::not_found(id))?;
            (registered.driver.clone(), registered.integration.provider.clone())
        };

        let cache_key = request.cache_key(id);
        if self.inner.config.enable_caching {
            if let Some(cache) = &self.inner.cache {
                if let Some(cached) = cache.get(&cache_key) {
                    return Ok(cached);
                }
            }
        }

        self.inner.logger.log_request(id, &request);

        let inner = self.inner.clone();
        let id_owned = id.to_string();
        let cancellation = cancellation.clone();

        let result = inner
            .bulkhead
            .execute(|| {
                let inner = inner.clone();
                let driver = driver.clone();
                let request = request.clone();
                let provider = provider.clone();
                let cancellation = cancellation.clone();
                let id_owned = id_owned.clone();
                async move {
                    if inner.config.enable_circuit_breaker {
                        let breaker = inner.breakers.get_or_create(&id_owned);
                        let inner = inner.clone();
                        let driver = driver.clone();
                        let request = request.clone();
                        let provider = provider.clone();
                        let cancellation = cancellation.clone();
                        breaker
                            .execute(move || {
                                let inner = inner.clone();
                                let driver = driver.clone();
                                let request = request.clone();
                                let provider = provider.clone();
                                let cancellation = cancellation.clone();
                                async move {
                                    let retries = request.retries;
                                    inner
                                        .retry
                                        .execute_with_override(&provider, &cancellation, retries, move || {
                                            let driver = driver.clone();
                                            let request = request.clone();
                                            async move { driver.execute_request(&request).await }
                                        })
                                        .await
                                }
                            })
                            .await
                    } else {
                        let retries = request.retries;
                        inner
                            .retry
                            .execute_with_override(&provider, &cancellation, retries, move || {
                                let driver = driver.clone();
                                let request = request.clone();
                                async move { driver.execute_request(&request).await }
                            })
                            .await
                    }
                }
            })
            .await;

        match &result {
            Ok(response) => {
                self.inner.logger.log_response(id, response);
                if self.inner.config.enable_metrics {
                    self.inner.metrics.record_request(id, &request.method, response.duration, true);
                }
                if self.inner.config.enable_caching {
                    if let Some(cache) = &self.inner.cache {
                        cache.set(&cache_key, response.clone(), DEFAULT_RESPONSE_CACHE_TTL);
                    }
                }
                self.record_outcome(id, true);
            }
            Err(err) => {
                self.inner.logger.log_error(id, err);
                if self.inner.config.enable_metrics {
                    self.inner.metrics.record_error(id, err.code);
                }
                self.record_outcome(id, false);
            }
        }
        result
    }

    fn record_outcome(&self, id: &str, success: bool) {
        let mut integrations = self.inner.integrations.write().expect("integrations lock poisoned");
        if let Some(registered) = integrations.get_mut(id) {
            if success {
                registered.integration.metadata.success_count += 1;
            } else {
                registered.integration.metadata.error_count += 1;
            }
            registered.integration.metadata.updated_at = std::time::SystemTime::now();
        }
    }

    /// Validates and processes an inbound webhook through the integration's
    /// registered handler. Validation failures are terminal and distinct
    /// from processing failures.
    pub async fn process_webhook(&self, id: &str, event: WebhookEvent) -> Result<(), ConnectorError> {
        let handler = {
            let handlers = self.inner.webhook_handlers.read().expect("webhook handler lock poisoned");
            handlers.get(id).cloned().ok_or_else(|| ConnectorError::not_found(id))?
        };

        self.inner.logger.log_webhook(id, &event);
        handler.validate(&event.headers, &event.body, &event.signature)?;

        let result = handler.process(&event).await;
        if self.inner.config.enable_metrics {
            self.inner.metrics.record_webhook(id, &event.event_type, result.is_ok());
        }
        result?;

        self.inner.event_bus.publish(Event::new("webhook_processed", id, HashMap::new()));
        Ok(())
    }

    /// Re-initializes the registered driver with `config` under the default
    /// timeout. On failure the previous config remains authoritative and the
    /// driver is left exactly as it was.
    pub async fn update_config(
        &self,
        id: &str,
        config: HashMap<String, String>,
        credentials: &CredentialBundle,
    ) -> Result<(), ConnectorError> {
        let driver = {
            let integrations = self.inner.integrations.read().expect("integrations lock poisoned");
            integrations.get(id).ok_or_else(|| ConnectorError::not_found(id))?.driver.clone()
        };

        tokio::time::timeout(self.inner.config.default_timeout, driver.initialize(&config, credentials))
            .await
            .map_err(|_| ConnectorError::new(ErrorCode::NetworkTimeout, "driver re-initialization timed out"))??;

        let mut integrations = self.inner.integrations.write().expect("integrations lock poisoned");
        if let Some(registered) = integrations.get_mut(id) {
            registered.integration.config = config;
            registered.integration.metadata.updated_at = std::time::SystemTime::now();
        }
        Ok(())
    }

    pub async fn enable(&self, id: &str, credentials: &CredentialBundle) -> Result<(), ConnectorError> {
        let (driver, config) = {
            let integrations = self.inner.integrations.read().expect("integrations lock poisoned");
            let registered = integrations.get(id).ok_or_else(|| ConnectorError::not_found(id))?;
            (registered.driver.clone(), registered.integration.config.clone())
        };
        tokio::time::timeout(self.inner.config.default_timeout, driver.initialize(&config, credentials))
            .await
            .map_err(|_| ConnectorError::new(ErrorCode::NetworkTimeout, "driver re-initialization timed out"))??;

        let mut integrations = self.inner.integrations.write().expect("integrations lock poisoned");
        if let Some(registered) = integrations.get_mut(id) {
            registered.integration.status = IntegrationStatus::Active;
        }
        Ok(())
    }

    pub async fn disable(&self, id: &str) -> Result<(), ConnectorError> {
        let driver = {
            let integrations = self.inner.integrations.read().expect("integrations lock poisoned");
            integrations.get(id).ok_or_else(|| ConnectorError::not_found(id))?.driver.clone()
        };
        driver.close().await?;

        let mut integrations = self.inner.integrations.write().expect("integrations lock poisoned");
        if let Some(registered) = integrations.get_mut(id) {
            registered.integration.status = IntegrationStatus::Inactive;
        }
        Ok(())
    }

    /// Closes every registered driver. Individual close failures are logged
    /// as warnings and do not prevent visiting the rest. Health-check tickers
    /// are aborted; nothing requires them to survive past `close`.
    pub async fn close(&self) {
        let drivers: Vec<(String, Arc<dyn ProviderDriver>)> = {
            let integrations = self.inner.integrations.read().expect("integrations lock poisoned");
            integrations.iter().map(|(id, r)| (id.clone(), r.driver.clone())).collect()
        };
        for (id, driver) in drivers {
            if let Err(err) = driver.close().await {
                self.inner.logger.log_error(&id, &err);
            }
        }
        for (_, handle) in self.inner.health_check_tasks.lock().await.drain() {
            handle.abort();
        }
    }

    async fn spawn_health_loop(&self, id: String) {
        let manager = self.clone();
        let interval = self.inner.config.health_check_interval;
        let task_id = id.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                manager.run_health_check(&task_id).await;
            }
        });
        self.inner.health_check_tasks.lock().await.insert(id, handle);
    }

    async fn run_health_check(&self, id: &str) {
        let driver = {
            let integrations = self.inner.integrations.read().expect("integrations lock poisoned");
            match integrations.get(id) {
                Some(r) => r.driver.clone(),
                None => return,
            }
        };

        let result = tokio::time::timeout(Duration::from_secs(30), driver.health_check()).await;
        let healthy = matches!(result, Ok(Ok(())));

        {
            let mut integrations = self.inner.integrations.write().expect("integrations lock poisoned");
            if let Some(registered) = integrations.get_mut(id) {
                registered.integration.status = if healthy { IntegrationStatus::Active } else { IntegrationStatus::Error };
                registered.integration.metadata.last_health_check = Some(std::time::SystemTime::now());
            }
        }

        self.inner.event_bus.publish(Event::new(
            "health_check_completed",
            id,
            HashMap::from([("healthy".to_string(), healthy.to_string())]),
        ));
    }

    pub fn breaker_state(&self, id: &str) -> Option<CircuitState> {
        self.inner.breakers.get(id).map(|b| b.state())
    }
}
