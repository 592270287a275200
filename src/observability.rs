//! Logging, metrics, and event-bus collaborator contracts.
//!
//! The core never assumes a particular sink: it depends on these traits and
//! ships a `tracing`-backed logger and an in-memory metrics/event-bus pair
//! suitable for single-process deployments and tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use tracing::{error, info, warn};

use crate::error::{ConnectorError, ErrorCode};
use crate::integration::{IntegrationRequest, IntegrationResponse};
use crate::webhook::WebhookEvent;

pub trait Logger: Send + Sync {
    fn log_request(&self, integration_id: &str, request: &IntegrationRequest);
    fn log_response(&self, integration_id: &str, response: &IntegrationResponse);
    fn log_error(&self, integration_id: &str, err: &ConnectorError);
    fn log_webhook(&self, integration_id: &str, event: &WebhookEvent);
}

/// Logs through `tracing`, structured at the integration id.
#[derive(Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log_request(&self, integration_id: &str, request: &IntegrationRequest) {
        info!(integration_id, method = %request.method, endpoint = %request.endpoint, "outbound request");
    }

    fn log_response(&self, integration_id: &str, response: &IntegrationResponse) {
        info!(integration_id, status_code = response.status_code, duration_ms = response.duration.as_millis() as u64, "response received");
    }

    fn log_error(&self, integration_id: &str, err: &ConnectorError) {
        error!(integration_id, code = %err.code, retryable = err.retryable, "request failed: {}", err.message);
    }

    fn log_webhook(&self, integration_id: &str, event: &WebhookEvent) {
        warn!(integration_id, event_type = %event.event_type, "webhook received");
    }
}

/// Read-only per-integration metrics snapshot.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub successes: u64,
    pub errors_by_code: HashMap<ErrorCode, u64>,
    pub webhooks_received: u64,
    pub webhooks_succeeded: u64,
}

pub trait Metrics: Send + Sync {
    fn record_request(&self, integration_id: &str, method: &str, duration: Duration, success: bool);
    fn record_error(&self, integration_id: &str, code: ErrorCode);
    fn record_webhook(&self, integration_id: &str, event_type: &str, success: bool);
    fn get_metrics(&self, integration_id: &str) -> MetricsSnapshot;
}

#[derive(Default)]
pub struct InMemoryMetrics {
    by_integration: Mutex<HashMap<String, MetricsSnapshot>>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Metrics for InMemoryMetrics {
    fn record_request(&self, integration_id: &str, _method: &str, _duration: Duration, success: bool) {
        let mut by_integration = self.by_integration.lock().expect("metrics mutex poisoned");
        let snapshot = by_integration.entry(integration_id.to_string()).or_default();
        snapshot.requests += 1;
        if success {
            snapshot.successes += 1;
        }
    }

    fn record_error(&self, integration_id: &str, code: ErrorCode) {
        let mut by_integration = self.by_integration.lock().expect("metrics mutex poisoned");
        let snapshot = by_integration.entry(integration_id.to_string()).or_default();
        *snapshot.errors_by_code.entry(code).or_insert(0) += 1;
    }

    fn record_webhook(&self, integration_id: &str, _event_type: &str, success: bool) {
        let mut by_integration = self.by_integration.lock().expect("metrics mutex poisoned");
        let snapshot = by_integration.entry(integration_id.to_string()).or_default();
        snapshot.webhooks_received += 1;
        if success {
            snapshot.webhooks_succeeded += 1;
        }
    }

    fn get_metrics(&self, integration_id: &str) -> MetricsSnapshot {
        self.by_integration.lock().expect("metrics mutex poisoned").get(integration_id).cloned().unwrap_or_default()
    }
}

/// Lifecycle and health event published by the Manager.
#[derive(Debug, Clone)]
pub struct Event {
    pub id: String,
    pub event_type: String,
    pub integration_id: String,
    pub timestamp: SystemTime,
    pub data: HashMap<String, String>,
}

impl Event {
    pub fn new(event_type: impl Into<String>, integration_id: impl Into<String>, data: HashMap<String, String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event_type: event_type.into(),
            integration_id: integration_id.into(),
            timestamp: SystemTime::now(),
            data,
        }
    }
}

pub trait EventBus: Send + Sync {
    fn publish(&self, event: Event);
}

/// Retains published events in memory, for tests and lightweight deployments.
#[derive(Default)]
pub struct InMemoryEventBus {
    events: Mutex<Vec<Event>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().expect("event bus mutex poisoned").clone()
    }
}

impl EventBus for InMemoryEventBus {
    fn publish(&self, event: Event) {
        self.events.lock().expect("event bus mutex poisoned").push(event);
    }
}
