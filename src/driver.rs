//! Provider driver contract: the uniform lifecycle every driver satisfies,
//! plus the capability surface a caller may additionally dispatch to.
//!
//! The core never reflects on which capabilities a driver implements; it
//! calls the uniform subset only. Capability-specific traits exist so a
//! caller holding a concrete driver type (or a downcast) can invoke them —
//! the Manager never does.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::credential_store::CredentialBundle;
use crate::error::ConnectorError;
use crate::integration::{IntegrationRequest, IntegrationResponse};
use crate::rate_limit::RateLimitWindow;

/// Broad driver family. The Manager does not branch on this; it exists for
/// registry bookkeeping and capability discovery by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Marketplace,
    Payment,
}

/// An optional operation set a driver may advertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverCapability {
    SyncProducts,
    GetOrders,
    CreatePayment,
    Refund,
    Initialize3DSecure,
}

/// The uniform subset every driver satisfies, invoked by the Manager.
#[async_trait]
pub trait ProviderDriver: Send + Sync {
    /// Initialize the driver with its dynamic config map and credentials.
    /// Fails with `ConfigInvalid` when required keys are missing or malformed.
    async fn initialize(
        &self,
        config: &HashMap<String, String>,
        credentials: &CredentialBundle,
    ) -> Result<(), ConnectorError>;

    /// Transient health probe. Failures are expected to be `ProviderError`
    /// and are treated as recoverable by the health loop, not surfaced to
    /// request callers.
    async fn health_check(&self) -> Result<(), ConnectorError>;

    /// Releases any held resources. Idempotent: calling `close` more than
    /// once must not resurface an error already reported by an earlier call.
    async fn close(&self) -> Result<(), ConnectorError>;

    fn capabilities(&self) -> Vec<DriverCapability>;

    fn rate_limit(&self) -> RateLimitWindow;

    /// The uniform request primitive the retry executor calls. Capability
    /// dispatch (syncProducts, createPayment, ...) is the caller's
    /// responsibility; this is the one operation the Manager itself invokes.
    async fn execute_request(&self, request: &IntegrationRequest) -> Result<IntegrationResponse, ConnectorError>;

    fn kind(&self) -> ProviderKind;
}

/// Drivers that can pull order data from a marketplace.
#[async_trait]
pub trait OrderSync: Send + Sync {
    async fn sync_products(&self) -> Result<u64, ConnectorError>;
    async fn get_orders(&self, since: Duration) -> Result<Vec<String>, ConnectorError>;
}

/// Drivers that can move money.
#[async_trait]
pub trait PaymentCapable: Send + Sync {
    async fn create_payment(&self, amount_cents: u64, currency: &str) -> Result<String, ConnectorError>;
    async fn refund(&self, payment_id: &str, amount_cents: u64) -> Result<(), ConnectorError>;
    async fn initialize_3ds(&self, payment_id: &str) -> Result<String, ConnectorError>;
}
