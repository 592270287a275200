//! Webhook intake: signature verification and per-provider event dispatch.
//!
//! At most one handler per integration. Validation failures are terminal and
//! reported distinctly from processing failures so callers and metrics can
//! tell "this request was never trusted" from "we trusted it and acting on
//! it failed".

use std::collections::HashMap;
use std::time::SystemTime;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::ConnectorError;

/// A raw inbound event, pre-validation.
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub id: String,
    pub event_type: String,
    pub provider: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub signature: Vec<u8>,
    pub timestamp: SystemTime,
}

/// Per-integration webhook contract. Signature algorithms are the handler's
/// concern; the core only requires the headers map and raw signature bytes.
#[async_trait]
pub trait WebhookHandler: Send + Sync {
    fn validate(&self, headers: &HashMap<String, String>, body: &[u8], signature: &[u8]) -> Result<(), ConnectorError>;
    async fn process(&self, event: &WebhookEvent) -> Result<(), ConnectorError>;
}

/// Default handler: HMAC-SHA256 over the raw body, compared against a
/// base64-decoded signature header value.
pub struct HmacSha256Handler<F> {
    secret: Vec<u8>,
    on_process: F,
}

impl<F> HmacSha256Handler<F>
where
    F: Fn(&WebhookEvent) -> Result<(), ConnectorError> + Send + Sync,
{
    pub fn new(secret: impl Into<Vec<u8>>, on_process: F) -> Self {
        Self { secret: secret.into(), on_process }
    }

    /// Compute the expected base64-encoded HMAC-SHA256 tag for `body`.
    pub fn sign(&self, body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.secret).expect("HMAC accepts keys of any length");
        mac.update(body);
        BASE64.encode(mac.finalize().into_bytes())
    }
}

#[async_trait]
impl<F> WebhookHandler for HmacSha256Handler<F>
where
    F: Fn(&WebhookEvent) -> Result<(), ConnectorError> + Send + Sync,
{
    fn validate(&self, _headers: &HashMap<String, String>, body: &[u8], signature: &[u8]) -> Result<(), ConnectorError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.secret)
            .map_err(|e| ConnectorError::webhook_invalid(format!("invalid signing key: {e}")))?;
        mac.update(body);
        mac.verify_slice(signature).map_err(|_| ConnectorError::webhook_invalid("signature mismatch"))
    }

    async fn process(&self, event: &WebhookEvent) -> Result<(), ConnectorError> {
        (self.on_process)(event)
    }
}
