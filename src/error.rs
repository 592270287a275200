//! Error taxonomy for the integration runtime.
//!
//! Every error that crosses a public boundary is a [`ConnectorError`]: a tagged
//! value carrying a stable [`ErrorCode`], an explicit `retryable` flag decided
//! once at creation, and optional provider/status/context for diagnostics. The
//! retry executor treats `retryable` as authoritative and never re-derives it.

use std::fmt;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

/// Stable error codes recognized by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    AuthenticationFailed,
    InvalidCredentials,
    AccessDenied,
    ValidationFailed,
    InvalidInput,
    MappingError,
    ConfigInvalid,
    NetworkTimeout,
    ConnectionFailed,
    ServiceUnavailable,
    TooManyRequests,
    RateLimitExceeded,
    ApiError,
    ProviderError,
    ParseError,
    InternalError,
    CircuitOpen,
    NotFound,
    AlreadyExists,
    WebhookInvalid,
    DecryptError,
    EncryptError,
    StoreError,
}

impl ErrorCode {
    /// Codes considered retryable by the generic network-keyword heuristic, used
    /// when neither an explicit flag nor a configured allow/deny list decides it.
    pub fn heuristically_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::NetworkTimeout
                | ErrorCode::ConnectionFailed
                | ErrorCode::ServiceUnavailable
                | ErrorCode::TooManyRequests
                | ErrorCode::RateLimitExceeded
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::AuthenticationFailed => "AuthenticationFailed",
            ErrorCode::InvalidCredentials => "InvalidCredentials",
            ErrorCode::AccessDenied => "AccessDenied",
            ErrorCode::ValidationFailed => "ValidationFailed",
            ErrorCode::InvalidInput => "InvalidInput",
            ErrorCode::MappingError => "MappingError",
            ErrorCode::ConfigInvalid => "ConfigInvalid",
            ErrorCode::NetworkTimeout => "NetworkTimeout",
            ErrorCode::ConnectionFailed => "ConnectionFailed",
            ErrorCode::ServiceUnavailable => "ServiceUnavailable",
            ErrorCode::TooManyRequests => "TooManyRequests",
            ErrorCode::RateLimitExceeded => "RateLimitExceeded",
            ErrorCode::ApiError => "APIError",
            ErrorCode::ProviderError => "ProviderError",
            ErrorCode::ParseError => "ParseError",
            ErrorCode::InternalError => "InternalError",
            ErrorCode::CircuitOpen => "CircuitOpen",
            ErrorCode::NotFound => "NotFound",
            ErrorCode::AlreadyExists => "AlreadyExists",
            ErrorCode::WebhookInvalid => "WebhookInvalid",
            ErrorCode::DecryptError => "DecryptError",
            ErrorCode::EncryptError => "EncryptError",
            ErrorCode::StoreError => "StoreError",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A typed, classified error. Construction decides `retryable` once; nothing
/// downstream reclassifies it.
#[derive(Debug, Clone)]
pub struct ConnectorError {
    pub code: ErrorCode,
    pub message: String,
    pub provider: Option<String>,
    pub retryable: bool,
    pub timestamp: SystemTime,
    pub status_code: Option<u16>,
    pub context: Option<String>,
}

impl ConnectorError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        let retryable = code.heuristically_retryable();
        Self {
            code,
            message: message.into(),
            provider: None,
            retryable,
            timestamp: SystemTime::now(),
            status_code: None,
            context: None,
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, format!("integration not found: {}", id.into()))
            .with_retryable(false)
    }

    pub fn circuit_open(open_duration: Duration, failure_count: usize) -> Self {
        Self::new(
            ErrorCode::CircuitOpen,
            format!("circuit open for {:?} ({} recorded failures)", open_duration, failure_count),
        )
        .with_retryable(false)
    }

    pub fn webhook_invalid(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::WebhookInvalid, reason).with_retryable(false)
    }

    pub fn config_invalid(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigInvalid, reason).with_retryable(false)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorCode::InternalError, "operation cancelled").with_retryable(false)
    }
}

impl fmt::Display for ConnectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.provider, self.status_code) {
            (Some(p), Some(s)) => write!(f, "[{}] {} (provider={p}, status={s})", self.code, self.message),
            (Some(p), None) => write!(f, "[{}] {} (provider={p})", self.code, self.message),
            (None, Some(s)) => write!(f, "[{}] {} (status={s})", self.code, self.message),
            (None, None) => write!(f, "[{}] {}", self.code, self.message),
        }
    }
}

impl std::error::Error for ConnectorError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_retryable_codes_default_retryable() {
        let err = ConnectorError::new(ErrorCode::NetworkTimeout, "timed out");
        assert!(err.retryable);
    }

    #[test]
    fn non_heuristic_codes_default_non_retryable() {
        let err = ConnectorError::new(ErrorCode::AuthenticationFailed, "bad key");
        assert!(!err.retryable);
    }

    #[test]
    fn explicit_retryable_overrides_default() {
        let err = ConnectorError::new(ErrorCode::ApiError, "weird").with_retryable(true);
        assert!(err.retryable);
    }

    #[test]
    fn display_includes_code_and_provider() {
        let err = ConnectorError::new(ErrorCode::ProviderError, "boom").with_provider("stripe");
        let msg = err.to_string();
        assert!(msg.contains("ProviderError"));
        assert!(msg.contains("stripe"));
    }

    #[test]
    fn circuit_open_is_not_retryable() {
        let err = ConnectorError::circuit_open(Duration::from_secs(5), 3);
        assert!(!err.retryable);
        assert_eq!(err.code, ErrorCode::CircuitOpen);
    }
}
