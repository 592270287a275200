//! Typed field validation for driver config maps and credential bundles.
//!
//! Drivers declare the shape they require; the core never inspects their
//! config beyond running it through the rules they hand back.

use std::collections::HashMap;

use crate::credential_store::CredentialBundle;
use crate::error::ConnectorError;

/// A single constraint on one config key.
pub enum FieldRule {
    Required(&'static str),
    NonEmpty(&'static str),
    OneOf(&'static str, &'static [&'static str]),
}

/// Validates a driver's dynamic config map against a declared rule set.
/// Returns a `ConfigInvalid` error naming the first violated rule.
pub fn validate_config(config: &HashMap<String, String>, rules: &[FieldRule]) -> Result<(), ConnectorError> {
    for rule in rules {
        match rule {
            FieldRule::Required(key) => {
                if !config.contains_key(*key) {
                    return Err(ConnectorError::config_invalid(format!("missing required config key: {key}")));
                }
            }
            FieldRule::NonEmpty(key) => match config.get(*key) {
                Some(value) if !value.trim().is_empty() => {}
                _ => return Err(ConnectorError::config_invalid(format!("config key must be non-empty: {key}"))),
            },
            FieldRule::OneOf(key, allowed) => match config.get(*key) {
                Some(value) if allowed.contains(&value.as_str()) => {}
                _ => {
                    return Err(ConnectorError::config_invalid(format!(
                        "config key {key} must be one of {allowed:?}"
                    )))
                }
            },
        }
    }
    Ok(())
}

/// Credential bundles must carry at least one recognized, non-empty field.
pub const RECOGNIZED_CREDENTIAL_FIELDS: &[&str] =
    &["apiKey", "apiSecret", "accessToken", "refreshToken", "clientId", "clientSecret", "sellerId"];

pub fn validate_credential_bundle(bundle: &CredentialBundle) -> Result<(), ConnectorError> {
    let has_recognized_field = bundle
        .fields
        .iter()
        .any(|(key, value)| RECOGNIZED_CREDENTIAL_FIELDS.contains(&key.as_str()) && !value.is_empty());
    if !has_recognized_field && bundle.fields.values().all(|v| v.is_empty()) {
        return Err(ConnectorError::config_invalid("credential bundle has no non-empty fields"));
    }
    Ok(())
}
