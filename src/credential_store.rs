//! Encrypted credential storage with a TTL read cache.
//!
//! Credentials are sealed with AES-256-GCM before they ever reach the backing
//! store. The wire format is `nonce(12) || ciphertext`, base64-encoded for
//! persistence — the same layout used elsewhere in this codebase's ecosystem
//! for at-rest secret sealing.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use crate::clock::{Clock, MonotonicClock};
use crate::error::{ConnectorError, ErrorCode};
use crate::validation::validate_credential_bundle;

/// 32-byte symmetric key used to seal and open credential bundles.
#[derive(Clone)]
pub struct EncryptionKey([u8; 32]);

impl EncryptionKey {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// Opaque secret material for a single provider integration (API keys,
/// OAuth tokens, webhook secrets, ...), addressed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialBundle {
    pub fields: HashMap<String, String>,
}

impl CredentialBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct CredentialRecord {
    pub id: String,
    pub provider: String,
    pub sealed: String,
    pub created_at: SystemTime,
    pub rotated_at: Option<SystemTime>,
}

fn seal(key: &EncryptionKey, plaintext: &str) -> Result<String, ConnectorError> {
    let cipher = Aes256Gcm::new_from_slice(&key.0)
        .map_err(|e| ConnectorError::new(ErrorCode::EncryptError, format!("invalid key: {e}")))?;
    let mut nonce_bytes = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|e| ConnectorError::new(ErrorCode::EncryptError, format!("AES-256-GCM encryption failed: {e}")))?;

    let mut packed = Vec::with_capacity(12 + ciphertext.len());
    packed.extend_from_slice(&nonce_bytes);
    packed.extend_from_slice(&ciphertext);
    Ok(BASE64.encode(packed))
}

fn open(key: &EncryptionKey, sealed: &str) -> Result<String, ConnectorError> {
    let cipher = Aes256Gcm::new_from_slice(&key.0)
        .map_err(|e| ConnectorError::new(ErrorCode::DecryptError, format!("invalid key: {e}")))?;
    let packed = BASE64
        .decode(sealed)
        .map_err(|e| ConnectorError::new(ErrorCode::DecryptError, format!("invalid base64: {e}")))?;
    if packed.len() < 12 {
        return Err(ConnectorError::new(ErrorCode::DecryptError, "sealed credential shorter than nonce"));
    }
    let (nonce_bytes, ciphertext) = packed.split_at(12);
    let nonce = Nonce::from_slice(nonce_bytes);
    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| ConnectorError::new(ErrorCode::DecryptError, "AES-256-GCM decryption failed"))?;
    String::from_utf8(plaintext)
        .map_err(|e| ConnectorError::new(ErrorCode::DecryptError, format!("decrypted payload is not utf-8: {e}")))
}

/// Backing key-value store for sealed credential records. An in-memory
/// implementation is provided; production deployments back this with a
/// durable store.
pub trait CredentialBackingStore: Send + Sync {
    fn get(&self, id: &str) -> Option<CredentialRecord>;
    fn put(&self, record: CredentialRecord);
    fn remove(&self, id: &str);
    fn list(&self) -> Vec<String>;
}

#[derive(Default)]
pub struct InMemoryCredentialStore {
    records: Mutex<HashMap<String, CredentialRecord>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialBackingStore for InMemoryCredentialStore {
    fn get(&self, id: &str) -> Option<CredentialRecord> {
        self.records.lock().expect("credential store mutex poisoned").get(id).cloned()
    }

    fn put(&self, record: CredentialRecord) {
        self.records.lock().expect("credential store mutex poisoned").insert(record.id.clone(), record);
    }

    fn remove(&self, id: &str) {
        self.records.lock().expect("credential store mutex poisoned").remove(id);
    }

    fn list(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.records.lock().expect("credential store mutex poisoned").keys().cloned().collect();
        ids.sort();
        ids
    }
}

struct CacheEntry {
    bundle: CredentialBundle,
    inserted_at_millis: u64,
}

/// Encrypts credential bundles at rest and layers a TTL read cache over the
/// backing store so repeated `get` calls for the same integration don't pay
/// the decryption cost on every request.
pub struct CredentialVault {
    key: EncryptionKey,
    store: Arc<dyn CredentialBackingStore>,
    cache: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl CredentialVault {
    pub fn new(key: EncryptionKey, store: Arc<dyn CredentialBackingStore>, ttl: Duration) -> Self {
        Self { key, store, cache: Mutex::new(HashMap::new()), ttl, clock: Arc::new(MonotonicClock::default()) }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn store_credentials(
        &self,
        id: &str,
        provider: &str,
        bundle: CredentialBundle,
    ) -> Result<(), ConnectorError> {
        validate_credential_bundle(&bundle)?;
        let plaintext = serde_json::to_string(&bundle.fields)
            .map_err(|e| ConnectorError::new(ErrorCode::EncryptError, e.to_string()))?;
        let sealed = seal(&self.key, &plaintext)?;
        self.store.put(CredentialRecord {
            id: id.to_string(),
            provider: provider.to_string(),
            sealed,
            created_at: SystemTime::now(),
            rotated_at: None,
        });
        self.invalidate(id);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<CredentialBundle, ConnectorError> {
        if let Some(bundle) = self.cached(id) {
            return Ok(bundle);
        }
        let record = self.store.get(id).ok_or_else(|| ConnectorError::not_found(id))?;
        let plaintext = open(&self.key, &record.sealed)?;
        let fields: HashMap<String, String> = serde_json::from_str(&plaintext)
            .map_err(|e| ConnectorError::new(ErrorCode::DecryptError, e.to_string()))?;
        let bundle = CredentialBundle { fields };
        self.insert_cache(id, bundle.clone());
        Ok(bundle)
    }

    /// Rotate a credential: fetch the current record for audit metadata, then
    /// overwrite with `new_bundle`, stamping `rotated_at`.
    pub fn rotate(&self, id: &str, provider: &str, new_bundle: CredentialBundle) -> Result<(), ConnectorError> {
        validate_credential_bundle(&new_bundle)?;
        let existing = self.store.get(id);
        let created_at = existing.map(|r| r.created_at).unwrap_or_else(SystemTime::now);

        let plaintext = serde_json::to_string(&new_bundle.fields)
            .map_err(|e| ConnectorError::new(ErrorCode::EncryptError, e.to_string()))?;
        let sealed = seal(&self.key, &plaintext)?;
        self.store.put(CredentialRecord {
            id: id.to_string(),
            provider: provider.to_string(),
            sealed,
            created_at,
            rotated_at: Some(SystemTime::now()),
        });
        self.invalidate(id);
        Ok(())
    }

    pub fn remove(&self, id: &str) {
        self.store.remove(id);
        self.invalidate(id);
    }

    pub fn list(&self) -> Vec<String> {
        self.store.list()
    }

    pub fn clear_cache(&self) {
        self.cache.lock().expect("credential cache mutex poisoned").clear();
    }

    fn cached(&self, id: &str) -> Option<CredentialBundle> {
        let cache = self.cache.lock().expect("credential cache mutex poisoned");
        let entry = cache.get(id)?;
        let now = self.clock.now_millis();
        if now.saturating_sub(entry.inserted_at_millis) < self.ttl.as_millis() as u64 {
            Some(entry.bundle.clone())
        } else {
            None
        }
    }

    fn insert_cache(&self, id: &str, bundle: CredentialBundle) {
        let mut cache = self.cache.lock().expect("credential cache mutex poisoned");
        cache.insert(id.to_string(), CacheEntry { bundle, inserted_at_millis: self.clock.now_millis() });
    }

    fn invalidate(&self, id: &str) {
        self.cache.lock().expect("credential cache mutex poisoned").remove(id);
    }
}
