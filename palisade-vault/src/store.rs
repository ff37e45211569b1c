//! External collaborator traits and the record shape the vault encrypts.
//!
//! Production implementations are platform-backed (hardware keystore, SQL
//! record store). The in-memory implementations here back the test suites
//! and headless use.

use crate::{VaultError, VaultResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// Device-local secure storage for small secrets: the two vault salts, the
/// login hash, and the wrapped biometric unlock token.
///
/// Assumed tamper-resistant and unavailable without device unlock. The
/// vault stores nothing else here.
pub trait SecureBlobStore: Send + Sync {
    fn get(&self, name: &str) -> VaultResult<Option<Vec<u8>>>;

    fn put(&self, name: &str, bytes: &[u8]) -> VaultResult<()>;

    fn delete(&self, name: &str) -> VaultResult<()>;

    /// Wraps a secret under a device-bound, user-presence-gated key.
    ///
    /// The default implementation returns the secret unchanged, which is
    /// only acceptable for stores that are themselves access-gated.
    fn wrap_secret(&self, secret: &[u8]) -> VaultResult<Vec<u8>> {
        Ok(secret.to_vec())
    }

    /// Reverses [`wrap_secret`](SecureBlobStore::wrap_secret). Fails when
    /// the wrapping key has been revoked or the token is damaged.
    fn unwrap_secret(&self, token: &[u8]) -> VaultResult<Vec<u8>> {
        Ok(token.to_vec())
    }
}

/// Store of encrypted records. `secret` and `details` travel through this
/// trait as opaque storage strings; the store never sees plaintext.
pub trait RecordStore: Send + Sync {
    /// Lists records. Rotation passes `true, true`: every persisted
    /// sensitive field must be covered, not just the visible set.
    fn list_all(
        &self,
        include_deleted: bool,
        include_archived: bool,
    ) -> VaultResult<Vec<VaultRecord>>;

    /// Persists an updated record. Each update is independently durable.
    fn update(&self, record: &VaultRecord) -> VaultResult<()>;
}

/// A stored credential record.
///
/// `service` and `username` are plaintext identifying fields. `secret` and
/// `details` are storage strings in the `base64(nonce):base64(ciphertext)`
/// format, or empty when unset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VaultRecord {
    pub id: Uuid,
    pub service: String,
    pub username: String,
    /// Encrypted password field.
    pub secret: String,
    /// Encrypted JSON blob of structured sensitive fields.
    pub details: String,
    pub archived: bool,
    pub deleted: bool,
}

impl VaultRecord {
    pub fn new(service: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            service: service.into(),
            username: username.into(),
            secret: String::new(),
            details: String::new(),
            archived: false,
            deleted: false,
        }
    }
}

/// Structured sensitive payload stored encrypted in [`VaultRecord::details`].
///
/// Serialized to JSON before passing through the field codec — the
/// encryption layer is agnostic to the shape.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SensitiveDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_expiry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl SensitiveDetails {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// ============================================================================
// In-memory implementations
// ============================================================================

/// In-memory [`SecureBlobStore`] for tests and headless use.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecureBlobStore for MemoryBlobStore {
    fn get(&self, name: &str) -> VaultResult<Option<Vec<u8>>> {
        let blobs = self
            .blobs
            .lock()
            .map_err(|e| VaultError::Storage(e.to_string()))?;
        Ok(blobs.get(name).cloned())
    }

    fn put(&self, name: &str, bytes: &[u8]) -> VaultResult<()> {
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|e| VaultError::Storage(e.to_string()))?;
        blobs.insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn delete(&self, name: &str) -> VaultResult<()> {
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|e| VaultError::Storage(e.to_string()))?;
        blobs.remove(name);
        Ok(())
    }
}

/// In-memory [`RecordStore`] for tests.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: Mutex<Vec<VaultRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: VaultRecord) {
        self.records.lock().unwrap().push(record);
    }

    pub fn get(&self, id: Uuid) -> Option<VaultRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordStore for MemoryRecordStore {
    fn list_all(
        &self,
        include_deleted: bool,
        include_archived: bool,
    ) -> VaultResult<Vec<VaultRecord>> {
        let records = self
            .records
            .lock()
            .map_err(|e| VaultError::Storage(e.to_string()))?;
        Ok(records
            .iter()
            .filter(|r| (include_deleted || !r.deleted) && (include_archived || !r.archived))
            .cloned()
            .collect())
    }

    fn update(&self, record: &VaultRecord) -> VaultResult<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|e| VaultError::Storage(e.to_string()))?;
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(VaultError::Storage(format!(
                "record not found: {}",
                record.id
            ))),
        }
    }
}
