//! Vault sessions.
//!
//! A vault is open exactly when an [`UnlockedVault`] value exists — there is
//! no global handle and no nullable key. Crypto operations live on the
//! unlocked session only, so a locked vault cannot express them.

use crate::master_key::MasterKeyManager;
use crate::store::SensitiveDetails;
use crate::{VaultError, VaultResult};
use palisade_crypto::DerivedKey;
use std::sync::Arc;

/// An unlocked vault session holding the derived database key.
///
/// Dropping (or [`close`](Self::close)-ing) the session zeroizes the key.
/// The session is stamped with the manager's key epoch at open; once a
/// rotation commits a new password, every older session's crypto operations
/// fail with [`VaultError::SessionStale`] rather than writing old-key data
/// into a store that has moved on.
pub struct UnlockedVault {
    manager: Arc<MasterKeyManager>,
    key: DerivedKey,
    epoch: u64,
}

/// Verifies the password and derives the database key. The single entry
/// point from locked to unlocked.
pub fn open_vault(
    manager: Arc<MasterKeyManager>,
    password: &str,
) -> VaultResult<UnlockedVault> {
    if !manager.is_master_password_set() {
        return Err(VaultError::NotInitialized);
    }
    if !manager.verify_master_password(password)? {
        return Err(VaultError::InvalidCredential);
    }
    let key = manager.database_key(password)?;
    Ok(UnlockedVault::from_parts(manager, key))
}

/// Opens the vault via the stored biometric unlock token. The unwrapped
/// password goes through the same verification path as a typed one.
pub fn open_vault_with_token(manager: Arc<MasterKeyManager>) -> VaultResult<UnlockedVault> {
    let password = manager.unlock_with_token()?;
    open_vault(manager, &password)
}

impl UnlockedVault {
    pub(crate) fn from_parts(manager: Arc<MasterKeyManager>, key: DerivedKey) -> Self {
        let epoch = manager.key_epoch();
        Self { manager, key, epoch }
    }

    pub(crate) fn key(&self) -> &DerivedKey {
        &self.key
    }

    pub fn manager(&self) -> &Arc<MasterKeyManager> {
        &self.manager
    }

    /// Encrypts a field value into its storage-string form.
    pub fn encrypt_field(&self, plaintext: &str) -> VaultResult<String> {
        self.ensure_current()?;
        Ok(palisade_crypto::encrypt_field(&self.key, plaintext)?)
    }

    /// Decrypts a storage string; strict errors per the field codec.
    pub fn decrypt_field(&self, stored: &str) -> VaultResult<String> {
        self.ensure_current()?;
        Ok(palisade_crypto::decrypt_field(&self.key, stored)?)
    }

    /// Lossy decrypt for list rendering: failures read as empty. A rotation
    /// in flight, or a stale session key, also reads as empty, keeping the
    /// lossy contract total.
    pub fn decrypt_field_lossy(&self, stored: &str) -> String {
        if self.ensure_current().is_err() {
            return String::new();
        }
        palisade_crypto::decrypt_field_lossy(&self.key, stored)
    }

    /// Serializes structured sensitive fields to JSON and encrypts them.
    /// An empty payload encrypts to the empty storage string.
    pub fn encrypt_details(&self, details: &SensitiveDetails) -> VaultResult<String> {
        if details.is_empty() {
            return Ok(String::new());
        }
        let json = serde_json::to_string(details)
            .map_err(|e| VaultError::Storage(e.to_string()))?;
        self.encrypt_field(&json)
    }

    /// Decrypts and deserializes structured sensitive fields.
    pub fn decrypt_details(&self, stored: &str) -> VaultResult<SensitiveDetails> {
        let json = self.decrypt_field(stored)?;
        if json.is_empty() {
            return Ok(SensitiveDetails::default());
        }
        serde_json::from_str(&json)
            .map_err(|e| VaultError::Storage(format!("details payload: {e}")))
    }

    /// Consumes the session. The key is zeroized on drop.
    pub fn close(self) {}

    /// A session may touch record data only while no rotation is in flight
    /// and its key matches the current epoch.
    fn ensure_current(&self) -> VaultResult<()> {
        if self.manager.rotation_in_flight() {
            return Err(VaultError::RotationInProgress);
        }
        if self.epoch != self.manager.key_epoch() {
            return Err(VaultError::SessionStale);
        }
        Ok(())
    }
}
