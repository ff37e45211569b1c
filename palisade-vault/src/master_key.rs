//! Master-key lifecycle: login-hash persistence, database-key derivation,
//! and biometric unlock tokens.
//!
//! Two salts live in the secure blob store and are never interchanged:
//! the password-hash salt (fast profile, login checks only) and the
//! database-key salt (slow profile, actual encryption). The database salt
//! is generated once on first use and persists for the life of the install.

use crate::store::SecureBlobStore;
use crate::{VaultError, VaultResult};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use palisade_crypto::{derive_key, DerivedKey, KdfProfile, Salt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Blob names in the secure store. Fixed: part of the on-device format.
const BLOB_PASSWORD_HASH: &str = "password_hash";
const BLOB_PASSWORD_SALT: &str = "password_salt";
const BLOB_DATABASE_SALT: &str = "database_salt";
const BLOB_UNLOCK_TOKEN: &str = "unlock_token";

/// Iteration profiles used by a manager.
///
/// Defaults to the production profiles; tests construct faster ones. The
/// two profiles must differ — a shared profile would let the persisted
/// login hash double as the encryption key.
#[derive(Clone, Copy, Debug)]
pub struct KdfConfig {
    pub verification: KdfProfile,
    pub encryption: KdfProfile,
}

impl Default for KdfConfig {
    fn default() -> Self {
        Self {
            verification: KdfProfile::VERIFICATION,
            encryption: KdfProfile::ENCRYPTION,
        }
    }
}

/// Owns the vault's long-lived key material.
///
/// Lifecycle: `Uninitialized` (no stored hash) → initialized via
/// [`set_master_password`](Self::set_master_password) → unlocked by
/// [`open_vault`](crate::open_vault), which returns the session value
/// holding the derived database key.
pub struct MasterKeyManager {
    store: Arc<dyn SecureBlobStore>,
    config: KdfConfig,
    rotation_guard: Mutex<()>,
    salt_init: Mutex<()>,
    // Bumped every time the stored password (and thus the database key)
    // changes; sessions carry the epoch they were opened under.
    key_epoch: AtomicU64,
}

impl MasterKeyManager {
    pub fn new(store: Arc<dyn SecureBlobStore>) -> Self {
        Self::with_config(store, KdfConfig::default())
    }

    pub fn with_config(store: Arc<dyn SecureBlobStore>, config: KdfConfig) -> Self {
        Self {
            store,
            config,
            rotation_guard: Mutex::new(()),
            salt_init: Mutex::new(()),
            key_epoch: AtomicU64::new(0),
        }
    }

    /// Whether a master password has ever been set.
    pub fn is_master_password_set(&self) -> bool {
        matches!(self.store.get(BLOB_PASSWORD_HASH), Ok(Some(_)))
    }

    /// Sets the master password for a fresh vault.
    ///
    /// Generates a new salt, persists `{hash, salt}`. Fails with
    /// [`VaultError::AlreadyInitialized`] if a password is already set;
    /// changing an existing password goes through rotation instead.
    pub fn set_master_password(&self, password: &str) -> VaultResult<()> {
        if self.is_master_password_set() {
            return Err(VaultError::AlreadyInitialized);
        }
        self.replace_master_password(password)
    }

    /// Overwrites the stored hash and salt. Only rotation (after verifying
    /// the old password) and initial setup may call this.
    pub(crate) fn replace_master_password(&self, password: &str) -> VaultResult<()> {
        let salt = Salt::random();
        let hash = self.password_hash(password, &salt);
        self.store.put(BLOB_PASSWORD_SALT, salt.as_bytes())?;
        self.store.put(BLOB_PASSWORD_HASH, hash.as_bytes())?;
        // Sessions opened under the previous password are now stale.
        self.key_epoch.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Recomputes the stored hash with the stored salt and compares.
    ///
    /// Missing hash or salt yields `Ok(false)`, never an error — a
    /// structurally broken store must read as "wrong password", not crash
    /// the login path.
    pub fn verify_master_password(&self, password: &str) -> VaultResult<bool> {
        let (Some(stored_hash), Some(salt_bytes)) = (
            self.store.get(BLOB_PASSWORD_HASH)?,
            self.store.get(BLOB_PASSWORD_SALT)?,
        ) else {
            return Ok(false);
        };
        let Ok(salt) = Salt::from_slice(&salt_bytes) else {
            return Ok(false);
        };

        let computed = self.password_hash(password, &salt);
        Ok(computed.as_bytes() == stored_hash.as_slice())
    }

    /// Derives the database key (slow profile) for an unlocked session.
    ///
    /// Uses the device-local database salt — generated once on first use,
    /// distinct from the password-hash salt by construction.
    pub fn database_key(&self, password: &str) -> VaultResult<DerivedKey> {
        let salt = self.database_salt()?;
        Ok(derive_key(password, &salt, self.config.encryption))
    }

    fn database_salt(&self) -> VaultResult<Salt> {
        if let Some(bytes) = self.store.get(BLOB_DATABASE_SALT)? {
            return Ok(Salt::from_slice(&bytes)?);
        }
        // First use: serialize creation so two concurrent unlocks cannot
        // each persist their own salt and derive divergent database keys.
        let _init = self.salt_init.lock().map_err(|_| {
            VaultError::Storage("database salt initialization lock poisoned".into())
        })?;
        if let Some(bytes) = self.store.get(BLOB_DATABASE_SALT)? {
            return Ok(Salt::from_slice(&bytes)?);
        }
        let salt = Salt::random();
        self.store.put(BLOB_DATABASE_SALT, salt.as_bytes())?;
        Ok(salt)
    }

    /// The stored password hash: base64 of the fast-profile derivation.
    fn password_hash(&self, password: &str, salt: &Salt) -> String {
        let key = derive_key(password, salt, self.config.verification);
        BASE64.encode(key.as_bytes())
    }

    // ------------------------------------------------------------------
    // Biometric unlock token
    // ------------------------------------------------------------------

    /// Stores the master password wrapped by the platform store's
    /// user-presence-gated key, enabling biometric unlock.
    pub fn store_unlock_token(&self, password: &str) -> VaultResult<()> {
        let token = self.store.wrap_secret(password.as_bytes())?;
        self.store.put(BLOB_UNLOCK_TOKEN, &token)
    }

    pub fn has_unlock_token(&self) -> bool {
        matches!(self.store.get(BLOB_UNLOCK_TOKEN), Ok(Some(_)))
    }

    pub fn clear_unlock_token(&self) -> VaultResult<()> {
        self.store.delete(BLOB_UNLOCK_TOKEN)
    }

    /// Recovers the master password from the stored unlock token.
    ///
    /// Any unwrap failure (revoked wrapping key, hardware error, damaged
    /// token) clears the stored token and reports
    /// [`VaultError::UnlockTokenInvalid`], forcing password re-entry —
    /// never a silent unauthenticated state.
    pub fn unlock_with_token(&self) -> VaultResult<String> {
        let Some(token) = self.store.get(BLOB_UNLOCK_TOKEN)? else {
            return Err(VaultError::UnlockTokenInvalid);
        };

        let unwrapped = self
            .store
            .unwrap_secret(&token)
            .and_then(|bytes| {
                String::from_utf8(bytes).map_err(|_| VaultError::UnlockTokenInvalid)
            });

        match unwrapped {
            Ok(password) => Ok(password),
            Err(_) => {
                let _ = self.store.delete(BLOB_UNLOCK_TOKEN);
                Err(VaultError::UnlockTokenInvalid)
            }
        }
    }

    /// Whether a rotation currently holds the exclusive guard. Repositories
    /// check this before encrypt/decrypt calls made outside the rotation.
    pub fn rotation_in_flight(&self) -> bool {
        self.rotation_guard.try_lock().is_err()
    }

    /// Current key epoch. A session whose stamped epoch is older was opened
    /// under a password that has since been replaced.
    pub(crate) fn key_epoch(&self) -> u64 {
        self.key_epoch.load(Ordering::SeqCst)
    }

    pub(crate) fn try_begin_rotation(&self) -> VaultResult<MutexGuard<'_, ()>> {
        self.rotation_guard
            .try_lock()
            .map_err(|_| VaultError::RotationInProgress)
    }
}
