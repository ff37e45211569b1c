//! Master-key lifecycle for Palisade.
//!
//! Owns everything between "the user typed a password" and "record fields
//! can be encrypted":
//!
//! - [`MasterKeyManager`] — persists the salted login hash in a
//!   [`SecureBlobStore`], derives the database key, and handles biometric
//!   unlock tokens.
//! - [`UnlockedVault`] — the session value returned by [`open_vault`].
//!   Encrypt/decrypt operations exist only on this type; a locked vault is
//!   simply the absence of the value. There is no global handle.
//! - [`change_master_password`] — the multi-phase rotation that re-encrypts
//!   every stored record under a new key.
//!
//! The vault never issues SQL and knows nothing of pagination: records come
//! and go through the [`RecordStore`] trait, and device-local secrets
//! (salts, the wrapped unlock token) through [`SecureBlobStore`].

mod master_key;
mod rotation;
mod session;
mod store;

pub use master_key::{KdfConfig, MasterKeyManager};
pub use rotation::{
    change_master_password, RotationPhase, RotationProgress, ROTATION_BATCH_SIZE,
};
pub use session::{open_vault, open_vault_with_token, UnlockedVault};
pub use store::{
    MemoryBlobStore, MemoryRecordStore, RecordStore, SecureBlobStore, SensitiveDetails,
    VaultRecord,
};

use palisade_crypto::CryptoError;
use thiserror::Error;

/// Errors from the vault layer.
#[derive(Debug, Error)]
pub enum VaultError {
    /// No master password has been set yet.
    #[error("vault not initialized")]
    NotInitialized,
    /// A master password is already set; use rotation to change it.
    #[error("vault already initialized")]
    AlreadyInitialized,
    /// The supplied master password does not match the stored hash.
    #[error("invalid master password")]
    InvalidCredential,
    /// Another rotation holds the exclusive rotation guard.
    #[error("a key rotation is already in flight")]
    RotationInProgress,
    /// The session's key predates the current master password; the vault
    /// must be re-opened.
    #[error("session key is stale; re-open the vault")]
    SessionStale,
    /// The biometric unlock token could not be unwrapped. The token has
    /// been cleared; the caller must fall back to password entry.
    #[error("unlock token rejected; password re-entry required")]
    UnlockTokenInvalid,
    /// The secure blob store or record store failed.
    #[error("storage error: {0}")]
    Storage(String),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

pub type VaultResult<T> = Result<T, VaultError>;
