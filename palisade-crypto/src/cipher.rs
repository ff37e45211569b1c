//! Authenticated envelope encryption (ChaCha20-Poly1305).
//!
//! An envelope is self-contained: decryption requires only the envelope and
//! the key. Nonces come from the OS CSPRNG rather than a counter — records
//! may be written by more than one process or install under the same key,
//! so there is no single counter to coordinate.

use crate::error::{CryptoError, CryptoResult};
use crate::key::DerivedKey;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Nonce size in bytes (96-bit, per ChaCha20-Poly1305).
pub const NONCE_SIZE: usize = 12;

/// Poly1305 tag size; appended to the ciphertext per AEAD convention.
pub const TAG_SIZE: usize = 16;

/// Self-contained ciphertext envelope: nonce + ciphertext (tag included).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EncryptedData {
    pub nonce: [u8; NONCE_SIZE],
    pub ciphertext: Vec<u8>,
}

/// Encrypts `plaintext` under `key` with a fresh random nonce.
pub fn seal(key: &DerivedKey, plaintext: &[u8]) -> CryptoResult<EncryptedData> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    Ok(EncryptedData {
        nonce: nonce_bytes,
        ciphertext,
    })
}

/// Decrypts an envelope.
///
/// Fails with [`CryptoError::AuthenticationFailed`] on any tag mismatch —
/// wrong key, tampering, and corruption surface identically to avoid
/// oracle leakage.
pub fn open(key: &DerivedKey, data: &EncryptedData) -> CryptoResult<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));

    cipher
        .decrypt(Nonce::from_slice(&data.nonce), data.ciphertext.as_ref())
        .map_err(|_| CryptoError::AuthenticationFailed)
}
