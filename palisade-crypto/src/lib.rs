//! Cryptographic core for Palisade.
//!
//! Provides:
//! - PBKDF2-HMAC-SHA256 key derivation with two distinct iteration profiles
//! - ChaCha20-Poly1305 authenticated envelopes
//! - The stable `base64(nonce):base64(ciphertext)` field codec used by the
//!   record store
//!
//! # Key model
//!
//! Two derivation profiles exist and must never be interchanged:
//!
//! 1. **Verification profile** (fast): its output is persisted as the login
//!    hash. It never decrypts anything.
//! 2. **Encryption profile** (slow): its output is the database key that
//!    protects record fields, and the key that seals portable exports.
//!    It is never persisted — it exists only for the lifetime of an
//!    unlocked session.
//!
//! Salts are likewise separate: the password-hash salt and the database-key
//! salt are independent 16-byte values. Reusing one for the other is a bug.

mod cipher;
mod error;
mod field;
mod key;

pub use cipher::{open, seal, EncryptedData, NONCE_SIZE, TAG_SIZE};
pub use error::{CryptoError, CryptoResult};
pub use field::{decrypt_field, decrypt_field_lossy, encrypt_field};
pub use key::{
    derive_key, generate_random_key, DerivedKey, KdfProfile, Salt, KEY_SIZE, SALT_SIZE,
};
