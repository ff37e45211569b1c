use thiserror::Error;

/// Errors from the cryptographic core.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// AEAD tag verification failed. Wrong key, tampering, and corrupted
    /// ciphertext are deliberately indistinguishable.
    #[error("authentication failed (wrong key or tampered data)")]
    AuthenticationFailed,
    /// A stored envelope could not be parsed (bad base64, missing separator,
    /// wrong nonce length, non-UTF-8 plaintext).
    #[error("corrupt envelope encoding: {0}")]
    CorruptData(String),
    /// Encryption failed (plaintext too large for the AEAD).
    #[error("encryption failed: {0}")]
    Encryption(String),
    /// A raw key or salt had the wrong length.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },
}

pub type CryptoResult<T> = Result<T, CryptoError>;
