//! Stable storage codec for encrypted record fields.
//!
//! A sensitive field at rest is the single string
//! `base64(nonce) + ":" + base64(ciphertext)`. This format is what the
//! record store persists and must stay readable across versions.
//!
//! An empty field is stored as the empty string, not as an envelope, so
//! unset fields survive round-trips without a decryption pass.

use crate::cipher::{open, seal, EncryptedData, NONCE_SIZE};
use crate::error::{CryptoError, CryptoResult};
use crate::key::DerivedKey;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

/// Separator between the encoded nonce and ciphertext. The standard base64
/// alphabet never produces it, so the split is unambiguous.
const FIELD_SEPARATOR: char = ':';

/// Encrypts a field value into its storage-string form.
pub fn encrypt_field(key: &DerivedKey, plaintext: &str) -> CryptoResult<String> {
    if plaintext.is_empty() {
        return Ok(String::new());
    }

    let sealed = seal(key, plaintext.as_bytes())?;
    Ok(format!(
        "{}{}{}",
        BASE64.encode(sealed.nonce),
        FIELD_SEPARATOR,
        BASE64.encode(&sealed.ciphertext)
    ))
}

/// Decrypts a storage string produced by [`encrypt_field`].
///
/// A malformed value fails with [`CryptoError::CorruptData`], a tag mismatch
/// with [`CryptoError::AuthenticationFailed`] — never garbage plaintext.
pub fn decrypt_field(key: &DerivedKey, stored: &str) -> CryptoResult<String> {
    if stored.is_empty() {
        return Ok(String::new());
    }

    let (nonce_b64, ciphertext_b64) = stored
        .split_once(FIELD_SEPARATOR)
        .ok_or_else(|| CryptoError::CorruptData("missing ':' separator".into()))?;

    let nonce_bytes = BASE64
        .decode(nonce_b64)
        .map_err(|e| CryptoError::CorruptData(format!("nonce is not base64: {e}")))?;
    let nonce: [u8; NONCE_SIZE] = nonce_bytes
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::CorruptData("wrong nonce length".into()))?;

    let ciphertext = BASE64
        .decode(ciphertext_b64)
        .map_err(|e| CryptoError::CorruptData(format!("ciphertext is not base64: {e}")))?;

    let plaintext = open(key, &EncryptedData { nonce, ciphertext })?;
    String::from_utf8(plaintext)
        .map_err(|_| CryptoError::CorruptData("plaintext is not UTF-8".into()))
}

/// Lossy variant of [`decrypt_field`]: any failure yields the empty string.
///
/// This trades error visibility for availability — one unreadable field must
/// not abort a whole list render. The result is indistinguishable from a
/// legitimately empty field; callers that need the distinction must use
/// [`decrypt_field`] directly.
pub fn decrypt_field_lossy(key: &DerivedKey, stored: &str) -> String {
    decrypt_field(key, stored).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::generate_random_key;

    #[test]
    fn field_roundtrip() {
        let key = generate_random_key();
        let stored = encrypt_field(&key, "hunter2").unwrap();
        assert_eq!(decrypt_field(&key, &stored).unwrap(), "hunter2");
    }

    #[test]
    fn storage_string_shape() {
        let key = generate_random_key();
        let stored = encrypt_field(&key, "hunter2").unwrap();

        let (nonce_b64, ciphertext_b64) = stored.split_once(':').unwrap();
        assert_eq!(BASE64.decode(nonce_b64).unwrap().len(), NONCE_SIZE);
        assert!(!ciphertext_b64.is_empty());
    }

    #[test]
    fn empty_field_stays_empty() {
        let key = generate_random_key();
        let stored = encrypt_field(&key, "").unwrap();
        assert_eq!(stored, "");
        assert_eq!(decrypt_field(&key, "").unwrap(), "");
    }

    #[test]
    fn plaintext_containing_separator_roundtrips() {
        let key = generate_random_key();
        let stored = encrypt_field(&key, "user:pass:extra").unwrap();
        assert_eq!(decrypt_field(&key, &stored).unwrap(), "user:pass:extra");
    }

    #[test]
    fn missing_separator_is_corrupt() {
        let key = generate_random_key();
        assert!(matches!(
            decrypt_field(&key, "bm8gc2VwYXJhdG9yIGhlcmU"),
            Err(CryptoError::CorruptData(_))
        ));
    }

    #[test]
    fn non_base64_halves_are_corrupt() {
        let key = generate_random_key();
        assert!(matches!(
            decrypt_field(&key, "!!!not-base64!!!:also not"),
            Err(CryptoError::CorruptData(_))
        ));
    }

    #[test]
    fn wrong_key_is_authentication_failure() {
        let key = generate_random_key();
        let other = generate_random_key();
        let stored = encrypt_field(&key, "hunter2").unwrap();
        assert!(matches!(
            decrypt_field(&other, &stored),
            Err(CryptoError::AuthenticationFailed)
        ));
    }

    #[test]
    fn lossy_variant_swallows_all_failures() {
        let key = generate_random_key();
        let other = generate_random_key();
        let stored = encrypt_field(&key, "hunter2").unwrap();

        assert_eq!(decrypt_field_lossy(&other, &stored), "");
        assert_eq!(decrypt_field_lossy(&key, "garbage"), "");
        assert_eq!(decrypt_field_lossy(&key, &stored), "hunter2");
    }
}
