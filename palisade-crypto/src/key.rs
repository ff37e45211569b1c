//! Key material types and password-based key derivation.
//!
//! PBKDF2-HMAC-SHA256 with two built-in iteration profiles: a fast profile
//! for the stored login hash and a slow profile for the database and export
//! keys. The profiles intentionally differ so a captured password hash can
//! never double as an encryption key.

use crate::error::{CryptoError, CryptoResult};
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Derived key size in bytes (256-bit).
pub const KEY_SIZE: usize = 32;

/// Salt size in bytes.
pub const SALT_SIZE: usize = 16;

/// PBKDF2 iteration profile.
///
/// The two built-in profiles must never be interchanged: `VERIFICATION`
/// output is persisted as the login hash, `ENCRYPTION` output protects data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KdfProfile {
    iterations: u32,
}

impl KdfProfile {
    /// Fast profile for the stored password-verification hash.
    pub const VERIFICATION: Self = Self {
        iterations: 100_000,
    };

    /// Slow profile for database and export keys.
    pub const ENCRYPTION: Self = Self {
        iterations: 600_000,
    };

    /// Profile with a custom iteration count, for tuning and tests.
    pub const fn custom(iterations: u32) -> Self {
        Self { iterations }
    }

    pub const fn iterations(&self) -> u32 {
        self.iterations
    }
}

/// 16 random bytes, generated once per vault install or per export file.
/// Immutable once created; persisted alongside whatever it protects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Salt([u8; SALT_SIZE]);

impl Salt {
    /// Generates a fresh salt from the OS CSPRNG.
    pub fn random() -> Self {
        let mut bytes = [0u8; SALT_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; SALT_SIZE]) -> Self {
        Self(bytes)
    }

    /// Reconstructs a salt from a persisted byte slice.
    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        let arr: [u8; SALT_SIZE] =
            bytes
                .try_into()
                .map_err(|_| CryptoError::InvalidKeyLength {
                    expected: SALT_SIZE,
                    actual: bytes.len(),
                })?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; SALT_SIZE] {
        &self.0
    }
}

/// 256-bit symmetric key. Never persisted or serialized; lives in process
/// memory for the duration of an unlocked session and is zeroed on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey([u8; KEY_SIZE]);

impl DerivedKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DerivedKey([redacted])")
    }
}

/// Derives a 256-bit key from a password and salt.
///
/// Deterministic, and constant-time with respect to the password content
/// (PBKDF2 property — no early exit on password value). Empty passwords are
/// allowed; password policy belongs to the caller.
pub fn derive_key(password: &str, salt: &Salt, profile: KdfProfile) -> DerivedKey {
    let mut out = [0u8; KEY_SIZE];
    pbkdf2_hmac::<Sha256>(
        password.as_bytes(),
        salt.as_bytes(),
        profile.iterations(),
        &mut out,
    );
    DerivedKey::from_bytes(out)
}

/// Generates a random 256-bit key (not password-derived).
pub fn generate_random_key() -> DerivedKey {
    let mut bytes = [0u8; KEY_SIZE];
    OsRng.fill_bytes(&mut bytes);
    DerivedKey::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST: KdfProfile = KdfProfile::custom(1_000);

    #[test]
    fn derivation_is_deterministic() {
        let salt = Salt::random();
        let a = derive_key("hunter2", &salt, FAST);
        let b = derive_key("hunter2", &salt, FAST);
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn different_salts_produce_different_keys() {
        let a = derive_key("hunter2", &Salt::random(), FAST);
        let b = derive_key("hunter2", &Salt::random(), FAST);
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn different_iteration_counts_produce_different_keys() {
        let salt = Salt::random();
        let a = derive_key("hunter2", &salt, KdfProfile::custom(1_000));
        let b = derive_key("hunter2", &salt, KdfProfile::custom(1_001));
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn empty_password_is_allowed() {
        let salt = Salt::random();
        let key = derive_key("", &salt, FAST);
        assert_eq!(key.as_bytes().len(), KEY_SIZE);
    }

    #[test]
    fn builtin_profiles_are_pinned_and_distinct() {
        // These counts are part of the on-device format; changing either
        // breaks every existing install.
        assert_eq!(KdfProfile::VERIFICATION.iterations(), 100_000);
        assert_eq!(KdfProfile::ENCRYPTION.iterations(), 600_000);
        assert_ne!(KdfProfile::VERIFICATION, KdfProfile::ENCRYPTION);
    }

    #[test]
    fn salt_slice_roundtrip() {
        let salt = Salt::random();
        let restored = Salt::from_slice(salt.as_bytes()).unwrap();
        assert_eq!(salt, restored);
    }

    #[test]
    fn salt_from_wrong_length_slice_fails() {
        assert!(matches!(
            Salt::from_slice(&[0u8; 15]),
            Err(CryptoError::InvalidKeyLength {
                expected: SALT_SIZE,
                actual: 15
            })
        ));
    }
}
