//! The export envelope: a self-describing JSON container around a sealed
//! payload.
//!
//! Only `version` and `timestamp` are cleartext; salt, nonce, and data are
//! opaque base64. The salt travels in the file — deriving the key needs
//! nothing device-bound, which is what makes the format portable.

use crate::wire::{from_payload, to_csv_payload, to_json_payload, PortableRecord};
use crate::{ExportError, ExportResult};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use palisade_crypto::{derive_key, open, seal, EncryptedData, KdfProfile, Salt, NONCE_SIZE};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Current export format version.
pub const EXPORT_VERSION: &str = "1.0";

/// The serialized export file.
///
/// `salt` is optional only so that its absence can be reported as a format
/// error instead of a parse error: the salt-less predecessor format was
/// device-bound and is rejected on import.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExportEnvelope {
    pub version: String,
    /// Cipher nonce, base64. Accepts the legacy `iv` key on import.
    #[serde(alias = "iv")]
    pub nonce: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
    /// Sealed payload, base64.
    pub data: String,
    /// Creation time, epoch millis.
    pub timestamp: i64,
}

/// Exports records as a JSON payload sealed under `export_password`.
pub fn export_records(
    records: &[PortableRecord],
    export_password: &str,
) -> ExportResult<Vec<u8>> {
    export_records_with_profile(records, export_password, KdfProfile::ENCRYPTION)
}

/// Exports records as an RFC4180 CSV payload sealed under `export_password`.
pub fn export_records_csv(
    records: &[PortableRecord],
    export_password: &str,
) -> ExportResult<Vec<u8>> {
    export_records_csv_with_profile(records, export_password, KdfProfile::ENCRYPTION)
}

/// Imports records from export file bytes.
pub fn import_records(
    bytes: &[u8],
    import_password: &str,
) -> ExportResult<Vec<PortableRecord>> {
    import_records_with_profile(bytes, import_password, KdfProfile::ENCRYPTION)
}

/// [`export_records`] with an explicit KDF profile, for tuning and tests.
/// Both sides of a transfer must agree on the profile; the shipped format
/// pins [`KdfProfile::ENCRYPTION`].
pub fn export_records_with_profile(
    records: &[PortableRecord],
    export_password: &str,
    profile: KdfProfile,
) -> ExportResult<Vec<u8>> {
    let payload = to_json_payload(records)?;
    seal_envelope(&payload, export_password, profile, records.len())
}

/// [`export_records_csv`] with an explicit KDF profile.
pub fn export_records_csv_with_profile(
    records: &[PortableRecord],
    export_password: &str,
    profile: KdfProfile,
) -> ExportResult<Vec<u8>> {
    let payload = to_csv_payload(records)?;
    seal_envelope(&payload, export_password, profile, records.len())
}

/// [`import_records`] with an explicit KDF profile.
pub fn import_records_with_profile(
    bytes: &[u8],
    import_password: &str,
    profile: KdfProfile,
) -> ExportResult<Vec<PortableRecord>> {
    let envelope: ExportEnvelope = serde_json::from_slice(bytes)
        .map_err(|e| ExportError::UnsupportedFormat(format!("not an export envelope: {e}")))?;

    if !envelope.version.starts_with("1.") {
        return Err(ExportError::UnsupportedFormat(format!(
            "unknown version {:?}",
            envelope.version
        )));
    }

    // No fallback to a device-bound key: that would make the file
    // non-portable, which defeats the format.
    let salt_b64 = envelope.salt.as_deref().ok_or_else(|| {
        ExportError::UnsupportedFormat("missing salt (device-bound legacy export)".into())
    })?;

    let salt_bytes = BASE64
        .decode(salt_b64)
        .map_err(|_| ExportError::WrongPasswordOrCorrupt)?;
    let salt = Salt::from_slice(&salt_bytes).map_err(|_| ExportError::WrongPasswordOrCorrupt)?;

    let nonce_bytes = BASE64
        .decode(&envelope.nonce)
        .map_err(|_| ExportError::WrongPasswordOrCorrupt)?;
    let nonce: [u8; NONCE_SIZE] = nonce_bytes
        .as_slice()
        .try_into()
        .map_err(|_| ExportError::WrongPasswordOrCorrupt)?;
    let ciphertext = BASE64
        .decode(&envelope.data)
        .map_err(|_| ExportError::WrongPasswordOrCorrupt)?;

    let key = derive_key(import_password, &salt, profile);
    let payload = open(&key, &EncryptedData { nonce, ciphertext })
        .map_err(|_| ExportError::WrongPasswordOrCorrupt)?;

    let records = from_payload(&payload)?;
    info!("imported {} records from export file", records.len());
    Ok(records)
}

fn seal_envelope(
    payload: &[u8],
    export_password: &str,
    profile: KdfProfile,
    record_count: usize,
) -> ExportResult<Vec<u8>> {
    // Fresh salt per file; never the vault's own salts.
    let salt = Salt::random();
    let key = derive_key(export_password, &salt, profile);
    let sealed = seal(&key, payload)?;

    let envelope = ExportEnvelope {
        version: EXPORT_VERSION.to_string(),
        nonce: BASE64.encode(sealed.nonce),
        salt: Some(BASE64.encode(salt.as_bytes())),
        data: BASE64.encode(&sealed.ciphertext),
        timestamp: chrono::Utc::now().timestamp_millis(),
    };

    info!("exported {record_count} records");
    serde_json::to_vec(&envelope).map_err(|e| ExportError::Serialization(e.to_string()))
}
