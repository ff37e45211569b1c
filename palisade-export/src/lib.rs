//! Portable encrypted export/import for Palisade.
//!
//! An export file is a self-contained JSON envelope: the record payload
//! (JSON or RFC4180 CSV) sealed under a key derived from a user-supplied
//! export password and a salt generated per file. Salt and nonce travel
//! inside the envelope, so the file opens on any device with nothing but
//! the password.
//!
//! Files missing the `salt` field are rejected outright: the predecessor
//! format derived a device-bound key and could not be opened anywhere else,
//! so importing it is explicitly unsupported.

mod envelope;
mod io;
mod merge;
mod wire;

pub use envelope::{
    export_records, export_records_csv, export_records_csv_with_profile,
    export_records_with_profile, import_records, import_records_with_profile, ExportEnvelope,
    EXPORT_VERSION,
};
pub use io::write_export_atomic;
pub use merge::{merge_imported, ImportPolicy};
pub use wire::PortableRecord;

use palisade_crypto::CryptoError;
use thiserror::Error;

/// Errors from the export/import path.
///
/// Decryption and corruption failures collapse into
/// [`WrongPasswordOrCorrupt`](ExportError::WrongPasswordOrCorrupt): the
/// import path never tells a caller (or an attacker probing files) which
/// of the two it was.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The file is not a recognized export envelope, or comes from the
    /// unsupported device-bound predecessor format.
    #[error("unsupported export format: {0}")]
    UnsupportedFormat(String),
    /// Wrong export password, or the file is damaged. Deliberately
    /// indistinguishable.
    #[error("wrong password or corrupt file")]
    WrongPasswordOrCorrupt,
    /// Payload (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

pub type ExportResult<T> = Result<T, ExportError>;
