//! Atomic finalization of export files.

use crate::ExportResult;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Writes export bytes to `path` via a temp file in the same directory,
/// renamed into place only on full success.
///
/// A cancelled or crashed export therefore never leaves a partial file at
/// the destination that could be mistaken for a valid envelope.
pub fn write_export_atomic(path: &Path, bytes: &[u8]) -> ExportResult<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;

    debug!("export finalized at {}", path.display());
    Ok(())
}
