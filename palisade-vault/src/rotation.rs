//! Master-password rotation.
//!
//! Three phases: decrypt every record under the old key, commit the new
//! password, re-encrypt every record under the new key. The commit (Phase B)
//! is the point of no return — a crash during Phase C leaves a mixed-key
//! store with no recorded marker of which records were rewritten. Records
//! carry no key-version tag, so that risk is inherent to the format and
//! documented rather than hidden; a later attempt cannot assume the "old
//! key" it derives matches every record it reads.

use crate::master_key::MasterKeyManager;
use crate::session::UnlockedVault;
use crate::store::RecordStore;
use crate::store::VaultRecord;
use crate::{VaultError, VaultResult};
use palisade_crypto::{decrypt_field, encrypt_field, DerivedKey};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Records processed per batch; progress fires between batches, and work is
/// interruptible between batches only.
pub const ROTATION_BATCH_SIZE: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RotationPhase {
    Decrypting,
    ReEncrypting,
    Complete,
}

/// Progress event: `current` out of `total` work units. Each record counts
/// twice — once decrypted, once re-encrypted — so `total` is fixed at twice
/// the record count for the whole operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RotationProgress {
    pub current: usize,
    pub total: usize,
    pub phase: RotationPhase,
}

/// A record held in memory between the decrypt and re-encrypt phases.
struct PlaintextRecord {
    record: VaultRecord,
    secret: String,
    details: String,
}

/// Changes the master password, re-encrypting every stored record.
///
/// 1. Verifies `old_password`; [`VaultError::InvalidCredential`] on mismatch
///    with nothing touched.
/// 2. Phase A: decrypts all records (including archived and soft-deleted)
///    under the old key into an in-memory working set. A field that fails
///    to decrypt is carried forward empty rather than aborting the run.
/// 3. Phase B — commit point: persists the new password hash and derives
///    the new database key. From here on the verification path uses the new
///    password.
/// 4. Phase C: re-encrypts and persists each record; every update is
///    independently durable, bounding memory and loss on failure.
///
/// Holds the vault's exclusive rotation guard for the whole duration; a
/// concurrent attempt fails with [`VaultError::RotationInProgress`].
/// Returns the new unlocked session. Sessions opened before the commit are
/// stamped with the previous key epoch and fail with
/// [`VaultError::SessionStale`] from then on.
///
/// Progress `current` values are strictly increasing; the terminal
/// `Complete` event is the only one reporting `total * 2`.
pub fn change_master_password(
    manager: &Arc<MasterKeyManager>,
    old_password: &str,
    new_password: &str,
    records: &dyn RecordStore,
    mut on_progress: impl FnMut(RotationProgress),
) -> VaultResult<UnlockedVault> {
    let _guard = manager.try_begin_rotation()?;

    // Fail fast — nothing persisted has been touched yet.
    if !manager.verify_master_password(old_password)? {
        return Err(VaultError::InvalidCredential);
    }
    let old_key = manager.database_key(old_password)?;

    // Every persisted record, visible or not.
    let all = records.list_all(true, true)?;
    let total = all.len();
    let ticks = total * 2;
    info!("rotating master key over {total} records");

    // Phase A — decrypt under the old key.
    let mut working: Vec<PlaintextRecord> = Vec::with_capacity(total);
    let mut processed = 0;
    for batch in all.chunks(ROTATION_BATCH_SIZE) {
        for record in batch {
            working.push(PlaintextRecord {
                secret: decrypt_or_empty(&old_key, &record.secret, record.id, "secret"),
                details: decrypt_or_empty(&old_key, &record.details, record.id, "details"),
                record: record.clone(),
            });
        }
        processed += batch.len();
        on_progress(RotationProgress {
            current: processed,
            total: ticks,
            phase: RotationPhase::Decrypting,
        });
    }

    // Phase B — commit point. Interruption between here and the end of
    // Phase C leaves already-rewritten records inconsistent with the rest.
    manager.replace_master_password(new_password)?;
    let new_key = manager.database_key(new_password)?;

    // Phase C — re-encrypt under the new key, one durable update per record.
    let mut rewritten = 0;
    for batch in working.chunks(ROTATION_BATCH_SIZE) {
        for item in batch {
            let mut record = item.record.clone();
            record.secret = encrypt_field(&new_key, &item.secret)?;
            record.details = encrypt_field(&new_key, &item.details)?;
            records.update(&record)?;
        }
        rewritten += batch.len();
        // The final batch's tick coincides with the terminal Complete event;
        // emit only the latter so `current` stays strictly increasing.
        if total + rewritten < ticks {
            on_progress(RotationProgress {
                current: total + rewritten,
                total: ticks,
                phase: RotationPhase::ReEncrypting,
            });
        }
    }

    on_progress(RotationProgress {
        current: ticks,
        total: ticks,
        phase: RotationPhase::Complete,
    });
    info!("master key rotation complete ({total} records)");

    Ok(UnlockedVault::from_parts(manager.clone(), new_key))
}

/// Lossy-but-available: a field that cannot be decrypted is rotated as
/// empty instead of failing the whole store. Logged so the loss is visible.
fn decrypt_or_empty(key: &DerivedKey, stored: &str, id: Uuid, field: &str) -> String {
    match decrypt_field(key, stored) {
        Ok(plaintext) => plaintext,
        Err(e) => {
            warn!("record {id}: {field} did not decrypt, carrying it forward empty: {e}");
            String::new()
        }
    }
}
