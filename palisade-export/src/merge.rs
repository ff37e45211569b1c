//! Conflict resolution for imported records.

use crate::wire::PortableRecord;

/// What to do when an imported record matches an existing one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImportPolicy {
    /// Leave the existing record untouched; drop the imported duplicate.
    Skip,
    /// Merge the imported sensitive fields into the existing record,
    /// keeping its identity.
    Overwrite,
}

/// Merges imported records into an existing set.
///
/// The match key is case-insensitive equality of `(service, username)` —
/// the two most specific identifying fields. Non-matching imports are
/// appended as new records.
pub fn merge_imported(
    existing: Vec<PortableRecord>,
    imported: Vec<PortableRecord>,
    policy: ImportPolicy,
) -> Vec<PortableRecord> {
    let mut merged = existing;

    for incoming in imported {
        let slot = merged
            .iter_mut()
            .find(|r| matches_identity(r, &incoming));

        match (slot, policy) {
            (Some(_), ImportPolicy::Skip) => {}
            (Some(current), ImportPolicy::Overwrite) => {
                // Sensitive fields move over; id, service, and username
                // stay with the existing record. A field the import does
                // not carry never wipes an existing value.
                if !incoming.secret.is_empty() {
                    current.secret = incoming.secret;
                }
                if incoming.notes.is_some() {
                    current.notes = incoming.notes;
                }
                if incoming.details.is_some() {
                    current.details = incoming.details;
                }
            }
            (None, _) => merged.push(incoming),
        }
    }

    merged
}

// Unicode-aware: "Ärzte.example" and "ärzte.example" are the same service.
fn matches_identity(a: &PortableRecord, b: &PortableRecord) -> bool {
    a.service.to_lowercase() == b.service.to_lowercase()
        && a.username.to_lowercase() == b.username.to_lowercase()
}
