use palisade_crypto::KdfProfile;
use palisade_vault::{
    change_master_password, open_vault, KdfConfig, MasterKeyManager, MemoryBlobStore,
    MemoryRecordStore, RecordStore, RotationPhase, RotationProgress, VaultError, VaultRecord,
    ROTATION_BATCH_SIZE,
};
use std::sync::Arc;

fn fast_config() -> KdfConfig {
    KdfConfig {
        verification: KdfProfile::custom(1_000),
        encryption: KdfProfile::custom(2_000),
    }
}

fn initialized_manager(password: &str) -> Arc<MasterKeyManager> {
    let mgr = Arc::new(MasterKeyManager::with_config(
        Arc::new(MemoryBlobStore::new()),
        fast_config(),
    ));
    mgr.set_master_password(password).unwrap();
    mgr
}

/// Builds a store of `n` records encrypted under the current session key,
/// spread across active, archived, and soft-deleted states.
fn populated_store(
    mgr: &Arc<MasterKeyManager>,
    password: &str,
    n: usize,
) -> (MemoryRecordStore, Vec<(uuid::Uuid, String)>) {
    let vault = open_vault(mgr.clone(), password).unwrap();
    let store = MemoryRecordStore::new();
    let mut plaintexts = Vec::new();

    for i in 0..n {
        let mut record = VaultRecord::new(format!("service-{i}.example"), format!("user{i}"));
        let secret = format!("password-{i}");
        record.secret = vault.encrypt_field(&secret).unwrap();
        record.archived = i % 5 == 3;
        record.deleted = i % 7 == 6;
        plaintexts.push((record.id, secret));
        store.insert(record);
    }

    (store, plaintexts)
}

#[test]
fn rotation_scenario_25_records() {
    let mgr = initialized_manager("OldPW1!");
    let (store, plaintexts) = populated_store(&mgr, "OldPW1!", 25);

    let mut events: Vec<RotationProgress> = Vec::new();
    let new_vault =
        change_master_password(&mgr, "OldPW1!", "NewPW2!", &store, |p| events.push(p)).unwrap();

    // Password swap is visible on the verification path.
    assert!(mgr.verify_master_password("NewPW2!").unwrap());
    assert!(!mgr.verify_master_password("OldPW1!").unwrap());

    // 25 records in batches of 10: three decrypt events, two re-encrypt
    // events (the last batch's tick folds into Complete), one terminal
    // Complete.
    assert_eq!(ROTATION_BATCH_SIZE, 10);
    assert_eq!(events.len(), 6);

    let phases: Vec<RotationPhase> = events.iter().map(|e| e.phase).collect();
    assert_eq!(
        phases,
        vec![
            RotationPhase::Decrypting,
            RotationPhase::Decrypting,
            RotationPhase::Decrypting,
            RotationPhase::ReEncrypting,
            RotationPhase::ReEncrypting,
            RotationPhase::Complete,
        ]
    );

    // Strictly increasing throughout, terminal at total*2.
    let currents: Vec<usize> = events.iter().map(|e| e.current).collect();
    assert_eq!(currents, vec![10, 20, 25, 35, 45, 50]);
    assert!(currents.windows(2).all(|w| w[0] < w[1]));
    assert!(events.iter().all(|e| e.total == 50));

    // Every record decrypts to its pre-rotation plaintext under the new key.
    for (id, expected) in &plaintexts {
        let record = store.get(*id).unwrap();
        assert_eq!(&new_vault.decrypt_field(&record.secret).unwrap(), expected);
    }
}

#[test]
fn wrong_old_password_touches_nothing() {
    let mgr = initialized_manager("OldPW1!");
    let (store, _) = populated_store(&mgr, "OldPW1!", 5);
    let before = store.list_all(true, true).unwrap();

    let mut called = false;
    let result = change_master_password(&mgr, "wrong", "NewPW2!", &store, |_| called = true);

    assert!(matches!(result, Err(VaultError::InvalidCredential)));
    assert!(!called);
    assert!(mgr.verify_master_password("OldPW1!").unwrap());
    assert_eq!(store.list_all(true, true).unwrap(), before);
}

#[test]
fn rotation_covers_archived_and_deleted_records() {
    let mgr = initialized_manager("OldPW1!");
    let (store, plaintexts) = populated_store(&mgr, "OldPW1!", 14);

    let new_vault =
        change_master_password(&mgr, "OldPW1!", "NewPW2!", &store, |_| {}).unwrap();

    let rotated = store.list_all(true, true).unwrap();
    assert!(rotated.iter().any(|r| r.archived));
    assert!(rotated.iter().any(|r| r.deleted));
    for (id, expected) in &plaintexts {
        let record = store.get(*id).unwrap();
        assert_eq!(&new_vault.decrypt_field(&record.secret).unwrap(), expected);
    }
}

#[test]
fn unreadable_field_rotates_as_empty() {
    let mgr = initialized_manager("OldPW1!");
    let (store, _) = populated_store(&mgr, "OldPW1!", 3);

    // Corrupt one record's secret in place.
    let mut records = store.list_all(true, true).unwrap();
    let victim = records.remove(0);
    let mut corrupted = victim.clone();
    corrupted.secret = "definitely-not-an-envelope".into();
    store.update(&corrupted).unwrap();

    let new_vault =
        change_master_password(&mgr, "OldPW1!", "NewPW2!", &store, |_| {}).unwrap();

    // The unreadable field was carried forward empty; the rest survived.
    let rotated = store.get(victim.id).unwrap();
    assert_eq!(new_vault.decrypt_field(&rotated.secret).unwrap(), "");
    for record in store.list_all(true, true).unwrap() {
        if record.id != victim.id {
            assert!(!new_vault.decrypt_field(&record.secret).unwrap().is_empty());
        }
    }
}

#[test]
fn empty_store_rotation_completes_immediately() {
    let mgr = initialized_manager("OldPW1!");
    let store = MemoryRecordStore::new();

    let mut events = Vec::new();
    change_master_password(&mgr, "OldPW1!", "NewPW2!", &store, |p| events.push(p)).unwrap();

    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0],
        RotationProgress {
            current: 0,
            total: 0,
            phase: RotationPhase::Complete
        }
    );
    assert!(mgr.verify_master_password("NewPW2!").unwrap());
}

#[test]
fn sessions_are_excluded_while_rotation_runs() {
    let mgr = initialized_manager("OldPW1!");
    let (store, _) = populated_store(&mgr, "OldPW1!", 3);
    let stale_session = open_vault(mgr.clone(), "OldPW1!").unwrap();

    assert!(!mgr.rotation_in_flight());

    let mut observed_exclusion = false;
    change_master_password(&mgr, "OldPW1!", "NewPW2!", &store, |_| {
        // While the guard is held, ordinary session crypto must refuse.
        assert!(mgr.rotation_in_flight());
        assert!(matches!(
            stale_session.encrypt_field("x"),
            Err(VaultError::RotationInProgress)
        ));
        assert_eq!(stale_session.decrypt_field_lossy("anything"), "");
        observed_exclusion = true;
    })
    .unwrap();

    assert!(observed_exclusion);
    assert!(!mgr.rotation_in_flight());
}

#[test]
fn stale_sessions_are_rejected_after_rotation() {
    let mgr = initialized_manager("OldPW1!");
    let (store, _) = populated_store(&mgr, "OldPW1!", 3);
    let stale_session = open_vault(mgr.clone(), "OldPW1!").unwrap();
    let stored = stale_session.encrypt_field("pre-rotation secret").unwrap();

    let new_vault =
        change_master_password(&mgr, "OldPW1!", "NewPW2!", &store, |_| {}).unwrap();
    assert!(!mgr.rotation_in_flight());

    // The guard is released, but the old session's key no longer matches
    // the store. Writing under it would produce undecryptable records, so
    // every crypto operation must refuse.
    assert!(matches!(
        stale_session.encrypt_field("fresh secret"),
        Err(VaultError::SessionStale)
    ));
    assert!(matches!(
        stale_session.decrypt_field(&stored),
        Err(VaultError::SessionStale)
    ));
    assert_eq!(stale_session.decrypt_field_lossy(&stored), "");

    // The session returned by the rotation is current.
    let rewritten = new_vault.encrypt_field("fresh secret").unwrap();
    assert_eq!(new_vault.decrypt_field(&rewritten).unwrap(), "fresh secret");
}

#[test]
fn new_session_decrypts_after_reopen() {
    let mgr = initialized_manager("OldPW1!");
    let (store, plaintexts) = populated_store(&mgr, "OldPW1!", 4);

    change_master_password(&mgr, "OldPW1!", "NewPW2!", &store, |_| {})
        .unwrap()
        .close();

    // A fresh open with the new password sees the rotated data.
    let reopened = open_vault(mgr, "NewPW2!").unwrap();
    for (id, expected) in &plaintexts {
        let record = store.get(*id).unwrap();
        assert_eq!(&reopened.decrypt_field(&record.secret).unwrap(), expected);
    }
}
