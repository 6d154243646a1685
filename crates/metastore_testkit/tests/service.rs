//! Storage service, backup and engine-specific isolation behavior.

use metastore_core::{StorageService, StoreActioner, ID_INDEX};
use metastore_storage::{
    EmbeddedDb, Engine, Interface, ReadOnlyTx, ReadOperator, StorageConfig, StorageError, Tx,
};
use metastore_testkit::fixtures::scenarios::{ids, populate};
use metastore_testkit::{test_store_config, TempEmbeddedDb, DATE_INDEX};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn backup_roundtrip_reopens_with_same_contents() {
    let dir = tempfile::tempdir().unwrap();
    let service = StorageService::open(&StorageConfig::new(dir.path().join("live.db"))).unwrap();
    let objects = service
        .indexed_store("objects", test_store_config("objects"))
        .unwrap();
    populate(&*objects, 10);
    service.versions().set("objects", "2").unwrap();
    let expected = service.store("objects").unwrap().list("").unwrap();

    let snapshot = service.backup().unwrap();
    let size = snapshot.size();
    let backup_path = dir.path().join("backup.db");
    let mut file = std::fs::File::create(&backup_path).unwrap();
    assert_eq!(snapshot.write_to(&mut file).unwrap(), size);
    drop(file);
    assert_eq!(std::fs::metadata(&backup_path).unwrap().len(), size);

    let restored = EmbeddedDb::open_path(&backup_path).unwrap();
    assert_eq!(restored.store("objects").unwrap().list("").unwrap(), expected);
    assert_eq!(
        restored.store("versions").unwrap().get("objects").unwrap().value,
        b"2"
    );
}

#[test]
fn writes_after_backup_are_not_in_snapshot() {
    let db = TempEmbeddedDb::new();
    let store = db.store("t").unwrap();
    store.put("before", b"1").unwrap();

    let snapshot = db.backup().unwrap();
    let mut out = Vec::new();
    snapshot.write_to(&mut out).unwrap();
    store.put("after", b"2").unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("copy.db");
    std::fs::write(&path, &out).unwrap();
    let copy = EmbeddedDb::open_path(&path).unwrap();
    let keys: Vec<String> = copy
        .store("t")
        .unwrap()
        .list("")
        .unwrap()
        .into_iter()
        .map(|kv| kv.key)
        .collect();
    assert_eq!(keys, vec!["before"]);
}

#[test]
fn registrar_rebuilds_every_registered_store() {
    let service = StorageService::in_memory().unwrap();
    let a = service.indexed_store("a", test_store_config("a")).unwrap();
    let b = service.indexed_store("b", test_store_config("b")).unwrap();
    populate(&*a, 3);
    populate(&*b, 2);

    for (store, prefix) in [(service.store("a").unwrap(), "a"), (service.store("b").unwrap(), "b")] {
        store
            .update(|tx| -> Result<(), StorageError> {
                for kv in tx.list(&format!("/{prefix}/indexes/"))? {
                    tx.delete(&kv.key)?;
                }
                Ok(())
            })
            .unwrap();
    }

    let registrar = service.registrar();
    assert_eq!(registrar.list(), vec!["a", "b"]);
    for name in registrar.list() {
        registrar.get(&name).unwrap().rebuild().unwrap();
    }

    assert_eq!(ids(&a.list(ID_INDEX, "", 0, None).unwrap()), vec!["01", "02", "03"]);
    assert_eq!(b.list(DATE_INDEX, "2020-*", 0, None).unwrap().len(), 2);
}

#[test]
fn versions_are_missing_until_set() {
    let service = StorageService::in_memory().unwrap();
    assert!(service.versions().get("objects").unwrap_err().is_not_found());
    service.versions().set("objects", "1").unwrap();
    service.versions().set("objects", "2").unwrap();
    assert_eq!(service.versions().get("objects").unwrap(), "2");
}

#[test]
fn embedded_readers_do_not_wait_for_writer() {
    let db = TempEmbeddedDb::new();
    let store = db.store("iso").unwrap();
    store.put("k", b"old").unwrap();

    let mut tx = store.begin_tx().unwrap();
    tx.put("k", b"new").unwrap();

    let reader = store.begin_read_only_tx().unwrap();
    assert_eq!(reader.get("k").unwrap().value, b"old");
    assert_eq!(store.get("k").unwrap().value, b"old");
    ReadOnlyTx::rollback(reader).unwrap();

    tx.commit().unwrap();
    assert_eq!(store.get("k").unwrap().value, b"new");
}

#[test]
fn embedded_read_tx_keeps_its_snapshot() {
    let db = TempEmbeddedDb::new();
    let store = db.store("iso").unwrap();
    store.put("k", b"old").unwrap();

    let reader = store.begin_read_only_tx().unwrap();
    store.put("k", b"new").unwrap();
    store.put("k2", b"x").unwrap();

    assert_eq!(reader.get("k").unwrap().value, b"old");
    assert_eq!(reader.list("").unwrap().len(), 1);
    ReadOnlyTx::rollback(reader).unwrap();
}

#[test]
fn mem_transactions_are_serialized() {
    let db = metastore_testkit::mem_engine();
    let store = Arc::new(db.store("serial").unwrap());
    let committed = Arc::new(AtomicBool::new(false));

    let mut tx = store.begin_tx().unwrap();
    tx.put("k", b"v").unwrap();

    let handle = {
        let store = Arc::clone(&store);
        let committed = Arc::clone(&committed);
        thread::spawn(move || {
            let value = store.get("k").unwrap().value;
            assert!(committed.load(Ordering::SeqCst), "read ran during a write tx");
            value
        })
    };

    thread::sleep(Duration::from_millis(50));
    committed.store(true, Ordering::SeqCst);
    Tx::commit(tx).unwrap();

    assert_eq!(handle.join().unwrap(), b"v");
}
