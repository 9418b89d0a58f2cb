//! End-to-end dump/restore tests against the in-process store

use kvdump_core::snapshot::{self, Snapshot, SnapshotError, SnapshotHeader};
use kvdump_core::{
    dump, restore, ConnectionConfig, Credentials, DumpError, DumpOptions, MemoryStore, Record,
    RestoreOptions,
};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

fn config() -> ConnectionConfig {
    ConnectionConfig::new("memory", Credentials::new("root", "secret"))
}

fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new().with_user("root", "secret");
    store.insert("a/1", "one");
    store.insert("a/2", "two");
    store.insert("a/3", "three");
    store.insert("b/1", "other");
    store
}

async fn dump_to(store: &MemoryStore, prefix: &str, path: &Path) -> Snapshot {
    let options = DumpOptions::new(prefix).with_output(path);
    let (snapshot, _) = dump(store, &config(), &options, &mut Vec::new())
        .await
        .expect("dump failed");
    snapshot
}

fn pairs(entries: &[(&str, &str)]) -> BTreeMap<Vec<u8>, Vec<u8>> {
    entries
        .iter()
        .map(|(k, v)| (k.as_bytes().to_vec(), v.as_bytes().to_vec()))
        .collect()
}

#[tokio::test]
async fn test_dump_then_restore_reproduces_range() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("a.snapshot");
    let source = seeded_store();

    for verbose in [false, true] {
        let options = DumpOptions::new("a/").with_output(&path).with_verbose(verbose);
        let (_, report) = dump(&source, &config(), &options, &mut Vec::new())
            .await
            .unwrap();
        assert_eq!(report.records, 3);
        assert!(report.output.is_some());

        let target = MemoryStore::new();
        let restored = restore(
            &target,
            &config(),
            &RestoreOptions::new(&path).with_verbose(verbose),
            &mut Vec::new(),
        )
        .await
        .unwrap();

        assert_eq!(restored.records, 3);
        assert_eq!(
            target.contents(),
            pairs(&[("a/1", "one"), ("a/2", "two"), ("a/3", "three")])
        );
    }
}

#[tokio::test]
async fn test_snapshot_preserves_scan_order_and_metadata() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("a.snapshot");
    let source = seeded_store();
    source.insert("a/2", "two again");

    let snapshot = dump_to(&source, "a/", &path).await;
    let on_disk = snapshot::decode_validated(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(on_disk, snapshot);

    let records = on_disk.records().unwrap();
    let keys: Vec<_> = records.iter().map(|r| r.key_str().into_owned()).collect();
    assert_eq!(keys, vec!["a/1", "a/2", "a/3"]);

    // revision counters come through untouched
    assert_eq!(records[1], source.record("a/2").unwrap());
    assert_eq!(records[1].version, 2);
    assert_eq!(on_disk.header.revision, source.revision());
    assert_eq!(on_disk.header.prefix, b"a/");
}

#[tokio::test]
async fn test_prefix_scoping_excludes_other_keys() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("a.snapshot");

    let snapshot = dump_to(&seeded_store(), "a/", &path).await;
    assert!(snapshot
        .records()
        .unwrap()
        .iter()
        .all(|r| r.key.starts_with(b"a/")));
    assert!(!snapshot.records().unwrap().iter().any(|r| r.key == b"b/1"));
}

#[tokio::test]
async fn test_restore_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("a.snapshot");
    dump_to(&seeded_store(), "a/", &path).await;

    let target = MemoryStore::new();
    let options = RestoreOptions::new(&path);
    restore(&target, &config(), &options, &mut Vec::new())
        .await
        .unwrap();
    let once = target.contents();

    restore(&target, &config(), &options, &mut Vec::new())
        .await
        .unwrap();
    assert_eq!(target.contents(), once);
    assert_eq!(target.len(), 3);
}

#[tokio::test]
async fn test_restore_overwrites_existing_values() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("a.snapshot");
    dump_to(&seeded_store(), "a/", &path).await;

    let target = MemoryStore::new();
    target.insert("a/1", "stale");
    target.insert("z/9", "untouched");
    restore(&target, &config(), &RestoreOptions::new(&path), &mut Vec::new())
        .await
        .unwrap();

    assert_eq!(target.get("a/1"), Some(b"one".to_vec()));
    assert_eq!(target.get("z/9"), Some(b"untouched".to_vec()));
}

#[tokio::test]
async fn test_partial_failure_leaves_prefix_applied() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("a.snapshot");
    dump_to(&seeded_store(), "a/", &path).await;

    // third of three writes fails
    let target = MemoryStore::new();
    target.fail_puts_after(2);
    let err = restore(&target, &config(), &RestoreOptions::new(&path), &mut Vec::new())
        .await
        .unwrap_err();

    match err {
        DumpError::Write { key, .. } => assert_eq!(key, "a/3"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(target.contents(), pairs(&[("a/1", "one"), ("a/2", "two")]));
    assert_eq!(target.open_sessions(), 0);
}

#[tokio::test]
async fn test_empty_range_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("empty.snapshot");

    let snapshot = dump_to(&seeded_store(), "nothing/", &path).await;
    assert!(snapshot.is_empty());

    let target = MemoryStore::new();
    target.insert("keep", "me");
    let report = restore(&target, &config(), &RestoreOptions::new(&path), &mut Vec::new())
        .await
        .unwrap();

    assert_eq!(report.records, 0);
    assert_eq!(target.contents(), pairs(&[("keep", "me")]));
}

#[tokio::test]
async fn test_verbose_lists_keys_in_scan_order() {
    let mut progress = Vec::new();
    let options = DumpOptions::new("a/").with_verbose(true);
    dump(&seeded_store(), &config(), &options, &mut progress)
        .await
        .unwrap();
    assert_eq!(String::from_utf8(progress).unwrap(), "a/1\na/2\na/3\n");
}

#[tokio::test]
async fn test_dump_connection_failures() {
    let store = seeded_store();

    let wrong_password = ConnectionConfig::new("memory", Credentials::new("root", "nope"));
    let err = dump(&store, &wrong_password, &DumpOptions::new("a/"), &mut Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DumpError::Connection(_)));

    store.set_unreachable(true);
    let err = dump(&store, &config(), &DumpOptions::new("a/"), &mut Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DumpError::Connection(_)));
}

#[tokio::test]
async fn test_dial_timeout() {
    let store = seeded_store();
    store.set_latency(Some(Duration::from_millis(500)));
    let slow = config().with_dial_timeout(Duration::from_millis(20));

    let err = dump(&store, &slow, &DumpOptions::new("a/"), &mut Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DumpError::Connection(_)));
}

#[tokio::test]
async fn test_read_timeout_writes_no_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("never.snapshot");
    let store = seeded_store();
    store.set_latency(Some(Duration::from_millis(300)));
    let config = config()
        .with_dial_timeout(Duration::from_secs(5))
        .with_request_timeout(Duration::from_millis(20));

    let err = dump(&store, &config, &DumpOptions::new("a/").with_output(&path), &mut Vec::new())
        .await
        .unwrap_err();

    assert!(matches!(err, DumpError::Read(_)));
    assert!(!path.exists());
    assert_eq!(store.open_sessions(), 0);
}

#[tokio::test]
async fn test_restore_rejects_bad_files_before_connecting() {
    let temp_dir = TempDir::new().unwrap();
    let target = MemoryStore::new();
    target.set_unreachable(true);

    let missing = temp_dir.path().join("missing.snapshot");
    let err = restore(&target, &config(), &RestoreOptions::new(&missing), &mut Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DumpError::SnapshotFormat(SnapshotError::Unreadable { .. })
    ));

    let garbage = temp_dir.path().join("garbage.snapshot");
    std::fs::write(&garbage, b"definitely not a snapshot").unwrap();
    let err = restore(&target, &config(), &RestoreOptions::new(&garbage), &mut Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DumpError::SnapshotFormat(_)));
}

#[tokio::test]
async fn test_restore_aborts_on_malformed_record() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("bad-record.snapshot");

    let mut bad = Snapshot::new(SnapshotHeader::new("a/", 1));
    bad.push(kvdump_core::record::encode(&Record::new("a/1", "one")));
    bad.push(vec![0xff, 0xff, 0xff]);
    bad.push(kvdump_core::record::encode(&Record::new("a/3", "three")));
    snapshot::write_snapshot_file(&path, &bad).await.unwrap();

    let target = MemoryStore::new();
    let err = restore(&target, &config(), &RestoreOptions::new(&path), &mut Vec::new())
        .await
        .unwrap_err();

    assert!(matches!(err, DumpError::Decode { index: 1, .. }));
    assert_eq!(target.contents(), pairs(&[("a/1", "one")]));
    assert_eq!(target.open_sessions(), 0);
}
