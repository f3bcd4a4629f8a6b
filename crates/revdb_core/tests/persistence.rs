//! Integration tests for on-disk stores: reopen, crash recovery,
//! compaction and locking.

use revdb_core::{
    verify_log, Config, CoreError, Document, ErrorName, HostSignal, Lifecycle, Object, Query,
    RemoteChange, Revision, SequenceNumber, Store, SyncListener, Value,
};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

fn log_path(dir: &Path) -> std::path::PathBuf {
    dir.join("docs.log")
}

fn ids(store: &Store) -> Vec<String> {
    store
        .all_docs(&Query::All)
        .unwrap()
        .into_iter()
        .map(|doc| doc.id)
        .collect()
}

/// Writes a small history: three lineages, one update, one removal and a
/// recreation that moves `a` to the end.
fn write_history(store: &Store) -> Revision {
    let a = store.put(Document::new("a").with_field("n", 1)).unwrap();
    store.put(Document::new("b").with_field("n", 2)).unwrap();
    let c = store.put(Document::new("c").with_field("n", 3)).unwrap();
    store
        .put(Document::new("c").with_rev(c.rev).with_field("n", 30))
        .unwrap();
    store.remove(Document::new("a").with_rev(a.rev)).unwrap();
    store.put(Document::new("a").with_field("n", 10)).unwrap().rev
}

#[test]
fn data_and_order_survive_reopen() {
    let dir = tempdir().unwrap();
    let rev_a = {
        let store = Store::open(dir.path()).unwrap();
        let rev = write_history(&store);
        store.close().unwrap();
        rev
    };

    let store = Store::open(dir.path()).unwrap();
    assert_eq!(ids(&store), vec!["b", "c", "a"]);

    let a = store.get("a").unwrap().unwrap();
    assert_eq!(a.rev, Some(rev_a));
    assert_eq!(a.field("n"), Some(&Value::Integer(10)));

    let c = store.get("c").unwrap().unwrap();
    assert_eq!(c.rev.unwrap().generation(), Some(2));
    assert_eq!(store.stats().unwrap().last_sequence, 6);
}

#[test]
fn reopened_store_keeps_checking_revisions() {
    let dir = tempdir().unwrap();
    let first = {
        let store = Store::open(dir.path()).unwrap();
        store.put(Document::new("note/1").with_field("text", "a")).unwrap()
    };

    let store = Store::open(dir.path()).unwrap();
    let second = store
        .put(Document::new("note/1").with_rev(first.rev.clone()).with_field("text", "b"))
        .unwrap();
    assert_eq!(second.rev.generation(), Some(2));
    assert!(matches!(
        store.put(Document::new("note/1").with_rev(first.rev)),
        Err(CoreError::Conflict { .. })
    ));
}

#[test]
fn crash_image_recovers_every_acknowledged_write() {
    let dir = tempdir().unwrap();
    let crashed = tempdir().unwrap();

    let store = Store::open(dir.path()).unwrap();
    let rev_a = write_history(&store);

    // Snapshot the directory while the store is still open, as a crash
    // would leave it.
    fs::copy(log_path(dir.path()), log_path(crashed.path())).unwrap();

    let recovered = Store::open(crashed.path()).unwrap();
    assert_eq!(ids(&recovered), ids(&store));
    assert_eq!(recovered.get("a").unwrap().unwrap().rev, Some(rev_a));
}

#[test]
fn torn_tail_is_discarded() {
    let dir = tempdir().unwrap();
    {
        let store = Store::open(dir.path()).unwrap();
        store.put(Document::new("a")).unwrap();
        store.put(Document::new("b")).unwrap();
    }
    let intact = fs::metadata(log_path(dir.path())).unwrap().len();

    // A record header promising 64 bytes, followed by only a few.
    let mut file = OpenOptions::new()
        .append(true)
        .open(log_path(dir.path()))
        .unwrap();
    file.write_all(&[64, 0, 0, 0, 1, 9, 9]).unwrap();
    drop(file);

    let report = verify_log(&log_path(dir.path())).unwrap();
    assert!(report.torn_tail);
    assert!(report.is_clean());
    assert_eq!(report.records, 2);

    {
        let store = Store::open(dir.path()).unwrap();
        assert_eq!(ids(&store), vec!["a", "b"]);
        assert_eq!(fs::metadata(log_path(dir.path())).unwrap().len(), intact);
        store.put(Document::new("c")).unwrap();
    }
    assert_eq!(
        fs::read(dir.path().join("docs.log.torn")).unwrap(),
        vec![64, 0, 0, 0, 1, 9, 9]
    );

    let store = Store::open(dir.path()).unwrap();
    assert_eq!(ids(&store), vec!["a", "b", "c"]);
    assert!(!verify_log(&log_path(dir.path())).unwrap().torn_tail);
}

#[test]
fn damaged_record_refuses_to_open() {
    let dir = tempdir().unwrap();
    {
        let store = Store::open(dir.path()).unwrap();
        store.put(Document::new("a").with_field("text", "hello")).unwrap();
        store.put(Document::new("b")).unwrap();
    }

    let path = log_path(dir.path());
    let mut data = fs::read(&path).unwrap();
    data[20] ^= 0x5a;
    fs::write(&path, &data).unwrap();

    let err = Store::open(dir.path()).unwrap_err();
    assert!(matches!(
        err,
        CoreError::ChecksumMismatch { .. } | CoreError::LogCorruption { .. }
    ));
    assert_eq!(err.log_offset(), Some(0));

    let report = verify_log(&path).unwrap();
    assert_eq!(report.corrupt_at, Some(0));
    assert_eq!(report.records, 0);
}

fn nested_arrays(depth: usize) -> Value {
    (0..depth).fold(Value::Null, |inner, _| Value::Array(vec![inner]))
}

#[test]
fn over_nested_bodies_are_rejected_and_store_reopens() {
    let dir = tempdir().unwrap();
    {
        let store = Arc::new(Store::open(dir.path()).unwrap());
        store.put(Document::new("a")).unwrap();

        let err = store
            .put(Document::new("deep").with_field("v", nested_arrays(200)))
            .unwrap_err();
        assert!(matches!(err, CoreError::Codec(_)));
        assert_eq!(err.name(), ErrorName::Exception);
        assert!(store.get("deep").unwrap().is_none());

        let results = store.bulk_docs(vec![
            Document::new("deep").with_field("v", nested_arrays(200)),
            Document::new("b"),
        ]);
        assert!(results[0].is_err());
        assert!(results[1].is_ok());

        let lifecycle = Arc::new(Lifecycle::new());
        lifecycle.apply(HostSignal::Ready);
        let listener = SyncListener::new(Arc::clone(&store), lifecycle, Arc::new(|| {}));
        let mut body = Object::new();
        body.insert("v".into(), nested_arrays(200));
        let report = listener.apply_batch(vec![RemoteChange::Put {
            id: "deep".into(),
            rev: Revision::from("3-remote"),
            body,
        }]);
        assert_eq!(report.applied, 0);
        assert_eq!(report.dropped, 1);

        assert_eq!(store.stats().unwrap().log_records, 2);
    }

    let store = Store::open(dir.path()).unwrap();
    assert_eq!(ids(&store), vec!["a", "b"]);
    assert!(verify_log(&log_path(dir.path())).unwrap().is_clean());
}

#[test]
fn damaged_length_prefix_keeps_later_records() {
    let dir = tempdir().unwrap();
    {
        let store = Store::open(dir.path()).unwrap();
        for id in ["a", "b", "c", "d"] {
            store.put(Document::new(id).with_field("text", id)).unwrap();
        }
    }

    let path = log_path(dir.path());
    let original = fs::read(&path).unwrap();
    let first_len = u32::from_le_bytes(original[..4].try_into().unwrap()) as usize;

    // A length that still fits the record limit but runs past the end.
    let mut data = original.clone();
    data[first_len + 2] = 0x01;
    fs::write(&path, &data).unwrap();

    let report = verify_log(&path).unwrap();
    assert!(!report.is_clean());
    assert!(!report.torn_tail);
    assert_eq!(report.corrupt_at, Some(first_len as u64));
    assert_eq!(report.records, 1);

    let err = Store::open(dir.path()).unwrap_err();
    assert!(matches!(err, CoreError::LogCorruption { .. }));
    assert_eq!(err.log_offset(), Some(first_len as u64));

    // A wild high byte is rejected the same way.
    data[first_len + 2] = original[first_len + 2];
    data[first_len + 3] = 0x7f;
    fs::write(&path, &data).unwrap();
    assert!(Store::open(dir.path()).is_err());

    assert_eq!(fs::read(&path).unwrap(), data);
    assert!(!dir.path().join("docs.log.torn").exists());
}

#[test]
fn compaction_preserves_documents_revisions_and_order() {
    let dir = tempdir().unwrap();
    let config = Config::new().compact_ratio(0);
    let before;
    {
        let store = Store::open_with_config(dir.path(), config.clone()).unwrap();
        write_history(&store);
        before = store.all_docs(&Query::All).unwrap();

        let stats = store.compact().unwrap();
        assert_eq!(stats.records_before, 6);
        assert_eq!(stats.records_after, 4);
        assert!(stats.bytes_after < stats.bytes_before);
        assert_eq!(store.all_docs(&Query::All).unwrap(), before);

        store.put(Document::new("d")).unwrap();
    }
    assert!(!dir.path().join("docs.log.compact").exists());

    let store = Store::open_with_config(dir.path(), config).unwrap();
    let after = store.all_docs(&Query::All).unwrap();
    assert_eq!(&after[..3], &before[..]);
    assert_eq!(after[3].id, "d");

    // The checkpoint keeps the sequence moving forward.
    assert_eq!(store.stats().unwrap().last_sequence, 7);
    let report = verify_log(&log_path(dir.path())).unwrap();
    assert_eq!(report.checkpoints, 1);
    assert_eq!(report.puts, 4);
    assert_eq!(report.removes, 0);
}

#[test]
fn sequence_continues_after_compaction_and_reopen() {
    let dir = tempdir().unwrap();
    {
        let store = Store::open(dir.path()).unwrap();
        let ack = store.put(Document::new("a")).unwrap();
        store.put(Document::new("a").with_rev(ack.rev)).unwrap();
        store.compact().unwrap();
    }
    let store = Store::open(dir.path()).unwrap();
    let events = store.subscribe();
    store.put(Document::new("b")).unwrap();
    let event = events.try_recv().unwrap();
    assert_eq!(event.sequence, SequenceNumber::new(3));
}

#[test]
fn second_open_is_locked_out() {
    let dir = tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();
    assert!(matches!(
        Store::open(dir.path()),
        Err(CoreError::DatabaseLocked)
    ));
    drop(store);
    assert!(Store::open(dir.path()).is_ok());
}

#[test]
fn missing_directory_without_create() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent");
    let result = Store::open_with_config(&path, Config::new().create_if_missing(false));
    assert!(matches!(result, Err(CoreError::InvalidLocation { .. })));
    assert!(!path.exists());
}

#[test]
fn stale_compaction_file_is_removed_on_open() {
    let dir = tempdir().unwrap();
    drop(Store::open(dir.path()).unwrap());
    fs::write(dir.path().join("docs.log.compact"), b"partial").unwrap();

    let store = Store::open(dir.path()).unwrap();
    assert!(store.is_empty().unwrap());
    assert!(!dir.path().join("docs.log.compact").exists());
}
