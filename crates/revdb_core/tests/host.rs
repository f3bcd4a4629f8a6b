//! The store as a host sees it: JSON calls through the plugin runtime,
//! lifecycle signals and sync pulls.

use revdb_core::{
    ChangeQueue, LifecycleState, PluginRuntime, RemoteChange, RemoteChangeSource, Store,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

struct Host {
    runtime: PluginRuntime,
    queue: Arc<ChangeQueue>,
    refreshes: Arc<AtomicUsize>,
}

fn host(store: Store) -> Host {
    let queue = Arc::new(ChangeQueue::new());
    let refreshes = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&refreshes);
    let runtime = PluginRuntime::new(
        Arc::new(store),
        Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    )
    .with_source(Arc::clone(&queue) as Arc<dyn RemoteChangeSource>);
    Host {
        runtime,
        queue,
        refreshes,
    }
}

fn remote(json: Value) -> RemoteChange {
    RemoteChange::from_json(json).unwrap()
}

#[test]
fn note_editing_session() {
    let host = host(Store::open_in_memory().unwrap());
    let db = &host.runtime;
    db.on_ready();
    db.on_enter();

    let first = db.put(json!({"_id": "note/1", "text": "a"}));
    let rev1 = first["rev"].clone();
    assert_eq!(first["ok"], json!(true));

    let second = db.put(json!({"_id": "note/1", "_rev": rev1, "text": "b"}));
    let rev2 = second["rev"].clone();
    assert_ne!(rev1, rev2);

    let stale = db.put(json!({"_id": "note/1", "_rev": rev1, "text": "c"}));
    assert_eq!(
        serde_json::to_string(&stale).unwrap(),
        r#"{"error":true,"name":"conflict","message":"Document update conflict"}"#
    );
    // Repeating the stale write fails the same way.
    assert_eq!(db.put(json!({"_id": "note/1", "_rev": rev1, "text": "c"})), stale);

    let current = db.get("note/1");
    assert_eq!(current["_rev"], rev2);
    assert_eq!(current["text"], json!("b"));
}

#[test]
fn success_record_key_order() {
    let host = host(Store::open_in_memory().unwrap());
    host.runtime.on_ready();
    let ack = host.runtime.put(json!({"_id": "a"}));
    let text = serde_json::to_string(&ack).unwrap();
    let rev = ack["rev"].as_str().unwrap();
    assert_eq!(text, format!(r#"{{"id":"a","rev":"{rev}","ok":true}}"#));
}

#[test]
fn bulk_docs_reports_each_item() {
    let host = host(Store::open_in_memory().unwrap());
    let db = &host.runtime;
    db.on_ready();
    let existing = db.put(json!({"_id": "c", "n": 1}));

    let results = db.bulk_docs(json!([
        {"_id": "a", "n": 1},
        {"n": 2},
        {"_id": "c", "_rev": "1-0000", "n": 3},
        {"_id": "d", "n": 4},
    ]));
    let results = results.as_array().unwrap();
    assert_eq!(results.len(), 4);
    assert_eq!(results[0]["ok"], json!(true));
    assert_eq!(results[1]["name"], json!("exception"));
    assert_eq!(results[2]["name"], json!("conflict"));
    assert_eq!(results[2]["id"], json!("c"));
    assert_eq!(results[3]["ok"], json!(true));

    assert_eq!(db.get("c")["_rev"], existing["rev"]);
    assert_eq!(db.get("c")["n"], json!(1));
    assert_eq!(db.all_docs(None).as_array().unwrap().len(), 3);
}

#[test]
fn remote_changes_refresh_only_the_visible_plugin() {
    let host = host(Store::open_in_memory().unwrap());
    let db = &host.runtime;
    db.on_ready();

    db.put(json!({"_id": "note/1", "text": "local"}));
    host.queue
        .push(remote(json!({"_id": "note/1", "_rev": "5-abc", "text": "remote"})));
    let report = db.on_sync_pull();
    assert_eq!(report.applied, 1);
    assert!(!report.notified);
    assert_eq!(db.get("note/1")["text"], json!("remote"));

    db.on_enter();
    host.queue.extend([
        remote(json!({"_id": "note/2", "_rev": "1-def"})),
        remote(json!({"_id": "note/1", "_deleted": true})),
    ]);
    let report = db.on_sync_pull();
    assert_eq!(report.applied, 2);
    assert!(report.notified);
    assert_eq!(host.refreshes.load(Ordering::SeqCst), 1);
    assert!(db.get("note/1").is_null());

    // A local update must build on the remote revision.
    let stale = db.put(json!({"_id": "note/2", "_rev": "1-local"}));
    assert_eq!(stale["name"], json!("conflict"));
    let fresh = db.put(json!({"_id": "note/2", "_rev": "1-def"}));
    assert_eq!(fresh["ok"], json!(true));

    db.on_out();
    host.queue
        .push(remote(json!({"_id": "note/3", "_rev": "2-aaa"})));
    db.on_sync_pull();
    assert_eq!(host.refreshes.load(Ordering::SeqCst), 1);
}

#[test]
fn malformed_remote_json_is_rejected_before_queueing() {
    assert!(RemoteChange::from_json(json!({"_rev": "1-a"})).is_err());
    assert!(RemoteChange::from_json(json!({"_id": "a"})).is_err());
    assert!(RemoteChange::from_json(json!({"_id": "a", "_rev": "x y"})).is_err());
    assert_eq!(
        remote(json!({"_id": "a", "_deleted": true})),
        RemoteChange::Remove { id: "a".into() }
    );
}

#[test]
fn lifecycle_gates_every_operation() {
    let host = host(Store::open_in_memory().unwrap());
    let db = &host.runtime;

    assert_eq!(db.put(json!({"_id": "a"}))["message"], json!("plugin not ready"));
    host.queue.push(remote(json!({"_id": "b", "_rev": "1-b"})));
    assert_eq!(db.on_sync_pull().dropped, 1);

    assert_eq!(db.on_ready(), LifecycleState::Ready);
    assert_eq!(db.put(json!({"_id": "a"}))["ok"], json!(true));

    db.on_enter();
    assert_eq!(db.on_detach(), LifecycleState::Foreground);
    assert!(db.lifecycle().is_detached());
    assert_eq!(db.get("a")["_id"], json!("a"));

    assert_eq!(db.on_exit(), LifecycleState::Exited);
    assert_eq!(db.get("a")["message"], json!("plugin has exited"));
    assert_eq!(db.on_enter(), LifecycleState::Exited);
}

#[test]
fn documents_survive_plugin_restart() {
    let dir = tempdir().unwrap();
    {
        let host = host(Store::open(dir.path()).unwrap());
        host.runtime.on_ready();
        host.runtime
            .put(json!({"_id": "settings", "theme": "dark", "size": 14, "tags": ["a", null]}));
        host.runtime.on_exit();
    }

    let host = host(Store::open(dir.path()).unwrap());
    host.runtime.on_ready();
    let doc = host.runtime.get("settings");
    assert_eq!(doc["theme"], json!("dark"));
    assert_eq!(doc["size"], json!(14));
    assert_eq!(doc["tags"], json!(["a", null]));
}
