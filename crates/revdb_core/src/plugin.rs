//! Host-facing runtime.
//!
//! [`PluginRuntime`] is what a host embeds: it owns the store handle, the
//! lifecycle tracker and the sync listener, routes host signals, and gates
//! every database call on the lifecycle.

use crate::error::{CoreError, CoreResult};
use crate::lifecycle::{HostSignal, Lifecycle, LifecycleState};
use crate::store::Store;
use crate::sync::{HostNotifier, RemoteChangeSource, SyncListener, SyncReport};
use crate::wire::{DbError, DbResult};
use serde_json::Value;
use std::sync::Arc;

/// A store wired to a host.
///
/// ```rust
/// use revdb_core::{PluginRuntime, Store};
/// use serde_json::json;
/// use std::sync::Arc;
///
/// let store = Arc::new(Store::open_in_memory().unwrap());
/// let runtime = PluginRuntime::new(store, Arc::new(|| {}));
///
/// let early = runtime.put(json!({"_id": "a"}));
/// assert_eq!(early["message"], "plugin not ready");
///
/// runtime.on_ready();
/// assert_eq!(runtime.put(json!({"_id": "a"}))["ok"], true);
/// ```
pub struct PluginRuntime {
    store: Arc<Store>,
    lifecycle: Arc<Lifecycle>,
    listener: SyncListener,
    source: Option<Arc<dyn RemoteChangeSource>>,
}

impl PluginRuntime {
    /// Creates a runtime in the `NotReady` state.
    pub fn new(store: Arc<Store>, notifier: Arc<dyn HostNotifier>) -> Self {
        let lifecycle = Arc::new(Lifecycle::new());
        let listener = SyncListener::new(Arc::clone(&store), Arc::clone(&lifecycle), notifier);
        Self {
            store,
            lifecycle,
            listener,
            source: None,
        }
    }

    /// Sets where sync-pull signals fetch remote changes from.
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn RemoteChangeSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Lifecycle tracker.
    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Delivers a host signal. `Exit` also closes the store.
    pub fn signal(&self, signal: HostSignal) -> LifecycleState {
        let before = self.lifecycle.state();
        let after = self.lifecycle.apply(signal);
        if after == LifecycleState::Exited && before != LifecycleState::Exited {
            if let Err(err) = self.store.close() {
                tracing::warn!(error = %err, "failed to close store on exit");
            }
        }
        after
    }

    /// Host finished initializing.
    pub fn on_ready(&self) -> LifecycleState {
        self.signal(HostSignal::Ready)
    }

    /// Plugin shown.
    pub fn on_enter(&self) -> LifecycleState {
        self.signal(HostSignal::Enter)
    }

    /// Plugin hidden.
    pub fn on_out(&self) -> LifecycleState {
        self.signal(HostSignal::Out)
    }

    /// Plugin moved to its own window.
    pub fn on_detach(&self) -> LifecycleState {
        self.signal(HostSignal::Detach)
    }

    /// Host shutting down.
    pub fn on_exit(&self) -> LifecycleState {
        self.signal(HostSignal::Exit)
    }

    /// Sync-pull: drains the configured source into the store.
    pub fn on_sync_pull(&self) -> SyncReport {
        match &self.source {
            Some(source) => self.listener.on_pull(source.as_ref()),
            None => {
                tracing::debug!("sync pull without a change source");
                SyncReport::default()
            }
        }
    }

    /// Sync listener, for transports that push batches directly.
    pub fn listener(&self) -> &SyncListener {
        &self.listener
    }

    /// The store, if the lifecycle allows database access.
    ///
    /// # Errors
    ///
    /// `NotReady` before the ready signal, `Exited` after exit.
    pub fn db(&self) -> CoreResult<&Store> {
        self.lifecycle.ensure_operational()?;
        Ok(&self.store)
    }

    fn gated(&self, op: impl FnOnce(&Store) -> Value) -> Value {
        match self.db() {
            Ok(store) => op(store),
            Err(err) => refused(&err),
        }
    }

    /// Gated [`Store::get_json`].
    pub fn get(&self, id: &str) -> Value {
        self.gated(|store| store.get_json(id))
    }

    /// Gated [`Store::put_json`].
    pub fn put(&self, doc: Value) -> Value {
        self.gated(|store| store.put_json(doc))
    }

    /// Gated [`Store::remove_json`].
    pub fn remove(&self, arg: Value) -> Value {
        self.gated(|store| store.remove_json(arg))
    }

    /// Gated [`Store::bulk_docs_json`].
    pub fn bulk_docs(&self, docs: Value) -> Value {
        self.gated(|store| store.bulk_docs_json(docs))
    }

    /// Gated [`Store::all_docs_json`].
    pub fn all_docs(&self, pre_key: Option<&Value>) -> Value {
        self.gated(|store| store.all_docs_json(pre_key))
    }
}

fn refused(err: &CoreError) -> Value {
    DbResult::Err(DbError::from(err)).to_json()
}

impl std::fmt::Debug for PluginRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRuntime")
            .field("state", &self.lifecycle.state())
            .field("detached", &self.lifecycle.is_detached())
            .field("store", &self.store)
            .field("has_source", &self.source.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{ChangeQueue, RemoteChange};
    use crate::types::Revision;
    use revdb_codec::Object;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn runtime() -> (PluginRuntime, Arc<ChangeQueue>, Arc<AtomicUsize>) {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let queue = Arc::new(ChangeQueue::new());
        let notified = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&notified);
        let runtime = PluginRuntime::new(
            store,
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .with_source(Arc::clone(&queue) as Arc<dyn RemoteChangeSource>);
        (runtime, queue, notified)
    }

    fn remote(id: &str) -> RemoteChange {
        RemoteChange::Put {
            id: id.into(),
            rev: Revision::from("4-remote"),
            body: Object::new(),
        }
    }

    #[test]
    fn operations_before_ready_fail() {
        let (runtime, _, _) = runtime();
        let expected = json!({"error": true, "name": "exception", "message": "plugin not ready"});
        assert_eq!(runtime.put(json!({"_id": "a"})), expected);
        assert_eq!(runtime.get("a"), expected);
        assert_eq!(runtime.all_docs(None), expected);
        assert_eq!(runtime.bulk_docs(json!([])), expected);
        assert!(matches!(runtime.db(), Err(CoreError::NotReady)));
    }

    #[test]
    fn background_still_serves_requests() {
        let (runtime, _, _) = runtime();
        runtime.on_ready();
        runtime.on_enter();
        runtime.on_out();
        assert_eq!(runtime.state(), LifecycleState::Background);
        assert_eq!(runtime.put(json!({"_id": "a"}))["ok"], json!(true));
        assert_eq!(runtime.get("a")["_id"], json!("a"));
    }

    #[test]
    fn sync_pull_notifies_in_foreground_only() {
        let (runtime, queue, notified) = runtime();
        runtime.on_ready();

        queue.push(remote("a"));
        let report = runtime.on_sync_pull();
        assert_eq!(report.applied, 1);
        assert_eq!(notified.load(Ordering::SeqCst), 0);

        runtime.on_enter();
        runtime.on_detach();
        queue.push(remote("b"));
        assert!(runtime.on_sync_pull().notified);
        assert_eq!(notified.load(Ordering::SeqCst), 1);
        assert_eq!(runtime.get("b")["_rev"], json!("4-remote"));
    }

    #[test]
    fn sync_pull_without_source_is_empty() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let runtime = PluginRuntime::new(store, Arc::new(|| {}));
        runtime.on_ready();
        assert_eq!(runtime.on_sync_pull(), SyncReport::default());
    }

    #[test]
    fn exit_closes_the_store() {
        let (runtime, queue, _) = runtime();
        runtime.on_ready();
        runtime.put(json!({"_id": "a"}));
        assert_eq!(runtime.on_exit(), LifecycleState::Exited);

        assert_eq!(runtime.get("a")["message"], json!("plugin has exited"));
        assert!(!runtime.store.is_open());

        queue.push(remote("b"));
        assert_eq!(runtime.on_sync_pull().dropped, 1);
    }
}
