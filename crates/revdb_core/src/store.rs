//! Store facade and recovery.

use crate::change_feed::{ChangeEvent, ChangeFeed, ChangeOrigin};
use crate::config::Config;
use crate::dir::StoreDir;
use crate::document::{Document, RemoveTarget};
use crate::error::{CoreError, CoreResult};
use crate::lock::DocLocks;
use crate::query::Query;
use crate::resolver::Resolver;
use crate::stats::{CompactionStats, StoreStats};
use crate::sync::RemoteChange;
use crate::table::{DocumentTable, EncodedBody};
use crate::types::SequenceNumber;
use crate::wire::WriteAck;
use parking_lot::RwLock;
use revdb_storage::{FileBackend, InMemoryBackend, StorageBackend};
use std::path::Path;
use std::sync::mpsc::Receiver;

/// The main store handle.
///
/// `Store` is `Send + Sync`; share it between threads with `Arc<Store>`.
///
/// # Opening a Store
///
/// ```rust,no_run
/// use revdb_core::{Document, Store};
/// use std::path::Path;
///
/// let store = Store::open(Path::new("my_store"))?;
///
/// let ack = store.put(Document::new("note/1").with_field("text", "a"))?;
/// let _updated = store.put(
///     Document::new("note/1").with_rev(ack.rev).with_field("text", "b"),
/// )?;
///
/// store.close()?;
/// # Ok::<(), revdb_core::CoreError>(())
/// ```
///
/// # In-Memory Stores
///
/// ```rust
/// let store = revdb_core::Store::open_in_memory().unwrap();
/// assert!(store.is_empty().unwrap());
/// ```
pub struct Store {
    config: Config,
    table: DocumentTable,
    locks: DocLocks,
    is_open: RwLock<bool>,
}

impl Store {
    /// Opens a store directory with the default configuration.
    ///
    /// # Errors
    ///
    /// - `DatabaseLocked` if another handle has the directory open
    /// - `LogCorruption` / `ChecksumMismatch` if the log is damaged
    /// - I/O errors
    pub fn open(path: &Path) -> CoreResult<Self> {
        Self::open_with_config(path, Config::default())
    }

    /// Opens a store directory with a custom configuration.
    ///
    /// # Errors
    ///
    /// See [`Store::open`]; also `InvalidLocation` when the directory is
    /// missing and `create_if_missing` is false, or already holds a store
    /// and `error_if_exists` is true.
    pub fn open_with_config(path: &Path, config: Config) -> CoreResult<Self> {
        let dir = StoreDir::open(path, config.create_if_missing)?;

        if config.error_if_exists && !dir.is_new() {
            return Err(CoreError::invalid_location(
                "store already exists and error_if_exists is true",
            ));
        }

        dir.remove_stale_compaction()?;

        let created = dir.is_new();
        let backend = FileBackend::open(&dir.log_path())?;
        if created {
            dir.sync()?;
        }

        tracing::debug!(path = %path.display(), created, "opening store");
        Self::build(config, Box::new(backend), Some(dir))
    }

    /// Opens a store over an arbitrary backend. Nothing is locked; the
    /// caller is responsible for exclusive access.
    ///
    /// # Errors
    ///
    /// Fails if the backend holds a damaged log.
    pub fn open_with_backend(config: Config, backend: Box<dyn StorageBackend>) -> CoreResult<Self> {
        Self::build(config, backend, None)
    }

    /// Opens an empty, non-persistent store.
    ///
    /// # Errors
    ///
    /// Does not fail in practice; the signature matches the other
    /// constructors.
    pub fn open_in_memory() -> CoreResult<Self> {
        Self::open_in_memory_with_config(Config::default())
    }

    /// Opens an empty, non-persistent store with a custom configuration.
    ///
    /// # Errors
    ///
    /// See [`Store::open_in_memory`].
    pub fn open_in_memory_with_config(config: Config) -> CoreResult<Self> {
        Self::build(config, Box::new(InMemoryBackend::new()), None)
    }

    fn build(
        config: Config,
        backend: Box<dyn StorageBackend>,
        dir: Option<StoreDir>,
    ) -> CoreResult<Self> {
        let feed = ChangeFeed::with_max_history(config.change_history);
        let table = DocumentTable::open(backend, dir, feed, config.sync_on_write)?;
        let locks = DocLocks::new(config.lock_stripes);

        Ok(Self {
            config,
            table,
            locks,
            is_open: RwLock::new(true),
        })
    }

    fn resolver(&self) -> Resolver<'_> {
        Resolver {
            table: &self.table,
            locks: &self.locks,
            strict_create: self.config.strict_create,
        }
    }

    // ========================================================================
    // Documents
    // ========================================================================

    /// Returns the current version of a document.
    ///
    /// # Errors
    ///
    /// `Closed` after [`Store::close`].
    pub fn get(&self, id: &str) -> CoreResult<Option<Document>> {
        self.ensure_open()?;
        Ok(self.table.get(id))
    }

    /// Creates or updates a document.
    ///
    /// A document without a stored counterpart is created at generation 1.
    /// Updating requires `doc.rev` to equal the stored revision.
    ///
    /// # Errors
    ///
    /// - `InvalidDocument` for an empty id
    /// - `Conflict` when the revision does not match
    /// - storage errors; the table is unchanged in that case
    pub fn put(&self, doc: Document) -> CoreResult<WriteAck> {
        self.ensure_open()?;
        let ack = self.resolver().put(doc)?;
        self.maybe_compact();
        Ok(ack)
    }

    /// Removes a document by id, or by document when the revision should
    /// be checked.
    ///
    /// # Errors
    ///
    /// - `InvalidDocument` for an empty id
    /// - `NotFound` when there is nothing to remove
    /// - `Conflict` when a supplied revision does not match
    pub fn remove(&self, target: impl Into<RemoveTarget>) -> CoreResult<WriteAck> {
        self.ensure_open()?;
        let ack = self.resolver().remove(target.into())?;
        self.maybe_compact();
        Ok(ack)
    }

    /// Puts each document independently.
    ///
    /// Results line up with the input. A failing item never affects the
    /// others, and each item is finished before the next one starts.
    pub fn bulk_docs(&self, docs: Vec<Document>) -> Vec<CoreResult<WriteAck>> {
        docs.into_iter().map(|doc| self.put(doc)).collect()
    }

    /// Returns the documents selected by `query`, in natural order.
    ///
    /// # Errors
    ///
    /// `Closed` after [`Store::close`].
    pub fn all_docs(&self, query: &Query) -> CoreResult<Vec<Document>> {
        self.ensure_open()?;
        Ok(query.run(&self.table))
    }

    /// Number of live documents.
    ///
    /// # Errors
    ///
    /// `Closed` after [`Store::close`].
    pub fn len(&self) -> CoreResult<usize> {
        self.ensure_open()?;
        Ok(self.table.len())
    }

    /// Whether there are no live documents.
    ///
    /// # Errors
    ///
    /// `Closed` after [`Store::close`].
    pub fn is_empty(&self) -> CoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Writes a remote change without a revision check.
    pub(crate) fn apply_remote(&self, change: RemoteChange) -> CoreResult<()> {
        self.ensure_open()?;
        {
            let _guard = self.locks.lock(change.id());
            match change {
                RemoteChange::Put { id, rev, body } => {
                    let body = EncodedBody::new(body)?;
                    self.table.raw_put(&id, rev, body, ChangeOrigin::Remote)?;
                }
                RemoteChange::Remove { id } => {
                    self.table.raw_remove(&id, ChangeOrigin::Remote)?;
                }
            }
        }
        self.maybe_compact();
        Ok(())
    }

    // ========================================================================
    // Change feed
    // ========================================================================

    /// Subscribes to committed changes.
    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        self.table.feed().subscribe()
    }

    /// Changes after `cursor` still held in history, oldest first.
    pub fn changes_since(&self, cursor: SequenceNumber, limit: usize) -> Vec<ChangeEvent> {
        self.table.feed().poll(cursor, limit)
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Size and log statistics.
    ///
    /// # Errors
    ///
    /// `Closed`, or a backend failure reading the log size.
    pub fn stats(&self) -> CoreResult<StoreStats> {
        self.ensure_open()?;
        self.table.stats()
    }

    /// Rewrites the log down to one record per live document.
    ///
    /// Writers block until it finishes.
    ///
    /// # Errors
    ///
    /// `Closed`, or I/O failure while writing or renaming the new log.
    pub fn compact(&self) -> CoreResult<CompactionStats> {
        self.ensure_open()?;
        self.table.compact()
    }

    fn maybe_compact(&self) {
        if self.config.compact_ratio == 0 {
            return;
        }
        let wants = match self.table.stats() {
            Ok(stats) => {
                stats.wants_compaction(self.config.compact_ratio, self.config.compact_min_records)
            }
            Err(_) => false,
        };
        if wants {
            if let Err(err) = self.table.compact() {
                tracing::warn!(error = %err, "automatic compaction failed");
            }
        }
    }

    /// Syncs the log and closes the store. Later calls fail with `Closed`.
    ///
    /// # Errors
    ///
    /// I/O failure while syncing.
    pub fn close(&self) -> CoreResult<()> {
        let mut is_open = self.is_open.write();
        if !*is_open {
            return Ok(());
        }
        self.table.sync()?;
        *is_open = false;
        tracing::debug!("store closed");
        Ok(())
    }

    /// Whether the store is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.is_open.read()
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if *self.is_open.read() {
            Ok(())
        } else {
            Err(CoreError::Closed)
        }
    }

    /// Store configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Store directory, `None` for in-memory stores.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.table.dir().map(StoreDir::path)
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(error = %err, "failed to close store");
        }
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.path())
            .field("open", &self.is_open())
            .field("table", &self.table)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change_feed::ChangeKind;
    use crate::types::Revision;
    use crate::wire::ErrorName;
    use revdb_codec::Value;
    use tempfile::tempdir;

    fn note(text: &str) -> Document {
        Document::new("note/1").with_field("text", text)
    }

    #[test]
    fn open_in_memory() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.is_open());
        assert!(store.is_empty().unwrap());
        assert!(store.path().is_none());
    }

    #[test]
    fn put_get_roundtrip() {
        let store = Store::open_in_memory().unwrap();
        let doc = note("a").with_field("tags", Value::Array(vec!["x".into()]));
        let ack = store.put(doc.clone()).unwrap();
        assert!(ack.ok);
        assert_eq!(ack.id, "note/1");

        let stored = store.get("note/1").unwrap().unwrap();
        assert_eq!(stored.rev, Some(ack.rev));
        assert_eq!(stored.body, doc.body);
    }

    #[test]
    fn note_scenario() {
        let store = Store::open_in_memory().unwrap();
        let first = store.put(note("a")).unwrap();
        let second = store.put(note("b").with_rev(first.rev.clone())).unwrap();
        let stale = store.put(note("c").with_rev(first.rev)).unwrap_err();
        assert_eq!(stale.name(), ErrorName::Conflict);
        assert_eq!(stale.to_string(), "Document update conflict");

        let current = store.get("note/1").unwrap().unwrap();
        assert_eq!(current.rev, Some(second.rev));
        assert_eq!(current.field("text"), Some(&Value::from("b")));
    }

    #[test]
    fn remove_then_recreate_starts_new_lineage() {
        let store = Store::open_in_memory().unwrap();
        let first = store.put(note("a")).unwrap();
        let second = store.put(note("b").with_rev(first.rev)).unwrap();

        let removed = store.remove("note/1").unwrap();
        assert_eq!(removed.rev, second.rev);
        assert!(store.get("note/1").unwrap().is_none());

        let recreated = store.put(note("c")).unwrap();
        assert_eq!(recreated.rev.generation(), Some(1));
    }

    #[test]
    fn bulk_items_are_independent() {
        let store = Store::open_in_memory().unwrap();
        store.put(Document::new("b")).unwrap();

        let results = store.bulk_docs(vec![
            Document::new("a"),
            Document::new(""),
            Document::new("b").with_rev("1-stale"),
        ]);
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert_eq!(results[1].as_ref().unwrap_err().name(), ErrorName::Exception);
        assert_eq!(results[2].as_ref().unwrap_err().name(), ErrorName::Conflict);
        assert!(store.get("a").unwrap().is_some());
    }

    #[test]
    fn all_docs_queries() {
        let store = Store::open_in_memory().unwrap();
        for id in ["b/1", "a/1", "b/2"] {
            store.put(Document::new(id)).unwrap();
        }
        let all: Vec<String> = store
            .all_docs(&Query::All)
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(all, vec!["b/1", "a/1", "b/2"]);
        assert_eq!(store.all_docs(&Query::prefix("b/")).unwrap().len(), 2);
    }

    #[test]
    fn closed_store_rejects_operations() {
        let store = Store::open_in_memory().unwrap();
        store.close().unwrap();
        assert!(!store.is_open());
        assert!(matches!(store.get("a"), Err(CoreError::Closed)));
        assert!(matches!(store.put(Document::new("a")), Err(CoreError::Closed)));
        assert!(store.close().is_ok());
    }

    #[test]
    fn change_events_carry_origin_and_kind() {
        let store = Store::open_in_memory().unwrap();
        let ack = store.put(Document::new("a")).unwrap();
        store.put(Document::new("a").with_rev(ack.rev)).unwrap();
        store.remove("a").unwrap();

        let events = store.changes_since(SequenceNumber::default(), 10);
        let kinds: Vec<ChangeKind> = events.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![ChangeKind::Insert, ChangeKind::Update, ChangeKind::Delete]);
        assert!(events.iter().all(|e| e.origin == ChangeOrigin::Local));

        let tail = store.changes_since(events[0].sequence, 10);
        assert_eq!(tail.len(), 2);
    }

    #[test]
    fn persistent_store_reopens() {
        let temp = tempdir().unwrap();
        let rev;
        {
            let store = Store::open(temp.path()).unwrap();
            rev = store.put(note("a")).unwrap().rev;
            assert_eq!(store.path(), Some(temp.path()));
        }
        let store = Store::open(temp.path()).unwrap();
        assert_eq!(store.get("note/1").unwrap().unwrap().rev, Some(rev));
    }

    #[test]
    fn error_if_exists() {
        let temp = tempdir().unwrap();
        drop(Store::open(temp.path()).unwrap());
        let result = Store::open_with_config(temp.path(), Config::new().error_if_exists(true));
        assert!(matches!(result, Err(CoreError::InvalidLocation { .. })));
    }

    #[test]
    fn automatic_compaction() {
        let config = Config::new().compact_ratio(1).compact_min_records(8);
        let store = Store::open_in_memory_with_config(config).unwrap();
        let mut rev: Option<Revision> = None;
        for i in 0..20 {
            let mut doc = Document::new("hot").with_field("i", i);
            doc.rev = rev.take();
            rev = Some(store.put(doc).unwrap().rev);
        }
        let stats = store.stats().unwrap();
        assert!(stats.compactions > 0);
        assert!(stats.log_records < 20);
        assert_eq!(stats.documents, 1);
        assert_eq!(stats.last_sequence, 20);
    }

    #[test]
    fn manual_compaction_keeps_documents() {
        let store = Store::open_in_memory_with_config(Config::new().compact_ratio(0)).unwrap();
        let ack = store.put(note("a")).unwrap();
        let ack = store.put(note("b").with_rev(ack.rev)).unwrap();
        store.put(Document::new("other")).unwrap();
        store.remove("other").unwrap();

        let compaction = store.compact().unwrap();
        assert_eq!(compaction.records_before, 4);
        assert_eq!(compaction.records_after, 2);
        assert_eq!(store.get("note/1").unwrap().unwrap().rev, Some(ack.rev));
    }
}
