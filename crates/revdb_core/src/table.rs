//! The document table.
//!
//! A map from id to the current document and its revision, backed by the
//! document log. The table applies writes unconditionally; revision checks
//! live in the resolver and remote changes come from the sync listener.
//! Both call in here while holding the document's stripe lock.
//!
//! Every raw write appends to the log, then updates memory, then publishes
//! a change event, all under the table's write lock, so log order, scan
//! order and change-feed order agree.

use crate::change_feed::{ChangeEvent, ChangeFeed, ChangeKind, ChangeOrigin};
use crate::dir::StoreDir;
use crate::document::Document;
use crate::error::{CoreError, CoreResult};
use crate::log::{scan_log, LogRecord};
use crate::stats::{CompactionStats, StoreStats};
use crate::types::{Revision, SequenceNumber};
use parking_lot::RwLock;
use revdb_codec::{from_cbor, object_to_cbor, Object};
use revdb_storage::{FileBackend, InMemoryBackend, StorageBackend};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;

/// A document body together with its log encoding.
#[derive(Debug, Clone)]
pub(crate) struct EncodedBody {
    pub(crate) fields: Object,
    pub(crate) bytes: Vec<u8>,
}

impl EncodedBody {
    /// Fails with `TooDeep` for a body the log could not read back.
    pub(crate) fn new(fields: Object) -> CoreResult<Self> {
        let bytes = object_to_cbor(&fields)?;
        Ok(Self { fields, bytes })
    }
}

/// What a raw put did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RawWrite {
    pub(crate) sequence: SequenceNumber,
    pub(crate) kind: ChangeKind,
}

#[derive(Debug)]
struct Entry {
    rev: Revision,
    body: Object,
    position: u64,
    sequence: SequenceNumber,
}

struct TableState {
    docs: HashMap<String, Entry>,
    /// Scan order: position -> id.
    order: BTreeMap<u64, String>,
    next_position: u64,
    last_sequence: SequenceNumber,
    log_records: u64,
    compactions: u64,
    log: Box<dyn StorageBackend>,
    /// Set when a compaction replaced the log file but could not reopen it.
    log_lost: bool,
}

impl TableState {
    fn new(log: Box<dyn StorageBackend>) -> Self {
        Self {
            docs: HashMap::new(),
            order: BTreeMap::new(),
            next_position: 0,
            last_sequence: SequenceNumber::default(),
            log_records: 0,
            compactions: 0,
            log,
            log_lost: false,
        }
    }

    /// Inserts or replaces a document in memory. Returns true for an insert.
    fn install(&mut self, id: &str, rev: Revision, body: Object, sequence: SequenceNumber) -> bool {
        if let Some(entry) = self.docs.get_mut(id) {
            entry.rev = rev;
            entry.body = body;
            entry.sequence = sequence;
            return false;
        }
        let position = self.next_position;
        self.next_position += 1;
        self.order.insert(position, id.to_string());
        self.docs.insert(
            id.to_string(),
            Entry {
                rev,
                body,
                position,
                sequence,
            },
        );
        true
    }

    fn uninstall(&mut self, id: &str) -> Option<Entry> {
        let entry = self.docs.remove(id)?;
        self.order.remove(&entry.position);
        Some(entry)
    }

    fn replay(&mut self, offset: u64, record: LogRecord) -> CoreResult<()> {
        self.last_sequence = self.last_sequence.max(record.sequence());
        self.log_records += 1;
        match record {
            LogRecord::Put {
                sequence,
                id,
                rev,
                body,
            } => {
                let fields = from_cbor(&body)
                    .map_err(|err| CoreError::log_corruption(offset, err.to_string()))?
                    .into_object()
                    .ok_or_else(|| CoreError::log_corruption(offset, "body is not an object"))?;
                self.install(&id, rev, fields, sequence);
            }
            LogRecord::Remove { id, .. } => {
                if self.uninstall(&id).is_none() {
                    tracing::debug!(id = %id, offset, "log removes a document that is not present");
                }
            }
            LogRecord::Checkpoint { .. } => {}
        }
        Ok(())
    }

    fn document(id: &str, entry: &Entry) -> Document {
        Document {
            id: id.to_string(),
            rev: Some(entry.rev.clone()),
            body: entry.body.clone(),
        }
    }
}

/// Durable id -> document mapping.
pub(crate) struct DocumentTable {
    state: RwLock<TableState>,
    dir: Option<StoreDir>,
    feed: ChangeFeed,
    sync_on_write: bool,
}

impl DocumentTable {
    /// Replays `log` and returns the rebuilt table.
    ///
    /// A torn final record is cut off; any other damage is an error.
    pub(crate) fn open(
        mut log: Box<dyn StorageBackend>,
        dir: Option<StoreDir>,
        feed: ChangeFeed,
        sync_on_write: bool,
    ) -> CoreResult<Self> {
        let data = log.read_all()?;
        let scan = scan_log(&data)?;

        if scan.torn_tail {
            tracing::warn!(
                valid_len = scan.valid_len,
                discarded = data.len() as u64 - scan.valid_len,
                "discarding torn record at end of document log"
            );
            if let Some(dir) = &dir {
                let start = usize::try_from(scan.valid_len).unwrap_or(data.len());
                dir.preserve_torn_tail(&data[start..])?;
            }
            log.truncate(scan.valid_len)?;
            log.sync()?;
        }

        let mut state = TableState::new(log);
        for (offset, record) in scan.records {
            state.replay(offset, record)?;
        }

        tracing::debug!(
            documents = state.docs.len(),
            records = state.log_records,
            last_sequence = state.last_sequence.as_u64(),
            "document log replayed"
        );

        Ok(Self {
            state: RwLock::new(state),
            dir,
            feed,
            sync_on_write,
        })
    }

    pub(crate) fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    pub(crate) fn dir(&self) -> Option<&StoreDir> {
        self.dir.as_ref()
    }

    /// Current document, if any.
    pub(crate) fn get(&self, id: &str) -> Option<Document> {
        let state = self.state.read();
        state
            .docs
            .get(id)
            .map(|entry| TableState::document(id, entry))
    }

    /// Current revision, if any.
    pub(crate) fn current_rev(&self, id: &str) -> Option<Revision> {
        self.state.read().docs.get(id).map(|entry| entry.rev.clone())
    }

    pub(crate) fn len(&self) -> usize {
        self.state.read().docs.len()
    }

    /// Live documents whose id satisfies `predicate`, in scan order.
    pub(crate) fn scan(&self, mut predicate: impl FnMut(&str) -> bool) -> Vec<Document> {
        let state = self.state.read();
        state
            .order
            .values()
            .filter(|id| predicate(id.as_str()))
            .filter_map(|id| {
                state
                    .docs
                    .get(id)
                    .map(|entry| TableState::document(id, entry))
            })
            .collect()
    }

    /// Writes `body` under `rev` without any revision check.
    pub(crate) fn raw_put(
        &self,
        id: &str,
        rev: Revision,
        body: EncodedBody,
        origin: ChangeOrigin,
    ) -> CoreResult<RawWrite> {
        let mut state = self.state.write();
        let sequence = state.last_sequence.next();

        self.append(
            &mut state,
            &LogRecord::Put {
                sequence,
                id: id.to_string(),
                rev: rev.clone(),
                body: body.bytes,
            },
        )?;
        state.last_sequence = sequence;

        let kind = if state.install(id, rev.clone(), body.fields, sequence) {
            ChangeKind::Insert
        } else {
            ChangeKind::Update
        };

        self.feed.emit(ChangeEvent {
            sequence,
            id: id.to_string(),
            rev,
            kind,
            origin,
        });
        Ok(RawWrite { sequence, kind })
    }

    /// Deletes `id` without any revision check. Returns the revision it had,
    /// or `None` (and writes nothing) if it was absent.
    pub(crate) fn raw_remove(&self, id: &str, origin: ChangeOrigin) -> CoreResult<Option<Revision>> {
        let mut state = self.state.write();
        let Some(rev) = state.docs.get(id).map(|entry| entry.rev.clone()) else {
            return Ok(None);
        };
        let sequence = state.last_sequence.next();

        self.append(
            &mut state,
            &LogRecord::Remove {
                sequence,
                id: id.to_string(),
                rev: rev.clone(),
            },
        )?;
        state.last_sequence = sequence;
        state.uninstall(id);

        self.feed.emit(ChangeEvent {
            sequence,
            id: id.to_string(),
            rev: rev.clone(),
            kind: ChangeKind::Delete,
            origin,
        });
        Ok(Some(rev))
    }

    fn append(&self, state: &mut TableState, record: &LogRecord) -> CoreResult<()> {
        if state.log_lost {
            return Err(CoreError::Io(io::Error::new(
                io::ErrorKind::Other,
                "document log unavailable after failed compaction",
            )));
        }

        let bytes = record.encode()?;
        let offset = state.log.append(&bytes)?;
        let durable = if self.sync_on_write {
            state.log.sync()
        } else {
            state.log.flush()
        };

        if let Err(err) = durable {
            if let Err(undo) = state.log.truncate(offset) {
                tracing::warn!(offset, error = %undo, "could not roll back failed log append");
            }
            return Err(err.into());
        }

        state.log_records += 1;
        Ok(())
    }

    /// Size and log statistics.
    pub(crate) fn stats(&self) -> CoreResult<StoreStats> {
        let state = self.state.read();
        let documents = state.docs.len() as u64;
        Ok(StoreStats {
            documents,
            log_records: state.log_records,
            dead_records: state.log_records.saturating_sub(documents),
            log_bytes: state.log.size()?,
            last_sequence: state.last_sequence.as_u64(),
            compactions: state.compactions,
        })
    }

    /// Rewrites the log as one put per live document, in scan order,
    /// followed by a checkpoint carrying the last sequence.
    ///
    /// Holds the write lock throughout, so no write can interleave.
    pub(crate) fn compact(&self) -> CoreResult<CompactionStats> {
        let mut state = self.state.write();
        let records_before = state.log_records;
        let bytes_before = state.log.size()?;

        let mut image = Vec::with_capacity(usize::try_from(bytes_before).unwrap_or(0));
        for id in state.order.values() {
            let Some(entry) = state.docs.get(id) else {
                continue;
            };
            let record = LogRecord::Put {
                sequence: entry.sequence,
                id: id.clone(),
                rev: entry.rev.clone(),
                body: object_to_cbor(&entry.body)?,
            };
            image.extend(record.encode()?);
        }
        image.extend(
            LogRecord::Checkpoint {
                sequence: state.last_sequence,
            }
            .encode()?,
        );

        match &self.dir {
            Some(dir) => Self::replace_log_file(&mut state, dir, &image)?,
            None => {
                state.log.truncate(0)?;
                state.log.append(&image)?;
                state.log.sync()?;
            }
        }

        state.log_records = state.docs.len() as u64 + 1;
        state.compactions += 1;
        let stats = CompactionStats {
            records_before,
            records_after: state.log_records,
            bytes_before,
            bytes_after: image.len() as u64,
        };

        tracing::debug!(
            records_before = stats.records_before,
            records_after = stats.records_after,
            bytes_saved = stats.bytes_saved(),
            "document log compacted"
        );
        Ok(stats)
    }

    fn replace_log_file(state: &mut TableState, dir: &StoreDir, image: &[u8]) -> CoreResult<()> {
        let temp_path = dir.compact_path();
        let log_path = dir.log_path();

        {
            let mut temp = FileBackend::open(&temp_path)?;
            temp.truncate(0)?;
            temp.append(image)?;
            temp.sync()?;
        }

        // Release the old handle before the rename replaces the file.
        state.log = Box::new(InMemoryBackend::new());
        let renamed = fs::rename(&temp_path, &log_path);

        match FileBackend::open(&log_path) {
            Ok(backend) => state.log = Box::new(backend),
            Err(err) => {
                state.log_lost = true;
                return Err(err.into());
            }
        }
        renamed?;
        dir.sync()
    }

    /// Flushes and syncs the log.
    pub(crate) fn sync(&self) -> CoreResult<()> {
        let mut state = self.state.write();
        if state.log_lost {
            return Ok(());
        }
        state.log.flush()?;
        state.log.sync()?;
        Ok(())
    }

    /// The log image, for tests and tools.
    #[cfg(test)]
    pub(crate) fn log_bytes(&self) -> CoreResult<Vec<u8>> {
        Ok(self.state.read().log.read_all()?)
    }
}

impl std::fmt::Debug for DocumentTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentTable")
            .field("documents", &self.len())
            .field("persistent", &self.dir.is_some())
            .finish()
    }
}
