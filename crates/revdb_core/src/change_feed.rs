//! Change feed for observing committed mutations.
//!
//! Every write the table commits, local or remote, is published here in
//! sequence order. Outbound sync transports poll the feed to find local
//! changes and use [`ChangeOrigin`] to avoid echoing remote ones back.
//!
//! # Usage
//!
//! ```rust
//! use revdb_core::{Document, Store};
//!
//! let store = Store::open_in_memory().unwrap();
//! let receiver = store.subscribe();
//!
//! store.put(Document::new("note/1").with_field("text", "a")).unwrap();
//!
//! let event = receiver.recv().unwrap();
//! assert_eq!(event.id, "note/1");
//! ```

use crate::types::{Revision, SequenceNumber};
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};

/// Type of change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Document created (no previous version existed).
    Insert,
    /// Document replaced.
    Update,
    /// Document removed.
    Delete,
}

/// Where a change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// A caller of this store.
    Local,
    /// The sync reconciliation listener.
    Remote,
}

/// A committed change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Log sequence of the write.
    pub sequence: SequenceNumber,
    /// Document id.
    pub id: String,
    /// Revision after an insert or update; the last revision for a delete.
    pub rev: Revision,
    /// Type of change.
    pub kind: ChangeKind,
    /// Where it came from.
    pub origin: ChangeOrigin,
}

/// Distributes committed changes to subscribers and keeps a bounded
/// history for polling.
pub struct ChangeFeed {
    subscribers: RwLock<Vec<Sender<ChangeEvent>>>,
    history: RwLock<VecDeque<ChangeEvent>>,
    max_history: usize,
}

impl ChangeFeed {
    /// Creates a change feed with the default history limit.
    pub fn new() -> Self {
        Self::with_max_history(10_000)
    }

    /// Creates a change feed with a specific history limit.
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            history: RwLock::new(VecDeque::new()),
            max_history,
        }
    }

    /// Subscribes to future events.
    ///
    /// The receiver should be drained regularly; undelivered events
    /// accumulate in the channel.
    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Publishes an event. Called by the table while it still holds its
    /// write lock, so history order is sequence order.
    pub fn emit(&self, event: ChangeEvent) {
        if self.max_history > 0 {
            let mut history = self.history.write();
            history.push_back(event.clone());
            while history.len() > self.max_history {
                history.pop_front();
            }
        }

        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Returns events with sequence greater than `cursor`, oldest first,
    /// up to `limit`.
    pub fn poll(&self, cursor: SequenceNumber, limit: usize) -> Vec<ChangeEvent> {
        let history = self.history.read();
        history
            .iter()
            .filter(|e| e.sequence > cursor)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Sequence of the newest event in history, or zero.
    pub fn latest_sequence(&self) -> SequenceNumber {
        self.history
            .read()
            .back()
            .map_or(SequenceNumber::default(), |e| e.sequence)
    }

    /// Number of connected subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Number of events held for polling.
    pub fn history_len(&self) -> usize {
        self.history.read().len()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ChangeFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeFeed")
            .field("history", &self.history_len())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
