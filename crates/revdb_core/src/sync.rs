//! Sync reconciliation.
//!
//! Remote changes are authoritative: they are written straight into the
//! table without a revision check, under the same per-document lock as
//! local writes, so whichever of a local put and a remote change gets the
//! lock second sees the other's result. After a batch has been applied the
//! host is told that data changed, but only while the plugin is in the
//! foreground.
//!
//! Nothing here reports failures to callers. A change that is malformed or
//! cannot be applied is dropped with a warning and counted in the
//! [`SyncReport`].

use crate::document::{ID_FIELD, REV_FIELD};
use crate::error::{CoreError, CoreResult};
use crate::lifecycle::Lifecycle;
use crate::store::Store;
use crate::types::Revision;
use parking_lot::Mutex;
use revdb_codec::{Object, Value};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;

/// Wire field marking a remote removal.
pub const DELETED_FIELD: &str = "_deleted";

/// A change that originated on another device.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteChange {
    /// Replace (or create) a document with the given revision.
    Put {
        /// Document id.
        id: String,
        /// Revision assigned by the remote side, stored verbatim.
        rev: Revision,
        /// Document fields.
        body: Object,
    },
    /// Delete a document.
    Remove {
        /// Document id.
        id: String,
    },
}

impl RemoteChange {
    /// Document id.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Put { id, .. } | Self::Remove { id } => id,
        }
    }

    /// Decodes a change from its JSON form: a document with `_id` and
    /// `_rev`, or `{"_id": .., "_deleted": true}` for a removal.
    ///
    /// # Errors
    ///
    /// `InvalidDocument` without a usable `_id` or (for puts) a text
    /// `_rev`; `InvalidRevision` if the revision is not well formed.
    pub fn from_json(json: serde_json::Value) -> CoreResult<Self> {
        let Value::Object(mut body) = Value::try_from(json)? else {
            return Err(CoreError::missing_id());
        };
        let id = match body.remove(ID_FIELD) {
            Some(Value::Text(id)) if !id.is_empty() => id,
            _ => return Err(CoreError::missing_id()),
        };

        let deleted = body.remove(DELETED_FIELD);
        if deleted == Some(Value::Bool(true)) {
            return Ok(Self::Remove { id });
        }

        let rev = match body.remove(REV_FIELD) {
            Some(Value::Text(rev)) => Revision::from(rev),
            _ => return Err(CoreError::invalid_document("remote change without _rev")),
        };
        let change = Self::Put { id, rev, body };
        change.validate()?;
        Ok(change)
    }

    fn validate(&self) -> CoreResult<()> {
        if self.id().is_empty() {
            return Err(CoreError::missing_id());
        }
        if let Self::Put { rev, .. } = self {
            if !rev.is_well_formed() {
                return Err(CoreError::InvalidRevision {
                    rev: rev.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Outcome of applying one batch of remote changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Changes written to the table (including removals of absent ids).
    pub applied: usize,
    /// Changes dropped as malformed or failed.
    pub dropped: usize,
    /// Whether the host was notified.
    pub notified: bool,
}

/// Where remote changes come from. Drained on every sync-pull signal.
pub trait RemoteChangeSource: Send + Sync {
    /// Takes every change that has arrived since the last call.
    ///
    /// # Errors
    ///
    /// A transport failure; the listener logs it and applies nothing.
    fn pull(&self) -> CoreResult<Vec<RemoteChange>>;
}

/// The host's "data changed" hook. Carries no payload and may be called
/// any number of times.
pub trait HostNotifier: Send + Sync {
    /// Tells the host to refresh whatever it shows.
    fn data_changed(&self);
}

impl<F> HostNotifier for F
where
    F: Fn() + Send + Sync,
{
    fn data_changed(&self) {
        self()
    }
}

/// An in-process [`RemoteChangeSource`]: transports push, the listener
/// drains.
#[derive(Debug, Default)]
pub struct ChangeQueue {
    queue: Mutex<VecDeque<RemoteChange>>,
}

impl ChangeQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues one change.
    pub fn push(&self, change: RemoteChange) {
        self.queue.lock().push_back(change);
    }

    /// Queues several changes in order.
    pub fn extend(&self, changes: impl IntoIterator<Item = RemoteChange>) {
        self.queue.lock().extend(changes);
    }

    /// Number of queued changes.
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

impl RemoteChangeSource for ChangeQueue {
    fn pull(&self) -> CoreResult<Vec<RemoteChange>> {
        Ok(self.queue.lock().drain(..).collect())
    }
}

/// Applies remote changes and notifies the host.
pub struct SyncListener {
    store: Arc<Store>,
    lifecycle: Arc<Lifecycle>,
    notifier: Arc<dyn HostNotifier>,
}

impl SyncListener {
    /// Creates a listener writing into `store`.
    pub fn new(store: Arc<Store>, lifecycle: Arc<Lifecycle>, notifier: Arc<dyn HostNotifier>) -> Self {
        Self {
            store,
            lifecycle,
            notifier,
        }
    }

    /// Drains `source` and applies what it returns.
    pub fn on_pull(&self, source: &dyn RemoteChangeSource) -> SyncReport {
        match source.pull() {
            Ok(changes) => self.apply_batch(changes),
            Err(err) => {
                tracing::warn!(error = %err, "sync pull failed; nothing applied");
                SyncReport::default()
            }
        }
    }

    /// Applies `changes` in order, then notifies the host if anything was
    /// applied and the plugin is in the foreground.
    pub fn apply_batch(&self, changes: Vec<RemoteChange>) -> SyncReport {
        let mut report = SyncReport::default();
        if changes.is_empty() {
            return report;
        }

        if let Err(err) = self.lifecycle.ensure_operational() {
            tracing::warn!(error = %err, count = changes.len(), "dropping remote changes");
            report.dropped = changes.len();
            return report;
        }

        for change in changes {
            let id = change.id().to_string();
            match change.validate().and_then(|()| self.store.apply_remote(change)) {
                Ok(()) => report.applied += 1,
                Err(err) => {
                    tracing::warn!(id = %id, error = %err, "dropping remote change");
                    report.dropped += 1;
                }
            }
        }

        if report.applied > 0 && self.lifecycle.is_foreground() {
            self.notifier.data_changed();
            report.notified = true;
        }

        tracing::debug!(
            applied = report.applied,
            dropped = report.dropped,
            notified = report.notified,
            "remote batch processed"
        );
        report
    }
}

impl std::fmt::Debug for SyncListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncListener")
            .field("lifecycle", &self.lifecycle.state())
            .finish_non_exhaustive()
    }
}
