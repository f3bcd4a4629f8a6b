//! # revdb core
//!
//! A local, revisioned document store.
//!
//! Documents are JSON-like objects identified by `_id`. Every stored
//! document carries a revision token; an update must name the revision it
//! was based on, and a stale revision is rejected as a conflict instead of
//! silently overwriting newer data.
//!
//! This crate provides:
//! - [`Store`] - put, get, remove, bulk writes and id-prefix queries
//! - an append-only document log with crash recovery and compaction
//! - a [`ChangeFeed`] of committed mutations
//! - [`SyncListener`] - applies changes from other devices without a
//!   revision check and tells the host when data changed
//! - [`PluginRuntime`] - lifecycle gating for an embedding host
//! - wire records ([`DbResult`], [`DbError`], [`WriteAck`]) in the shape
//!   the host expects
//!
//! ## Example
//!
//! ```rust
//! use revdb_core::{Document, ErrorName, Query, Store};
//!
//! let store = Store::open_in_memory().unwrap();
//!
//! let v1 = store.put(Document::new("note/1").with_field("text", "a")).unwrap();
//! let v2 = store
//!     .put(Document::new("note/1").with_rev(v1.rev.clone()).with_field("text", "b"))
//!     .unwrap();
//!
//! let stale = store
//!     .put(Document::new("note/1").with_rev(v1.rev).with_field("text", "c"))
//!     .unwrap_err();
//! assert_eq!(stale.name(), ErrorName::Conflict);
//!
//! let notes = store.all_docs(&Query::prefix("note/")).unwrap();
//! assert_eq!(notes[0].rev, Some(v2.rev));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod api;
mod change_feed;
mod config;
mod dir;
mod document;
mod error;
mod lifecycle;
mod lock;
mod log;
mod plugin;
mod query;
mod resolver;
mod stats;
mod store;
mod sync;
mod table;
mod types;
mod wire;

pub use change_feed::{ChangeEvent, ChangeFeed, ChangeKind, ChangeOrigin};
pub use config::Config;
pub use document::{Document, RemoveTarget, ID_FIELD, REV_FIELD};
pub use error::{
    CoreError, CoreResult, MSG_CONFLICT, MSG_MISSING_ID, MSG_NOT_ARRAY, MSG_NOT_FOUND,
    MSG_PARAM_ERROR,
};
pub use lifecycle::{HostSignal, Lifecycle, LifecycleState};
pub use log::{
    scan_log, verify_log, LogRecord, LogScan, RecordKind, VerifyReport, MAX_RECORD_SIZE,
    MIN_RECORD_SIZE,
};
pub use plugin::PluginRuntime;
pub use query::Query;
pub use stats::{CompactionStats, StoreStats};
pub use store::Store;
pub use sync::{
    ChangeQueue, HostNotifier, RemoteChange, RemoteChangeSource, SyncListener, SyncReport,
    DELETED_FIELD,
};
pub use types::{Revision, SequenceNumber, MAX_REV_LEN};
pub use wire::{DbError, DbResult, ErrorName, WriteAck};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export the value model so callers need only this crate.
pub use revdb_codec::{Object, Value};
