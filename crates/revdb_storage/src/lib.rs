//! # revdb storage
//!
//! Byte-level backends underneath the revdb document log.
//!
//! A backend is an append-only byte store. It knows nothing about
//! documents, revisions or record framing; `revdb_core` owns the log
//! format and only asks the backend to append, read back, sync and
//! truncate.
//!
//! ## Backends
//!
//! - [`InMemoryBackend`] - ephemeral stores and tests
//! - [`FileBackend`] - a single file on the local file system
//!
//! ## Example
//!
//! ```rust
//! use revdb_storage::{InMemoryBackend, StorageBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"note/1").unwrap();
//! assert_eq!(backend.read_at(offset, 6).unwrap(), b"note/1");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
