//! Error types for the document store.

use crate::wire::ErrorName;
use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Message used when a document has no usable `_id`.
pub const MSG_MISSING_ID: &str = "doc not _id field";
/// Message used when a revision check fails.
pub const MSG_CONFLICT: &str = "Document update conflict";
/// Message used when the target document does not exist.
pub const MSG_NOT_FOUND: &str = "missing";
/// Message used for a malformed `allDocs` argument.
pub const MSG_PARAM_ERROR: &str = "param error";
/// Message used when `bulkDocs` receives something other than a sequence.
pub const MSG_NOT_ARRAY: &str = "not array";

/// Errors produced by the store.
///
/// The first group (`InvalidDocument` through `NotArray`) are the caller
/// errors of the document API and map one-to-one onto the wire error
/// names. Everything else is infrastructure and surfaces on the wire as
/// `exception`.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The request was malformed, e.g. a document without `_id`.
    #[error("{message}")]
    InvalidDocument {
        /// Human readable reason.
        message: String,
    },

    /// The supplied revision does not match the stored one.
    #[error("Document update conflict")]
    Conflict {
        /// Document the write targeted.
        id: String,
    },

    /// The targeted document does not exist.
    #[error("missing")]
    NotFound {
        /// Document the operation targeted.
        id: String,
    },

    /// `allDocs` received an argument that is neither a string nor a list
    /// of strings.
    #[error("param error")]
    InvalidQuery,

    /// `bulkDocs` received something other than a sequence.
    #[error("not array")]
    NotArray,

    /// A revision string could not be parsed.
    #[error("invalid revision {rev:?}")]
    InvalidRevision {
        /// The offending text.
        rev: String,
    },

    /// The host has not delivered the ready signal yet.
    #[error("plugin not ready")]
    NotReady,

    /// The host has shut the plugin down.
    #[error("plugin has exited")]
    Exited,

    /// The store has been closed.
    #[error("store is closed")]
    Closed,

    /// Another process holds the store directory.
    #[error("database locked: another process has exclusive access")]
    DatabaseLocked,

    /// The store directory is missing, already exists, or is not a directory.
    #[error("invalid store location: {message}")]
    InvalidLocation {
        /// Description of the problem.
        message: String,
    },

    /// A complete log record could not be interpreted.
    #[error("log corruption at offset {offset}: {message}")]
    LogCorruption {
        /// Offset of the bad record.
        offset: u64,
        /// What was wrong.
        message: String,
    },

    /// A log record failed its checksum.
    #[error("checksum mismatch at offset {offset}: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Offset of the bad record.
        offset: u64,
        /// Checksum stored in the record.
        expected: u32,
        /// Checksum computed over the record.
        actual: u32,
    },

    /// Storage backend failure.
    #[error("storage error: {0}")]
    Storage(#[from] revdb_storage::StorageError),

    /// Document body encoding failure.
    #[error("codec error: {0}")]
    Codec(#[from] revdb_codec::CodecError),

    /// File system failure outside the backend.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON (de)serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Creates an invalid document error.
    pub fn invalid_document(message: impl Into<String>) -> Self {
        Self::InvalidDocument {
            message: message.into(),
        }
    }

    /// The error for a document without a usable `_id`.
    pub fn missing_id() -> Self {
        Self::invalid_document(MSG_MISSING_ID)
    }

    /// Creates a conflict error.
    pub fn conflict(id: impl Into<String>) -> Self {
        Self::Conflict { id: id.into() }
    }

    /// Creates a not found error.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Creates a log corruption error.
    pub fn log_corruption(offset: u64, message: impl Into<String>) -> Self {
        Self::LogCorruption {
            offset,
            message: message.into(),
        }
    }

    /// Creates an invalid location error.
    pub fn invalid_location(message: impl Into<String>) -> Self {
        Self::InvalidLocation {
            message: message.into(),
        }
    }

    /// Wire name of this error.
    #[must_use]
    pub fn name(&self) -> ErrorName {
        match self {
            Self::Conflict { .. } => ErrorName::Conflict,
            Self::NotFound { .. } => ErrorName::NotFound,
            _ => ErrorName::Exception,
        }
    }

    /// Document id the error refers to, when there is one.
    #[must_use]
    pub fn doc_id(&self) -> Option<&str> {
        match self {
            Self::Conflict { id } | Self::NotFound { id } => Some(id),
            _ => None,
        }
    }

    /// Log offset of a corruption error.
    #[must_use]
    pub fn log_offset(&self) -> Option<u64> {
        match self {
            Self::LogCorruption { offset, .. } | Self::ChecksumMismatch { offset, .. } => {
                Some(*offset)
            }
            _ => None,
        }
    }
}
