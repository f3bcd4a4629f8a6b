//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while encoding or decoding a document body.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Input ended in the middle of an item.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// Bytes remained after the top-level item.
    #[error("{remaining} trailing bytes after value")]
    TrailingBytes {
        /// Number of unread bytes.
        remaining: usize,
    },

    /// Indefinite-length items are never produced by the encoder.
    #[error("indefinite-length items are forbidden")]
    IndefiniteLengthForbidden,

    /// Text was not valid UTF-8.
    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    /// An unsigned integer did not fit into `i64`.
    #[error("integer overflow")]
    IntegerOverflow,

    /// The item is valid CBOR but has no document representation.
    #[error("unsupported CBOR item: {what}")]
    Unsupported {
        /// Description of the item.
        what: String,
    },

    /// Structurally invalid input.
    #[error("invalid structure: {message}")]
    InvalidStructure {
        /// What was wrong.
        message: String,
    },

    /// Nesting exceeded [`crate::MAX_DEPTH`].
    #[error("nesting deeper than {max} levels")]
    TooDeep {
        /// The configured limit.
        max: usize,
    },
}

impl CodecError {
    /// Creates an unsupported item error.
    pub fn unsupported(what: impl Into<String>) -> Self {
        Self::Unsupported { what: what.into() }
    }

    /// Creates an invalid structure error.
    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            message: message.into(),
        }
    }
}
