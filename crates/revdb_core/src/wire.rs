//! Result records in the shape the host expects.
//!
//! A successful write serializes as `{"id", "rev", "ok": true}` and a
//! failure as `{"error": true, "name", "message", "id"?}`, with keys in
//! exactly that order.

use crate::error::{CoreError, CoreResult};
use crate::types::Revision;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error class reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorName {
    /// Caller misuse or infrastructure failure.
    Exception,
    /// Revision mismatch.
    Conflict,
    /// Target missing.
    NotFound,
}

impl ErrorName {
    /// Wire spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exception => "exception",
            Self::Conflict => "conflict",
            Self::NotFound => "not_found",
        }
    }
}

impl fmt::Display for ErrorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Acknowledgement of a successful put or remove.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteAck {
    /// Document id.
    pub id: String,
    /// New revision for a put, last revision for a remove.
    pub rev: Revision,
    /// Always true.
    pub ok: bool,
}

impl WriteAck {
    /// Creates an acknowledgement.
    pub fn new(id: impl Into<String>, rev: Revision) -> Self {
        Self {
            id: id.into(),
            rev,
            ok: true,
        }
    }
}

/// Error record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbError {
    /// Always true.
    pub error: bool,
    /// Error class.
    pub name: ErrorName,
    /// Human readable message.
    pub message: String,
    /// Document id, when known and reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl DbError {
    /// Creates an error record without an id.
    pub fn new(name: ErrorName, message: impl Into<String>) -> Self {
        Self {
            error: true,
            name,
            message: message.into(),
            id: None,
        }
    }

    /// Attaches an id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Record for a bulk item: like `From<&CoreError>` but keeps the
    /// document id so callers can correlate failures.
    #[must_use]
    pub fn for_item(err: &CoreError) -> Self {
        let record = Self::from(err);
        match err.doc_id() {
            Some(id) => record.with_id(id),
            None => record,
        }
    }
}

impl From<&CoreError> for DbError {
    fn from(err: &CoreError) -> Self {
        Self::new(err.name(), err.to_string())
    }
}

impl From<CoreError> for DbError {
    fn from(err: CoreError) -> Self {
        Self::from(&err)
    }
}

/// Either an acknowledgement or an error record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DbResult {
    /// Write succeeded.
    Ok(WriteAck),
    /// Write failed.
    Err(DbError),
}

impl DbResult {
    /// Whether this is a success.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// Error name, for failures.
    #[must_use]
    pub fn error_name(&self) -> Option<ErrorName> {
        match self {
            Self::Ok(_) => None,
            Self::Err(err) => Some(err.name),
        }
    }

    /// Bulk item conversion; see [`DbError::for_item`].
    #[must_use]
    pub fn for_item(result: CoreResult<WriteAck>) -> Self {
        match result {
            Ok(ack) => Self::Ok(ack),
            Err(err) => Self::Err(DbError::for_item(&err)),
        }
    }

    /// JSON form.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Ok(ack) => serde_json::json!({
                "id": ack.id,
                "rev": ack.rev.as_str(),
                "ok": ack.ok,
            }),
            Self::Err(err) => {
                let mut map = serde_json::Map::new();
                map.insert("error".into(), err.error.into());
                map.insert("name".into(), err.name.as_str().into());
                map.insert("message".into(), err.message.clone().into());
                if let Some(id) = &err.id {
                    map.insert("id".into(), id.clone().into());
                }
                serde_json::Value::Object(map)
            }
        }
    }
}

impl From<CoreResult<WriteAck>> for DbResult {
    fn from(result: CoreResult<WriteAck>) -> Self {
        match result {
            Ok(ack) => Self::Ok(ack),
            Err(err) => Self::Err(DbError::from(&err)),
        }
    }
}
