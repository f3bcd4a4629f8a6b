//! Documents and their JSON form.

use crate::error::{CoreError, CoreResult};
use crate::types::Revision;
use revdb_codec::{Object, Value};

/// Wire name of the identifier field.
pub const ID_FIELD: &str = "_id";
/// Wire name of the revision field.
pub const REV_FIELD: &str = "_rev";

/// A document: an identifier, the revision it was read at, and its fields.
///
/// On the wire a document is one JSON object whose `_id` and `_rev` keys
/// carry the identifier and revision; here they are split out and `body`
/// holds everything else.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    /// Unique identifier.
    pub id: String,
    /// Revision the caller last observed. `None` means "create".
    pub rev: Option<Revision>,
    /// User fields.
    pub body: Object,
}

impl Document {
    /// Creates an empty document with the given id and no revision.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            rev: None,
            body: Object::new(),
        }
    }

    /// Sets the revision.
    #[must_use]
    pub fn with_rev(mut self, rev: impl Into<Revision>) -> Self {
        self.rev = Some(rev.into());
        self
    }

    /// Adds a field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.body.insert(key.into(), value.into());
        self
    }

    /// Sets a field, returning the previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.body.insert(key.into(), value.into())
    }

    /// Returns a field.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    /// Builds a document from its wire value.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDocument` ("doc not _id field") if `value` is not an
    /// object or has no non-empty text `_id`. A `_rev` that is not text is
    /// kept in its JSON rendering, so it never matches a stored revision.
    pub fn from_value(value: Value) -> CoreResult<Self> {
        let Value::Object(mut body) = value else {
            return Err(CoreError::missing_id());
        };

        let id = match body.remove(ID_FIELD) {
            Some(Value::Text(id)) if !id.is_empty() => id,
            _ => return Err(CoreError::missing_id()),
        };

        let rev = match body.remove(REV_FIELD) {
            None | Some(Value::Null) => None,
            Some(Value::Text(rev)) => Some(Revision::from(rev)),
            Some(other) => Some(Revision::from(
                serde_json::to_string(&other).unwrap_or_default(),
            )),
        };

        Ok(Self { id, rev, body })
    }

    /// Builds a document from JSON.
    ///
    /// # Errors
    ///
    /// `Codec` for an integer above `i64::MAX`, otherwise see
    /// [`Document::from_value`].
    pub fn from_json(json: serde_json::Value) -> CoreResult<Self> {
        Self::from_value(Value::try_from(json)?)
    }

    /// Parses a document from JSON text.
    ///
    /// # Errors
    ///
    /// Returns `Json` for malformed text, otherwise see
    /// [`Document::from_value`].
    pub fn from_json_str(text: &str) -> CoreResult<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    /// The wire value: the body plus `_id` and, when set, `_rev`.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut fields = self.body.clone();
        fields.insert(ID_FIELD.to_string(), Value::Text(self.id.clone()));
        if let Some(rev) = &self.rev {
            fields.insert(REV_FIELD.to_string(), Value::Text(rev.to_string()));
        }
        Value::Object(fields)
    }

    /// The wire JSON form.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::from(&self.to_value())
    }
}

/// Target of a remove: a bare id, or a document carrying id and revision.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoveTarget {
    /// Remove whatever revision is current.
    Id(String),
    /// Remove only if the stored revision matches the document's.
    Doc(Document),
}

impl RemoveTarget {
    /// Target id.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Id(id) => id,
            Self::Doc(doc) => &doc.id,
        }
    }

    /// Claimed revision, if any.
    #[must_use]
    pub fn rev(&self) -> Option<&Revision> {
        match self {
            Self::Id(_) => None,
            Self::Doc(doc) => doc.rev.as_ref(),
        }
    }
}

impl From<&str> for RemoveTarget {
    fn from(id: &str) -> Self {
        Self::Id(id.to_string())
    }
}

impl From<String> for RemoveTarget {
    fn from(id: String) -> Self {
        Self::Id(id)
    }
}

impl From<Document> for RemoveTarget {
    fn from(doc: Document) -> Self {
        Self::Doc(doc)
    }
}

impl From<&Document> for RemoveTarget {
    fn from(doc: &Document) -> Self {
        Self::Doc(doc.clone())
    }
}
