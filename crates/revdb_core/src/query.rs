//! Range and prefix queries over document ids.

use crate::document::Document;
use crate::error::{CoreError, CoreResult};
use crate::table::DocumentTable;
use std::collections::HashSet;

/// Which documents `all_docs` returns.
///
/// Results always come back in the table's natural order (the order each
/// lineage was created), whatever the form of the query.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Query {
    /// Every live document.
    #[default]
    All,
    /// Documents whose id starts with the prefix (byte-wise,
    /// case-sensitive).
    Prefix(String),
    /// Documents whose id is in the set; unknown ids are omitted.
    Keys(Vec<String>),
}

impl Query {
    /// Prefix query.
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self::Prefix(prefix.into())
    }

    /// Key set query.
    pub fn keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Keys(keys.into_iter().map(Into::into).collect())
    }

    /// Parses the wire argument: absent or `null`, a string, or an array
    /// of strings.
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuery` ("param error") for anything else, including
    /// arrays holding non-strings.
    pub fn from_json(arg: Option<&serde_json::Value>) -> CoreResult<Self> {
        match arg {
            None | Some(serde_json::Value::Null) => Ok(Self::All),
            Some(serde_json::Value::String(prefix)) => Ok(Self::Prefix(prefix.clone())),
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .map(Self::Keys)
                .ok_or(CoreError::InvalidQuery),
            Some(_) => Err(CoreError::InvalidQuery),
        }
    }

    pub(crate) fn run(&self, table: &DocumentTable) -> Vec<Document> {
        match self {
            Self::All => table.scan(|_| true),
            Self::Prefix(prefix) => table.scan(|id| id.starts_with(prefix.as_str())),
            Self::Keys(keys) => {
                let wanted: HashSet<&str> = keys.iter().map(String::as_str).collect();
                table.scan(|id| wanted.contains(id))
            }
        }
    }
}

impl From<&str> for Query {
    fn from(prefix: &str) -> Self {
        Self::prefix(prefix)
    }
}

impl From<Vec<String>> for Query {
    fn from(keys: Vec<String>) -> Self {
        Self::Keys(keys)
    }
}
