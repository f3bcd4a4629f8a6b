//! JSON entry points.
//!
//! These take and return `serde_json::Value` in the shapes the host
//! exchanges: documents carry `_id`/`_rev`, writes answer with
//! [`DbResult`](crate::DbResult) records. Caller errors come back as error
//! records, never as `Err`.

use crate::document::{Document, RemoveTarget};
use crate::error::{CoreError, CoreResult};
use crate::query::Query;
use crate::store::Store;
use crate::wire::{DbError, DbResult};
use serde_json::Value;

fn error_json(err: &CoreError) -> Value {
    DbResult::Err(DbError::from(err)).to_json()
}

fn remove_target(arg: Value) -> CoreResult<RemoveTarget> {
    match arg {
        Value::String(id) => Ok(RemoveTarget::Id(id)),
        doc @ Value::Object(_) => Document::from_json(doc).map(RemoveTarget::Doc),
        _ => Err(CoreError::missing_id()),
    }
}

impl Store {
    /// `get`: the document in wire form, or `null` when absent.
    pub fn get_json(&self, id: &str) -> Value {
        match self.get(id) {
            Ok(Some(doc)) => doc.to_json(),
            Ok(None) => Value::Null,
            Err(err) => error_json(&err),
        }
    }

    /// `put`: one result record, without `id` on failure.
    pub fn put_json(&self, doc: Value) -> Value {
        let result = Document::from_json(doc).and_then(|doc| self.put(doc));
        DbResult::from(result).to_json()
    }

    /// `remove`: accepts an id string or a document with `_id` and,
    /// optionally, `_rev`.
    pub fn remove_json(&self, arg: Value) -> Value {
        let result = remove_target(arg).and_then(|target| self.remove(target));
        DbResult::from(result).to_json()
    }

    /// `bulkDocs`: an array of result records aligned with the input, or a
    /// single `not array` error record.
    pub fn bulk_docs_json(&self, docs: Value) -> Value {
        let Value::Array(items) = docs else {
            return error_json(&CoreError::NotArray);
        };
        let results = items
            .into_iter()
            .map(|item| {
                let result = match item {
                    Value::Object(_) => Document::from_json(item).and_then(|doc| self.put(doc)),
                    _ => Err(CoreError::missing_id()),
                };
                DbResult::for_item(result).to_json()
            })
            .collect();
        Value::Array(results)
    }

    /// `allDocs`: an array of documents, or a `param error` record.
    pub fn all_docs_json(&self, pre_key: Option<&Value>) -> Value {
        let docs = Query::from_json(pre_key).and_then(|query| self.all_docs(&query));
        match docs {
            Ok(docs) => Value::Array(docs.iter().map(Document::to_json).collect()),
            Err(err) => error_json(&err),
        }
    }
}
