//! Revision checks for local writes.
//!
//! The resolver is the only local path into the table's raw writes. It
//! holds the document's stripe lock across lookup, comparison and write,
//! so two writers carrying the same base revision cannot both succeed.

use crate::change_feed::ChangeOrigin;
use crate::document::{Document, RemoveTarget};
use crate::error::{CoreError, CoreResult};
use crate::lock::DocLocks;
use crate::table::{DocumentTable, EncodedBody};
use crate::types::Revision;
use crate::wire::WriteAck;

pub(crate) struct Resolver<'a> {
    pub(crate) table: &'a DocumentTable,
    pub(crate) locks: &'a DocLocks,
    pub(crate) strict_create: bool,
}

impl Resolver<'_> {
    /// Creates or updates a document.
    ///
    /// - no stored document: created at generation 1 (a supplied revision
    ///   is ignored, or rejected in strict mode)
    /// - stored document: the supplied revision must equal the stored one
    pub(crate) fn put(&self, doc: Document) -> CoreResult<WriteAck> {
        if doc.id.is_empty() {
            return Err(CoreError::missing_id());
        }
        let Document { id, rev: claimed, body } = doc;
        let body = EncodedBody::new(body)?;

        let _guard = self.locks.lock(&id);
        let stored = self.table.current_rev(&id);

        let rev = match (stored, claimed) {
            (None, Some(_)) if self.strict_create => return Err(CoreError::conflict(id)),
            (None, _) => Revision::first(&id, &body.bytes),
            (Some(stored), Some(claimed)) if stored == claimed => {
                stored.next(&id, &body.bytes)?
            }
            (Some(_), _) => return Err(CoreError::conflict(id)),
        };

        self.table
            .raw_put(&id, rev.clone(), body, ChangeOrigin::Local)?;
        Ok(WriteAck::new(id, rev))
    }

    /// Removes a document, checking the revision when the target carries one.
    pub(crate) fn remove(&self, target: RemoveTarget) -> CoreResult<WriteAck> {
        let id = target.id();
        if id.is_empty() {
            return Err(CoreError::missing_id());
        }

        let _guard = self.locks.lock(id);
        let Some(stored) = self.table.current_rev(id) else {
            return Err(CoreError::not_found(id));
        };
        if let Some(claimed) = target.rev() {
            if *claimed != stored {
                return Err(CoreError::conflict(id));
            }
        }

        match self.table.raw_remove(id, ChangeOrigin::Local)? {
            Some(rev) => Ok(WriteAck::new(id, rev)),
            None => Err(CoreError::not_found(id)),
        }
    }
}
