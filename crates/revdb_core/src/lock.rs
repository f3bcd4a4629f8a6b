//! Per-document mutual exclusion.

use parking_lot::{Mutex, MutexGuard};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// A striped lock table keyed by document id.
///
/// Every mutator of a document (local put/remove, bulk items, remote sync
/// changes) holds the stripe for that id across its read-compare-write.
/// Ids that hash to the same stripe serialize with each other; ids on
/// different stripes proceed in parallel.
pub struct DocLocks {
    stripes: Box<[Mutex<()>]>,
}

impl DocLocks {
    /// Creates a table with `stripes` locks (at least one).
    #[must_use]
    pub fn new(stripes: usize) -> Self {
        let stripes = (0..stripes.max(1)).map(|_| Mutex::new(())).collect();
        Self { stripes }
    }

    /// Number of stripes.
    #[must_use]
    pub fn stripe_count(&self) -> usize {
        self.stripes.len()
    }

    /// Blocks until the stripe for `id` is held.
    pub fn lock(&self, id: &str) -> MutexGuard<'_, ()> {
        self.stripes[self.stripe_of(id)].lock()
    }

    fn stripe_of(&self, id: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        id.hash(&mut hasher);
        (hasher.finish() % self.stripes.len() as u64) as usize
    }
}

impl std::fmt::Debug for DocLocks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocLocks")
            .field("stripes", &self.stripes.len())
            .finish()
    }
}
