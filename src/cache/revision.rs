//! Per-key append-only revision log
//!
//! Each key maps to a sequence of revision records in append order. The log
//! itself does not validate monotonicity; the transaction layer assigns
//! strictly increasing numbers.

use std::collections::HashMap;

use crate::cache::entry::EntityRevision;
use crate::cache::types::CacheKey;

/// Append-only map of key -> revision sequence
#[derive(Debug, Default)]
pub(crate) struct RevisionLog {
    logs: HashMap<CacheKey, Vec<EntityRevision>>,
}

impl RevisionLog {
    pub(crate) fn append(&mut self, key: CacheKey, revision: EntityRevision) {
        self.logs.entry(key).or_default().push(revision);
    }

    pub(crate) fn append_many(&mut self, key: CacheKey, revisions: Vec<EntityRevision>) {
        if revisions.is_empty() {
            return;
        }
        self.logs.entry(key).or_default().extend(revisions);
    }

    /// Revisions for a key in insertion order
    pub(crate) fn get(&self, key: &str) -> &[EntityRevision] {
        self.logs.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Highest revision number recorded for a key
    pub(crate) fn last_revision(&self, key: &str) -> Option<u64> {
        self.logs
            .get(key)
            .and_then(|revisions| revisions.last())
            .map(|revision| revision.revision)
    }

    pub(crate) fn clear_key(&mut self, key: &str) {
        self.logs.remove(key);
    }

    pub(crate) fn clear(&mut self) {
        self.logs.clear();
    }
}
