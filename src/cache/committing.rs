//! Commit-time staging surface
//!
//! A committing transaction is threaded through the revision-merge strategy
//! and the commit hook while a live transaction commits. It accumulates the
//! entries and the revision set that will be installed, and gives user
//! hooks the only sanctioned way to adjust revision retention. It is never
//! exposed to readers.

use std::collections::HashMap;

use crate::cache::entry::{EntityRevision, EntryState};
use crate::cache::types::{CacheKey, EntityHandle};

/// Entry staged for installation into the primary store
#[derive(Debug, Clone)]
pub(crate) struct StagedEntry {
    pub(crate) key: CacheKey,
    pub(crate) handle: EntityHandle,
    pub(crate) state: EntryState,
}

/// Write-staging channel passed to user hooks during commit
#[derive(Debug, Default)]
pub struct CommittingTransaction {
    staged: Vec<StagedEntry>,
    merged_revisions: HashMap<CacheKey, Vec<EntityRevision>>,
}

impl CommittingTransaction {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// The revision set that will be installed if commit completes
    pub fn merged_revisions(&self) -> &HashMap<CacheKey, Vec<EntityRevision>> {
        &self.merged_revisions
    }

    /// Drop all staged revisions for a key
    pub fn clear_revisions(&mut self, key: &str) {
        self.merged_revisions.remove(key);
    }

    /// Append to the staged revisions for a key, creating the entry if absent
    pub fn append_revisions(
        &mut self,
        key: impl Into<CacheKey>,
        revisions: Vec<EntityRevision>,
    ) {
        if revisions.is_empty() {
            return;
        }
        self.merged_revisions
            .entry(key.into())
            .or_default()
            .extend(revisions);
    }

    pub(crate) fn stage_entry(&mut self, key: CacheKey, handle: EntityHandle, state: EntryState) {
        self.staged.push(StagedEntry { key, handle, state });
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        Vec<StagedEntry>,
        HashMap<CacheKey, Vec<EntityRevision>>,
    ) {
        (self.staged, self.merged_revisions)
    }
}
