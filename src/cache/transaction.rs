//! Live transactions
//!
//! A live transaction owns a snapshot of the primary store taken at begin
//! plus a local write overlay. Reads see the snapshot, local writes shadow
//! it, and nothing escapes until commit. Dropping an uncommitted
//! transaction discards it; there is no explicit abort.
//!
//! Commit merges every locally-changed key against the *current* primary
//! value (which may have moved on since begin), stages deep clones plus the
//! revision set shaped by the revision-merge strategy, runs the user commit
//! hook, and installs everything atomically. The whole body races the
//! configured timeout; losing the race installs nothing.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::cache::committing::CommittingTransaction;
use crate::cache::entry::{EntityRevision, EntryState};
use crate::cache::merge::MergeRequest;
use crate::cache::store::Cache;
use crate::cache::types::{CacheKey, EntityHandle, EntityValue};
use crate::error::{CacheError, Result};

/// Per-commit options
#[derive(Debug, Clone, Copy)]
pub struct CommitOptions {
    timeout: Option<Duration>,
}

impl CommitOptions {
    /// Race the commit against the given time budget
    pub fn with_timeout(limit: Duration) -> Self {
        Self {
            timeout: Some(limit),
        }
    }

    /// Let the commit run unbounded
    pub fn no_timeout() -> Self {
        Self { timeout: None }
    }
}

/// Snapshot-isolated reader and writer over the cache
pub struct LiveTransaction {
    cache: Cache,
    snapshot: HashMap<CacheKey, EntityHandle>,
    local: HashMap<CacheKey, EntityHandle>,
    local_revisions: HashMap<CacheKey, Vec<EntityRevision>>,
    seeded_revisions: HashMap<CacheKey, Vec<EntityRevision>>,
    entry_states: HashMap<CacheKey, EntryState>,
}

impl LiveTransaction {
    pub(crate) fn new(
        cache: Cache,
        snapshot: HashMap<CacheKey, EntityHandle>,
        seeded_revisions: HashMap<CacheKey, Vec<EntityRevision>>,
    ) -> Self {
        Self {
            cache,
            snapshot,
            local: HashMap::new(),
            local_revisions: HashMap::new(),
            seeded_revisions,
            entry_states: HashMap::new(),
        }
    }

    /// Read a key: local overlay first, then the snapshot
    ///
    /// A hit refreshes the key's entry state (retained, advisory TTL,
    /// last-accessed now).
    pub fn get(&mut self, key: &str) -> Option<EntityHandle> {
        let found = self
            .local
            .get(key)
            .or_else(|| self.snapshot.get(key))
            .cloned();

        if found.is_some() {
            self.touch(key);
        }

        found
    }

    /// Read and decode a key
    pub fn get_as<T: DeserializeOwned>(&mut self, key: &str) -> Result<Option<T>> {
        match self.get(key) {
            Some(handle) => serde_json::from_value((*handle).clone())
                .map(Some)
                .map_err(|source| CacheError::EntityDecode {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    /// Write a value into the overlay and the snapshot view
    ///
    /// Fails if the value cannot be converted into a deep-copyable entity.
    /// No revision is appended; revisions come from `merge` and commit.
    pub fn set<T: Serialize>(
        &mut self,
        key: impl Into<CacheKey>,
        value: T,
    ) -> Result<EntityHandle> {
        let key = key.into();
        let value =
            serde_json::to_value(value).map_err(|source| CacheError::EntityNotCloneable {
                key: key.clone(),
                source,
            })?;
        Ok(self.write_local(key, value))
    }

    /// Remove a key from the transactional view
    ///
    /// Scoped to this transaction: the primary store keeps the key even
    /// after commit. Returns whether the key was present in either map.
    pub fn delete(&mut self, key: &str) -> bool {
        let in_local = self.local.remove(key).is_some();
        let in_snapshot = self.snapshot.remove(key).is_some();
        in_local || in_snapshot
    }

    /// Merge an incoming revision into the current transactional value
    ///
    /// Runs the configured entity-merge strategy, writes the result, and
    /// records it in the local revision log under the incoming revision
    /// number and context.
    pub async fn merge(
        &mut self,
        key: impl Into<CacheKey>,
        incoming: EntityRevision,
    ) -> Result<EntityHandle> {
        let key = key.into();
        let current = self.get(&key);
        let hooks = self.cache.hooks();

        let merged = {
            let request = MergeRequest {
                key: &key,
                incoming: &incoming,
                current: current.as_deref(),
            };
            (hooks.entity_merge)(request).await
        }
        .ok_or_else(|| CacheError::MergeProducedNothing { key: key.clone() })?;

        let handle = self.write_local(key.clone(), merged.clone());
        let recorded = EntityRevision {
            entity: merged,
            revision: incoming.revision,
            context: incoming.context,
        };
        self.local_revisions.entry(key).or_default().push(recorded);

        Ok(handle)
    }

    /// The snapshot view with attached entry states
    pub fn entries(&self) -> Vec<(CacheKey, EntityHandle, Option<EntryState>)> {
        self.snapshot
            .iter()
            .map(|(key, handle)| {
                (
                    key.clone(),
                    handle.clone(),
                    self.entry_states.get(key).cloned(),
                )
            })
            .collect()
    }

    /// Locally-written entries only
    pub fn local_entries(&self) -> Vec<(CacheKey, EntityHandle, Option<EntryState>)> {
        self.local
            .iter()
            .map(|(key, handle)| {
                (
                    key.clone(),
                    handle.clone(),
                    self.entry_states.get(key).cloned(),
                )
            })
            .collect()
    }

    /// Pre-existing revisions for a key followed by this transaction's own
    pub fn entry_revisions(&self, key: &str) -> Vec<EntityRevision> {
        let mut revisions = self
            .seeded_revisions
            .get(key)
            .cloned()
            .unwrap_or_default();
        if let Some(local) = self.local_revisions.get(key) {
            revisions.extend(local.iter().cloned());
        }
        revisions
    }

    /// Revisions produced inside this transaction only
    pub fn local_revisions(&self, key: &str) -> Vec<EntityRevision> {
        self.local_revisions.get(key).cloned().unwrap_or_default()
    }

    /// Commit with the configured default timeout
    pub async fn commit(&mut self) -> Result<()> {
        let limit = self.cache.config().commit_timeout;
        self.commit_with(CommitOptions::with_timeout(limit)).await
    }

    /// Commit with explicit options
    pub async fn commit_with(&mut self, options: CommitOptions) -> Result<()> {
        match options.timeout {
            Some(limit) => match tokio::time::timeout(limit, self.commit_inner()).await {
                Ok(result) => result,
                Err(_) => {
                    debug!(timeout_ms = limit.as_millis() as u64, "commit timed out");
                    Err(CacheError::CommitTimeout { timeout: limit })
                }
            },
            None => self.commit_inner().await,
        }
    }

    async fn commit_inner(&mut self) -> Result<()> {
        let cache = self.cache.clone();
        let hooks = cache.hooks();

        // Most recently touched keys commit first; untouched timestamps
        // sort last, with key order as the deterministic tiebreak.
        let mut keys: Vec<CacheKey> = self.local.keys().cloned().collect();
        keys.sort_by(|a, b| {
            let ta = self.entry_states.get(a).and_then(|state| state.last_accessed);
            let tb = self.entry_states.get(b).and_then(|state| state.last_accessed);
            match (ta, tb) {
                (Some(ta), Some(tb)) => tb.cmp(&ta).then_with(|| a.cmp(b)),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => a.cmp(b),
            }
        });

        let mut committing = CommittingTransaction::new();

        for key in keys {
            let Some(handle) = self.local.get(&key).cloned() else {
                continue;
            };
            let state = self
                .entry_states
                .get(&key)
                .cloned()
                .ok_or_else(|| CacheError::RevisionStateMissing { key: key.clone() })?;

            // Fresh reads: the primary value and revision sequence may have
            // moved on since this transaction began. The number derived
            // here is provisional; install re-derives it under the write
            // lock, where racing committers serialize.
            let latest = cache.get(&key).await;
            let observed = self.last_observed_revision(&key);
            let installed = cache.last_installed_revision(&key).await;
            let next_revision = observed.max(installed).unwrap_or(0) + 1;

            let committed = match latest.as_deref() {
                Some(latest_value) => {
                    let incoming = EntityRevision::new((*handle).clone(), next_revision);
                    let request = MergeRequest {
                        key: &key,
                        incoming: &incoming,
                        current: Some(latest_value),
                    };
                    (hooks.entity_merge)(request)
                        .await
                        .ok_or_else(|| CacheError::MergeProducedNothing { key: key.clone() })?
                }
                None => (*handle).clone(),
            };

            let staged: EntityHandle = Arc::new(committed.clone());
            committing.stage_entry(key.clone(), staged, state);

            self.local_revisions
                .entry(key.clone())
                .or_default()
                .push(EntityRevision::new(committed, next_revision));

            let local_revisions = self
                .local_revisions
                .get(&key)
                .cloned()
                .unwrap_or_default();
            (hooks.revision_merge)(&key, &mut committing, &local_revisions).await;
        }

        if let Some(hook) = hooks.commit.as_ref() {
            hook(&mut committing).await?;
        }

        cache.install_commit(committing).await;
        debug!("transaction committed");
        Ok(())
    }

    fn write_local(&mut self, key: CacheKey, value: EntityValue) -> EntityHandle {
        let handle: EntityHandle = Arc::new(value);
        self.local.insert(key.clone(), handle.clone());
        self.snapshot.insert(key.clone(), handle.clone());
        self.touch(&key);
        handle
    }

    fn touch(&mut self, key: &str) {
        let ttl = self.cache.config().default_ttl;
        self.entry_states
            .insert(key.to_string(), EntryState::touched(ttl));
    }

    /// Highest revision number this transaction has seen for a key
    fn last_observed_revision(&self, key: &str) -> Option<u64> {
        self.local_revisions
            .get(key)
            .and_then(|revisions| revisions.last())
            .map(|revision| revision.revision)
            .or_else(|| {
                self.seeded_revisions
                    .get(key)
                    .and_then(|revisions| revisions.last())
                    .map(|revision| revision.revision)
            })
    }
}

impl std::fmt::Debug for LiveTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveTransaction")
            .field("snapshot_len", &self.snapshot.len())
            .field("local_len", &self.local.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::config::CacheConfig;
    use crate::cache::merge::{BoxFuture, CacheHooks};
    use serde_json::json;

    #[tokio::test]
    async fn test_local_write_visible_to_reads() {
        let cache = Cache::new(CacheConfig::default());
        let mut tx = cache.begin_transaction().await;

        tx.set("user:1", json!({"name": "a"})).unwrap();

        let read = tx.get("user:1").unwrap();
        assert_eq!(*read, json!({"name": "a"}));
        assert!(cache.get("user:1").await.is_none());
    }

    #[tokio::test]
    async fn test_get_records_entry_state() {
        let cache = Cache::new(CacheConfig::default());
        let mut tx = cache.begin_transaction().await;

        tx.set("user:1", json!({"name": "a"})).unwrap();
        let entries = tx.local_entries();
        let (_, _, state) = &entries[0];

        let state = state.as_ref().unwrap();
        assert!(state.retained.lru);
        assert_eq!(state.retained.ttl, cache.config().default_ttl);
        assert!(state.last_accessed.is_some());
    }

    #[tokio::test]
    async fn test_delete_scoped_to_transaction() {
        let cache = Cache::new(CacheConfig::default());
        {
            let mut tx = cache.begin_transaction().await;
            tx.set("user:1", json!({"name": "a"})).unwrap();
            tx.commit().await.unwrap();
        }

        let mut tx = cache.begin_transaction().await;
        assert!(tx.delete("user:1"));
        assert!(tx.get("user:1").is_none());
        assert!(!tx.delete("user:1"));

        // The primary store is untouched by a transactional delete.
        assert!(cache.get("user:1").await.is_some());
    }

    #[tokio::test]
    async fn test_merge_uses_default_deep_merge() {
        let cache = Cache::new(CacheConfig::default());
        let mut tx = cache.begin_transaction().await;

        tx.set("user:1", json!({"name": "a", "age": 30})).unwrap();
        tx.merge(
            "user:1",
            EntityRevision::new(json!({"age": 31}), 7).with_context(json!("sync")),
        )
        .await
        .unwrap();

        assert_eq!(*tx.get("user:1").unwrap(), json!({"name": "a", "age": 31}));

        let local = tx.local_revisions("user:1");
        assert_eq!(local.len(), 1);
        assert_eq!(local[0].revision, 7);
        assert_eq!(local[0].context, Some(json!("sync")));
        assert_eq!(local[0].entity, json!({"name": "a", "age": 31}));
    }

    #[tokio::test]
    async fn test_set_rejects_unserializable_value() {
        let cache = Cache::new(CacheConfig::default());
        let mut tx = cache.begin_transaction().await;

        // JSON object keys must be strings; a map keyed by byte vectors
        // cannot be converted into an entity value.
        let mut weird = std::collections::HashMap::new();
        weird.insert(vec![1u8, 2u8], "x");

        let result = tx.set("k", weird);
        assert!(matches!(
            result,
            Err(CacheError::EntityNotCloneable { .. })
        ));
        assert!(tx.get("k").is_none());
    }

    #[tokio::test]
    async fn test_merge_strategy_returning_nothing_fails() {
        fn refuse(_request: MergeRequest<'_>) -> BoxFuture<'_, Option<EntityValue>> {
            Box::pin(async move { None })
        }

        let hooks = CacheHooks::default().with_entity_merge(refuse);
        let cache = Cache::with_hooks(CacheConfig::default(), hooks);
        let mut tx = cache.begin_transaction().await;

        let result = tx
            .merge("user:1", EntityRevision::new(json!({"v": 1}), 1))
            .await;
        assert!(matches!(
            result,
            Err(CacheError::MergeProducedNothing { .. })
        ));
    }

    #[tokio::test]
    async fn test_entry_revisions_concatenates_seeded_and_local() {
        let cache = Cache::new(CacheConfig::default());
        {
            let mut tx = cache.begin_transaction().await;
            tx.set("k", json!({"v": 1})).unwrap();
            tx.commit().await.unwrap();
        }

        let mut tx = cache.begin_transaction().await;
        tx.merge("k", EntityRevision::new(json!({"v": 2}), 5))
            .await
            .unwrap();

        let all = tx.entry_revisions("k");
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].revision, 1);
        assert_eq!(all[1].revision, 5);
        assert_eq!(tx.local_revisions("k").len(), 1);
    }

    #[tokio::test]
    async fn test_commit_installs_into_primary() {
        let cache = Cache::new(CacheConfig::default());
        let mut tx = cache.begin_transaction().await;

        tx.set("user:1", json!({"name": "a"})).unwrap();
        tx.commit().await.unwrap();

        assert_eq!(*cache.get("user:1").await.unwrap(), json!({"name": "a"}));
        assert_eq!(cache.lru_keys().await, ["user:1"]);

        let revisions = cache.entry_revisions("user:1").await;
        assert_eq!(revisions.len(), 1);
        assert_eq!(revisions[0].revision, 1);
    }

    #[tokio::test]
    async fn test_dropped_transaction_has_no_effect() {
        let cache = Cache::new(CacheConfig::default());
        {
            let mut tx = cache.begin_transaction().await;
            tx.set("user:1", json!({"name": "a"})).unwrap();
            // Dropped without commit.
        }

        assert!(cache.get("user:1").await.is_none());
        assert!(cache.entry_revisions("user:1").await.is_empty());
    }

    #[tokio::test]
    async fn test_commit_merges_against_moved_on_primary() {
        let cache = Cache::new(CacheConfig::default());
        let mut stale = cache.begin_transaction().await;
        stale.set("user:1", json!({"b": 2})).unwrap();

        // Another transaction lands first.
        let mut first = cache.begin_transaction().await;
        first.set("user:1", json!({"a": 1})).unwrap();
        first.commit().await.unwrap();

        stale.commit().await.unwrap();
        assert_eq!(*cache.get("user:1").await.unwrap(), json!({"a": 1, "b": 2}));
    }

    #[tokio::test]
    async fn test_commit_without_timeout() {
        let cache = Cache::new(CacheConfig::default());
        let mut tx = cache.begin_transaction().await;

        tx.set("user:1", json!({"v": 1})).unwrap();
        tx.commit_with(CommitOptions::no_timeout()).await.unwrap();

        assert!(cache.get("user:1").await.is_some());
    }
}
