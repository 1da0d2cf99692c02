//! Primary store and cache façade
//!
//! The primary store is the source of truth for entity identity. It holds a
//! non-owning handle per key plus the key's entry state; strong ownership
//! lives in the retained (LRU) tier and in the application. A slot whose
//! handle no longer resolves has evaporated and is pruned on access.
//!
//! The [`Cache`] façade wires the store, the retained tier, and the
//! revision log together behind an async API and hands out live
//! transactions. All mutation is serialized through a single `RwLock`; the
//! cache spawns no background tasks.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::committing::CommittingTransaction;
use crate::cache::config::CacheConfig;
use crate::cache::entry::{EntityRevision, EntryState, ExportedEntry};
use crate::cache::lru::LruTier;
use crate::cache::merge::CacheHooks;
use crate::cache::revision::RevisionLog;
use crate::cache::transaction::LiveTransaction;
use crate::cache::types::{CacheKey, CacheStats, EntityHandle, EntityValue};
use crate::error::{CacheError, Result};

/// Per-key slot in the primary store
#[derive(Debug)]
struct StoreSlot {
    /// Non-owning handle to the entity
    value: Weak<EntityValue>,

    /// Retention flags and access metadata
    state: EntryState,
}

/// Internal storage shared by the façade and live transactions
#[derive(Debug)]
pub(crate) struct PrimaryStore {
    slots: HashMap<CacheKey, StoreSlot>,
    lru: LruTier,
    revisions: RevisionLog,
    stats: CacheStats,
    metrics: bool,
}

impl PrimaryStore {
    fn new(config: &CacheConfig) -> Self {
        Self {
            slots: HashMap::new(),
            lru: LruTier::new(config.lru_capacity),
            revisions: RevisionLog::default(),
            stats: CacheStats::default(),
            metrics: config.enable_metrics,
        }
    }

    /// Resolve a key, pruning the slot if its entity has been reclaimed
    fn resolve(&mut self, key: &str) -> Option<EntityHandle> {
        let resolved = self.slots.get(key).and_then(|slot| slot.value.upgrade());
        if resolved.is_none() && self.slots.contains_key(key) {
            self.drop_slot(key);
        }
        resolved
    }

    /// Install or replace the slot for a key
    ///
    /// The retained tier takes a strong handle iff the state flags it; an
    /// install that drops the flag also releases the retained slot.
    fn install(&mut self, key: CacheKey, handle: &EntityHandle, state: EntryState) {
        if state.retained.lru {
            if let Some((evicted_key, _)) = self.lru.insert(key.clone(), handle.clone()) {
                if self.metrics && evicted_key != key {
                    self.stats.lru_evictions += 1;
                }
                debug!(key = %evicted_key, "evicted entry from retained tier");
            }
        } else {
            self.lru.remove(&key);
        }

        self.slots.insert(
            key,
            StoreSlot {
                value: Arc::downgrade(handle),
                state,
            },
        );
    }

    fn drop_slot(&mut self, key: &str) {
        self.slots.remove(key);
        self.lru.remove(key);
    }

    /// All entries whose handle still resolves, pruning the rest
    fn live_entries(&mut self) -> Vec<(CacheKey, EntityHandle, EntryState)> {
        let mut live = Vec::with_capacity(self.slots.len());
        let mut dead = Vec::new();

        for (key, slot) in &self.slots {
            match slot.value.upgrade() {
                Some(handle) => live.push((key.clone(), handle, slot.state.clone())),
                None => dead.push(key.clone()),
            }
        }

        for key in dead {
            self.drop_slot(&key);
        }

        live
    }

    fn clear(&mut self) {
        self.slots.clear();
        self.lru.clear();
        self.revisions.clear();
        if self.metrics {
            self.stats.clears += 1;
        }
    }
}

/// Transactional in-memory cache with revision tracking
///
/// Cloning the façade is cheap and yields another handle onto the same
/// store, which is how live transactions read fresh state at commit time.
#[derive(Debug, Clone)]
pub struct Cache {
    config: CacheConfig,
    hooks: Arc<CacheHooks>,
    store: Arc<RwLock<PrimaryStore>>,
}

impl Cache {
    /// Create a cache with default merge strategies
    pub fn new(config: CacheConfig) -> Self {
        Self::with_hooks(config, CacheHooks::default())
    }

    /// Create a cache with custom merge strategies and commit hook
    pub fn with_hooks(config: CacheConfig, hooks: CacheHooks) -> Self {
        info!(
            lru_capacity = config.lru_capacity,
            "initializing transactional cache"
        );

        let store = PrimaryStore::new(&config);
        Self {
            config,
            hooks: Arc::new(hooks),
            store: Arc::new(RwLock::new(store)),
        }
    }

    /// The configuration this cache was built with
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub(crate) fn hooks(&self) -> Arc<CacheHooks> {
        Arc::clone(&self.hooks)
    }

    /// Resolve the current entity for a key
    pub async fn get(&self, key: &str) -> Option<EntityHandle> {
        let mut store = self.store.write().await;
        let resolved = store.resolve(key);

        if store.metrics {
            match resolved {
                Some(_) => store.stats.hits += 1,
                None => store.stats.misses += 1,
            }
        }

        resolved
    }

    /// Resolve and decode the current entity for a key
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key).await {
            Some(handle) => serde_json::from_value((*handle).clone())
                .map(Some)
                .map_err(|source| CacheError::EntityDecode {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    /// Check whether a key currently resolves, without touching hit stats
    pub async fn contains_key(&self, key: &str) -> bool {
        self.store.write().await.resolve(key).is_some()
    }

    /// Number of resolvable entries in the primary store
    pub async fn len(&self) -> usize {
        self.store.write().await.live_entries().len()
    }

    /// Check if the cache holds no resolvable entries
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Deep-clone every reachable entry into an exportable form
    ///
    /// A slot that is flagged as retained but fails to resolve indicates a
    /// broken store invariant and fails the whole export.
    pub async fn save(&self) -> Result<Vec<ExportedEntry>> {
        let mut store = self.store.write().await;
        let mut exported = Vec::with_capacity(store.slots.len());
        let mut dead = Vec::new();

        for (key, slot) in &store.slots {
            match slot.value.upgrade() {
                Some(handle) => exported.push(ExportedEntry {
                    key: key.clone(),
                    entity: (*handle).clone(),
                    state: slot.state.clone(),
                }),
                None if slot.state.retained.lru => {
                    warn!(key = %key, "retained entry failed to resolve during save");
                    return Err(CacheError::StoreInvariantViolation { key: key.clone() });
                }
                None => dead.push(key.clone()),
            }
        }

        for key in dead {
            store.drop_slot(&key);
        }

        exported.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(exported)
    }

    /// Install entries in bulk, deep-cloning each entity
    ///
    /// Each loaded entry is appended to the revision log under a load-local
    /// sequence. Load never clears; callers wanting a replace call
    /// [`Cache::clear`] first.
    pub async fn load(&self, entries: Vec<ExportedEntry>) -> Result<()> {
        let mut store = self.store.write().await;
        let mut counter: u64 = 0;

        for entry in entries {
            counter += 1;
            let handle: EntityHandle = Arc::new(entry.entity.clone());
            store.install(entry.key.clone(), &handle, entry.state);
            store
                .revisions
                .append(entry.key, EntityRevision::new(entry.entity, counter));
            if store.metrics {
                store.stats.loads += 1;
            }
        }

        debug!(loaded = counter, "bulk load complete");
        Ok(())
    }

    /// Empty the primary store, the retained tier, and the revision log
    pub async fn clear(&self) {
        let mut store = self.store.write().await;
        let count = store.slots.len();
        store.clear();
        info!(entries = count, "cleared cache");
    }

    /// Snapshot of all reachable `(key, entity, state)` triples
    pub async fn entries(&self) -> Vec<(CacheKey, EntityHandle, EntryState)> {
        self.store.write().await.live_entries()
    }

    /// Keys of all reachable entries
    pub async fn keys(&self) -> Vec<CacheKey> {
        self.store
            .write()
            .await
            .live_entries()
            .into_iter()
            .map(|(key, _, _)| key)
            .collect()
    }

    /// Handles of all reachable entries
    pub async fn values(&self) -> Vec<EntityHandle> {
        self.store
            .write()
            .await
            .live_entries()
            .into_iter()
            .map(|(_, handle, _)| handle)
            .collect()
    }

    /// Keys currently protected by the retained tier, in insertion order
    pub async fn lru_keys(&self) -> Vec<CacheKey> {
        self.store.read().await.lru.keys().cloned().collect()
    }

    /// The revision sequence recorded for a key
    pub async fn entry_revisions(&self, key: &str) -> Vec<EntityRevision> {
        self.store.read().await.revisions.get(key).to_vec()
    }

    /// Drop the recorded revision history for a key
    ///
    /// The entity itself is untouched; this only forgets history.
    pub async fn clear_revisions(&self, key: &str) {
        self.store.write().await.revisions.clear_key(key);
    }

    /// Current statistics snapshot
    pub async fn stats(&self) -> CacheStats {
        let mut store = self.store.write().await;
        let live = store.live_entries().len();
        let mut stats = store.stats.clone();
        stats.entries = live;
        stats.lru_entries = store.lru.len();
        stats
    }

    /// Open a live transaction over a fresh snapshot of the store
    pub async fn begin_transaction(&self) -> LiveTransaction {
        let mut store = self.store.write().await;

        let mut snapshot = HashMap::new();
        let mut seeded_revisions = HashMap::new();

        for (key, handle, _) in store.live_entries() {
            let revisions = store.revisions.get(&key).to_vec();
            if !revisions.is_empty() {
                seeded_revisions.insert(key.clone(), revisions);
            }
            snapshot.insert(key, handle);
        }

        debug!(snapshot_len = snapshot.len(), "opened live transaction");
        LiveTransaction::new(self.clone(), snapshot, seeded_revisions)
    }

    /// Highest revision number installed for a key
    pub(crate) async fn last_installed_revision(&self, key: &str) -> Option<u64> {
        self.store.read().await.revisions.last_revision(key)
    }

    /// Install a finished committing transaction
    ///
    /// Runs in a single write-lock critical section with no interior await,
    /// so an install is atomic relative to other committers and to a commit
    /// timer firing. Revision numbers staged by the commit loop are
    /// provisional: they were derived from a read taken before the merge
    /// hooks ran, and a racing committer may have installed the same
    /// numbers since. Final numbering is re-derived here, under the write
    /// lock, against the log's current tail, so per-key sequences stay
    /// strictly increasing.
    pub(crate) async fn install_commit(&self, committing: CommittingTransaction) {
        let (staged, merged_revisions) = committing.into_parts();
        let mut store = self.store.write().await;

        for entry in staged {
            let handle = entry.handle;
            store.install(entry.key, &handle, entry.state);
        }
        for (key, mut revisions) in merged_revisions {
            let mut last = store.revisions.last_revision(&key).unwrap_or(0);
            for revision in &mut revisions {
                if revision.revision <= last {
                    revision.revision = last + 1;
                }
                last = revision.revision;
            }
            store.revisions.append_many(key, revisions);
        }
        if store.metrics {
            store.stats.commits += 1;
        }
    }
}
