//! Entry state and revision records

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::types::{CacheKey, EntityValue};

/// Retention flags recorded per key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionState {
    /// Whether this key currently occupies a slot in the retained (LRU) tier
    pub lru: bool,

    /// Declared freshness budget; advisory only, enforced by user commit hooks
    pub ttl: Duration,
}

/// Per-key metadata tracked by the primary store and by live transactions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryState {
    /// Retention flags for this key
    pub retained: RetentionState,

    /// Last time a transactional get/set/merge touched this key
    pub last_accessed: Option<DateTime<Utc>>,
}

impl EntryState {
    /// State recorded when a live transaction touches a key
    pub fn touched(ttl: Duration) -> Self {
        Self {
            retained: RetentionState { lru: true, ttl },
            last_accessed: Some(Utc::now()),
        }
    }

    /// State for an entry that should not occupy a retained-tier slot
    pub fn unretained(ttl: Duration) -> Self {
        Self {
            retained: RetentionState { lru: false, ttl },
            last_accessed: None,
        }
    }
}

/// A single record in a per-key revision sequence
///
/// Revision entities are owned deep snapshots; they stay readable after the
/// live entity itself has been reclaimed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRevision {
    /// Snapshot of the entity at this revision
    pub entity: EntityValue,

    /// Monotonically increasing number within this key's sequence
    pub revision: u64,

    /// Opaque application context attached to the revision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<EntityValue>,
}

impl EntityRevision {
    /// Create a revision record without context
    pub fn new(entity: EntityValue, revision: u64) -> Self {
        Self {
            entity,
            revision,
            context: None,
        }
    }

    /// Attach application context to the revision
    pub fn with_context(mut self, context: EntityValue) -> Self {
        self.context = Some(context);
        self
    }
}

/// Interchange record produced by `save` and consumed by `load`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedEntry {
    /// The cache key
    pub key: CacheKey,

    /// Deep clone of the entity
    pub entity: EntityValue,

    /// Entry state at export time
    pub state: EntryState,
}
