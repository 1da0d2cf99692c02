//! Error types for cache operations
//!
//! This module defines the error surface of the cache: commit failures,
//! merge failures, and detected store invariant violations. Errors always
//! propagate to the caller of the public operation that triggered them;
//! a failed operation never poisons the cache itself.

use std::time::Duration;

use thiserror::Error;

use crate::cache::types::CacheKey;

/// Main error type for cache operations
#[derive(Error, Debug)]
pub enum CacheError {
    /// The entity for a key could not be converted into a deep-copyable value
    #[error("entity for key '{key}' cannot be deep-copied: {source}")]
    EntityNotCloneable {
        key: CacheKey,
        #[source]
        source: serde_json::Error,
    },

    /// A cached entity could not be decoded into the requested type
    #[error("entity for key '{key}' could not be decoded: {source}")]
    EntityDecode {
        key: CacheKey,
        #[source]
        source: serde_json::Error,
    },

    /// An entity-merge strategy yielded no value
    #[error("entity merge strategy produced no value for key '{key}'")]
    MergeProducedNothing { key: CacheKey },

    /// Commit lost the race against its timer; nothing was installed
    #[error("commit timed out after {}ms; no changes were installed", timeout.as_millis())]
    CommitTimeout { timeout: Duration },

    /// A primary store entry that must be resolvable could not be resolved
    #[error("primary store entry for key '{key}' is retained but could not be resolved")]
    StoreInvariantViolation { key: CacheKey },

    /// Commit found a locally-changed key with no tracked entry state
    #[error("no entry state tracked for key '{key}' at commit")]
    RevisionStateMissing { key: CacheKey },
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;
