//! # revcache
//!
//! A transactional in-memory cache with revision tracking.
//!
//! ## Features
//!
//! - Snapshot-isolated read/write transactions over an in-memory store
//! - Deterministic last-writer-wins-with-merge commit semantics
//! - Pluggable entity-merge and revision-merge strategies
//! - Per-key append-only revision history
//! - Bounded LRU retention over a weak-reference primary store
//! - Async-first design using tokio; no background tasks
//!
//! ## Basic Usage
//!
//! ```no_run
//! use revcache::{Cache, CacheConfig};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> revcache::Result<()> {
//!     let cache = Cache::new(CacheConfig::default());
//!
//!     let mut tx = cache.begin_transaction().await;
//!     tx.set("user:1", json!({"name": "a", "age": 30}))?;
//!     tx.commit().await?;
//!
//!     // A later write to the same key deep-merges on commit.
//!     let mut tx = cache.begin_transaction().await;
//!     tx.set("user:1", json!({"age": 31}))?;
//!     tx.commit().await?;
//!
//!     assert_eq!(
//!         *cache.get("user:1").await.unwrap(),
//!         json!({"name": "a", "age": 31})
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Custom Merge Strategies
//!
//! ```no_run
//! use revcache::{
//!     BoxFuture, Cache, CacheConfig, CacheHooks, EntityValue, MergeRequest,
//! };
//!
//! fn take_incoming(request: MergeRequest<'_>) -> BoxFuture<'_, Option<EntityValue>> {
//!     Box::pin(async move { Some(request.incoming.entity.clone()) })
//! }
//!
//! let hooks = CacheHooks::default().with_entity_merge(take_incoming);
//! let cache = Cache::with_hooks(CacheConfig::default(), hooks);
//! ```
//!
//! ## Limitations
//!
//! Entities are `serde_json::Value` trees, so cyclic values cannot be
//! represented; the deep clones used by `save`, `load`, and commit rely on
//! this. Overlapping live transactions never abort: conflicts always
//! resolve through the configured merge strategy, and the last committer
//! observes the installed state of prior committers.

pub mod cache;
pub mod error;

// Re-export main types for convenience
pub use cache::{
    deep_merge, default_entity_merge, retain_all_revisions, BoxFuture, Cache, CacheConfig,
    CacheConfigBuilder, CacheHooks, CacheKey, CacheStats, CommitHookFn, CommitOptions,
    CommittingTransaction, EntityHandle, EntityMergeFn, EntityRevision, EntityValue, EntryState,
    ExportedEntry, LiveTransaction, MergeRequest, RetentionState, RevisionMergeFn,
};
pub use error::{CacheError, Result};
