//! # Transactional Caching Layer
//!
//! This module implements a snapshot-isolated, in-memory cache with
//! per-key revision tracking and pluggable merge semantics.
//!
//! ## Features
//!
//! - **Snapshot Isolation**: Live transactions read a consistent snapshot
//!   taken at begin; local writes shadow it until commit
//! - **Merge-on-Commit**: Conflicting writes resolve through a pluggable
//!   entity-merge strategy instead of conflict aborts
//! - **Revision Tracking**: Every key carries an append-only revision log,
//!   shaped at commit time by a pluggable revision-merge strategy
//! - **Two-Tier Retention**: A weak-reference primary store backed by a
//!   bounded LRU tier of strong handles
//! - **Commit Timeouts**: Commits race a timer and install nothing on loss
//!
//! ## Architecture
//!
//! The primary store keeps non-owning handles and per-key entry state; the
//! retained tier pins a bounded number of recent entries; the revision log
//! records history independently of entity liveness. Live transactions
//! buffer reads and writes against a snapshot and merge back through a
//! committing transaction that user hooks may reshape before install.
//!
//! ## Example
//!
//! ```rust
//! use revcache::{Cache, CacheConfig};
//! use serde_json::json;
//!
//! # async fn example() -> revcache::Result<()> {
//! let cache = Cache::new(CacheConfig::builder().lru_capacity(10_000).build());
//!
//! let mut tx = cache.begin_transaction().await;
//! tx.set("user:1", json!({"name": "a"}))?;
//! tx.commit().await?;
//!
//! assert_eq!(*cache.get("user:1").await.unwrap(), json!({"name": "a"}));
//! # Ok(())
//! # }
//! ```

pub mod committing;
pub mod config;
pub mod entry;
mod lru;
pub mod merge;
mod revision;
pub mod store;
pub mod transaction;
pub mod types;

pub use committing::CommittingTransaction;
pub use config::{CacheConfig, CacheConfigBuilder};
pub use entry::{EntityRevision, EntryState, ExportedEntry, RetentionState};
pub use merge::{
    deep_merge, default_entity_merge, retain_all_revisions, BoxFuture, CacheHooks,
    CommitHookFn, EntityMergeFn, MergeRequest, RevisionMergeFn,
};
pub use store::Cache;
pub use transaction::{CommitOptions, LiveTransaction};
pub use types::{CacheKey, CacheStats, EntityHandle, EntityValue};
