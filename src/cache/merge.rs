//! Merge strategies and the hook surface
//!
//! Two strategies are pluggable: the entity merge, which resolves an
//! incoming entity against the current one, and the revision merge, which
//! decides what part of a transaction's local revision history survives
//! into the committing transaction. Both default implementations live here,
//! together with the optional commit hook invoked before install.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::cache::committing::CommittingTransaction;
use crate::cache::entry::EntityRevision;
use crate::cache::types::{CacheKey, EntityValue};
use crate::error::Result;

/// Boxed future type used by strategy hooks so they can await
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Arguments handed to an entity-merge strategy
#[derive(Debug)]
pub struct MergeRequest<'a> {
    /// Key being merged
    pub key: &'a CacheKey,

    /// Incoming revision carrying the new entity
    pub incoming: &'a EntityRevision,

    /// Current value for the key, if one exists
    pub current: Option<&'a EntityValue>,
}

/// Resolves an incoming entity against the current one; `None` fails the merge
pub type EntityMergeFn =
    Arc<dyn for<'a> Fn(MergeRequest<'a>) -> BoxFuture<'a, Option<EntityValue>> + Send + Sync>;

/// Decides which local revisions of a key enter the committing transaction
pub type RevisionMergeFn = Arc<
    dyn for<'a> Fn(
            &'a CacheKey,
            &'a mut CommittingTransaction,
            &'a [EntityRevision],
        ) -> BoxFuture<'a, ()>
        + Send
        + Sync,
>;

/// Invoked with the committing transaction at the end of every commit,
/// before install, to permit custom retention adjustments
pub type CommitHookFn =
    Arc<dyn for<'a> Fn(&'a mut CommittingTransaction) -> BoxFuture<'a, Result<()>> + Send + Sync>;

/// Recursive field-wise merge of object-shaped values
///
/// Fields of `incoming` that also exist on `current` recurse when they
/// differ; fields unique to `incoming` are copied in. Anything that is not
/// an object on both sides (primitives, arrays) is replaced wholesale by
/// `incoming`. Cyclic values cannot occur in `serde_json::Value`, so the
/// recursion always terminates.
pub fn deep_merge(current: &EntityValue, incoming: &EntityValue) -> EntityValue {
    match (current, incoming) {
        (Value::Object(current_map), Value::Object(incoming_map)) => {
            let mut merged = current_map.clone();
            for (field, incoming_value) in incoming_map {
                match merged.get(field) {
                    Some(existing) if existing != incoming_value => {
                        let resolved = deep_merge(existing, incoming_value);
                        merged.insert(field.clone(), resolved);
                    }
                    Some(_) => {}
                    None => {
                        merged.insert(field.clone(), incoming_value.clone());
                    }
                }
            }
            Value::Object(merged)
        }
        _ => incoming.clone(),
    }
}

/// Default entity-merge strategy: deep-merge into the current value
pub fn default_entity_merge(request: MergeRequest<'_>) -> BoxFuture<'_, Option<EntityValue>> {
    Box::pin(async move {
        Some(match request.current {
            Some(current) => deep_merge(current, &request.incoming.entity),
            None => request.incoming.entity.clone(),
        })
    })
}

/// Default revision-merge strategy: retain every local revision of the key
pub fn retain_all_revisions<'a>(
    key: &'a CacheKey,
    committing: &'a mut CommittingTransaction,
    local_revisions: &'a [EntityRevision],
) -> BoxFuture<'a, ()> {
    Box::pin(async move {
        committing.append_revisions(key.clone(), local_revisions.to_vec());
    })
}

/// Pluggable strategy bundle installed at cache construction
#[derive(Clone)]
pub struct CacheHooks {
    /// Resolves conflicting writes; defaults to [`default_entity_merge`]
    pub entity_merge: EntityMergeFn,

    /// Shapes the committed revision set; defaults to [`retain_all_revisions`]
    pub revision_merge: RevisionMergeFn,

    /// Optional hook run with the committing transaction before install
    pub commit: Option<CommitHookFn>,
}

impl Default for CacheHooks {
    fn default() -> Self {
        Self {
            entity_merge: Arc::new(default_entity_merge),
            revision_merge: Arc::new(retain_all_revisions),
            commit: None,
        }
    }
}

impl CacheHooks {
    /// Replace the entity-merge strategy
    pub fn with_entity_merge<F>(mut self, strategy: F) -> Self
    where
        F: for<'a> Fn(MergeRequest<'a>) -> BoxFuture<'a, Option<EntityValue>>
            + Send
            + Sync
            + 'static,
    {
        self.entity_merge = Arc::new(strategy);
        self
    }

    /// Replace the revision-merge strategy
    pub fn with_revision_merge<F>(mut self, strategy: F) -> Self
    where
        F: for<'a> Fn(
                &'a CacheKey,
                &'a mut CommittingTransaction,
                &'a [EntityRevision],
            ) -> BoxFuture<'a, ()>
            + Send
            + Sync
            + 'static,
    {
        self.revision_merge = Arc::new(strategy);
        self
    }

    /// Install a commit hook
    pub fn with_commit_hook<F>(mut self, hook: F) -> Self
    where
        F: for<'a> Fn(&'a mut CommittingTransaction) -> BoxFuture<'a, Result<()>>
            + Send
            + Sync
            + 'static,
    {
        self.commit = Some(Arc::new(hook));
        self
    }
}

impl fmt::Debug for CacheHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheHooks")
            .field("commit", &self.commit.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deep_merge_idempotent() {
        let value = json!({"name": "a", "nested": {"x": 1, "y": [1, 2]}});
        assert_eq!(deep_merge(&value, &value), value);
    }

    #[test]
    fn test_deep_merge_overlapping_fields() {
        let current = json!({"name": "a", "age": 30});
        let incoming = json!({"age": 31});

        assert_eq!(
            deep_merge(&current, &incoming),
            json!({"name": "a", "age": 31})
        );
    }

    #[test]
    fn test_deep_merge_recurses_into_objects() {
        let current = json!({"profile": {"name": "a", "city": "x"}});
        let incoming = json!({"profile": {"city": "y"}});

        assert_eq!(
            deep_merge(&current, &incoming),
            json!({"profile": {"name": "a", "city": "y"}})
        );
    }

    #[test]
    fn test_deep_merge_copies_unique_fields() {
        let current = json!({"a": 1});
        let incoming = json!({"b": 2});

        assert_eq!(deep_merge(&current, &incoming), json!({"a": 1, "b": 2}));
    }

    #[test]
    fn test_deep_merge_replaces_arrays_wholesale() {
        let current = json!({"tags": [1, 2, 3]});
        let incoming = json!({"tags": [4]});

        assert_eq!(deep_merge(&current, &incoming), json!({"tags": [4]}));
    }

    #[test]
    fn test_deep_merge_non_object_replaces() {
        assert_eq!(deep_merge(&json!(1), &json!({"a": 1})), json!({"a": 1}));
        assert_eq!(deep_merge(&json!({"a": 1}), &json!(2)), json!(2));
    }

    #[tokio::test]
    async fn test_default_entity_merge_without_current() {
        let key = "k".to_string();
        let incoming = EntityRevision::new(json!({"v": 1}), 1);
        let request = MergeRequest {
            key: &key,
            incoming: &incoming,
            current: None,
        };

        let merged = default_entity_merge(request).await;
        assert_eq!(merged, Some(json!({"v": 1})));
    }

    #[tokio::test]
    async fn test_retain_all_revisions() {
        let key = "k".to_string();
        let mut committing = CommittingTransaction::new();
        let local = vec![
            EntityRevision::new(json!({"v": 1}), 1),
            EntityRevision::new(json!({"v": 2}), 2),
        ];

        retain_all_revisions(&key, &mut committing, &local).await;

        let merged = committing.merged_revisions();
        assert_eq!(merged.get("k").map(Vec::len), Some(2));
    }
}
