//! Core type definitions for the cache system

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Cache key type - application-chosen identifier, unique within a cache instance
pub type CacheKey = String;

/// Entity value type - an opaque structured value owned by the application
pub type EntityValue = serde_json::Value;

/// Shared-ownership handle to an entity
///
/// The primary store only keeps a non-owning reference; an entity stays
/// resolvable for as long as the retained tier or the application holds
/// one of these handles.
pub type EntityHandle = Arc<EntityValue>;

/// Statistics and metrics for cache performance monitoring
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheStats {
    /// Total number of cache hits
    pub hits: u64,

    /// Total number of cache misses
    pub misses: u64,

    /// Number of resolvable entries currently in the primary store
    pub entries: usize,

    /// Number of entries currently held by the retained (LRU) tier
    pub lru_entries: usize,

    /// Number of transactions committed into this cache
    pub commits: u64,

    /// Number of entries pushed out of the retained tier on capacity pressure
    pub lru_evictions: u64,

    /// Number of entries installed through bulk loads
    pub loads: u64,

    /// Number of times the cache was cleared
    pub clears: u64,
}

impl CacheStats {
    /// Calculate cache hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }

    /// Calculate miss rate as a percentage
    pub fn miss_rate(&self) -> f64 {
        100.0 - self.hit_rate()
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CacheStats {{ hits: {}, misses: {}, hit_rate: {:.2}%, entries: {}, retained: {}, commits: {}, evictions: {} }}",
            self.hits,
            self.misses,
            self.hit_rate(),
            self.entries,
            self.lru_entries,
            self.commits,
            self.lru_evictions
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_hit_rate() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            ..Default::default()
        };

        assert_eq!(stats.hit_rate(), 80.0);
        assert_eq!(stats.miss_rate(), 20.0);
    }

    #[test]
    fn test_cache_stats_zero_requests() {
        let stats = CacheStats::default();
        assert_eq!(stats.hit_rate(), 0.0);
        assert_eq!(stats.miss_rate(), 100.0);
    }

    #[test]
    fn test_cache_stats_display() {
        let stats = CacheStats {
            hits: 100,
            misses: 50,
            entries: 75,
            lru_entries: 60,
            commits: 12,
            lru_evictions: 3,
            ..Default::default()
        };

        let display = format!("{}", stats);
        assert!(display.contains("hits: 100"));
        assert!(display.contains("misses: 50"));
        assert!(display.contains("commits: 12"));
    }
}
