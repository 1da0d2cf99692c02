//! Configuration for the cache system

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a cache instance
///
/// Retention knobs mirror the two-tier design: `lru_capacity` bounds the
/// strongly-held tier, while `default_ttl` is stamped into entry states for
/// user commit hooks to act on. The cache core itself never enforces TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Capacity of the retained (LRU) tier
    pub lru_capacity: usize,

    /// Default freshness budget stamped into new entry states; advisory
    pub default_ttl: Duration,

    /// Time budget a commit races against before it is abandoned
    pub commit_timeout: Duration,

    /// Enable statistics collection
    pub enable_metrics: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            // 10,000 retained entries default
            lru_capacity: 10_000,
            // 60 second advisory freshness budget
            default_ttl: Duration::from_millis(60_000),
            // Commits are abandoned after 10 seconds
            commit_timeout: Duration::from_millis(10_000),
            enable_metrics: true,
        }
    }
}

impl CacheConfig {
    /// Create a new builder for cache configuration
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Validate the configuration
    ///
    /// Capacity 0 is allowed and disables the retained tier entirely.
    pub fn validate(&self) -> Result<(), String> {
        if self.commit_timeout.is_zero() {
            return Err("commit_timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// Builder for cache configuration
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    lru_capacity: Option<usize>,
    default_ttl: Option<Duration>,
    commit_timeout: Option<Duration>,
    enable_metrics: Option<bool>,
}

impl CacheConfigBuilder {
    /// Set the retained-tier capacity
    pub fn lru_capacity(mut self, capacity: usize) -> Self {
        self.lru_capacity = Some(capacity);
        self
    }

    /// Set the advisory TTL stamped into new entry states
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    /// Set the default commit timeout
    pub fn commit_timeout(mut self, timeout: Duration) -> Self {
        self.commit_timeout = Some(timeout);
        self
    }

    /// Enable or disable statistics collection
    pub fn enable_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = Some(enable);
        self
    }

    /// Build the cache configuration
    pub fn build(self) -> CacheConfig {
        let defaults = CacheConfig::default();

        CacheConfig {
            lru_capacity: self.lru_capacity.unwrap_or(defaults.lru_capacity),
            default_ttl: self.default_ttl.unwrap_or(defaults.default_ttl),
            commit_timeout: self.commit_timeout.unwrap_or(defaults.commit_timeout),
            enable_metrics: self.enable_metrics.unwrap_or(defaults.enable_metrics),
        }
    }
}
