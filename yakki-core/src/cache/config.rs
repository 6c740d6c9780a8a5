//! Configuration for the result cache

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest accepted entry lifetime (ten years)
pub const MAX_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// Configuration for the result cache
///
/// Defaults bound staleness to one hour against a reference knowledge
/// base that may itself change underneath the cached verdicts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultCacheConfig {
    /// Time-to-live for cache entries
    pub default_ttl: Duration,

    /// Maximum number of entries in the cache
    pub max_entries: usize,

    /// Promote entries on read. When false the cache evicts in insertion order.
    pub enable_lru_eviction: bool,

    /// Run a background sweep that drops expired entries eagerly
    pub enable_auto_cleanup: bool,

    /// Interval for the background sweep
    pub cleanup_interval: Duration,
}

impl Default for ResultCacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(3600),
            max_entries: 100,
            enable_lru_eviction: true,
            // Expiry is lazy unless a deployment opts in
            enable_auto_cleanup: false,
            cleanup_interval: Duration::from_secs(300),
        }
    }
}

impl ResultCacheConfig {
    /// Create a new builder for cache configuration
    pub fn builder() -> ResultCacheConfigBuilder {
        ResultCacheConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_entries == 0 {
            return Err("max_entries must be greater than 0".to_string());
        }

        if self.default_ttl.is_zero() {
            return Err("default_ttl must be greater than 0".to_string());
        }

        if self.default_ttl > MAX_TTL {
            return Err(format!(
                "default_ttl must not exceed {}s, got {}s",
                MAX_TTL.as_secs(),
                self.default_ttl.as_secs()
            ));
        }

        if self.enable_auto_cleanup && self.cleanup_interval.is_zero() {
            return Err("cleanup_interval must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// Builder for result cache configuration
#[derive(Debug, Default)]
pub struct ResultCacheConfigBuilder {
    default_ttl: Option<Duration>,
    max_entries: Option<usize>,
    enable_lru_eviction: Option<bool>,
    enable_auto_cleanup: Option<bool>,
    cleanup_interval: Option<Duration>,
}

impl ResultCacheConfigBuilder {
    /// Set TTL for cache entries
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    /// Set maximum number of cache entries
    pub fn max_entries(mut self, max: usize) -> Self {
        self.max_entries = Some(max);
        self
    }

    /// Enable or disable promotion on read
    pub fn enable_lru_eviction(mut self, enable: bool) -> Self {
        self.enable_lru_eviction = Some(enable);
        self
    }

    /// Enable or disable the background sweep
    pub fn enable_auto_cleanup(mut self, enable: bool) -> Self {
        self.enable_auto_cleanup = Some(enable);
        self
    }

    /// Set the background sweep interval
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = Some(interval);
        self
    }

    /// Build the cache configuration
    pub fn build(self) -> ResultCacheConfig {
        let defaults = ResultCacheConfig::default();

        ResultCacheConfig {
            default_ttl: self.default_ttl.unwrap_or(defaults.default_ttl),
            max_entries: self.max_entries.unwrap_or(defaults.max_entries),
            enable_lru_eviction: self
                .enable_lru_eviction
                .unwrap_or(defaults.enable_lru_eviction),
            enable_auto_cleanup: self
                .enable_auto_cleanup
                .unwrap_or(defaults.enable_auto_cleanup),
            cleanup_interval: self.cleanup_interval.unwrap_or(defaults.cleanup_interval),
        }
    }
}
