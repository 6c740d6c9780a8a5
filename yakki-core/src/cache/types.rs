//! Core type definitions for the cache system

use serde::{Deserialize, Serialize};
use std::fmt;

/// Hex-encoded SHA-256 digest of a normalized request
pub type Fingerprint = String;

/// Statistics for cache performance monitoring
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Total number of cache hits
    pub hits: u64,

    /// Total number of cache misses
    pub misses: u64,

    /// Number of entries currently in cache
    pub entries: usize,

    /// Number of evictions due to the entry limit
    pub evictions_lru: u64,

    /// Number of evictions due to TTL expiration
    pub evictions_ttl: u64,

    /// Number of manual invalidations
    pub invalidations: u64,
}

impl CacheStats {
    /// Cache hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }

    /// Total evictions of either kind
    pub fn total_evictions(&self) -> u64 {
        self.evictions_lru + self.evictions_ttl
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CacheStats {{ hits: {}, misses: {}, hit_rate: {:.2}%, entries: {}, evictions: {} }}",
            self.hits,
            self.misses,
            self.hit_rate(),
            self.entries,
            self.total_evictions()
        )
    }
}
