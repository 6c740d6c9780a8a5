//! Cache entry management with TTL support

use crate::cache::types::Fingerprint;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// A cached value with its timestamps.
///
/// Entries are owned by their cache and never patched in place; storing a
/// new value for the same fingerprint replaces the whole entry.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The cache key
    pub key: Fingerprint,

    /// The cached value
    pub value: V,

    /// Entry metadata
    pub metadata: CacheMetadata,
}

impl<V> CacheEntry<V> {
    /// Create a new cache entry that expires `ttl` from now
    pub fn new(key: Fingerprint, value: V, ttl: Duration) -> Self {
        let now = Utc::now();
        // TTLs beyond the calendar range saturate instead of overflowing
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            key,
            value,
            metadata: CacheMetadata {
                created_at: now,
                accessed_at: now,
                expires_at,
                access_count: 0,
            },
        }
    }

    /// Check if the entry has expired
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.metadata.expires_at
    }

    /// Mark the entry as accessed (updates access time and count)
    pub fn mark_accessed(&mut self) {
        self.metadata.accessed_at = Utc::now();
        self.metadata.access_count += 1;
    }
}

/// Metadata associated with a cache entry
#[derive(Debug, Clone)]
pub struct CacheMetadata {
    /// When the entry was inserted
    pub created_at: DateTime<Utc>,

    /// Last access time
    pub accessed_at: DateTime<Utc>,

    /// When the entry expires
    pub expires_at: DateTime<Utc>,

    /// Number of times this entry has been read
    pub access_count: u64,
}
