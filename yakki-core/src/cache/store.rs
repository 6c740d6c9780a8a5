//! Result cache store with TTL expiry and LRU eviction

use crate::cache::{
    config::ResultCacheConfig,
    entry::CacheEntry,
    invalidation::{InvalidationEvent, InvalidationReason, Partition},
    types::{CacheStats, Fingerprint},
};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// TTL + LRU cache of computed results keyed by request fingerprint
///
/// This implementation provides:
/// - Thread-safe async access via RwLock; every check-and-mutate sequence
///   runs under one write guard
/// - Lazy TTL expiration on read, plus an optional background sweep
/// - LRU eviction when the entry limit is reached
/// - Hit/miss/eviction counters
pub struct ResultCache<V> {
    /// Cache configuration
    pub(crate) config: ResultCacheConfig,

    /// Internal storage
    store: Arc<RwLock<CacheStore<V>>>,
}

/// Internal cache storage
struct CacheStore<V> {
    /// Main storage: key -> entry
    entries: HashMap<Fingerprint, CacheEntry<V>>,

    /// LRU tracking: front is least recently used
    lru_queue: VecDeque<Fingerprint>,

    /// Current cache statistics
    stats: CacheStats,
}

impl<V> CacheStore<V> {
    fn remove_entry(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.lru_queue.retain(|k| k != key);
        self.stats.entries = self.entries.len();
        Some(entry)
    }

    fn touch(&mut self, key: &str) {
        self.lru_queue.retain(|k| k != key);
        self.lru_queue.push_back(key.to_string());
    }
}

impl<V: Clone + Send + Sync + 'static> ResultCache<V> {
    /// Create a new cache with the given configuration
    pub fn new(config: ResultCacheConfig) -> Self {
        info!(
            "Initializing result cache (max_entries: {}, ttl: {:?})",
            config.max_entries, config.default_ttl
        );

        let store = CacheStore {
            entries: HashMap::new(),
            lru_queue: VecDeque::new(),
            stats: CacheStats::default(),
        };

        Self {
            config,
            store: Arc::new(RwLock::new(store)),
        }
    }

    pub fn config(&self) -> &ResultCacheConfig {
        &self.config
    }

    /// Store a value. At capacity the least recently used entry is evicted
    /// first; the new entry becomes the most recently used.
    pub async fn set(&self, key: Fingerprint, value: V) {
        let entry = CacheEntry::new(key.clone(), value, self.config.default_ttl);
        let mut store = self.store.write().await;

        if store.entries.contains_key(&key) {
            debug!("Replacing result cache entry: {}", short(&key));
            store.entries.insert(key.clone(), entry);
            store.touch(&key);
            return;
        }

        while store.entries.len() >= self.config.max_entries {
            let Some(victim) = store.lru_queue.pop_front() else {
                warn!("LRU queue empty while cache is full; entries and queue diverged");
                break;
            };
            if store.entries.remove(&victim).is_some() {
                debug!("Evicting least recently used entry: {}", short(&victim));
                store.stats.evictions_lru += 1;
            }
        }

        store.entries.insert(key.clone(), entry);
        store.lru_queue.push_back(key.clone());
        store.stats.entries = store.entries.len();
        debug!(
            "Stored result {} (size {}/{})",
            short(&key),
            store.entries.len(),
            self.config.max_entries
        );
    }

    /// Look up a value. Hits promote recency; an expired entry counts as a
    /// miss and is purged by this call.
    pub async fn get(&self, key: &str) -> Option<V> {
        let mut store = self.store.write().await;

        let expired = match store.entries.get(key) {
            None => {
                store.stats.misses += 1;
                debug!("Result cache miss: {}", short(key));
                return None;
            }
            Some(entry) => entry.is_expired(),
        };

        if expired {
            debug!("Result cache entry expired: {}", short(key));
            store.remove_entry(key);
            store.stats.misses += 1;
            store.stats.evictions_ttl += 1;
            return None;
        }

        let value = match store.entries.get_mut(key) {
            Some(entry) => {
                entry.mark_accessed();
                entry.value.clone()
            }
            None => return None,
        };
        if self.config.enable_lru_eviction {
            store.touch(key);
        }
        store.stats.hits += 1;
        debug!(
            "Result cache hit: {} (hit rate {:.1}%)",
            short(key),
            store.stats.hit_rate()
        );
        Some(value)
    }

    /// Check if a key is stored, without touching recency or counters
    pub async fn contains_key(&self, key: &str) -> bool {
        let store = self.store.read().await;
        store.entries.contains_key(key)
    }

    /// Remove a specific entry
    pub async fn remove(&self, key: &str) -> Option<V> {
        let mut store = self.store.write().await;
        let entry = store.remove_entry(key)?;
        store.stats.invalidations += 1;
        debug!("Removed result cache entry: {}", short(key));
        Some(entry.value)
    }

    /// Drop every entry and reset counters
    pub async fn clear(&self) -> InvalidationEvent {
        let mut store = self.store.write().await;

        let count = store.entries.len();
        store.entries.clear();
        store.lru_queue.clear();
        store.stats = CacheStats {
            invalidations: count as u64,
            ..Default::default()
        };

        info!("Cleared {} entries from result cache", count);
        InvalidationEvent::new(Partition::Result, InvalidationReason::Manual, count)
    }

    /// Remove all expired entries
    pub async fn cleanup_expired(&self) -> Option<InvalidationEvent> {
        let mut store = self.store.write().await;

        let expired_keys: Vec<Fingerprint> = store
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        if expired_keys.is_empty() {
            return None;
        }

        for key in &expired_keys {
            store.remove_entry(key);
        }
        store.stats.evictions_ttl += expired_keys.len() as u64;

        debug!("Cleaned up {} expired entries", expired_keys.len());
        Some(InvalidationEvent::new(
            Partition::Result,
            InvalidationReason::Expired,
            expired_keys.len(),
        ))
    }

    /// Get cache statistics
    pub async fn stats(&self) -> CacheStats {
        let store = self.store.read().await;
        store.stats.clone()
    }

    /// Get number of entries in cache
    pub async fn len(&self) -> usize {
        let store = self.store.read().await;
        store.entries.len()
    }

    /// Check if cache is empty
    pub async fn is_empty(&self) -> bool {
        let store = self.store.read().await;
        store.entries.is_empty()
    }
}

/// Background task for eager expiry. Runs until the task is aborted.
pub async fn start_auto_cleanup<V: Clone + Send + Sync + 'static>(cache: Arc<ResultCache<V>>) {
    let interval = cache.config.cleanup_interval;

    info!("Starting result cache cleanup task (interval: {:?})", interval);

    loop {
        tokio::time::sleep(interval).await;

        if let Some(event) = cache.cleanup_expired().await {
            debug!("Auto cleanup removed {} entries", event.removed);
        }
    }
}

/// First eight characters of a fingerprint, for logs
pub(crate) fn short(key: &str) -> &str {
    key.get(..8).unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn cache(max_entries: usize, ttl: Duration) -> ResultCache<String> {
        ResultCache::new(
            ResultCacheConfig::builder()
                .default_ttl(ttl)
                .max_entries(max_entries)
                .build(),
        )
    }

    #[tokio::test]
    async fn test_basic_set_and_get() {
        let cache = cache(100, Duration::from_secs(60));

        cache.set("key1".to_string(), "value1".to_string()).await;

        assert_eq!(cache.get("key1").await, Some("value1".to_string()));

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.entries, 1);
    }

    #[tokio::test]
    async fn test_cache_miss() {
        let cache = cache(100, Duration::from_secs(60));

        assert_eq!(cache.get("nonexistent").await, None);

        let stats = cache.stats().await;
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[tokio::test]
    async fn test_ttl_expiration_is_lazy() {
        let cache = cache(100, Duration::from_millis(100));

        cache.set("key1".to_string(), "value1".to_string()).await;
        assert!(cache.get("key1").await.is_some());

        tokio::time::sleep(Duration::from_millis(150)).await;

        // Still stored until someone reads it
        assert!(cache.contains_key("key1").await);
        assert!(cache.get("key1").await.is_none());
        assert!(!cache.contains_key("key1").await);

        let stats = cache.stats().await;
        assert_eq!(stats.evictions_ttl, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 0);
    }

    #[tokio::test]
    async fn test_lru_eviction_respects_reads() {
        let cache = cache(3, Duration::from_secs(60));

        cache.set("key1".to_string(), "value1".to_string()).await;
        cache.set("key2".to_string(), "value2".to_string()).await;
        cache.set("key3".to_string(), "value3".to_string()).await;

        // key1 becomes most recently used, key2 is now the oldest
        assert!(cache.get("key1").await.is_some());

        cache.set("key4".to_string(), "value4".to_string()).await;

        assert!(!cache.contains_key("key2").await);
        assert!(cache.get("key1").await.is_some());
        assert!(cache.get("key3").await.is_some());
        assert!(cache.get("key4").await.is_some());

        let stats = cache.stats().await;
        assert_eq!(stats.evictions_lru, 1);
        assert_eq!(stats.entries, 3);
    }

    #[tokio::test]
    async fn test_replace_does_not_evict() {
        let cache = cache(2, Duration::from_secs(60));

        cache.set("a".to_string(), "1".to_string()).await;
        cache.set("b".to_string(), "2".to_string()).await;
        cache.set("a".to_string(), "3".to_string()).await;

        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.get("a").await, Some("3".to_string()));
        assert_eq!(cache.stats().await.evictions_lru, 0);
    }

    #[tokio::test]
    async fn test_remove() {
        let cache = cache(100, Duration::from_secs(60));

        cache.set("key1".to_string(), "value1".to_string()).await;

        assert_eq!(cache.remove("key1").await, Some("value1".to_string()));
        assert!(cache.get("key1").await.is_none());
        assert_eq!(cache.stats().await.invalidations, 1);
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = cache(100, Duration::from_secs(60));

        cache.set("key1".to_string(), "value1".to_string()).await;
        cache.set("key2".to_string(), "value2".to_string()).await;
        cache.get("key1").await;

        let event = cache.clear().await;

        assert_eq!(event.removed, 2);
        assert!(cache.is_empty().await);
        assert_eq!(cache.stats().await.hits, 0);
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let cache = cache(100, Duration::from_millis(50));

        cache.set("key1".to_string(), "value1".to_string()).await;
        cache.set("key2".to_string(), "value2".to_string()).await;

        tokio::time::sleep(Duration::from_millis(100)).await;

        let event = cache.cleanup_expired().await.unwrap();
        assert_eq!(event.removed, 2);
        assert_eq!(cache.len().await, 0);
        assert!(cache.cleanup_expired().await.is_none());
    }

    #[tokio::test]
    async fn test_fifo_when_lru_disabled() {
        let cache: ResultCache<String> = ResultCache::new(
            ResultCacheConfig::builder()
                .max_entries(2)
                .enable_lru_eviction(false)
                .build(),
        );

        cache.set("a".to_string(), "1".to_string()).await;
        cache.set("b".to_string(), "2".to_string()).await;
        cache.get("a").await;
        cache.set("c".to_string(), "3".to_string()).await;

        assert!(!cache.contains_key("a").await);
        assert!(cache.contains_key("b").await);
    }

    #[tokio::test]
    async fn test_set_with_oversized_ttl() {
        let cache = cache(4, Duration::from_secs(9_999_999_999_999));
        cache.set("k".to_string(), "v".to_string()).await;
        assert_eq!(cache.get("k").await, Some("v".to_string()));
    }

    #[test]
    fn test_short_key() {
        assert_eq!(short("0123456789abcdef"), "01234567");
        assert_eq!(short("abc"), "abc");
    }
}
