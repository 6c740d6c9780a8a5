//! # Result Cache
//!
//! Computed verdicts keyed by request fingerprint.
//!
//! ## Features
//!
//! - **TTL-Based Expiration**: entries older than the TTL read as misses and are purged by that read
//! - **LRU Eviction**: at capacity the least recently used entry makes room
//! - **Fingerprints**: SHA-256 over normalized, length-prefixed request fields
//! - **Diagnostics**: hit/miss/eviction counters and hit rate
//!
//! Nothing is persisted; a process restart starts cold.
//!
//! ## Example
//!
//! ```rust
//! use yakki_core::cache::{fingerprint, ResultCache, ResultCacheConfig};
//! use yakki_core::schema::{Category, TextType};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let config = ResultCacheConfig::builder()
//!     .default_ttl(Duration::from_secs(3600))
//!     .max_entries(100)
//!     .build();
//!
//! let cache: ResultCache<String> = ResultCache::new(config);
//! let key = fingerprint("シミが消える", Category::Cosmetics, TextType::Catchphrase, "", false);
//!
//! cache.set(key.clone(), "cached verdict".to_string()).await;
//! if let Some(value) = cache.get(&key).await {
//!     println!("Cache hit: {}", value);
//! }
//! # }
//! ```

pub mod config;
pub mod entry;
pub mod fingerprint;
pub mod invalidation;
pub mod store;
pub mod types;

pub use config::{ResultCacheConfig, ResultCacheConfigBuilder};
pub use entry::{CacheEntry, CacheMetadata};
pub use fingerprint::{fingerprint, fingerprint_request};
pub use invalidation::{InvalidationEvent, InvalidationReason, Partition};
pub use store::{start_auto_cleanup, ResultCache};
pub use types::{CacheStats, Fingerprint};
