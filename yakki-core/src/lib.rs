//! # Yakki Core (yakki-core)
//!
//! Response recovery and caching core for advertising-copy compliance checks.
//!
//! ## Features
//!
//! - Staged recovery of malformed model output into a validated verdict
//! - TTL + LRU result cache keyed by request fingerprint
//! - Reference content caches rebuilt when their source files change
//! - Push (OS events) or polling file change notifiers
//! - Async-first design using tokio
//!
//! ## Checking Copy
//!
//! ```no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use yakki_core::{
//!     CacheManager, Category, Checker, ModelParams, ReferenceConfig, ResultCacheConfig,
//!     TextGenerator, TextType,
//! };
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl TextGenerator for Echo {
//!     async fn invoke(
//!         &self,
//!         _system: &str,
//!         _user: &str,
//!         _params: &ModelParams,
//!     ) -> yakki_core::Result<String> {
//!         Ok("総合リスク：低".to_string())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let caches = Arc::new(CacheManager::new(
//!         ReferenceConfig::new("data", "rule"),
//!         ResultCacheConfig::default(),
//!     ));
//!     let checker = Checker::new(caches, Arc::new(Echo), ModelParams::default());
//!
//!     let result = checker
//!         .check_text("シミが消える美容液", TextType::Catchphrase, Category::Cosmetics, "", false)
//!         .await;
//!     println!("Overall risk: {}", result.overall_risk);
//!     Ok(())
//! }
//! ```
//!
//! ## Recovering Model Output
//!
//! ```
//! use yakki_core::recovery::recover;
//! use yakki_core::RiskLevel;
//!
//! let result = recover("not structured at all", "original copy");
//! assert_eq!(result.overall_risk, RiskLevel::Medium);
//! assert_eq!(result.rewrites.conservative(), "original copy");
//! ```

pub mod cache;
pub mod checker;
pub mod error;
pub mod manager;
pub mod prompt;
pub mod recovery;
pub mod reference;
pub mod schema;
pub mod watch;

// Re-export main types for convenience
pub use cache::{
    fingerprint, fingerprint_request, CacheEntry, CacheMetadata, CacheStats, Fingerprint,
    InvalidationEvent, InvalidationReason, Partition, ResultCache, ResultCacheConfig,
    ResultCacheConfigBuilder,
};
pub use checker::{CheckResponse, Checker, ModelParams, ResultSource, TextGenerator};
pub use error::{Result, YakkiError};
pub use manager::{CacheManager, CacheStatus};
pub use recovery::{recover, recover_with_trace, RecoveryAttempt, RecoveryOutcome, Strategy};
pub use reference::{DataCache, FreshnessState, LocalFs, NgList, ReferenceConfig, RuleCache, SourceFs};
pub use schema::{
    Category, CheckRequest, Issue, RewriteSet, RewriteText, Rewrites, RiskCounts, RiskLevel,
    StructuredResult, TextType,
};
pub use watch::{Notifier, NotifierStatus, WatchConfig, WatchMode};
