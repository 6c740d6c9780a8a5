//! Cache manager
//!
//! Owns the three partitions (data aggregate, rule documents, results) and
//! the optional file change notifier, and exposes them through one
//! get/set/invalidate/status surface.

use crate::cache::{
    start_auto_cleanup, CacheStats, Fingerprint, InvalidationEvent, InvalidationReason,
    Partition, ResultCache, ResultCacheConfig,
};
use crate::reference::{
    DataCache, DataSnapshot, FreshnessState, LocalFs, ReferenceConfig, RuleCache, SourceFs,
};
use crate::schema::{StructuredResult, TextType};
use crate::watch::{
    start_notifier, InvalidationSink, Notifier, NotifierStatus, WatchConfig, WatchMode,
    WatchTarget,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Diagnostic snapshot of every partition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatus {
    /// Result cache hit rate in percent
    pub hit_rate: f64,
    pub result_entries: usize,
    pub result_capacity: usize,
    pub result_stats: CacheStats,
    pub data: FreshnessState,
    pub rules: FreshnessState,
    pub notifier: Option<NotifierStatus>,
}

pub struct CacheManager {
    fs: Arc<dyn SourceFs>,
    data: Arc<DataCache>,
    rules: Arc<RuleCache>,
    results: Arc<ResultCache<StructuredResult>>,
    notifier: Mutex<Option<Box<dyn Notifier>>>,
    cleanup: Mutex<Option<JoinHandle<()>>>,
}

impl CacheManager {
    /// Manager over the local file system
    pub fn new(reference: ReferenceConfig, results: ResultCacheConfig) -> Self {
        Self::with_fs(Arc::new(LocalFs), reference, results)
    }

    pub fn with_fs(
        fs: Arc<dyn SourceFs>,
        reference: ReferenceConfig,
        results: ResultCacheConfig,
    ) -> Self {
        info!(
            "Initializing cache manager (data: {}, rules: {})",
            reference.data_dir.display(),
            reference.rule_dir.display()
        );
        Self {
            data: Arc::new(DataCache::new(Arc::clone(&fs), &reference)),
            rules: Arc::new(RuleCache::new(Arc::clone(&fs), &reference)),
            results: Arc::new(ResultCache::new(results)),
            fs,
            notifier: Mutex::new(None),
            cleanup: Mutex::new(None),
        }
    }

    pub fn data(&self) -> &DataCache {
        &self.data
    }

    pub fn rules(&self) -> &RuleCache {
        &self.rules
    }

    pub fn results(&self) -> &ResultCache<StructuredResult> {
        &self.results
    }

    pub async fn get_result(&self, key: &str) -> Option<StructuredResult> {
        self.results.get(key).await
    }

    pub async fn set_result(&self, key: Fingerprint, result: StructuredResult) {
        self.results.set(key, result).await;
    }

    pub async fn data_snapshot(&self) -> Arc<DataSnapshot> {
        self.data.snapshot().await
    }

    pub async fn rule_content(&self, text_type: TextType) -> String {
        self.rules.get_rule_content(text_type).await
    }

    /// Drop the named partition, or every partition for [`Partition::All`]
    pub async fn invalidate(&self, partition: Partition) -> Vec<InvalidationEvent> {
        let mut events = Vec::new();
        if partition.covers(Partition::Data) {
            events.push(self.data.invalidate(InvalidationReason::Manual).await);
        }
        if partition.covers(Partition::Rule) {
            events.push(self.rules.invalidate(InvalidationReason::Manual).await);
        }
        if partition.covers(Partition::Result) {
            events.push(self.results.clear().await);
        }
        info!(
            "Invalidated partition {} ({} entries dropped)",
            partition,
            events.iter().map(|e| e.removed).sum::<usize>()
        );
        events
    }

    /// Start the file change notifier over the data and rule directories.
    /// Replaces a running notifier. Returns the mode actually started.
    pub fn start_watching(&self, config: &WatchConfig) -> Option<WatchMode> {
        self.stop_watching();

        let data_sink: Arc<dyn InvalidationSink> = self.data.clone();
        let rule_sink: Arc<dyn InvalidationSink> = self.rules.clone();
        let targets = vec![
            WatchTarget::new(self.data.dir(), Partition::Data, data_sink),
            WatchTarget::new(self.rules.dir(), Partition::Rule, rule_sink),
        ];

        let notifier = start_notifier(config, targets, Arc::clone(&self.fs))?;
        let mode = notifier.mode();
        self.data.set_notifier_backed(notifier.delivers(Partition::Data));
        self.rules.set_notifier_backed(notifier.delivers(Partition::Rule));

        match self.notifier.lock() {
            Ok(mut slot) => *slot = Some(notifier),
            Err(_) => {
                warn!("Notifier slot poisoned; stopping the new notifier");
                notifier.stop();
                self.data.set_notifier_backed(false);
                self.rules.set_notifier_backed(false);
                return None;
            }
        }
        Some(mode)
    }

    pub fn stop_watching(&self) {
        self.data.set_notifier_backed(false);
        self.rules.set_notifier_backed(false);
        if let Ok(mut slot) = self.notifier.lock() {
            if let Some(notifier) = slot.take() {
                notifier.stop();
            }
        }
    }

    /// Spawn the background TTL sweep when the result cache is configured
    /// for it. Must be called from within a Tokio runtime.
    pub fn start_auto_cleanup(&self) -> bool {
        if !self.results.config().enable_auto_cleanup {
            return false;
        }
        let Ok(mut slot) = self.cleanup.lock() else {
            return false;
        };
        if slot.is_none() {
            *slot = Some(tokio::spawn(start_auto_cleanup(Arc::clone(&self.results))));
        }
        true
    }

    pub async fn status(&self) -> CacheStatus {
        let result_stats = self.results.stats().await;
        let notifier = self
            .notifier
            .lock()
            .ok()
            .and_then(|slot| slot.as_ref().map(|n| n.status()));

        CacheStatus {
            hit_rate: result_stats.hit_rate(),
            result_entries: self.results.len().await,
            result_capacity: self.results.config().max_entries,
            result_stats,
            data: self.data.state().await,
            rules: self.rules.state().await,
            notifier,
        }
    }
}

impl Drop for CacheManager {
    fn drop(&mut self) {
        self.stop_watching();
        if let Ok(mut slot) = self.cleanup.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}
