//! Rule documents keyed by text type

use crate::cache::invalidation::{InvalidationEvent, InvalidationReason, Partition};
use crate::reference::freshness::FreshnessTracker;
use crate::reference::fs::SourceFs;
use crate::reference::{FreshnessState, ReferenceConfig};
use crate::schema::TextType;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

struct RuleEntry {
    content: String,
    tracker: FreshnessTracker,
    built_at: DateTime<Utc>,
}

#[derive(Default)]
struct RuleState {
    entries: HashMap<TextType, RuleEntry>,
    rebuilds: u64,
}

/// Per-text-type rule content with the same freshness rules as the data
/// aggregate. Storage is independent of [`DataCache`](super::DataCache).
pub struct RuleCache {
    fs: Arc<dyn SourceFs>,
    dir: PathBuf,
    state: Mutex<RuleState>,
    notifier_backed: AtomicBool,
}

impl RuleCache {
    pub fn new(fs: Arc<dyn SourceFs>, config: &ReferenceConfig) -> Self {
        Self {
            fs,
            dir: config.rule_dir.clone(),
            state: Mutex::new(RuleState::default()),
            notifier_backed: AtomicBool::new(false),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn set_notifier_backed(&self, backed: bool) {
        self.notifier_backed.store(backed, Ordering::SeqCst);
    }

    /// Rule content for `text_type`; empty when its file is missing or empty
    pub async fn get_rule_content(&self, text_type: TextType) -> String {
        let mut state = self.state.lock().await;

        if self.notifier_backed.load(Ordering::SeqCst) {
            if let Some(entry) = state.entries.get(&text_type) {
                return entry.content.clone();
            }
        }

        let path = self.dir.join(text_type.rule_file());
        let observation =
            FreshnessTracker::observe(self.fs.as_ref(), std::slice::from_ref(&path)).await;

        if let Some(entry) = state.entries.get(&text_type) {
            if !entry.tracker.is_stale(&observation) {
                debug!("Rule content fresh for {}", text_type.id());
                return entry.content.clone();
            }
        }

        let content = if observation.contains_key(&path) {
            match self.fs.read_all(&path).await {
                Ok(raw) => format_rule(text_type, &raw),
                Err(e) => {
                    warn!("Rule file unreadable, serving previous content: {}", e);
                    return state
                        .entries
                        .get(&text_type)
                        .map(|entry| entry.content.clone())
                        .unwrap_or_default();
                }
            }
        } else {
            debug!("No rule file at {}", path.display());
            String::new()
        };

        let mut tracker = FreshnessTracker::new();
        tracker.record(observation);
        state.entries.insert(
            text_type,
            RuleEntry {
                content: content.clone(),
                tracker,
                built_at: Utc::now(),
            },
        );
        state.rebuilds += 1;

        info!(
            "Rebuilt rule content for {}: {} chars",
            text_type.id(),
            content.chars().count()
        );
        content
    }

    /// Drop every cached rule document
    pub async fn invalidate(&self, reason: InvalidationReason) -> InvalidationEvent {
        let mut state = self.state.lock().await;
        let removed = state.entries.len();
        state.entries.clear();
        info!("Invalidated {} rule entries ({})", removed, reason);
        InvalidationEvent::new(Partition::Rule, reason, removed)
    }

    pub async fn state(&self) -> FreshnessState {
        let state = self.state.lock().await;
        FreshnessState {
            cached: !state.entries.is_empty(),
            entries: state.entries.len(),
            tracked_files: state.entries.values().map(|e| e.tracker.len()).sum(),
            last_rebuild: state.entries.values().map(|e| e.built_at).max(),
            rebuilds: state.rebuilds,
            notifier_backed: self.notifier_backed.load(Ordering::SeqCst),
        }
    }
}

fn format_rule(text_type: TextType, raw: &str) -> String {
    let body = raw.trim();
    if body.is_empty() {
        return String::new();
    }
    format!("## {}のルール\n\n{}\n\n---\n", text_type.label(), body)
}
