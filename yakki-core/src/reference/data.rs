//! Aggregate of the reference data directory

use crate::cache::invalidation::{InvalidationEvent, InvalidationReason, Partition};
use crate::reference::freshness::{FreshnessTracker, Observation};
use crate::reference::fs::SourceFs;
use crate::reference::ng::{NgList, NG_FILE_NAME};
use crate::reference::{FreshnessState, ReferenceConfig};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const DATA_HEADER: &str = "## 参考データ";

/// One consistent build of the data directory
#[derive(Debug, Clone)]
pub struct DataSnapshot {
    /// Prompt-ready aggregate text
    pub content: String,
    /// Expression list parsed from the same build
    pub ng: NgList,
    pub built_at: DateTime<Utc>,
}

impl DataSnapshot {
    fn empty() -> Self {
        Self {
            content: String::new(),
            ng: NgList::defaults(),
            built_at: Utc::now(),
        }
    }
}

struct DataState {
    snapshot: Option<Arc<DataSnapshot>>,
    tracker: FreshnessTracker,
    /// Some sources could not be read into the current build
    partial: bool,
    rebuilds: u64,
}

/// Data-directory aggregate, rebuilt whenever a tracked file is added,
/// modified or removed.
///
/// Staleness check, rebuild and return happen under one lock, so
/// concurrent callers wait for a single rebuild instead of racing.
pub struct DataCache {
    fs: Arc<dyn SourceFs>,
    dir: PathBuf,
    extensions: Vec<String>,
    state: Mutex<DataState>,
    notifier_backed: AtomicBool,
}

impl DataCache {
    pub fn new(fs: Arc<dyn SourceFs>, config: &ReferenceConfig) -> Self {
        Self {
            fs,
            dir: config.data_dir.clone(),
            extensions: config.data_extensions.clone(),
            state: Mutex::new(DataState {
                snapshot: None,
                tracker: FreshnessTracker::new(),
                partial: false,
                rebuilds: 0,
            }),
            notifier_backed: AtomicBool::new(false),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Skip the per-access directory scan while a push notifier is
    /// delivering invalidations.
    pub fn set_notifier_backed(&self, backed: bool) {
        self.notifier_backed.store(backed, Ordering::SeqCst);
    }

    /// Current aggregate text
    pub async fn get_content(&self) -> String {
        self.snapshot().await.content.clone()
    }

    /// Current expression list
    pub async fn ng_list(&self) -> NgList {
        self.snapshot().await.ng.clone()
    }

    /// Current build, rebuilding first if any source changed
    pub async fn snapshot(&self) -> Arc<DataSnapshot> {
        let mut state = self.state.lock().await;

        if self.notifier_backed.load(Ordering::SeqCst) && !state.partial {
            if let Some(snapshot) = &state.snapshot {
                return Arc::clone(snapshot);
            }
        }

        let files = match self.fs.list(&self.dir).await {
            Ok(files) => self.filter_sources(files),
            Err(e) => {
                warn!("Data directory unavailable, serving previous content: {}", e);
                return state
                    .snapshot
                    .clone()
                    .unwrap_or_else(|| Arc::new(DataSnapshot::empty()));
            }
        };

        // Taken before reading so that a write racing the rebuild shows up next time
        let mut observation = FreshnessTracker::observe(self.fs.as_ref(), &files).await;

        if let Some(snapshot) = &state.snapshot {
            if !state.tracker.is_stale(&observation) {
                debug!("Data aggregate fresh ({} files)", files.len());
                return Arc::clone(snapshot);
            }
            for change in state.tracker.changes(&observation) {
                debug!("Data source change: {:?}", change);
            }
        }

        let (built, unreadable) = self.build(&files, &observation).await;
        if !unreadable.is_empty() {
            if let Some(previous) = &state.snapshot {
                warn!(
                    "{} data file(s) unreadable, serving previous content",
                    unreadable.len()
                );
                return Arc::clone(previous);
            }
        }

        // Unread files stay untracked so the next access retries them
        for path in &unreadable {
            observation.remove(path);
        }

        let snapshot = Arc::new(built);
        state.tracker.record(observation);
        state.partial = !unreadable.is_empty();
        state.snapshot = Some(Arc::clone(&snapshot));
        state.rebuilds += 1;

        info!(
            "Rebuilt data aggregate: {} files, {} chars, {} expressions",
            files.len(),
            snapshot.content.chars().count(),
            snapshot.ng.len()
        );
        snapshot
    }

    /// Drop the cached build; the next access rebuilds.
    pub async fn invalidate(&self, reason: InvalidationReason) -> InvalidationEvent {
        let mut state = self.state.lock().await;
        let removed = usize::from(state.snapshot.take().is_some());
        state.tracker.clear();
        info!("Invalidated data aggregate ({})", reason);
        InvalidationEvent::new(Partition::Data, reason, removed)
    }

    pub async fn state(&self) -> FreshnessState {
        let state = self.state.lock().await;
        FreshnessState {
            cached: state.snapshot.is_some(),
            entries: usize::from(state.snapshot.is_some()),
            tracked_files: state.tracker.len(),
            last_rebuild: state.snapshot.as_ref().map(|s| s.built_at),
            rebuilds: state.rebuilds,
            notifier_backed: self.notifier_backed.load(Ordering::SeqCst),
        }
    }

    fn filter_sources(&self, files: Vec<PathBuf>) -> Vec<PathBuf> {
        files
            .into_iter()
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| {
                        self.extensions
                            .iter()
                            .any(|accepted| accepted.eq_ignore_ascii_case(ext))
                    })
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Build from every observed file. Also returns the paths that could
    /// not be read.
    async fn build(
        &self,
        files: &[PathBuf],
        observation: &Observation,
    ) -> (DataSnapshot, Vec<PathBuf>) {
        let mut sections = Vec::with_capacity(files.len());
        let mut ng = None;
        let mut unreadable = Vec::new();

        for path in files {
            if !observation.contains_key(path) {
                continue;
            }
            let content = match self.fs.read_all(path).await {
                Ok(content) => content,
                Err(e) => {
                    warn!("Skipping unreadable data file: {}", e);
                    unreadable.push(path.clone());
                    continue;
                }
            };

            let name = file_name(path);
            if name == NG_FILE_NAME {
                match NgList::from_csv(&content) {
                    Ok(list) => ng = Some(list),
                    Err(e) => warn!("Invalid {}, using built-in list: {}", NG_FILE_NAME, e),
                }
            }
            sections.push((name, content));
        }

        let snapshot = DataSnapshot {
            content: format_aggregate(&sections),
            ng: ng.unwrap_or_else(NgList::defaults),
            built_at: Utc::now(),
        };
        (snapshot, unreadable)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Header, then `### name`, trimmed content and a separator per file
fn format_aggregate(sections: &[(String, String)]) -> String {
    if sections.is_empty() {
        return String::new();
    }
    let mut out = String::from(DATA_HEADER);
    out.push_str("\n\n");
    for (name, content) in sections {
        out.push_str("### ");
        out.push_str(name);
        out.push('\n');
        out.push_str(content.trim());
        out.push_str("\n\n---\n\n");
    }
    out
}
