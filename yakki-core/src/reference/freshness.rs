//! Per-file modification-time bookkeeping

use crate::reference::fs::SourceFs;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

/// Modification times observed in one scan
pub type Observation = HashMap<PathBuf, SystemTime>;

/// How a tracked file differs from its recorded state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Added(PathBuf),
    Modified(PathBuf),
    Removed(PathBuf),
}

impl FileChange {
    pub fn path(&self) -> &Path {
        match self {
            FileChange::Added(p) | FileChange::Modified(p) | FileChange::Removed(p) => p,
        }
    }
}

/// Last-known modification time of every file that went into a build
#[derive(Debug, Clone, Default)]
pub struct FreshnessTracker {
    files: HashMap<PathBuf, SystemTime>,
}

impl FreshnessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the current modification time of each path. Paths that cannot
    /// be stat'ed are left out and therefore count as removed.
    pub async fn observe(fs: &dyn SourceFs, paths: &[PathBuf]) -> Observation {
        let mut observation = HashMap::with_capacity(paths.len());
        for path in paths {
            match fs.modified(path).await {
                Ok(mtime) => {
                    observation.insert(path.clone(), mtime);
                }
                Err(e) => debug!("Cannot stat {}: {}", path.display(), e),
            }
        }
        observation
    }

    /// Differences between the recorded state and `current`
    pub fn changes(&self, current: &Observation) -> Vec<FileChange> {
        let mut changes = Vec::new();
        for (path, mtime) in current {
            match self.files.get(path) {
                None => changes.push(FileChange::Added(path.clone())),
                Some(recorded) if recorded != mtime => {
                    changes.push(FileChange::Modified(path.clone()))
                }
                Some(_) => {}
            }
        }
        for path in self.files.keys() {
            if !current.contains_key(path) {
                changes.push(FileChange::Removed(path.clone()));
            }
        }
        changes.sort_by(|a, b| a.path().cmp(b.path()));
        changes
    }

    pub fn is_stale(&self, current: &Observation) -> bool {
        if current.len() != self.files.len() {
            return true;
        }
        current
            .iter()
            .any(|(path, mtime)| self.files.get(path) != Some(mtime))
    }

    /// Replace the recorded state
    pub fn record(&mut self, current: Observation) {
        self.files = current;
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
