//! Trailing-edge debouncing of file events

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;

/// Collapses bursts of events per path. A path becomes ready once `window`
/// has passed since its most recent event.
#[derive(Debug)]
pub struct Debouncer<T> {
    window: Duration,
    pending: HashMap<PathBuf, (T, Instant)>,
}

impl<T: Clone> Debouncer<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
        }
    }

    /// Note an event. A repeat within the window pushes the deadline back.
    pub fn record(&mut self, path: PathBuf, tag: T, now: Instant) {
        self.pending.insert(path, (tag, now));
    }

    /// Remove and return every path whose window has elapsed
    pub fn drain_ready(&mut self, now: Instant) -> Vec<(PathBuf, T)> {
        let window = self.window;
        let ready: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, (_, last))| now.saturating_duration_since(*last) >= window)
            .map(|(path, _)| path.clone())
            .collect();

        let mut out: Vec<(PathBuf, T)> = ready
            .into_iter()
            .filter_map(|path| self.pending.remove(&path).map(|(tag, _)| (path, tag)))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Earliest instant at which some path becomes ready
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending
            .values()
            .map(|(_, last)| *last + self.window)
            .min()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
