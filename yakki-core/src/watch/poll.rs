//! Polling notifier

use crate::cache::invalidation::InvalidationReason;
use crate::reference::{FreshnessTracker, SourceFs};
use crate::watch::{Notifier, NotifierStatus, WatchMode, WatchTarget};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Compares modification times of every file in the target directories on a
/// fixed interval and invalidates on change, addition or deletion.
pub struct PollNotifier {
    task: Mutex<Option<JoinHandle<()>>>,
    running: Arc<AtomicBool>,
    signals: Arc<AtomicU64>,
    watched_dirs: usize,
}

impl PollNotifier {
    pub fn start(targets: Vec<WatchTarget>, fs: Arc<dyn SourceFs>, interval: Duration) -> Self {
        info!(
            "Starting polling notifier over {} directories (interval: {:?})",
            targets.len(),
            interval
        );

        let running = Arc::new(AtomicBool::new(true));
        let signals = Arc::new(AtomicU64::new(0));
        let watched_dirs = targets.len();
        let task = tokio::spawn(run_poll_loop(targets, fs, interval, Arc::clone(&signals)));

        Self {
            task: Mutex::new(Some(task)),
            running,
            signals,
            watched_dirs,
        }
    }
}

impl Notifier for PollNotifier {
    fn mode(&self) -> WatchMode {
        WatchMode::Poll
    }

    fn status(&self) -> NotifierStatus {
        NotifierStatus {
            mode: WatchMode::Poll,
            running: self.running.load(Ordering::SeqCst),
            watched_dirs: self.watched_dirs,
            signals: self.signals.load(Ordering::SeqCst),
        }
    }

    fn stop(&self) {
        if let Ok(mut task) = self.task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
                info!("Polling notifier stopped");
            }
        }
        self.running.store(false, Ordering::SeqCst);
    }
}

impl Drop for PollNotifier {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_poll_loop(
    targets: Vec<WatchTarget>,
    fs: Arc<dyn SourceFs>,
    interval: Duration,
    signals: Arc<AtomicU64>,
) {
    let mut trackers: Vec<Option<FreshnessTracker>> = vec![None; targets.len()];
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        for (target, tracker) in targets.iter().zip(trackers.iter_mut()) {
            // A missing directory reads as empty so its files count as removed
            let files = fs.list(&target.dir).await.unwrap_or_default();
            let observation = FreshnessTracker::observe(fs.as_ref(), &files).await;

            match tracker {
                None => {
                    let mut baseline = FreshnessTracker::new();
                    baseline.record(observation);
                    *tracker = Some(baseline);
                }
                Some(tracker) => {
                    let changes = tracker.changes(&observation);
                    if let Some(first) = changes.first() {
                        debug!(
                            "Poll detected {} changes in {}",
                            changes.len(),
                            target.dir.display()
                        );
                        target
                            .sink
                            .invalidate_source(InvalidationReason::SourceChanged {
                                path: first.path().to_path_buf(),
                            })
                            .await;
                        signals.fetch_add(1, Ordering::SeqCst);
                    }
                    tracker.record(observation);
                }
            }
        }
    }
}
