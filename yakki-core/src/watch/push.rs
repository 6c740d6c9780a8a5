//! OS event notifier

use crate::cache::invalidation::{InvalidationReason, Partition};
use crate::error::{Result, YakkiError};
use crate::watch::debounce::Debouncer;
use crate::watch::{Notifier, NotifierStatus, WatchMode, WatchTarget};
use notify::event::{AccessKind, AccessMode, MetadataKind, ModifyKind};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Debounced OS file-system events mapped to partition invalidations
pub struct PushNotifier {
    watcher: Mutex<Option<RecommendedWatcher>>,
    task: Mutex<Option<JoinHandle<()>>>,
    running: Arc<AtomicBool>,
    signals: Arc<AtomicU64>,
    partitions: Vec<Partition>,
}

impl PushNotifier {
    /// Subscribe to every target directory. Fails when the platform watcher
    /// cannot be created or no directory could be watched. Targets that
    /// cannot be watched are skipped and left to per-access scans.
    pub fn start(targets: Vec<WatchTarget>, debounce: Duration) -> Result<Self> {
        let (sender, receiver) = mpsc::channel(1024);

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let _ = sender.blocking_send(res);
            },
            notify::Config::default(),
        )
        .map_err(|e| YakkiError::Watch(format!("watcher init failed: {}", e)))?;

        let mut watched = Vec::new();
        for target in targets {
            if let Err(e) = watcher.watch(&target.dir, RecursiveMode::NonRecursive) {
                warn!("Failed to watch {}: {}", target.dir.display(), e);
                continue;
            }
            let canonical = std::fs::canonicalize(&target.dir).unwrap_or_else(|_| target.dir.clone());
            info!(
                "Watching {} for {} changes",
                target.dir.display(),
                target.partition
            );
            watched.push((canonical, target));
        }

        if watched.is_empty() {
            return Err(YakkiError::Watch("no directory could be watched".to_string()));
        }

        let running = Arc::new(AtomicBool::new(true));
        let signals = Arc::new(AtomicU64::new(0));
        let partitions = watched.iter().map(|(_, target)| target.partition).collect();
        let task = tokio::spawn(run_event_loop(
            receiver,
            watched,
            debounce,
            Arc::clone(&running),
            Arc::clone(&signals),
        ));

        Ok(Self {
            watcher: Mutex::new(Some(watcher)),
            task: Mutex::new(Some(task)),
            running,
            signals,
            partitions,
        })
    }
}

impl Notifier for PushNotifier {
    fn mode(&self) -> WatchMode {
        WatchMode::Push
    }

    fn status(&self) -> NotifierStatus {
        NotifierStatus {
            mode: WatchMode::Push,
            running: self.running.load(Ordering::SeqCst),
            watched_dirs: self.partitions.len(),
            signals: self.signals.load(Ordering::SeqCst),
        }
    }

    fn delivers(&self, partition: Partition) -> bool {
        self.running.load(Ordering::SeqCst) && self.partitions.contains(&partition)
    }

    fn stop(&self) {
        if let Ok(mut watcher) = self.watcher.lock() {
            watcher.take();
        }
        if let Ok(mut task) = self.task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
                info!("Push notifier stopped");
            }
        }
        self.running.store(false, Ordering::SeqCst);
    }
}

impl Drop for PushNotifier {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_event_loop(
    mut receiver: mpsc::Receiver<notify::Result<Event>>,
    targets: Vec<(PathBuf, WatchTarget)>,
    debounce: Duration,
    running: Arc<AtomicBool>,
    signals: Arc<AtomicU64>,
) {
    let mut debouncer: Debouncer<usize> = Debouncer::new(debounce);

    loop {
        let deadline = debouncer.next_deadline();
        tokio::select! {
            received = receiver.recv() => match received {
                Some(Ok(event)) => {
                    if !is_content_change(&event.kind) {
                        continue;
                    }
                    let now = Instant::now();
                    for path in event.paths {
                        if let Some(index) = target_for(&targets, &path) {
                            debug!("File event {:?} on {}", event.kind, path.display());
                            debouncer.record(path, index, now);
                        }
                    }
                }
                Some(Err(e)) => warn!("File watcher error: {}", e),
                None => break,
            },
            _ = sleep_until(deadline), if deadline.is_some() => {
                for (path, index) in debouncer.drain_ready(Instant::now()) {
                    let target = &targets[index].1;
                    target
                        .sink
                        .invalidate_source(InvalidationReason::SourceChanged { path })
                        .await;
                    signals.fetch_add(1, Ordering::SeqCst);
                }
            }
        }
    }

    running.store(false, Ordering::SeqCst);
    debug!("Push notifier event loop finished");
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

/// Reads are ignored; the caches' own rebuilds would otherwise retrigger them.
fn is_content_change(kind: &EventKind) -> bool {
    match kind {
        EventKind::Modify(ModifyKind::Metadata(MetadataKind::AccessTime)) => false,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => true,
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => true,
        _ => false,
    }
}

fn target_for(targets: &[(PathBuf, WatchTarget)], path: &Path) -> Option<usize> {
    let parent = path.parent()?;
    targets
        .iter()
        .position(|(canonical, target)| {
            parent == canonical.as_path() || parent == target.dir.as_path()
        })
}
