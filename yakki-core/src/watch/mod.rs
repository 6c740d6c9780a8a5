//! # File Change Notifier
//!
//! Pre-invalidates the reference caches when their source directories
//! change. Two interchangeable variants exist:
//!
//! - [`PushNotifier`]: OS file-system events via `notify`, debounced per path
//! - [`PollNotifier`]: periodic modification-time comparison
//!
//! The reference caches stay correct without any notifier; a notifier only
//! shortens the time until a change is picked up.

pub mod debounce;
pub mod poll;
pub mod push;

pub use debounce::Debouncer;
pub use poll::PollNotifier;
pub use push::PushNotifier;

use crate::cache::invalidation::{InvalidationEvent, InvalidationReason, Partition};
use crate::error::YakkiError;
use crate::reference::{DataCache, RuleCache, SourceFs};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Notifier variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchMode {
    Push,
    Poll,
    Off,
}

impl WatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WatchMode::Push => "push",
            WatchMode::Poll => "poll",
            WatchMode::Off => "off",
        }
    }
}

impl fmt::Display for WatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WatchMode {
    type Err = YakkiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "push" | "watch" => Ok(WatchMode::Push),
            "poll" | "polling" => Ok(WatchMode::Poll),
            "off" | "none" | "disabled" => Ok(WatchMode::Off),
            other => Err(YakkiError::Config(format!("unknown watch mode: {}", other))),
        }
    }
}

/// Notifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    pub mode: WatchMode,
    /// Quiet period after the last event for a path before it fires
    pub debounce: Duration,
    pub poll_interval: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            mode: WatchMode::Push,
            debounce: Duration::from_secs(1),
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// Receives invalidation signals from a notifier
#[async_trait]
pub trait InvalidationSink: Send + Sync {
    async fn invalidate_source(&self, reason: InvalidationReason) -> InvalidationEvent;
}

#[async_trait]
impl InvalidationSink for DataCache {
    async fn invalidate_source(&self, reason: InvalidationReason) -> InvalidationEvent {
        self.invalidate(reason).await
    }
}

#[async_trait]
impl InvalidationSink for RuleCache {
    async fn invalidate_source(&self, reason: InvalidationReason) -> InvalidationEvent {
        self.invalidate(reason).await
    }
}

/// A directory and the partition to invalidate when it changes
#[derive(Clone)]
pub struct WatchTarget {
    pub dir: PathBuf,
    pub partition: Partition,
    pub sink: Arc<dyn InvalidationSink>,
}

impl WatchTarget {
    pub fn new(dir: impl Into<PathBuf>, partition: Partition, sink: Arc<dyn InvalidationSink>) -> Self {
        Self {
            dir: dir.into(),
            partition,
            sink,
        }
    }
}

impl fmt::Debug for WatchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchTarget")
            .field("dir", &self.dir)
            .field("partition", &self.partition)
            .finish()
    }
}

/// Diagnostic view of a running notifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierStatus {
    pub mode: WatchMode,
    pub running: bool,
    pub watched_dirs: usize,
    /// Invalidation signals delivered so far
    pub signals: u64,
}

/// A running file change notifier
pub trait Notifier: Send + Sync {
    fn mode(&self) -> WatchMode;

    fn status(&self) -> NotifierStatus;

    /// Whether every change under `partition`'s directory is delivered as a
    /// signal, so its cache may skip per-access scans.
    fn delivers(&self, _partition: Partition) -> bool {
        false
    }

    /// Stop delivering signals. Idempotent.
    fn stop(&self);
}

/// Start the notifier selected by `config`, falling back from push to poll
/// when OS events are unavailable. Returns `None` in `off` mode.
///
/// Must be called from within a Tokio runtime.
pub fn start_notifier(
    config: &WatchConfig,
    targets: Vec<WatchTarget>,
    fs: Arc<dyn SourceFs>,
) -> Option<Box<dyn Notifier>> {
    match config.mode {
        WatchMode::Off => {
            info!("File change notifier disabled");
            None
        }
        WatchMode::Push => match PushNotifier::start(targets.clone(), config.debounce) {
            Ok(notifier) => Some(Box::new(notifier)),
            Err(e) => {
                warn!("Push notifier unavailable, falling back to polling: {}", e);
                Some(Box::new(PollNotifier::start(
                    targets,
                    fs,
                    config.poll_interval,
                )))
            }
        },
        WatchMode::Poll => Some(Box::new(PollNotifier::start(
            targets,
            fs,
            config.poll_interval,
        ))),
    }
}
