//! # Reference Content
//!
//! In-memory aggregates of the on-disk knowledge sources:
//!
//! - [`DataCache`]: every accepted file of the data directory joined into one
//!   prompt section, plus the expression list used for pre-screening
//! - [`RuleCache`]: one rule document per [`TextType`](crate::schema::TextType)
//!
//! Both rebuild wholesale when a tracked file's modification time changes or
//! the directory gains or loses a file.

pub mod data;
pub mod freshness;
pub mod fs;
pub mod ng;
pub mod rule;

pub use data::{DataCache, DataSnapshot};
pub use freshness::{FileChange, FreshnessTracker, Observation};
pub use fs::{LocalFs, SourceFs};
pub use ng::{NgExpression, NgList, NG_FILE_NAME};
pub use rule::RuleCache;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where the knowledge sources live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceConfig {
    pub data_dir: PathBuf,
    pub rule_dir: PathBuf,
    /// Extensions (without the dot) that belong in the data aggregate
    pub data_extensions: Vec<String>,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            rule_dir: PathBuf::from("rule"),
            data_extensions: ["csv", "md", "txt", "json"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl ReferenceConfig {
    pub fn new(data_dir: impl Into<PathBuf>, rule_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            rule_dir: rule_dir.into(),
            ..Default::default()
        }
    }
}

/// Diagnostic view of one reference cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreshnessState {
    pub cached: bool,
    pub entries: usize,
    pub tracked_files: usize,
    pub last_rebuild: Option<DateTime<Utc>>,
    pub rebuilds: u64,
    /// Per-access scans are skipped while a push notifier is active
    pub notifier_backed: bool,
}
