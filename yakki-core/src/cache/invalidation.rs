//! Cache partitions and invalidation bookkeeping
//!
//! Three partitions invalidate independently:
//! - `Data`: the aggregate of the reference data directory
//! - `Rule`: per-text-type rule documents
//! - `Result`: computed verdicts keyed by request fingerprint

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Named cache partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    All,
    Data,
    Rule,
    Result,
}

impl Partition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::All => "all",
            Partition::Data => "data",
            Partition::Rule => "rule",
            Partition::Result => "result",
        }
    }

    /// Whether invalidating `self` also covers `other`
    pub fn covers(&self, other: Partition) -> bool {
        *self == Partition::All || *self == other
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Partition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Partition::All),
            "data" => Ok(Partition::Data),
            "rule" | "rules" => Ok(Partition::Rule),
            "result" | "results" => Ok(Partition::Result),
            other => Err(format!("unknown partition: {}", other)),
        }
    }
}

/// Reason for cache invalidation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvalidationReason {
    /// Entry expired based on TTL
    Expired,

    /// Explicit invalidation by a caller
    Manual,

    /// A tracked source file changed, appeared or disappeared
    SourceChanged { path: PathBuf },
}

impl fmt::Display for InvalidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidationReason::Expired => write!(f, "TTL expired"),
            InvalidationReason::Manual => write!(f, "manual invalidation"),
            InvalidationReason::SourceChanged { path } => {
                write!(f, "source changed: {}", path.display())
            }
        }
    }
}

/// Record of one invalidation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidationEvent {
    /// Partition the invalidation applied to
    pub partition: Partition,

    /// Reason for invalidation
    pub reason: InvalidationReason,

    /// When the invalidation occurred
    pub timestamp: DateTime<Utc>,

    /// Number of entries dropped
    pub removed: usize,
}

impl InvalidationEvent {
    pub fn new(partition: Partition, reason: InvalidationReason, removed: usize) -> Self {
        Self {
            partition,
            reason,
            timestamp: Utc::now(),
            removed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_parsing() {
        assert_eq!("all".parse::<Partition>().unwrap(), Partition::All);
        assert_eq!(" Rule ".parse::<Partition>().unwrap(), Partition::Rule);
        assert_eq!("results".parse::<Partition>().unwrap(), Partition::Result);
        assert!("nope".parse::<Partition>().is_err());
    }

    #[test]
    fn test_partition_covers() {
        assert!(Partition::All.covers(Partition::Data));
        assert!(Partition::Data.covers(Partition::Data));
        assert!(!Partition::Data.covers(Partition::Rule));
    }

    #[test]
    fn test_invalidation_reason_display() {
        assert_eq!(InvalidationReason::Expired.to_string(), "TTL expired");

        let reason = InvalidationReason::SourceChanged {
            path: PathBuf::from("data/law1.md"),
        };
        assert!(reason.to_string().contains("law1.md"));
    }

    #[test]
    fn test_invalidation_event() {
        let event = InvalidationEvent::new(Partition::Result, InvalidationReason::Manual, 4);
        assert_eq!(event.removed, 4);
        assert_eq!(event.partition, Partition::Result);
    }
}
