//! # Response Recovery
//!
//! Converts untrusted model output into a [`StructuredResult`](crate::schema::StructuredResult).
//! Stages run in order and the first validated success wins:
//!
//! 1. direct parse after stripping code fences
//! 2. parse of the outermost brace-delimited object
//! 3. parse after structural repair (quotes, dangling commas, missing closers)
//! 4. parse of the longest balanced `{...}` span that validates
//! 5. field-by-field extraction into a minimal result
//! 6. a fixed fallback whose rewrites echo the input
//!
//! The pipeline does no I/O and never fails.

pub mod partial;
pub mod pipeline;
pub mod repair;
pub mod validate;

pub use pipeline::{fallback, recover, recover_with_trace, RecoveryOutcome};
pub use validate::{validate, SchemaViolation};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Recovery stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    DirectParse,
    CleanedParse,
    RepairParse,
    BracketExtraction,
    PartialExtraction,
    Fallback,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::DirectParse => "direct_parse",
            Strategy::CleanedParse => "cleaned_parse",
            Strategy::RepairParse => "repair_parse",
            Strategy::BracketExtraction => "bracket_extraction",
            Strategy::PartialExtraction => "partial_extraction",
            Strategy::Fallback => "fallback",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stage's outcome; diagnostic only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryAttempt {
    pub strategy: Strategy,
    pub success: bool,
    /// Fields recovered by partial extraction
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partial_fields: Vec<String>,
}

impl RecoveryAttempt {
    pub fn new(strategy: Strategy, success: bool, partial_fields: Vec<String>) -> Self {
        Self {
            strategy,
            success,
            partial_fields,
        }
    }
}
