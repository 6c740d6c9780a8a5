//! Check result schema
//!
//! This module defines the request vocabulary (categories, text types, risk
//! levels) and the structured verdict produced for every check.

pub mod result;
pub mod types;

pub use result::{Issue, RewriteSet, RewriteText, Rewrites, RiskCounts, StructuredResult};
pub use types::{Category, CheckRequest, RiskLevel, TextType};
