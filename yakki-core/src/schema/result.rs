//! The structured verdict returned by a compliance check

use crate::schema::types::RiskLevel;
use serde::{Deserialize, Serialize};

/// Per-level tally of issues
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskCounts {
    pub total: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl RiskCounts {
    /// Count issues by level. This is the only way counts are produced;
    /// whatever the upstream text claimed is discarded.
    pub fn tally(issues: &[Issue]) -> Self {
        let mut counts = RiskCounts {
            total: issues.len(),
            ..Default::default()
        };
        for issue in issues {
            match issue.risk_level {
                RiskLevel::High => counts.high += 1,
                RiskLevel::Medium => counts.medium += 1,
                RiskLevel::Low => counts.low += 1,
            }
        }
        counts
    }
}

/// One flagged fragment of the checked text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub fragment: String,
    pub reason: String,
    #[serde(alias = "riskLevel")]
    pub risk_level: RiskLevel,
    /// Up to three alternative phrasings
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl Issue {
    pub const MAX_SUGGESTIONS: usize = 3;

    pub fn new(
        fragment: impl Into<String>,
        reason: impl Into<String>,
        risk_level: RiskLevel,
        mut suggestions: Vec<String>,
    ) -> Self {
        suggestions.truncate(Self::MAX_SUGGESTIONS);
        Self {
            fragment: fragment.into(),
            reason: reason.into(),
            risk_level,
            suggestions,
        }
    }
}

/// A rewrite with the reasoning behind it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteText {
    pub text: String,
    #[serde(default)]
    pub explanation: String,
}

impl RewriteText {
    pub fn new(text: impl Into<String>, explanation: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            explanation: explanation.into(),
        }
    }
}

/// The three rewrite variants, always all present
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteSet<T> {
    pub conservative: T,
    pub balanced: T,
    pub appealing: T,
}

impl<T: Clone> RewriteSet<T> {
    pub fn uniform(value: T) -> Self {
        Self {
            conservative: value.clone(),
            balanced: value.clone(),
            appealing: value,
        }
    }
}

/// Rewrite suggestions in one of the two accepted shapes.
///
/// Older model answers carry bare strings, newer ones carry `{text, explanation}`
/// objects. A single result holds exactly one of the shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Rewrites {
    Plain(RewriteSet<String>),
    Detailed(RewriteSet<RewriteText>),
}

impl Rewrites {
    /// All three variants echo the original text
    pub fn echo(original: &str) -> Self {
        Rewrites::Plain(RewriteSet::uniform(original.to_string()))
    }

    /// All three variants echo the original text with a shared explanation
    pub fn echo_with_explanation(original: &str, explanation: &str) -> Self {
        Rewrites::Detailed(RewriteSet::uniform(RewriteText::new(original, explanation)))
    }

    pub fn conservative(&self) -> &str {
        match self {
            Rewrites::Plain(set) => &set.conservative,
            Rewrites::Detailed(set) => &set.conservative.text,
        }
    }

    pub fn balanced(&self) -> &str {
        match self {
            Rewrites::Plain(set) => &set.balanced,
            Rewrites::Detailed(set) => &set.balanced.text,
        }
    }

    pub fn appealing(&self) -> &str {
        match self {
            Rewrites::Plain(set) => &set.appealing,
            Rewrites::Detailed(set) => &set.appealing.text,
        }
    }

    /// Texts in conservative, balanced, appealing order
    pub fn texts(&self) -> [&str; 3] {
        [self.conservative(), self.balanced(), self.appealing()]
    }

    pub fn is_plain(&self) -> bool {
        matches!(self, Rewrites::Plain(_))
    }
}

/// The canonical verdict of a compliance check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredResult {
    #[serde(alias = "overallRisk")]
    pub overall_risk: RiskLevel,
    #[serde(alias = "riskCounts")]
    pub risk_counts: RiskCounts,
    pub issues: Vec<Issue>,
    #[serde(rename = "rewritten_texts", alias = "rewrites")]
    pub rewrites: Rewrites,
}

impl StructuredResult {
    /// Build a result; risk counts are always derived from `issues`
    pub fn new(overall_risk: RiskLevel, issues: Vec<Issue>, rewrites: Rewrites) -> Self {
        let risk_counts = RiskCounts::tally(&issues);
        Self {
            overall_risk,
            risk_counts,
            issues,
            rewrites,
        }
    }

    /// Whether the stored counts agree with the issue list
    pub fn is_consistent(&self) -> bool {
        self.risk_counts == RiskCounts::tally(&self.issues)
    }

    /// Highest level among the issues, if any
    pub fn max_issue_level(&self) -> Option<RiskLevel> {
        self.issues.iter().map(|i| i.risk_level).max()
    }
}
