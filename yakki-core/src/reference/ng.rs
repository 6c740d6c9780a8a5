//! Known-problematic expressions and the literal pre-screen over them

use crate::error::{Result, YakkiError};
use crate::schema::{Issue, RiskLevel};
use regex::{Regex, RegexBuilder};
use serde::Deserialize;

/// File name of the expression list inside the data directory
pub const NG_FILE_NAME: &str = "ng_expressions.csv";

/// One row of the expression list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NgExpression {
    pub expression: String,
    pub reason: String,
    pub risk_level: RiskLevel,
    pub alternative: String,
}

impl NgExpression {
    pub fn new(
        expression: impl Into<String>,
        reason: impl Into<String>,
        risk_level: RiskLevel,
        alternative: impl Into<String>,
    ) -> Self {
        Self {
            expression: expression.into(),
            reason: reason.into(),
            risk_level,
            alternative: alternative.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct NgRow {
    #[serde(alias = "表現")]
    expression: String,
    #[serde(default, alias = "理由")]
    reason: String,
    #[serde(default, alias = "リスクレベル")]
    risk_level: String,
    #[serde(default, alias = "代替表現")]
    alternative: String,
}

/// Compiled expression list
#[derive(Debug, Clone)]
pub struct NgList {
    entries: Vec<(NgExpression, Regex)>,
}

impl NgList {
    pub fn new(expressions: Vec<NgExpression>) -> Self {
        let entries = expressions
            .into_iter()
            .filter(|e| !e.expression.trim().is_empty())
            .filter_map(|e| {
                RegexBuilder::new(&regex::escape(e.expression.trim()))
                    .case_insensitive(true)
                    .build()
                    .ok()
                    .map(|re| (e, re))
            })
            .collect();
        Self { entries }
    }

    /// Built-in list used when the data directory has no expression file
    pub fn defaults() -> Self {
        Self::new(vec![
            NgExpression::new("即効性", "効果の即時性を示唆", RiskLevel::High, "お手入れ"),
            NgExpression::new("完治", "医学的治療効果", RiskLevel::High, "お手入れ"),
            NgExpression::new(
                "美白",
                "薬用化粧品以外では使用不可",
                RiskLevel::Medium,
                "透明感",
            ),
        ])
    }

    /// Parse CSV with English or Japanese headers. Unrecognized risk
    /// labels read as medium; blank expressions are dropped.
    pub fn from_csv(content: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(content.as_bytes());

        let mut expressions = Vec::new();
        for row in reader.deserialize::<NgRow>() {
            let row = row.map_err(|e| YakkiError::Serialization(format!("ng list: {}", e)))?;
            expressions.push(NgExpression {
                risk_level: RiskLevel::from_label(&row.risk_level).unwrap_or(RiskLevel::Medium),
                expression: row.expression,
                reason: row.reason,
                alternative: row.alternative,
            });
        }
        Ok(Self::new(expressions))
    }

    /// One issue per case-insensitive occurrence of each expression
    pub fn screen(&self, text: &str) -> Vec<Issue> {
        let mut issues = Vec::new();
        for (expr, re) in &self.entries {
            for m in re.find_iter(text) {
                let suggestions = if expr.alternative.is_empty() {
                    Vec::new()
                } else {
                    vec![expr.alternative.clone()]
                };
                issues.push(Issue::new(
                    m.as_str(),
                    expr.reason.clone(),
                    expr.risk_level,
                    suggestions,
                ));
            }
        }
        issues
    }

    pub fn expressions(&self) -> impl Iterator<Item = &NgExpression> {
        self.entries.iter().map(|(e, _)| e)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for NgList {
    fn default() -> Self {
        Self::defaults()
    }
}
