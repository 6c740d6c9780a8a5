//! Staged recovery of model output

use crate::recovery::{partial, repair, validate::validate, RecoveryAttempt, Strategy};
use crate::schema::{Issue, Rewrites, RiskLevel, StructuredResult};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Upper bound on candidate spans tried by bracket extraction
const MAX_SPAN_CANDIDATES: usize = 32;

const RECOVERY_FAILURE_FRAGMENT: &str = "（応答解析エラー）";
const RECOVERY_FAILURE_REASON: &str =
    "AIの応答を解析できなかったため、自動判定結果を表示できません。時間をおいて再度チェックしてください。";
const FALLBACK_SUGGESTIONS: [&str; 3] = [
    "時間をおいて再度チェックしてください",
    "効果・効能を断定する表現がないか確認してください",
    "最終的な表現は専門家に確認してください",
];

/// Result of a recovery run with its diagnostic trace
#[derive(Debug, Clone, Serialize)]
pub struct RecoveryOutcome {
    pub result: StructuredResult,
    /// Stage that produced `result`
    pub strategy: Strategy,
    pub attempts: Vec<RecoveryAttempt>,
}

impl RecoveryOutcome {
    /// True when nothing from the model output survived
    pub fn is_fallback(&self) -> bool {
        self.strategy == Strategy::Fallback
    }
}

/// Turn raw model output into a valid result. Never fails.
pub fn recover(raw: &str, original: &str) -> StructuredResult {
    recover_with_trace(raw, original).result
}

/// [`recover`] plus the ordered list of stages that were tried
pub fn recover_with_trace(raw: &str, original: &str) -> RecoveryOutcome {
    let mut attempts = Vec::with_capacity(6);
    let text = repair::strip_fences(raw);

    if let Some(result) = try_parse(&mut attempts, Strategy::DirectParse, &text) {
        return done(result, Strategy::DirectParse, attempts, raw);
    }

    match repair::outer_object(&text) {
        Some(cleaned) => {
            if let Some(result) = try_parse(&mut attempts, Strategy::CleanedParse, cleaned) {
                return done(result, Strategy::CleanedParse, attempts, raw);
            }
        }
        None => skip(&mut attempts, Strategy::CleanedParse, "no opening brace"),
    }

    match repair::from_first_brace(&text) {
        Some(body) => {
            let repaired = repair::repair(body);
            if let Some(result) = try_parse(&mut attempts, Strategy::RepairParse, &repaired) {
                return done(result, Strategy::RepairParse, attempts, raw);
            }
        }
        None => skip(&mut attempts, Strategy::RepairParse, "no opening brace"),
    }

    let spans = repair::balanced_spans(&text);
    let mut extracted = None;
    for span in spans.iter().take(MAX_SPAN_CANDIDATES) {
        if let Ok(result) = parse_and_validate(span) {
            extracted = Some(result);
            break;
        }
    }
    attempts.push(RecoveryAttempt::new(
        Strategy::BracketExtraction,
        extracted.is_some(),
        Vec::new(),
    ));
    if let Some(result) = extracted {
        return done(result, Strategy::BracketExtraction, attempts, raw);
    }
    debug!(
        "Bracket extraction failed over {} candidate spans",
        spans.len().min(MAX_SPAN_CANDIDATES)
    );

    if let Some((result, fields)) = partial::extract(&text, original) {
        attempts.push(RecoveryAttempt::new(Strategy::PartialExtraction, true, fields));
        return done(result, Strategy::PartialExtraction, attempts, raw);
    }
    attempts.push(RecoveryAttempt::new(Strategy::PartialExtraction, false, Vec::new()));

    attempts.push(RecoveryAttempt::new(Strategy::Fallback, true, Vec::new()));
    warn!(
        "Model output unrecoverable ({} chars), returning fallback result",
        raw.chars().count()
    );
    RecoveryOutcome {
        result: fallback(original, RECOVERY_FAILURE_FRAGMENT, RECOVERY_FAILURE_REASON),
        strategy: Strategy::Fallback,
        attempts,
    }
}

/// Minimal valid result carrying one informational issue; all rewrites echo
/// `original`.
pub fn fallback(original: &str, fragment: &str, reason: &str) -> StructuredResult {
    let issue = Issue::new(
        fragment,
        reason,
        RiskLevel::Medium,
        FALLBACK_SUGGESTIONS.iter().map(|s| s.to_string()).collect(),
    );
    StructuredResult::new(RiskLevel::Medium, vec![issue], Rewrites::echo(original))
}

fn parse_and_validate(text: &str) -> Result<StructuredResult, String> {
    let value: Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
    validate(&value).map_err(|e| e.to_string())
}

fn try_parse(
    attempts: &mut Vec<RecoveryAttempt>,
    strategy: Strategy,
    text: &str,
) -> Option<StructuredResult> {
    match parse_and_validate(text) {
        Ok(result) => {
            attempts.push(RecoveryAttempt::new(strategy, true, Vec::new()));
            Some(result)
        }
        Err(reason) => {
            debug!("Recovery stage {} failed: {}", strategy, reason);
            attempts.push(RecoveryAttempt::new(strategy, false, Vec::new()));
            None
        }
    }
}

fn skip(attempts: &mut Vec<RecoveryAttempt>, strategy: Strategy, reason: &str) {
    debug!("Recovery stage {} skipped: {}", strategy, reason);
    attempts.push(RecoveryAttempt::new(strategy, false, Vec::new()));
}

fn done(
    result: StructuredResult,
    strategy: Strategy,
    attempts: Vec<RecoveryAttempt>,
    raw: &str,
) -> RecoveryOutcome {
    if strategy != Strategy::DirectParse {
        debug!(
            "Recovered {} chars of model output at stage {}",
            raw.chars().count(),
            strategy
        );
    }
    RecoveryOutcome {
        result,
        strategy,
        attempts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELL_FORMED: &str = r#"{
  "overall_risk": "高",
  "risk_counts": {"total": 1, "high": 1, "medium": 0, "low": 0},
  "issues": [
    {"fragment": "シミが消える", "reason": "医薬品的な効能効果", "risk_level": "高",
     "suggestions": ["透明感のある肌へ", "うるおいを与える", "キメを整える"]}
  ],
  "rewritten_texts": {
    "conservative": "うるおいを与え、キメを整える",
    "balanced": "透明感のある肌へ導く",
    "appealing": "明るい印象の素肌へ"
  }
}"#;

    #[test]
    fn test_direct_parse() {
        let outcome = recover_with_trace(WELL_FORMED, "シミが消える");

        assert_eq!(outcome.strategy, Strategy::DirectParse);
        assert_eq!(outcome.attempts.len(), 1);
        assert_eq!(outcome.result.overall_risk, RiskLevel::High);
        assert!(outcome.result.rewrites.is_plain());
    }

    #[test]
    fn test_fenced_output() {
        let raw = format!("```json\n{}\n```", WELL_FORMED);
        assert_eq!(recover_with_trace(&raw, "x").strategy, Strategy::DirectParse);
    }

    #[test]
    fn test_prose_around_object() {
        let raw = format!("以下が結果です。\n{}\nご確認ください。", WELL_FORMED);
        let outcome = recover_with_trace(&raw, "x");
        assert_eq!(outcome.strategy, Strategy::CleanedParse);
    }

    #[test]
    fn test_missing_final_brace_repaired() {
        let raw = WELL_FORMED.trim_end().trim_end_matches('}');
        let outcome = recover_with_trace(raw, "x");

        assert_eq!(outcome.strategy, Strategy::RepairParse);
        assert!(!outcome.attempts[0].success);
        assert!(!outcome.attempts[1].success);
        assert_eq!(outcome.result.issues.len(), 1);
    }

    #[test]
    fn test_prose_falls_back() {
        let outcome = recover_with_trace("申し訳ありませんが判定できませんでした。", "原文");

        assert!(outcome.is_fallback());
        assert_eq!(outcome.result.overall_risk, RiskLevel::Medium);
        assert_eq!(outcome.result.rewrites.texts(), ["原文"; 3]);
        assert_eq!(outcome.result.issues.len(), 1);
        assert_eq!(outcome.result.issues[0].suggestions.len(), 3);
        assert_eq!(outcome.attempts.len(), 6);
    }

    #[test]
    fn test_fallback_is_consistent() {
        let result = fallback("原文", "API呼び出しエラー", "upstream failed");
        assert!(result.is_consistent());
        assert_eq!(result.risk_counts.medium, 1);
    }
}
