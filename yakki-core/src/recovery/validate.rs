//! Schema validation of parsed model output

use crate::schema::{
    Issue, RewriteSet, RewriteText, Rewrites, RiskLevel, StructuredResult,
};
use serde_json::{Map, Value};
use thiserror::Error;

/// Why a parsed value was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
    #[error("top level is not an object")]
    NotAnObject,

    #[error("missing required key: {0}")]
    MissingKey(&'static str),

    #[error("unrecognized risk level: {0}")]
    InvalidRisk(String),

    #[error("issue {index}: {reason}")]
    InvalidIssue { index: usize, reason: String },

    #[error("rewrites: {0}")]
    InvalidRewrites(String),
}

/// Turn a parsed value into a [`StructuredResult`].
///
/// Risk counts in the input are required to be present but are never
/// trusted; they are recomputed from the issue list.
pub fn validate(value: &Value) -> Result<StructuredResult, SchemaViolation> {
    let obj = value.as_object().ok_or(SchemaViolation::NotAnObject)?;

    let overall = field(obj, &["overall_risk", "overallRisk"])
        .ok_or(SchemaViolation::MissingKey("overall_risk"))?;
    let overall_risk = parse_risk(overall)?;

    field(obj, &["risk_counts", "riskCounts"]).ok_or(SchemaViolation::MissingKey("risk_counts"))?;

    let issues = field(obj, &["issues"])
        .ok_or(SchemaViolation::MissingKey("issues"))?
        .as_array()
        .ok_or_else(|| SchemaViolation::InvalidIssue {
            index: 0,
            reason: "issues is not an array".to_string(),
        })?
        .iter()
        .enumerate()
        .map(|(index, item)| parse_issue(index, item))
        .collect::<Result<Vec<_>, _>>()?;

    let rewrites = field(obj, &["rewritten_texts", "rewrites"])
        .ok_or(SchemaViolation::MissingKey("rewritten_texts"))?;
    let rewrites = parse_rewrites(rewrites)?;

    Ok(StructuredResult::new(overall_risk, issues, rewrites))
}

fn field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k))
}

fn parse_risk(value: &Value) -> Result<RiskLevel, SchemaViolation> {
    let label = value
        .as_str()
        .ok_or_else(|| SchemaViolation::InvalidRisk(value.to_string()))?;
    RiskLevel::from_label(label).ok_or_else(|| SchemaViolation::InvalidRisk(label.to_string()))
}

fn parse_issue(index: usize, value: &Value) -> Result<Issue, SchemaViolation> {
    let invalid = |reason: &str| SchemaViolation::InvalidIssue {
        index,
        reason: reason.to_string(),
    };
    let obj = value.as_object().ok_or_else(|| invalid("not an object"))?;

    let fragment = field(obj, &["fragment"])
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("missing fragment"))?;
    let reason = field(obj, &["reason"])
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("missing reason"))?;
    let risk_level = field(obj, &["risk_level", "riskLevel"]).ok_or_else(|| invalid("missing risk_level"))?;
    let risk_level = parse_risk(risk_level)?;
    let suggestions = field(obj, &["suggestions"])
        .and_then(Value::as_array)
        .ok_or_else(|| invalid("missing suggestions"))?
        .iter()
        .filter_map(|s| s.as_str().map(str::to_string))
        .collect();

    Ok(Issue::new(fragment, reason, risk_level, suggestions))
}

enum RewriteShape {
    Plain(String),
    Detailed(RewriteText),
}

fn parse_rewrites(value: &Value) -> Result<Rewrites, SchemaViolation> {
    let obj = value
        .as_object()
        .ok_or_else(|| SchemaViolation::InvalidRewrites("not an object".to_string()))?;

    let conservative = parse_variant(obj, "conservative")?;
    let balanced = parse_variant(obj, "balanced")?;
    let appealing = parse_variant(obj, "appealing")?;

    Ok(match (conservative, balanced, appealing) {
        (RewriteShape::Plain(c), RewriteShape::Plain(b), RewriteShape::Plain(a)) => {
            Rewrites::Plain(RewriteSet {
                conservative: c,
                balanced: b,
                appealing: a,
            })
        }
        // Mixed shapes are promoted to the richer one
        (c, b, a) => Rewrites::Detailed(RewriteSet {
            conservative: detailed(c),
            balanced: detailed(b),
            appealing: detailed(a),
        }),
    })
}

fn parse_variant(obj: &Map<String, Value>, key: &'static str) -> Result<RewriteShape, SchemaViolation> {
    match obj.get(key) {
        Some(Value::String(text)) => Ok(RewriteShape::Plain(text.clone())),
        Some(Value::Object(inner)) => {
            let text = inner
                .get("text")
                .and_then(Value::as_str)
                .ok_or_else(|| SchemaViolation::InvalidRewrites(format!("{}.text missing", key)))?;
            let explanation = inner
                .get("explanation")
                .and_then(Value::as_str)
                .unwrap_or_default();
            Ok(RewriteShape::Detailed(RewriteText::new(text, explanation)))
        }
        Some(_) => Err(SchemaViolation::InvalidRewrites(format!(
            "{} has an unsupported shape",
            key
        ))),
        None => Err(SchemaViolation::MissingKey(key)),
    }
}

fn detailed(shape: RewriteShape) -> RewriteText {
    match shape {
        RewriteShape::Plain(text) => RewriteText::new(text, ""),
        RewriteShape::Detailed(rt) => rt,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload() -> Value {
        json!({
            "overall_risk": "高",
            "risk_counts": {"total": 99, "high": 0, "medium": 0, "low": 0},
            "issues": [
                {"fragment": "シミが消える", "reason": "医薬品的効能", "risk_level": "高",
                 "suggestions": ["透明感のある肌へ", "うるおいを与える", "キメを整える", "四つ目"]},
                {"fragment": "最高", "reason": "最大級表現", "risk_level": "low", "suggestions": []}
            ],
            "rewritten_texts": {
                "conservative": "うるおいを与える",
                "balanced": "透明感のある肌へ",
                "appealing": "明るい印象の肌へ"
            }
        })
    }

    #[test]
    fn test_valid_payload_recomputes_counts() {
        let result = validate(&payload()).unwrap();

        assert_eq!(result.overall_risk, RiskLevel::High);
        assert_eq!(result.risk_counts.total, 2);
        assert_eq!(result.risk_counts.high, 1);
        assert_eq!(result.risk_counts.low, 1);
        assert_eq!(result.issues[0].suggestions.len(), 3);
        assert!(result.rewrites.is_plain());
    }

    #[test]
    fn test_camel_case_keys() {
        let value = json!({
            "overallRisk": "medium",
            "riskCounts": {},
            "issues": [{"fragment": "a", "reason": "b", "riskLevel": "中", "suggestions": []}],
            "rewrites": {
                "conservative": {"text": "c", "explanation": "e"},
                "balanced": {"text": "b"},
                "appealing": {"text": "a", "explanation": "x"}
            }
        });
        let result = validate(&value).unwrap();

        assert_eq!(result.overall_risk, RiskLevel::Medium);
        assert!(!result.rewrites.is_plain());
        assert_eq!(result.rewrites.balanced(), "b");
    }

    #[test]
    fn test_missing_key_rejected() {
        let mut value = payload();
        value.as_object_mut().unwrap().remove("risk_counts");
        assert_eq!(
            validate(&value).unwrap_err(),
            SchemaViolation::MissingKey("risk_counts")
        );
    }

    #[test]
    fn test_unknown_overall_risk_rejected() {
        let mut value = payload();
        value["overall_risk"] = json!("不明");
        assert!(matches!(
            validate(&value).unwrap_err(),
            SchemaViolation::InvalidRisk(_)
        ));
    }

    #[test]
    fn test_unknown_issue_risk_rejected() {
        let mut value = payload();
        value["issues"][1]["risk_level"] = json!("critical");
        assert!(validate(&value).is_err());
    }

    #[test]
    fn test_issue_without_suggestions_rejected() {
        let mut value = payload();
        value["issues"][0].as_object_mut().unwrap().remove("suggestions");
        assert!(matches!(
            validate(&value).unwrap_err(),
            SchemaViolation::InvalidIssue { index: 0, .. }
        ));
    }

    #[test]
    fn test_mixed_rewrite_shapes_promoted() {
        let mut value = payload();
        value["rewritten_texts"]["balanced"] = json!({"text": "整える", "explanation": "穏当"});

        let result = validate(&value).unwrap();
        match result.rewrites {
            Rewrites::Detailed(set) => {
                assert_eq!(set.conservative.text, "うるおいを与える");
                assert_eq!(set.conservative.explanation, "");
                assert_eq!(set.balanced.explanation, "穏当");
            }
            Rewrites::Plain(_) => panic!("expected detailed rewrites"),
        }
    }

    #[test]
    fn test_missing_variant_rejected() {
        let mut value = payload();
        value["rewritten_texts"]
            .as_object_mut()
            .unwrap()
            .remove("appealing");
        assert_eq!(
            validate(&value).unwrap_err(),
            SchemaViolation::MissingKey("appealing")
        );
    }
}
