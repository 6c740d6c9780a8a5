//! Field-by-field extraction from text that does not parse as a whole

use crate::schema::{Issue, RewriteSet, RewriteText, Rewrites, RiskLevel, StructuredResult};
use once_cell::sync::Lazy;
use regex::Regex;

/// A JSON string body, escapes included
const STR: &str = r#""((?:[^"\\]|\\.)*)""#;

static RISK_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(&format!(r#""overall_?[rR]isk"\s*:\s*{}"#, STR)).unwrap(),
        Regex::new(r"(?:リスクレベル|総合リスク)\s*[：:]\s*([高中低])").unwrap(),
        Regex::new(r"(?i)overall\s+risk(?:\s+level)?\s*(?:is|[：:])?\s*(high|medium|low)").unwrap(),
    ]
});

static FRAGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(&format!(r#""fragment"\s*:\s*{}"#, STR)).unwrap());
static REASON: Lazy<Regex> = Lazy::new(|| Regex::new(&format!(r#""reason"\s*:\s*{}"#, STR)).unwrap());
static ISSUE_RISK: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r#""risk_?[lL]evel"\s*:\s*{}"#, STR)).unwrap());
static SUGGESTIONS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""suggestions"\s*:\s*\[((?:[^\]"]|"(?:[^"\\]|\\.)*")*)"#).unwrap());
static STRING_LITERAL: Lazy<Regex> = Lazy::new(|| Regex::new(STR).unwrap());

const VARIANTS: [&str; 3] = ["conservative", "balanced", "appealing"];

struct VariantPatterns {
    plain: Regex,
    text: Regex,
    explanation: Regex,
}

static VARIANT_PATTERNS: Lazy<Vec<VariantPatterns>> = Lazy::new(|| {
    VARIANTS
        .iter()
        .map(|name| VariantPatterns {
            plain: Regex::new(&format!(r#""{}"\s*:\s*{}"#, name, STR)).unwrap(),
            text: Regex::new(&format!(r#""{}"\s*:\s*\{{[^{{}}]*?"text"\s*:\s*{}"#, name, STR))
                .unwrap(),
            explanation: Regex::new(&format!(
                r#""{}"\s*:\s*\{{[^{{}}]*?"explanation"\s*:\s*{}"#,
                name, STR
            ))
            .unwrap(),
        })
        .collect()
});

const MISSING_REASON: &str = "理由を取得できませんでした";

/// Result synthesized from whatever fields could be found, with the names
/// of those fields. `None` when nothing was recoverable.
pub fn extract(text: &str, original: &str) -> Option<(StructuredResult, Vec<String>)> {
    let mut fields = Vec::new();

    let risk = extract_risk(text);
    if risk.is_some() {
        fields.push("overall_risk".to_string());
    }

    let issues = extract_issues(text);
    if !issues.is_empty() {
        fields.push(format!("issues[{}]", issues.len()));
    }

    let (rewrites, found) = extract_rewrites(text, original);
    fields.extend(found.iter().map(|name| format!("rewritten_texts.{}", name)));

    if fields.is_empty() {
        return None;
    }

    let overall = risk.unwrap_or(RiskLevel::Medium);
    Some((StructuredResult::new(overall, issues, rewrites), fields))
}

/// First risk token found by any of the known phrasings
pub fn extract_risk(text: &str) -> Option<RiskLevel> {
    RISK_PATTERNS.iter().find_map(|re| {
        re.captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| RiskLevel::from_label(&unescape(m.as_str())))
    })
}

/// Issues located by their `fragment` keys. Each issue's other fields are
/// searched only up to the next fragment.
fn extract_issues(text: &str) -> Vec<Issue> {
    let starts: Vec<_> = FRAGMENT.captures_iter(text).collect();

    starts
        .iter()
        .enumerate()
        .filter_map(|(i, caps)| {
            let whole = caps.get(0)?;
            let fragment = unescape(caps.get(1)?.as_str());
            let end = starts
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map(|m| m.start())
                .unwrap_or(text.len());
            let block = &text[whole.end()..end];

            let reason = capture(&REASON, block).unwrap_or_else(|| MISSING_REASON.to_string());
            let risk_level = capture(&ISSUE_RISK, block)
                .and_then(|label| RiskLevel::from_label(&label))
                .unwrap_or(RiskLevel::Medium);
            let suggestions = SUGGESTIONS
                .captures(block)
                .and_then(|caps| caps.get(1))
                .map(|list| {
                    STRING_LITERAL
                        .captures_iter(list.as_str())
                        .filter_map(|c| c.get(1).map(|m| unescape(m.as_str())))
                        .collect()
                })
                .unwrap_or_default();

            Some(Issue::new(fragment, reason, risk_level, suggestions))
        })
        .collect()
}

/// The three variants; missing ones echo `original`
fn extract_rewrites(text: &str, original: &str) -> (Rewrites, Vec<&'static str>) {
    let mut found = Vec::new();
    let mut detailed = false;
    let mut variants: Vec<RewriteText> = Vec::with_capacity(3);

    for (name, patterns) in VARIANTS.iter().zip(VARIANT_PATTERNS.iter()) {
        if let Some(text_value) = capture(&patterns.text, text) {
            detailed = true;
            let explanation = capture(&patterns.explanation, text).unwrap_or_default();
            variants.push(RewriteText::new(text_value, explanation));
            found.push(*name);
        } else if let Some(plain) = capture(&patterns.plain, text) {
            variants.push(RewriteText::new(plain, ""));
            found.push(*name);
        } else {
            variants.push(RewriteText::new(original, ""));
        }
    }

    let mut variants = variants.into_iter();
    let mut next = || variants.next().unwrap_or_else(|| RewriteText::new(original, ""));
    let set = RewriteSet {
        conservative: next(),
        balanced: next(),
        appealing: next(),
    };

    let rewrites = if detailed {
        Rewrites::Detailed(set)
    } else {
        Rewrites::Plain(RewriteSet {
            conservative: set.conservative.text,
            balanced: set.balanced.text,
            appealing: set.appealing.text,
        })
    };
    (rewrites, found)
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| unescape(m.as_str()))
}

/// Decode JSON escapes; undecodable input is returned verbatim
fn unescape(raw: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{}\"", raw)).unwrap_or_else(|_| raw.to_string())
}
