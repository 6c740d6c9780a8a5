//! Prompt assembly for the text-generation collaborator

use crate::schema::CheckRequest;

const SYSTEM_PROMPT: &str = r#"あなたは薬機法（医薬品医療機器等法）に精通した広告審査の専門家です。
与えられた広告文を薬機法・景品表示法の観点から分析し、問題のある表現を特定して改善案を提案してください。

判定の観点:
1. 医薬品的な効能効果の標榜
2. 安全性の保証
3. 最大級表現・断定表現
4. 即効性・永続性の示唆
5. 根拠のない体験談・数値

出力は次の構造の JSON オブジェクトのみとし、前後に説明文を付けないでください。

{
  "overall_risk": "高|中|低",
  "risk_counts": {"total": 0, "high": 0, "medium": 0, "low": 0},
  "issues": [
    {
      "fragment": "問題のある表現",
      "reason": "抵触する理由",
      "risk_level": "高|中|低",
      "suggestions": ["代替案1", "代替案2", "代替案3"]
    }
  ],
  "rewritten_texts": {
    "conservative": {"text": "保守的なリライト", "explanation": "安全である理由"},
    "balanced": {"text": "バランス型のリライト", "explanation": "安全性と訴求力の両立"},
    "appealing": {"text": "訴求力重視のリライト", "explanation": "リスクを抑えた工夫"}
  }
}"#;

/// Instructions fixing the answer format
pub fn system_prompt() -> &'static str {
    SYSTEM_PROMPT
}

/// Request-specific prompt carrying the reference material
pub fn user_prompt(request: &CheckRequest, reference: &str, rules: &str) -> String {
    let special_points = request.special_points.trim();
    format!(
        "以下の広告文を薬機法の観点から分析してください。\n\n\
         **チェック対象テキスト:**\n{text}\n\n\
         **商品カテゴリ:** {category}\n\
         **文章の種類:** {text_type}\n\
         **特に訴求したいポイント:** {points}\n\
         **医薬品・医療機器承認:** {approval}\n\n\
         **カテゴリ別ガイダンス:**\n{category_guidance}\n\n\
         **文章種類別ガイダンス:**\n{text_type_guidance}\n\n\
         **参考データ:**\n{reference}\n\n\
         **文章種類別ルール:**\n{rules}\n\n\
         JSON 形式で回答してください。",
        text = request.text.trim(),
        category = request.category.label(),
        text_type = request.text_type.label(),
        points = if special_points.is_empty() { "なし" } else { special_points },
        approval = if request.approved { "あり" } else { "なし" },
        category_guidance = request.category.guidance(),
        text_type_guidance = request.text_type.guidance(),
        reference = or_none(reference),
        rules = or_none(rules),
    )
}

fn or_none(section: &str) -> &str {
    if section.trim().is_empty() {
        "（なし）"
    } else {
        section
    }
}
