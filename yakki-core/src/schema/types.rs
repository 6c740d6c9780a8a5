//! Request vocabulary: risk levels, product categories and text types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Risk level attached to an issue and to the overall verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[serde(alias = "低", alias = "Low", alias = "LOW")]
    Low,
    #[serde(alias = "中", alias = "Medium", alias = "MEDIUM")]
    Medium,
    #[serde(alias = "高", alias = "High", alias = "HIGH")]
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::High => "high",
            RiskLevel::Medium => "medium",
            RiskLevel::Low => "low",
        }
    }

    /// Parse an upstream risk token. Accepts English (any case) and the
    /// single-kanji form the model tends to answer with.
    pub fn from_label(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        match trimmed {
            "高" => return Some(RiskLevel::High),
            "中" => return Some(RiskLevel::Medium),
            "低" => return Some(RiskLevel::Low),
            _ => {}
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "high" => Some(RiskLevel::High),
            "medium" | "mid" => Some(RiskLevel::Medium),
            "low" => Some(RiskLevel::Low),
            _ => None,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Product category of the advertised item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "化粧品", alias = "cosmetics")]
    Cosmetics,
    #[serde(rename = "薬用化粧品", alias = "medicated_cosmetics")]
    MedicatedCosmetics,
    #[serde(rename = "医薬部外品", alias = "quasi_drug")]
    QuasiDrug,
    #[serde(rename = "サプリメント・健康食品", alias = "supplement")]
    Supplement,
    #[serde(rename = "美容機器・健康器具・その他", alias = "device")]
    Device,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Cosmetics,
        Category::MedicatedCosmetics,
        Category::QuasiDrug,
        Category::Supplement,
        Category::Device,
    ];

    /// Label used in prompts and in request payloads
    pub fn label(&self) -> &'static str {
        match self {
            Category::Cosmetics => "化粧品",
            Category::MedicatedCosmetics => "薬用化粧品",
            Category::QuasiDrug => "医薬部外品",
            Category::Supplement => "サプリメント・健康食品",
            Category::Device => "美容機器・健康器具・その他",
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Category::Cosmetics => "cosmetics",
            Category::MedicatedCosmetics => "medicated_cosmetics",
            Category::QuasiDrug => "quasi_drug",
            Category::Supplement => "supplement",
            Category::Device => "device",
        }
    }

    /// Category-specific reviewing guidance embedded in the prompt
    pub fn guidance(&self) -> &'static str {
        match self {
            Category::Cosmetics => "一般化粧品として、効果効能の表現に特に注意が必要です。",
            Category::MedicatedCosmetics => "医薬部外品として承認された効果効能のみ表現可能です。",
            Category::QuasiDrug => "承認された効果効能の範囲内での表現が必要です。",
            Category::Supplement => "健康食品として、医薬品的な効果表現は禁止されています。",
            Category::Device => "機器の分類に応じた適切な表現が必要です。",
        }
    }

    pub fn from_label(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.label() == trimmed || c.id().eq_ignore_ascii_case(trimmed))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::from_label(s).ok_or_else(|| format!("unknown category: {}", s))
    }
}

/// Kind of advertising text being checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextType {
    #[serde(rename = "キャッチコピー", alias = "catchphrase")]
    Catchphrase,
    #[serde(rename = "LP見出し・タイトル", alias = "headline")]
    Headline,
    #[serde(rename = "商品説明文・広告文・通常テキスト", alias = "description")]
    Description,
    #[serde(rename = "お客様の声", alias = "testimonial")]
    Testimonial,
}

impl TextType {
    pub const ALL: [TextType; 4] = [
        TextType::Catchphrase,
        TextType::Headline,
        TextType::Description,
        TextType::Testimonial,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TextType::Catchphrase => "キャッチコピー",
            TextType::Headline => "LP見出し・タイトル",
            TextType::Description => "商品説明文・広告文・通常テキスト",
            TextType::Testimonial => "お客様の声",
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            TextType::Catchphrase => "catchphrase",
            TextType::Headline => "headline",
            TextType::Description => "description",
            TextType::Testimonial => "testimonial",
        }
    }

    /// File name of the rule document for this text type, relative to the rule directory
    pub fn rule_file(&self) -> &'static str {
        match self {
            TextType::Catchphrase => "キャッチコピー.md",
            TextType::Headline => "LP見出し・タイトル.md",
            TextType::Description => "商品説明文.md",
            TextType::Testimonial => "お客様の声.md",
        }
    }

    pub fn guidance(&self) -> &'static str {
        match self {
            TextType::Catchphrase => "短く印象的でありながら、誇大表現を避ける必要があります。",
            TextType::Headline => "注目を集めつつ、薬機法に準拠した表現が重要です。",
            TextType::Description => {
                "詳細な説明において、客観的で根拠のある表現を心がけてください。"
            }
            TextType::Testimonial => "個人の感想として、効果を断定しない表現が必要です。",
        }
    }

    pub fn from_label(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.label() == trimmed || t.id().eq_ignore_ascii_case(trimmed))
    }
}

impl fmt::Display for TextType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TextType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TextType::from_label(s).ok_or_else(|| format!("unknown text type: {}", s))
    }
}

/// One compliance-check request as accepted by the core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRequest {
    pub text: String,
    pub text_type: TextType,
    pub category: Category,
    #[serde(default)]
    pub special_points: String,
    #[serde(default)]
    pub approved: bool,
}

impl CheckRequest {
    pub fn new(text: impl Into<String>, text_type: TextType, category: Category) -> Self {
        Self {
            text: text.into(),
            text_type,
            category,
            special_points: String::new(),
            approved: false,
        }
    }

    pub fn with_special_points(mut self, points: impl Into<String>) -> Self {
        self.special_points = points.into();
        self
    }

    pub fn with_approval(mut self, approved: bool) -> Self {
        self.approved = approved;
        self
    }
}
