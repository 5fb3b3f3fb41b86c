//! 計測値・重量パターン表
//!
//! 表の並び順がそのまま優先順位になる。最初に一致した規則で判定が確定する。

use regex::Regex;
use serde::Serialize;

/// 規則のグループ（判定結果の kind になる）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternGroup {
    Problematic,
    SpecialCase,
    WeightDecimal,
    WeightInteger,
    MeasurementDecimal,
    MeasurementInteger,
    SizeNumber,
    SpecificUnits,
    OcrErrorWeight,
    SuspiciousDecimal,
}

impl PatternGroup {
    pub fn name(&self) -> &'static str {
        match self {
            PatternGroup::Problematic => "problematic_measurement",
            PatternGroup::SpecialCase => "special_case",
            PatternGroup::WeightDecimal => "weight_decimal",
            PatternGroup::WeightInteger => "weight_integer",
            PatternGroup::MeasurementDecimal => "measurement_decimal",
            PatternGroup::MeasurementInteger => "measurement_integer",
            PatternGroup::SizeNumber => "size_number",
            PatternGroup::SpecificUnits => "specific_units",
            PatternGroup::OcrErrorWeight => "ocr_error_weight",
            PatternGroup::SuspiciousDecimal => "suspicious_decimal",
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            PatternGroup::Problematic => "decimal value followed by a unit (e.g. 6.1G)",
            PatternGroup::SpecialCase => "atypical measurement shape or OCR error (e.g. 6. LLG)",
            PatternGroup::WeightDecimal => "decimal weight",
            PatternGroup::WeightInteger => "integer weight",
            PatternGroup::MeasurementDecimal => "decimal length",
            PatternGroup::MeasurementInteger => "integer length",
            PatternGroup::SizeNumber => "bare size number",
            PatternGroup::SpecificUnits => "bare unit token",
            PatternGroup::OcrErrorWeight => "weight with 'll' read instead of '11'",
            PatternGroup::SuspiciousDecimal => "short decimal number without unit",
        }
    }
}

/// どのテキストに当てるか
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTarget {
    /// 正規化後のテキスト
    Cleaned,
    /// 正規化後、または大文字化しただけの原文
    CleanedOrUpperOriginal,
    /// 小文字化した原文の部分一致
    LowerOriginalSearch,
}

#[derive(Debug)]
pub struct PatternRule {
    pub id: String,
    pub group: PatternGroup,
    pub regex: Regex,
    pub target: MatchTarget,
}

impl PatternRule {
    fn new(id: impl Into<String>, group: PatternGroup, pattern: &str, target: MatchTarget) -> Self {
        Self {
            id: id.into(),
            group,
            regex: Regex::new(pattern).unwrap(),
            target,
        }
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    /// 規則が一致するか
    pub fn matches(&self, cleaned: &str, original: &str) -> bool {
        match self.target {
            MatchTarget::Cleaned => self.regex.is_match(cleaned),
            MatchTarget::CleanedOrUpperOriginal => {
                self.regex.is_match(cleaned) || self.regex.is_match(&original.to_uppercase())
            }
            MatchTarget::LowerOriginalSearch => self.regex.is_match(&original.to_lowercase()),
        }
    }
}

const WEIGHT_UNITS: &[&str] = &[
    "G", "GR", "GRAMOS", "GRAM", "GMS", "KG", "OZ", "LLG", "LG", "LB", "LIBRAS", "POUNDS",
];
const LENGTH_UNITS: &[&str] = &[
    "CM", "MM", "M", "PULGADAS", "IN", "INCH", "FT", "FEET", "YD", "YARD",
];
const BARE_UNITS: &[&str] = &["LLG", "G", "KG", "L", "ML", "CM", "MM"];

lazy_static::lazy_static! {
    /// 全規則（優先順）
    pub static ref RULES: Vec<PatternRule> = build_rules();
}

fn build_rules() -> Vec<PatternRule> {
    use MatchTarget::*;
    use PatternGroup::*;

    let mut rules = vec![
        // (a) 小数 + 単位
        PatternRule::new("problematic_weight", Problematic, r"^\d+\.\d+(?:G|GR|GRAM|GRAMOS|GMS)$", Cleaned),
        PatternRule::new("problematic_carat", Problematic, r"^\d+\.\d+(?:K|KG|KT|QUILATES)$", Cleaned),
        PatternRule::new("problematic_length", Problematic, r"^\d+\.\d+(?:C|CM|M|MM|IN|INCH)$", Cleaned),
        PatternRule::new("problematic_volume", Problematic, r"^\d+\.\d+(?:L|ML|CL|CC|GAL)$", Cleaned),
        PatternRule::new("problematic_currency", Problematic, r"^\d+\.\d+(?:%|€|\$|USD|EUR)$", Cleaned),
        PatternRule::new("problematic_short_unit", Problematic, r"^\d+\.\d{1,2}(?:G|KG|CM|MM)$", Cleaned),
        // (b) 既知の誤認識形
        PatternRule::new("dot_llg", SpecialCase, r"^\d+\.\s*LLG$", CleanedOrUpperOriginal),
        PatternRule::new("space_llg", SpecialCase, r"^\d+\s+LLG$", CleanedOrUpperOriginal),
        PatternRule::new("dot_g", SpecialCase, r"^\d+\.\s*G$", CleanedOrUpperOriginal),
        PatternRule::new("space_g", SpecialCase, r"^\d+\s+G$", CleanedOrUpperOriginal),
        PatternRule::new("dot_kg", SpecialCase, r"^\d+\.\s*KG$", CleanedOrUpperOriginal),
        PatternRule::new("space_kg", SpecialCase, r"^\d+\s+KG$", CleanedOrUpperOriginal),
        PatternRule::new("one_decimal", SpecialCase, r"^\d+\.\d$", CleanedOrUpperOriginal),
        PatternRule::new("one_decimal_unit", SpecialCase, r"^\d+\.\d[A-Z]*$", CleanedOrUpperOriginal),
        PatternRule::new("spaced_decimal", SpecialCase, r"^\d+\.\s*\d+$", CleanedOrUpperOriginal),
        PatternRule::new("dot_ll", SpecialCase, r"^\d+\.\s*(?i:ll)$", CleanedOrUpperOriginal),
        PatternRule::new("dot_ii", SpecialCase, r"^\d+\.\s*II$", CleanedOrUpperOriginal),
        PatternRule::new("single_digit_decimal", SpecialCase, r"^\d\.\d+[A-Z]*$", CleanedOrUpperOriginal),
        PatternRule::new("short_decimal_unit", SpecialCase, r"^\d{1,2}\.\d{1,2}[A-Z]*$", CleanedOrUpperOriginal),
    ];

    // (c) 単位別の表
    for unit in WEIGHT_UNITS {
        rules.push(PatternRule::new(
            format!("weight_decimal:{}", unit),
            WeightDecimal,
            &format!(r"^\d+\.\d+{}$", unit),
            Cleaned,
        ));
    }
    for unit in WEIGHT_UNITS {
        rules.push(PatternRule::new(
            format!("weight_integer:{}", unit),
            WeightInteger,
            &format!(r"^\d+{}$", unit),
            Cleaned,
        ));
    }
    for unit in LENGTH_UNITS {
        rules.push(PatternRule::new(
            format!("measurement_decimal:{}", unit),
            MeasurementDecimal,
            &format!(r"^\d+\.\d+{}$", unit),
            Cleaned,
        ));
    }
    for unit in LENGTH_UNITS {
        rules.push(PatternRule::new(
            format!("measurement_integer:{}", unit),
            MeasurementInteger,
            &format!(r"^\d+{}$", unit),
            Cleaned,
        ));
    }
    rules.push(PatternRule::new("size_number:integer", SizeNumber, r"^\d{1,2}$", Cleaned));
    rules.push(PatternRule::new("size_number:decimal", SizeNumber, r"^\d+\.\d+$", Cleaned));
    for unit in BARE_UNITS {
        rules.push(PatternRule::new(
            format!("specific_units:{}", unit),
            SpecificUnits,
            &format!("^{}$", unit),
            Cleaned,
        ));
    }
    rules.push(PatternRule::new("ocr_error_weight", OcrErrorWeight, r"\d+\s*\.\s*ll", LowerOriginalSearch));

    // (d) 単位なしの短い小数
    rules.push(PatternRule::new("suspicious_decimal", SuspiciousDecimal, r"^\d+\.\d{1,2}$", Cleaned));

    rules
}
