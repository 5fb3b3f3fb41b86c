//! 計測値・重量テキストのフィルタ
//!
//! OCR テキストが「重さ・長さなどの数量だけ」を表している場合に破棄対象と判定する。
//! 判定結果には原文・補正後・正規化後のテキストと理由を必ず残す。

pub mod normalize;
pub mod patterns;

use patterns::RULES;
use serde::Serialize;

/// フィルタの判定結果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementVerdict {
    pub is_measurement_only: bool,
    /// 一致した規則のグループ（または empty / valid_content）
    pub kind: String,
    pub matched_rule: Option<String>,
    pub matched_pattern: Option<String>,
    pub original_text: String,
    pub corrected_text: String,
    pub cleaned_text: String,
    pub reason: String,
}

impl MeasurementVerdict {
    pub fn summary(&self) -> String {
        match &self.matched_rule {
            Some(rule) => format!(
                "'{}' → '{}' matched {} ({})",
                self.original_text, self.cleaned_text, rule, self.reason
            ),
            None => format!("'{}' is not a measurement ({})", self.original_text, self.reason),
        }
    }
}

/// テキストが数量だけを表しているか判定する
pub fn check_text(text: &str) -> MeasurementVerdict {
    let original = text.trim();
    if original.is_empty() {
        return MeasurementVerdict {
            is_measurement_only: false,
            kind: "empty".into(),
            matched_rule: None,
            matched_pattern: None,
            original_text: String::new(),
            corrected_text: String::new(),
            cleaned_text: String::new(),
            reason: "empty text".into(),
        };
    }

    let corrected = normalize::correct_ocr_confusions(original);
    let cleaned = normalize::clean(&corrected);

    if let Some(rule) = RULES.iter().find(|r| r.matches(&cleaned, original)) {
        return MeasurementVerdict {
            is_measurement_only: true,
            kind: rule.group.name().into(),
            matched_rule: Some(rule.id.clone()),
            matched_pattern: Some(rule.pattern().to_string()),
            original_text: original.to_string(),
            corrected_text: corrected,
            cleaned_text: cleaned,
            reason: rule.group.reason().into(),
        };
    }

    MeasurementVerdict {
        is_measurement_only: false,
        kind: "valid_content".into(),
        matched_rule: None,
        matched_pattern: None,
        original_text: original.to_string(),
        corrected_text: corrected,
        cleaned_text: cleaned,
        reason: "no measurement pattern matched".into(),
    }
}
