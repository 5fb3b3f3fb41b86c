//! 商品コード判定規則
//!
//! 受理規則は上から順に最初の一致のみ、拒否規則はすべて評価する。

use crate::config::TextConfig;
use serde::Serialize;
use std::collections::HashMap;

/// シルエット上の誤認識で出やすい文字列
const SILHOUETTE_GLYPHS: &[&str] = &["00", "OO", "Ill", "000", "lll", "III"];

/// 英数字の集計
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TextStats {
    /// 英数字のみを抜き出した文字列
    pub alnum: String,
    pub chars: usize,
    pub digits: usize,
    pub letters: usize,
}

impl TextStats {
    pub fn from_text(text: &str) -> Self {
        let alnum: String = text.chars().filter(|c| c.is_alphanumeric()).collect();
        let digits = alnum.chars().filter(|c| c.is_numeric()).count();
        let letters = alnum.chars().filter(|c| c.is_alphabetic()).count();
        Self {
            chars: alnum.chars().count(),
            alnum,
            digits,
            letters,
        }
    }

    pub fn digit_share(&self) -> f64 {
        if self.chars == 0 {
            0.0
        } else {
            self.digits as f64 / self.chars as f64
        }
    }

    pub fn letter_share(&self) -> f64 {
        if self.chars == 0 {
            0.0
        } else {
            self.letters as f64 / self.chars as f64
        }
    }

    /// 2回以上現れる文字の種類数
    fn repeated_kinds(&self) -> usize {
        let mut counts: HashMap<char, usize> = HashMap::new();
        for c in self.alnum.chars() {
            *counts.entry(c).or_insert(0) += 1;
        }
        counts.values().filter(|&&n| n > 1).count()
    }
}

struct RuleInput<'a> {
    stats: &'a TextStats,
    min_chars: usize,
    config: &'a TextConfig,
}

type Predicate = fn(&RuleInput) -> bool;

const ACCEPT_RULES: &[(&str, Predicate)] = &[
    ("numeric_sequence", |i| {
        i.stats.digits >= i.config.numeric_min_digits
            && i.stats.digit_share() >= i.config.numeric_min_digit_share
    }),
    ("mixed_code", |i| {
        i.stats.digits >= i.config.mixed_min_digits
            && i.stats.letters >= 1
            && i.stats.chars >= i.min_chars
            && i.stats.digit_share() >= i.config.mixed_min_digit_share
    }),
];

const VETO_RULES: &[(&str, Predicate)] = &[
    ("letter_flood", |i| i.stats.letters > 12 && i.stats.letter_share() > 0.8),
    ("repetitive_letters", |i| {
        i.stats.letters >= 5 && i.stats.digits == 0 && i.stats.repeated_kinds() > 2
    }),
    ("noise_prefix", |i| {
        i.config
            .noise_prefixes
            .iter()
            .any(|p| i.stats.alnum.starts_with(p.as_str()))
    }),
    ("silhouette_glyphs", |i| {
        SILHOUETTE_GLYPHS.iter().any(|g| i.stats.alnum.contains(g))
            && i.stats.chars < i.min_chars + 2
    }),
];

/// コード判定の結果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeVerdict {
    pub is_code: bool,
    /// 数字列として受理された（信頼度の高い）コードか
    pub strong: bool,
    pub accepted_by: Option<&'static str>,
    pub vetoed_by: Vec<&'static str>,
    pub min_chars: usize,
    pub stats: TextStats,
}

impl CodeVerdict {
    pub fn summary(&self) -> String {
        let mut s = format!(
            "'{}' chars {} digits {} letters {} (min {})",
            self.stats.alnum, self.stats.chars, self.stats.digits, self.stats.letters, self.min_chars
        );
        if let Some(rule) = self.accepted_by {
            s.push_str(&format!(", accepted by {}", rule));
        }
        if !self.vetoed_by.is_empty() {
            s.push_str(&format!(", vetoed by {}", self.vetoed_by.join("+")));
        }
        s
    }
}

/// 抽出テキストが商品コードとして成立するか判定する
pub fn evaluate(text: &str, min_chars: usize, config: &TextConfig) -> CodeVerdict {
    let stats = TextStats::from_text(text);
    let input = RuleInput {
        stats: &stats,
        min_chars,
        config,
    };

    let accepted_by = ACCEPT_RULES
        .iter()
        .find(|(_, rule)| rule(&input))
        .map(|(name, _)| *name);
    let vetoed_by: Vec<&'static str> = VETO_RULES
        .iter()
        .filter(|(_, rule)| rule(&input))
        .map(|(name, _)| *name)
        .collect();

    let is_code = accepted_by.is_some() && vetoed_by.is_empty();
    CodeVerdict {
        is_code,
        strong: is_code && accepted_by == Some("numeric_sequence"),
        accepted_by,
        vetoed_by,
        min_chars,
        stats,
    }
}
