//! テキスト抽出
//!
//! 3種類の前処理で OCR を行い、英数字の最も多い結果を採用する。
//! シルエットらしい輪郭を持つセルではコード判定の最小文字数を引き上げる。

pub mod code_rules;
pub mod engine;
pub mod strategy;

use crate::config::TextConfig;
use crate::imaging::InkProfile;
use code_rules::TextStats;
use engine::TextRecognizer;
use image::GrayImage;
use serde::Serialize;
use strategy::{default_strategies, select_best, OcrCandidate, OcrMethod, OcrStrategy};
use tracing::{debug, warn};

/// セル1枚分の抽出結果
#[derive(Debug, Clone, Serialize)]
pub struct TextExtraction {
    pub text: String,
    pub method: Option<OcrMethod>,
    pub candidates: Vec<OcrCandidate>,
    pub stats: TextStats,
    /// シルエット検出で最小文字数を引き上げたか
    pub silhouette: bool,
    pub min_chars: usize,
    /// 失敗した戦略とエラー内容
    pub failures: Vec<String>,
}

impl TextExtraction {
    pub fn is_empty(&self) -> bool {
        self.stats.chars == 0
    }
}

pub struct TextExtractor<'a> {
    recognizer: &'a dyn TextRecognizer,
    strategies: Vec<Box<dyn OcrStrategy>>,
    config: &'a TextConfig,
}

impl<'a> TextExtractor<'a> {
    pub fn new(recognizer: &'a dyn TextRecognizer, config: &'a TextConfig) -> Self {
        Self {
            recognizer,
            strategies: default_strategies(config),
            config,
        }
    }

    pub fn with_strategies(
        recognizer: &'a dyn TextRecognizer,
        config: &'a TextConfig,
        strategies: Vec<Box<dyn OcrStrategy>>,
    ) -> Self {
        Self {
            recognizer,
            strategies,
            config,
        }
    }

    /// 全戦略で認識し、最良の候補を選ぶ。
    ///
    /// 認識エラーはその戦略の候補なしとして扱う。
    pub fn extract(&self, gray: &GrayImage, silhouette: bool) -> TextExtraction {
        let mut candidates = Vec::with_capacity(self.strategies.len());
        let mut failures = Vec::new();

        for strategy in &self.strategies {
            let prepared = strategy.prepare(gray);
            match self.recognizer.recognize(&prepared) {
                Ok(text) => candidates.push(OcrCandidate::new(text, strategy.method())),
                Err(e) => {
                    warn!(method = strategy.method().name(), error = %e, "OCR失敗");
                    failures.push(format!("{}: {}", strategy.method().name(), e));
                }
            }
        }

        let min_chars = if silhouette {
            self.config.min_code_chars + self.config.silhouette_extra_chars
        } else {
            self.config.min_code_chars
        };

        let (text, method) = match select_best(&candidates) {
            Some(best) => (best.text.clone(), Some(best.method)),
            None => (String::new(), None),
        };
        let stats = TextStats::from_text(&text);
        debug!(
            text = %text,
            chars = stats.chars,
            digits = stats.digits,
            letters = stats.letters,
            "OCR結果"
        );

        TextExtraction {
            text,
            method,
            candidates,
            stats,
            silhouette,
            min_chars,
            failures,
        }
    }
}

/// 面積が大きく凸包に対して密な輪郭があればシルエットとみなす
pub fn detect_silhouette(profile: &InkProfile, config: &TextConfig) -> bool {
    profile
        .contours
        .iter()
        .any(|c| c.area > config.silhouette_area && c.solidity() > config.silhouette_solidity)
}
