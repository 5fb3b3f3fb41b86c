//! OCR前処理戦略と候補選択

use crate::config::TextConfig;
use crate::imaging;
use image::GrayImage;
use serde::Serialize;

/// 前処理の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrMethod {
    RawGrey,
    AdaptiveBinary,
    InvertedBinary,
}

impl OcrMethod {
    pub fn name(&self) -> &'static str {
        match self {
            OcrMethod::RawGrey => "raw_grey",
            OcrMethod::AdaptiveBinary => "adaptive_binary",
            OcrMethod::InvertedBinary => "inverted_binary",
        }
    }
}

/// OCR にかける前の画像変換
pub trait OcrStrategy: Send + Sync {
    fn method(&self) -> OcrMethod;
    fn prepare(&self, gray: &GrayImage) -> GrayImage;
}

pub struct RawGrey;

impl OcrStrategy for RawGrey {
    fn method(&self) -> OcrMethod {
        OcrMethod::RawGrey
    }

    fn prepare(&self, gray: &GrayImage) -> GrayImage {
        gray.clone()
    }
}

pub struct AdaptiveBinary {
    pub radius: u32,
    pub offset: i32,
}

impl OcrStrategy for AdaptiveBinary {
    fn method(&self) -> OcrMethod {
        OcrMethod::AdaptiveBinary
    }

    fn prepare(&self, gray: &GrayImage) -> GrayImage {
        imaging::adaptive_mean_threshold(gray, self.radius, self.offset)
    }
}

/// 適応二値化の白黒反転
pub struct InvertedBinary {
    pub radius: u32,
    pub offset: i32,
}

impl OcrStrategy for InvertedBinary {
    fn method(&self) -> OcrMethod {
        OcrMethod::InvertedBinary
    }

    fn prepare(&self, gray: &GrayImage) -> GrayImage {
        imaging::invert(&imaging::adaptive_mean_threshold(gray, self.radius, self.offset))
    }
}

/// 既定の3戦略（この順が同点時の優先順）
pub fn default_strategies(config: &TextConfig) -> Vec<Box<dyn OcrStrategy>> {
    vec![
        Box::new(RawGrey),
        Box::new(AdaptiveBinary {
            radius: config.adaptive_block_radius,
            offset: config.adaptive_offset,
        }),
        Box::new(InvertedBinary {
            radius: config.adaptive_block_radius,
            offset: config.adaptive_offset,
        }),
    ]
}

/// 1回分の認識結果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OcrCandidate {
    pub text: String,
    pub method: OcrMethod,
    pub alnum_count: usize,
}

impl OcrCandidate {
    pub fn new(text: impl Into<String>, method: OcrMethod) -> Self {
        let text = text.into();
        let alnum_count = text.chars().filter(|c| c.is_alphanumeric()).count();
        Self {
            text,
            method,
            alnum_count,
        }
    }
}

/// 英数字の最も多い候補を選ぶ（同数なら先の候補）
pub fn select_best(candidates: &[OcrCandidate]) -> Option<&OcrCandidate> {
    candidates.iter().fold(None, |best: Option<&OcrCandidate>, c| match best {
        Some(b) if b.alnum_count >= c.alnum_count => Some(b),
        _ => Some(c),
    })
}
