//! 分類結果の型定義
//!
//! パイプラインとレビュー/ペアリング側で共有される型:
//! - CellCategory: セルの最終区分（code / photo / discard）
//! - ClassificationResult: セルごとの判定結果（信頼度・適用ステップ付き）
//! - CategoryLabel: 写真セルのジュエリーカテゴリ推定結果
//! - ConfidenceTier: サイドカーに書き出す信頼度レベル

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// セルの最終区分
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellCategory {
    /// 印字された商品コード
    Code,
    /// 商品写真
    Photo,
    /// 空セル・計測値のみ
    Discard,
}

impl CellCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            CellCategory::Code => "code",
            CellCategory::Photo => "photo",
            CellCategory::Discard => "discard",
        }
    }

    /// 出力先フォルダ名
    pub fn folder_name(&self) -> &'static str {
        match self {
            CellCategory::Code => "codes",
            CellCategory::Photo => "photos",
            CellCategory::Discard => "discards",
        }
    }

    /// code ⇔ photo の反転（discard はそのまま）
    pub fn opposite(&self) -> Self {
        match self {
            CellCategory::Code => CellCategory::Photo,
            CellCategory::Photo => CellCategory::Code,
            CellCategory::Discard => CellCategory::Discard,
        }
    }
}

impl fmt::Display for CellCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CellCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "code" | "codes" | "codigo" => Ok(CellCategory::Code),
            "photo" | "photos" | "foto" => Ok(CellCategory::Photo),
            "discard" | "discards" | "blank" => Ok(CellCategory::Discard),
            other => Err(Error::InvalidCategory(other.to_string())),
        }
    }
}

/// ジュエリーカテゴリ
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JewelryCategory {
    #[serde(rename = "anillos")]
    Anillos,
    #[serde(rename = "colgantes y collares")]
    ColgantesYCollares,
    #[serde(rename = "pulseras")]
    Pulseras,
    #[serde(rename = "pendientes")]
    Pendientes,
    /// 手動分類専用
    #[serde(rename = "collares")]
    Collares,
    /// 手動分類専用
    #[serde(rename = "otros")]
    Otros,
    #[default]
    #[serde(rename = "sin_categoria")]
    SinCategoria,
}

impl JewelryCategory {
    /// 自動推定の対象になるカテゴリ（同点時の優先順）
    pub const AUTOMATIC: [JewelryCategory; 4] = [
        JewelryCategory::Anillos,
        JewelryCategory::ColgantesYCollares,
        JewelryCategory::Pulseras,
        JewelryCategory::Pendientes,
    ];

    /// 手動変更で選べるカテゴリ
    pub const MANUAL_CHOICES: [JewelryCategory; 7] = [
        JewelryCategory::Anillos,
        JewelryCategory::ColgantesYCollares,
        JewelryCategory::Pulseras,
        JewelryCategory::Pendientes,
        JewelryCategory::Collares,
        JewelryCategory::Otros,
        JewelryCategory::SinCategoria,
    ];

    /// サイドカー上のキー
    pub fn key(&self) -> &'static str {
        match self {
            JewelryCategory::Anillos => "anillos",
            JewelryCategory::ColgantesYCollares => "colgantes y collares",
            JewelryCategory::Pulseras => "pulseras",
            JewelryCategory::Pendientes => "pendientes",
            JewelryCategory::Collares => "collares",
            JewelryCategory::Otros => "otros",
            JewelryCategory::SinCategoria => "sin_categoria",
        }
    }

    /// 表示名
    pub fn display_name(&self) -> &'static str {
        match self {
            JewelryCategory::Anillos => "Anillos",
            JewelryCategory::ColgantesYCollares => "Colgantes y Collares",
            JewelryCategory::Pulseras => "Pulseras",
            JewelryCategory::Pendientes => "Pendientes",
            JewelryCategory::Collares => "Collares",
            JewelryCategory::Otros => "Otros",
            JewelryCategory::SinCategoria => "Sin Categoría",
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, JewelryCategory::SinCategoria)
    }
}

impl fmt::Display for JewelryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for JewelryCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim().to_lowercase().replace('_', " ");
        Self::MANUAL_CHOICES
            .iter()
            .copied()
            .find(|c| {
                c.key().replace('_', " ") == needle
                    || c.display_name().to_lowercase().replace('_', " ") == needle
            })
            .or_else(|| match needle.as_str() {
                "unknown" | "sin categoria" => Some(JewelryCategory::SinCategoria),
                _ => None,
            })
            .ok_or_else(|| Error::InvalidCategory(s.to_string()))
    }
}

/// 信頼度レベル（alta ≥ 0.8, media ≥ 0.6, それ以外 baja）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    Alta,
    Media,
    Baja,
}

impl ConfidenceTier {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.8 {
            ConfidenceTier::Alta
        } else if confidence >= 0.6 {
            ConfidenceTier::Media
        } else {
            ConfidenceTier::Baja
        }
    }
}

/// カテゴリ推定に使った形状特徴
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureSnapshot {
    /// 外接矩形の長辺/短辺
    pub aspect_ratio: f64,
    /// 4πA/P²
    pub circularity: f64,
    /// 輪郭面積 / 外接矩形面積
    pub fill_ratio: f64,
    /// 輪郭面積 / 凸包面積
    pub solidity: f64,
    /// エッジ画素の割合
    pub edge_density: f64,
}

/// 写真セルのカテゴリ推定結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryLabel {
    pub category: JewelryCategory,
    pub confidence: f64,
    pub features: FeatureSnapshot,
    pub explanation: String,
}

impl CategoryLabel {
    /// 推定不能ラベル
    pub fn unknown(features: FeatureSnapshot, explanation: impl Into<String>) -> Self {
        Self {
            category: JewelryCategory::SinCategoria,
            confidence: 0.0,
            features,
            explanation: explanation.into(),
        }
    }
}

/// 判定の出所
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    #[default]
    Heuristic,
    ManualOverride,
    BalanceCorrection,
}

/// 判定過程の1ステップ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisStep {
    /// ステージ名（blank, text, measurement, visual ...）
    pub stage: String,
    /// 結果の要約
    pub outcome: String,
}

impl AnalysisStep {
    pub fn new(stage: impl Into<String>, outcome: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            outcome: outcome.into(),
        }
    }
}

/// セルの最終判定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub category: CellCategory,
    pub confidence: f64,
    #[serde(default)]
    pub steps: Vec<AnalysisStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_label: Option<CategoryLabel>,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub source: DecisionSource,
}

impl ClassificationResult {
    pub fn new(category: CellCategory, confidence: f64, reason: impl Into<String>) -> Self {
        Self {
            category,
            confidence: confidence.clamp(0.0, 1.0),
            steps: Vec::new(),
            sub_label: None,
            reason: reason.into(),
            source: DecisionSource::Heuristic,
        }
    }

    pub fn is_overridden(&self) -> bool {
        self.source == DecisionSource::ManualOverride
    }

    pub fn push_step(&mut self, stage: impl Into<String>, outcome: impl Into<String>) {
        self.steps.push(AnalysisStep::new(stage, outcome));
    }
}
