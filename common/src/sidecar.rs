//! カテゴリサイドカー（`<stem>_category.json`）の読み書き
//!
//! 写真パーティションの各画像の隣に置かれ、ペアリング側とレビュー側が参照する。

use crate::error::{Error, Result};
use crate::types::{CategoryLabel, ConfidenceTier, FeatureSnapshot, JewelryCategory};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const SOURCE_AUTOMATIC: &str = "automatic";
pub const SOURCE_MANUAL: &str = "manual_override";

const SIDECAR_SUFFIX: &str = "_category.json";

/// サイドカーJSONの構造
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySidecar {
    pub filename: String,
    pub category: JewelryCategory,
    pub category_display: String,
    pub confidence: f64,
    pub confidence_level: ConfidenceTier,
    #[serde(default)]
    pub features: FeatureSnapshot,
    #[serde(default)]
    pub explanation: String,
    #[serde(default = "default_source")]
    pub source: String,
    pub timestamp: String,
}

fn default_source() -> String {
    SOURCE_AUTOMATIC.to_string()
}

impl CategorySidecar {
    /// 推定ラベルからサイドカーを組み立てる
    pub fn from_label(filename: &str, label: &CategoryLabel) -> Self {
        Self {
            filename: filename.to_string(),
            category: label.category,
            category_display: label.category.display_name().to_string(),
            confidence: label.confidence,
            confidence_level: ConfidenceTier::from_confidence(label.confidence),
            features: label.features,
            explanation: label.explanation.clone(),
            source: SOURCE_AUTOMATIC.to_string(),
            timestamp: now_timestamp(),
        }
    }

    pub fn is_manual(&self) -> bool {
        self.source == SOURCE_MANUAL
    }
}

fn now_timestamp() -> String {
    chrono::Local::now().to_rfc3339()
}

/// 画像パスに対応するサイドカーのパス
pub fn sidecar_path(image_path: &Path) -> Result<PathBuf> {
    let stem = image_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .ok_or_else(|| Error::Sidecar(format!("ファイル名がありません: {}", image_path.display())))?;
    let parent = image_path.parent().unwrap_or_else(|| Path::new("."));
    Ok(parent.join(format!("{}{}", stem, SIDECAR_SUFFIX)))
}

fn file_name_of(image_path: &Path) -> String {
    image_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// 推定ラベルをサイドカーとして書き出す
pub fn write_sidecar(image_path: &Path, label: &CategoryLabel) -> Result<PathBuf> {
    let sidecar = CategorySidecar::from_label(&file_name_of(image_path), label);
    save(image_path, &sidecar)
}

fn save(image_path: &Path, sidecar: &CategorySidecar) -> Result<PathBuf> {
    let path = sidecar_path(image_path)?;
    let json = serde_json::to_string_pretty(sidecar)?;
    std::fs::write(&path, json)?;
    Ok(path)
}

/// サイドカーを読み込む（存在しなければ None）
pub fn read_sidecar(image_path: &Path) -> Result<Option<CategorySidecar>> {
    let path = sidecar_path(image_path)?;
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)?;
    let sidecar: CategorySidecar = serde_json::from_str(&content)?;
    Ok(Some(sidecar))
}

/// 手動でカテゴリを上書きする（信頼度 1.0、source = manual_override）
///
/// 既存サイドカーの特徴量は引き継ぐ。サイドカーが無い画像にも書ける。
pub fn apply_manual_category(image_path: &Path, category: JewelryCategory) -> Result<CategorySidecar> {
    let previous = read_sidecar(image_path)?;
    let sidecar = CategorySidecar {
        filename: file_name_of(image_path),
        category,
        category_display: category.display_name().to_string(),
        confidence: 1.0,
        confidence_level: ConfidenceTier::Alta,
        features: previous.as_ref().map(|p| p.features).unwrap_or_default(),
        explanation: "手動で変更".to_string(),
        source: SOURCE_MANUAL.to_string(),
        timestamp: now_timestamp(),
    };
    save(image_path, &sidecar)?;
    Ok(sidecar)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_label() -> CategoryLabel {
        CategoryLabel {
            category: JewelryCategory::Anillos,
            confidence: 0.734_215,
            features: FeatureSnapshot {
                aspect_ratio: 1.083_333,
                circularity: 0.812_5,
                fill_ratio: 0.771_1,
                solidity: 0.934_2,
                edge_density: 0.061_7,
            },
            explanation: "円形度が高い".to_string(),
        }
    }

    #[test]
    fn test_sidecar_path() {
        let path = sidecar_path(Path::new("/tmp/photos/rect_12.png")).unwrap();
        assert_eq!(path, Path::new("/tmp/photos/rect_12_category.json"));
    }

    #[test]
    fn test_write_and_read_round_trip() {
        let dir = tempdir().unwrap();
        let image = dir.path().join("rect_4.png");
        let label = sample_label();

        write_sidecar(&image, &label).unwrap();
        let loaded = read_sidecar(&image).unwrap().expect("サイドカーが無い");

        assert_eq!(loaded.filename, "rect_4.png");
        assert_eq!(loaded.category, JewelryCategory::Anillos);
        assert_eq!(loaded.category_display, "Anillos");
        assert_eq!(loaded.confidence_level, ConfidenceTier::Media);
        assert!((loaded.confidence - label.confidence).abs() < 1e-6);
        let (got, want) = (loaded.features, label.features);
        for (name, a, b) in [
            ("aspect_ratio", got.aspect_ratio, want.aspect_ratio),
            ("circularity", got.circularity, want.circularity),
            ("fill_ratio", got.fill_ratio, want.fill_ratio),
            ("solidity", got.solidity, want.solidity),
            ("edge_density", got.edge_density, want.edge_density),
        ] {
            assert!((a - b).abs() < 1e-6, "{}: {} != {}", name, a, b);
        }
        assert!(!loaded.is_manual());
    }

    #[test]
    fn test_read_missing_sidecar() {
        let dir = tempdir().unwrap();
        assert!(read_sidecar(&dir.path().join("rect_1.png")).unwrap().is_none());
    }

    #[test]
    fn test_manual_override_keeps_features() {
        let dir = tempdir().unwrap();
        let image = dir.path().join("rect_9.png");
        write_sidecar(&image, &sample_label()).unwrap();

        let updated = apply_manual_category(&image, JewelryCategory::Pulseras).unwrap();
        assert_eq!(updated.confidence, 1.0);
        assert!(updated.is_manual());

        let loaded = read_sidecar(&image).unwrap().unwrap();
        assert_eq!(loaded.category, JewelryCategory::Pulseras);
        assert_eq!(loaded.confidence_level, ConfidenceTier::Alta);
        assert!((loaded.features.solidity - 0.934_2).abs() < 1e-6);
    }
}
