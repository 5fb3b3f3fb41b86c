//! 設定ファイル
//!
//! しきい値はすべて経験的に調整された値で、ここに名前付きで集約している。
//! 新しい台紙の種類に合わせる場合は config.json で上書きする。

use crate::error::{Result, SheetSorterError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 解析時にセル外周から内側へ削る幅（枠線の除去, px）
    pub analysis_inset: u32,
    pub tesseract: TesseractConfig,
    pub detector: DetectorConfig,
    pub blank: BlankConfig,
    pub text: TextConfig,
    pub visual: VisualConfig,
    pub category: CategoryConfig,
    pub scoring: ScoringConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            analysis_inset: 4,
            tesseract: TesseractConfig::default(),
            detector: DetectorConfig::default(),
            blank: BlankConfig::default(),
            text: TextConfig::default(),
            visual: VisualConfig::default(),
            category: CategoryConfig::default(),
            scoring: ScoringConfig::default(),
        }
    }
}

/// Tesseract CLI の呼び出し設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseractConfig {
    pub executable: String,
    pub language: String,
    pub psm: u8,
    pub whitelist: String,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            executable: "tesseract".into(),
            language: "eng".into(),
            psm: 6,
            whitelist: "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz".into(),
        }
    }
}

/// 矩形検出
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub binary_threshold: u8,
    pub equalize: bool,
    pub min_vertices: usize,
    pub max_vertices: usize,
    pub min_area_px: f64,
    /// 台紙面積に対する下限
    pub min_area_ratio: f64,
    /// 台紙面積に対する上限（これを超えると台紙の外枠とみなす）
    pub max_area_ratio: f64,
    /// 輪郭面積 / 外接矩形面積
    pub min_rectangularity: f64,
    /// 台紙の端からこの距離以内を「端に接する」とみなす
    pub border_margin: u32,
    pub crop_margin: u32,
    /// 小さい方の矩形に対する重なり率がこれを超えたら大きい方だけ残す
    pub overlap_merge_ratio: f64,
    /// approxPolyDP の epsilon（周長に対する比）
    pub epsilon_ratio: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            binary_threshold: 200,
            equalize: true,
            min_vertices: 4,
            max_vertices: 5,
            min_area_px: 1000.0,
            min_area_ratio: 0.0005,
            max_area_ratio: 0.95,
            min_rectangularity: 0.75,
            border_margin: 2,
            crop_margin: 2,
            overlap_merge_ratio: 0.6,
            epsilon_ratio: 0.02,
        }
    }
}

/// 空セル判定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlankConfig {
    /// これより暗い画素を「非白」とみなす
    pub white_threshold: u8,
    /// 絶対下限（これ未満は無条件で空）
    pub min_content_ratio: f64,
    pub low_contrast_range: u8,
    pub low_contrast_ratio: f64,
    pub sparse_ratio: f64,
    pub significant_contour_area: f64,
    pub silhouette_contour_area: f64,
    pub silhouette_min_vertices: usize,
    pub silhouette_max_vertices: usize,
    pub silhouette_min_ratio: f64,
}

impl Default for BlankConfig {
    fn default() -> Self {
        Self {
            white_threshold: 230,
            min_content_ratio: 0.001,
            low_contrast_range: 30,
            low_contrast_ratio: 0.01,
            sparse_ratio: 0.005,
            significant_contour_area: 50.0,
            silhouette_contour_area: 500.0,
            silhouette_min_vertices: 5,
            silhouette_max_vertices: 19,
            silhouette_min_ratio: 0.003,
        }
    }
}

/// テキスト抽出・コード判定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TextConfig {
    pub adaptive_block_radius: u32,
    pub adaptive_offset: i32,
    pub min_code_chars: usize,
    /// シルエットと判定されたときに上乗せする文字数
    pub silhouette_extra_chars: usize,
    pub silhouette_area: f64,
    pub silhouette_solidity: f64,
    pub numeric_min_digits: usize,
    pub numeric_min_digit_share: f64,
    pub mixed_min_digits: usize,
    pub mixed_min_digit_share: f64,
    pub noise_prefixes: Vec<String>,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            adaptive_block_radius: 5,
            adaptive_offset: 2,
            min_code_chars: 7,
            silhouette_extra_chars: 3,
            silhouette_area: 1000.0,
            silhouette_solidity: 0.7,
            numeric_min_digits: 8,
            numeric_min_digit_share: 0.8,
            mixed_min_digits: 4,
            mixed_min_digit_share: 0.5,
            noise_prefixes: ["ioCA", "aya", "fff", "iPy", "aer", "oOo", "IIl", "lil", "Ill"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// 見た目による写真判定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualConfig {
    pub ink_threshold: u8,
    pub dense_ratio: f64,
    pub dense_contours: usize,
    pub large_contour_area: f64,
    pub large_contour_ratio: f64,
    pub canny_low: f32,
    pub canny_high: f32,
    pub edge_ratio: f64,
    pub min_edge_pixels: usize,
    /// コード判定後の複雑さチェック
    pub complexity_ratio: f64,
    pub complexity_contours: usize,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            ink_threshold: 220,
            dense_ratio: 0.10,
            dense_contours: 8,
            large_contour_area: 200.0,
            large_contour_ratio: 0.05,
            canny_low: 50.0,
            canny_high: 150.0,
            edge_ratio: 0.03,
            min_edge_pixels: 200,
            complexity_ratio: 0.20,
            complexity_contours: 12,
        }
    }
}

/// カテゴリ推定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryConfig {
    pub min_score: f64,
    pub keyword_bonus: f64,
    /// 「同程度の大きさ」とみなす成分の面積比
    pub pair_area_ratio: f64,
    pub min_component_area: f64,
}

impl Default for CategoryConfig {
    fn default() -> Self {
        Self {
            min_score: 0.35,
            keyword_bonus: 0.3,
            pair_area_ratio: 0.6,
            min_component_area: 150.0,
        }
    }
}

/// 信頼度スコア
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub base: f64,
    pub blank: f64,
    pub measurement: f64,
    pub code_busy_penalty: f64,
    pub code_busy_ratio: f64,
    pub code_busy_contours: usize,
    pub code_shape_penalty: f64,
    pub code_shape_vertices: usize,
    pub photo_busy_bonus: f64,
    pub photo_busy_ratio: f64,
    pub photo_busy_contours: usize,
    pub min: f64,
    pub max: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base: 0.8,
            blank: 0.9,
            measurement: 0.98,
            code_busy_penalty: 0.2,
            code_busy_ratio: 0.15,
            code_busy_contours: 10,
            code_shape_penalty: 0.3,
            code_shape_vertices: 6,
            photo_busy_bonus: 0.1,
            photo_busy_ratio: 0.10,
            photo_busy_contours: 8,
            min: 0.1,
            max: 1.0,
        }
    }
}

impl Config {
    /// 既定の場所（~/.config/sheet-sorter/config.json）から読み込む
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// 指定パスから読み込む（無ければ既定値）
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<PathBuf> {
        let config_path = Self::config_path()?;
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// OS ごとの設定ディレクトリ（Linux なら ~/.config）配下
    pub fn config_path() -> Result<PathBuf> {
        let base = dirs::config_dir()
            .ok_or_else(|| SheetSorterError::Config("設定ディレクトリが見つかりません".into()))?;
        Ok(base.join("sheet-sorter").join("config.json"))
    }

    fn validate(&self) -> Result<()> {
        let d = &self.detector;
        if d.min_vertices < 3 || d.min_vertices > d.max_vertices {
            return Err(SheetSorterError::Config(format!(
                "頂点数の範囲が不正です: {}..={}",
                d.min_vertices, d.max_vertices
            )));
        }
        if !(0.0..=1.0).contains(&d.max_area_ratio) || d.min_area_ratio > d.max_area_ratio {
            return Err(SheetSorterError::Config(format!(
                "面積比の範囲が不正です: {}..{}",
                d.min_area_ratio, d.max_area_ratio
            )));
        }
        if self.scoring.min > self.scoring.max {
            return Err(SheetSorterError::Config("信頼度の下限が上限を超えています".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.detector.binary_threshold, 200);
        assert_eq!(config.text.min_code_chars, 7);
        assert_eq!(config.text.noise_prefixes.len(), 9);
        assert!((config.scoring.measurement - 0.98).abs() < 1e-9);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"detector": {"binary_threshold": 180}, "analysis_inset": 2}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.detector.binary_threshold, 180);
        assert_eq!(config.detector.min_vertices, 4);
        assert_eq!(config.analysis_inset, 2);
        assert_eq!(config.blank.white_threshold, 230);
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("none.json")).unwrap();
        assert_eq!(config.tesseract.executable, "tesseract");
    }

    #[test]
    fn test_invalid_vertex_range_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"detector": {"min_vertices": 6, "max_vertices": 4}}"#).unwrap();
        assert!(matches!(Config::load_from(&path), Err(SheetSorterError::Config(_))));
    }

    #[test]
    fn test_config_path_under_platform_config_dir() {
        if let (Ok(path), Some(base)) = (Config::config_path(), dirs::config_dir()) {
            assert!(path.starts_with(&base));
            assert!(path.ends_with("sheet-sorter/config.json"));
        }
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = Config::default();
        config.category.min_score = 0.5;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert!((loaded.category.min_score - 0.5).abs() < 1e-9);
    }
}
