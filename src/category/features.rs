//! カテゴリ推定用の特徴量

use crate::config::CategoryConfig;
use crate::imaging::InkProfile;
use crate::visual::VisualEvidence;
use sheet_sorter_common::{FeatureSnapshot, JewelryCategory};

/// キーワードとカテゴリの対応
const KEYWORDS: &[(JewelryCategory, &[&str])] = &[
    (JewelryCategory::Anillos, &["ANILLO", "RING"]),
    (
        JewelryCategory::ColgantesYCollares,
        &["COLGANTE", "COLLAR", "PENDANT", "NECKLACE"],
    ),
    (JewelryCategory::Pulseras, &["PULSERA", "BRACELET"]),
    (JewelryCategory::Pendientes, &["PENDIENTE", "EARRING"]),
];

/// 形状特徴と付随する証拠
#[derive(Debug, Clone, Default)]
pub struct ShapeFeatures {
    pub snapshot: FeatureSnapshot,
    /// 最大成分と同程度の大きさの成分数（左右一対のピアスなど）
    pub comparable_components: usize,
    /// 残存テキストに含まれていたキーワードのカテゴリ
    pub keyword_hits: Vec<JewelryCategory>,
    pub has_silhouette: bool,
}

/// 最大輪郭と視覚統計から特徴量を作る
pub fn extract(
    profile: &InkProfile,
    visual: &VisualEvidence,
    text: &str,
    config: &CategoryConfig,
) -> ShapeFeatures {
    let keyword_hits = keyword_hits(text);
    let Some(largest) = profile.largest().filter(|c| c.area >= config.min_component_area) else {
        return ShapeFeatures {
            keyword_hits,
            ..Default::default()
        };
    };

    let floor = (largest.area * config.pair_area_ratio).max(config.min_component_area);
    let comparable_components = profile.contours.iter().filter(|c| c.area >= floor).count();

    ShapeFeatures {
        snapshot: FeatureSnapshot {
            aspect_ratio: largest.aspect_ratio(),
            circularity: largest.circularity(),
            fill_ratio: largest.fill_ratio(),
            solidity: largest.solidity(),
            edge_density: visual.edge_ratio,
        },
        comparable_components,
        keyword_hits,
        has_silhouette: true,
    }
}

pub fn keyword_hits(text: &str) -> Vec<JewelryCategory> {
    let upper = text.to_uppercase();
    let tokens: Vec<&str> = upper
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    KEYWORDS
        .iter()
        .filter(|(_, words)| words.iter().any(|w| tokens.iter().any(|t| t.starts_with(w))))
        .map(|(category, _)| *category)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_hits() {
        assert_eq!(keyword_hits("anillo oro"), vec![JewelryCategory::Anillos]);
        assert_eq!(keyword_hits("Silver Bracelet"), vec![JewelryCategory::Pulseras]);
        assert_eq!(keyword_hits("EARRINGS"), vec![JewelryCategory::Pendientes]);
        assert!(keyword_hits("c1004290512").is_empty());
    }
}
