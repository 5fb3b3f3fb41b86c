//! ジュエリーカテゴリ推定
//!
//! 写真セルの形状特徴を各カテゴリの採点関数にかけ、最高得点のカテゴリを採用する。
//! 同点はカテゴリ定義順、最高得点が `min_score` 未満なら sin_categoria。

pub mod features;

use crate::config::CategoryConfig;
use features::ShapeFeatures;
use sheet_sorter_common::{CategoryLabel, JewelryCategory};

/// 採点結果（得点と根拠）
#[derive(Debug, Clone)]
struct Score {
    value: f64,
    factors: Vec<String>,
}

impl Score {
    fn new() -> Self {
        Self {
            value: 0.0,
            factors: Vec::new(),
        }
    }

    /// 重み付きで加点し、十分寄与した要素だけ根拠に残す
    fn add(&mut self, weight: f64, fit: f64, factor: impl FnOnce() -> String) {
        self.value += weight * fit;
        if fit >= 0.5 {
            self.factors.push(factor());
        }
    }
}

/// [lo, hi] 内なら 1、外側は幅に比例して 0 まで下がる
fn band(value: f64, lo: f64, hi: f64) -> f64 {
    if (lo..=hi).contains(&value) {
        return 1.0;
    }
    let distance = if value < lo { lo - value } else { value - hi };
    let width = (hi - lo).max(0.1);
    (1.0 - distance / width).max(0.0)
}

fn score_anillos(f: &ShapeFeatures) -> Score {
    let s = &f.snapshot;
    let mut score = Score::new();
    score.add(0.35, band(s.aspect_ratio, 1.0, 1.35), || {
        format!("balanced proportions (aspect {:.2})", s.aspect_ratio)
    });
    score.add(0.4, band(s.circularity, 0.7, 1.0), || {
        format!("round outline (circularity {:.2})", s.circularity)
    });
    score.add(0.25, band(s.solidity, 0.85, 1.0), || {
        format!("compact silhouette (solidity {:.2})", s.solidity)
    });
    if f.comparable_components > 1 {
        score.value *= 0.7;
    }
    score
}

fn score_colgantes(f: &ShapeFeatures) -> Score {
    let s = &f.snapshot;
    let mut score = Score::new();
    score.add(0.35, band(s.aspect_ratio, 1.4, 3.5), || {
        format!("elongated shape (aspect {:.2})", s.aspect_ratio)
    });
    score.add(0.35, band(s.solidity, 0.3, 0.8), || {
        format!("open chain-like outline (solidity {:.2})", s.solidity)
    });
    score.add(0.3, band(s.edge_density, 0.03, 0.2), || {
        format!("fine detail (edge density {:.3})", s.edge_density)
    });
    score
}

fn score_pulseras(f: &ShapeFeatures) -> Score {
    let s = &f.snapshot;
    let mut score = Score::new();
    score.add(0.3, band(s.aspect_ratio, 1.2, 2.2), || {
        format!("wide oval proportions (aspect {:.2})", s.aspect_ratio)
    });
    score.add(0.3, band(s.circularity, 0.4, 0.75), || {
        format!("loop-like outline (circularity {:.2})", s.circularity)
    });
    score.add(0.2, band(s.fill_ratio, 0.4, 0.75), || {
        format!("partial fill (fill ratio {:.2})", s.fill_ratio)
    });
    score.add(0.2, band(s.solidity, 0.6, 0.95), || {
        format!("moderate solidity ({:.2})", s.solidity)
    });
    score
}

fn score_pendientes(f: &ShapeFeatures) -> Score {
    let s = &f.snapshot;
    let mut score = Score::new();
    let pairing = match f.comparable_components {
        2 => 1.0,
        n if n >= 4 && n % 2 == 0 => 0.75,
        _ => 0.0,
    };
    score.add(0.6, pairing, || {
        format!("{} similar pieces side by side", f.comparable_components)
    });
    score.add(0.2, band(s.aspect_ratio, 1.0, 2.5), || {
        format!("drop proportions (aspect {:.2})", s.aspect_ratio)
    });
    score.add(0.2, band(s.solidity, 0.5, 1.0), || {
        format!("solid pieces (solidity {:.2})", s.solidity)
    });
    score
}

fn score_for(category: JewelryCategory, f: &ShapeFeatures) -> Score {
    match category {
        JewelryCategory::Anillos => score_anillos(f),
        JewelryCategory::ColgantesYCollares => score_colgantes(f),
        JewelryCategory::Pulseras => score_pulseras(f),
        JewelryCategory::Pendientes => score_pendientes(f),
        _ => Score::new(),
    }
}

/// 特徴量からカテゴリラベルを推定する
pub fn infer(features: &ShapeFeatures, config: &CategoryConfig) -> CategoryLabel {
    if !features.has_silhouette && features.keyword_hits.is_empty() {
        return CategoryLabel::unknown(features.snapshot, "no usable silhouette or keyword");
    }

    let mut scored: Vec<(JewelryCategory, Score)> = JewelryCategory::AUTOMATIC
        .iter()
        .map(|&category| {
            let mut score = if features.has_silhouette {
                score_for(category, features)
            } else {
                Score::new()
            };
            if features.keyword_hits.contains(&category) {
                score.value += config.keyword_bonus;
                score.factors.push("keyword in printed text".to_string());
            }
            (category, score)
        })
        .collect();

    // 同点は定義順（先勝ち）
    let mut best = 0;
    for (i, (_, score)) in scored.iter().enumerate() {
        if score.value > scored[best].1.value {
            best = i;
        }
    }
    let (category, score) = scored.swap_remove(best);
    let runner_up = scored
        .iter()
        .max_by(|a, b| a.1.value.partial_cmp(&b.1.value).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(c, s)| format!("; runner-up {} {:.2}", c.key(), s.value))
        .unwrap_or_default();

    if score.value < config.min_score {
        return CategoryLabel {
            category: JewelryCategory::SinCategoria,
            confidence: score.value.clamp(0.0, 1.0),
            features: features.snapshot,
            explanation: format!(
                "best match {} scored {:.2}, below {:.2}{}",
                category.key(),
                score.value,
                config.min_score,
                runner_up
            ),
        };
    }

    let factors = if score.factors.is_empty() {
        "weak overall fit".to_string()
    } else {
        score.factors.join(", ")
    };
    CategoryLabel {
        category,
        confidence: score.value.clamp(0.0, 1.0),
        features: features.snapshot,
        explanation: format!(
            "{} (score {:.2}): {}{}",
            category.display_name(),
            score.value,
            factors,
            runner_up
        ),
    }
}
