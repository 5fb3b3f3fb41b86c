//! 空セル判定
//!
//! インク量・コントラスト・輪郭から、セルが空（破棄対象）かどうかを決める。
//! 判定は次の優先順で行う:
//! 1. インク率が絶対下限未満 ⇒ 空（覆らない）
//! 2. 低コントラストかつ低インク率 ⇒ 空
//! 3. シルエット状の大きな輪郭があり、インク率が下限を超える ⇒ 内容あり
//! 4. 低インク率かつ有意な輪郭なし ⇒ 空
//! 5. それ以外 ⇒ 内容あり

use crate::config::{BlankConfig, DetectorConfig};
use crate::imaging::{self, InkProfile};
use image::GrayImage;
use serde::Serialize;

/// 判定を決めた規則
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlankRule {
    BelowMinimumInk,
    LowContrast,
    SilhouetteOverride,
    SparseWithoutContours,
    HasContent,
}

impl BlankRule {
    pub fn name(&self) -> &'static str {
        match self {
            BlankRule::BelowMinimumInk => "below_minimum_ink",
            BlankRule::LowContrast => "low_contrast",
            BlankRule::SilhouetteOverride => "silhouette_override",
            BlankRule::SparseWithoutContours => "sparse_without_contours",
            BlankRule::HasContent => "has_content",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BlankVerdict {
    pub is_blank: bool,
    pub rule: BlankRule,
    pub content_ratio: f64,
    pub dynamic_range: u8,
    pub significant_contours: usize,
}

impl BlankVerdict {
    pub fn summary(&self) -> String {
        format!(
            "{} ({}; ink {:.3}%, range {}, contours {})",
            if self.is_blank { "blank" } else { "content" },
            self.rule.name(),
            self.content_ratio * 100.0,
            self.dynamic_range,
            self.significant_contours
        )
    }
}

/// 空セル判定（解析用の内側領域のグレースケールを渡す）
pub fn assess(gray: &GrayImage, config: &BlankConfig, epsilon_ratio: f64) -> BlankVerdict {
    let profile = InkProfile::measure(gray, config.white_threshold);
    let ratio = profile.ratio;
    let range = imaging::dynamic_range(gray);
    let significant = profile.count_above(config.significant_contour_area);

    let verdict = |is_blank: bool, rule: BlankRule| BlankVerdict {
        is_blank,
        rule,
        content_ratio: ratio,
        dynamic_range: range,
        significant_contours: significant,
    };

    if ratio < config.min_content_ratio {
        return verdict(true, BlankRule::BelowMinimumInk);
    }
    if range < config.low_contrast_range && ratio < config.low_contrast_ratio {
        return verdict(true, BlankRule::LowContrast);
    }

    let silhouette = profile.contours.iter().any(|c| {
        if c.area <= config.silhouette_contour_area {
            return false;
        }
        let vertices = c.approx_vertex_count(epsilon_ratio);
        (config.silhouette_min_vertices..=config.silhouette_max_vertices).contains(&vertices)
    });
    if silhouette && ratio > config.silhouette_min_ratio {
        return verdict(false, BlankRule::SilhouetteOverride);
    }

    if ratio < config.sparse_ratio && significant == 0 {
        return verdict(true, BlankRule::SparseWithoutContours);
    }

    verdict(false, BlankRule::HasContent)
}

/// 既定の多角形近似比で判定する
pub fn assess_default(gray: &GrayImage, config: &BlankConfig) -> BlankVerdict {
    assess(gray, config, DetectorConfig::default().epsilon_ratio)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn white(w: u32, h: u32) -> GrayImage {
        GrayImage::from_pixel(w, h, Luma([255]))
    }

    fn draw_disk(img: &mut GrayImage, cx: i32, cy: i32, r: i32, value: u8) {
        for y in (cy - r)..=(cy + r) {
            for x in (cx - r)..=(cx + r) {
                if (x - cx).pow(2) + (y - cy).pow(2) <= r * r
                    && x >= 0
                    && y >= 0
                    && (x as u32) < img.width()
                    && (y as u32) < img.height()
                {
                    img.put_pixel(x as u32, y as u32, Luma([value]));
                }
            }
        }
    }

    #[test]
    fn test_empty_cell_is_blank() {
        let v = assess_default(&white(100, 80), &BlankConfig::default());
        assert!(v.is_blank);
        assert_eq!(v.rule, BlankRule::BelowMinimumInk);
    }

    #[test]
    fn test_tiny_speck_below_absolute_minimum() {
        // 8000画素中 4画素 = 0.05%
        let mut img = white(100, 80);
        for (x, y) in [(10, 10), (11, 10), (10, 11), (11, 11)] {
            img.put_pixel(x, y, Luma([0]));
        }
        let v = assess_default(&img, &BlankConfig::default());
        assert!(v.is_blank);
        assert_eq!(v.rule, BlankRule::BelowMinimumInk);
    }

    #[test]
    fn test_faint_smudge_low_contrast() {
        let mut img = GrayImage::from_pixel(100, 80, Luma([240]));
        for x in 0..40 {
            img.put_pixel(x, 40, Luma([225]));
        }
        let v = assess_default(&img, &BlankConfig::default());
        assert!(v.is_blank);
        assert_eq!(v.rule, BlankRule::LowContrast);
    }

    #[test]
    fn test_sparse_marks_without_contours() {
        // 3×3 の点を 4 つ（面積 < 50）: 36/10000 = 0.36%
        let mut img = white(100, 100);
        for (cx, cy) in [(20, 20), (60, 20), (20, 60), (60, 60)] {
            for y in cy..cy + 3 {
                for x in cx..cx + 3 {
                    img.put_pixel(x, y, Luma([0]));
                }
            }
        }
        let v = assess_default(&img, &BlankConfig::default());
        assert!(v.is_blank);
        assert_eq!(v.rule, BlankRule::SparseWithoutContours);
    }

    #[test]
    fn test_filled_disk_has_content() {
        let mut img = white(100, 80);
        draw_disk(&mut img, 50, 40, 25, 30);
        let v = assess_default(&img, &BlankConfig::default());
        assert!(!v.is_blank);
    }

    #[test]
    fn test_line_art_silhouette_survives() {
        // 細い円環: インク率は低いが大きな有機的輪郭を持つ
        let mut img = white(200, 200);
        draw_disk(&mut img, 100, 100, 40, 0);
        draw_disk(&mut img, 100, 100, 38, 255);
        let v = assess_default(&img, &BlankConfig::default());
        assert!(v.content_ratio < 0.02, "ratio {}", v.content_ratio);
        assert!(!v.is_blank);
        assert_eq!(v.rule, BlankRule::SilhouetteOverride);
    }
}
