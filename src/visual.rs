//! 見た目による写真判定
//!
//! OCR とは独立に、インク量・輪郭数・エッジ密度からセルが商品写真らしいかを判定する。

use crate::config::VisualConfig;
use crate::imaging::{self, InkProfile};
use image::GrayImage;
use serde::Serialize;

/// 判定に使った統計量と成立した規則
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VisualEvidence {
    pub ink_ratio: f64,
    pub contours: usize,
    pub large_contours: usize,
    pub edge_pixels: u64,
    pub edge_ratio: f64,
    /// 最大輪郭の近似頂点数
    pub largest_vertices: usize,
    pub fired: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisualAssessment {
    pub is_photo: bool,
    pub evidence: VisualEvidence,
}

impl VisualAssessment {
    pub fn summary(&self) -> String {
        let e = &self.evidence;
        format!(
            "{} (ink {:.1}%, contours {}, large {}, edges {} / {:.3}){}",
            if self.is_photo { "photo-like" } else { "not photo-like" },
            e.ink_ratio * 100.0,
            e.contours,
            e.large_contours,
            e.edge_pixels,
            e.edge_ratio,
            if e.fired.is_empty() {
                String::new()
            } else {
                format!(" [{}]", e.fired.join(", "))
            }
        )
    }
}

type VisualRule = fn(&VisualEvidence, &VisualConfig) -> bool;

const PHOTO_RULES: &[(&str, VisualRule)] = &[
    ("dense_ink", |e, c| e.ink_ratio > c.dense_ratio && e.contours > c.dense_contours),
    ("large_contour", |e, c| e.large_contours >= 1 && e.ink_ratio > c.large_contour_ratio),
    ("edge_density", |e, c| {
        e.edge_ratio > c.edge_ratio && e.edge_pixels > c.min_edge_pixels as u64
    }),
];

/// インク分布を計測する（しきい値は `ink_threshold`）
pub fn measure(gray: &GrayImage, config: &VisualConfig) -> InkProfile {
    InkProfile::measure(gray, config.ink_threshold)
}

/// 写真らしさを判定する
pub fn assess(
    gray: &GrayImage,
    profile: &InkProfile,
    config: &VisualConfig,
    epsilon_ratio: f64,
) -> VisualAssessment {
    let edge_pixels = imaging::edge_pixels(gray, config.ink_threshold, config.canny_low, config.canny_high);
    let total = profile.pixel_count.max(1);

    let mut evidence = VisualEvidence {
        ink_ratio: profile.ratio,
        contours: profile.contours.len(),
        large_contours: profile.count_above(config.large_contour_area),
        edge_pixels,
        edge_ratio: edge_pixels as f64 / total as f64,
        largest_vertices: profile
            .largest()
            .map(|c| c.approx_vertex_count(epsilon_ratio))
            .unwrap_or(0),
        fired: Vec::new(),
    };
    evidence.fired = PHOTO_RULES
        .iter()
        .filter(|(_, rule)| rule(&evidence, config))
        .map(|(name, _)| *name)
        .collect();

    VisualAssessment {
        is_photo: !evidence.fired.is_empty(),
        evidence,
    }
}

/// コード判定後の複雑さチェック（インクが多く輪郭も多いなら写真）
pub fn is_complex(evidence: &VisualEvidence, config: &VisualConfig) -> bool {
    evidence.ink_ratio > config.complexity_ratio && evidence.contours > config.complexity_contours
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn run(img: &GrayImage) -> VisualAssessment {
        let config = VisualConfig::default();
        let profile = measure(img, &config);
        assess(img, &profile, &config, 0.02)
    }

    #[test]
    fn test_filled_disk_is_photo() {
        let mut img = GrayImage::from_pixel(100, 80, Luma([255]));
        for y in 0..80i32 {
            for x in 0..100i32 {
                if (x - 50).pow(2) + (y - 40).pow(2) <= 25 * 25 {
                    img.put_pixel(x as u32, y as u32, Luma([30]));
                }
            }
        }
        let v = run(&img);
        assert!(v.is_photo, "{}", v.summary());
        assert!(v.evidence.fired.contains(&"large_contour"));
        assert!(v.evidence.largest_vertices > 6);
    }

    #[test]
    fn test_small_marks_are_not_photo() {
        let mut img = GrayImage::from_pixel(100, 80, Luma([255]));
        for i in 0..4u32 {
            for y in 38..41 {
                for x in (15 + i * 12)..(18 + i * 12) {
                    img.put_pixel(x, y, Luma([0]));
                }
            }
        }
        let v = run(&img);
        assert!(!v.is_photo, "{}", v.summary());
        assert_eq!(v.evidence.contours, 4);
        assert!(!is_complex(&v.evidence, &VisualConfig::default()));
    }

    #[test]
    fn test_blank_is_not_photo() {
        let v = run(&GrayImage::from_pixel(50, 50, Luma([255])));
        assert!(!v.is_photo);
        assert_eq!(v.evidence.edge_pixels, 0);
    }
}
