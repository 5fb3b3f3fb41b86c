//! 画像前処理の共通部品
//!
//! グレースケール化・二値化・適応二値化・インク量の計測など、
//! 検出器と各判定器が共有する処理をまとめる。

pub mod contour;

use contour::{outer_contours, ContourShape};
use image::{DynamicImage, GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::integral_image::{integral_image, sum_image_pixels};

pub fn to_gray(image: &DynamicImage) -> GrayImage {
    image.to_luma8()
}

/// しきい値より明るい画素を前景（255）にする
pub fn threshold_binary(gray: &GrayImage, threshold: u8) -> GrayImage {
    map_pixels(gray, |v| if v > threshold { 255 } else { 0 })
}

/// しきい値以下の暗い画素を前景（255）にする
pub fn threshold_binary_inv(gray: &GrayImage, threshold: u8) -> GrayImage {
    map_pixels(gray, |v| if v > threshold { 0 } else { 255 })
}

pub fn invert(gray: &GrayImage) -> GrayImage {
    map_pixels(gray, |v| 255 - v)
}

fn map_pixels(gray: &GrayImage, f: impl Fn(u8) -> u8) -> GrayImage {
    let mut out = GrayImage::new(gray.width(), gray.height());
    for (x, y, p) in gray.enumerate_pixels() {
        out.put_pixel(x, y, Luma([f(p[0])]));
    }
    out
}

/// 局所平均による適応二値化。
///
/// `(2r+1)²` 近傍の平均から `offset` を引いた値より明るい画素を 255 にする。
/// 近傍和は imageproc の積分画像から求める。
pub fn adaptive_mean_threshold(gray: &GrayImage, radius: u32, offset: i32) -> GrayImage {
    let (w, h) = gray.dimensions();
    let mut out = GrayImage::new(w, h);
    if w == 0 || h == 0 {
        return out;
    }

    let integral = integral_image::<_, u32>(gray);
    for y in 0..h {
        let (top, bottom) = (y.saturating_sub(radius), (y + radius).min(h - 1));
        for x in 0..w {
            let (left, right) = (x.saturating_sub(radius), (x + radius).min(w - 1));
            let sum = sum_image_pixels(&integral, left, top, right, bottom)[0];
            let count = (right - left + 1) * (bottom - top + 1);
            let mean = sum as f64 / count as f64;
            let value = gray.get_pixel(x, y)[0] as f64;
            if value > mean - offset as f64 {
                out.put_pixel(x, y, Luma([255]));
            }
        }
    }
    out
}

/// しきい値より暗い画素の割合
pub fn dark_ratio(gray: &GrayImage, threshold: u8) -> f64 {
    let total = gray.width() as u64 * gray.height() as u64;
    if total == 0 {
        return 0.0;
    }
    let dark = gray.pixels().filter(|p| p[0] < threshold).count() as u64;
    dark as f64 / total as f64
}

/// 最大輝度 − 最小輝度
pub fn dynamic_range(gray: &GrayImage) -> u8 {
    let mut min = u8::MAX;
    let mut max = u8::MIN;
    for p in gray.pixels() {
        min = min.min(p[0]);
        max = max.max(p[0]);
    }
    max.saturating_sub(min)
}

/// 外周を `inset` px 削った領域（小さすぎる場合は元画像）
pub fn inset(image: &DynamicImage, inset: u32) -> DynamicImage {
    let (w, h) = (image.width(), image.height());
    if inset == 0 || w <= inset * 2 + 4 || h <= inset * 2 + 4 {
        return image.clone();
    }
    image.crop_imm(inset, inset, w - inset * 2, h - inset * 2)
}

/// インクの広がりと輪郭の集計
#[derive(Debug, Clone)]
pub struct InkProfile {
    /// しきい値未満の画素の割合
    pub ratio: f64,
    /// 最外周のインク成分
    pub contours: Vec<ContourShape>,
    pub pixel_count: u64,
}

impl InkProfile {
    /// しきい値未満をインクとして集計する
    pub fn measure(gray: &GrayImage, threshold: u8) -> Self {
        let mask = threshold_binary_inv(gray, threshold.saturating_sub(1));
        Self {
            ratio: dark_ratio(gray, threshold),
            contours: outer_contours(&mask, true),
            pixel_count: gray.width() as u64 * gray.height() as u64,
        }
    }

    pub fn count_above(&self, area: f64) -> usize {
        self.contours.iter().filter(|c| c.area > area).count()
    }

    pub fn largest(&self) -> Option<&ContourShape> {
        self.contours
            .iter()
            .max_by(|a, b| a.area.partial_cmp(&b.area).unwrap_or(std::cmp::Ordering::Equal))
    }
}

/// 3×3 膨張 → Canny で得たエッジ画素数
pub fn edge_pixels(gray: &GrayImage, ink_threshold: u8, low: f32, high: f32) -> u64 {
    let mask = threshold_binary_inv(gray, ink_threshold.saturating_sub(1));
    let dilated = imageproc::morphology::dilate(&mask, Norm::LInf, 1);
    let edges = imageproc::edges::canny(&dilated, low, high);
    edges.pixels().filter(|p| p[0] > 0).count() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank(w: u32, h: u32) -> GrayImage {
        GrayImage::from_pixel(w, h, Luma([255]))
    }

    #[test]
    fn test_dark_ratio_and_range() {
        let mut img = blank(10, 10);
        img.put_pixel(0, 0, Luma([0]));
        img.put_pixel(1, 0, Luma([100]));
        assert!((dark_ratio(&img, 230) - 0.02).abs() < 1e-9);
        assert_eq!(dynamic_range(&img), 255);
        assert_eq!(dynamic_range(&blank(4, 4)), 0);
    }

    #[test]
    fn test_threshold_pair() {
        let mut img = blank(2, 1);
        img.put_pixel(0, 0, Luma([50]));
        let fg = threshold_binary(&img, 200);
        let inv = threshold_binary_inv(&img, 200);
        assert_eq!(fg.get_pixel(0, 0)[0], 0);
        assert_eq!(fg.get_pixel(1, 0)[0], 255);
        assert_eq!(inv.get_pixel(0, 0)[0], 255);
        assert_eq!(inv.get_pixel(1, 0)[0], 0);
    }

    #[test]
    fn test_adaptive_threshold_keeps_flat_background() {
        let mut img = blank(20, 20);
        img.put_pixel(10, 10, Luma([0]));
        let out = adaptive_mean_threshold(&img, 5, 2);
        assert_eq!(out.get_pixel(0, 0)[0], 255);
        assert_eq!(out.get_pixel(10, 10)[0], 0);
    }

    #[test]
    fn test_adaptive_threshold_offset_tolerates_faint_pixels() {
        let mut img = GrayImage::from_pixel(20, 20, Luma([200]));
        img.put_pixel(5, 5, Luma([199]));
        img.put_pixel(14, 14, Luma([190]));
        let out = adaptive_mean_threshold(&img, 5, 2);
        assert_eq!(out.get_pixel(5, 5)[0], 255);
        assert_eq!(out.get_pixel(14, 14)[0], 0);
        assert_eq!(adaptive_mean_threshold(&img, 5, 0).get_pixel(5, 5)[0], 0);
    }

    #[test]
    fn test_ink_profile_counts_components() {
        let mut img = blank(40, 40);
        for y in 5..15 {
            for x in 5..15 {
                img.put_pixel(x, y, Luma([0]));
            }
        }
        for y in 25..28 {
            for x in 25..28 {
                img.put_pixel(x, y, Luma([0]));
            }
        }
        let profile = InkProfile::measure(&img, 220);
        assert_eq!(profile.contours.len(), 2);
        assert_eq!(profile.count_above(50.0), 1);
        assert!(profile.largest().map(|c| c.area > 50.0).unwrap_or(false));
    }

    #[test]
    fn test_inset_small_image_untouched() {
        let img = DynamicImage::ImageLuma8(blank(8, 8));
        assert_eq!(inset(&img, 4).width(), 8);
        let big = DynamicImage::ImageLuma8(blank(40, 30));
        let cropped = inset(&big, 4);
        assert_eq!((cropped.width(), cropped.height()), (32, 22));
    }
}
