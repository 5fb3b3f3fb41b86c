//! 輪郭と多角形の幾何計算
//!
//! 輪郭追跡と面積・周長・多角形近似・凸包は imageproc に任せ、
//! ここでは形状の指標（充実度・円形度など）をまとめる。

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::geometry::{self, approximate_polygon_dp, contour_area};
use imageproc::point::Point;

/// 外接矩形（画素単位, 右端・下端を含む幅/高さ）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// 1本の輪郭とその基本量
#[derive(Debug, Clone)]
pub struct ContourShape {
    pub points: Vec<Point<i32>>,
    pub area: f64,
    pub perimeter: f64,
    pub bbox: PixelRect,
    /// 親輪郭を持たない（最外周）か
    pub top_level: bool,
}

impl ContourShape {
    fn from_points(points: Vec<Point<i32>>, top_level: bool) -> Self {
        let area = polygon_area(&points);
        let perimeter = arc_length(&points);
        let bbox = bounding_rect(&points);
        Self {
            points,
            area,
            perimeter,
            bbox,
            top_level,
        }
    }

    /// 周長比 epsilon で近似した多角形
    pub fn approximate(&self, epsilon_ratio: f64) -> Vec<Point<i32>> {
        approximate_polygon(&self.points, epsilon_ratio * self.perimeter)
    }

    pub fn approx_vertex_count(&self, epsilon_ratio: f64) -> usize {
        self.approximate(epsilon_ratio).len()
    }

    pub fn hull_area(&self) -> f64 {
        polygon_area(&convex_hull(&self.points))
    }

    /// 面積 / 凸包面積
    pub fn solidity(&self) -> f64 {
        let hull = self.hull_area();
        if hull <= f64::EPSILON {
            0.0
        } else {
            (self.area / hull).min(1.0)
        }
    }

    /// 4πA / P²
    pub fn circularity(&self) -> f64 {
        if self.perimeter <= f64::EPSILON {
            0.0
        } else {
            (4.0 * std::f64::consts::PI * self.area / (self.perimeter * self.perimeter)).min(1.0)
        }
    }

    /// 長辺 / 短辺（常に 1 以上）
    pub fn aspect_ratio(&self) -> f64 {
        let (w, h) = (self.bbox.width as f64, self.bbox.height as f64);
        let short = w.min(h).max(1.0);
        w.max(h) / short
    }

    /// 面積 / 外接矩形面積
    pub fn fill_ratio(&self) -> f64 {
        let rect = self.bbox.area() as f64;
        if rect <= 0.0 {
            0.0
        } else {
            (self.area / rect).min(1.0)
        }
    }
}

/// 前景（非ゼロ画素）の外側境界をすべて返す。
///
/// 穴の境界は含まない。`top_level_only` なら入れ子になった成分も除く。
pub fn outer_contours(binary: &GrayImage, top_level_only: bool) -> Vec<ContourShape> {
    find_contours::<i32>(binary)
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer))
        .filter(|c| !top_level_only || c.parent.is_none())
        .map(|c| {
            let top_level = c.parent.is_none();
            ContourShape::from_points(c.points, top_level)
        })
        .collect()
}

/// 靴紐公式による面積
pub fn polygon_area(points: &[Point<i32>]) -> f64 {
    contour_area(points)
}

/// 閉曲線の周長
pub fn arc_length(points: &[Point<i32>]) -> f64 {
    geometry::arc_length(points, true)
}

pub fn bounding_rect(points: &[Point<i32>]) -> PixelRect {
    if points.is_empty() {
        return PixelRect { x: 0, y: 0, width: 0, height: 0 };
    }
    let min_x = points.iter().map(|p| p.x).min().unwrap_or(0);
    let max_x = points.iter().map(|p| p.x).max().unwrap_or(0);
    let min_y = points.iter().map(|p| p.y).min().unwrap_or(0);
    let max_y = points.iter().map(|p| p.y).max().unwrap_or(0);
    PixelRect {
        x: min_x.max(0) as u32,
        y: min_y.max(0) as u32,
        width: (max_x - min_x + 1) as u32,
        height: (max_y - min_y + 1) as u32,
    }
}

fn distance_sq(a: Point<i32>, b: Point<i32>) -> i64 {
    let dx = (a.x - b.x) as i64;
    let dy = (a.y - b.y) as i64;
    dx * dx + dy * dy
}

/// 閉曲線の多角形近似。
///
/// 始点から最も遠い点で曲線を二分し、それぞれを開いた折れ線として
/// Douglas–Peucker で簡略化する。戻り値は重複頂点を含まない。
pub fn approximate_polygon(points: &[Point<i32>], epsilon: f64) -> Vec<Point<i32>> {
    if points.len() < 3 || epsilon <= 0.0 {
        return points.to_vec();
    }

    let start = points[0];
    let far = points
        .iter()
        .enumerate()
        .max_by_key(|(_, p)| distance_sq(start, **p))
        .map(|(i, _)| i)
        .unwrap_or(0);
    if far == 0 || distance_sq(start, points[far]) == 0 {
        return vec![start];
    }

    let mut first_half = approximate_polygon_dp(&points[..=far], epsilon, false);
    let mut closing: Vec<Point<i32>> = points[far..].to_vec();
    closing.push(start);
    let mut second_half = approximate_polygon_dp(&closing, epsilon, false);

    first_half.pop();
    second_half.pop();
    first_half.extend(second_half);
    first_half.dedup();
    first_half
}

/// 凸包（重複点は先に除く）
pub fn convex_hull(points: &[Point<i32>]) -> Vec<Point<i32>> {
    let mut pts: Vec<Point<i32>> = points.to_vec();
    pts.sort_by_key(|p| (p.x, p.y));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }
    geometry::convex_hull(pts)
}
