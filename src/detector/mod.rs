//! 矩形セル検出
//!
//! 台紙画像から商品セル（矩形）を探し、ラスター順に並べて切り出す。
//! 並び順は後段のペアリングが依存するため、同じ入力なら常に同じ順序になる。

use crate::config::DetectorConfig;
use crate::error::{Result, SheetSorterError};
use crate::imaging::{self, contour::outer_contours};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;

/// セルの位置（台紙座標, px）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    fn center_y(&self) -> f64 {
        self.y as f64 + self.height as f64 / 2.0
    }

    fn contains(&self, other: &BoundingBox) -> bool {
        self.x <= other.x
            && self.y <= other.y
            && self.right() >= other.right()
            && self.bottom() >= other.bottom()
    }

    fn intersection_area(&self, other: &BoundingBox) -> u64 {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        if x1 <= x0 || y1 <= y0 {
            0
        } else {
            (x1 - x0) as u64 * (y1 - y0) as u64
        }
    }
}

/// 読み込んだ台紙
#[derive(Debug, Clone)]
pub struct Sheet {
    pub path: PathBuf,
    pub image: DynamicImage,
    /// ファイル内容の SHA-256
    pub fingerprint: String,
}

impl Sheet {
    /// 台紙を読み込む。デコードできなければ `Decode` を返す（再試行しない）
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SheetSorterError::FileNotFound(path.display().to_string()));
        }
        let bytes = std::fs::read(path)?;
        let image = image::load_from_memory(&bytes)
            .map_err(|e| SheetSorterError::Decode(format!("{}: {}", path.display(), e)))?;
        Ok(Self {
            path: path.to_path_buf(),
            image,
            fingerprint: hex::encode(Sha256::digest(&bytes)),
        })
    }

    pub fn from_image(path: impl Into<PathBuf>, image: DynamicImage) -> Self {
        let fingerprint = hex::encode(Sha256::digest(image.as_bytes()));
        Self {
            path: path.into(),
            image,
            fingerprint,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "sheet".to_string())
    }
}

/// 切り出されたセル
#[derive(Debug, Clone)]
pub struct Cell {
    /// ラスター順の通し番号（0始まり）
    pub sequence: usize,
    /// 切り出し範囲（余白込み）
    pub bbox: BoundingBox,
    pub image: DynamicImage,
    pub file_name: String,
}

impl Cell {
    pub fn new(sequence: usize, bbox: BoundingBox, image: DynamicImage) -> Self {
        Self {
            sequence,
            bbox,
            image,
            file_name: cell_file_name(sequence),
        }
    }

    pub fn stem(&self) -> String {
        format!("rect_{}", self.sequence)
    }
}

pub fn cell_file_name(sequence: usize) -> String {
    format!("rect_{}.png", sequence)
}

/// 台紙からセルを検出して切り出す
pub fn detect_cells(sheet: &Sheet, config: &DetectorConfig) -> Vec<Cell> {
    let boxes = detect_rectangles(&sheet.image, config);
    let (w, h) = (sheet.width(), sheet.height());
    let m = config.crop_margin;

    boxes
        .into_iter()
        .enumerate()
        .map(|(seq, b)| {
            let x0 = b.x.saturating_sub(m);
            let y0 = b.y.saturating_sub(m);
            let x1 = (b.right() + m).min(w);
            let y1 = (b.bottom() + m).min(h);
            let crop = BoundingBox {
                x: x0,
                y: y0,
                width: x1 - x0,
                height: y1 - y0,
            };
            let image = sheet.image.crop_imm(crop.x, crop.y, crop.width, crop.height);
            Cell::new(seq, crop, image)
        })
        .collect()
}

/// セル候補の外接矩形をラスター順で返す
pub fn detect_rectangles(image: &DynamicImage, config: &DetectorConfig) -> Vec<BoundingBox> {
    let (w, h) = (image.width(), image.height());
    if w == 0 || h == 0 {
        return Vec::new();
    }
    let sheet_area = w as f64 * h as f64;

    let mut gray = imaging::to_gray(image);
    if config.equalize {
        gray = imageproc::contrast::equalize_histogram(&gray);
    }
    let binary = imaging::threshold_binary(&gray, config.binary_threshold);

    let mut candidates: Vec<BoundingBox> = Vec::new();
    for shape in outer_contours(&binary, false) {
        let vertices = shape.approx_vertex_count(config.epsilon_ratio);
        if vertices < config.min_vertices || vertices > config.max_vertices {
            continue;
        }
        if shape.area < config.min_area_px || shape.area < config.min_area_ratio * sheet_area {
            continue;
        }
        let bbox = BoundingBox {
            x: shape.bbox.x,
            y: shape.bbox.y,
            width: shape.bbox.width,
            height: shape.bbox.height,
        };
        if bbox.area() as f64 > config.max_area_ratio * sheet_area {
            continue;
        }
        if shape.area / (bbox.area() as f64) < config.min_rectangularity {
            continue;
        }
        if touches_all_edges(&bbox, w, h, config.border_margin) {
            continue;
        }
        candidates.push(bbox);
    }

    let cells = drop_containers(candidates);
    let kept = suppress_overlaps(cells, config.overlap_merge_ratio);
    let ordered = raster_order(kept);
    debug!(count = ordered.len(), width = w, height = h, "矩形検出");
    ordered
}

fn touches_all_edges(b: &BoundingBox, w: u32, h: u32, margin: u32) -> bool {
    b.x <= margin
        && b.y <= margin
        && b.right() + margin >= w
        && b.bottom() + margin >= h
}

/// 他の候補を2つ以上囲む矩形は台紙や区画の枠であってセルではない
fn drop_containers(boxes: Vec<BoundingBox>) -> Vec<BoundingBox> {
    boxes
        .iter()
        .filter(|outer| {
            let enclosed = boxes
                .iter()
                .filter(|inner| *inner != *outer && outer.contains(inner))
                .count();
            enclosed < 2
        })
        .copied()
        .collect()
}

/// 大きい順に採用し、既採用と大きく重なる候補を捨てる
fn suppress_overlaps(mut boxes: Vec<BoundingBox>, max_overlap: f64) -> Vec<BoundingBox> {
    boxes.sort_by(|a, b| b.area().cmp(&a.area()).then((a.y, a.x).cmp(&(b.y, b.x))));
    let mut kept: Vec<BoundingBox> = Vec::new();
    for b in boxes {
        let overlaps = kept.iter().any(|k| {
            let smaller = k.area().min(b.area()).max(1) as f64;
            k.intersection_area(&b) as f64 / smaller > max_overlap
        });
        if !overlaps {
            kept.push(b);
        }
    }
    kept
}

/// 行ごとに上から、行内は左から並べる。
///
/// 中心 y の差が高さ中央値の半分以内なら同じ行とみなす。
fn raster_order(mut boxes: Vec<BoundingBox>) -> Vec<BoundingBox> {
    if boxes.is_empty() {
        return boxes;
    }
    let mut heights: Vec<u32> = boxes.iter().map(|b| b.height).collect();
    heights.sort_unstable();
    let tolerance = heights[heights.len() / 2] as f64 / 2.0;

    boxes.sort_by(|a, b| {
        a.center_y()
            .partial_cmp(&b.center_y())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.x.cmp(&b.x))
    });

    let mut rows: Vec<Vec<BoundingBox>> = Vec::new();
    for b in boxes {
        match rows.last_mut() {
            Some(row) if b.center_y() - row[0].center_y() <= tolerance => row.push(b),
            _ => rows.push(vec![b]),
        }
    }

    rows.into_iter()
        .flat_map(|mut row| {
            row.sort_by_key(|b| (b.x, b.y));
            row
        })
        .collect()
}
