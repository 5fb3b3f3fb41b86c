//! 分類結果の書き出し
//!
//! `<出力>/<台紙名>/{codes,photos,discards}/` にセル画像を振り分け、写真には
//! カテゴリサイドカー、破棄セルには理由ファイル、台紙ごとに report.json を置く。
//! 書き出し前に3つのフォルダを空にするので、同じ入力なら同じ結果になる。

use crate::balance::BalanceReport;
use crate::classifier::ClassifiedCell;
use crate::detector::{BoundingBox, Cell};
use crate::error::{Result, SheetSorterError};
use crate::measurement::MeasurementVerdict;
use image::DynamicImage;
use serde::Serialize;
use sheet_sorter_common::{
    write_sidecar, AnalysisStep, CategoryLabel, CellCategory, ClassificationResult, FeatureSnapshot,
};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const REPORT_FILE_NAME: &str = "report.json";

const PARTITIONS: [CellCategory; 3] = [CellCategory::Code, CellCategory::Photo, CellCategory::Discard];

/// セル1件分の記録
#[derive(Debug, Clone, Serialize)]
pub struct CellReport {
    pub sequence: usize,
    pub file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
    pub result: ClassificationResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurement: Option<MeasurementVerdict>,
}

impl CellReport {
    pub fn from_cell(cell: &ClassifiedCell) -> Self {
        Self {
            sequence: cell.sequence,
            file_name: cell.file_name.clone(),
            bbox: cell.bbox,
            result: cell.result.clone(),
            measurement: cell.evidence.as_ref().and_then(|e| e.measurement.clone()),
        }
    }
}

/// 台紙1枚分のレポート（report.json）
#[derive(Debug, Clone, Serialize)]
pub struct SheetReport {
    /// 入力（台紙ファイルまたはセルフォルダ）
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    pub generated_at: String,
    pub cells: Vec<CellReport>,
    pub balance: BalanceReport,
}

impl SheetReport {
    pub fn new(source: impl Into<String>, fingerprint: Option<String>, cells: &[ClassifiedCell], balance: BalanceReport) -> Self {
        Self {
            source: source.into(),
            fingerprint,
            generated_at: chrono::Local::now().to_rfc3339(),
            cells: cells.iter().map(CellReport::from_cell).collect(),
            balance,
        }
    }
}

/// 破棄理由ファイル（`rect_<n>_discard.json`）
#[derive(Debug, Clone, Serialize)]
struct DiscardInfo<'a> {
    filename: &'a str,
    reason: &'a str,
    confidence: f64,
    steps: &'a [AnalysisStep],
    #[serde(skip_serializing_if = "Option::is_none")]
    measurement: Option<&'a MeasurementVerdict>,
    timestamp: String,
}

/// 書き出し件数
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PartitionSummary {
    pub dir: PathBuf,
    pub codes: usize,
    pub photos: usize,
    pub discards: usize,
}

/// 拡張子に合わせて保存する（JPEG はアルファを落とす）
pub fn save_image(image: &DynamicImage, path: &Path) -> Result<()> {
    let is_jpeg = path
        .extension()
        .map(|e| matches!(e.to_string_lossy().to_ascii_lowercase().as_str(), "jpg" | "jpeg"))
        .unwrap_or(false);
    let saved = if is_jpeg {
        DynamicImage::ImageRgb8(image.to_rgb8()).save(path)
    } else {
        image.save(path)
    };
    saved.map_err(|e| SheetSorterError::ImageWrite(format!("{}: {}", path.display(), e)))
}

/// codes / photos / discards を空の状態で用意する
pub fn prepare_dirs(out_dir: &Path) -> Result<()> {
    for category in PARTITIONS {
        let dir = out_dir.join(category.folder_name());
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
        }
        std::fs::create_dir_all(&dir)?;
    }
    Ok(())
}

fn discard_info_path(image_path: &Path) -> PathBuf {
    let stem = image_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    image_path.with_file_name(format!("{}_discard.json", stem))
}

fn write_discard_info(image_path: &Path, cell: &ClassifiedCell) -> Result<()> {
    let info = DiscardInfo {
        filename: &cell.file_name,
        reason: &cell.result.reason,
        confidence: cell.result.confidence,
        steps: &cell.result.steps,
        measurement: cell.evidence.as_ref().and_then(|e| e.measurement.as_ref()),
        timestamp: chrono::Local::now().to_rfc3339(),
    };
    let file = File::create(discard_info_path(image_path))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &info)?;
    Ok(())
}

/// 分類済みセルとレポートを書き出す
pub fn write_partition(out_dir: &Path, cells: &[ClassifiedCell], report: &SheetReport) -> Result<PartitionSummary> {
    prepare_dirs(out_dir)?;

    let mut summary = PartitionSummary {
        dir: out_dir.to_path_buf(),
        ..Default::default()
    };

    for cell in cells {
        let category = cell.result.category;
        let path = out_dir.join(category.folder_name()).join(&cell.file_name);
        save_image(&cell.image, &path)?;

        match category {
            CellCategory::Code => summary.codes += 1,
            CellCategory::Photo => {
                let label = cell.result.sub_label.clone().unwrap_or_else(|| {
                    CategoryLabel::unknown(FeatureSnapshot::default(), "no category inferred")
                });
                write_sidecar(&path, &label)?;
                summary.photos += 1;
            }
            CellCategory::Discard => {
                write_discard_info(&path, cell)?;
                summary.discards += 1;
            }
        }
        debug!(file = %cell.file_name, category = %category, "書き出し");
    }

    let file = File::create(out_dir.join(REPORT_FILE_NAME))?;
    serde_json::to_writer_pretty(BufWriter::new(file), report)?;

    Ok(summary)
}

/// 検出したセルをそのまま書き出す（分類なし）
pub fn write_cells(out_dir: &Path, cells: &[Cell]) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir)?;
    let mut written = Vec::with_capacity(cells.len());
    for cell in cells {
        let path = out_dir.join(&cell.file_name);
        save_image(&cell.image, &path)?;
        written.push(path);
    }
    Ok(written)
}
