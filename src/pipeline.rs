//! 台紙1枚・セルフォルダ・台紙フォルダ単位の処理
//!
//! 台紙1枚の中では検出順に全セルを分類してから均衡補正し、最後に書き出す。
//! 台紙どうしは独立なので `--parallel` なら rayon で並列に処理する。

use crate::balance::{self, BalanceReport};
use crate::classifier::{ClassifiedCell, Classifier, ManualOverrides};
use crate::config::Config;
use crate::detector::{self, BoundingBox, Sheet};
use crate::error::{Result, SheetSorterError};
use crate::ocr::engine::TextRecognizer;
use crate::partition::{self, PartitionSummary, SheetReport};
use crate::scanner::{self, ImageInfo};
use image::DynamicImage;
use rayon::prelude::*;
use serde::Serialize;
use sheet_sorter_common::CellCategory;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// 分類前のセル
struct PendingCell {
    sequence: usize,
    file_name: String,
    bbox: Option<BoundingBox>,
    image: DynamicImage,
}

/// 台紙（またはセルフォルダ）1つ分の結果
#[derive(Debug, Clone, Serialize)]
pub struct SheetOutcome {
    pub source: String,
    pub cells: usize,
    pub partition: PartitionSummary,
    pub balance: BalanceReport,
}

/// 一括処理の結果
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub processed: Vec<SheetOutcome>,
    /// (台紙ファイル名, エラー)
    pub failures: Vec<(String, String)>,
}

impl BatchSummary {
    pub fn total_cells(&self) -> usize {
        self.processed.iter().map(|s| s.cells).sum()
    }
}

pub struct Pipeline<'a> {
    config: &'a Config,
    recognizer: &'a dyn TextRecognizer,
    overrides: &'a ManualOverrides,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a Config, recognizer: &'a dyn TextRecognizer, overrides: &'a ManualOverrides) -> Self {
        Self {
            config,
            recognizer,
            overrides,
        }
    }

    /// 分類 → 均衡補正 → 写真のカテゴリ推定
    fn classify_all(&self, scope: &str, pending: Vec<PendingCell>) -> (Vec<ClassifiedCell>, BalanceReport) {
        let classifier = Classifier::new(self.config, self.recognizer);

        let mut cells: Vec<ClassifiedCell> = pending
            .into_iter()
            .map(|p| {
                let forced = self.overrides.lookup(Some(scope), &p.file_name, p.sequence);
                let (result, evidence) = classifier.classify(&p.image, forced);
                ClassifiedCell {
                    sequence: p.sequence,
                    file_name: p.file_name,
                    bbox: p.bbox,
                    image: p.image,
                    result,
                    evidence,
                }
            })
            .collect();

        let report = balance::rebalance(&mut cells);

        for cell in cells.iter_mut().filter(|c| c.result.category == CellCategory::Photo) {
            let label = classifier.label_photo(&cell.image, cell.evidence.as_ref());
            cell.result.push_step("category", label.explanation.clone());
            cell.result.sub_label = Some(label);
        }

        (cells, report)
    }

    fn finish(
        &self,
        source: String,
        fingerprint: Option<String>,
        out_dir: &Path,
        cells: Vec<ClassifiedCell>,
        balance: BalanceReport,
    ) -> Result<SheetOutcome> {
        let report = SheetReport::new(source.clone(), fingerprint, &cells, balance.clone());
        let partition = partition::write_partition(out_dir, &cells, &report)?;
        info!(
            source = %source,
            codes = partition.codes,
            photos = partition.photos,
            discards = partition.discards,
            flipped = balance.flipped.len(),
            "台紙処理完了"
        );
        Ok(SheetOutcome {
            source,
            cells: cells.len(),
            partition,
            balance,
        })
    }

    /// 台紙1枚を処理して `out_dir` に書き出す
    pub fn process_sheet(&self, sheet_path: &Path, out_dir: &Path) -> Result<SheetOutcome> {
        let sheet = Sheet::open(sheet_path)?;
        let cells = detector::detect_cells(&sheet, &self.config.detector);
        info!(sheet = %sheet.path.display(), cells = cells.len(), "セル検出");

        let pending = cells
            .into_iter()
            .map(|c| PendingCell {
                sequence: c.sequence,
                file_name: c.file_name,
                bbox: Some(c.bbox),
                image: c.image,
            })
            .collect();
        let (classified, balance) = self.classify_all(&sheet.stem(), pending);
        self.finish(
            sheet.path.display().to_string(),
            Some(sheet.fingerprint.clone()),
            out_dir,
            classified,
            balance,
        )
    }

    /// 切り出し済みのセルフォルダを処理する
    pub fn process_cells(&self, cells_dir: &Path, out_dir: &Path) -> Result<SheetOutcome> {
        let infos = scanner::scan_cells(cells_dir)?;
        if infos.is_empty() {
            return Err(SheetSorterError::NoImagesFound(cells_dir.display().to_string()));
        }

        let mut pending = Vec::with_capacity(infos.len());
        for info in infos {
            match image::open(&info.path) {
                Ok(image) => pending.push(PendingCell {
                    sequence: info.sequence.unwrap_or_default(),
                    file_name: info.file_name,
                    bbox: None,
                    image,
                }),
                Err(e) => warn!(file = %info.file_name, error = %e, "セル画像を読めません"),
            }
        }

        let scope = cells_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let (classified, balance) = self.classify_all(&scope, pending);
        self.finish(cells_dir.display().to_string(), None, out_dir, classified, balance)
    }

    /// 台紙フォルダを一括処理する。失敗した台紙は飛ばして結果に記録する。
    pub fn run_batch(
        &self,
        sheets_dir: &Path,
        out_root: &Path,
        parallel: bool,
        on_done: &(dyn Fn(&str) + Sync),
    ) -> Result<BatchSummary> {
        let sheets = scanner::scan_sheets(sheets_dir)?;
        if sheets.is_empty() {
            return Err(SheetSorterError::NoImagesFound(sheets_dir.display().to_string()));
        }
        let targets = output_dirs(&sheets, out_root);

        let run = |(info, out_dir): &(ImageInfo, PathBuf)| {
            let outcome = self.process_sheet(&info.path, out_dir);
            on_done(&info.file_name);
            (info.file_name.clone(), outcome)
        };
        let outcomes: Vec<(String, Result<SheetOutcome>)> = if parallel {
            targets.par_iter().map(run).collect()
        } else {
            targets.iter().map(run).collect()
        };

        let mut summary = BatchSummary::default();
        for (name, outcome) in outcomes {
            match outcome {
                Ok(outcome) => summary.processed.push(outcome),
                Err(e) => {
                    warn!(sheet = %name, error = %e, "台紙をスキップ");
                    summary.failures.push((name, e.to_string()));
                }
            }
        }
        Ok(summary)
    }
}

/// 台紙ごとの出力先。同名の台紙があれば拡張子を付けて分ける。
pub fn output_dirs(sheets: &[ImageInfo], out_root: &Path) -> Vec<(ImageInfo, PathBuf)> {
    let stem = |info: &ImageInfo| {
        info.path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| info.file_name.clone())
    };
    let mut counts: HashMap<String, usize> = HashMap::new();
    for info in sheets {
        *counts.entry(stem(info)).or_insert(0) += 1;
    }

    sheets
        .iter()
        .map(|info| {
            let stem = stem(info);
            let name = if counts.get(&stem).copied().unwrap_or(0) > 1 {
                info.file_name.replace('.', "_")
            } else {
                stem
            };
            (info.clone(), out_root.join(name))
        })
        .collect()
}

/// 台紙からセルを切り出して書き出すだけ（分類なし）
pub fn extract_sheet(sheet_path: &Path, out_dir: &Path, config: &Config) -> Result<Vec<PathBuf>> {
    let sheet = Sheet::open(sheet_path)?;
    let cells = detector::detect_cells(&sheet, &config.detector);
    info!(sheet = %sheet.path.display(), cells = cells.len(), "セル検出");
    partition::write_cells(out_dir, &cells)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(name: &str) -> ImageInfo {
        ImageInfo {
            path: PathBuf::from("/in").join(name),
            file_name: name.to_string(),
            sequence: None,
        }
    }

    #[test]
    fn test_output_dirs_disambiguate_same_stem() {
        let sheets = vec![info("a.png"), info("a.jpg"), info("b.tif")];
        let dirs = output_dirs(&sheets, Path::new("/out"));
        assert_eq!(dirs[0].1, PathBuf::from("/out/a_png"));
        assert_eq!(dirs[1].1, PathBuf::from("/out/a_jpg"));
        assert_eq!(dirs[2].1, PathBuf::from("/out/b"));
    }
}
