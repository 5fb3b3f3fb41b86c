//! コードと写真のペアリング
//!
//! 分割済みフォルダの codes と photos を連番順に1対1で組み合わせ、
//! コードセルを再度 OCR したコード文字列をキーにストアへ登録する。

pub mod store;

use crate::config::Config;
use crate::error::{Result, SheetSorterError};
use crate::imaging;
use crate::ocr::engine::TextRecognizer;
use crate::ocr::TextExtractor;
use crate::scanner::{self, ImageInfo};
use serde::Serialize;
use sheet_sorter_common::{read_sidecar, JewelryCategory};
use std::path::Path;
use store::{CodeRecord, CodeStore, Upsert};
use tracing::{info, warn};

/// ペアリング結果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PairingSummary {
    pub inserted: usize,
    pub updated: usize,
    /// 読めなかったセル（コードが空・デコード失敗・写真の読み込み失敗）
    pub unreadable: Vec<String>,
    /// 相手のいないセル
    pub unpaired_codes: usize,
    pub unpaired_photos: usize,
}

impl PairingSummary {
    pub fn stored(&self) -> usize {
        self.inserted + self.updated
    }
}

/// コードセルからコード文字列を読む（空白は除去）
pub fn read_code(info: &ImageInfo, extractor: &TextExtractor, config: &Config) -> Result<String> {
    let image = image::open(&info.path)
        .map_err(|e| SheetSorterError::Decode(format!("{}: {}", info.path.display(), e)))?;
    let gray = imaging::to_gray(&imaging::inset(&image, config.analysis_inset));
    let extraction = extractor.extract(&gray, false);
    Ok(extraction.text.chars().filter(|c| !c.is_whitespace()).collect())
}

/// 写真のカテゴリ（サイドカーが無い・読めない場合は sin_categoria）
pub fn photo_category(info: &ImageInfo) -> JewelryCategory {
    match read_sidecar(&info.path) {
        Ok(Some(sidecar)) => sidecar.category,
        Ok(None) => JewelryCategory::SinCategoria,
        Err(e) => {
            warn!(file = %info.file_name, error = %e, "サイドカーを読めません");
            JewelryCategory::SinCategoria
        }
    }
}

/// 分割済みフォルダ1つ分をストアに登録する
pub fn pair_partition(
    partition_dir: &Path,
    recognizer: &dyn TextRecognizer,
    config: &Config,
    store: &mut dyn CodeStore,
) -> Result<PairingSummary> {
    let (codes, photos) = scanner::scan_partition(partition_dir)?;
    let extractor = TextExtractor::new(recognizer, &config.text);
    let source = partition_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut summary = PairingSummary {
        unpaired_codes: codes.len().saturating_sub(photos.len()),
        unpaired_photos: photos.len().saturating_sub(codes.len()),
        ..Default::default()
    };
    if codes.len() != photos.len() {
        warn!(codes = codes.len(), photos = photos.len(), "コードと写真の数が一致しません");
    }

    for (code_cell, photo) in codes.iter().zip(photos.iter()) {
        let code = match read_code(code_cell, &extractor, config) {
            Ok(code) if !code.is_empty() => code,
            Ok(_) => {
                warn!(file = %code_cell.file_name, "コードを読めません");
                summary.unreadable.push(code_cell.file_name.clone());
                continue;
            }
            Err(e) => {
                warn!(file = %code_cell.file_name, error = %e, "コードセルを開けません");
                summary.unreadable.push(code_cell.file_name.clone());
                continue;
            }
        };

        let bytes = match std::fs::read(&photo.path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(file = %photo.file_name, error = %e, "写真を読めません");
                summary.unreadable.push(photo.file_name.clone());
                continue;
            }
        };
        let record = CodeRecord::new(&code, photo_category(photo), &photo.file_name, &bytes, &source);
        match store.upsert(record)? {
            Upsert::Inserted => summary.inserted += 1,
            Upsert::Updated => summary.updated += 1,
        }
    }

    store.flush()?;
    info!(
        source = %source,
        inserted = summary.inserted,
        updated = summary.updated,
        unreadable = summary.unreadable.len(),
        "ペアリング完了"
    );
    Ok(summary)
}
