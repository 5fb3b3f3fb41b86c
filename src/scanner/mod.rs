use crate::error::{Result, SheetSorterError};
use lazy_static::lazy_static;
use regex::Regex;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct ImageInfo {
    pub path: PathBuf,
    pub file_name: String,
    /// `rect_<n>` の n（セル画像のときのみ）
    pub sequence: Option<usize>,
}

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tif", "tiff"];

lazy_static! {
    static ref CELL_NAME: Regex = Regex::new(r"^rect_(\d+)\.[A-Za-z]+$").unwrap();
}

/// 拡張子が対応画像か（大文字小文字は区別しない）
pub fn is_image_extension(ext: &str) -> bool {
    let ext = ext.to_ascii_lowercase();
    IMAGE_EXTENSIONS.contains(&ext.as_str())
}

/// `rect_<n>.<ext>` から n を取り出す
pub fn cell_sequence(file_name: &str) -> Option<usize> {
    CELL_NAME
        .captures(file_name)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn scan_images(folder: &Path) -> Result<Vec<ImageInfo>> {
    if !folder.is_dir() {
        return Err(SheetSorterError::FolderNotFound(folder.display().to_string()));
    }

    let mut images = Vec::new();

    for entry in WalkDir::new(folder)
        .max_depth(1)  // 直下のみ（再帰しない）
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        let is_image = path
            .extension()
            .map(|ext| is_image_extension(&ext.to_string_lossy()))
            .unwrap_or(false);
        if !is_image {
            continue;
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        images.push(ImageInfo {
            path: path.to_path_buf(),
            sequence: cell_sequence(&file_name),
            file_name,
        });
    }

    Ok(images)
}

/// 台紙画像を列挙する（ファイル名順）
pub fn scan_sheets(folder: &Path) -> Result<Vec<ImageInfo>> {
    let mut images = scan_images(folder)?;
    images.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(images)
}

/// 切り出し済みのセル画像を列挙する（連番順）
pub fn scan_cells(folder: &Path) -> Result<Vec<ImageInfo>> {
    let mut cells: Vec<ImageInfo> = scan_images(folder)?
        .into_iter()
        .filter(|i| i.sequence.is_some())
        .collect();
    cells.sort_by(|a, b| a.sequence.cmp(&b.sequence).then(a.file_name.cmp(&b.file_name)));
    Ok(cells)
}

/// 分割済みフォルダの codes / photos を連番順に列挙する
pub fn scan_partition(folder: &Path) -> Result<(Vec<ImageInfo>, Vec<ImageInfo>)> {
    if !folder.is_dir() {
        return Err(SheetSorterError::FolderNotFound(folder.display().to_string()));
    }
    let codes = folder.join("codes");
    let photos = folder.join("photos");
    let codes = if codes.is_dir() { scan_cells(&codes)? } else { Vec::new() };
    let photos = if photos.is_dir() { scan_cells(&photos)? } else { Vec::new() };
    Ok((codes, photos))
}
