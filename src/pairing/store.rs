//! コードストア
//!
//! 商品コードをキーに写真とカテゴリを保存する。既定実装は JSON ファイル（codes.json）。

use crate::error::{Result, SheetSorterError};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use sheet_sorter_common::JewelryCategory;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// 保存される1件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeRecord {
    pub code: String,
    pub category: JewelryCategory,
    pub category_display: String,
    /// 写真の元ファイル名
    pub image_file: String,
    /// 写真の中身（base64）
    pub image_base64: String,
    /// 取り込み元（分割フォルダ名）
    pub source: String,
    pub created_at: String,
    pub updated_at: String,
}

impl CodeRecord {
    pub fn new(
        code: impl Into<String>,
        category: JewelryCategory,
        image_file: impl Into<String>,
        image_bytes: &[u8],
        source: impl Into<String>,
    ) -> Self {
        let now = chrono::Local::now().to_rfc3339();
        Self {
            code: code.into(),
            category,
            category_display: category.display_name().to_string(),
            image_file: image_file.into(),
            image_base64: STANDARD.encode(image_bytes),
            source: source.into(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// 画像を復元する
    pub fn image_bytes(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(&self.image_base64)
            .map_err(|e| SheetSorterError::Store(format!("{}: 画像データが不正です: {}", self.code, e)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Updated,
}

pub trait CodeStore {
    /// 同じコードがあれば上書きする（作成日時は保持）
    fn upsert(&mut self, record: CodeRecord) -> Result<Upsert>;

    fn get(&self, code: &str) -> Option<&CodeRecord>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 永続化する
    fn flush(&self) -> Result<()>;
}

/// ストアファイルの構造
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreFile {
    /// バージョン（互換性チェック用）
    version: u32,
    /// コード → レコード
    records: BTreeMap<String, CodeRecord>,
}

impl Default for StoreFile {
    fn default() -> Self {
        Self {
            version: JsonCodeStore::CURRENT_VERSION,
            records: BTreeMap::new(),
        }
    }
}

/// JSON ファイルに保存するストア
#[derive(Debug, Clone)]
pub struct JsonCodeStore {
    path: PathBuf,
    file: StoreFile,
}

impl JsonCodeStore {
    const CURRENT_VERSION: u32 = 1;

    /// ストアを開く（無ければ空で作る）
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self {
                path: path.to_path_buf(),
                file: StoreFile::default(),
            });
        }

        let reader = BufReader::new(File::open(path)?);
        let file: StoreFile = serde_json::from_reader(reader)
            .map_err(|e| SheetSorterError::Store(format!("{}: {}", path.display(), e)))?;
        // バージョンチェック
        if file.version != Self::CURRENT_VERSION {
            return Err(SheetSorterError::Store(format!(
                "{}: バージョン {} は未対応です（対応: {}）",
                path.display(),
                file.version,
                Self::CURRENT_VERSION
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> impl Iterator<Item = &CodeRecord> {
        self.file.records.values()
    }
}

impl CodeStore for JsonCodeStore {
    fn upsert(&mut self, mut record: CodeRecord) -> Result<Upsert> {
        if record.code.trim().is_empty() {
            return Err(SheetSorterError::Store("空のコードは保存できません".into()));
        }
        match self.file.records.get(&record.code) {
            Some(existing) => {
                record.created_at = existing.created_at.clone();
                self.file.records.insert(record.code.clone(), record);
                Ok(Upsert::Updated)
            }
            None => {
                self.file.records.insert(record.code.clone(), record);
                Ok(Upsert::Inserted)
            }
        }
    }

    fn get(&self, code: &str) -> Option<&CodeRecord> {
        self.file.records.get(code)
    }

    fn len(&self) -> usize {
        self.file.records.len()
    }

    fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let writer = BufWriter::new(File::create(&self.path)?);
        serde_json::to_writer_pretty(writer, &self.file)?;
        Ok(())
    }
}
