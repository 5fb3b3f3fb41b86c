//! 手動分類
//!
//! JSON ファイルで与えるセル → カテゴリの対応表。キーはファイル名・拡張子なしの名前・
//! 連番のいずれか。`<台紙名>/` を前置すると、その台紙だけに効く。
//!
//! ```json
//! { "rect_3.png": "code", "rect_7": "photo", "sheet_a/12": "discard" }
//! ```

use crate::error::{Result, SheetSorterError};
use sheet_sorter_common::CellCategory;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct ManualOverrides {
    entries: HashMap<String, CellCategory>,
}

impl ManualOverrides {
    /// JSON ファイルから読み込む
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SheetSorterError::FileNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let raw: BTreeMap<String, String> = serde_json::from_str(content)
            .map_err(|e| SheetSorterError::InvalidOverride(e.to_string()))?;

        let mut entries = HashMap::with_capacity(raw.len());
        for (key, value) in raw {
            let category = value.parse::<CellCategory>().map_err(|_| {
                SheetSorterError::InvalidOverride(format!("{}: '{}' は code/photo/discard ではありません", key, value))
            })?;
            let key = key.trim().to_string();
            if key.is_empty() {
                return Err(SheetSorterError::InvalidOverride("空のキー".into()));
            }
            entries.insert(key, category);
        }
        Ok(Self { entries })
    }

    pub fn from_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, CellCategory)>,
        K: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(|(k, c)| (k.into(), c)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// セルに対する手動分類を探す。台紙付きのキーを優先する。
    pub fn lookup(&self, scope: Option<&str>, file_name: &str, sequence: usize) -> Option<CellCategory> {
        if self.entries.is_empty() {
            return None;
        }
        let stem = Path::new(file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file_name);
        let keys = [file_name.to_string(), stem.to_string(), sequence.to_string()];

        if let Some(scope) = scope {
            for key in &keys {
                if let Some(category) = self.entries.get(&format!("{}/{}", scope, key)) {
                    return Some(*category);
                }
            }
        }
        keys.iter().find_map(|key| self.entries.get(key).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_lookup_by_any_key() {
        let overrides = ManualOverrides::from_json(
            r#"{"rect_3.png": "code", "rect_7": "photo", "12": "discard"}"#,
        )
        .unwrap();
        assert_eq!(overrides.len(), 3);
        assert_eq!(overrides.lookup(None, "rect_3.png", 3), Some(CellCategory::Code));
        assert_eq!(overrides.lookup(None, "rect_7.png", 7), Some(CellCategory::Photo));
        assert_eq!(overrides.lookup(None, "rect_12.png", 12), Some(CellCategory::Discard));
        assert_eq!(overrides.lookup(None, "rect_4.png", 4), None);
    }

    #[test]
    fn test_scoped_key_wins() {
        let overrides = ManualOverrides::from_entries([
            ("rect_1", CellCategory::Photo),
            ("sheet_a/rect_1", CellCategory::Code),
        ]);
        assert_eq!(overrides.lookup(Some("sheet_a"), "rect_1.png", 1), Some(CellCategory::Code));
        assert_eq!(overrides.lookup(Some("sheet_b"), "rect_1.png", 1), Some(CellCategory::Photo));
    }

    #[test]
    fn test_invalid_category_rejected() {
        let result = ManualOverrides::from_json(r#"{"rect_1": "maybe"}"#);
        assert!(matches!(result, Err(SheetSorterError::InvalidOverride(_))));

        let result = ManualOverrides::from_json("[1, 2]");
        assert!(matches!(result, Err(SheetSorterError::InvalidOverride(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let result = ManualOverrides::load(&dir.path().join("none.json"));
        assert!(matches!(result, Err(SheetSorterError::FileNotFound(_))));
    }
}
