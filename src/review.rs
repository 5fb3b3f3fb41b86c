//! 対話式カテゴリレビュー
//!
//! 写真フォルダのサイドカーを一覧し、カテゴリを手動で付け替える。

use crate::error::{Result, SheetSorterError};
use crate::scanner::{self, ImageInfo};
use dialoguer::Input;
use sheet_sorter_common::{apply_manual_category, read_sidecar, CategorySidecar, JewelryCategory};
use std::path::Path;
use tracing::warn;

/// レビュー対象の写真1件
#[derive(Debug, Clone)]
pub struct ReviewEntry {
    pub image: ImageInfo,
    pub sidecar: Option<CategorySidecar>,
}

impl ReviewEntry {
    pub fn category(&self) -> JewelryCategory {
        self.sidecar.as_ref().map(|s| s.category).unwrap_or_default()
    }

    /// 自動推定のままで確信度が低い、またはカテゴリ不明
    pub fn needs_attention(&self) -> bool {
        match &self.sidecar {
            Some(s) => !s.is_manual() && (s.category.is_unknown() || s.confidence < 0.6),
            None => true,
        }
    }
}

/// 対話アクション
pub enum ReviewAction {
    /// カテゴリを付け替える
    Set(JewelryCategory),
    /// この写真をそのままにする
    Keep,
    /// 保存済みの変更を残して終了
    Quit,
}

/// 写真フォルダの一覧（連番順）
pub fn list_entries(photos_dir: &Path) -> Result<Vec<ReviewEntry>> {
    let images = scanner::scan_cells(photos_dir)?;
    Ok(images
        .into_iter()
        .map(|image| {
            let sidecar = read_sidecar(&image.path).unwrap_or_else(|e| {
                warn!(file = %image.file_name, error = %e, "サイドカーを読めません");
                None
            });
            ReviewEntry { image, sidecar }
        })
        .collect())
}

/// 1枚のカテゴリを付け替える
pub fn recategorize(image_path: &Path, category: &str) -> Result<CategorySidecar> {
    if !image_path.is_file() {
        return Err(SheetSorterError::FileNotFound(image_path.display().to_string()));
    }
    let category: JewelryCategory = category
        .parse()
        .map_err(|_| SheetSorterError::InvalidCategory(category.to_string()))?;
    Ok(apply_manual_category(image_path, category)?)
}

/// 入力を解釈する（番号・カテゴリ名・s・q）
pub fn parse_action(input: &str) -> Option<ReviewAction> {
    let trimmed = input.trim();
    match trimmed {
        "" | "s" => return Some(ReviewAction::Keep),
        "q" | "Q" => return Some(ReviewAction::Quit),
        _ => {}
    }
    if let Ok(n) = trimmed.parse::<usize>() {
        return JewelryCategory::MANUAL_CHOICES
            .get(n.checked_sub(1)?)
            .map(|c| ReviewAction::Set(*c));
    }
    trimmed.parse::<JewelryCategory>().ok().map(ReviewAction::Set)
}

/// 対話式でレビューする。`only_uncertain` なら要確認の写真だけを出す。
pub fn run_interactive_review(photos_dir: &Path, only_uncertain: bool) -> Result<usize> {
    let entries: Vec<ReviewEntry> = list_entries(photos_dir)?
        .into_iter()
        .filter(|e| !only_uncertain || e.needs_attention())
        .collect();

    if entries.is_empty() {
        println!("✓ レビュー対象の写真はありません");
        return Ok(0);
    }

    println!("🔎 レビュー対象: {}枚", entries.len());
    println!("---");
    for (i, category) in JewelryCategory::MANUAL_CHOICES.iter().enumerate() {
        println!("  {}: {}", i + 1, category.display_name());
    }
    println!("操作: [番号/名前]変更 [Enter/s]そのまま [q]終了");
    println!("---\n");

    let mut changed = 0;
    for (count, entry) in entries.iter().enumerate() {
        match &entry.sidecar {
            Some(s) => println!(
                "[{}/{}] {} → {} ({:.2}, {}) {}",
                count + 1,
                entries.len(),
                entry.image.file_name,
                s.category_display,
                s.confidence,
                s.source,
                s.explanation
            ),
            None => println!(
                "[{}/{}] {} → サイドカーなし",
                count + 1,
                entries.len(),
                entry.image.file_name
            ),
        }

        let action = prompt_action()?;
        match action {
            ReviewAction::Set(category) => {
                apply_manual_category(&entry.image.path, category)?;
                changed += 1;
                println!("  → {}\n", category.display_name());
            }
            ReviewAction::Keep => println!("  → そのまま\n"),
            ReviewAction::Quit => {
                println!("終了します...");
                break;
            }
        }
    }

    println!("\n✓ {}枚を変更しました", changed);
    Ok(changed)
}

fn prompt_action() -> Result<ReviewAction> {
    loop {
        let input: String = Input::new()
            .with_prompt("カテゴリ")
            .allow_empty(true)
            .interact_text()
            .map_err(|e| SheetSorterError::CliExecution(e.to_string()))?;

        match parse_action(&input) {
            Some(action) => return Ok(action),
            None => println!("  不明な入力です: {}", input.trim()),
        }
    }
}
