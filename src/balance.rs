//! コード数と写真数の均衡補正
//!
//! 後段の1対1ペアリングのため、多い側の信頼度が低いセルを反対側へ移す。
//! 破棄セルは数えない。手動分類のセルは母数に含めるが移動対象にはしない。

use crate::classifier::ClassifiedCell;
use serde::Serialize;
use sheet_sorter_common::{CellCategory, DecisionSource};
use tracing::{info, warn};

/// カテゴリ別の件数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryCounts {
    pub code: usize,
    pub photo: usize,
    pub discard: usize,
}

impl CategoryCounts {
    pub fn tally(cells: &[ClassifiedCell]) -> Self {
        let mut counts = Self::default();
        for cell in cells {
            match cell.result.category {
                CellCategory::Code => counts.code += 1,
                CellCategory::Photo => counts.photo += 1,
                CellCategory::Discard => counts.discard += 1,
            }
        }
        counts
    }

    /// 破棄以外の件数
    pub fn population(&self) -> usize {
        self.code + self.photo
    }
}

/// 移動したセル
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlippedCell {
    pub sequence: usize,
    pub file_name: String,
    pub from: CellCategory,
    pub to: CellCategory,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BalanceReport {
    pub before: CategoryCounts,
    pub after: CategoryCounts,
    pub target: usize,
    pub flipped: Vec<FlippedCell>,
    /// 候補不足で移動できなかった件数
    pub residual: usize,
}

impl BalanceReport {
    pub fn is_balanced(&self) -> bool {
        self.after.code == self.after.photo
    }
}

/// 均衡補正を行う
pub fn rebalance(cells: &mut [ClassifiedCell]) -> BalanceReport {
    let before = CategoryCounts::tally(cells);
    let target = before.population() / 2;

    let (surplus_category, surplus, deficit) = if before.code > before.photo {
        (CellCategory::Code, before.code, before.photo)
    } else {
        (CellCategory::Photo, before.photo, before.code)
    };

    if surplus == deficit {
        return BalanceReport {
            before,
            after: before,
            target,
            ..Default::default()
        };
    }

    let needed = (surplus - target).min((surplus - deficit) / 2);

    let mut candidates: Vec<usize> = cells
        .iter()
        .enumerate()
        .filter(|(_, c)| c.result.category == surplus_category && !c.result.is_overridden())
        .map(|(i, _)| i)
        .collect();
    candidates.sort_by(|&a, &b| {
        cells[a]
            .result
            .confidence
            .partial_cmp(&cells[b].result.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(cells[a].sequence.cmp(&cells[b].sequence))
    });

    let to = surplus_category.opposite();
    let mut flipped = Vec::with_capacity(needed);
    for &index in candidates.iter().take(needed) {
        let cell = &mut cells[index];
        let confidence = cell.result.confidence;
        cell.result.category = to;
        cell.result.source = DecisionSource::BalanceCorrection;
        cell.result.reason = format!("balance correction ({} → {}): {}", surplus_category, to, cell.result.reason);
        cell.result.push_step(
            "balance",
            format!("flipped {} → {} (confidence {:.2})", surplus_category, to, confidence),
        );
        if to == CellCategory::Code {
            cell.result.sub_label = None;
        }
        flipped.push(FlippedCell {
            sequence: cell.sequence,
            file_name: cell.file_name.clone(),
            from: surplus_category,
            to,
            confidence,
        });
    }

    let residual = needed - flipped.len();
    if residual > 0 {
        warn!(
            needed,
            flipped = flipped.len(),
            "手動分類が多く均衡補正しきれませんでした"
        );
    }

    let after = CategoryCounts::tally(cells);
    info!(
        code_before = before.code,
        photo_before = before.photo,
        code_after = after.code,
        photo_after = after.photo,
        flipped = flipped.len(),
        "均衡補正"
    );

    BalanceReport {
        before,
        after,
        target,
        flipped,
        residual,
    }
}
