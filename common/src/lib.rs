//! Sheet Sorter Common Library
//!
//! パイプライン本体とレビュー・ペアリング側で共有される型とサイドカー入出力

pub mod error;
pub mod sidecar;
pub mod types;

pub use error::{Error, Result};
pub use sidecar::{
    apply_manual_category, read_sidecar, sidecar_path, write_sidecar, CategorySidecar,
    SOURCE_AUTOMATIC, SOURCE_MANUAL,
};
pub use types::{
    AnalysisStep, CategoryLabel, CellCategory, ClassificationResult, ConfidenceTier,
    DecisionSource, FeatureSnapshot, JewelryCategory,
};
