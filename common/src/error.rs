//! エラー型定義

use thiserror::Error;

/// 共通エラー型
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Sidecar error: {0}")]
    Sidecar(String),

    #[error("Unknown category: {0}")]
    InvalidCategory(String),
}

/// Result型エイリアス
pub type Result<T> = std::result::Result<T, Error>;
