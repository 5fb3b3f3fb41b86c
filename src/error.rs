use thiserror::Error;

#[derive(Error, Debug)]
pub enum SheetSorterError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("フォルダが見つかりません: {0}")]
    FolderNotFound(String),

    #[error("画像が見つかりません: {0}")]
    NoImagesFound(String),

    #[error("画像デコードエラー: {0}")]
    Decode(String),

    #[error("画像書き込みエラー: {0}")]
    ImageWrite(String),

    #[error("OCRエラー: {0}")]
    Ocr(String),

    #[error("手動分類ファイルが不正: {0}")]
    InvalidOverride(String),

    #[error("不明なカテゴリ: {0}")]
    InvalidCategory(String),

    #[error("コードストアエラー: {0}")]
    Store(String),

    #[error("CLI実行エラー: {0}")]
    CliExecution(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] sheet_sorter_common::Error),
}

pub type Result<T> = std::result::Result<T, SheetSorterError>;
