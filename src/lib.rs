//! ジュエリーカタログ台紙のセル抽出・分類

pub mod balance;
pub mod blank;
pub mod category;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod detector;
pub mod error;
pub mod imaging;
pub mod measurement;
pub mod ocr;
pub mod pairing;
pub mod partition;
pub mod pipeline;
pub mod review;
pub mod scanner;
pub mod visual;
