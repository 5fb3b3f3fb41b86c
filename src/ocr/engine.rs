//! OCRエンジン
//!
//! 認識処理は `TextRecognizer` で抽象化し、既定実装として Tesseract CLI を呼び出す。
//! テストでは決定的なスタブに差し替える。

use crate::config::TesseractConfig;
use crate::error::{Result, SheetSorterError};
use image::GrayImage;
use std::process::Command;
use tempfile::NamedTempFile;

/// 画像1枚から文字列を読み取る
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, image: &GrayImage) -> Result<String>;

    fn name(&self) -> &str {
        "recognizer"
    }
}

/// Tesseract CLI を子プロセスで呼び出す
#[derive(Debug, Clone)]
pub struct TesseractCli {
    config: TesseractConfig,
}

impl TesseractCli {
    pub fn new(config: TesseractConfig) -> Self {
        Self { config }
    }

    /// 実行ファイルが起動できるか確認
    pub fn check_available(&self) -> Result<String> {
        let output = Command::new(&self.config.executable)
            .arg("--version")
            .output()
            .map_err(|e| {
                SheetSorterError::Ocr(format!("{} を起動できません: {}", self.config.executable, e))
            })?;
        let text = String::from_utf8_lossy(&output.stdout);
        let version = if text.trim().is_empty() {
            String::from_utf8_lossy(&output.stderr).to_string()
        } else {
            text.to_string()
        };
        Ok(version.lines().next().unwrap_or_default().trim().to_string())
    }
}

impl TextRecognizer for TesseractCli {
    fn recognize(&self, image: &GrayImage) -> Result<String> {
        // 一時ファイルに保存して渡す
        let temp_input = NamedTempFile::with_suffix(".png")?;
        image
            .save(temp_input.path())
            .map_err(|e| SheetSorterError::ImageWrite(e.to_string()))?;

        let output = Command::new(&self.config.executable)
            .arg(temp_input.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.config.language)
            .arg("--psm")
            .arg(self.config.psm.to_string())
            .arg("-c")
            .arg(format!("tessedit_char_whitelist={}", self.config.whitelist))
            .output()
            .map_err(|e| SheetSorterError::Ocr(format!("Tesseract起動失敗: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SheetSorterError::Ocr(format!("Tesseract failed: {}", stderr.trim())));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn name(&self) -> &str {
        "tesseract"
    }
}
