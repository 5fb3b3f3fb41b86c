//! OCRテキストの補正と正規化

use regex::Regex;

/// OCR の取り違え補正（小文字 `ll` → `11`）。
///
/// `ll` を含む場合のみ全体を小文字化して置換する。それ以外は入力のまま。
pub fn correct_ocr_confusions(text: &str) -> String {
    let lower = text.to_lowercase();
    if lower.contains("ll") {
        lower.replace("ll", "11")
    } else {
        text.to_string()
    }
}

/// 大文字化・数字まわりの空白除去・小数点の統一
pub fn clean(text: &str) -> String {
    lazy_static::lazy_static! {
        // 数字と単位の間の空白: "6 G" → "6G"
        static ref DIGIT_UNIT_RE: Regex = Regex::new(r"(\d)\s+([A-Z])").unwrap();
        // 小数点まわりの空白: "6. 11" → "6.11"
        static ref DECIMAL_RE: Regex = Regex::new(r"(\d)\s*\.\s*(\d)").unwrap();
        static ref SPACE_RE: Regex = Regex::new(r"\s+").unwrap();
    }

    let upper = text.to_uppercase();
    let joined = DIGIT_UNIT_RE.replace_all(&upper, "${1}${2}");
    let decimals = DECIMAL_RE.replace_all(&joined, "${1}.${2}");
    let compact = SPACE_RE.replace_all(&decimals, "");
    compact.replace(',', ".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correct_double_l() {
        assert_eq!(correct_ocr_confusions("6. llg"), "6. 11g");
        assert_eq!(correct_ocr_confusions("6.LLG"), "6.11g");
        assert_eq!(correct_ocr_confusions("TTS4821X"), "TTS4821X");
    }

    #[test]
    fn test_clean() {
        assert_eq!(clean("6. 11g"), "6.11G");
        assert_eq!(clean("6 g"), "6G");
        assert_eq!(clean("6,11 gr"), "6.11GR");
        assert_eq!(clean(" c1004290512 "), "C1004290512");
    }
}
