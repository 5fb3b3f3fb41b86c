//! セル分類
//!
//! 1セルについて空判定 → 見た目 → OCR → 計測値フィルタ → コード判定の順に証拠を集め、
//! 名前付きの判定規則を上から評価して最初に成立したものを採用する。
//!
//! 規則の順序:
//! 1. `manual_override` 手動分類（ヒューリスティックは実行しない）
//! 2. `blank` 空セル → discard
//! 3. `measurement_only` 計測値だけのテキスト → discard
//! 4. `visual_veto` 見た目が写真 → photo（コードらしいテキストより優先）
//! 5. `code_text` コードとして成立 → code（複雑な見た目なら photo）
//! 6. `default_photo` 使えるテキストなし → photo

pub mod overrides;

pub use overrides::ManualOverrides;

use crate::blank::{self, BlankVerdict};
use crate::category::{self, features};
use crate::config::{Config, ScoringConfig};
use crate::detector::BoundingBox;
use crate::imaging::{self, InkProfile};
use crate::measurement::{self, MeasurementVerdict};
use crate::ocr::code_rules::{self, CodeVerdict};
use crate::ocr::engine::TextRecognizer;
use crate::ocr::{detect_silhouette, TextExtraction, TextExtractor};
use crate::visual::{self, VisualAssessment, VisualEvidence};
use image::{DynamicImage, GrayImage};
use serde::Serialize;
use sheet_sorter_common::{CategoryLabel, CellCategory, ClassificationResult, DecisionSource};
use tracing::debug;

/// セル1枚から集めた証拠（空セルなら OCR 以降は空）
#[derive(Debug, Clone, Serialize)]
pub struct CellEvidence {
    pub blank: BlankVerdict,
    pub visual: Option<VisualAssessment>,
    pub text: Option<TextExtraction>,
    pub measurement: Option<MeasurementVerdict>,
    pub code: Option<CodeVerdict>,
    #[serde(skip)]
    pub profile: Option<InkProfile>,
}

impl CellEvidence {
    fn visual_evidence(&self) -> Option<&VisualEvidence> {
        self.visual.as_ref().map(|v| &v.evidence)
    }

    fn text(&self) -> &str {
        self.text.as_ref().map(|t| t.text.as_str()).unwrap_or_default()
    }
}

/// 分類済みのセル
#[derive(Debug, Clone)]
pub struct ClassifiedCell {
    pub sequence: usize,
    pub file_name: String,
    /// 台紙から切り出した場合の位置
    pub bbox: Option<BoundingBox>,
    pub image: DynamicImage,
    pub result: ClassificationResult,
    pub evidence: Option<CellEvidence>,
}

struct Decision {
    category: CellCategory,
    reason: String,
}

impl Decision {
    fn new(category: CellCategory, reason: impl Into<String>) -> Option<Self> {
        Some(Self {
            category,
            reason: reason.into(),
        })
    }
}

type DecisionRule = fn(&CellEvidence, &Config) -> Option<Decision>;

const DECISION_RULES: &[(&str, DecisionRule)] = &[
    ("blank", |e, _| {
        if e.blank.is_blank {
            Decision::new(CellCategory::Discard, format!("blank cell: {}", e.blank.summary()))
        } else {
            None
        }
    }),
    ("measurement_only", |e, _| {
        let verdict = e.measurement.as_ref().filter(|m| m.is_measurement_only)?;
        let mut reason = format!("{}: '{}'", verdict.kind, verdict.original_text);
        if verdict.corrected_text != verdict.original_text {
            reason.push_str(&format!(" (OCR correction: '{}')", verdict.corrected_text));
        }
        Decision::new(CellCategory::Discard, reason)
    }),
    ("visual_veto", |e, _| {
        let visual = e.visual.as_ref().filter(|v| v.is_photo)?;
        let reason = match e.code.as_ref().filter(|c| c.is_code) {
            Some(code) => format!(
                "photo-like cell overrides code text '{}': {}",
                code.stats.alnum,
                visual.summary()
            ),
            None => format!("photo-like cell: {}", visual.summary()),
        };
        Decision::new(CellCategory::Photo, reason)
    }),
    ("code_text", |e, config| {
        let code = e.code.as_ref().filter(|c| c.is_code)?;
        match e.visual_evidence() {
            Some(v) if visual::is_complex(v, &config.visual) => Decision::new(
                CellCategory::Photo,
                format!(
                    "code text '{}' rejected by visual complexity (ink {:.1}%, {} contours)",
                    code.stats.alnum,
                    v.ink_ratio * 100.0,
                    v.contours
                ),
            ),
            _ => Decision::new(CellCategory::Code, format!("product code '{}'", code.stats.alnum)),
        }
    }),
    ("default_photo", |e, _| {
        let reason = if e.text().trim().is_empty() {
            "no text found".to_string()
        } else {
            format!("text '{}' is not a product code", e.text().trim())
        };
        Decision::new(CellCategory::Photo, reason)
    }),
];

/// 写真・コードの信頼度を計算する
pub fn score_confidence(category: CellCategory, visual: Option<&VisualEvidence>, scoring: &ScoringConfig) -> f64 {
    let mut confidence = scoring.base;
    if let Some(v) = visual {
        match category {
            CellCategory::Code => {
                if v.ink_ratio > scoring.code_busy_ratio || v.contours > scoring.code_busy_contours {
                    confidence -= scoring.code_busy_penalty;
                }
                if v.largest_vertices > scoring.code_shape_vertices {
                    confidence -= scoring.code_shape_penalty;
                }
            }
            CellCategory::Photo => {
                if v.ink_ratio > scoring.photo_busy_ratio || v.contours > scoring.photo_busy_contours {
                    confidence += scoring.photo_busy_bonus;
                }
            }
            CellCategory::Discard => {}
        }
    }
    confidence.clamp(scoring.min, scoring.max)
}

/// 判定規則を評価する
pub fn decide(evidence: &CellEvidence, config: &Config) -> ClassificationResult {
    let (rule, decision) = DECISION_RULES
        .iter()
        .find_map(|(name, rule)| rule(evidence, config).map(|d| (*name, d)))
        .unwrap_or((
            "default_photo",
            Decision {
                category: CellCategory::Photo,
                reason: "no evidence".into(),
            },
        ));

    let confidence = match rule {
        "blank" => config.scoring.blank,
        "measurement_only" => config.scoring.measurement,
        _ => score_confidence(decision.category, evidence.visual_evidence(), &config.scoring),
    };

    let mut result = ClassificationResult::new(decision.category, confidence, decision.reason);
    result.push_step("blank", evidence.blank.summary());
    if let Some(visual) = &evidence.visual {
        result.push_step("visual", visual.summary());
    }
    if let Some(text) = &evidence.text {
        let outcome = match text.method {
            Some(method) if !text.is_empty() => format!("'{}' via {}", text.text, method.name()),
            _ if text.failures.is_empty() => "no text".to_string(),
            _ => format!("no text ({})", text.failures.join("; ")),
        };
        result.push_step("text", outcome);
    }
    if let Some(measurement) = &evidence.measurement {
        result.push_step("measurement", measurement.summary());
    }
    if let Some(code) = &evidence.code {
        result.push_step("code", code.summary());
    }
    result.push_step("decision", rule);
    result
}

/// セル分類器
pub struct Classifier<'a> {
    config: &'a Config,
    extractor: TextExtractor<'a>,
}

impl<'a> Classifier<'a> {
    pub fn new(config: &'a Config, recognizer: &'a dyn TextRecognizer) -> Self {
        Self {
            config,
            extractor: TextExtractor::new(recognizer, &config.text),
        }
    }

    /// 枠線を除いた解析用グレースケール
    fn analysis_view(&self, image: &DynamicImage) -> GrayImage {
        imaging::to_gray(&imaging::inset(image, self.config.analysis_inset))
    }

    /// 証拠を集める。空セルなら OCR は行わない。
    pub fn gather(&self, image: &DynamicImage) -> CellEvidence {
        let gray = self.analysis_view(image);
        let epsilon = self.config.detector.epsilon_ratio;

        let blank = blank::assess(&gray, &self.config.blank, epsilon);
        if blank.is_blank {
            return CellEvidence {
                blank,
                visual: None,
                text: None,
                measurement: None,
                code: None,
                profile: None,
            };
        }

        let profile = visual::measure(&gray, &self.config.visual);
        let assessment = visual::assess(&gray, &profile, &self.config.visual, epsilon);
        let silhouette = detect_silhouette(&profile, &self.config.text);
        let text = self.extractor.extract(&gray, silhouette);

        let (measurement, code) = if text.is_empty() {
            (None, None)
        } else {
            (
                Some(measurement::check_text(&text.text)),
                Some(code_rules::evaluate(&text.text, text.min_chars, &self.config.text)),
            )
        };

        CellEvidence {
            blank,
            visual: Some(assessment),
            text: Some(text),
            measurement,
            code,
            profile: Some(profile),
        }
    }

    /// 1セルを分類する。`forced` があれば手動分類として確定する。
    pub fn classify(
        &self,
        image: &DynamicImage,
        forced: Option<CellCategory>,
    ) -> (ClassificationResult, Option<CellEvidence>) {
        if let Some(category) = forced {
            let mut result = ClassificationResult::new(category, 1.0, "manual override");
            result.source = DecisionSource::ManualOverride;
            result.push_step("manual_override", category.as_str());
            return (result, None);
        }

        let evidence = self.gather(image);
        let result = decide(&evidence, self.config);
        debug!(
            category = %result.category,
            confidence = result.confidence,
            reason = %result.reason,
            "セル分類"
        );
        (result, Some(evidence))
    }

    /// 写真セルのジュエリーカテゴリを推定する
    pub fn label_photo(&self, image: &DynamicImage, evidence: Option<&CellEvidence>) -> CategoryLabel {
        let cached = evidence.and_then(|e| Some((e.profile.as_ref()?, e.visual_evidence()?, e.text())));
        let shape = match cached {
            Some((profile, visual_evidence, text)) => {
                features::extract(profile, visual_evidence, text, &self.config.category)
            }
            None => {
                let gray = self.analysis_view(image);
                let profile = visual::measure(&gray, &self.config.visual);
                let assessment = visual::assess(
                    &gray,
                    &profile,
                    &self.config.visual,
                    self.config.detector.epsilon_ratio,
                );
                features::extract(&profile, &assessment.evidence, "", &self.config.category)
            }
        };
        category::infer(&shape, &self.config.category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, SheetSorterError};
    use image::{GrayImage, Luma};

    struct Fixed(&'static str);

    impl TextRecognizer for Fixed {
        fn recognize(&self, _image: &GrayImage) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct Failing;

    impl TextRecognizer for Failing {
        fn recognize(&self, _image: &GrayImage) -> Result<String> {
            Err(SheetSorterError::Ocr("not installed".into()))
        }
    }

    fn white() -> GrayImage {
        GrayImage::from_pixel(100, 80, Luma([255]))
    }

    /// 小さな印字（見た目は写真ではない）
    fn printed_marks() -> DynamicImage {
        let mut img = white();
        for i in 0..2u32 {
            for y in 36..42 {
                for x in (30 + i * 24)..(38 + i * 24) {
                    img.put_pixel(x, y, Luma([0]));
                }
            }
        }
        DynamicImage::ImageLuma8(img)
    }

    fn disk() -> DynamicImage {
        let mut img = white();
        for y in 0..80i32 {
            for x in 0..100i32 {
                if (x - 50).pow(2) + (y - 40).pow(2) <= 25 * 25 {
                    img.put_pixel(x as u32, y as u32, Luma([30]));
                }
            }
        }
        DynamicImage::ImageLuma8(img)
    }

    fn classify_with(recognizer: &dyn TextRecognizer, image: &DynamicImage) -> ClassificationResult {
        let config = Config::default();
        Classifier::new(&config, recognizer).classify(image, None).0
    }

    fn decided_by(result: &ClassificationResult) -> &str {
        result
            .steps
            .iter()
            .find(|s| s.stage == "decision")
            .map(|s| s.outcome.as_str())
            .unwrap_or_default()
    }

    #[test]
    fn test_blank_cell_is_discarded_without_ocr() {
        let config = Config::default();
        let classifier = Classifier::new(&config, &Failing);
        let (result, evidence) = classifier.classify(&DynamicImage::ImageLuma8(white()), None);

        assert_eq!(result.category, CellCategory::Discard);
        assert!((result.confidence - 0.9).abs() < 1e-9);
        assert_eq!(decided_by(&result), "blank");
        assert!(evidence.unwrap().text.is_none());
    }

    #[test]
    fn test_code_text_is_code() {
        let result = classify_with(&Fixed("c1004290512"), &printed_marks());
        assert_eq!(result.category, CellCategory::Code, "{:?}", result);
        assert_eq!(decided_by(&result), "code_text");
        assert!((result.confidence - 0.8).abs() < 1e-9);
        assert!(result.reason.contains("c1004290512"));
    }

    #[test]
    fn test_measurement_is_discarded_with_correction() {
        let result = classify_with(&Fixed("6. llg"), &printed_marks());
        assert_eq!(result.category, CellCategory::Discard);
        assert!((result.confidence - 0.98).abs() < 1e-9);
        assert_eq!(decided_by(&result), "measurement_only");
        assert!(result.reason.contains("6. 11g"), "{}", result.reason);
    }

    #[test]
    fn test_photo_vetoes_text() {
        let result = classify_with(&Fixed("c1004290512"), &disk());
        assert_eq!(result.category, CellCategory::Photo);
        assert_eq!(decided_by(&result), "visual_veto");
        assert!((result.confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_ocr_failure_is_no_evidence() {
        let result = classify_with(&Failing, &printed_marks());
        assert_eq!(result.category, CellCategory::Photo);
        assert_eq!(decided_by(&result), "default_photo");
        let text_step = result.steps.iter().find(|s| s.stage == "text").unwrap();
        assert!(text_step.outcome.contains("not installed"));
    }

    #[test]
    fn test_forced_category_skips_heuristics() {
        let config = Config::default();
        let classifier = Classifier::new(&config, &Failing);
        let (result, evidence) =
            classifier.classify(&DynamicImage::ImageLuma8(white()), Some(CellCategory::Code));

        assert_eq!(result.category, CellCategory::Code);
        assert_eq!(result.confidence, 1.0);
        assert!(result.is_overridden());
        assert!(evidence.is_none());
    }

    #[test]
    fn test_confidence_adjustments() {
        let scoring = ScoringConfig::default();
        let busy = VisualEvidence {
            ink_ratio: 0.18,
            contours: 3,
            largest_vertices: 9,
            ..Default::default()
        };
        let code = score_confidence(CellCategory::Code, Some(&busy), &scoring);
        assert!((code - 0.3).abs() < 1e-9);
        let photo = score_confidence(CellCategory::Photo, Some(&busy), &scoring);
        assert!((photo - 0.9).abs() < 1e-9);

        let quiet = VisualEvidence::default();
        assert!((score_confidence(CellCategory::Code, Some(&quiet), &scoring) - 0.8).abs() < 1e-9);
        assert!((score_confidence(CellCategory::Photo, None, &scoring) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_label_photo_without_evidence() {
        let config = Config::default();
        let classifier = Classifier::new(&config, &Failing);
        let label = classifier.label_photo(&disk(), None);
        assert_eq!(label.category, sheet_sorter_common::JewelryCategory::Anillos, "{:?}", label);
    }
}
