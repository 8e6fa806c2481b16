//! End-to-end scan of one still image: preprocess, anchors, geometry,
//! rectification and bubble reading.

use std::panic::{catch_unwind, AssertUnwindSafe};

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::anchor::{
    AnchorDetectionResult, AnchorDetector, AnchorParams, DetectedAnchor, GeometryParams,
    GeometryValidator, GeometryVerdict, DEFAULT_REQUIRED_STABLE_FRAMES,
};
use crate::bubble::{
    decode_enrollment, BubbleAnalysis, BubbleAnalyzer, BubbleParams, EnrollmentReading,
    QuestionReading,
};
use crate::core::{
    preprocess, rectify_sheet, FrameError, GrayImage, GrayImageView, PreprocessParams,
    RectifiedSheet, RectifyParams, Template,
};
use crate::error::ScanError;
use crate::grade::{
    AnswerKey, DetectedAnswers, EvaluationResult, Evaluator, GradeError, MarkingScheme,
};

/// Parameters for every stage of the scan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanParams {
    pub preprocess: PreprocessParams,
    pub anchor: AnchorParams,
    pub geometry: GeometryParams,
    pub rectify: RectifyParams,
    pub bubble: BubbleParams,
    /// Consecutive well-aligned preview frames before auto-capture.
    pub required_stable_frames: usize,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            preprocess: PreprocessParams::default(),
            anchor: AnchorParams::default(),
            geometry: GeometryParams::default(),
            rectify: RectifyParams::default(),
            bubble: BubbleParams::default(),
            required_stable_frames: DEFAULT_REQUIRED_STABLE_FRAMES,
        }
    }
}

/// Scanner bound to one template.
pub struct OmrScanner {
    template: Template,
    params: ScanParams,
    detector: AnchorDetector,
    validator: GeometryValidator,
    analyzer: BubbleAnalyzer,
}

impl OmrScanner {
    pub fn new(template: Template, params: ScanParams) -> Self {
        let detector = AnchorDetector::new(params.anchor.clone());
        let validator =
            GeometryValidator::new(params.geometry.clone()).with_reference(&template.anchors.points());
        let analyzer = BubbleAnalyzer::new(params.bubble.clone());
        Self {
            template,
            params,
            detector,
            validator,
            analyzer,
        }
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn params(&self) -> &ScanParams {
        &self.params
    }

    /// Denoise and optionally equalize a frame before detection.
    pub fn prepare(&self, image: &GrayImageView<'_>) -> GrayImage {
        preprocess(image, &self.params.preprocess)
    }

    pub fn detect_anchors(&self, image: &GrayImageView<'_>) -> AnchorDetectionResult {
        self.detector.detect_for_template(image, &self.template)
    }

    pub fn validate_geometry(&self, points: &[Point2<f32>; 4]) -> GeometryVerdict {
        self.validator.validate(points)
    }

    pub fn rectify(
        &self,
        image: &GrayImageView<'_>,
        points: &[Point2<f32>; 4],
    ) -> Result<RectifiedSheet, ScanError> {
        Ok(rectify_sheet(
            image,
            points,
            &self.template,
            &self.params.rectify,
        )?)
    }

    /// Read every question on an already rectified sheet.
    pub fn analyze_bubbles(&self, sheet: &GrayImageView<'_>) -> BubbleAnalysis {
        self.analyzer.analyze(sheet, &self.template)
    }

    /// Run the full pipeline on one upright grayscale image.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, image), fields(w = image.width, h = image.height))
    )]
    pub fn scan(&self, image: &GrayImageView<'_>) -> Result<SheetScan, ScanError> {
        check_frame(image)?;

        let prepared = self.prepare(image);
        let view = prepared.view();

        let anchors = self.detect_anchors(&view);
        let Some(points) = anchors.points() else {
            let missing = anchors.missing();
            log::info!("scan stopped: {}/4 anchors", anchors.count());
            return Err(ScanError::AnchorsMissing {
                found: anchors.count(),
                missing,
            });
        };

        let verdict = self.validate_geometry(&points);
        if let Some(rejection) = verdict.rejection {
            log::info!("scan stopped: {rejection}");
            return Err(ScanError::SheetCurved(rejection));
        }

        let sheet = self.rectify(&view, &points)?;
        let bubbles = self.analyze_bubbles(&sheet.view());
        let enrollment = self.template.enrollment_grid.as_ref().map(|grid| {
            decode_enrollment(&sheet.view(), grid, &self.params.bubble, bubbles.baseline)
        });

        log::debug!(
            "scan complete: {} answered, {} flagged",
            bubbles.detected_answers().values().filter(|s| !s.is_empty()).count(),
            bubbles.flagged_questions().len()
        );

        Ok(SheetScan {
            template_name: self.template.name.clone(),
            total_questions: self.template.total_questions(),
            anchors,
            verdict,
            sheet,
            bubbles,
            enrollment,
        })
    }

    /// [`OmrScanner::scan`] with panics turned into [`ScanError::Internal`].
    pub fn scan_guarded(&self, image: &GrayImageView<'_>) -> Result<SheetScan, ScanError> {
        match catch_unwind(AssertUnwindSafe(|| self.scan(image))) {
            Ok(result) => result,
            Err(payload) => {
                let msg = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "scan panicked".to_string());
                log::error!("scan panicked: {msg}");
                Err(ScanError::Internal(msg))
            }
        }
    }
}

/// Reject views whose buffer cannot hold `width * height` pixels.
pub(crate) fn check_frame(image: &GrayImageView<'_>) -> Result<(), FrameError> {
    let needed = image.width.checked_mul(image.height);
    match needed {
        Some(n) if n > 0 && image.data.len() >= n => Ok(()),
        _ => Err(FrameError::Unreadable {
            width: image.width,
            height: image.height,
            len: image.data.len(),
        }),
    }
}

/// Everything a successful scan produced.
#[derive(Clone, Debug)]
pub struct SheetScan {
    pub template_name: Option<String>,
    pub total_questions: usize,
    pub anchors: AnchorDetectionResult,
    pub verdict: GeometryVerdict,
    pub sheet: RectifiedSheet,
    pub bubbles: BubbleAnalysis,
    pub enrollment: Option<EnrollmentReading>,
}

impl SheetScan {
    pub fn detected_answers(&self) -> DetectedAnswers {
        self.bubbles.detected_answers()
    }

    /// Summary without grading.
    pub fn report(&self) -> SheetReport {
        SheetReport {
            template_name: self.template_name.clone(),
            total_questions: self.total_questions,
            anchors: self.anchors.anchors.clone(),
            alignment_score: self.verdict.score,
            baseline: self.bubbles.baseline,
            detected_answers: self.detected_answers(),
            flagged_questions: self.bubbles.flagged_questions(),
            readings: self.bubbles.questions.clone(),
            enrollment: self.enrollment.clone(),
            evaluation: None,
        }
    }

    /// Grade with the default grade bands and passing percentage.
    pub fn evaluate(
        &self,
        key: &AnswerKey,
        scheme: &MarkingScheme,
    ) -> Result<SheetReport, GradeError> {
        let evaluator = Evaluator::new(self.total_questions, *scheme)?;
        Ok(self.evaluate_with(&evaluator, key))
    }

    pub fn evaluate_with(&self, evaluator: &Evaluator, key: &AnswerKey) -> SheetReport {
        let mut report = self.report();
        report.evaluation = Some(evaluator.evaluate(&report.detected_answers, key));
        report
    }
}

/// Serialisable outcome of one scanned sheet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SheetReport {
    pub template_name: Option<String>,
    pub total_questions: usize,
    pub anchors: Vec<DetectedAnchor>,
    pub alignment_score: f32,
    /// Paper brightness the fills were measured against.
    pub baseline: f32,
    pub detected_answers: DetectedAnswers,
    pub flagged_questions: Vec<usize>,
    pub readings: Vec<QuestionReading>,
    pub enrollment: Option<EnrollmentReading>,
    pub evaluation: Option<EvaluationResult>,
}
