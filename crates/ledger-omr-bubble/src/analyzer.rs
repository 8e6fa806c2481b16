use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;
#[cfg(feature = "tracing")]
use tracing::instrument;

use ledger_omr_core::threshold::median_intensity;
use ledger_omr_core::{GrayImageView, OptionBox, Question, Template};

use crate::params::{Baseline, BubbleParams};
use crate::sample::{disc_fill, ring_median};

/// One marked option. Indices are 0-based.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BubbleResult {
    pub question: usize,
    pub option: usize,
    /// Fill fraction of the bubble, in `[0, 1]`.
    pub confidence: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "option", rename_all = "snake_case")]
pub enum MarkState {
    Unanswered,
    Single(usize),
    Multiple,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuestionReading {
    pub question: usize,
    /// Fill fraction per option.
    pub fills: Vec<f32>,
    pub marks: Vec<BubbleResult>,
    pub state: MarkState,
    /// Top fill minus runner-up fill.
    pub confidence: f32,
    pub needs_review: bool,
}

impl QuestionReading {
    pub fn selected(&self) -> Vec<usize> {
        self.marks.iter().map(|m| m.option).collect()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BubbleAnalysis {
    /// Sheet-wide median intensity.
    pub baseline: f32,
    /// One reading per template question, in index order.
    pub questions: Vec<QuestionReading>,
}

impl BubbleAnalysis {
    pub fn marks_by_question(&self) -> BTreeMap<usize, Vec<BubbleResult>> {
        self.questions
            .iter()
            .map(|q| (q.question, q.marks.clone()))
            .collect()
    }

    /// Selected options per question; unanswered questions map to an empty list.
    pub fn detected_answers(&self) -> BTreeMap<usize, Vec<usize>> {
        self.questions
            .iter()
            .map(|q| (q.question, q.selected()))
            .collect()
    }

    pub fn flagged_questions(&self) -> Vec<usize> {
        self.questions
            .iter()
            .filter(|q| q.needs_review)
            .map(|q| q.question)
            .collect()
    }
}

/// Reads bubble fill on a rectified sheet.
pub struct BubbleAnalyzer {
    params: BubbleParams,
}

impl BubbleAnalyzer {
    pub fn new(params: BubbleParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &BubbleParams {
        &self.params
    }

    /// Sheet-wide reference brightness; white when the sheet is empty.
    pub fn global_baseline(&self, sheet: &GrayImageView<'_>) -> f32 {
        median_intensity(sheet).map(f32::from).unwrap_or(255.0)
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, sheet, template), fields(questions = template.total_questions()))
    )]
    pub fn analyze(&self, sheet: &GrayImageView<'_>, template: &Template) -> BubbleAnalysis {
        let baseline = self.global_baseline(sheet);
        log::debug!(
            "reading {} questions, baseline {:.0}",
            template.total_questions(),
            baseline
        );

        #[cfg(feature = "parallel")]
        let questions: Vec<QuestionReading> = template
            .questions
            .par_iter()
            .enumerate()
            .map(|(index, q)| self.read_question(sheet, index, q, baseline))
            .collect();
        #[cfg(not(feature = "parallel"))]
        let questions: Vec<QuestionReading> = template
            .questions
            .iter()
            .enumerate()
            .map(|(index, q)| self.read_question(sheet, index, q, baseline))
            .collect();

        let flagged = questions.iter().filter(|q| q.needs_review).count();
        if flagged > 0 {
            log::info!("{flagged} question(s) flagged for review");
        }

        BubbleAnalysis {
            baseline,
            questions,
        }
    }

    /// Fill fractions for a group of bubbles against a sheet baseline.
    pub fn fills(&self, sheet: &GrayImageView<'_>, bubbles: &[OptionBox], baseline: f32) -> Vec<f32> {
        bubbles
            .iter()
            .map(|b| {
                let reference = match self.params.baseline {
                    Baseline::GlobalMedian => baseline,
                    Baseline::LocalRing => ring_median(
                        sheet,
                        b,
                        self.params.ring_inner_frac,
                        self.params.ring_outer_frac,
                    )
                    .map(f32::from)
                    .unwrap_or(baseline),
                };
                disc_fill(
                    sheet,
                    b,
                    self.params.sample_radius_frac,
                    reference * self.params.dark_ratio,
                )
            })
            .collect()
    }

    fn read_question(
        &self,
        sheet: &GrayImageView<'_>,
        index: usize,
        question: &Question,
        baseline: f32,
    ) -> QuestionReading {
        let fills = self.fills(sheet, &question.options, baseline);
        let p = &self.params;

        let marks: Vec<BubbleResult> = fills
            .iter()
            .enumerate()
            .filter(|(_, &f)| f >= p.mark_threshold)
            .map(|(option, &f)| BubbleResult {
                question: index,
                option,
                confidence: f.clamp(0.0, 1.0),
            })
            .collect();

        let state = match marks.as_slice() {
            [] => MarkState::Unanswered,
            [only] => MarkState::Single(only.option),
            _ => MarkState::Multiple,
        };

        let (top, runner_up) = top_two(&fills);
        let confidence = (top - runner_up).max(0.0);
        let near = |f: f32| (f - p.mark_threshold).abs() <= p.review_band;
        let needs_review = near(top)
            || near(runner_up)
            || (matches!(state, MarkState::Single(_)) && confidence < p.min_separation);

        if needs_review {
            log::debug!(
                "question {index}: top {top:.2}, runner-up {runner_up:.2}, flagged"
            );
        }

        QuestionReading {
            question: index,
            fills,
            marks,
            state,
            confidence,
            needs_review,
        }
    }
}

fn top_two(fills: &[f32]) -> (f32, f32) {
    let mut top = 0.0f32;
    let mut second = 0.0f32;
    for &f in fills {
        if f > top {
            second = top;
            top = f;
        } else if f > second {
            second = f;
        }
    }
    (top, second)
}
