use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::answer::{AnswerKey, AnswerModel, AnswerStatus, DetectedAnswers};
use crate::grades::GradeScale;
use crate::scheme::{GradeError, MarkingScheme};

pub const DEFAULT_PASSING_PERCENTAGE: f64 = 40.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EvaluationWarning {
    /// These questions have no key entry; single marks on them were not scored.
    AnswerKeyIncomplete { missing: Vec<usize> },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub total_questions: usize,
    pub correct_count: usize,
    /// Includes multiply-marked questions.
    pub incorrect_count: usize,
    /// Includes ungraded questions.
    pub unanswered_count: usize,
    pub multiple_marks_questions: Vec<usize>,
    pub ungraded_questions: Vec<usize>,
    /// May be negative under negative marking.
    pub marks_obtained: f64,
    pub max_marks: f64,
    /// Clamped to `[0, 100]`.
    pub percentage: f64,
    pub grade: String,
    pub passed: bool,
    pub answer_map: BTreeMap<usize, AnswerModel>,
    pub warnings: Vec<EvaluationWarning>,
}

impl EvaluationResult {
    /// Rebuild the detected-answer map this result was computed from.
    pub fn detected_answers(&self) -> DetectedAnswers {
        self.answer_map
            .iter()
            .map(|(&q, m)| (q, m.user_selected.clone()))
            .collect()
    }

    pub fn status(&self, question: usize) -> Option<AnswerStatus> {
        self.answer_map.get(&question).map(AnswerModel::status)
    }
}

/// Scores detected answers against a key for a sheet of fixed length.
#[derive(Clone, Debug)]
pub struct Evaluator {
    total_questions: usize,
    scheme: MarkingScheme,
    grades: GradeScale,
    passing_percentage: f64,
}

impl Evaluator {
    pub fn new(total_questions: usize, scheme: MarkingScheme) -> Result<Self, GradeError> {
        scheme.validate()?;
        Ok(Self {
            total_questions,
            scheme,
            grades: GradeScale::default(),
            passing_percentage: DEFAULT_PASSING_PERCENTAGE,
        })
    }

    pub fn with_grades(mut self, grades: GradeScale) -> Self {
        self.grades = grades;
        self
    }

    /// Clamped to `[0, 100]`.
    pub fn with_passing_percentage(mut self, percentage: f64) -> Self {
        self.passing_percentage = if percentage.is_finite() {
            percentage.clamp(0.0, 100.0)
        } else {
            DEFAULT_PASSING_PERCENTAGE
        };
        self
    }

    pub fn total_questions(&self) -> usize {
        self.total_questions
    }

    pub fn scheme(&self) -> &MarkingScheme {
        &self.scheme
    }

    /// Score every question in `0..total_questions`. Entries outside that
    /// range in `detected` or `key` are ignored.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, detected, key), fields(total = self.total_questions))
    )]
    pub fn evaluate(&self, detected: &DetectedAnswers, key: &AnswerKey) -> EvaluationResult {
        let total = self.total_questions;
        let mut correct_count = 0usize;
        let mut incorrect_count = 0usize;
        let mut unanswered_count = 0usize;
        let mut multiple_marks_questions = Vec::new();
        let mut ungraded_questions = Vec::new();
        let mut marks_obtained = 0.0f64;
        let mut answer_map = BTreeMap::new();

        for q in 0..total {
            let selected = detected.get(&q).cloned().unwrap_or_default();
            let model = AnswerModel::new(selected, key.get(q));
            match model.status() {
                AnswerStatus::Unanswered => unanswered_count += 1,
                AnswerStatus::Ungraded => {
                    unanswered_count += 1;
                    ungraded_questions.push(q);
                }
                AnswerStatus::MultipleMarks => {
                    incorrect_count += 1;
                    multiple_marks_questions.push(q);
                    marks_obtained += self.scheme.penalty();
                }
                AnswerStatus::Correct => {
                    correct_count += 1;
                    marks_obtained += self.scheme.marks_per_correct;
                }
                AnswerStatus::Incorrect => {
                    incorrect_count += 1;
                    marks_obtained += self.scheme.penalty();
                }
            }
            answer_map.insert(q, model);
        }

        let max_marks = total as f64 * self.scheme.marks_per_correct;
        let percentage = if max_marks > 0.0 {
            (100.0 * marks_obtained / max_marks).clamp(0.0, 100.0)
        } else {
            0.0
        };

        let mut warnings = Vec::new();
        let missing = key.missing(total);
        if !missing.is_empty() {
            log::warn!("answer key has no entry for {} question(s)", missing.len());
            warnings.push(EvaluationWarning::AnswerKeyIncomplete { missing });
        }

        EvaluationResult {
            total_questions: total,
            correct_count,
            incorrect_count,
            unanswered_count,
            multiple_marks_questions,
            ungraded_questions,
            marks_obtained,
            max_marks,
            percentage,
            grade: self.grades.grade_for(percentage).to_string(),
            passed: percentage >= self.passing_percentage,
            answer_map,
            warnings,
        }
    }

    /// Apply a manual correction to one question and recompute the whole sheet.
    pub fn reevaluate(
        &self,
        previous: &EvaluationResult,
        question: usize,
        new_selection: Vec<usize>,
        key: &AnswerKey,
    ) -> Result<EvaluationResult, GradeError> {
        if question >= self.total_questions {
            return Err(GradeError::QuestionOutOfRange {
                question,
                total: self.total_questions,
            });
        }
        let mut detected = previous.detected_answers();
        detected.insert(question, new_selection);
        Ok(self.evaluate(&detected, key))
    }
}

/// One-shot evaluation with the default grade scale and passing percentage.
pub fn evaluate(
    total_questions: usize,
    detected: &DetectedAnswers,
    key: &AnswerKey,
    scheme: &MarkingScheme,
) -> Result<EvaluationResult, GradeError> {
    Ok(Evaluator::new(total_questions, *scheme)?.evaluate(detected, key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grades::GradeBand;
    use approx::assert_relative_eq;

    fn detected(pairs: &[(usize, &[usize])]) -> DetectedAnswers {
        pairs.iter().map(|(q, s)| (*q, s.to_vec())).collect()
    }

    #[test]
    fn missing_key_entry_is_ungraded_and_warned() {
        let key = AnswerKey::from_pairs([(0, 1), (2, 0)]);
        let d = detected(&[(0, &[1]), (1, &[2]), (2, &[0, 1])]);
        let scheme = MarkingScheme::new(2.0, 1.0, true).expect("scheme");
        let r = Evaluator::new(3, scheme).expect("evaluator").evaluate(&d, &key);

        assert_eq!(r.correct_count, 1);
        assert_eq!(r.incorrect_count, 1);
        assert_eq!(r.unanswered_count, 1);
        assert_eq!(r.ungraded_questions, vec![1]);
        assert_eq!(r.multiple_marks_questions, vec![2]);
        assert_relative_eq!(r.marks_obtained, 1.0);
        assert_eq!(
            r.warnings,
            vec![EvaluationWarning::AnswerKeyIncomplete { missing: vec![1] }]
        );
        assert_eq!(r.status(1), Some(AnswerStatus::Ungraded));
    }

    #[test]
    fn heavy_negative_marking_floors_percentage_at_zero() {
        let key = AnswerKey::from_pairs((0..4).map(|q| (q, 0)));
        let d = detected(&[(0, &[1]), (1, &[1]), (2, &[1]), (3, &[0])]);
        let scheme = MarkingScheme::new(1.0, 1.0, true).expect("scheme");
        let r = evaluate(4, &d, &key, &scheme).expect("result");
        assert_relative_eq!(r.marks_obtained, -2.0);
        assert_eq!(r.percentage, 0.0);
        assert_eq!(r.grade, "F");
        assert!(!r.passed);
    }

    #[test]
    fn zero_questions_scores_zero_percent() {
        let r = evaluate(0, &DetectedAnswers::new(), &AnswerKey::new(), &MarkingScheme::default())
            .expect("result");
        assert_eq!(r.max_marks, 0.0);
        assert_eq!(r.percentage, 0.0);
        assert!(r.warnings.is_empty());
    }

    #[test]
    fn answers_beyond_the_sheet_are_ignored() {
        let key = AnswerKey::from_pairs([(0, 0), (5, 1)]);
        let d = detected(&[(0, &[0]), (7, &[1])]);
        let r = evaluate(1, &d, &key, &MarkingScheme::default()).expect("result");
        assert_eq!(r.correct_count, 1);
        assert_eq!(r.answer_map.len(), 1);
        assert_eq!(r.percentage, 100.0);
        assert_eq!(r.grade, "A+");
    }

    #[test]
    fn passing_percentage_is_configurable() {
        let key = AnswerKey::from_pairs([(0, 0), (1, 0)]);
        let d = detected(&[(0, &[0])]);
        let evaluator = Evaluator::new(2, MarkingScheme::default()).expect("evaluator");
        assert!(evaluator.evaluate(&d, &key).passed);
        let strict = evaluator.clone().with_passing_percentage(60.0);
        assert!(!strict.evaluate(&d, &key).passed);
    }

    #[test]
    fn custom_grade_scale_is_used() {
        let scale = GradeScale::new(
            vec![
                GradeBand {
                    min_percentage: 50.0,
                    grade: "pass".into(),
                },
                GradeBand {
                    min_percentage: 100.0,
                    grade: "distinction".into(),
                },
            ],
            "fail",
        );
        let key = AnswerKey::from_pairs([(0, 0), (1, 0)]);
        let evaluator = Evaluator::new(2, MarkingScheme::default())
            .expect("evaluator")
            .with_grades(scale);
        assert_eq!(evaluator.evaluate(&detected(&[(0, &[0])]), &key).grade, "pass");
        assert_eq!(
            evaluator
                .evaluate(&detected(&[(0, &[0]), (1, &[0])]), &key)
                .grade,
            "distinction"
        );
        assert_eq!(evaluator.evaluate(&DetectedAnswers::new(), &key).grade, "fail");
    }

    #[test]
    fn reevaluate_rejects_out_of_range_questions() {
        let key = AnswerKey::from_pairs([(0, 0)]);
        let evaluator = Evaluator::new(1, MarkingScheme::default()).expect("evaluator");
        let r = evaluator.evaluate(&DetectedAnswers::new(), &key);
        assert_eq!(
            evaluator.reevaluate(&r, 3, vec![0], &key),
            Err(GradeError::QuestionOutOfRange {
                question: 3,
                total: 1
            })
        );
    }
}
