//! Scoring of detected answers against an answer key.
//!
//! Evaluation is a pure function of `(detected answers, key, scheme)`: the
//! same inputs always produce the same [`EvaluationResult`], and manual
//! corrections go through a full recompute ([`Evaluator::reevaluate`]).
//!
//! ```
//! use ledger_omr_grade::{evaluate, AnswerKey, DetectedAnswers, MarkingScheme};
//!
//! let key = AnswerKey::from_pairs([(0, 1), (1, 0)]);
//! let detected: DetectedAnswers = [(0, vec![1]), (1, vec![2])].into_iter().collect();
//! let scheme = MarkingScheme::new(1.0, 0.5, true).unwrap();
//! let result = evaluate(2, &detected, &key, &scheme).unwrap();
//! assert_eq!(result.marks_obtained, 0.5);
//! assert_eq!(result.percentage, 25.0);
//! ```

mod answer;
mod evaluator;
mod grades;
mod scheme;
mod stats;

pub use answer::{AnswerKey, AnswerModel, AnswerStatus, DetectedAnswers};
pub use evaluator::{
    evaluate, EvaluationResult, EvaluationWarning, Evaluator, DEFAULT_PASSING_PERCENTAGE,
};
pub use grades::{GradeBand, GradeScale};
pub use scheme::{GradeError, MarkingScheme};
pub use stats::ExamStatistics;
