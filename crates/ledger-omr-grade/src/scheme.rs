use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GradeError {
    #[error("marks per correct answer must be positive and finite, got {0}")]
    InvalidCorrectMarks(f64),
    #[error("marks per wrong answer must be non-negative and finite, got {0}")]
    InvalidWrongMarks(f64),
    #[error("question {question} is outside the sheet ({total} questions)")]
    QuestionOutOfRange { question: usize, total: usize },
}

/// Points awarded and deducted per question.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkingScheme {
    pub marks_per_correct: f64,
    /// Deducted for a wrong or multiply-marked answer when negative marking is on.
    pub marks_per_wrong: f64,
    pub negative_marking_enabled: bool,
}

impl Default for MarkingScheme {
    fn default() -> Self {
        Self {
            marks_per_correct: 1.0,
            marks_per_wrong: 0.0,
            negative_marking_enabled: false,
        }
    }
}

impl MarkingScheme {
    pub fn new(
        marks_per_correct: f64,
        marks_per_wrong: f64,
        negative_marking_enabled: bool,
    ) -> Result<Self, GradeError> {
        let scheme = Self {
            marks_per_correct,
            marks_per_wrong,
            negative_marking_enabled,
        };
        scheme.validate()?;
        Ok(scheme)
    }

    pub fn validate(&self) -> Result<(), GradeError> {
        if !(self.marks_per_correct.is_finite() && self.marks_per_correct > 0.0) {
            return Err(GradeError::InvalidCorrectMarks(self.marks_per_correct));
        }
        if !(self.marks_per_wrong.is_finite() && self.marks_per_wrong >= 0.0) {
            return Err(GradeError::InvalidWrongMarks(self.marks_per_wrong));
        }
        Ok(())
    }

    /// Marks for a wrong answer: `-marks_per_wrong` with negative marking, else 0.
    #[inline]
    pub fn penalty(&self) -> f64 {
        if self.negative_marking_enabled {
            -self.marks_per_wrong
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_marks() {
        assert_eq!(
            MarkingScheme::new(0.0, 0.0, false),
            Err(GradeError::InvalidCorrectMarks(0.0))
        );
        assert_eq!(
            MarkingScheme::new(1.0, -0.5, true),
            Err(GradeError::InvalidWrongMarks(-0.5))
        );
        assert!(MarkingScheme::new(f64::NAN, 0.0, false).is_err());
    }

    #[test]
    fn penalty_depends_on_negative_marking() {
        let on = MarkingScheme::new(1.0, 0.25, true).expect("scheme");
        let off = MarkingScheme::new(1.0, 0.25, false).expect("scheme");
        assert_eq!(on.penalty(), -0.25);
        assert_eq!(off.penalty(), 0.0);
    }
}
