use serde::{Deserialize, Serialize};

use crate::answer::AnswerStatus;
use crate::evaluator::EvaluationResult;

/// Aggregate over a batch of evaluated sheets.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExamStatistics {
    pub sheets: usize,
    pub mean_percentage: f64,
    pub highest_percentage: f64,
    pub lowest_percentage: f64,
    /// Fraction of sheets that passed, in `[0, 1]`.
    pub pass_rate: f64,
    /// Per question index: fraction of sheets answering it correctly.
    pub question_correct_rate: Vec<f64>,
}

impl ExamStatistics {
    pub fn from_results(results: &[EvaluationResult]) -> Self {
        if results.is_empty() {
            return Self::default();
        }
        let n = results.len() as f64;
        let percentages = results.iter().map(|r| r.percentage);
        let mean_percentage = percentages.clone().sum::<f64>() / n;
        let highest_percentage = percentages.clone().fold(f64::MIN, f64::max);
        let lowest_percentage = percentages.fold(f64::MAX, f64::min);
        let pass_rate = results.iter().filter(|r| r.passed).count() as f64 / n;

        let questions = results.iter().map(|r| r.total_questions).max().unwrap_or(0);
        let question_correct_rate = (0..questions)
            .map(|q| {
                let correct = results
                    .iter()
                    .filter(|r| r.status(q) == Some(AnswerStatus::Correct))
                    .count();
                correct as f64 / n
            })
            .collect();

        Self {
            sheets: results.len(),
            mean_percentage,
            highest_percentage,
            lowest_percentage,
            pass_rate,
            question_correct_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{evaluate, AnswerKey, DetectedAnswers, MarkingScheme};
    use approx::assert_relative_eq;

    #[test]
    fn summarises_a_batch() {
        let key = AnswerKey::from_pairs([(0, 0), (1, 1)]);
        let scheme = MarkingScheme::default();
        let sheets: Vec<DetectedAnswers> = vec![
            [(0, vec![0]), (1, vec![1])].into_iter().collect(),
            [(0, vec![0]), (1, vec![0])].into_iter().collect(),
            DetectedAnswers::new(),
        ];
        let results: Vec<_> = sheets
            .iter()
            .map(|d| evaluate(2, d, &key, &scheme).expect("result"))
            .collect();

        let s = ExamStatistics::from_results(&results);
        assert_eq!(s.sheets, 3);
        assert_relative_eq!(s.mean_percentage, 50.0);
        assert_relative_eq!(s.highest_percentage, 100.0);
        assert_relative_eq!(s.lowest_percentage, 0.0);
        assert_relative_eq!(s.pass_rate, 2.0 / 3.0);
        assert_relative_eq!(s.question_correct_rate[0], 2.0 / 3.0);
        assert_relative_eq!(s.question_correct_rate[1], 1.0 / 3.0);
    }

    #[test]
    fn empty_batch_is_all_zero() {
        assert_eq!(ExamStatistics::from_results(&[]), ExamStatistics::default());
    }
}
