use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Selected options per 0-based question index.
pub type DetectedAnswers = BTreeMap<usize, Vec<usize>>;

/// Correct option per 0-based question index.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerKey(BTreeMap<usize, usize>);

impl AnswerKey {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (usize, usize)>) -> Self {
        Self(pairs.into_iter().collect())
    }

    pub fn insert(&mut self, question: usize, option: usize) -> Option<usize> {
        self.0.insert(question, option)
    }

    #[inline]
    pub fn get(&self, question: usize) -> Option<usize> {
        self.0.get(&question).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Questions in `0..total` without a key entry.
    pub fn missing(&self, total: usize) -> Vec<usize> {
        (0..total).filter(|q| !self.0.contains_key(q)).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.0.iter().map(|(&q, &o)| (q, o))
    }
}

impl FromIterator<(usize, usize)> for AnswerKey {
    fn from_iter<I: IntoIterator<Item = (usize, usize)>>(iter: I) -> Self {
        Self::from_pairs(iter)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStatus {
    Unanswered,
    MultipleMarks,
    Correct,
    Incorrect,
    /// A single mark with no key entry to compare against.
    Ungraded,
}

/// One question's selection and key. The status is always derived.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerModel {
    /// Sorted, de-duplicated selected options.
    pub user_selected: Vec<usize>,
    pub correct_answer: Option<usize>,
}

impl AnswerModel {
    pub fn new(mut user_selected: Vec<usize>, correct_answer: Option<usize>) -> Self {
        user_selected.sort_unstable();
        user_selected.dedup();
        Self {
            user_selected,
            correct_answer,
        }
    }

    pub fn status(&self) -> AnswerStatus {
        match (self.user_selected.as_slice(), self.correct_answer) {
            ([], _) => AnswerStatus::Unanswered,
            ([_, _, ..], _) => AnswerStatus::MultipleMarks,
            ([_], None) => AnswerStatus::Ungraded,
            ([chosen], Some(key)) if *chosen == key => AnswerStatus::Correct,
            ([_], Some(_)) => AnswerStatus::Incorrect,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_derived_from_selection_and_key() {
        assert_eq!(AnswerModel::new(vec![], Some(1)).status(), AnswerStatus::Unanswered);
        assert_eq!(AnswerModel::new(vec![2, 0], Some(0)).status(), AnswerStatus::MultipleMarks);
        assert_eq!(AnswerModel::new(vec![1], Some(1)).status(), AnswerStatus::Correct);
        assert_eq!(AnswerModel::new(vec![3], Some(1)).status(), AnswerStatus::Incorrect);
        assert_eq!(AnswerModel::new(vec![3], None).status(), AnswerStatus::Ungraded);
    }

    #[test]
    fn duplicate_marks_collapse() {
        let m = AnswerModel::new(vec![2, 2], Some(2));
        assert_eq!(m.user_selected, vec![2]);
        assert_eq!(m.status(), AnswerStatus::Correct);
    }

    #[test]
    fn key_serializes_as_a_plain_map() {
        let key = AnswerKey::from_pairs([(0, 1), (2, 3)]);
        let json = serde_json::to_string(&key).expect("json");
        assert_eq!(json, r#"{"0":1,"2":3}"#);
        let back: AnswerKey = serde_json::from_str(&json).expect("parse");
        assert_eq!(back, key);
        assert_eq!(key.missing(4), vec![1, 3]);
    }
}
