use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GradeBand {
    /// Inclusive lower bound in percent.
    pub min_percentage: f64,
    pub grade: String,
}

/// Percentage-to-letter mapping; the first band whose bound is met wins.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GradeScale {
    bands: Vec<GradeBand>,
    fallback: String,
}

impl Default for GradeScale {
    fn default() -> Self {
        Self::new(
            [
                (90.0, "A+"),
                (80.0, "A"),
                (70.0, "B"),
                (60.0, "C"),
                (50.0, "D"),
                (40.0, "E"),
            ]
            .into_iter()
            .map(|(min_percentage, grade)| GradeBand {
                min_percentage,
                grade: grade.to_string(),
            })
            .collect(),
            "F",
        )
    }
}

impl GradeScale {
    /// Bands are sorted by descending bound.
    pub fn new(mut bands: Vec<GradeBand>, fallback: impl Into<String>) -> Self {
        bands.sort_by(|a, b| b.min_percentage.total_cmp(&a.min_percentage));
        Self {
            bands,
            fallback: fallback.into(),
        }
    }

    pub fn bands(&self) -> &[GradeBand] {
        &self.bands
    }

    pub fn grade_for(&self, percentage: f64) -> &str {
        self.bands
            .iter()
            .find(|b| percentage >= b.min_percentage)
            .map(|b| b.grade.as_str())
            .unwrap_or(&self.fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bands() {
        let s = GradeScale::default();
        assert_eq!(s.grade_for(100.0), "A+");
        assert_eq!(s.grade_for(90.0), "A+");
        assert_eq!(s.grade_for(89.99), "A");
        assert_eq!(s.grade_for(40.0), "E");
        assert_eq!(s.grade_for(30.0), "F");
        assert_eq!(s.grade_for(0.0), "F");
    }

    #[test]
    fn custom_bands_are_sorted() {
        let s = GradeScale::new(
            vec![
                GradeBand {
                    min_percentage: 50.0,
                    grade: "pass".into(),
                },
                GradeBand {
                    min_percentage: 85.0,
                    grade: "distinction".into(),
                },
            ],
            "fail",
        );
        assert_eq!(s.grade_for(90.0), "distinction");
        assert_eq!(s.grade_for(60.0), "pass");
        assert_eq!(s.grade_for(10.0), "fail");
    }
}
