use serde::{Deserialize, Serialize};

/// Reference brightness that "dark" is measured against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Baseline {
    /// Median of the whole rectified sheet.
    #[default]
    GlobalMedian,
    /// Median of a ring of paper around each bubble; tolerates shadows.
    LocalRing,
}

/// Bubble reading settings. Fractions refer to the template radius.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BubbleParams {
    /// Sampled disc radius as a fraction of the bubble radius; keeps the
    /// printed outline out of the measurement.
    pub sample_radius_frac: f32,
    /// A pixel is dark when below `baseline * dark_ratio`.
    pub dark_ratio: f32,
    /// Fill fraction at or above which a bubble counts as marked.
    pub mark_threshold: f32,
    /// Fills within `mark_threshold ± review_band` are flagged for review.
    pub review_band: f32,
    /// A single mark closer than this to the runner-up is flagged.
    pub min_separation: f32,
    pub baseline: Baseline,
    /// Inner and outer radius of the local baseline ring.
    pub ring_inner_frac: f32,
    pub ring_outer_frac: f32,
}

impl Default for BubbleParams {
    fn default() -> Self {
        Self {
            sample_radius_frac: 0.75,
            dark_ratio: 0.65,
            mark_threshold: 0.45,
            review_band: 0.12,
            min_separation: 0.25,
            baseline: Baseline::GlobalMedian,
            ring_inner_frac: 1.4,
            ring_outer_frac: 1.9,
        }
    }
}
