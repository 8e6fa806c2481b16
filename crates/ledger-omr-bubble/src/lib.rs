//! Bubble reading on rectified answer sheets.
//!
//! Each template bubble is sampled inside a disc slightly smaller than its
//! printed outline. A pixel counts as ink when it is darker than a fraction
//! of the paper baseline, and the fill fraction decides whether the bubble
//! is marked. Questions near the decision threshold are flagged for review
//! instead of being guessed.

mod analyzer;
mod enrollment;
mod params;
mod sample;

pub use analyzer::{BubbleAnalysis, BubbleAnalyzer, BubbleResult, MarkState, QuestionReading};
pub use enrollment::{decode_enrollment, EnrollmentReading};
pub use params::{Baseline, BubbleParams};
pub use sample::{disc_fill, ring_median};
