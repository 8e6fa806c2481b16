//! Registration-mark stage of the OMR pipeline.
//!
//! - [`AnchorDetector`] finds the four dark square anchors near their
//!   expected positions.
//! - [`GeometryValidator`] rejects implausible quads (curved or folded
//!   sheets) and scores alignment.
//! - [`FrameStabilityTracker`] debounces auto-capture over consecutive frames.
//!
//! None of these fail with an error: shortfalls and rejections are values
//! the caller turns into operator guidance.

mod detector;
mod geometry;
mod quality;
mod stability;
mod types;

pub use detector::AnchorDetector;
pub use geometry::{GeometryParams, GeometryRejection, GeometryValidator, GeometryVerdict};
pub use quality::{classify_frame, AlignmentQuality};
pub use stability::{
    FrameOutcome, FrameStabilityTracker, StabilityState, DEFAULT_REQUIRED_STABLE_FRAMES,
};
pub use types::{AnchorDetectionResult, AnchorParams, DetectedAnchor};
