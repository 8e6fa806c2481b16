use serde::{Deserialize, Serialize};

use crate::geometry::GeometryVerdict;
use crate::stability::StabilityState;

/// Per-frame alignment feedback shown to the operator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentQuality {
    #[default]
    None,
    Partial,
    Good,
    Stabilizing,
    Perfect,
    SheetCurved,
}

impl AlignmentQuality {
    pub fn guidance(self) -> &'static str {
        match self {
            AlignmentQuality::None => "Point the camera at the answer sheet",
            AlignmentQuality::Partial => "Move back so all four corner marks are visible",
            AlignmentQuality::Good => "Hold the phone parallel to the sheet",
            AlignmentQuality::Stabilizing => "Hold still",
            AlignmentQuality::Perfect => "Capturing",
            AlignmentQuality::SheetCurved => "Flatten the sheet on a hard surface",
        }
    }

    /// Only a fully stabilised frame may trigger a capture.
    #[inline]
    pub fn allows_capture(self) -> bool {
        self == AlignmentQuality::Perfect
    }
}

/// Combine anchor count, geometry verdict and stability into one state.
///
/// A rejected verdict always wins over stability so a curved sheet blocks
/// capture for that frame.
pub fn classify_frame(
    anchor_count: usize,
    verdict: Option<&GeometryVerdict>,
    stability: &StabilityState,
) -> AlignmentQuality {
    match anchor_count {
        0 => AlignmentQuality::None,
        1..=3 => AlignmentQuality::Partial,
        _ => match verdict {
            Some(v) if v.rejected => AlignmentQuality::SheetCurved,
            Some(v) if v.is_well_aligned() => {
                if stability.stable_count >= stability.required {
                    AlignmentQuality::Perfect
                } else {
                    AlignmentQuality::Stabilizing
                }
            }
            _ => AlignmentQuality::Good,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GeometryRejection;

    fn verdict(quality: AlignmentQuality, rejected: bool) -> GeometryVerdict {
        GeometryVerdict {
            quality,
            rejected,
            score: if rejected { 0.0 } else { 0.95 },
            sides: [100.0; 4],
            rejection: rejected.then_some(GeometryRejection::Degenerate),
        }
    }

    fn state(stable_count: usize) -> StabilityState {
        StabilityState {
            stable_count,
            required: 7,
            ready_to_capture: stable_count == 7,
        }
    }

    #[test]
    fn anchor_shortfall_states() {
        assert_eq!(classify_frame(0, None, &state(0)), AlignmentQuality::None);
        assert_eq!(classify_frame(3, None, &state(0)), AlignmentQuality::Partial);
    }

    #[test]
    fn curved_sheet_blocks_capture_even_when_stable() {
        let v = verdict(AlignmentQuality::SheetCurved, true);
        let q = classify_frame(4, Some(&v), &state(7));
        assert_eq!(q, AlignmentQuality::SheetCurved);
        assert!(!q.allows_capture());
    }

    #[test]
    fn well_aligned_frames_progress_to_perfect() {
        let v = verdict(AlignmentQuality::Perfect, false);
        assert_eq!(classify_frame(4, Some(&v), &state(3)), AlignmentQuality::Stabilizing);
        assert_eq!(classify_frame(4, Some(&v), &state(7)), AlignmentQuality::Perfect);
        let tilted = verdict(AlignmentQuality::Good, false);
        assert_eq!(classify_frame(4, Some(&tilted), &state(7)), AlignmentQuality::Good);
        assert!(!AlignmentQuality::Good.guidance().is_empty());
    }
}
