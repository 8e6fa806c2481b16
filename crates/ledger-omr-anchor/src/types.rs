use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use ledger_omr_core::AnchorCorner;

/// Anchor search settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorParams {
    /// Half-size of the square search window around each expected anchor,
    /// as a fraction of the larger buffer side.
    pub roi_frac: f32,
    /// Pixels strictly darker than this are ink.
    pub binary_threshold: u8,
    /// Retry a corner with the window's Otsu threshold when the fixed one
    /// finds nothing.
    pub otsu_fallback: bool,
    /// Douglas-Peucker tolerance as a fraction of the contour perimeter.
    pub approx_epsilon_frac: f32,
    pub min_aspect: f32,
    pub max_aspect: f32,
    /// Lower bound on contour area over axis-aligned bounding-box area.
    /// An upright square scores 1.0 but one turned in-plane by θ scores
    /// `1 / (cos θ + sin θ)²`, so the default 0.70 drops anchors on sheets
    /// rotated by more than about 13°. Lower it to accept such frames.
    pub min_solidity: f32,
    /// Blob area bounds as fractions of the search window area.
    pub min_area_frac: f32,
    pub max_area_frac: f32,
    /// Round blobs (filled bubbles) are at or above this.
    pub max_circularity: f32,
}

impl Default for AnchorParams {
    fn default() -> Self {
        Self {
            roi_frac: 0.12,
            binary_threshold: 100,
            otsu_fallback: true,
            approx_epsilon_frac: 0.04,
            min_aspect: 0.8,
            max_aspect: 1.25,
            min_solidity: 0.70,
            min_area_frac: 0.002,
            max_area_frac: 0.25,
            max_circularity: 0.85,
        }
    }
}

/// One located anchor, in buffer pixels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectedAnchor {
    pub corner: AnchorCorner,
    pub center: Point2<f32>,
    /// Solidity clamped to `[0, 1]`.
    pub confidence: f32,
    pub solidity: f32,
    pub area: f32,
}

/// Per-frame detection outcome. A shortfall is a value, not an error.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnchorDetectionResult {
    /// Found anchors in clockwise corner order.
    pub anchors: Vec<DetectedAnchor>,
    pub success: bool,
}

impl AnchorDetectionResult {
    pub fn from_anchors(mut anchors: Vec<DetectedAnchor>) -> Self {
        anchors.sort_by_key(|a| a.corner);
        anchors.dedup_by_key(|a| a.corner);
        let success = anchors.len() == 4;
        Self { anchors, success }
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.anchors.len()
    }

    pub fn get(&self, corner: AnchorCorner) -> Option<&DetectedAnchor> {
        self.anchors.iter().find(|a| a.corner == corner)
    }

    /// All four centres as `[TL, TR, BR, BL]`, or `None` on a shortfall.
    pub fn points(&self) -> Option<[Point2<f32>; 4]> {
        let mut out = [Point2::origin(); 4];
        for corner in AnchorCorner::ALL {
            out[corner.index()] = self.get(corner)?.center;
        }
        Some(out)
    }

    pub fn missing(&self) -> Vec<AnchorCorner> {
        AnchorCorner::ALL
            .into_iter()
            .filter(|&c| self.get(c).is_none())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor(corner: AnchorCorner, x: f32) -> DetectedAnchor {
        DetectedAnchor {
            corner,
            center: Point2::new(x, 0.0),
            confidence: 1.0,
            solidity: 1.0,
            area: 100.0,
        }
    }

    #[test]
    fn partial_result_reports_missing_corners() {
        let r = AnchorDetectionResult::from_anchors(vec![
            anchor(AnchorCorner::BottomLeft, 3.0),
            anchor(AnchorCorner::TopLeft, 0.0),
        ]);
        assert!(!r.success);
        assert_eq!(r.count(), 2);
        assert!(r.points().is_none());
        assert_eq!(
            r.missing(),
            vec![AnchorCorner::TopRight, AnchorCorner::BottomRight]
        );
        assert_eq!(r.anchors[0].corner, AnchorCorner::TopLeft);
    }

    #[test]
    fn full_result_orders_points_clockwise() {
        let r = AnchorDetectionResult::from_anchors(
            AnchorCorner::ALL
                .iter()
                .rev()
                .map(|&c| anchor(c, c.index() as f32))
                .collect(),
        );
        assert!(r.success);
        let pts = r.points().expect("points");
        for (i, p) in pts.iter().enumerate() {
            assert_eq!(p.x, i as f32);
        }
    }

    #[test]
    fn params_fill_missing_fields_from_defaults() {
        let p: AnchorParams = serde_json::from_str(r#"{"binary_threshold": 80}"#).expect("parse");
        assert_eq!(p.binary_threshold, 80);
        assert_eq!(p.roi_frac, 0.12);
    }
}
