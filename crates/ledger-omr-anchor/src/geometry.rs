//! Plausibility checks on the four detected anchor centres.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use ledger_omr_core::geometry::{is_convex, polygon_area, quad_sides};

use crate::quality::AlignmentQuality;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryParams {
    /// Largest accepted ratio between opposite sides (after normalisation).
    pub max_opposite_ratio: f32,
    /// Largest accepted ratio between adjacent sides (after normalisation).
    pub max_adjacent_ratio: f32,
    /// Smallest accepted quad area in pixels.
    pub min_area_px: f32,
    /// Distribution score at or above which the sheet counts as well aligned.
    pub perfect_score: f32,
}

impl Default for GeometryParams {
    fn default() -> Self {
        Self {
            max_opposite_ratio: 1.5,
            max_adjacent_ratio: 3.0,
            min_area_px: 64.0,
            perfect_score: 0.92,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GeometryRejection {
    /// Too small, collapsed or self-intersecting.
    Degenerate,
    /// Opposite sides disagree: curved, folded or steeply tilted sheet.
    OppositeSidesMismatch { ratio: f32 },
    AdjacentSidesMismatch { ratio: f32 },
}

impl std::fmt::Display for GeometryRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeometryRejection::Degenerate => write!(f, "degenerate anchor quadrilateral"),
            GeometryRejection::OppositeSidesMismatch { ratio } => {
                write!(f, "opposite sides differ by a factor of {ratio:.2}")
            }
            GeometryRejection::AdjacentSidesMismatch { ratio } => {
                write!(f, "adjacent sides differ by a factor of {ratio:.2}")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeometryVerdict {
    pub quality: AlignmentQuality,
    pub rejected: bool,
    /// `1 - stddev / mean` of the normalised side lengths, in `[0, 1]`.
    pub score: f32,
    /// Raw side lengths `[top, right, bottom, left]` in pixels.
    pub sides: [f32; 4],
    pub rejection: Option<GeometryRejection>,
}

impl GeometryVerdict {
    fn rejected(sides: [f32; 4], rejection: GeometryRejection) -> Self {
        Self {
            quality: AlignmentQuality::SheetCurved,
            rejected: true,
            score: 0.0,
            sides,
            rejection: Some(rejection),
        }
    }

    /// Accepted and scored at or above the alignment threshold.
    #[inline]
    pub fn is_well_aligned(&self) -> bool {
        !self.rejected && self.quality == AlignmentQuality::Perfect
    }
}

#[inline]
fn ratio(a: f32, b: f32) -> f32 {
    a.max(b) / a.min(b)
}

pub struct GeometryValidator {
    params: GeometryParams,
    /// Template side lengths used to normalise the observed ones.
    reference: Option<[f32; 4]>,
}

impl GeometryValidator {
    pub fn new(params: GeometryParams) -> Self {
        Self {
            params,
            reference: None,
        }
    }

    /// Judge side lengths relative to the template's own anchor quad, so a
    /// non-square layout is not penalised.
    pub fn with_reference(mut self, reference: &[Point2<f32>; 4]) -> Self {
        let sides = quad_sides(reference);
        if sides.iter().all(|s| s.is_finite() && *s > f32::EPSILON) {
            self.reference = Some(sides);
        } else {
            log::warn!("ignoring degenerate reference quad");
        }
        self
    }

    pub fn params(&self) -> &GeometryParams {
        &self.params
    }

    /// Validate a clockwise `[TL, TR, BR, BL]` quad in image pixels.
    pub fn validate(&self, quad: &[Point2<f32>; 4]) -> GeometryVerdict {
        let sides = quad_sides(quad);
        if quad.iter().any(|p| !(p.x.is_finite() && p.y.is_finite()))
            || polygon_area(quad) < self.params.min_area_px
            || !is_convex(quad)
            || sides.iter().any(|&s| s <= f32::EPSILON)
        {
            return GeometryVerdict::rejected(sides, GeometryRejection::Degenerate);
        }

        let norm = match self.reference {
            Some(r) => [
                sides[0] / r[0],
                sides[1] / r[1],
                sides[2] / r[2],
                sides[3] / r[3],
            ],
            None => {
                let h = 0.5 * (sides[0] + sides[2]);
                let v = 0.5 * (sides[1] + sides[3]);
                [sides[0] / h, sides[1] / v, sides[2] / h, sides[3] / v]
            }
        };

        let opposite = ratio(norm[0], norm[2]).max(ratio(norm[1], norm[3]));
        if opposite > self.params.max_opposite_ratio {
            log::debug!("rejecting quad: opposite ratio {opposite:.2}");
            return GeometryVerdict::rejected(
                sides,
                GeometryRejection::OppositeSidesMismatch { ratio: opposite },
            );
        }

        // Without a reference the normalised adjacent sides are all ~1, so
        // compare the raw lengths instead.
        let adj = match self.reference {
            Some(_) => norm,
            None => sides,
        };
        let adjacent = (0..4)
            .map(|i| ratio(adj[i], adj[(i + 1) % 4]))
            .fold(1.0f32, f32::max);
        if adjacent > self.params.max_adjacent_ratio {
            log::debug!("rejecting quad: adjacent ratio {adjacent:.2}");
            return GeometryVerdict::rejected(
                sides,
                GeometryRejection::AdjacentSidesMismatch { ratio: adjacent },
            );
        }

        let mean = norm.iter().sum::<f32>() / 4.0;
        let var = norm.iter().map(|n| (n - mean) * (n - mean)).sum::<f32>() / 4.0;
        let score = (1.0 - var.sqrt() / mean).clamp(0.0, 1.0);
        let quality = if score >= self.params.perfect_score {
            AlignmentQuality::Perfect
        } else {
            AlignmentQuality::Good
        };

        GeometryVerdict {
            quality,
            rejected: false,
            score,
            sides,
            rejection: None,
        }
    }
}
