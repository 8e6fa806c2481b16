use std::cmp::Ordering;

use nalgebra::Point2;

#[cfg(feature = "tracing")]
use tracing::instrument;

use ledger_omr_core::contour::{find_components, measure_component, ShapeMetrics};
use ledger_omr_core::threshold::{binarize_below, otsu_threshold};
use ledger_omr_core::{AnchorCorner, GrayImageView, Template};

use crate::types::{AnchorDetectionResult, AnchorParams, DetectedAnchor};

/// Blobs smaller than this are never traced.
const MIN_BLOB_PIXELS: usize = 9;

/// Square search window clipped to the buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct SearchWindow {
    x0: usize,
    y0: usize,
    w: usize,
    h: usize,
}

impl SearchWindow {
    fn around(center: Point2<f32>, half: f32, width: usize, height: usize) -> Option<Self> {
        if !(center.x.is_finite() && center.y.is_finite()) {
            return None;
        }
        let x0 = (center.x - half).floor().max(0.0);
        let y0 = (center.y - half).floor().max(0.0);
        let x1 = (center.x + half).ceil().min(width as f32);
        let y1 = (center.y + half).ceil().min(height as f32);
        if x1 - x0 < 3.0 || y1 - y0 < 3.0 {
            return None;
        }
        Some(Self {
            x0: x0 as usize,
            y0: y0 as usize,
            w: (x1 - x0) as usize,
            h: (y1 - y0) as usize,
        })
    }

    fn area(&self) -> f32 {
        (self.w * self.h) as f32
    }
}

/// Locates the four square registration marks near their expected positions.
pub struct AnchorDetector {
    params: AnchorParams,
}

impl AnchorDetector {
    pub fn new(params: AnchorParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &AnchorParams {
        &self.params
    }

    /// Detect anchors near the template's anchor positions scaled to the buffer.
    pub fn detect_for_template(
        &self,
        image: &GrayImageView<'_>,
        template: &Template,
    ) -> AnchorDetectionResult {
        let expected = template.anchors_scaled_to(image.width, image.height);
        self.detect(image, &expected)
    }

    /// Detect anchors around `expected` (buffer pixels, `[TL, TR, BR, BL]`).
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, image, expected), fields(w = image.width, h = image.height))
    )]
    pub fn detect(
        &self,
        image: &GrayImageView<'_>,
        expected: &[Point2<f32>; 4],
    ) -> AnchorDetectionResult {
        let half = self.params.roi_frac * image.width.max(image.height) as f32;
        let mut anchors = Vec::with_capacity(4);

        for corner in AnchorCorner::ALL {
            let Some(window) = SearchWindow::around(
                expected[corner.index()],
                half,
                image.width,
                image.height,
            ) else {
                log::debug!("{corner:?}: search window outside the frame");
                continue;
            };

            match self.detect_in_window(image, window) {
                Some((center, m)) => {
                    log::trace!(
                        "{corner:?}: anchor at ({:.1}, {:.1}) solidity {:.2}",
                        center.x,
                        center.y,
                        m.solidity
                    );
                    anchors.push(DetectedAnchor {
                        corner,
                        center,
                        confidence: m.solidity.clamp(0.0, 1.0),
                        solidity: m.solidity,
                        area: m.area,
                    });
                }
                None => log::debug!("{corner:?}: no anchor candidate"),
            }
        }

        let result = AnchorDetectionResult::from_anchors(anchors);
        log::debug!("anchors found: {}/4", result.count());
        result
    }

    fn detect_in_window(
        &self,
        image: &GrayImageView<'_>,
        window: SearchWindow,
    ) -> Option<(Point2<f32>, ShapeMetrics)> {
        let roi = image.crop(window.x0, window.y0, window.w, window.h);
        let roi_view = roi.view();

        let mut best = self.best_candidate(&roi_view, self.params.binary_threshold, window);
        if best.is_none() && self.params.otsu_fallback {
            let t = otsu_threshold(roi_view.data);
            if t != self.params.binary_threshold {
                best = self.best_candidate(&roi_view, t.saturating_add(1), window);
            }
        }

        best.map(|m| {
            let center = Point2::new(
                m.centroid.x + window.x0 as f32,
                m.centroid.y + window.y0 as f32,
            );
            (center, m)
        })
    }

    fn best_candidate(
        &self,
        roi: &GrayImageView<'_>,
        threshold: u8,
        window: SearchWindow,
    ) -> Option<ShapeMetrics> {
        let mask = binarize_below(roi, threshold);
        let (labels, comps) = find_components(&mask);
        let roi_area = window.area();

        comps
            .iter()
            .filter(|c| c.pixel_count >= MIN_BLOB_PIXELS)
            .filter_map(|c| measure_component(&labels, c, self.params.approx_epsilon_frac))
            .filter(|m| self.accepts(m, roi_area))
            .max_by(rank_candidates)
    }

    fn accepts(&self, m: &ShapeMetrics, roi_area: f32) -> bool {
        let p = &self.params;
        let area_frac = m.area / roi_area;
        m.vertices == 4
            && m.convex
            && (p.min_aspect..=p.max_aspect).contains(&m.aspect)
            && m.solidity > p.min_solidity
            && (p.min_area_frac..=p.max_area_frac).contains(&area_frac)
            && m.circularity < p.max_circularity
    }
}

/// Highest solidity wins; ties go to the larger blob.
fn rank_candidates(a: &ShapeMetrics, b: &ShapeMetrics) -> Ordering {
    a.solidity
        .partial_cmp(&b.solidity)
        .unwrap_or(Ordering::Equal)
        .then(a.area.partial_cmp(&b.area).unwrap_or(Ordering::Equal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_omr_core::GrayImage;

    fn draw_square(img: &mut GrayImage, cx: usize, cy: usize, side: usize, v: u8) {
        let r = side / 2;
        for y in cy - r..=cy + r {
            for x in cx - r..=cx + r {
                img.put(x, y, v);
            }
        }
    }

    fn draw_disc(img: &mut GrayImage, cx: f32, cy: f32, r: f32, v: u8) {
        for y in 0..img.height {
            for x in 0..img.width {
                let dx = x as f32 - cx;
                let dy = y as f32 - cy;
                if dx * dx + dy * dy <= r * r {
                    img.put(x, y, v);
                }
            }
        }
    }

    fn expected() -> [Point2<f32>; 4] {
        [
            Point2::new(30.0, 30.0),
            Point2::new(270.0, 30.0),
            Point2::new(270.0, 370.0),
            Point2::new(30.0, 370.0),
        ]
    }

    #[test]
    fn finds_four_squares_on_a_clean_sheet() {
        let mut img = GrayImage::filled(300, 400, 235);
        for p in expected() {
            draw_square(&mut img, p.x as usize + 3, p.y as usize - 2, 21, 10);
        }
        let det = AnchorDetector::new(AnchorParams::default());
        let r = det.detect(&img.view(), &expected());
        assert!(r.success);
        let pts = r.points().expect("points");
        for (p, e) in pts.iter().zip(expected()) {
            assert!((p.x - (e.x + 3.0)).abs() < 0.5, "{p:?}");
            assert!((p.y - (e.y - 2.0)).abs() < 0.5, "{p:?}");
        }
        assert!(r.anchors.iter().all(|a| a.confidence > 0.95));
    }

    #[test]
    fn missing_anchor_is_reported_not_invented() {
        let mut img = GrayImage::filled(300, 400, 235);
        for p in &expected()[..3] {
            draw_square(&mut img, p.x as usize, p.y as usize, 21, 10);
        }
        // a filled bubble where the fourth anchor should be
        draw_disc(&mut img, 30.0, 370.0, 14.0, 10);
        let r = AnchorDetector::new(AnchorParams::default()).detect(&img.view(), &expected());
        assert!(!r.success);
        assert_eq!(r.count(), 3);
        assert_eq!(r.missing(), vec![AnchorCorner::BottomLeft]);
    }

    #[test]
    fn larger_square_wins_over_smaller_one() {
        let mut img = GrayImage::filled(300, 400, 235);
        draw_square(&mut img, 20, 20, 15, 10);
        draw_square(&mut img, 50, 50, 25, 10);
        let r = AnchorDetector::new(AnchorParams::default()).detect(&img.view(), &expected());
        let tl = r.get(AnchorCorner::TopLeft).expect("top-left");
        assert!((tl.center.x - 50.0).abs() < 0.5);
    }

    fn draw_turned_square(img: &mut GrayImage, c: Point2<f32>, side: f32, deg: f32, v: u8) {
        let (sin, cos) = deg.to_radians().sin_cos();
        let half = side / 2.0;
        for y in 0..img.height {
            for x in 0..img.width {
                let dx = x as f32 - c.x;
                let dy = y as f32 - c.y;
                let u = dx * cos + dy * sin;
                let w = -dx * sin + dy * cos;
                if u.abs() <= half && w.abs() <= half {
                    img.put(x, y, v);
                }
            }
        }
    }

    #[test]
    fn solidity_gate_limits_in_plane_rotation() {
        let mut img = GrayImage::filled(300, 400, 235);
        let tl = expected()[0];
        draw_turned_square(&mut img, Point2::new(tl.x + 10.0, tl.y + 10.0), 25.0, 30.0, 10);

        let default = AnchorDetector::new(AnchorParams::default());
        assert!(default.detect(&img.view(), &expected()).get(AnchorCorner::TopLeft).is_none());

        // 1 / (cos 30 + sin 30)^2 is about 0.54
        let lenient = AnchorDetector::new(AnchorParams {
            min_solidity: 0.2,
            ..AnchorParams::default()
        });
        let found = lenient.detect(&img.view(), &expected());
        let a = found.get(AnchorCorner::TopLeft).expect("turned anchor");
        assert!(a.solidity > 0.45 && a.solidity < 0.65, "{}", a.solidity);
        assert!((a.center.x - 40.0).abs() < 1.0 && (a.center.y - 40.0).abs() < 1.0);
    }

    #[test]
    fn faint_anchor_is_found_with_otsu_fallback() {
        let mut img = GrayImage::filled(300, 400, 220);
        draw_square(&mut img, 30, 30, 21, 140);
        let det = AnchorDetector::new(AnchorParams::default());
        assert!(det.detect(&img.view(), &expected()).get(AnchorCorner::TopLeft).is_some());

        let strict = AnchorDetector::new(AnchorParams {
            otsu_fallback: false,
            ..AnchorParams::default()
        });
        assert!(strict.detect(&img.view(), &expected()).get(AnchorCorner::TopLeft).is_none());
    }
}
