use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::geometry::{is_convex, min_triangle_ratio, polygon_area};
use crate::{fit_homography, warp_perspective_gray, GrayImage, GrayImageView, Homography, Template};

#[derive(Debug, Error, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RectifyError {
    #[error("anchor quadrilateral is degenerate")]
    Degenerate,
    #[error("homography solve is singular")]
    Singular,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RectifyParams {
    /// Smallest accepted quad area in image pixels.
    pub min_area_px: f32,
    /// Smallest accepted triangle/quad area ratio (0.5 for a square).
    pub min_triangle_ratio: f32,
    /// Value for canvas pixels that map outside the source image.
    pub fill: u8,
}

impl Default for RectifyParams {
    fn default() -> Self {
        Self {
            min_area_px: 64.0,
            min_triangle_ratio: 0.02,
            fill: 255,
        }
    }
}

/// Fronto-parallel sheet in template coordinates.
#[derive(Clone, Debug)]
pub struct RectifiedSheet {
    pub image: GrayImage,
    /// Maps sheet (canvas) coordinates into the source image.
    pub h_img_from_sheet: Homography,
}

impl RectifiedSheet {
    #[inline]
    pub fn sheet_to_image(&self, p: Point2<f32>) -> Point2<f32> {
        self.h_img_from_sheet.apply(p)
    }

    pub fn view(&self) -> GrayImageView<'_> {
        self.image.view()
    }
}

fn check_quad(quad: &[Point2<f32>; 4], params: &RectifyParams) -> Result<(), RectifyError> {
    if quad.iter().any(|p| !(p.x.is_finite() && p.y.is_finite())) {
        return Err(RectifyError::Degenerate);
    }
    if polygon_area(quad) < params.min_area_px
        || !is_convex(quad)
        || min_triangle_ratio(quad) < params.min_triangle_ratio
    {
        return Err(RectifyError::Degenerate);
    }
    Ok(())
}

/// Warp the sheet bounded by `anchors` (image pixels, clockwise TL, TR, BR,
/// BL) onto a `ceil(sheet_width) x ceil(sheet_height)` canvas where each
/// anchor lands on its template position.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(src, anchors, template, params))
)]
pub fn rectify_sheet(
    src: &GrayImageView<'_>,
    anchors: &[Point2<f32>; 4],
    template: &Template,
    params: &RectifyParams,
) -> Result<RectifiedSheet, RectifyError> {
    check_quad(anchors, params)?;

    let sheet_pts = template.anchors.points();
    let h_img_from_sheet =
        fit_homography(&sheet_pts, anchors).ok_or(RectifyError::Singular)?;

    let (out_w, out_h) = template.canvas_size();
    log::debug!(
        "rectifying {}x{} frame onto {}x{} canvas",
        src.width,
        src.height,
        out_w,
        out_h
    );
    let image = warp_perspective_gray(src, h_img_from_sheet, out_w, out_h, params.fill);

    Ok(RectifiedSheet {
        image,
        h_img_from_sheet,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AnchorLayout, Template};

    fn template() -> Template {
        Template::new(
            200.0,
            100.0,
            AnchorLayout::sheet_corners(200.0, 100.0),
            2,
            vec![],
        )
        .expect("template")
    }

    #[test]
    fn axis_aligned_quad_crops_and_scales() {
        // left half dark, right half light, sheet occupies [10, 109] x [20, 69]
        let mut img = GrayImage::filled(130, 90, 255);
        for y in 20..70 {
            for x in 10..110 {
                img.put(x, y, if x < 60 { 0 } else { 200 });
            }
        }
        let quad = [
            Point2::new(10.0, 20.0),
            Point2::new(110.0, 20.0),
            Point2::new(110.0, 70.0),
            Point2::new(10.0, 70.0),
        ];
        let sheet = rectify_sheet(&img.view(), &quad, &template(), &RectifyParams::default())
            .expect("rectified");
        assert_eq!((sheet.image.width, sheet.image.height), (200, 100));
        assert_eq!(sheet.image.view().get(20, 50), 0);
        assert_eq!(sheet.image.view().get(180, 50), 200);
        let p = sheet.sheet_to_image(Point2::new(200.0, 100.0));
        assert!((p.x - 110.0).abs() < 1e-3 && (p.y - 70.0).abs() < 1e-3);
    }

    #[test]
    fn collapsed_or_crossed_quads_are_rejected() {
        let img = GrayImage::filled(50, 50, 255);
        let params = RectifyParams::default();
        let collinear = [
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(20.0, 20.0),
            Point2::new(30.0, 30.0),
        ];
        assert_eq!(
            rectify_sheet(&img.view(), &collinear, &template(), &params).unwrap_err(),
            RectifyError::Degenerate
        );
        let bow_tie = [
            Point2::new(0.0, 0.0),
            Point2::new(40.0, 40.0),
            Point2::new(40.0, 0.0),
            Point2::new(0.0, 40.0),
        ];
        assert_eq!(
            rectify_sheet(&img.view(), &bow_tie, &template(), &params).unwrap_err(),
            RectifyError::Degenerate
        );
    }
}
