//! Synthetic answer sheets: a flat rendering of a template and a simple
//! perspective "camera" view of it.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::core::{homography_from_4pt, warp_perspective_gray, GrayImage, Homography, OptionBox, Template};
use crate::grade::DetectedAnswers;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderStyle {
    /// Output pixels per sheet unit.
    pub scale: f32,
    /// Side of the square anchors in sheet units.
    pub anchor_size: f32,
    pub paper: u8,
    pub ink: u8,
    /// Gray level of the printed bubble outlines.
    pub outline: u8,
    pub outline_width: f32,
    /// Marked bubbles are filled out to this fraction of their radius.
    pub mark_coverage: f32,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            scale: 1.0,
            anchor_size: 31.0,
            paper: 245,
            ink: 30,
            outline: 170,
            outline_width: 1.5,
            mark_coverage: 0.9,
        }
    }
}

/// Draw `template` with the options in `answers` filled in. Enrollment
/// bubbles are drawn empty; see [`render_enrollment`].
pub fn render_sheet(template: &Template, answers: &DetectedAnswers, style: &RenderStyle) -> GrayImage {
    let s = style.scale.max(f32::EPSILON);
    let w = (template.sheet_width * s).ceil().max(1.0) as usize;
    let h = (template.sheet_height * s).ceil().max(1.0) as usize;
    let mut img = GrayImage::filled(w, h, style.paper);

    let half = 0.5 * style.anchor_size * s;
    for p in template.anchors.points() {
        fill_square(&mut img, p.x * s, p.y * s, half, style.ink);
    }

    for (index, q) in template.questions.iter().enumerate() {
        let marked = answers.get(&index);
        for (option, b) in q.options.iter().enumerate() {
            let filled = marked.is_some_and(|m| m.contains(&option));
            draw_bubble(&mut img, b, s, filled, style);
        }
    }

    if let Some(grid) = &template.enrollment_grid {
        for col in &grid.columns {
            for b in &col.digits {
                draw_bubble(&mut img, b, s, false, style);
            }
        }
    }
    img
}

/// Fill one digit per enrollment column on an already rendered sheet.
/// Characters that are not ASCII digits leave their column blank.
pub fn render_enrollment(img: &mut GrayImage, template: &Template, number: &str, style: &RenderStyle) {
    let Some(grid) = &template.enrollment_grid else {
        return;
    };
    let s = style.scale.max(f32::EPSILON);
    for (col, ch) in grid.columns.iter().zip(number.chars()) {
        if let Some(b) = ch.to_digit(10).and_then(|d| col.digits.get(d as usize)) {
            draw_bubble(img, b, s, true, style);
        }
    }
}

/// Corners of a sheet seen by a camera tilted about the horizontal axis:
/// the top edge is shortened by `keystone` (a fraction of the width).
pub fn keystone_corners(out_w: usize, out_h: usize, margin: f32, keystone: f32) -> [Point2<f32>; 4] {
    let (w, h) = (out_w as f32, out_h as f32);
    let inset = 0.5 * keystone.clamp(0.0, 0.9) * (w - 2.0 * margin);
    [
        Point2::new(margin + inset, margin),
        Point2::new(w - margin - inset, margin),
        Point2::new(w - margin, h - margin),
        Point2::new(margin, h - margin),
    ]
}

/// Project a flat sheet so its corners land on `corners` (clockwise from
/// top-left) in an `out_w x out_h` frame. Returns the frame and the
/// sheet-to-frame homography, or `None` for a degenerate quad.
pub fn project_sheet(
    sheet: &GrayImage,
    corners: &[Point2<f32>; 4],
    out_w: usize,
    out_h: usize,
    fill: u8,
) -> Option<(GrayImage, Homography)> {
    let (w, h) = (sheet.width as f32, sheet.height as f32);
    let sheet_corners = [
        Point2::new(0.0, 0.0),
        Point2::new(w, 0.0),
        Point2::new(w, h),
        Point2::new(0.0, h),
    ];
    let h_frame_from_sheet = homography_from_4pt(&sheet_corners, corners)?;
    let h_sheet_from_frame = h_frame_from_sheet.inverse()?;
    let frame = warp_perspective_gray(&sheet.view(), h_sheet_from_frame, out_w, out_h, fill);
    Some((frame, h_frame_from_sheet))
}

fn fill_square(img: &mut GrayImage, cx: f32, cy: f32, half: f32, v: u8) {
    let x0 = (cx - half).ceil().max(0.0) as usize;
    let y0 = (cy - half).ceil().max(0.0) as usize;
    let x1 = ((cx + half).floor() as usize).min(img.width.saturating_sub(1));
    let y1 = ((cy + half).floor() as usize).min(img.height.saturating_sub(1));
    for y in y0..=y1 {
        for x in x0..=x1 {
            img.put(x, y, v);
        }
    }
}

fn draw_bubble(img: &mut GrayImage, b: &OptionBox, s: f32, filled: bool, style: &RenderStyle) {
    let (cx, cy, r) = (b.x * s, b.y * s, b.radius * s);
    let half_w = 0.5 * style.outline_width * s;
    let inner = r * style.mark_coverage;
    let reach = (r + half_w).ceil() as i64;

    for dy in -reach..=reach {
        for dx in -reach..=reach {
            let x = cx.round() as i64 + dx;
            let y = cy.round() as i64 + dy;
            if x < 0 || y < 0 || x as usize >= img.width || y as usize >= img.height {
                continue;
            }
            let d = ((x as f32 - cx).powi(2) + (y as f32 - cy).powi(2)).sqrt();
            if filled && d <= inner {
                img.put(x as usize, y as usize, style.ink);
            } else if (d - r).abs() <= half_w {
                img.put(x as usize, y as usize, style.outline);
            }
        }
    }
}
