//! Pixel sampling inside discs and rings.

use ledger_omr_core::threshold::{histogram, percentile_from_histogram};
use ledger_omr_core::{GrayImageView, OptionBox};

/// Pixel centres within `[r_in, r_out]` of `(cx, cy)` that lie in the image.
fn annulus_pixels<'a>(
    img: &'a GrayImageView<'a>,
    cx: f32,
    cy: f32,
    r_in: f32,
    r_out: f32,
) -> impl Iterator<Item = u8> + 'a {
    let x0 = (cx - r_out).floor() as i32;
    let x1 = (cx + r_out).ceil() as i32;
    let y0 = (cy - r_out).floor() as i32;
    let y1 = (cy + r_out).ceil() as i32;
    let (in2, out2) = (r_in * r_in, r_out * r_out);
    (y0..=y1).flat_map(move |y| {
        (x0..=x1).filter_map(move |x| {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            let d2 = dx * dx + dy * dy;
            if d2 < in2 || d2 > out2 {
                return None;
            }
            img.get_checked(x, y)
        })
    })
}

/// Fraction of pixels in the sampled disc darker than `dark_below`.
/// Zero when the disc misses the image.
pub fn disc_fill(img: &GrayImageView<'_>, bubble: &OptionBox, radius_frac: f32, dark_below: f32) -> f32 {
    let r = bubble.radius * radius_frac;
    let mut total = 0usize;
    let mut dark = 0usize;
    for v in annulus_pixels(img, bubble.x, bubble.y, 0.0, r) {
        total += 1;
        if (v as f32) < dark_below {
            dark += 1;
        }
    }
    if total == 0 {
        return 0.0;
    }
    dark as f32 / total as f32
}

/// Median of the paper ring around a bubble.
pub fn ring_median(img: &GrayImageView<'_>, bubble: &OptionBox, inner_frac: f32, outer_frac: f32) -> Option<u8> {
    let (hist, n) = histogram(annulus_pixels(
        img,
        bubble.x,
        bubble.y,
        bubble.radius * inner_frac,
        bubble.radius * outer_frac,
    ));
    percentile_from_histogram(&hist, n, 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ledger_omr_core::GrayImage;

    fn bubble(x: f32, y: f32) -> OptionBox {
        OptionBox { x, y, radius: 8.0 }
    }

    #[test]
    fn fill_of_solid_and_blank_discs() {
        let mut img = GrayImage::filled(40, 40, 230);
        for y in 0..40 {
            for x in 0..20 {
                img.put(x, y, 20);
            }
        }
        let view = img.view();
        assert_relative_eq!(disc_fill(&view, &bubble(8.0, 20.0), 0.75, 150.0), 1.0);
        assert_relative_eq!(disc_fill(&view, &bubble(32.0, 20.0), 0.75, 150.0), 0.0);
        let half = disc_fill(&view, &bubble(19.5, 20.0), 0.75, 150.0);
        assert!((half - 0.5).abs() < 0.1, "fill {half}");
    }

    #[test]
    fn disc_outside_the_image_reads_empty() {
        let img = GrayImage::filled(10, 10, 0);
        assert_eq!(disc_fill(&img.view(), &bubble(-50.0, -50.0), 0.75, 150.0), 0.0);
        assert!(ring_median(&img.view(), &bubble(-50.0, -50.0), 1.4, 1.9).is_none());
    }

    #[test]
    fn ring_ignores_the_bubble_itself() {
        let mut img = GrayImage::filled(60, 60, 210);
        for y in 22..=38 {
            for x in 22..=38 {
                img.put(x, y, 0);
            }
        }
        assert_eq!(ring_median(&img.view(), &bubble(30.0, 30.0), 1.4, 1.9), Some(210));
    }
}
