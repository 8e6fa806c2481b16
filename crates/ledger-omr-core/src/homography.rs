//! Planar homographies between sheet space and image space.

use nalgebra::{DMatrix, Matrix3, Point2, SMatrix, SVector, Vector3};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{sample_bilinear_u8, GrayImage, GrayImageView};

/// Projective transform with `dst ~ H * src`, scaled so `H[2][2] == 1`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    pub fn identity() -> Self {
        Self::new(Matrix3::identity())
    }

    #[inline]
    pub fn apply(&self, p: Point2<f32>) -> Point2<f32> {
        let v = self.h * Vector3::new(f64::from(p.x), f64::from(p.y), 1.0);
        Point2::new((v.x / v.z) as f32, (v.y / v.z) as f32)
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().and_then(unit_scale).map(Self::new)
    }

    /// Chain two transforms: `self` after `first`.
    pub fn compose(&self, first: &Homography) -> Option<Self> {
        unit_scale(self.h * first.h).map(Self::new)
    }
}

fn unit_scale(h: Matrix3<f64>) -> Option<Matrix3<f64>> {
    let s = h[(2, 2)];
    (s.abs() > 1e-12 && h.iter().all(|v| v.is_finite())).then(|| h / s)
}

/// Similarity that moves a point set to its centroid with RMS radius √2.
struct Conditioner {
    t: Matrix3<f64>,
}

impl Conditioner {
    fn fit(pts: &[Point2<f32>]) -> Self {
        let n = pts.len().max(1) as f64;
        let cx = pts.iter().map(|p| f64::from(p.x)).sum::<f64>() / n;
        let cy = pts.iter().map(|p| f64::from(p.y)).sum::<f64>() / n;
        let ms = pts
            .iter()
            .map(|p| (f64::from(p.x) - cx).powi(2) + (f64::from(p.y) - cy).powi(2))
            .sum::<f64>()
            / n;
        let s = if ms > 1e-24 { (2.0 / ms).sqrt() } else { 1.0 };
        Self {
            t: Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0),
        }
    }

    fn apply(&self, p: Point2<f32>) -> (f64, f64) {
        let v = self.t * Vector3::new(f64::from(p.x), f64::from(p.y), 1.0);
        (v.x, v.y)
    }

    /// Undo conditioning on both sides: `T_dst⁻¹ · Hn · T_src`.
    fn lift(src: &Self, dst: &Self, hn: Matrix3<f64>) -> Option<Homography> {
        let dst_inv = dst.t.try_inverse()?;
        unit_scale(dst_inv * hn * src.t).map(Homography::new)
    }
}

/// Exact homography through four correspondences, `[TL, TR, BR, BL]` on
/// both sides. `None` when three points are collinear or the solve is
/// singular.
pub fn homography_from_4pt(src: &[Point2<f32>; 4], dst: &[Point2<f32>; 4]) -> Option<Homography> {
    let cs = Conditioner::fit(src);
    let cd = Conditioner::fit(dst);

    // h33 fixed to 1: eight unknowns, two rows per correspondence
    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();
    for (k, (s, d)) in src.iter().zip(dst).enumerate() {
        let (x, y) = cs.apply(*s);
        let (u, v) = cd.apply(*d);
        a.set_row(
            2 * k,
            &SMatrix::<f64, 1, 8>::from_row_slice(&[x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y]),
        );
        a.set_row(
            2 * k + 1,
            &SMatrix::<f64, 1, 8>::from_row_slice(&[0.0, 0.0, 0.0, x, y, 1.0, -v * x, -v * y]),
        );
        b[2 * k] = u;
        b[2 * k + 1] = v;
    }

    let sol = a.lu().solve(&b)?;
    let hn = Matrix3::new(sol[0], sol[1], sol[2], sol[3], sol[4], sol[5], sol[6], sol[7], 1.0);
    Conditioner::lift(&cs, &cd, hn)
}

/// Least-squares homography from four or more correspondences (DLT on
/// conditioned points).
pub fn fit_homography(src: &[Point2<f32>], dst: &[Point2<f32>]) -> Option<Homography> {
    if src.len() != dst.len() || src.len() < 4 {
        return None;
    }
    if let (Ok(s4), Ok(d4)) = (
        <&[Point2<f32>; 4]>::try_from(src),
        <&[Point2<f32>; 4]>::try_from(dst),
    ) {
        return homography_from_4pt(s4, d4);
    }

    let cs = Conditioner::fit(src);
    let cd = Conditioner::fit(dst);
    let mut a = DMatrix::<f64>::zeros(2 * src.len(), 9);
    for (k, (s, d)) in src.iter().zip(dst).enumerate() {
        let (x, y) = cs.apply(*s);
        let (u, v) = cd.apply(*d);
        let rows = [
            [x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y, -u],
            [0.0, 0.0, 0.0, x, y, 1.0, -v * x, -v * y, -v],
        ];
        for (r, row) in rows.iter().enumerate() {
            for (c, val) in row.iter().enumerate() {
                a[(2 * k + r, c)] = *val;
            }
        }
    }

    // null vector of A: right singular vector of the smallest singular value
    let svd = a.svd(false, true);
    let v_t = svd.v_t?;
    let (smallest, _) = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))?;
    let h = v_t.row(smallest);
    let hn = Matrix3::from_iterator(h.iter().copied()).transpose();
    Conditioner::lift(&cs, &cd, hn)
}

/// Resample `src` onto an `out_w x out_h` canvas. Each output pixel `p`
/// reads `src` at `h_src_from_dst(p)` with bilinear interpolation; samples
/// outside `src` read as `fill`.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(src, h_src_from_dst), fields(out_w, out_h))
)]
pub fn warp_perspective_gray(
    src: &GrayImageView<'_>,
    h_src_from_dst: Homography,
    out_w: usize,
    out_h: usize,
    fill: u8,
) -> GrayImage {
    let mut out = GrayImage::filled(out_w, out_h, fill);
    if out_w == 0 {
        return out;
    }
    for (y, row) in out.data.chunks_exact_mut(out_w).enumerate() {
        for (x, px) in row.iter_mut().enumerate() {
            let p = h_src_from_dst.apply(Point2::new(x as f32, y as f32));
            if p.x.is_finite() && p.y.is_finite() {
                *px = sample_bilinear_u8(src, p.x, p.y, fill);
            }
        }
    }
    out
}
