//! Small planar-geometry helpers shared by the contour, template and
//! rectification code.

use nalgebra::Point2;

/// Signed shoelace area. Positive for clockwise order in image coordinates
/// (y pointing down).
pub fn signed_area(poly: &[Point2<f32>]) -> f32 {
    let n = poly.len();
    if n < 3 {
        return 0.0;
    }
    let mut acc = 0.0f64;
    for i in 0..n {
        let a = poly[i];
        let b = poly[(i + 1) % n];
        acc += a.x as f64 * b.y as f64 - b.x as f64 * a.y as f64;
    }
    (0.5 * acc) as f32
}

#[inline]
pub fn polygon_area(poly: &[Point2<f32>]) -> f32 {
    signed_area(poly).abs()
}

/// Closed-polygon perimeter.
pub fn arc_length(poly: &[Point2<f32>]) -> f32 {
    let n = poly.len();
    if n < 2 {
        return 0.0;
    }
    (0..n)
        .map(|i| distance(poly[i], poly[(i + 1) % n]))
        .sum()
}

#[inline]
pub fn distance(a: Point2<f32>, b: Point2<f32>) -> f32 {
    (b - a).norm()
}

#[inline]
fn cross(o: Point2<f32>, a: Point2<f32>, b: Point2<f32>) -> f32 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// True when all turns of the closed polygon have the same orientation.
///
/// Collinear vertices are ignored; fewer than three vertices is not convex.
pub fn is_convex(poly: &[Point2<f32>]) -> bool {
    let n = poly.len();
    if n < 3 {
        return false;
    }
    let mut sign = 0i8;
    for i in 0..n {
        let c = cross(poly[i], poly[(i + 1) % n], poly[(i + 2) % n]);
        if c.abs() <= f32::EPSILON {
            continue;
        }
        let s = if c > 0.0 { 1 } else { -1 };
        if sign == 0 {
            sign = s;
        } else if s != sign {
            return false;
        }
    }
    sign != 0
}

/// Smallest triangle area formed by any three of the four points, relative
/// to the quad area. Near zero means three points are (almost) collinear.
pub fn min_triangle_ratio(quad: &[Point2<f32>; 4]) -> f32 {
    let area = polygon_area(quad);
    if area <= f32::EPSILON {
        return 0.0;
    }
    let mut min_tri = f32::INFINITY;
    for skip in 0..4 {
        let tri: Vec<Point2<f32>> = (0..4).filter(|&k| k != skip).map(|k| quad[k]).collect();
        min_tri = min_tri.min(polygon_area(&tri));
    }
    min_tri / area
}

/// Side lengths of a quad in order `[p0p1, p1p2, p2p3, p3p0]`.
pub fn quad_sides(quad: &[Point2<f32>; 4]) -> [f32; 4] {
    [
        distance(quad[0], quad[1]),
        distance(quad[1], quad[2]),
        distance(quad[2], quad[3]),
        distance(quad[3], quad[0]),
    ]
}

/// Area-weighted centroid; falls back to the vertex mean for degenerate input.
pub fn polygon_centroid(poly: &[Point2<f32>]) -> Option<Point2<f32>> {
    if poly.is_empty() {
        return None;
    }
    let a = signed_area(poly) as f64;
    if a.abs() < 1e-9 {
        let n = poly.len() as f32;
        let sx: f32 = poly.iter().map(|p| p.x).sum();
        let sy: f32 = poly.iter().map(|p| p.y).sum();
        return Some(Point2::new(sx / n, sy / n));
    }
    let mut cx = 0.0f64;
    let mut cy = 0.0f64;
    let n = poly.len();
    for i in 0..n {
        let p = poly[i];
        let q = poly[(i + 1) % n];
        let f = p.x as f64 * q.y as f64 - q.x as f64 * p.y as f64;
        cx += (p.x as f64 + q.x as f64) * f;
        cy += (p.y as f64 + q.y as f64) * f;
    }
    Some(Point2::new((cx / (6.0 * a)) as f32, (cy / (6.0 * a)) as f32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square(s: f32) -> [Point2<f32>; 4] {
        [
            Point2::new(0.0, 0.0),
            Point2::new(s, 0.0),
            Point2::new(s, s),
            Point2::new(0.0, s),
        ]
    }

    #[test]
    fn clockwise_square_has_positive_area() {
        assert_relative_eq!(signed_area(&square(10.0)), 100.0);
        let mut rev = square(10.0);
        rev.reverse();
        assert_relative_eq!(signed_area(&rev), -100.0);
    }

    #[test]
    fn bow_tie_is_not_convex() {
        let q = [
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(10.0, 0.0),
            Point2::new(0.0, 10.0),
        ];
        assert!(!is_convex(&q));
        assert!(is_convex(&square(3.0)));
    }

    #[test]
    fn collinear_triple_has_zero_triangle_ratio() {
        let q = [
            Point2::new(0.0, 0.0),
            Point2::new(5.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(5.0, 10.0),
        ];
        assert!(min_triangle_ratio(&q) < 1e-6);
        assert_relative_eq!(min_triangle_ratio(&square(4.0)), 0.5);
    }

    #[test]
    fn centroid_of_square() {
        let c = polygon_centroid(&square(8.0)).expect("centroid");
        assert_relative_eq!(c.x, 4.0);
        assert_relative_eq!(c.y, 4.0);
        assert_relative_eq!(arc_length(&square(8.0)), 32.0);
    }
}
