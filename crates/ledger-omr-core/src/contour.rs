//! Connected components, outer-boundary tracing and polygon approximation.
//!
//! These are the contour primitives the anchor detector needs: label dark
//! blobs, follow each blob's outer boundary in order, simplify it to a
//! polygon and measure the polygon's shape.

use std::collections::VecDeque;

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::geometry::{arc_length, is_convex, polygon_area, polygon_centroid};
use crate::threshold::BinaryMask;

/// 8-neighbourhood in clockwise order (image coordinates, y down), starting east.
const DIRS: [(i32, i32); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

/// One 8-connected foreground component.
#[derive(Clone, Debug)]
pub struct Component {
    /// Label in the owning [`ComponentLabels`] (1-based; 0 is background).
    pub label: u32,
    /// First pixel in raster order; its west neighbour is background.
    pub start: (i32, i32),
    pub pixel_count: usize,
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
    /// Mean pixel position.
    pub centroid: Point2<f32>,
}

/// Label image produced by [`find_components`].
#[derive(Clone, Debug)]
pub struct ComponentLabels {
    pub width: usize,
    pub height: usize,
    pub labels: Vec<u32>,
}

impl ComponentLabels {
    #[inline]
    fn is(&self, x: i32, y: i32, label: u32) -> bool {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return false;
        }
        self.labels[y as usize * self.width + x as usize] == label
    }
}

/// Label 8-connected foreground components.
pub fn find_components(mask: &BinaryMask) -> (ComponentLabels, Vec<Component>) {
    let w = mask.width;
    let h = mask.height;
    let mut labels = vec![0u32; w * h];
    let mut comps = Vec::new();
    let mut queue = VecDeque::new();

    for y0 in 0..h {
        for x0 in 0..w {
            let idx0 = y0 * w + x0;
            if !mask.data[idx0] || labels[idx0] != 0 {
                continue;
            }
            let label = comps.len() as u32 + 1;
            labels[idx0] = label;
            queue.push_back((x0 as i32, y0 as i32));

            let mut count = 0usize;
            let (mut sx, mut sy) = (0f64, 0f64);
            let (mut min_x, mut min_y) = (x0 as i32, y0 as i32);
            let (mut max_x, mut max_y) = (x0 as i32, y0 as i32);

            while let Some((x, y)) = queue.pop_front() {
                count += 1;
                sx += x as f64;
                sy += y as f64;
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);

                for (dx, dy) in DIRS {
                    let (nx, ny) = (x + dx, y + dy);
                    if !mask.get(nx, ny) {
                        continue;
                    }
                    let nidx = ny as usize * w + nx as usize;
                    if labels[nidx] == 0 {
                        labels[nidx] = label;
                        queue.push_back((nx, ny));
                    }
                }
            }

            comps.push(Component {
                label,
                start: (x0 as i32, y0 as i32),
                pixel_count: count,
                min_x,
                min_y,
                max_x,
                max_y,
                centroid: Point2::new((sx / count as f64) as f32, (sy / count as f64) as f32),
            });
        }
    }

    (
        ComponentLabels {
            width: w,
            height: h,
            labels,
        },
        comps,
    )
}

/// Ordered outer boundary of a component (Moore-neighbour tracing with
/// Jacob's stopping criterion). Points are pixel centres, clockwise.
pub fn trace_boundary(labels: &ComponentLabels, comp: &Component) -> Vec<Point2<f32>> {
    let label = comp.label;
    let start = comp.start;
    let start_back = (start.0 - 1, start.1);

    let mut contour = vec![Point2::new(start.0 as f32, start.1 as f32)];
    let mut p = start;
    let mut back = start_back;
    // Each boundary pixel is entered at most a few times.
    let max_steps = 4 * comp.pixel_count + 8;

    for _ in 0..max_steps {
        let dx = back.0 - p.0;
        let dy = back.1 - p.1;
        let Some(k) = DIRS.iter().position(|&d| d == (dx, dy)) else {
            break;
        };

        let mut next = None;
        for i in 1..=8 {
            let (ox, oy) = DIRS[(k + i) % 8];
            let c = (p.0 + ox, p.1 + oy);
            if labels.is(c.0, c.1, label) {
                let (bx, by) = DIRS[(k + i - 1) % 8];
                next = Some((c, (p.0 + bx, p.1 + by)));
                break;
            }
        }

        let Some((np, nb)) = next else {
            // isolated pixel
            break;
        };
        p = np;
        back = nb;
        if p == start && back == start_back {
            break;
        }
        contour.push(Point2::new(p.0 as f32, p.1 as f32));
    }

    contour
}

fn perpendicular_distance(p: Point2<f32>, a: Point2<f32>, b: Point2<f32>) -> f32 {
    let ab = b - a;
    let len = ab.norm();
    if len <= f32::EPSILON {
        return (p - a).norm();
    }
    ((p.x - a.x) * ab.y - (p.y - a.y) * ab.x).abs() / len
}

fn douglas_peucker(points: &[Point2<f32>], epsilon: f32, out: &mut Vec<Point2<f32>>) {
    let n = points.len();
    if n < 3 {
        out.push(points[0]);
        return;
    }
    let (first, last) = (points[0], points[n - 1]);
    let mut max_d = 0.0f32;
    let mut idx = 0usize;
    for (i, &p) in points.iter().enumerate().take(n - 1).skip(1) {
        let d = perpendicular_distance(p, first, last);
        if d > max_d {
            max_d = d;
            idx = i;
        }
    }
    if max_d > epsilon {
        douglas_peucker(&points[..=idx], epsilon, out);
        douglas_peucker(&points[idx..], epsilon, out);
    } else {
        out.push(first);
    }
}

/// Douglas-Peucker simplification of a closed contour.
///
/// The contour is split at its first point and the point farthest from it,
/// and each half is simplified independently.
pub fn approx_polygon(contour: &[Point2<f32>], epsilon: f32) -> Vec<Point2<f32>> {
    let n = contour.len();
    if n < 3 {
        return contour.to_vec();
    }
    let origin = contour[0];
    let far = contour
        .iter()
        .enumerate()
        .max_by(|a, b| {
            (a.1 - origin)
                .norm_squared()
                .partial_cmp(&(b.1 - origin).norm_squared())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(i, _)| i)
        .unwrap_or(0);
    if far == 0 {
        return vec![origin];
    }

    let mut out = Vec::new();
    douglas_peucker(&contour[..=far], epsilon, &mut out);
    let mut second: Vec<Point2<f32>> = contour[far..].to_vec();
    second.push(origin);
    douglas_peucker(&second, epsilon, &mut out);
    out
}

/// Shape descriptors of a traced blob.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShapeMetrics {
    pub vertices: usize,
    pub convex: bool,
    /// Bounding-box width / height.
    pub aspect: f32,
    /// Contour area / bounding-box area.
    pub solidity: f32,
    /// Contour (polygon) area in pixels².
    pub area: f32,
    /// `4π·area / perimeter²`; 1 for a circle, π/4 for a square.
    pub circularity: f32,
    pub centroid: Point2<f32>,
}

/// Measure a component: trace, simplify with `epsilon_frac * perimeter`, and
/// compute the descriptors. `None` for components too thin to have an area.
pub fn measure_component(
    labels: &ComponentLabels,
    comp: &Component,
    epsilon_frac: f32,
) -> Option<ShapeMetrics> {
    let contour = trace_boundary(labels, comp);
    if contour.len() < 3 {
        return None;
    }
    let area = polygon_area(&contour);
    let perimeter = arc_length(&contour);
    let bw = (comp.max_x - comp.min_x) as f32;
    let bh = (comp.max_y - comp.min_y) as f32;
    if area <= 0.0 || perimeter <= 0.0 || bw <= 0.0 || bh <= 0.0 {
        return None;
    }

    let poly = approx_polygon(&contour, epsilon_frac * perimeter);
    let centroid = polygon_centroid(&contour).unwrap_or(comp.centroid);

    Some(ShapeMetrics {
        vertices: poly.len(),
        convex: is_convex(&poly),
        aspect: bw / bh,
        solidity: area / (bw * bh),
        area,
        circularity: 4.0 * std::f32::consts::PI * area / (perimeter * perimeter),
        centroid,
    })
}
