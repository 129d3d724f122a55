//! Geometry kernel for hit testing.
//!
//! Everything here is pure: primitives are turned into padded convex polygons
//! and compared with a separating axis test. The query engine builds on these
//! functions; nothing in this module knows about elements or ids.

use kurbo::{Point, Rect, Vec2};
use std::f64::consts::TAU;

/// Squared lengths below this are treated as zero.
pub const DEGENERATE_EPSILON: f64 = 1e-7;

/// Angular subdivision count used to approximate round primitives.
pub const DEFAULT_SUBDIVISIONS: usize = 32;

/// Squared distance from `point` to the segment `start`→`end`.
///
/// Near-zero-length segments degenerate to the point-point distance.
pub fn point_segment_distance_squared(point: Point, start: Point, end: Point) -> f64 {
    let seg = end - start;
    let pv = point - start;
    let len_sq = seg.hypot2();
    if len_sq < DEGENERATE_EPSILON {
        return pv.hypot2();
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    let proj = start + seg * t;
    (point - proj).hypot2()
}

/// A primitive that can be turned into a convex polygon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Primitive {
    Point(Point),
    Segment(Point, Point),
    Ellipse {
        center: Point,
        radius_x: f64,
        radius_y: f64,
    },
}

/// Convex polygon with the edge normals used as candidate separating axes.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub vertices: Vec<Point>,
    pub axes: Vec<Vec2>,
}

impl Polygon {
    /// Whether this polygon is a bare point (no edges to test against).
    pub fn is_point(&self) -> bool {
        self.axes.is_empty()
    }

    /// Full SAT test using the axes of both polygons.
    pub fn intersects(&self, other: &Polygon) -> bool {
        let mut axes = Vec::with_capacity(self.axes.len() + other.axes.len());
        axes.extend_from_slice(&self.axes);
        axes.extend_from_slice(&other.axes);
        separating_axis_overlap(self, other, &axes)
    }
}

/// Build a convex polygon approximating `primitive`, padded outward by `radius`.
///
/// `subdivisions` controls how finely points and ellipses are approximated.
/// Zero-length segments fall back to the point case so no normal is ever
/// computed from a zero vector.
pub fn build_polygon(primitive: Primitive, radius: f64, subdivisions: usize) -> Polygon {
    let radius = radius.max(0.0);
    match primitive {
        Primitive::Point(center) => point_polygon(center, radius, subdivisions),
        Primitive::Segment(start, end) => {
            let seg = end - start;
            let len_sq = seg.hypot2();
            if len_sq < DEGENERATE_EPSILON {
                return point_polygon(start, radius, subdivisions);
            }
            let dir = seg / len_sq.sqrt();
            let normal = Vec2::new(-dir.y, dir.x);
            let along = dir * radius;
            let across = normal * radius;
            Polygon {
                vertices: vec![
                    start - along + across,
                    end + along + across,
                    end + along - across,
                    start - along - across,
                ],
                axes: vec![normal, dir],
            }
        }
        Primitive::Ellipse {
            center,
            radius_x,
            radius_y,
        } => {
            let rx = radius_x.abs() + radius;
            let ry = radius_y.abs() + radius;
            if rx * rx + ry * ry < DEGENERATE_EPSILON {
                return point_polygon(center, 0.0, subdivisions);
            }
            ring(center, rx, ry, subdivisions)
        }
    }
}

fn point_polygon(center: Point, radius: f64, subdivisions: usize) -> Polygon {
    if radius * radius < DEGENERATE_EPSILON {
        return Polygon {
            vertices: vec![center],
            axes: Vec::new(),
        };
    }
    ring(center, radius, radius, subdivisions)
}

/// Regular ring of vertices around `center`; axes are the edge normals.
fn ring(center: Point, rx: f64, ry: f64, subdivisions: usize) -> Polygon {
    let count = subdivisions.max(3);
    let vertices: Vec<Point> = (0..count)
        .map(|i| {
            let theta = TAU * i as f64 / count as f64;
            Point::new(center.x + rx * theta.cos(), center.y + ry * theta.sin())
        })
        .collect();

    // Opposite edges of an even ring are parallel, so half of them suffice.
    let distinct = if count % 2 == 0 { count / 2 } else { count };
    let axes = (0..distinct)
        .filter_map(|i| {
            let edge = vertices[(i + 1) % count] - vertices[i];
            let len_sq = edge.hypot2();
            if len_sq < DEGENERATE_EPSILON {
                return None;
            }
            let len = len_sq.sqrt();
            Some(Vec2::new(-edge.y / len, edge.x / len))
        })
        .collect();

    Polygon { vertices, axes }
}

/// Scalar interval covered by `polygon` projected onto `axis`.
pub fn project(polygon: &Polygon, axis: Vec2) -> (f64, f64) {
    polygon
        .vertices
        .iter()
        .map(|v| v.to_vec2().dot(axis))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), d| {
            (min.min(d), max.max(d))
        })
}

/// Separating axis test over the given candidate axes.
///
/// Returns false as soon as one axis separates the projections. The result
/// is only exact when `axes` contains the edge normals of both polygons.
/// Two bare points have no axes at all; they overlap only if they coincide.
pub fn separating_axis_overlap(a: &Polygon, b: &Polygon, axes: &[Vec2]) -> bool {
    if axes.is_empty() {
        return a.vertices.iter().any(|p| {
            b.vertices
                .iter()
                .any(|q| (*p - *q).hypot2() < DEGENERATE_EPSILON)
        });
    }
    for &axis in axes {
        let (a_min, a_max) = project(a, axis);
        let (b_min, b_max) = project(b, axis);
        if a_max < b_min || b_max < a_min {
            return false;
        }
    }
    true
}

/// Bounding box of a point sequence, `None` when empty.
pub fn polyline_bounds(points: &[Point]) -> Option<Rect> {
    let first = points.first()?;
    let mut rect = Rect::from_points(*first, *first);
    for p in &points[1..] {
        rect = rect.union_pt(*p);
    }
    Some(rect)
}
