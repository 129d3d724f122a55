//! Spatial queries over the document store.
//!
//! The server answers a query with a coarse bounding-box candidate set; the
//! query engine narrows it down locally with exact polygon tests.

use crate::element::{Element, ElementId, ElementKind, Shape};
use crate::geometry::{
    DEFAULT_SUBDIVISIONS, DEGENERATE_EPSILON, Polygon, Primitive, build_polygon,
    point_segment_distance_squared, polyline_bounds,
};
use crate::store::DocumentStore;
use kurbo::{Point, Rect};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// What a query is for; decides how the engine uses the matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    Eraser,
    Select,
    Expand,
    Deselect,
    Pipette,
}

/// How the query path is compared against elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    /// The element's outline touches the padded query path.
    #[default]
    Intersect,
    /// The element's bounds lie inside the padded query bounds.
    Contain,
}

/// A query path plus how to interpret it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub kind: QueryKind,
    pub path: Vec<Point>,
    /// Half-width of the query path.
    pub padding: f64,
    #[serde(default)]
    pub mode: QueryMode,
}

impl QueryRequest {
    pub fn new(kind: QueryKind, path: Vec<Point>, padding: f64) -> Self {
        Self {
            kind,
            path,
            padding,
            mode: QueryMode::Intersect,
        }
    }

    pub fn with_mode(mut self, mode: QueryMode) -> Self {
        self.mode = mode;
        self
    }

    /// Bounds of the query path grown by the padding.
    pub fn padded_bounds(&self) -> Option<Rect> {
        let padding = self.padding.max(0.0);
        polyline_bounds(&self.path).map(|r| r.inflate(padding, padding))
    }
}

/// Exact hit testing of query paths against elements.
#[derive(Debug, Clone, Copy)]
pub struct QueryEngine {
    subdivisions: usize,
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::new(DEFAULT_SUBDIVISIONS)
    }
}

impl QueryEngine {
    /// `subdivisions` is the vertex count used for ellipses and padded points.
    pub fn new(subdivisions: usize) -> Self {
        Self {
            subdivisions: subdivisions.max(3),
        }
    }

    /// Ids among `candidates` that the query matches, in candidate order.
    ///
    /// Unknown candidates are skipped. A path with fewer than two points
    /// matches nothing.
    pub fn query(
        &self,
        store: &DocumentStore,
        request: &QueryRequest,
        candidates: impl IntoIterator<Item = ElementId>,
    ) -> Vec<ElementId> {
        if request.path.len() < 2 {
            return Vec::new();
        }
        let path = QueryPath::new(self, request);
        candidates
            .into_iter()
            .filter(|id| {
                store.get(*id).is_some_and(|element| {
                    !(request.kind == QueryKind::Pipette && element.kind() == ElementKind::Image)
                        && path.matches(self, element)
                })
            })
            .collect()
    }

    fn polygon(&self, primitive: Primitive, radius: f64) -> Polygon {
        build_polygon(primitive, radius, self.subdivisions)
    }
}

/// A query path with its per-segment polygons prepared once.
struct QueryPath<'a> {
    request: &'a QueryRequest,
    padding: f64,
    bounds: Rect,
    segments: Vec<PathSegment>,
}

enum PathSegment {
    Point(Point),
    Polygon(Polygon),
}

impl<'a> QueryPath<'a> {
    fn new(engine: &QueryEngine, request: &'a QueryRequest) -> Self {
        let padding = request.padding.max(0.0);
        let segments = request
            .path
            .windows(2)
            .map(|w| {
                if (w[1] - w[0]).hypot2() < DEGENERATE_EPSILON {
                    PathSegment::Point(w[0])
                } else {
                    PathSegment::Polygon(engine.polygon(Primitive::Segment(w[0], w[1]), padding))
                }
            })
            .collect();
        Self {
            request,
            padding,
            bounds: request.padded_bounds().unwrap_or(Rect::ZERO),
            segments,
        }
    }

    fn matches(&self, engine: &QueryEngine, element: &Element) -> bool {
        match self.request.mode {
            QueryMode::Contain => self.contains(element.bounds()),
            QueryMode::Intersect => self.intersects(engine, element),
        }
    }

    fn contains(&self, bounds: Rect) -> bool {
        bounds.x0 >= self.bounds.x0
            && bounds.y0 >= self.bounds.y0
            && bounds.x1 <= self.bounds.x1
            && bounds.y1 <= self.bounds.y1
    }

    fn intersects(&self, engine: &QueryEngine, element: &Element) -> bool {
        let half_width = element.style().half_width();
        let reach = half_width + self.padding;
        let coarse = element.bounds().inflate(half_width, half_width);
        if coarse.x1 < self.bounds.x0
            || coarse.x0 > self.bounds.x1
            || coarse.y1 < self.bounds.y0
            || coarse.y0 > self.bounds.y1
        {
            return false;
        }

        match element.shape() {
            Shape::Image { .. } => false,
            Shape::Ellipse {
                center,
                radius_x,
                radius_y,
            } => {
                let outline = engine.polygon(
                    Primitive::Ellipse {
                        center: *center,
                        radius_x: *radius_x,
                        radius_y: *radius_y,
                    },
                    half_width,
                );
                self.segments.iter().any(|segment| match segment {
                    PathSegment::Point(p) => {
                        outline.intersects(&engine.polygon(Primitive::Point(*p), self.padding))
                    }
                    PathSegment::Polygon(poly) => outline.intersects(poly),
                })
            }
            shape @ (Shape::Freehand { .. } | Shape::Line { .. } | Shape::Rectangle { .. }) => {
                let pieces = shape.segments();
                let polygons: Vec<Polygon> = pieces
                    .iter()
                    .map(|&(a, b)| engine.polygon(Primitive::Segment(a, b), half_width))
                    .collect();
                self.segments.iter().any(|segment| match segment {
                    PathSegment::Point(p) => pieces
                        .iter()
                        .any(|&(a, b)| point_segment_distance_squared(*p, a, b) <= reach * reach),
                    PathSegment::Polygon(poly) => polygons.iter().any(|e| e.intersects(poly)),
                })
            }
        }
    }
}

/// Pick the element the pipette samples from `matches`.
///
/// The choice among several overlapping elements is uniformly random.
/// Images and ids no longer in the store are never picked.
pub fn pick_sample<'s, R: Rng + ?Sized>(
    store: &'s DocumentStore,
    matches: &[ElementId],
    rng: &mut R,
) -> Option<&'s Element> {
    let pool: Vec<&Element> = matches
        .iter()
        .filter_map(|id| store.get(*id))
        .filter(|e| e.kind() != ElementKind::Image)
        .collect();
    if pool.is_empty() {
        return None;
    }
    Some(pool[rng.random_range(0..pool.len())])
}
