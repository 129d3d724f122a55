//! Drawing elements committed to the shared board.

use crate::geometry::polyline_bounds;
use kurbo::{Point, Rect, Vec2};
use peniko::Color;
use serde::{Deserialize, Serialize};

/// Server-assigned element identifier. Larger ids were created later.
pub type ElementId = u64;

/// Server-assigned participant identifier.
pub type ParticipantId = u64;

/// Serializable color representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    /// Parse `#rrggbb` or `#rrggbbaa`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#')?;
        let channel = |i: usize| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok();
        match digits.len() {
            6 => Some(Self::new(channel(0)?, channel(2)?, channel(4)?, 255)),
            8 => Some(Self::new(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
            _ => None,
        }
    }

    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl From<Color> for SerializableColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<SerializableColor> for Color {
    fn from(color: SerializableColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// Rendering attributes of an element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElementStyle {
    pub color: SerializableColor,
    /// Stroke width; half of it is the element's hit-test padding.
    pub stroke_width: f64,
}

impl ElementStyle {
    pub fn new(color: SerializableColor, stroke_width: f64) -> Self {
        Self {
            color,
            stroke_width,
        }
    }

    pub fn half_width(&self) -> f64 {
        self.stroke_width.max(0.0) / 2.0
    }

    /// Get the color as a peniko Color.
    pub fn peniko_color(&self) -> Color {
        self.color.into()
    }
}

impl Default for ElementStyle {
    fn default() -> Self {
        Self::new(SerializableColor::black(), 2.0)
    }
}

/// The kind of an element, fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Freehand,
    Line,
    Rectangle,
    Ellipse,
    Image,
}

/// Geometry of an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Shape {
    Freehand {
        points: Vec<Point>,
    },
    Line {
        start: Point,
        end: Point,
    },
    /// Rectangle outline spanned by two opposite corners.
    Rectangle {
        start: Point,
        end: Point,
    },
    Ellipse {
        center: Point,
        radius_x: f64,
        radius_y: f64,
    },
    Image {
        anchor: Point,
        width: f64,
        height: f64,
        source: String,
    },
}

impl Shape {
    pub fn kind(&self) -> ElementKind {
        match self {
            Shape::Freehand { .. } => ElementKind::Freehand,
            Shape::Line { .. } => ElementKind::Line,
            Shape::Rectangle { .. } => ElementKind::Rectangle,
            Shape::Ellipse { .. } => ElementKind::Ellipse,
            Shape::Image { .. } => ElementKind::Image,
        }
    }

    /// Axis-aligned extent of the geometry (stroke width not included).
    pub fn bounds(&self) -> Rect {
        match self {
            Shape::Freehand { points } => polyline_bounds(points).unwrap_or(Rect::ZERO),
            Shape::Line { start, end } | Shape::Rectangle { start, end } => {
                Rect::from_points(*start, *end)
            }
            Shape::Ellipse {
                center,
                radius_x,
                radius_y,
            } => {
                let (rx, ry) = (radius_x.abs(), radius_y.abs());
                Rect::new(center.x - rx, center.y - ry, center.x + rx, center.y + ry)
            }
            Shape::Image {
                anchor,
                width,
                height,
                ..
            } => Rect::from_points(*anchor, Point::new(anchor.x + width, anchor.y + height)),
        }
    }

    /// Translate every coordinate by `delta`.
    pub fn translated(&self, delta: Vec2) -> Shape {
        match self {
            Shape::Freehand { points } => Shape::Freehand {
                points: points.iter().map(|p| *p + delta).collect(),
            },
            Shape::Line { start, end } => Shape::Line {
                start: *start + delta,
                end: *end + delta,
            },
            Shape::Rectangle { start, end } => Shape::Rectangle {
                start: *start + delta,
                end: *end + delta,
            },
            Shape::Ellipse {
                center,
                radius_x,
                radius_y,
            } => Shape::Ellipse {
                center: *center + delta,
                radius_x: *radius_x,
                radius_y: *radius_y,
            },
            Shape::Image {
                anchor,
                width,
                height,
                source,
            } => Shape::Image {
                anchor: *anchor + delta,
                width: *width,
                height: *height,
                source: source.clone(),
            },
        }
    }

    /// Consecutive stroke segments of outlined kinds.
    ///
    /// A single-point freehand stroke yields one zero-length segment so it
    /// still forms a point for hit testing. Ellipses and images have no
    /// segments.
    pub fn segments(&self) -> Vec<(Point, Point)> {
        match self {
            Shape::Freehand { points } => match points.as_slice() {
                [] => Vec::new(),
                [only] => vec![(*only, *only)],
                _ => points.windows(2).map(|w| (w[0], w[1])).collect(),
            },
            Shape::Line { start, end } => vec![(*start, *end)],
            Shape::Rectangle { .. } => {
                let corners = self.corners();
                (0..4).map(|i| (corners[i], corners[(i + 1) % 4])).collect()
            }
            Shape::Ellipse { .. } | Shape::Image { .. } => Vec::new(),
        }
    }

    fn corners(&self) -> [Point; 4] {
        let r = self.bounds();
        [
            Point::new(r.x0, r.y0),
            Point::new(r.x1, r.y0),
            Point::new(r.x1, r.y1),
            Point::new(r.x0, r.y1),
        ]
    }
}

/// An element not yet assigned an id, as sent in an `add` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDraft {
    pub shape: Shape,
    pub style: ElementStyle,
}

impl ElementDraft {
    pub fn new(shape: Shape, style: ElementStyle) -> Self {
        Self { shape, style }
    }
}

/// A committed element. Bounds are derived from the shape on construction
/// and never set independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ElementRecord", into = "ElementRecord")]
pub struct Element {
    pub id: ElementId,
    shape: Shape,
    style: ElementStyle,
    bounds: Rect,
}

#[derive(Clone, Serialize, Deserialize)]
struct ElementRecord {
    id: ElementId,
    shape: Shape,
    style: ElementStyle,
}

impl From<ElementRecord> for Element {
    fn from(record: ElementRecord) -> Self {
        Element::new(record.id, record.shape, record.style)
    }
}

impl From<Element> for ElementRecord {
    fn from(element: Element) -> Self {
        Self {
            id: element.id,
            shape: element.shape,
            style: element.style,
        }
    }
}

impl Element {
    pub fn new(id: ElementId, shape: Shape, style: ElementStyle) -> Self {
        let bounds = shape.bounds();
        Self {
            id,
            shape,
            style,
            bounds,
        }
    }

    pub fn from_draft(id: ElementId, draft: ElementDraft) -> Self {
        Self::new(id, draft.shape, draft.style)
    }

    pub fn kind(&self) -> ElementKind {
        self.shape.kind()
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn style(&self) -> &ElementStyle {
        &self.style
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Copy of this element's content without its id.
    pub fn to_draft(&self) -> ElementDraft {
        ElementDraft::new(self.shape.clone(), self.style)
    }

    /// Copy under `new_id` with every coordinate shifted by `delta`.
    pub fn translated(&self, new_id: ElementId, delta: Vec2) -> Element {
        Element::new(new_id, self.shape.translated(delta), self.style)
    }

    /// Whether two elements have the same content, ignoring ids.
    pub fn same_content(&self, other: &Element) -> bool {
        self.shape == other.shape && self.style == other.style
    }
}
