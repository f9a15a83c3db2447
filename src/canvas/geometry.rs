use crate::graph::Node;
use serde::Serialize;

/// Rendered footprint of a node box in graph coordinates.
pub const NODE_WIDTH: f64 = 140.0;
pub const NODE_HEIGHT: f64 = 56.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }

    /// Anchor for outgoing edges.
    pub fn right_center(&self) -> Point {
        Point::new(self.x + self.width, self.y + self.height / 2.0)
    }

    /// Anchor for incoming edges.
    pub fn left_center(&self) -> Point {
        Point::new(self.x, self.y + self.height / 2.0)
    }
}

/// Bounding box of a node at its stored position.
pub fn node_rect(node: &Node) -> Rect {
    Rect::new(node.x, node.y, NODE_WIDTH, NODE_HEIGHT)
}

/// Pan/zoom state mapping graph coordinates to screen coordinates:
/// `screen = graph * scale + translate`. The inverse is what hit-testing
/// uses to take pointer positions back into graph space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewTransform {
    pub scale: f64,
    pub translate_x: f64,
    pub translate_y: f64,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            translate_x: 0.0,
            translate_y: 0.0,
        }
    }
}

impl ViewTransform {
    pub fn to_screen(&self, p: Point) -> Point {
        Point::new(p.x * self.scale + self.translate_x, p.y * self.scale + self.translate_y)
    }

    pub fn to_graph(&self, p: Point) -> Point {
        Point::new(
            (p.x - self.translate_x) / self.scale,
            (p.y - self.translate_y) / self.scale,
        )
    }
}

/// Cubic Bézier used for every edge: right-center of the source box to
/// left-center of the target box, with both control points pinned to the
/// horizontal midpoint so the curve leaves and enters horizontally.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EdgeCurve {
    pub start: Point,
    pub control1: Point,
    pub control2: Point,
    pub end: Point,
}

impl EdgeCurve {
    pub fn between(source: Rect, target: Rect) -> Self {
        let start = source.right_center();
        let end = target.left_center();
        let mid_x = (start.x + end.x) / 2.0;
        Self {
            start,
            control1: Point::new(mid_x, start.y),
            control2: Point::new(mid_x, end.y),
            end,
        }
    }

    /// Point on the curve for `t` in `0.0..=1.0`.
    pub fn point_at(&self, t: f64) -> Point {
        let u = 1.0 - t;
        let (b0, b1, b2, b3) = (u * u * u, 3.0 * u * u * t, 3.0 * u * t * t, t * t * t);
        Point::new(
            b0 * self.start.x + b1 * self.control1.x + b2 * self.control2.x + b3 * self.end.x,
            b0 * self.start.y + b1 * self.control1.y + b2 * self.control2.y + b3 * self.end.y,
        )
    }

    /// Where an edge label sits.
    pub fn midpoint(&self) -> Point {
        self.point_at(0.5)
    }

    pub fn transformed(&self, t: &ViewTransform) -> Self {
        Self {
            start: t.to_screen(self.start),
            control1: t.to_screen(self.control1),
            control2: t.to_screen(self.control2),
            end: t.to_screen(self.end),
        }
    }

    /// SVG path data for the curve.
    pub fn to_path(&self) -> String {
        format!(
            "M {:.1} {:.1} C {:.1} {:.1}, {:.1} {:.1}, {:.1} {:.1}",
            self.start.x,
            self.start.y,
            self.control1.x,
            self.control1.y,
            self.control2.x,
            self.control2.y,
            self.end.x,
            self.end.y
        )
    }
}
