pub mod geometry;

use crate::graph::{Graph, Node, NodeKind, NodeShape, NodeStatus};
use geometry::{node_rect, EdgeCurve, Point, Rect, ViewTransform, NODE_HEIGHT, NODE_WIDTH};
use serde::Serialize;
use std::collections::HashMap;

pub const ZOOM_MIN: f64 = 0.3;
pub const ZOOM_MAX: f64 = 3.0;
pub const ZOOM_STEP: f64 = 1.2;

/// Current selection. Selecting a node clears any edge selection and vice
/// versa; the properties panel renders whichever is active.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Selection {
    #[default]
    None,
    Node {
        id: String,
    },
    Edge {
        from: String,
        to: String,
    },
}

impl Selection {
    pub fn is_none(&self) -> bool {
        matches!(self, Selection::None)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Drag {
    Idle,
    /// Panning; `last` is the previous pointer position in screen space.
    Canvas { last: Point },
    /// Dragging a node; positions are in graph space. `origin` is the node
    /// position at drag start, `grab` the pointer position at drag start.
    Node {
        id: String,
        origin: Point,
        grab: Point,
        current: Point,
    },
}

/// Net node movement reported on pointer release. The graph itself is not
/// touched during the drag; the caller turns this into a move command.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveCommit {
    pub id: String,
    pub from: (f64, f64),
    pub to: (f64, f64),
}

/// Pan/zoom, selection and drag state for the canvas. Holds no graph data;
/// everything it reports is derived from the pointer stream and the graph
/// passed into each call.
#[derive(Debug)]
pub struct CanvasController {
    transform: ViewTransform,
    selection: Selection,
    drag: Drag,
}

impl Default for CanvasController {
    fn default() -> Self {
        Self::new()
    }
}

impl CanvasController {
    pub fn new() -> Self {
        Self {
            transform: ViewTransform::default(),
            selection: Selection::None,
            drag: Drag::Idle,
        }
    }

    pub fn transform(&self) -> &ViewTransform {
        &self.transform
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn zoom_in(&mut self) {
        self.transform.scale = (self.transform.scale * ZOOM_STEP).min(ZOOM_MAX);
    }

    pub fn zoom_out(&mut self) {
        self.transform.scale = (self.transform.scale / ZOOM_STEP).max(ZOOM_MIN);
    }

    pub fn reset_view(&mut self) {
        self.transform = ViewTransform::default();
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.transform.translate_x += dx;
        self.transform.translate_y += dy;
    }

    /// Topmost node under a screen-space pointer, if any. Later nodes render
    /// above earlier ones, so the scan runs back to front.
    pub fn hit_node<'a>(&self, graph: &'a Graph, screen: Point) -> Option<&'a Node> {
        let at = self.transform.to_graph(screen);
        graph.nodes().iter().rev().find(|n| node_rect(n).contains(at))
    }

    /// Pointer pressed on the canvas. A hit on a node selects it and arms a
    /// node drag; empty space clears the selection and starts a pan.
    pub fn pointer_down(&mut self, graph: &Graph, screen: Point) {
        let at = self.transform.to_graph(screen);
        match self.hit_node(graph, screen) {
            Some(node) => {
                let origin = Point::new(node.x, node.y);
                self.selection = Selection::Node { id: node.id.clone() };
                self.drag = Drag::Node {
                    id: node.id.clone(),
                    origin,
                    grab: at,
                    current: at,
                };
            }
            None => {
                self.selection = Selection::None;
                self.drag = Drag::Canvas { last: screen };
            }
        }
    }

    pub fn pointer_move(&mut self, screen: Point) {
        match &mut self.drag {
            Drag::Idle => {}
            Drag::Canvas { last } => {
                self.transform.translate_x += screen.x - last.x;
                self.transform.translate_y += screen.y - last.y;
                *last = screen;
            }
            Drag::Node { current, .. } => {
                *current = self.transform.to_graph(screen);
            }
        }
    }

    /// Pointer released. Returns the accumulated node movement, or `None`
    /// for pans, plain clicks, and drags that ended where they started.
    pub fn pointer_up(&mut self) -> Option<MoveCommit> {
        let drag = std::mem::replace(&mut self.drag, Drag::Idle);
        if let Drag::Node { id, origin, grab, current } = drag {
            let to = (origin.x + current.x - grab.x, origin.y + current.y - grab.y);
            let from = (origin.x, origin.y);
            if to != from {
                return Some(MoveCommit { id, from, to });
            }
        }
        None
    }

    pub fn dragging_node(&self) -> Option<&str> {
        match &self.drag {
            Drag::Node { id, .. } => Some(id),
            _ => None,
        }
    }

    /// Live position of the node currently being dragged. The stored graph
    /// position stays untouched until the move commits on release.
    pub fn preview_position(&self, id: &str) -> Option<(f64, f64)> {
        match &self.drag {
            Drag::Node { id: drag_id, origin, grab, current } if drag_id == id => {
                Some((origin.x + current.x - grab.x, origin.y + current.y - grab.y))
            }
            _ => None,
        }
    }

    pub fn select_node(&mut self, graph: &Graph, id: &str) -> bool {
        if !graph.contains_node(id) {
            return false;
        }
        self.selection = Selection::Node { id: id.to_string() };
        true
    }

    /// Edge paths intercept their own pointer events in the display layer,
    /// which reports the hit here.
    pub fn select_edge(&mut self, graph: &Graph, from: &str, to: &str) -> bool {
        if !graph.contains_edge(from, to) {
            return false;
        }
        self.selection = Selection::Edge {
            from: from.to_string(),
            to: to.to_string(),
        };
        true
    }

    pub fn clear_selection(&mut self) {
        self.selection = Selection::None;
    }

    /// Drop a selection that points at an entity the graph no longer has,
    /// e.g. after an undo removed the selected node.
    pub fn prune_selection(&mut self, graph: &Graph) {
        let stale = match &self.selection {
            Selection::None => false,
            Selection::Node { id } => !graph.contains_node(id),
            Selection::Edge { from, to } => !graph.contains_edge(from, to),
        };
        if stale {
            self.selection = Selection::None;
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeView {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub shape: NodeShape,
    pub icon: String,
    pub color: String,
    /// Screen-space bounding box with pan/zoom already applied.
    pub rect: Rect,
    pub status: NodeStatus,
    pub selected: bool,
    pub dragging: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeView {
    pub from: String,
    pub to: String,
    /// Screen-space SVG path data.
    pub path: String,
    pub midpoint: Point,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub selected: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasView {
    pub transform: ViewTransform,
    pub nodes: Vec<NodeView>,
    pub edges: Vec<EdgeView>,
}

/// Project the graph through the canvas state into a draw list. Pure: same
/// graph, same controller state, same overlay gives the same view.
/// `status_overlay` carries live per-node run state and wins over the status
/// stored on the node.
pub fn render_canvas(
    graph: &Graph,
    canvas: &CanvasController,
    status_overlay: &HashMap<String, NodeStatus>,
) -> CanvasView {
    let t = canvas.transform();

    // Effective positions include the live drag preview.
    let position = |node: &Node| {
        canvas
            .preview_position(&node.id)
            .unwrap_or((node.x, node.y))
    };

    let nodes = graph
        .nodes()
        .iter()
        .map(|node| {
            let (x, y) = position(node);
            let top_left = t.to_screen(Point::new(x, y));
            NodeView {
                id: node.id.clone(),
                name: node.name.clone(),
                kind: node.kind,
                shape: node.shape,
                icon: node.icon.clone(),
                color: node.color.clone(),
                rect: Rect::new(top_left.x, top_left.y, NODE_WIDTH * t.scale, NODE_HEIGHT * t.scale),
                status: status_overlay.get(&node.id).copied().unwrap_or(node.status),
                selected: *canvas.selection() == Selection::Node { id: node.id.clone() },
                dragging: canvas.dragging_node() == Some(node.id.as_str()),
            }
        })
        .collect();

    let edges = graph
        .edges()
        .iter()
        .filter_map(|edge| {
            let source = graph.node(&edge.from)?;
            let target = graph.node(&edge.to)?;
            let (sx, sy) = position(source);
            let (tx, ty) = position(target);
            let curve = EdgeCurve::between(
                Rect::new(sx, sy, NODE_WIDTH, NODE_HEIGHT),
                Rect::new(tx, ty, NODE_WIDTH, NODE_HEIGHT),
            )
            .transformed(t);
            Some(EdgeView {
                from: edge.from.clone(),
                to: edge.to.clone(),
                path: curve.to_path(),
                midpoint: curve.midpoint(),
                label: edge.label.clone(),
                selected: *canvas.selection()
                    == Selection::Edge {
                        from: edge.from.clone(),
                        to: edge.to.clone(),
                    },
            })
        })
        .collect();

    CanvasView {
        transform: *t,
        nodes,
        edges,
    }
}
