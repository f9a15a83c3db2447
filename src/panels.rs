use crate::canvas::Selection;
use crate::graph::{Graph, Node, NodeKind, NodeShape, NodeStatus};
use serde::Serialize;
use uuid::Uuid;

/// Palette entry describing how nodes of one kind are born.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTemplate {
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub name: &'static str,
    pub shape: NodeShape,
    pub icon: &'static str,
    pub color: &'static str,
}

/// One template per node kind, in palette display order.
pub struct TemplateRegistry {
    templates: Vec<NodeTemplate>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        let templates = vec![
            NodeTemplate {
                kind: NodeKind::Start,
                name: "Start",
                shape: NodeShape::Circle,
                icon: "play",
                color: "#22c55e",
            },
            NodeTemplate {
                kind: NodeKind::Input,
                name: "Input",
                shape: NodeShape::Parallelogram,
                icon: "download",
                color: "#06b6d4",
            },
            NodeTemplate {
                kind: NodeKind::Process,
                name: "Process",
                shape: NodeShape::Rounded,
                icon: "gear",
                color: "#3b82f6",
            },
            NodeTemplate {
                kind: NodeKind::Transform,
                name: "Transform",
                shape: NodeShape::Hexagon,
                icon: "shuffle",
                color: "#8b5cf6",
            },
            NodeTemplate {
                kind: NodeKind::Condition,
                name: "Condition",
                shape: NodeShape::Diamond,
                icon: "git-branch",
                color: "#f59e0b",
            },
            NodeTemplate {
                kind: NodeKind::Loop,
                name: "Loop",
                shape: NodeShape::Rounded,
                icon: "repeat",
                color: "#ec4899",
            },
            NodeTemplate {
                kind: NodeKind::Output,
                name: "Output",
                shape: NodeShape::Parallelogram,
                icon: "upload",
                color: "#14b8a6",
            },
            NodeTemplate {
                kind: NodeKind::End,
                name: "End",
                shape: NodeShape::Circle,
                icon: "flag",
                color: "#ef4444",
            },
        ];
        Self { templates }
    }

    pub fn get(&self, kind: NodeKind) -> Option<&NodeTemplate> {
        self.templates.iter().find(|t| t.kind == kind)
    }

    pub fn all(&self) -> &[NodeTemplate] {
        &self.templates
    }

    /// Build a fresh node of `kind` at a graph position, with a unique id
    /// prefixed by the kind for readability.
    pub fn instantiate(&self, kind: NodeKind, x: f64, y: f64) -> Option<Node> {
        let template = self.get(kind)?;
        let suffix = Uuid::new_v4().simple().to_string();
        Some(Node {
            id: format!("{}-{}", kind.as_str(), &suffix[..8]),
            kind,
            name: template.name.to_string(),
            shape: template.shape,
            icon: template.icon.to_string(),
            color: template.color.to_string(),
            x,
            y,
            status: NodeStatus::Pending,
        })
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaletteView {
    pub items: Vec<NodeTemplate>,
}

pub fn render_palette(registry: &TemplateRegistry) -> PaletteView {
    PaletteView {
        items: registry.all().to_vec(),
    }
}

/// Inspector content for the current selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum PropertiesView {
    Empty,
    Node {
        id: String,
        #[serde(rename = "type")]
        kind: NodeKind,
        name: String,
        shape: NodeShape,
        icon: String,
        color: String,
        x: f64,
        y: f64,
        status: NodeStatus,
    },
    Edge {
        from: String,
        to: String,
        from_name: String,
        to_name: String,
        label: Option<String>,
    },
}

/// Pure projection of the selection into inspector fields. A selection whose
/// entity vanished renders as empty rather than erroring.
pub fn render_properties(graph: &Graph, selection: &Selection) -> PropertiesView {
    match selection {
        Selection::None => PropertiesView::Empty,
        Selection::Node { id } => match graph.node(id) {
            Some(node) => PropertiesView::Node {
                id: node.id.clone(),
                kind: node.kind,
                name: node.name.clone(),
                shape: node.shape,
                icon: node.icon.clone(),
                color: node.color.clone(),
                x: node.x,
                y: node.y,
                status: node.status,
            },
            None => PropertiesView::Empty,
        },
        Selection::Edge { from, to } => {
            if !graph.contains_edge(from, to) {
                return PropertiesView::Empty;
            }
            let name_of = |id: &str| {
                graph
                    .node(id)
                    .map(|n| n.name.clone())
                    .unwrap_or_else(|| id.to_string())
            };
            let label = graph
                .edges()
                .iter()
                .find(|e| e.from == *from && e.to == *to)
                .and_then(|e| e.label.clone());
            PropertiesView::Edge {
                from: from.clone(),
                to: to.clone(),
                from_name: name_of(from),
                to_name: name_of(to),
                label,
            }
        }
    }
}
