pub mod sample;
pub mod validation;

use serde::{Deserialize, Serialize};

pub type NodeId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Start,
    End,
    Process,
    Condition,
    Loop,
    Input,
    Output,
    Transform,
}

impl NodeKind {
    /// Wire name, also used as the id prefix for palette-created nodes.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Start => "start",
            NodeKind::End => "end",
            NodeKind::Process => "process",
            NodeKind::Condition => "condition",
            NodeKind::Loop => "loop",
            NodeKind::Input => "input",
            NodeKind::Output => "output",
            NodeKind::Transform => "transform",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeShape {
    #[default]
    Rounded,
    Circle,
    Diamond,
    Parallelogram,
    Hexagon,
}

/// Editor-side node status. Live run progress is layered over this at
/// render time from the active `ExecutionRun`, never written back here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    #[default]
    Pending,
    Running,
    Success,
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub name: String,
    #[serde(default)]
    pub shape: NodeShape,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub color: String,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub status: NodeStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Edge {
    pub fn new(from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        Self { from: from.into(), to: to.into(), label: None }
    }

    pub fn touches(&self, id: &str) -> bool {
        self.from == id || self.to == id
    }
}

/// The canonical in-memory pipeline graph. Pure data container: the only
/// invariant enforced here is node-id uniqueness. All mutation goes through
/// the command layer (`history`), which keeps undo/redo and autosave
/// consistent, which is why the mutating methods are `pub(crate)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from deserialized parts, keeping the first occurrence
    /// of any duplicated node id.
    pub fn from_parts(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        let mut graph = Graph::new();
        for node in nodes {
            graph.push_node(node);
        }
        graph.edges = edges;
        graph
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    /// Position of a node in the draw/serialization order.
    pub fn node_index(&self, id: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == id)
    }

    pub fn edge_index(&self, from: &str, to: &str) -> Option<usize> {
        self.edges.iter().position(|e| e.from == from && e.to == to)
    }

    pub fn contains_edge(&self, from: &str, to: &str) -> bool {
        self.edge_index(from, to).is_some()
    }

    /// All edges incident to `id`, with their current positions in the edge
    /// sequence. The delete-node command snapshots this for its inverse.
    pub fn incident_edges(&self, id: &str) -> Vec<(usize, Edge)> {
        self.edges
            .iter()
            .enumerate()
            .filter(|(_, e)| e.touches(id))
            .map(|(i, e)| (i, e.clone()))
            .collect()
    }

    pub(crate) fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    /// Append a node. Duplicate ids are dropped; the id invariant wins.
    pub(crate) fn push_node(&mut self, node: Node) -> bool {
        if self.contains_node(&node.id) {
            return false;
        }
        self.nodes.push(node);
        true
    }

    pub(crate) fn insert_node_at(&mut self, index: usize, node: Node) -> bool {
        if self.contains_node(&node.id) {
            return false;
        }
        let index = index.min(self.nodes.len());
        self.nodes.insert(index, node);
        true
    }

    pub(crate) fn remove_node(&mut self, id: &str) -> Option<(usize, Node)> {
        let index = self.node_index(id)?;
        Some((index, self.nodes.remove(index)))
    }

    /// Remove every edge touching `id`, returning them with their original
    /// positions (ascending).
    pub(crate) fn remove_incident_edges(&mut self, id: &str) -> Vec<(usize, Edge)> {
        let removed = self.incident_edges(id);
        self.edges.retain(|e| !e.touches(id));
        removed
    }

    pub(crate) fn push_edge(&mut self, edge: Edge) {
        self.edges.push(edge);
    }

    pub(crate) fn insert_edge_at(&mut self, index: usize, edge: Edge) {
        let index = index.min(self.edges.len());
        self.edges.insert(index, edge);
    }

    pub(crate) fn remove_edge(&mut self, from: &str, to: &str) -> Option<(usize, Edge)> {
        let index = self.edge_index(from, to)?;
        Some((index, self.edges.remove(index)))
    }

    pub(crate) fn set_position(&mut self, id: &str, x: f64, y: f64) -> bool {
        match self.node_mut(id) {
            Some(node) => {
                node.x = x;
                node.y = y;
                true
            }
            None => false,
        }
    }
}
