use crate::graph::{Edge, Graph, Node};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Commands kept on the undo stack before the oldest is evicted.
pub const HISTORY_LIMIT: usize = 50;

/// Node fields editable through the properties panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeField {
    Name,
    Icon,
    Color,
}

impl NodeField {
    pub fn get(&self, node: &Node) -> String {
        match self {
            NodeField::Name => node.name.clone(),
            NodeField::Icon => node.icon.clone(),
            NodeField::Color => node.color.clone(),
        }
    }

    fn set(&self, node: &mut Node, value: &str) {
        match self {
            NodeField::Name => node.name = value.to_string(),
            NodeField::Icon => node.icon = value.to_string(),
            NodeField::Color => node.color = value.to_string(),
        }
    }
}

/// An edge together with the position it held in the edge sequence, so a
/// cascade delete can be undone in original relative order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovedEdge {
    pub index: usize,
    pub edge: Edge,
}

/// One reversible graph mutation. Each variant carries the exact data needed
/// to apply and invert it without re-deriving state, which keeps the history
/// serializable and the inverse an exact mirror of the forward edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    AddNode {
        node: Node,
    },
    DeleteNode {
        node: Node,
        index: usize,
        edges: Vec<RemovedEdge>,
    },
    MoveNode {
        id: String,
        from_x: f64,
        from_y: f64,
        to_x: f64,
        to_y: f64,
    },
    UpdateNodeProperty {
        id: String,
        field: NodeField,
        before: String,
        after: String,
    },
    AddEdge {
        edge: Edge,
    },
    DeleteEdge {
        edge: Edge,
        index: usize,
    },
}

impl Command {
    pub fn add_node(node: Node) -> Self {
        Command::AddNode { node }
    }

    /// Snapshot a node and every incident edge for deletion. Returns `None`
    /// when the node is already gone.
    pub fn delete_node(graph: &Graph, id: &str) -> Option<Self> {
        let index = graph.node_index(id)?;
        let node = graph.node(id)?.clone();
        let edges = graph
            .incident_edges(id)
            .into_iter()
            .map(|(index, edge)| RemovedEdge { index, edge })
            .collect();
        Some(Command::DeleteNode { node, index, edges })
    }

    /// A move that ends where it started is not a command at all; it would
    /// pollute the undo history with no-ops.
    pub fn move_node(id: impl Into<String>, from: (f64, f64), to: (f64, f64)) -> Option<Self> {
        if from == to {
            return None;
        }
        Some(Command::MoveNode {
            id: id.into(),
            from_x: from.0,
            from_y: from.1,
            to_x: to.0,
            to_y: to.1,
        })
    }

    /// Returns `None` for a missing node or an unchanged value.
    pub fn update_node_property(
        graph: &Graph,
        id: &str,
        field: NodeField,
        value: impl Into<String>,
    ) -> Option<Self> {
        let value = value.into();
        let before = field.get(graph.node(id)?);
        if before == value {
            return None;
        }
        Some(Command::UpdateNodeProperty {
            id: id.to_string(),
            field,
            before,
            after: value,
        })
    }

    pub fn add_edge(edge: Edge) -> Self {
        Command::AddEdge { edge }
    }

    pub fn delete_edge(graph: &Graph, from: &str, to: &str) -> Option<Self> {
        let index = graph.edge_index(from, to)?;
        let edge = graph.edges()[index].clone();
        Some(Command::DeleteEdge { edge, index })
    }

    /// Apply the forward edit, reporting whether it took effect. Commands
    /// are pure in-memory data edits and cannot fail; a missing (or, for
    /// `AddNode`, already-present) target means the graph drifted outside
    /// the command layer and the edit degrades to a no-op.
    pub fn apply(&self, graph: &mut Graph) -> bool {
        match self {
            Command::AddNode { node } => graph.push_node(node.clone()),
            Command::DeleteNode { node, .. } => {
                graph.remove_incident_edges(&node.id);
                graph.remove_node(&node.id).is_some()
            }
            Command::MoveNode { id, to_x, to_y, .. } => graph.set_position(id, *to_x, *to_y),
            Command::UpdateNodeProperty { id, field, after, .. } => match graph.node_mut(id) {
                Some(node) => {
                    field.set(node, after);
                    true
                }
                None => false,
            },
            Command::AddEdge { edge } => {
                graph.push_edge(edge.clone());
                true
            }
            Command::DeleteEdge { edge, .. } => {
                // Node deletion is authoritative: if a cascade already removed
                // this edge, deleting it again is a no-op, not an error.
                graph.remove_edge(&edge.from, &edge.to).is_some()
            }
        }
    }

    /// Apply the exact inverse edit.
    pub fn invert(&self, graph: &mut Graph) {
        match self {
            Command::AddNode { node } => {
                graph.remove_node(&node.id);
            }
            Command::DeleteNode { node, index, edges } => {
                graph.insert_node_at(*index, node.clone());
                for removed in edges {
                    graph.insert_edge_at(removed.index, removed.edge.clone());
                }
            }
            Command::MoveNode { id, from_x, from_y, .. } => {
                graph.set_position(id, *from_x, *from_y);
            }
            Command::UpdateNodeProperty { id, field, before, .. } => {
                if let Some(node) = graph.node_mut(id) {
                    field.set(node, before);
                }
            }
            Command::AddEdge { edge } => {
                graph.remove_edge(&edge.from, &edge.to);
            }
            Command::DeleteEdge { edge, index } => {
                // Only restore the edge while both endpoints still exist.
                if graph.contains_node(&edge.from) && graph.contains_node(&edge.to) {
                    graph.insert_edge_at(*index, edge.clone());
                }
            }
        }
    }
}

/// Undo/redo stacks over [`Command`]s. Every mutation of the graph flows
/// through [`CommandStack::execute`], which is what keeps the audit trail
/// complete: a fresh effective action clears the redo stack, and the undo
/// stack is bounded at [`HISTORY_LIMIT`] entries.
#[derive(Debug, Default)]
pub struct CommandStack {
    undo: VecDeque<Command>,
    redo: Vec<Command>,
}

impl CommandStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a fresh command. An apply that degrades to a no-op is not
    /// recorded and leaves both stacks untouched; only commands that took
    /// effect have a meaningful inverse.
    pub fn execute(&mut self, graph: &mut Graph, command: Command) -> bool {
        if !command.apply(graph) {
            return false;
        }
        self.undo.push_back(command);
        if self.undo.len() > HISTORY_LIMIT {
            self.undo.pop_front();
        }
        self.redo.clear();
        true
    }

    /// Undo the most recent command. Returns `false` on an empty stack so the
    /// caller can surface a notice to the user.
    pub fn undo(&mut self, graph: &mut Graph) -> bool {
        match self.undo.pop_back() {
            Some(command) => {
                command.invert(graph);
                self.redo.push(command);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self, graph: &mut Graph) -> bool {
        match self.redo.pop() {
            Some(command) => {
                if command.apply(graph) {
                    self.undo.push_back(command);
                }
                true
            }
            None => false,
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    /// Drop all history, e.g. after a draft restore replaces the graph
    /// wholesale.
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}
