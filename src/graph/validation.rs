use super::{Graph, NodeKind};
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Validate a graph for execution. Pure function; structure errors (cycle,
/// dangling edge, empty graph) block a run, warnings do not. Edit-time
/// graphs are allowed to violate all of this transiently.
pub fn validate_graph(graph: &Graph) -> ValidationResult {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    if graph.is_empty() {
        errors.push("Pipeline has no nodes".to_string());
        return ValidationResult { valid: false, errors, warnings };
    }

    let mut connected: HashSet<&str> = HashSet::new();
    for edge in graph.edges() {
        let mut dangling = false;
        if !graph.contains_node(&edge.from) {
            errors.push(format!("Edge {} -> {} references missing node '{}'", edge.from, edge.to, edge.from));
            dangling = true;
        }
        if !graph.contains_node(&edge.to) {
            errors.push(format!("Edge {} -> {} references missing node '{}'", edge.from, edge.to, edge.to));
            dangling = true;
        }
        if !dangling {
            connected.insert(edge.from.as_str());
            connected.insert(edge.to.as_str());
        }
    }

    // Build adjacency list for cycle detection
    let mut adj: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    for node in graph.nodes() {
        adj.entry(node.id.as_str()).or_default();
        in_degree.entry(node.id.as_str()).or_insert(0);
    }
    for edge in graph.edges() {
        if graph.contains_node(&edge.from) && graph.contains_node(&edge.to) {
            adj.entry(edge.from.as_str()).or_default().push(edge.to.as_str());
            *in_degree.entry(edge.to.as_str()).or_insert(0) += 1;
        }
    }

    // Kahn's algorithm: if the peel-off misses any node, a cycle remains.
    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut visited = 0usize;
    while let Some(id) = queue.pop_front() {
        visited += 1;
        if let Some(neighbors) = adj.get(id) {
            for n in neighbors {
                if let Some(d) = in_degree.get_mut(n) {
                    *d -= 1;
                    if *d == 0 {
                        queue.push_back(*n);
                    }
                }
            }
        }
    }
    if visited < graph.node_count() {
        errors.push("Pipeline contains a cycle; execution would loop forever".to_string());
    }

    let has_start = graph.nodes().iter().any(|n| n.kind == NodeKind::Start);
    let has_end = graph.nodes().iter().any(|n| n.kind == NodeKind::End);
    if !has_start {
        warnings.push("Pipeline has no Start node".to_string());
    }
    if !has_end {
        warnings.push("Pipeline has no End node".to_string());
    }

    if graph.node_count() > 1 {
        for node in graph.nodes() {
            if !connected.contains(node.id.as_str()) {
                warnings.push(format!("Orphan node '{}' ({}) is not connected to any edge", node.name, node.id));
            }
        }
    }

    ValidationResult { valid: errors.is_empty(), errors, warnings }
}
