use super::{Edge, Graph, Node, NodeKind, NodeShape, NodeStatus};

fn node(id: &str, kind: NodeKind, name: &str, shape: NodeShape, icon: &str, color: &str, x: f64, y: f64) -> Node {
    Node {
        id: id.to_string(),
        kind,
        name: name.to_string(),
        shape,
        icon: icon.to_string(),
        color: color.to_string(),
        x,
        y,
        status: NodeStatus::Pending,
    }
}

/// Built-in pipeline shown when the persistence API is unreachable at
/// startup, so the editor always opens on something runnable.
pub fn sample_graph() -> Graph {
    let nodes = vec![
        node("start-1", NodeKind::Start, "Ingest", NodeShape::Circle, "play", "#22c55e", 80.0, 200.0),
        node("process-1", NodeKind::Process, "Parse Metrics", NodeShape::Rounded, "gear", "#3b82f6", 260.0, 200.0),
        node("condition-1", NodeKind::Condition, "Threshold Check", NodeShape::Diamond, "branch", "#f59e0b", 440.0, 200.0),
        node("transform-1", NodeKind::Transform, "Normalize Report", NodeShape::Rounded, "shuffle", "#6366f1", 620.0, 120.0),
        node("output-1", NodeKind::Output, "Publish Dashboard", NodeShape::Parallelogram, "upload", "#14b8a6", 620.0, 280.0),
        node("end-1", NodeKind::End, "Done", NodeShape::Circle, "flag", "#ef4444", 800.0, 200.0),
    ];
    let edges = vec![
        Edge::new("start-1", "process-1"),
        Edge::new("process-1", "condition-1"),
        Edge { label: Some("breach".to_string()), ..Edge::new("condition-1", "transform-1") },
        Edge { label: Some("nominal".to_string()), ..Edge::new("condition-1", "output-1") },
        Edge::new("transform-1", "end-1"),
        Edge::new("output-1", "end-1"),
    ];
    Graph::from_parts(nodes, edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::validation::validate_graph;

    #[test]
    fn test_sample_graph_is_executable() {
        let g = sample_graph();
        assert_eq!(g.node_count(), 6);
        assert_eq!(g.edge_count(), 6);

        let result = validate_graph(&g);
        assert!(result.valid, "errors: {:?}", result.errors);
        assert!(result.warnings.is_empty(), "warnings: {:?}", result.warnings);
    }

    #[test]
    fn test_sample_graph_labels() {
        let g = sample_graph();
        let labeled: Vec<_> = g.edges().iter().filter(|e| e.label.is_some()).collect();
        assert_eq!(labeled.len(), 2);
        assert!(g.contains_edge("condition-1", "transform-1"));
    }
}
