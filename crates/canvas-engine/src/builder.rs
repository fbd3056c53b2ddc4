//! Fluent builder for boards
//!
//! Provides a fluent API for constructing boards programmatically, mostly for
//! fixtures and tests. No validation is performed.

use crate::descriptor::NodeDefinition;
use crate::types::{
    Board, Dimensions, Edge, EdgeType, Node, NodeCategory, NodeStatus, Port, Position,
};

/// Fluent builder for constructing boards
///
/// # Example
///
/// ```ignore
/// let board = BoardBuilder::new("board-1")
///     .add_node("prompt", "text-prompt", (0.0, 0.0))
///     .with_parameters(serde_json::json!({"text": "a red coat"}))
///     .add_node("gen", "image-generation", (400.0, 0.0))
///     .add_edge("prompt", "text", "gen", "prompt")
///     .build();
/// ```
pub struct BoardBuilder {
    id: String,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    edge_counter: usize,
}

impl BoardBuilder {
    /// Create a new board builder
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
            edge_counter: 0,
        }
    }

    /// Add a bare node (no ports, default footprint)
    pub fn add_node(
        mut self,
        id: impl Into<String>,
        node_type: impl Into<String>,
        position: (f64, f64),
    ) -> Self {
        self.nodes.push(Node {
            id: id.into(),
            node_type: node_type.into(),
            category: NodeCategory::Input,
            position: Position::new(position.0, position.1),
            dimensions: Dimensions::default(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            parameters: Default::default(),
            status: NodeStatus::Idle,
            cached_output: None,
            last_execution: None,
        });
        self
    }

    /// Add a node shaped by a definition's defaults
    pub fn add_defined(
        mut self,
        id: impl Into<String>,
        definition: &NodeDefinition,
        position: (f64, f64),
    ) -> Self {
        self.nodes.push(Node {
            id: id.into(),
            node_type: definition.node_type.clone(),
            category: definition.category,
            position: Position::new(position.0, position.1),
            dimensions: definition.default_dimensions,
            inputs: definition.default_inputs.clone(),
            outputs: definition.default_outputs.clone(),
            parameters: definition.default_parameters.clone(),
            status: NodeStatus::Idle,
            cached_output: None,
            last_execution: None,
        });
        self
    }

    fn last_node(&mut self) -> Option<&mut Node> {
        self.nodes.last_mut()
    }

    /// Set input ports on the most recently added node
    pub fn with_inputs(mut self, inputs: Vec<Port>) -> Self {
        if let Some(node) = self.last_node() {
            node.inputs = inputs;
        }
        self
    }

    /// Set output ports on the most recently added node
    pub fn with_outputs(mut self, outputs: Vec<Port>) -> Self {
        if let Some(node) = self.last_node() {
            node.outputs = outputs;
        }
        self
    }

    /// Set parameters on the most recently added node (JSON object)
    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        if let (Some(node), serde_json::Value::Object(map)) = (self.last_node(), parameters) {
            node.parameters = map;
        }
        self
    }

    /// Set a cached output on the most recently added node and mark it completed
    pub fn with_output(mut self, output: serde_json::Value) -> Self {
        if let (Some(node), serde_json::Value::Object(map)) = (self.last_node(), output) {
            node.cached_output = Some(map);
            node.status = NodeStatus::Completed;
        }
        self
    }

    /// Set the category of the most recently added node
    pub fn with_category(mut self, category: NodeCategory) -> Self {
        if let Some(node) = self.last_node() {
            node.category = category;
        }
        self
    }

    /// Set the footprint of the most recently added node
    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        if let Some(node) = self.last_node() {
            node.dimensions = Dimensions::new(width, height);
        }
        self
    }

    /// Add an edge between two ports (auto-generates edge ID)
    pub fn add_edge(
        mut self,
        source: impl Into<String>,
        source_port: impl Into<String>,
        target: impl Into<String>,
        target_port: impl Into<String>,
    ) -> Self {
        self.edge_counter += 1;
        self.edges.push(Edge {
            id: format!("edge-{}", self.edge_counter),
            source_node_id: source.into(),
            source_port_id: Some(source_port.into()),
            target_node_id: target.into(),
            target_port_id: Some(target_port.into()),
            edge_type: EdgeType::Data,
        });
        self
    }

    /// Add an edge without port ids
    pub fn add_link(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.edge_counter += 1;
        self.edges.push(Edge {
            id: format!("edge-{}", self.edge_counter),
            source_node_id: source.into(),
            source_port_id: None,
            target_node_id: target.into(),
            target_port_id: None,
            edge_type: EdgeType::Data,
        });
        self
    }

    /// Build the board without validation
    pub fn build(self) -> Board {
        Board {
            id: self.id,
            nodes: self.nodes,
            edges: self.edges,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_board_builder_basic() {
        let board = BoardBuilder::new("b1")
            .add_node("prompt", "text-prompt", (0.0, 0.0))
            .with_parameters(serde_json::json!({"text": "Hello"}))
            .add_node("gen", "image-generation", (200.0, 0.0))
            .with_size(320.0, 240.0)
            .add_edge("prompt", "text", "gen", "prompt")
            .build();

        assert_eq!(board.id, "b1");
        assert_eq!(board.nodes.len(), 2);
        assert_eq!(board.edges.len(), 1);
        assert_eq!(board.nodes[0].parameters["text"], "Hello");
        assert_eq!(board.nodes[1].dimensions.width, 320.0);
    }

    #[test]
    fn test_board_builder_auto_edge_ids() {
        let board = BoardBuilder::new("b")
            .add_node("a", "x", (0.0, 0.0))
            .add_node("b", "x", (100.0, 0.0))
            .add_node("c", "x", (200.0, 0.0))
            .add_edge("a", "out", "b", "in")
            .add_link("b", "c")
            .build();

        assert_eq!(board.edges[0].id, "edge-1");
        assert_eq!(board.edges[1].id, "edge-2");
        assert!(board.edges[1].target_port_id.is_none());
    }

    #[test]
    fn test_with_output_marks_completed() {
        let board = BoardBuilder::new("b")
            .add_node("a", "x", (0.0, 0.0))
            .with_output(serde_json::json!({"image": "u"}))
            .build();
        assert_eq!(board.nodes[0].status, NodeStatus::Completed);
    }
}
