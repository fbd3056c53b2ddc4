//! Connection and board validation
//!
//! `validate_connection` is the gate every new edge passes through. It is a
//! pure decision function over a board snapshot: it never mutates anything
//! and reports rejections as a human-readable reason.
//!
//! `validate_board` checks a whole board (typically one just loaded from
//! persistence) and returns every structural problem it finds.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::ports::{is_compatible, TypeCheckMode};
use crate::types::{Board, Edge, EdgeType, Node, Port};

/// A proposed edge, before it exists on the board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionCandidate {
    pub source_node_id: String,
    pub source_port_id: String,
    pub target_node_id: String,
    pub target_port_id: String,
}

impl ConnectionCandidate {
    pub fn new(
        source_node_id: impl Into<String>,
        source_port_id: impl Into<String>,
        target_node_id: impl Into<String>,
        target_port_id: impl Into<String>,
    ) -> Self {
        Self {
            source_node_id: source_node_id.into(),
            source_port_id: source_port_id.into(),
            target_node_id: target_node_id.into(),
            target_port_id: target_port_id.into(),
        }
    }
}

/// Validator options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionOptions {
    pub allow_self_connection: bool,
    pub allow_multiple_connections: bool,
    pub strict_type_checking: bool,
}

impl ConnectionOptions {
    fn type_check_mode(&self) -> TypeCheckMode {
        if self.strict_type_checking {
            TypeCheckMode::Strict
        } else {
            TypeCheckMode::Loose
        }
    }
}

/// Outcome of validating a candidate connection
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionCheck {
    pub is_valid: bool,
    /// Why the connection was rejected
    pub reason: Option<String>,
    /// Resolved output port (present whenever it could be found)
    pub source_port: Option<Port>,
    /// Resolved input port (present whenever it could be found)
    pub target_port: Option<Port>,
}

impl ConnectionCheck {
    fn invalid(reason: impl Into<String>, source_port: Option<Port>, target_port: Option<Port>) -> Self {
        Self {
            is_valid: false,
            reason: Some(reason.into()),
            source_port,
            target_port,
        }
    }

    /// Edge presentation implied by the resolved ports
    pub fn edge_type(&self) -> EdgeType {
        match (&self.source_port, &self.target_port) {
            (Some(source), Some(target)) => {
                if source.port_type.is_any() || target.port_type.is_any() {
                    EdgeType::Generic
                } else if is_media(source) && is_media(target) {
                    EdgeType::Media
                } else {
                    EdgeType::Data
                }
            }
            _ => EdgeType::Data,
        }
    }
}

fn is_media(port: &Port) -> bool {
    use crate::ports::PortType;
    matches!(
        port.port_type,
        PortType::Image | PortType::Video | PortType::Audio | PortType::Model | PortType::Garment
    )
}

/// Decide whether a candidate edge is legal on the given snapshot
pub fn validate_connection(
    candidate: &ConnectionCandidate,
    nodes: &[Node],
    edges: &[Edge],
    options: &ConnectionOptions,
) -> ConnectionCheck {
    if candidate.source_node_id == candidate.target_node_id && !options.allow_self_connection {
        return ConnectionCheck::invalid("cannot connect a node to itself", None, None);
    }

    let source_port = nodes
        .iter()
        .find(|n| n.id == candidate.source_node_id)
        .and_then(|n| n.output(&candidate.source_port_id))
        .cloned();
    let target_port = nodes
        .iter()
        .find(|n| n.id == candidate.target_node_id)
        .and_then(|n| n.input(&candidate.target_port_id))
        .cloned();

    let (source, target) = match (source_port, target_port) {
        (Some(source), Some(target)) => (source, target),
        (source, target) => {
            return ConnectionCheck::invalid("port not found", source, target);
        }
    };

    let occupied = edges.iter().any(|e| {
        e.target_node_id == candidate.target_node_id && e.target_key() == candidate.target_port_id
    });
    if occupied && !options.allow_multiple_connections && !target.multi {
        return ConnectionCheck::invalid(
            format!("input '{}' already has a connection", target.name),
            Some(source),
            Some(target),
        );
    }

    if !is_compatible(&source.port_type, &target.port_type, options.type_check_mode()) {
        return ConnectionCheck::invalid(
            format!(
                "cannot connect {} output to {} input",
                source.port_type, target.port_type
            ),
            Some(source),
            Some(target),
        );
    }

    ConnectionCheck {
        is_valid: true,
        reason: None,
        source_port: Some(source),
        target_port: Some(target),
    }
}

/// Structural problem found on a board
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Cycle detected in the graph
    CycleDetected,
    /// Two nodes share an id
    DuplicateNode { node_id: String },
    /// An edge references a non-existent node
    UnknownNode { edge_id: String, node_id: String },
    /// An edge starts and ends at the same node
    SelfLoop { edge_id: String },
    /// A single-connection input has more than one incoming edge
    OversubscribedInput {
        node_id: String,
        port_id: String,
        count: usize,
    },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CycleDetected => write!(f, "Cycle detected in board"),
            Self::DuplicateNode { node_id } => write!(f, "Duplicate node id '{}'", node_id),
            Self::UnknownNode { edge_id, node_id } => {
                write!(f, "Edge '{}' references unknown node '{}'", edge_id, node_id)
            }
            Self::SelfLoop { edge_id } => write!(f, "Edge '{}' connects a node to itself", edge_id),
            Self::OversubscribedInput {
                node_id,
                port_id,
                count,
            } => write!(
                f,
                "Input '{}' on node '{}' has {} connections but accepts one",
                port_id, node_id, count
            ),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate a whole board
///
/// Returns all validation errors found (not just the first).
pub fn validate_board(board: &Board) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    validate_node_ids(board, &mut errors);
    validate_edge_references(board, &mut errors);
    validate_input_occupancy(board, &mut errors);
    detect_cycles(board, &mut errors);

    errors
}

fn validate_node_ids(board: &Board, errors: &mut Vec<ValidationError>) {
    let mut seen = HashSet::new();
    for node in &board.nodes {
        if !seen.insert(node.id.as_str()) {
            errors.push(ValidationError::DuplicateNode {
                node_id: node.id.clone(),
            });
        }
    }
}

/// Check that all edge source/target nodes exist
fn validate_edge_references(board: &Board, errors: &mut Vec<ValidationError>) {
    let node_ids: HashSet<&str> = board.nodes.iter().map(|n| n.id.as_str()).collect();

    for edge in &board.edges {
        if edge.source_node_id == edge.target_node_id {
            errors.push(ValidationError::SelfLoop {
                edge_id: edge.id.clone(),
            });
        }
        for endpoint in [&edge.source_node_id, &edge.target_node_id] {
            if !node_ids.contains(endpoint.as_str()) {
                errors.push(ValidationError::UnknownNode {
                    edge_id: edge.id.clone(),
                    node_id: endpoint.clone(),
                });
            }
        }
    }
}

fn validate_input_occupancy(board: &Board, errors: &mut Vec<ValidationError>) {
    let mut counts: HashMap<(&str, &str), usize> = HashMap::new();
    for edge in &board.edges {
        if let Some(port_id) = edge.target_port_id.as_deref() {
            *counts.entry((edge.target_node_id.as_str(), port_id)).or_insert(0) += 1;
        }
    }

    let mut oversubscribed: Vec<_> = counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .filter(|((node_id, port_id), _)| {
            board
                .find_node(node_id)
                .and_then(|n| n.input(port_id))
                .map_or(false, |p| !p.multi)
        })
        .collect();
    oversubscribed.sort();

    for ((node_id, port_id), count) in oversubscribed {
        errors.push(ValidationError::OversubscribedInput {
            node_id: node_id.to_string(),
            port_id: port_id.to_string(),
            count,
        });
    }
}

/// Detect cycles using Kahn's algorithm (topological sort)
fn detect_cycles(board: &Board, errors: &mut Vec<ValidationError>) {
    if topological_order(board).is_none() {
        errors.push(ValidationError::CycleDetected);
    }
}

/// Node ids in dependency order, or `None` if the board has a cycle
///
/// Edges to unknown nodes are ignored.
pub fn topological_order(board: &Board) -> Option<Vec<String>> {
    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    for node in &board.nodes {
        in_degree.insert(&node.id, 0);
    }
    for edge in &board.edges {
        if in_degree.contains_key(edge.source_node_id.as_str()) {
            if let Some(deg) = in_degree.get_mut(edge.target_node_id.as_str()) {
                *deg += 1;
            }
        }
    }

    let mut queue: VecDeque<&str> = board
        .nodes
        .iter()
        .map(|n| n.id.as_str())
        .filter(|id| in_degree.get(id) == Some(&0))
        .collect();

    let mut order = Vec::with_capacity(board.nodes.len());
    while let Some(node_id) = queue.pop_front() {
        order.push(node_id.to_string());
        for edge in board.outgoing_edges(node_id) {
            if let Some(deg) = in_degree.get_mut(edge.target_node_id.as_str()) {
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(&edge.target_node_id);
                }
            }
        }
    }

    if order.len() < in_degree.len() {
        None
    } else {
        Some(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::BoardBuilder;
    use crate::ports::PortType;

    fn two_node_board() -> Board {
        BoardBuilder::new("b")
            .add_node("src", "image-generation", (0.0, 0.0))
            .with_inputs(vec![Port::optional("prompt", "Prompt", PortType::Text)])
            .with_outputs(vec![
                Port::optional("image", "Image", PortType::Image),
                Port::optional("text", "Caption", PortType::Text),
                Port::optional("anything", "Anything", PortType::Any),
            ])
            .add_node("dst", "image-edit", (400.0, 0.0))
            .with_inputs(vec![
                Port::required("image", "Source Image", PortType::Image),
                Port::optional("refs", "References", PortType::Image).multi(),
                Port::optional("prompt", "Prompt", PortType::Text),
                Port::optional("extra", "Extra", PortType::Any),
            ])
            .with_outputs(vec![Port::optional("image", "Image", PortType::Image)])
            .build()
    }

    fn check(board: &Board, candidate: ConnectionCandidate, options: ConnectionOptions) -> ConnectionCheck {
        validate_connection(&candidate, &board.nodes, &board.edges, &options)
    }

    #[test]
    fn test_valid_connection_returns_ports() {
        let board = two_node_board();
        let result = check(
            &board,
            ConnectionCandidate::new("src", "image", "dst", "image"),
            ConnectionOptions::default(),
        );
        assert!(result.is_valid);
        assert!(result.reason.is_none());
        assert_eq!(result.source_port.as_ref().unwrap().id, "image");
        assert_eq!(result.target_port.as_ref().unwrap().name, "Source Image");
        assert_eq!(result.edge_type(), EdgeType::Media);
    }

    #[test]
    fn test_self_connection_rejected_regardless_of_other_options() {
        let board = two_node_board();
        for allow_multi in [false, true] {
            for strict in [false, true] {
                let options = ConnectionOptions {
                    allow_self_connection: false,
                    allow_multiple_connections: allow_multi,
                    strict_type_checking: strict,
                };
                let result = check(
                    &board,
                    ConnectionCandidate::new("src", "text", "src", "prompt"),
                    options,
                );
                assert!(!result.is_valid);
            }
        }
    }

    #[test]
    fn test_self_connection_allowed_when_opted_in() {
        let board = two_node_board();
        let options = ConnectionOptions {
            allow_self_connection: true,
            ..Default::default()
        };
        let result = check(&board, ConnectionCandidate::new("src", "text", "src", "prompt"), options);
        assert!(result.is_valid);
    }

    #[test]
    fn test_missing_port() {
        let board = two_node_board();
        let result = check(
            &board,
            ConnectionCandidate::new("src", "video", "dst", "image"),
            ConnectionOptions::default(),
        );
        assert!(!result.is_valid);
        assert_eq!(result.reason.as_deref(), Some("port not found"));
        assert!(result.target_port.is_some());

        let result = check(
            &board,
            ConnectionCandidate::new("src", "image", "ghost", "image"),
            ConnectionOptions::default(),
        );
        assert_eq!(result.reason.as_deref(), Some("port not found"));
    }

    #[test]
    fn test_occupied_single_input_rejected() {
        let mut board = two_node_board();
        board.edges.push(Edge {
            id: "e1".to_string(),
            source_node_id: "src".to_string(),
            source_port_id: Some("image".to_string()),
            target_node_id: "dst".to_string(),
            target_port_id: Some("image".to_string()),
            edge_type: EdgeType::Media,
        });

        let candidate = ConnectionCandidate::new("src", "anything", "dst", "image");
        let result = check(&board, candidate.clone(), ConnectionOptions::default());
        assert!(!result.is_valid);
        assert!(result.reason.unwrap().contains("already has a connection"));

        let options = ConnectionOptions {
            allow_multiple_connections: true,
            ..Default::default()
        };
        assert!(check(&board, candidate, options).is_valid);
    }

    #[test]
    fn test_untargeted_edge_occupies_default_input() {
        let board = BoardBuilder::new("b")
            .add_node("a", "x", (0.0, 0.0))
            .with_outputs(vec![Port::optional("text", "Text", PortType::Text)])
            .add_node("c", "x", (0.0, 300.0))
            .with_outputs(vec![Port::optional("text", "Text", PortType::Text)])
            .add_node("dst", "x", (400.0, 0.0))
            .with_inputs(vec![Port::optional("input", "Input", PortType::Text)])
            .add_link("a", "dst")
            .build();

        let result = check(
            &board,
            ConnectionCandidate::new("c", "text", "dst", "input"),
            ConnectionOptions::default(),
        );
        assert!(!result.is_valid);
        assert!(result.reason.unwrap().contains("already has a connection"));
    }

    #[test]
    fn test_multi_input_accepts_more_edges() {
        let board = BoardBuilder::new("b")
            .add_node("a", "x", (0.0, 0.0))
            .with_outputs(vec![Port::optional("image", "Image", PortType::Image)])
            .add_node("c", "x", (0.0, 0.0))
            .with_outputs(vec![Port::optional("image", "Image", PortType::Image)])
            .add_node("dst", "x", (400.0, 0.0))
            .with_inputs(vec![Port::optional("refs", "References", PortType::Image).multi()])
            .add_edge("a", "image", "dst", "refs")
            .build();

        let result = check(
            &board,
            ConnectionCandidate::new("c", "image", "dst", "refs"),
            ConnectionOptions::default(),
        );
        assert!(result.is_valid);
    }

    #[test]
    fn test_type_mismatch_names_both_types() {
        let board = two_node_board();
        let result = check(
            &board,
            ConnectionCandidate::new("src", "text", "dst", "image"),
            ConnectionOptions::default(),
        );
        assert!(!result.is_valid);
        let reason = result.reason.unwrap();
        assert!(reason.contains("text") && reason.contains("image"), "{}", reason);
    }

    #[test]
    fn test_strict_mode_rejects_any_output_into_typed_input() {
        let board = two_node_board();
        let candidate = ConnectionCandidate::new("src", "anything", "dst", "prompt");
        assert!(check(&board, candidate.clone(), ConnectionOptions::default()).is_valid);

        let strict = ConnectionOptions {
            strict_type_checking: true,
            ..Default::default()
        };
        assert!(!check(&board, candidate, strict).is_valid);

        let into_any = check(
            &board,
            ConnectionCandidate::new("src", "image", "dst", "extra"),
            strict,
        );
        assert!(into_any.is_valid);
        assert_eq!(into_any.edge_type(), EdgeType::Generic);
    }

    #[test]
    fn test_validate_board_clean() {
        let board = BoardBuilder::new("b")
            .add_node("a", "x", (0.0, 0.0))
            .add_node("b", "x", (100.0, 0.0))
            .add_edge("a", "out", "b", "in")
            .build();
        assert!(validate_board(&board).is_empty());
    }

    #[test]
    fn test_validate_board_collects_multiple_errors() {
        let board = BoardBuilder::new("b")
            .add_node("a", "x", (0.0, 0.0))
            .add_node("b", "x", (100.0, 0.0))
            .add_node("b", "x", (200.0, 0.0))
            .add_edge("a", "out", "b", "in")
            .add_edge("b", "out", "a", "in")
            .add_edge("a", "out", "ghost", "in")
            .add_edge("a", "out", "a", "in")
            .build();

        let errors = validate_board(&board);
        assert!(errors.iter().any(|e| matches!(e, ValidationError::CycleDetected)));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::DuplicateNode { .. })));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::UnknownNode { node_id, .. } if node_id == "ghost")));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::SelfLoop { .. })));
    }

    #[test]
    fn test_validate_board_oversubscribed_input() {
        let board = BoardBuilder::new("b")
            .add_node("a", "x", (0.0, 0.0))
            .add_node("c", "x", (0.0, 300.0))
            .add_node("d", "x", (400.0, 0.0))
            .with_inputs(vec![Port::required("image", "Image", PortType::Image)])
            .add_edge("a", "image", "d", "image")
            .add_edge("c", "image", "d", "image")
            .build();

        let errors = validate_board(&board);
        assert_eq!(
            errors,
            vec![ValidationError::OversubscribedInput {
                node_id: "d".to_string(),
                port_id: "image".to_string(),
                count: 2,
            }]
        );
    }

    #[test]
    fn test_topological_order_linear() {
        let board = BoardBuilder::new("b")
            .add_node("c", "x", (0.0, 0.0))
            .add_node("a", "x", (0.0, 0.0))
            .add_node("b", "x", (0.0, 0.0))
            .add_link("a", "b")
            .add_link("b", "c")
            .build();
        assert_eq!(topological_order(&board).unwrap(), vec!["a", "b", "c"]);
    }
}
