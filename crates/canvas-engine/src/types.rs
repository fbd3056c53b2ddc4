//! Core types for canvas boards
//!
//! These types define the structure of a board: nodes with typed ports,
//! the edges between them, and per-node execution state.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants;
use crate::ports::PortType;

/// Unique identifier for a node
pub type NodeId = String;

/// Unique identifier for an edge
pub type EdgeId = String;

/// Unique identifier for a port
pub type PortId = String;

/// Unique identifier for a board
pub type BoardId = String;

/// Free-form JSON map used for parameters, cached outputs and resolved inputs
pub type ValueMap = serde_json::Map<String, serde_json::Value>;

/// Definition of a port (input or output)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Port {
    /// Unique identifier within the node's input (or output) list
    pub id: PortId,
    /// Human-readable name
    pub name: String,
    /// Data type of the port
    #[serde(rename = "type")]
    pub port_type: PortType,
    /// Whether this port must be connected before execution
    #[serde(default)]
    pub required: bool,
    /// Whether this (input) port accepts multiple incoming edges
    #[serde(default)]
    pub multi: bool,
}

impl Port {
    /// Create a required port
    pub fn required(id: impl Into<String>, name: impl Into<String>, port_type: PortType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            port_type,
            required: true,
            multi: false,
        }
    }

    /// Create an optional port
    pub fn optional(id: impl Into<String>, name: impl Into<String>, port_type: PortType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            port_type,
            required: false,
            multi: false,
        }
    }

    /// Set this port to accept multiple connections
    pub fn multi(mut self) -> Self {
        self.multi = true;
        self
    }
}

/// Category of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCategory {
    /// Leaf nodes whose value lives in their parameters (prompts, uploads)
    Input,
    /// Image generation and editing
    Image,
    /// Video generation
    Video,
    /// Audio and music generation
    Audio,
    /// Text and prompt processing
    Text,
    /// Characters, styles and other reusable entities
    Entity,
    /// Story development (genesis, structure, scenes, dialogue)
    Narrative,
    /// Fashion (garments, fabrics, try-on)
    Fashion,
    /// Display or export
    Output,
}

/// Position on the infinite canvas
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Size of a node on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

impl Dimensions {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

impl Default for Dimensions {
    fn default() -> Self {
        Self {
            width: constants::layout::DEFAULT_NODE_WIDTH,
            height: constants::layout::DEFAULT_NODE_HEIGHT,
        }
    }
}

/// Execution status of a node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Error,
}

impl NodeStatus {
    /// Whether a run has finished (successfully or not)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// Timing and outcome of the most recent run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastExecution {
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LastExecution {
    /// Start a new run now
    pub fn started_now() -> Self {
        Self {
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: None,
            error: None,
        }
    }

    /// Record the end of the run
    pub fn finish(&mut self, error: Option<String>) {
        let now = Utc::now();
        let elapsed = (now - self.started_at).num_milliseconds().max(0) as u64;
        self.completed_at = Some(now);
        self.duration_ms = Some(elapsed);
        self.error = error;
    }
}

/// A node instance on a board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique identifier for this node instance
    pub id: NodeId,
    /// Node type (references a NodeDefinition)
    pub node_type: String,
    pub category: NodeCategory,
    pub position: Position,
    #[serde(default)]
    pub dimensions: Dimensions,
    #[serde(default)]
    pub inputs: Vec<Port>,
    #[serde(default)]
    pub outputs: Vec<Port>,
    #[serde(default)]
    pub parameters: ValueMap,
    #[serde(default)]
    pub status: NodeStatus,
    /// Last successful result, consumed by downstream resolvers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_output: Option<ValueMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_execution: Option<LastExecution>,
}

impl Node {
    /// Find an input port by id
    pub fn input(&self, port_id: &str) -> Option<&Port> {
        self.inputs.iter().find(|p| p.id == port_id)
    }

    /// Find an output port by id
    pub fn output(&self, port_id: &str) -> Option<&Port> {
        self.outputs.iter().find(|p| p.id == port_id)
    }

    /// Cached output, if present and non-empty
    pub fn non_empty_output(&self) -> Option<&ValueMap> {
        self.cached_output.as_ref().filter(|o| !o.is_empty())
    }
}

/// Visual/semantic kind of an edge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    /// Plain data flow
    #[default]
    Data,
    /// Data flow where both ends carry media (rendered with a preview)
    Media,
    /// Data flow into an `any` port
    Generic,
}

/// A directed connection between two nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    /// Unique identifier for this edge
    pub id: EdgeId,
    pub source_node_id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_port_id: Option<PortId>,
    pub target_node_id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_port_id: Option<PortId>,
    #[serde(default)]
    pub edge_type: EdgeType,
}

impl Edge {
    /// Whether this edge touches the given node on either end
    pub fn touches(&self, node_id: &str) -> bool {
        self.source_node_id == node_id || self.target_node_id == node_id
    }

    /// Target port id, or the default input key for untargeted edges
    pub fn target_key(&self) -> &str {
        self.target_port_id
            .as_deref()
            .unwrap_or(constants::keys::DEFAULT_INPUT)
    }
}

/// A complete board: the unit of persistence and layout
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    /// Unique identifier for this board
    pub id: BoardId,
    /// Nodes on the board
    pub nodes: Vec<Node>,
    /// Edges connecting nodes
    pub edges: Vec<Edge>,
}

impl Board {
    /// Create a new empty board
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Find a node by ID
    pub fn find_node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Find a node by ID (mutable)
    pub fn find_node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    /// Find an edge by ID
    pub fn find_edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    /// Get edges coming into a node
    pub fn incoming_edges<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.target_node_id == node_id)
    }

    /// Get edges going out of a node
    pub fn outgoing_edges<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source_node_id == node_id)
    }

    /// Get the IDs of nodes that this node depends on (upstream nodes)
    pub fn get_dependencies(&self, node_id: &str) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        self.incoming_edges(node_id)
            .filter(|e| seen.insert(e.source_node_id.as_str()))
            .map(|e| e.source_node_id.clone())
            .collect()
    }

    /// Get the IDs of nodes that depend on this node (downstream nodes)
    pub fn get_dependents(&self, node_id: &str) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        self.outgoing_edges(node_id)
            .filter(|e| seen.insert(e.target_node_id.as_str()))
            .map(|e| e.target_node_id.clone())
            .collect()
    }
}
