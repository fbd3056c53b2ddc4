//! In-memory graph store for one board
//!
//! The store is the local source of truth: every mutation is applied here
//! first and persisted afterwards. Edge creation always goes through the
//! connection validator. Deleting a node removes every incident edge.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::{EngineError, Result};
use crate::registry::NodeRegistry;
use crate::types::{
    Board, Edge, LastExecution, Node, NodeId, NodeStatus, Position, ValueMap,
};
use crate::validation::{validate_connection, ConnectionCandidate, ConnectionCheck, ConnectionOptions};

/// Store shared between the session and running executions
pub type SharedGraphStore = Arc<RwLock<GraphStore>>;

/// Nodes and edges of a single board plus the definitions used to create them
#[derive(Debug, Clone)]
pub struct GraphStore {
    board: Board,
    registry: Arc<NodeRegistry>,
}

impl GraphStore {
    /// Create an empty store for a board
    pub fn new(board_id: impl Into<String>, registry: Arc<NodeRegistry>) -> Self {
        Self {
            board: Board::new(board_id),
            registry,
        }
    }

    /// Create a store holding an existing board
    pub fn from_board(board: Board, registry: Arc<NodeRegistry>) -> Self {
        Self { board, registry }
    }

    /// Wrap the store for sharing with executors
    pub fn into_shared(self) -> SharedGraphStore {
        Arc::new(RwLock::new(self))
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn board_id(&self) -> &str {
        &self.board.id
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    /// Consistent copy of the whole board
    pub fn snapshot(&self) -> Board {
        self.board.clone()
    }

    /// Replace the whole board (load, undo/redo)
    pub fn replace_board(&mut self, board: Board) {
        self.board = board;
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.board.find_node(id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.board.find_node(id).is_some()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.board.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.board.edges
    }

    fn node_mut(&mut self, id: &str) -> Result<&mut Node> {
        self.board
            .find_node_mut(id)
            .ok_or_else(|| EngineError::NodeNotFound(id.to_string()))
    }

    // =========================================================================
    // Node mutations
    // =========================================================================

    /// Create a node from its type definition with a generated id
    pub fn create_node(&mut self, node_type: &str, position: Position) -> Result<Node> {
        let id = uuid::Uuid::new_v4().to_string();
        let node = self.registry.instantiate(node_type, id, position)?;
        self.insert_node(node.clone())?;
        Ok(node)
    }

    /// Insert an already constructed node
    pub fn insert_node(&mut self, node: Node) -> Result<()> {
        if self.contains_node(&node.id) {
            return Err(EngineError::DuplicateNode(node.id));
        }
        log::debug!("Adding node '{}' ({})", node.id, node.node_type);
        self.board.nodes.push(node);
        Ok(())
    }

    /// Replace a node with a newer copy (e.g. the persisted version)
    pub fn upsert_node(&mut self, node: Node) {
        match self.board.find_node_mut(&node.id) {
            Some(existing) => *existing = node,
            None => self.board.nodes.push(node),
        }
    }

    /// Remove a node and every edge touching it
    ///
    /// Returns the removed node and the removed edges.
    pub fn remove_node(&mut self, id: &str) -> Result<(Node, Vec<Edge>)> {
        let index = self
            .board
            .nodes
            .iter()
            .position(|n| n.id == id)
            .ok_or_else(|| EngineError::NodeNotFound(id.to_string()))?;
        let node = self.board.nodes.remove(index);

        let (removed, kept): (Vec<Edge>, Vec<Edge>) =
            self.board.edges.drain(..).partition(|e| e.touches(id));
        self.board.edges = kept;

        log::debug!("Removed node '{}' and {} incident edge(s)", id, removed.len());
        Ok((node, removed))
    }

    /// Merge a parameter patch into a node's parameters
    ///
    /// `null` values remove the key.
    pub fn update_parameters(&mut self, id: &str, patch: &ValueMap) -> Result<()> {
        let node = self.node_mut(id)?;
        for (key, value) in patch {
            if value.is_null() {
                node.parameters.remove(key);
            } else {
                node.parameters.insert(key.clone(), value.clone());
            }
        }
        Ok(())
    }

    pub fn set_position(&mut self, id: &str, position: Position) -> Result<()> {
        self.node_mut(id)?.position = position;
        Ok(())
    }

    /// Apply several position changes, skipping unknown nodes
    pub fn apply_positions(&mut self, positions: &[(NodeId, Position)]) {
        for (id, position) in positions {
            if let Some(node) = self.board.find_node_mut(id) {
                node.position = *position;
            }
        }
    }

    // =========================================================================
    // Execution state
    // =========================================================================

    /// Arm a node for a new run
    pub fn mark_running(&mut self, id: &str) -> Result<()> {
        let node = self.node_mut(id)?;
        node.status = NodeStatus::Running;
        node.last_execution = Some(LastExecution::started_now());
        Ok(())
    }

    /// Record a successful run and its output
    pub fn mark_completed(&mut self, id: &str, output: ValueMap) -> Result<()> {
        let node = self.node_mut(id)?;
        node.status = NodeStatus::Completed;
        node.cached_output = Some(output);
        node.last_execution
            .get_or_insert_with(LastExecution::started_now)
            .finish(None);
        Ok(())
    }

    /// Record a failed run; the previous cached output is kept
    pub fn mark_failed(&mut self, id: &str, error: impl Into<String>) -> Result<()> {
        let node = self.node_mut(id)?;
        node.status = NodeStatus::Error;
        node.last_execution
            .get_or_insert_with(LastExecution::started_now)
            .finish(Some(error.into()));
        Ok(())
    }

    // =========================================================================
    // Edges
    // =========================================================================

    /// Validate a candidate connection against the current state
    pub fn check_connection(
        &self,
        candidate: &ConnectionCandidate,
        options: &ConnectionOptions,
    ) -> ConnectionCheck {
        validate_connection(candidate, &self.board.nodes, &self.board.edges, options)
    }

    /// Validate and commit a connection, returning the new edge
    pub fn connect(
        &mut self,
        candidate: &ConnectionCandidate,
        options: &ConnectionOptions,
    ) -> Result<Edge> {
        let check = self.check_connection(candidate, options);
        if !check.is_valid {
            return Err(EngineError::InvalidConnection(
                check.reason.unwrap_or_else(|| "connection rejected".to_string()),
            ));
        }

        let edge = Edge {
            id: uuid::Uuid::new_v4().to_string(),
            source_node_id: candidate.source_node_id.clone(),
            source_port_id: Some(candidate.source_port_id.clone()),
            target_node_id: candidate.target_node_id.clone(),
            target_port_id: Some(candidate.target_port_id.clone()),
            edge_type: check.edge_type(),
        };
        log::debug!(
            "Connecting {}.{} -> {}.{}",
            candidate.source_node_id,
            candidate.source_port_id,
            candidate.target_node_id,
            candidate.target_port_id
        );
        self.board.edges.push(edge.clone());
        Ok(edge)
    }

    /// Insert an edge without validation (loading, undo)
    ///
    /// Edges whose endpoints are missing are refused.
    pub fn insert_edge(&mut self, edge: Edge) -> Result<()> {
        for endpoint in [&edge.source_node_id, &edge.target_node_id] {
            if !self.contains_node(endpoint) {
                return Err(EngineError::NodeNotFound(endpoint.clone()));
            }
        }
        self.board.edges.push(edge);
        Ok(())
    }

    pub fn remove_edge(&mut self, id: &str) -> Result<Edge> {
        let index = self
            .board
            .edges
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| EngineError::EdgeNotFound(id.to_string()))?;
        Ok(self.board.edges.remove(index))
    }

    /// Nodes whose upstream neighbours have all produced output
    ///
    /// A node is ready when every source feeding it is completed or is a leaf
    /// carrying its value in parameters.
    pub fn ready_to_run(&self) -> Vec<NodeId> {
        self.board
            .nodes
            .iter()
            .filter(|node| node.status != NodeStatus::Running)
            .filter(|node| {
                self.board.get_dependencies(&node.id).iter().all(|dep| {
                    self.board.find_node(dep).map_or(false, |n| {
                        n.status == NodeStatus::Completed
                            || self.registry.binding_for(&n.node_type)
                                == crate::descriptor::ProviderBinding::Passthrough
                    })
                })
            })
            .map(|node| node.id.clone())
            .collect()
    }
}
