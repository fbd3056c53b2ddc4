//! Board persistence contract
//!
//! The engine treats every persistence call as a fallible remote call: local
//! state is updated first and the backend is reconciled afterwards.
//! `FallbackPersistence` retries 404-class failures against a legacy backend
//! and `InMemoryPersistence` is a complete in-process backend.

use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;
use crate::types::{
    BoardId, Edge, LastExecution, Node, NodeId, NodeStatus, Position, ValueMap,
};

type PersistResult<T> = std::result::Result<T, PersistenceError>;

/// Partial update of a persisted node
///
/// Absent fields are left untouched; `parameters` is merged key by key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<ValueMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<NodeStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_output: Option<ValueMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_execution: Option<LastExecution>,
}

impl NodePatch {
    pub fn parameters(parameters: ValueMap) -> Self {
        Self {
            parameters: Some(parameters),
            ..Self::default()
        }
    }

    /// Execution result of a node: status, output and timing
    pub fn execution_state(node: &Node) -> Self {
        Self {
            status: Some(node.status),
            cached_output: node.cached_output.clone(),
            last_execution: node.last_execution.clone(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Fold a newer patch into this one; newer values win
    pub fn merge(&mut self, newer: NodePatch) {
        if let Some(parameters) = newer.parameters {
            self.parameters
                .get_or_insert_with(ValueMap::new)
                .extend(parameters);
        }
        if newer.position.is_some() {
            self.position = newer.position;
        }
        if newer.status.is_some() {
            self.status = newer.status;
        }
        if newer.cached_output.is_some() {
            self.cached_output = newer.cached_output;
        }
        if newer.last_execution.is_some() {
            self.last_execution = newer.last_execution;
        }
    }

    /// Apply the patch to a node
    pub fn apply_to(&self, node: &mut Node) {
        if let Some(parameters) = &self.parameters {
            for (key, value) in parameters {
                if value.is_null() {
                    node.parameters.remove(key);
                } else {
                    node.parameters.insert(key.clone(), value.clone());
                }
            }
        }
        if let Some(position) = self.position {
            node.position = position;
        }
        if let Some(status) = self.status {
            node.status = status;
        }
        if let Some(output) = &self.cached_output {
            node.cached_output = Some(output.clone());
        }
        if let Some(run) = &self.last_execution {
            node.last_execution = Some(run.clone());
        }
    }
}

/// One entry of a batched position write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionUpdate {
    pub node_id: NodeId,
    pub position: Position,
}

impl PositionUpdate {
    pub fn new(node_id: impl Into<String>, position: Position) -> Self {
        Self {
            node_id: node_id.into(),
            position,
        }
    }
}

/// Result of a batched position write
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub updated: usize,
    /// Nodes the backend did not know
    #[serde(default)]
    pub missing: Vec<NodeId>,
}

/// Durable storage for boards
#[async_trait]
pub trait BoardPersistence: Send + Sync {
    async fn create_node(&self, board_id: &str, node: &Node) -> PersistResult<Node>;
    async fn list_nodes(&self, board_id: &str) -> PersistResult<Vec<Node>>;
    async fn update_node(&self, node_id: &str, patch: &NodePatch) -> PersistResult<Node>;
    async fn delete_node(&self, node_id: &str) -> PersistResult<()>;
    async fn batch_update_positions(
        &self,
        board_id: &str,
        updates: &[PositionUpdate],
    ) -> PersistResult<BatchSummary>;
    async fn create_edge(&self, board_id: &str, edge: &Edge) -> PersistResult<Edge>;
    async fn list_edges(&self, board_id: &str) -> PersistResult<Vec<Edge>>;
    async fn delete_edge(&self, edge_id: &str) -> PersistResult<()>;
}

// =============================================================================
// In-memory backend
// =============================================================================

#[derive(Default)]
struct MemoryState {
    nodes: Vec<(BoardId, Node)>,
    edges: Vec<(BoardId, Edge)>,
    failure: Option<PersistenceError>,
    node_updates: usize,
}

/// Process-local backend keeping boards in insertion order
///
/// A failure can be injected with [`InMemoryPersistence::fail_with`]; every
/// call then returns that error until [`InMemoryPersistence::recover`].
#[derive(Default)]
pub struct InMemoryPersistence {
    state: Mutex<MemoryState>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a board
    pub fn with_board(board: &crate::types::Board) -> Self {
        let state = MemoryState {
            nodes: board
                .nodes
                .iter()
                .map(|n| (board.id.clone(), n.clone()))
                .collect(),
            edges: board
                .edges
                .iter()
                .map(|e| (board.id.clone(), e.clone()))
                .collect(),
            ..MemoryState::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn fail_with(&self, error: PersistenceError) {
        if let Ok(mut state) = self.state.lock() {
            state.failure = Some(error);
        }
    }

    pub fn recover(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.failure = None;
        }
    }

    /// Number of successful `update_node` calls
    pub fn node_updates(&self) -> usize {
        self.state.lock().map(|s| s.node_updates).unwrap_or(0)
    }

    pub fn stored_node(&self, node_id: &str) -> Option<Node> {
        self.state.lock().ok().and_then(|s| {
            s.nodes
                .iter()
                .find(|(_, n)| n.id == node_id)
                .map(|(_, n)| n.clone())
        })
    }

    pub fn stored_edge_ids(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.edges.iter().map(|(_, e)| e.id.clone()).collect())
            .unwrap_or_default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut MemoryState) -> PersistResult<T>) -> PersistResult<T> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| PersistenceError::Transport("state poisoned".to_string()))?;
        if let Some(failure) = &state.failure {
            return Err(failure.clone());
        }
        f(&mut state)
    }
}

#[async_trait]
impl BoardPersistence for InMemoryPersistence {
    async fn create_node(&self, board_id: &str, node: &Node) -> PersistResult<Node> {
        self.with_state(|state| {
            state.nodes.retain(|(_, n)| n.id != node.id);
            state.nodes.push((board_id.to_string(), node.clone()));
            Ok(node.clone())
        })
    }

    async fn list_nodes(&self, board_id: &str) -> PersistResult<Vec<Node>> {
        self.with_state(|state| {
            Ok(state
                .nodes
                .iter()
                .filter(|(board, _)| board == board_id)
                .map(|(_, n)| n.clone())
                .collect())
        })
    }

    async fn update_node(&self, node_id: &str, patch: &NodePatch) -> PersistResult<Node> {
        self.with_state(|state| {
            let (_, node) = state
                .nodes
                .iter_mut()
                .find(|(_, n)| n.id == node_id)
                .ok_or_else(|| PersistenceError::NotFound(format!("node {}", node_id)))?;
            patch.apply_to(node);
            let updated = node.clone();
            state.node_updates += 1;
            Ok(updated)
        })
    }

    async fn delete_node(&self, node_id: &str) -> PersistResult<()> {
        self.with_state(|state| {
            let before = state.nodes.len();
            state.nodes.retain(|(_, n)| n.id != node_id);
            if state.nodes.len() == before {
                return Err(PersistenceError::NotFound(format!("node {}", node_id)));
            }
            state.edges.retain(|(_, e)| !e.touches(node_id));
            Ok(())
        })
    }

    async fn batch_update_positions(
        &self,
        board_id: &str,
        updates: &[PositionUpdate],
    ) -> PersistResult<BatchSummary> {
        self.with_state(|state| {
            let mut summary = BatchSummary::default();
            for update in updates {
                let found = state
                    .nodes
                    .iter_mut()
                    .find(|(board, n)| board == board_id && n.id == update.node_id);
                match found {
                    Some((_, node)) => {
                        node.position = update.position;
                        summary.updated += 1;
                    }
                    None => summary.missing.push(update.node_id.clone()),
                }
            }
            Ok(summary)
        })
    }

    async fn create_edge(&self, board_id: &str, edge: &Edge) -> PersistResult<Edge> {
        self.with_state(|state| {
            state.edges.retain(|(_, e)| e.id != edge.id);
            state.edges.push((board_id.to_string(), edge.clone()));
            Ok(edge.clone())
        })
    }

    async fn list_edges(&self, board_id: &str) -> PersistResult<Vec<Edge>> {
        self.with_state(|state| {
            Ok(state
                .edges
                .iter()
                .filter(|(board, _)| board == board_id)
                .map(|(_, e)| e.clone())
                .collect())
        })
    }

    async fn delete_edge(&self, edge_id: &str) -> PersistResult<()> {
        self.with_state(|state| {
            let before = state.edges.len();
            state.edges.retain(|(_, e)| e.id != edge_id);
            if state.edges.len() == before {
                return Err(PersistenceError::NotFound(format!("edge {}", edge_id)));
            }
            Ok(())
        })
    }
}

// =============================================================================
// Legacy fallback
// =============================================================================

/// Retries not-found failures against an older backend
///
/// Entities created before a storage migration may only exist in the legacy
/// store. When both report not-found the entity simply does not exist:
/// deletes then succeed and listings come back empty.
pub struct FallbackPersistence<P, L> {
    primary: P,
    legacy: L,
}

impl<P, L> FallbackPersistence<P, L> {
    pub fn new(primary: P, legacy: L) -> Self {
        Self { primary, legacy }
    }

    pub fn primary(&self) -> &P {
        &self.primary
    }

    pub fn legacy(&self) -> &L {
        &self.legacy
    }
}

macro_rules! with_fallback {
    ($self:ident, $what:expr, $method:ident($($arg:expr),*)) => {
        match $self.primary.$method($($arg),*).await {
            Err(e) if e.is_not_found() => {
                log::debug!("{} not found in primary store, trying legacy backend", $what);
                $self.legacy.$method($($arg),*).await
            }
            other => other,
        }
    };
}

fn tolerate_missing<T: Default>(result: PersistResult<T>, what: &str) -> PersistResult<T> {
    match result {
        Err(e) if e.is_not_found() => {
            log::debug!("{} not found in either store, ignoring", what);
            Ok(T::default())
        }
        other => other,
    }
}

#[async_trait]
impl<P, L> BoardPersistence for FallbackPersistence<P, L>
where
    P: BoardPersistence,
    L: BoardPersistence,
{
    async fn create_node(&self, board_id: &str, node: &Node) -> PersistResult<Node> {
        with_fallback!(self, format!("board {}", board_id), create_node(board_id, node))
    }

    async fn list_nodes(&self, board_id: &str) -> PersistResult<Vec<Node>> {
        let result = with_fallback!(self, format!("board {}", board_id), list_nodes(board_id));
        tolerate_missing(result, &format!("board {}", board_id))
    }

    async fn update_node(&self, node_id: &str, patch: &NodePatch) -> PersistResult<Node> {
        with_fallback!(self, format!("node {}", node_id), update_node(node_id, patch))
    }

    async fn delete_node(&self, node_id: &str) -> PersistResult<()> {
        let result = with_fallback!(self, format!("node {}", node_id), delete_node(node_id));
        tolerate_missing(result, &format!("node {}", node_id))
    }

    async fn batch_update_positions(
        &self,
        board_id: &str,
        updates: &[PositionUpdate],
    ) -> PersistResult<BatchSummary> {
        let summary = with_fallback!(
            self,
            format!("board {}", board_id),
            batch_update_positions(board_id, updates)
        )?;
        if summary.missing.is_empty() {
            return Ok(summary);
        }

        // Nodes unknown to the primary store may still live in the legacy one
        let retry: Vec<PositionUpdate> = updates
            .iter()
            .filter(|u| summary.missing.contains(&u.node_id))
            .cloned()
            .collect();
        let legacy = tolerate_missing(
            self.legacy.batch_update_positions(board_id, &retry).await,
            &format!("board {}", board_id),
        )?;
        Ok(BatchSummary {
            updated: summary.updated + legacy.updated,
            missing: if legacy.updated == 0 && legacy.missing.is_empty() {
                retry.into_iter().map(|u| u.node_id).collect()
            } else {
                legacy.missing
            },
        })
    }

    async fn create_edge(&self, board_id: &str, edge: &Edge) -> PersistResult<Edge> {
        with_fallback!(self, format!("board {}", board_id), create_edge(board_id, edge))
    }

    async fn list_edges(&self, board_id: &str) -> PersistResult<Vec<Edge>> {
        let result = with_fallback!(self, format!("board {}", board_id), list_edges(board_id));
        tolerate_missing(result, &format!("board {}", board_id))
    }

    async fn delete_edge(&self, edge_id: &str) -> PersistResult<()> {
        let result = with_fallback!(self, format!("edge {}", edge_id), delete_edge(edge_id));
        tolerate_missing(result, &format!("edge {}", edge_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::BoardBuilder;
    use serde_json::json;

    fn seeded(board_id: &str, node_ids: &[&str]) -> InMemoryPersistence {
        let board = node_ids
            .iter()
            .fold(BoardBuilder::new(board_id), |b, id| b.add_node(*id, "x", (0.0, 0.0)))
            .build();
        InMemoryPersistence::with_board(&board)
    }

    #[test]
    fn test_patch_merge_and_apply() {
        let mut patch = NodePatch::parameters(json!({"a": 1, "b": 2}).as_object().unwrap().clone());
        patch.merge(NodePatch::parameters(json!({"b": 3, "c": null}).as_object().unwrap().clone()));
        patch.merge(NodePatch {
            position: Some(Position::new(5.0, 5.0)),
            ..NodePatch::default()
        });

        let mut node = BoardBuilder::new("b")
            .add_node("n", "x", (0.0, 0.0))
            .with_parameters(json!({"c": "gone", "d": "kept"}))
            .build()
            .nodes
            .remove(0);
        patch.apply_to(&mut node);

        assert_eq!(node.parameters["a"], 1);
        assert_eq!(node.parameters["b"], 3);
        assert!(!node.parameters.contains_key("c"));
        assert_eq!(node.parameters["d"], "kept");
        assert_eq!(node.position, Position::new(5.0, 5.0));
        assert!(NodePatch::default().is_empty());
    }

    #[test]
    fn test_patch_wire_format_omits_absent_fields() {
        let patch = NodePatch {
            status: Some(NodeStatus::Completed),
            ..NodePatch::default()
        };
        assert_eq!(serde_json::to_value(&patch).unwrap(), json!({"status": "completed"}));
    }

    #[tokio::test]
    async fn test_in_memory_round_trip() {
        let store = InMemoryPersistence::new();
        let board = BoardBuilder::new("b1")
            .add_node("n1", "x", (0.0, 0.0))
            .add_node("n2", "x", (300.0, 0.0))
            .add_edge("n1", "out", "n2", "in")
            .build();
        for node in &board.nodes {
            store.create_node("b1", node).await.unwrap();
        }
        store.create_edge("b1", &board.edges[0]).await.unwrap();

        assert_eq!(store.list_nodes("b1").await.unwrap().len(), 2);
        assert!(store.list_nodes("other").await.unwrap().is_empty());

        let summary = store
            .batch_update_positions(
                "b1",
                &[
                    PositionUpdate::new("n1", Position::new(10.0, 10.0)),
                    PositionUpdate::new("ghost", Position::new(0.0, 0.0)),
                ],
            )
            .await
            .unwrap();
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.missing, vec!["ghost".to_string()]);

        store.delete_node("n1").await.unwrap();
        assert!(store.list_edges("b1").await.unwrap().is_empty());
        assert!(store.delete_node("n1").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let store = seeded("b", &["n"]);
        store.fail_with(PersistenceError::Transport("offline".to_string()));
        assert!(matches!(
            store.list_nodes("b").await,
            Err(PersistenceError::Transport(_))
        ));
        store.recover();
        assert_eq!(store.list_nodes("b").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fallback_reaches_legacy_on_not_found() {
        let store = FallbackPersistence::new(seeded("b", &["new"]), seeded("b", &["old"]));

        let patch = NodePatch::parameters(json!({"text": "hi"}).as_object().unwrap().clone());
        let updated = store.update_node("old", &patch).await.unwrap();
        assert_eq!(updated.parameters["text"], "hi");
        assert_eq!(store.legacy().node_updates(), 1);
        assert_eq!(store.primary().node_updates(), 0);

        // Missing in both stores
        assert!(store.update_node("ghost", &patch).await.unwrap_err().is_not_found());
        store.delete_node("ghost").await.unwrap();
    }

    #[tokio::test]
    async fn test_fallback_does_not_retry_transport_errors() {
        let primary = seeded("b", &["n"]);
        primary.fail_with(PersistenceError::Transport("down".to_string()));
        let store = FallbackPersistence::new(primary, seeded("b", &["n"]));

        let patch = NodePatch::parameters(json!({"k": 1}).as_object().unwrap().clone());
        assert!(matches!(
            store.update_node("n", &patch).await,
            Err(PersistenceError::Transport(_))
        ));
        assert_eq!(store.legacy().node_updates(), 0);
    }

    #[tokio::test]
    async fn test_fallback_batch_positions_split() {
        let store = FallbackPersistence::new(seeded("b", &["new"]), seeded("b", &["old"]));
        let summary = store
            .batch_update_positions(
                "b",
                &[
                    PositionUpdate::new("new", Position::new(1.0, 1.0)),
                    PositionUpdate::new("old", Position::new(2.0, 2.0)),
                    PositionUpdate::new("ghost", Position::new(3.0, 3.0)),
                ],
            )
            .await
            .unwrap();
        assert_eq!(summary.updated, 2);
        assert_eq!(summary.missing, vec!["ghost".to_string()]);
        assert_eq!(
            store.legacy().stored_node("old").unwrap().position,
            Position::new(2.0, 2.0)
        );
    }
}
