//! Board session: user actions against one board
//!
//! Every action is applied to the in-memory store first and persisted
//! afterwards. Creates that fail to persist are kept locally and remembered
//! for [`BoardSession::reconcile`]; deletes tolerate entities the backend no
//! longer knows. Structural changes are recorded on the undo stack.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::config::{EdgeWritePolicy, EngineConfig};
use crate::error::{EngineError, PersistenceError, Result};
use crate::events::{emit, CanvasEvent, EventSink, NullEventSink};
use crate::executor::{
    AdapterRegistry, ExecutionOutcome, GenerationProvider, NodeExecutor,
};
use crate::layout::{
    auto_layout, find_free_position, resolve_all_collisions, snap_position, AutoLayoutOptions,
    CollisionOptions, SnapResult,
};
use crate::persistence::{BoardPersistence, NodePatch, PositionUpdate};
use crate::registry::NodeRegistry;
use crate::store::{GraphStore, SharedGraphStore};
use crate::types::{Board, Edge, EdgeId, Node, NodeId, Position, ValueMap};
use crate::undo::UndoStack;
use crate::validation::{validate_board, ConnectionCandidate, ValidationError};
use crate::write_buffer::WriteCoalescer;

/// Collaborators a session talks to
pub struct SessionServices {
    pub registry: Arc<NodeRegistry>,
    pub persistence: Arc<dyn BoardPersistence>,
    pub provider: Arc<dyn GenerationProvider>,
    pub adapters: AdapterRegistry,
    pub events: Arc<dyn EventSink>,
}

impl SessionServices {
    pub fn new(
        registry: Arc<NodeRegistry>,
        persistence: Arc<dyn BoardPersistence>,
        provider: Arc<dyn GenerationProvider>,
    ) -> Self {
        Self {
            registry,
            persistence,
            provider,
            adapters: AdapterRegistry::new(),
            events: Arc::new(NullEventSink),
        }
    }

    pub fn with_adapters(mut self, adapters: AdapterRegistry) -> Self {
        self.adapters = adapters;
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }
}

/// Summary of [`BoardSession::load`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub nodes: usize,
    pub edges: usize,
    /// Structural problems found in the persisted board
    pub issues: Vec<ValidationError>,
    /// Edges dropped because an endpoint is missing
    pub dropped_edges: Vec<EdgeId>,
    /// Nodes moved apart because they overlapped
    pub adjusted: Vec<(NodeId, Position)>,
}

/// Summary of [`BoardSession::reconcile`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    pub nodes_synced: usize,
    pub edges_synced: usize,
    /// Entities still not persisted
    pub remaining: usize,
}

#[derive(Default)]
struct Unsynced {
    nodes: HashSet<NodeId>,
    edges: HashSet<EdgeId>,
}

/// A loaded board and everything needed to edit and run it
pub struct BoardSession {
    store: SharedGraphStore,
    persistence: Arc<dyn BoardPersistence>,
    executor: NodeExecutor,
    writes: WriteCoalescer,
    history: Mutex<UndoStack>,
    unsynced: Mutex<Unsynced>,
    events: Arc<dyn EventSink>,
    config: EngineConfig,
}

impl BoardSession {
    /// Create a session for an empty board; must be called inside a tokio runtime
    pub fn new(board_id: impl Into<String>, services: SessionServices, config: EngineConfig) -> Self {
        let store = GraphStore::new(board_id, services.registry).into_shared();
        let executor = NodeExecutor::new(store.clone(), services.provider)
            .with_adapters(services.adapters)
            .with_persistence(services.persistence.clone())
            .with_events(services.events.clone())
            .with_config(config.execution.clone());
        let writes = WriteCoalescer::spawn(
            services.persistence.clone(),
            config.persistence.debounce(),
        );

        Self {
            store,
            persistence: services.persistence,
            executor,
            writes,
            history: Mutex::new(UndoStack::new(config.history.max_snapshots)),
            unsynced: Mutex::new(Unsynced::default()),
            events: services.events,
            config,
        }
    }

    pub fn store(&self) -> &SharedGraphStore {
        &self.store
    }

    pub fn executor(&self) -> &NodeExecutor {
        &self.executor
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Consistent copy of the board
    pub async fn snapshot(&self) -> Board {
        self.store.read().await.snapshot()
    }

    async fn board_id(&self) -> String {
        self.store.read().await.board_id().to_string()
    }

    fn emit(&self, event: CanvasEvent) {
        emit(self.events.as_ref(), event);
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Load the board from persistence, replacing the local state
    ///
    /// Structural problems are reported rather than rejected; edges with a
    /// missing endpoint are dropped and overlapping nodes are moved apart
    /// (the new positions are written back).
    pub async fn load(&self) -> Result<LoadReport> {
        let board_id = self.board_id().await;
        let nodes = self.persistence.list_nodes(&board_id).await?;
        let edges = self.persistence.list_edges(&board_id).await?;

        let mut board = Board {
            id: board_id.clone(),
            nodes,
            edges,
        };

        let issues = validate_board(&board);
        for issue in &issues {
            log::warn!("Board '{}': {}", board_id, issue);
        }

        let known: HashSet<&str> = board.nodes.iter().map(|n| n.id.as_str()).collect();
        let (kept, dropped): (Vec<Edge>, Vec<Edge>) = board.edges.drain(..).partition(|e| {
            known.contains(e.source_node_id.as_str()) && known.contains(e.target_node_id.as_str())
        });
        board.edges = kept;

        let resolution =
            resolve_all_collisions(&board.nodes, &CollisionOptions::from(&self.config.layout));
        for (id, position) in &resolution.moved {
            if let Some(node) = board.find_node_mut(id) {
                node.position = *position;
            }
        }

        let report = LoadReport {
            nodes: board.nodes.len(),
            edges: board.edges.len(),
            issues,
            dropped_edges: dropped.into_iter().map(|e| e.id).collect(),
            adjusted: resolution.moved,
        };

        self.store.write().await.replace_board(board.clone());
        if let Ok(mut history) = self.history.lock() {
            history.clear();
            if let Err(e) = history.push(&board) {
                log::warn!("Failed to record initial snapshot: {}", e);
            }
        }
        if let Ok(mut unsynced) = self.unsynced.lock() {
            *unsynced = Unsynced::default();
        }

        if !report.adjusted.is_empty() {
            log::info!(
                "Moved {} overlapping node(s) on board '{}'",
                report.adjusted.len(),
                board_id
            );
            self.persist_positions(&board_id, &report.adjusted).await;
            self.emit(CanvasEvent::PositionsAdjusted {
                positions: report.adjusted.clone(),
            });
        }

        log::info!(
            "Loaded board '{}' ({} nodes, {} edges)",
            board_id,
            report.nodes,
            report.edges
        );
        Ok(report)
    }

    // =========================================================================
    // Nodes
    // =========================================================================

    /// Add a node of the given type near `position`
    ///
    /// The node is placed at the nearest free spot. A failed persist keeps
    /// the node locally and marks it for reconciliation.
    pub async fn add_node(&self, node_type: &str, position: Position) -> Result<Node> {
        let options = CollisionOptions::from(&self.config.layout);
        let (node, board_id) = {
            let mut store = self.store.write().await;
            let mut node = store.create_node(node_type, position)?;
            let placed = find_free_position(store.nodes(), &node.id, position, &options);
            if placed.adjusted {
                store.set_position(&node.id, placed.position)?;
                node.position = placed.position;
            }
            (node, store.board_id().to_string())
        };

        self.emit(CanvasEvent::NodeAdded {
            node_id: node.id.clone(),
            node_type: node.node_type.clone(),
        });
        self.record_history().await;

        if let Err(e) = self.persistence.create_node(&board_id, &node).await {
            log::warn!("Failed to persist node '{}', will retry: {}", node.id, e);
            self.mark_unsynced_node(&node.id);
            self.emit(CanvasEvent::warning(format!(
                "{} was added locally but could not be saved",
                node.node_type
            )));
        }
        Ok(node)
    }

    /// Delete a node and its edges
    ///
    /// Any job being followed for the node is cancelled and pending writes
    /// are dropped.
    pub async fn delete_node(&self, node_id: &str) -> Result<()> {
        self.executor.cancel(node_id);
        self.writes.discard(node_id);

        let (_, removed_edges) = self.store.write().await.remove_node(node_id)?;
        let was_unsynced = self.forget_unsynced_node(node_id);
        for edge in &removed_edges {
            self.forget_unsynced_edge(&edge.id);
        }

        self.emit(CanvasEvent::NodeRemoved {
            node_id: node_id.to_string(),
            removed_edges: removed_edges.iter().map(|e| e.id.clone()).collect(),
        });
        self.record_history().await;

        if !was_unsynced {
            tolerate_missing(
                self.persistence.delete_node(node_id).await,
                &format!("node '{}'", node_id),
            );
        }
        Ok(())
    }

    /// Merge a parameter patch into a node
    ///
    /// Applied to the store immediately; the persisted write is coalesced
    /// with other edits to the same node.
    pub async fn update_parameters(&self, node_id: &str, patch: ValueMap) -> Result<()> {
        self.store.write().await.update_parameters(node_id, &patch)?;
        self.writes.enqueue(node_id, NodePatch::parameters(patch));
        Ok(())
    }

    /// Commit the end of a drag
    ///
    /// The drop point is snapped to the grid and then nudged to the nearest
    /// spot that does not overlap another node.
    pub async fn drag_end(&self, node_id: &str, position: Position) -> Result<SnapResult> {
        let options = CollisionOptions::from(&self.config.layout);
        let snapped = snap_position(position, self.config.layout.grid_size);

        let (result, board_id) = {
            let mut store = self.store.write().await;
            if !store.contains_node(node_id) {
                return Err(EngineError::NodeNotFound(node_id.to_string()));
            }
            let result = find_free_position(store.nodes(), node_id, snapped, &options);
            store.set_position(node_id, result.position)?;
            (result, store.board_id().to_string())
        };

        if result.adjusted {
            log::debug!("Drop of '{}' adjusted to {:?}", node_id, result.position);
            self.emit(CanvasEvent::PositionsAdjusted {
                positions: vec![(node_id.to_string(), result.position)],
            });
        }
        self.record_history().await;
        self.persist_positions(&board_id, &[(node_id.to_string(), result.position)])
            .await;
        Ok(result)
    }

    /// Lay out the whole board, or only `subset`
    pub async fn auto_layout(&self, subset: Option<&[NodeId]>) -> Result<Vec<(NodeId, Position)>> {
        let options = AutoLayoutOptions::from(&self.config.layout);
        let (positions, board_id) = {
            let mut store = self.store.write().await;
            let positions = auto_layout(store.board(), subset, &options);
            store.apply_positions(&positions);
            (positions, store.board_id().to_string())
        };
        if positions.is_empty() {
            return Ok(positions);
        }

        log::info!("Auto-layout placed {} node(s)", positions.len());
        self.emit(CanvasEvent::PositionsAdjusted {
            positions: positions.clone(),
        });
        self.record_history().await;
        self.persist_positions(&board_id, &positions).await;
        Ok(positions)
    }

    // =========================================================================
    // Edges
    // =========================================================================

    /// Validate and create a connection
    ///
    /// A rejected candidate leaves the board unchanged. What happens when the
    /// edge cannot be persisted depends on the configured edge write policy.
    pub async fn connect(&self, candidate: ConnectionCandidate) -> Result<Edge> {
        let (edge, board_id) = {
            let mut store = self.store.write().await;
            let edge = store.connect(&candidate, &self.config.connections)?;
            (edge, store.board_id().to_string())
        };
        self.emit(CanvasEvent::EdgeAdded { edge: edge.clone() });

        let endpoint_unsynced = self.is_unsynced_node(&edge.source_node_id)
            || self.is_unsynced_node(&edge.target_node_id);
        let result = if endpoint_unsynced {
            Err(PersistenceError::Transport(
                "endpoint not yet persisted".to_string(),
            ))
        } else {
            self.persistence.create_edge(&board_id, &edge).await
        };

        match result {
            Ok(_) => {
                self.record_history().await;
                Ok(edge)
            }
            Err(e) => match self.config.persistence.edge_write_policy {
                EdgeWritePolicy::KeepOnFailure => {
                    log::warn!("Failed to persist edge '{}', will retry: {}", edge.id, e);
                    self.mark_unsynced_edge(&edge.id);
                    self.record_history().await;
                    Ok(edge)
                }
                EdgeWritePolicy::RollbackOnFailure => {
                    log::warn!("Failed to persist edge '{}', rolling back: {}", edge.id, e);
                    // The edge may already be gone if its node was deleted meanwhile
                    let _ = self.store.write().await.remove_edge(&edge.id);
                    self.emit(CanvasEvent::EdgeRemoved {
                        edge_id: edge.id.clone(),
                    });
                    self.emit(CanvasEvent::error("Connection could not be saved"));
                    Err(e.into())
                }
            },
        }
    }

    /// Remove a connection
    pub async fn disconnect(&self, edge_id: &str) -> Result<()> {
        self.store.write().await.remove_edge(edge_id)?;
        let was_unsynced = self.forget_unsynced_edge(edge_id);
        self.emit(CanvasEvent::EdgeRemoved {
            edge_id: edge_id.to_string(),
        });
        self.record_history().await;

        if !was_unsynced {
            tolerate_missing(
                self.persistence.delete_edge(edge_id).await,
                &format!("edge '{}'", edge_id),
            );
        }
        Ok(())
    }

    // =========================================================================
    // Execution
    // =========================================================================

    pub async fn execute(&self, node_id: &str) -> Result<ExecutionOutcome> {
        self.executor.execute(node_id).await
    }

    /// Nodes whose upstream inputs are all available
    pub async fn ready_to_run(&self) -> Vec<NodeId> {
        self.store.read().await.ready_to_run()
    }

    // =========================================================================
    // History
    // =========================================================================

    async fn record_history(&self) {
        let board = self.snapshot().await;
        if let Ok(mut history) = self.history.lock() {
            if let Err(e) = history.push(&board) {
                log::warn!("Failed to record undo snapshot: {}", e);
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.lock().map(|h| h.can_undo()).unwrap_or(false)
    }

    pub fn can_redo(&self) -> bool {
        self.history.lock().map(|h| h.can_redo()).unwrap_or(false)
    }

    /// Restore the previous structure; returns false when there is nothing to undo
    pub async fn undo(&self) -> Result<bool> {
        let restored = self.history.lock().ok().and_then(|mut h| h.undo());
        match restored {
            Some(board) => {
                self.restore(board?).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Re-apply an undone change; returns false when there is nothing to redo
    pub async fn redo(&self) -> Result<bool> {
        let restored = self.history.lock().ok().and_then(|mut h| h.redo());
        match restored {
            Some(board) => {
                self.restore(board?).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Swap in a snapshot and push the difference to persistence
    ///
    /// Snapshots restore structure and positions only; parameters and
    /// execution state of surviving nodes stay as they are now.
    async fn restore(&self, mut target: Board) {
        let before = {
            let mut store = self.store.write().await;
            let before = store.snapshot();
            for node in &mut target.nodes {
                if let Some(current) = before.find_node(&node.id) {
                    let position = node.position;
                    *node = current.clone();
                    node.position = position;
                }
            }
            store.replace_board(target.clone());
            before
        };
        self.sync_difference(&before, &target).await;
    }

    async fn sync_difference(&self, before: &Board, after: &Board) {
        let board_id = after.id.clone();

        for node in &before.nodes {
            if after.find_node(&node.id).is_none() {
                self.executor.cancel(&node.id);
                self.writes.discard(&node.id);
                self.emit(CanvasEvent::NodeRemoved {
                    node_id: node.id.clone(),
                    removed_edges: Vec::new(),
                });
                if !self.forget_unsynced_node(&node.id) {
                    tolerate_missing(
                        self.persistence.delete_node(&node.id).await,
                        &format!("node '{}'", node.id),
                    );
                }
            }
        }
        for edge in &before.edges {
            if after.find_edge(&edge.id).is_none() {
                self.emit(CanvasEvent::EdgeRemoved {
                    edge_id: edge.id.clone(),
                });
                let removed_with_node = after.find_node(&edge.source_node_id).is_none()
                    || after.find_node(&edge.target_node_id).is_none();
                if !self.forget_unsynced_edge(&edge.id) && !removed_with_node {
                    tolerate_missing(
                        self.persistence.delete_edge(&edge.id).await,
                        &format!("edge '{}'", edge.id),
                    );
                }
            }
        }

        for node in &after.nodes {
            if before.find_node(&node.id).is_none() {
                self.emit(CanvasEvent::NodeAdded {
                    node_id: node.id.clone(),
                    node_type: node.node_type.clone(),
                });
                if let Err(e) = self.persistence.create_node(&board_id, node).await {
                    log::warn!("Failed to persist restored node '{}': {}", node.id, e);
                    self.mark_unsynced_node(&node.id);
                }
            }
        }
        for edge in &after.edges {
            if before.find_edge(&edge.id).is_none() {
                self.emit(CanvasEvent::EdgeAdded { edge: edge.clone() });
                if let Err(e) = self.persistence.create_edge(&board_id, edge).await {
                    log::warn!("Failed to persist restored edge '{}': {}", edge.id, e);
                    self.mark_unsynced_edge(&edge.id);
                }
            }
        }

        let moved: Vec<(NodeId, Position)> = after
            .nodes
            .iter()
            .filter(|node| {
                before
                    .find_node(&node.id)
                    .map_or(false, |old| old.position != node.position)
            })
            .map(|node| (node.id.clone(), node.position))
            .collect();
        if !moved.is_empty() {
            self.emit(CanvasEvent::PositionsAdjusted {
                positions: moved.clone(),
            });
            self.persist_positions(&board_id, &moved).await;
        }
    }

    // =========================================================================
    // Persistence bookkeeping
    // =========================================================================

    async fn persist_positions(&self, board_id: &str, positions: &[(NodeId, Position)]) {
        let updates: Vec<PositionUpdate> = positions
            .iter()
            .filter(|(id, _)| !self.is_unsynced_node(id))
            .map(|(id, position)| PositionUpdate::new(id.clone(), *position))
            .collect();
        if updates.is_empty() {
            return;
        }
        match self
            .persistence
            .batch_update_positions(board_id, &updates)
            .await
        {
            Ok(summary) if !summary.missing.is_empty() => {
                log::warn!(
                    "{} position update(s) referenced unknown nodes: {:?}",
                    summary.missing.len(),
                    summary.missing
                );
            }
            Ok(_) => {}
            Err(e) => log::warn!("Failed to persist {} position(s): {}", updates.len(), e),
        }
    }

    /// Retry persisting entities whose create failed
    ///
    /// Nodes go first so edges never reference a node the backend lacks.
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let (node_ids, edge_ids) = match self.unsynced.lock() {
            Ok(unsynced) => (
                unsynced.nodes.iter().cloned().collect::<Vec<_>>(),
                unsynced.edges.iter().cloned().collect::<Vec<_>>(),
            ),
            Err(_) => return Ok(ReconcileReport::default()),
        };
        let board = self.snapshot().await;
        let mut report = ReconcileReport::default();

        for id in node_ids {
            let Some(node) = board.find_node(&id) else {
                self.forget_unsynced_node(&id);
                continue;
            };
            match self.persistence.create_node(&board.id, node).await {
                Ok(_) => {
                    self.forget_unsynced_node(&id);
                    report.nodes_synced += 1;
                }
                Err(e) => log::warn!("Node '{}' still not persisted: {}", id, e),
            }
        }

        for id in edge_ids {
            let Some(edge) = board.find_edge(&id) else {
                self.forget_unsynced_edge(&id);
                continue;
            };
            if self.is_unsynced_node(&edge.source_node_id)
                || self.is_unsynced_node(&edge.target_node_id)
            {
                continue;
            }
            match self.persistence.create_edge(&board.id, edge).await {
                Ok(_) => {
                    self.forget_unsynced_edge(&id);
                    report.edges_synced += 1;
                }
                Err(e) => log::warn!("Edge '{}' still not persisted: {}", id, e),
            }
        }

        report.remaining = self.unsynced_count();
        if report.nodes_synced + report.edges_synced > 0 {
            log::info!(
                "Reconciled {} node(s) and {} edge(s), {} remaining",
                report.nodes_synced,
                report.edges_synced,
                report.remaining
            );
        }
        Ok(report)
    }

    pub fn unsynced_count(&self) -> usize {
        self.unsynced
            .lock()
            .map(|u| u.nodes.len() + u.edges.len())
            .unwrap_or(0)
    }

    fn is_unsynced_node(&self, id: &str) -> bool {
        self.unsynced
            .lock()
            .map(|u| u.nodes.contains(id))
            .unwrap_or(false)
    }

    fn mark_unsynced_node(&self, id: &str) {
        if let Ok(mut unsynced) = self.unsynced.lock() {
            unsynced.nodes.insert(id.to_string());
        }
    }

    fn mark_unsynced_edge(&self, id: &str) {
        if let Ok(mut unsynced) = self.unsynced.lock() {
            unsynced.edges.insert(id.to_string());
        }
    }

    fn forget_unsynced_node(&self, id: &str) -> bool {
        self.unsynced
            .lock()
            .map(|mut u| u.nodes.remove(id))
            .unwrap_or(false)
    }

    fn forget_unsynced_edge(&self, id: &str) -> bool {
        self.unsynced
            .lock()
            .map(|mut u| u.edges.remove(id))
            .unwrap_or(false)
    }

    /// Write pending parameter edits now
    pub async fn flush(&self) {
        self.writes.flush().await;
    }

    /// Stop polling and flush pending writes
    pub async fn shutdown(&self) {
        self.executor.shutdown().await;
        self.writes.shutdown().await;
        log::info!("Session for board '{}' closed", self.board_id().await);
    }
}

fn tolerate_missing(result: std::result::Result<(), PersistenceError>, what: &str) {
    match result {
        Ok(()) => {}
        Err(e) if e.is_not_found() => log::debug!("{} already gone from persistence", what),
        Err(e) => log::warn!("Failed to delete {}: {}", what, e),
    }
}
