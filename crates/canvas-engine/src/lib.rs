//! Canvas Engine - graph dataflow engine for the node canvas
//!
//! Users assemble a directed graph of typed generation nodes on an infinite
//! canvas. This crate provides:
//!
//! - Typed-port connection validation
//! - Execution input resolution from upstream outputs and parameters
//! - A per-node execution state machine with cancellable job polling
//! - Spatial layout: collision handling, drop snapping and auto-layout
//! - Debounced persistence and compressed snapshot-based undo/redo
//!
//! # Architecture
//!
//! - `GraphStore`: the in-memory board, shared as `Arc<RwLock<_>>`
//! - `NodeExecutor`: runs nodes through a `GenerationProvider`
//! - `BoardSession`: user actions wired to persistence, layout and history
//! - `EventSink`: event streaming to whatever hosts the canvas
//!
//! # Example
//!
//! ```ignore
//! use canvas_engine::{BoardSession, EngineConfig, Position, SessionServices};
//!
//! let session = BoardSession::new("board-1", services, EngineConfig::default());
//! session.load().await?;
//! let node = session.add_node("text-prompt", Position::new(0.0, 0.0)).await?;
//! session.execute(&node.id).await?;
//! ```

pub mod builder;
pub mod config;
pub mod constants;
pub mod descriptor;
pub mod error;
pub mod events;
pub mod executor;
pub mod layout;
pub mod persistence;
pub mod ports;
pub mod registry;
pub mod resolver;
pub mod session;
pub mod store;
pub mod types;
pub mod undo;
pub mod validation;
pub mod write_buffer;

// Re-export key types
pub use builder::BoardBuilder;
pub use config::{ConfigError, EdgeWritePolicy, EngineConfig};
pub use descriptor::{AdapterKind, NodeDefinition, ProviderBinding};
pub use error::{EngineError, PersistenceError, Result};
pub use events::{
    CanvasEvent, ChannelEventSink, EventError, EventSink, NotificationLevel, NullEventSink,
    VecEventSink,
};
pub use executor::{
    AdapterRegistry, ExecutionAdapter, ExecutionOutcome, ExecutionRequest, GenerationProvider,
    JobStatus, NodeExecutor, ProviderResponse, ScriptedProvider, StatusResponse,
};
pub use persistence::{
    BatchSummary, BoardPersistence, FallbackPersistence, InMemoryPersistence, NodePatch,
    PositionUpdate,
};
pub use ports::{is_compatible, PortType, TypeCheckMode};
pub use registry::NodeRegistry;
pub use resolver::{is_valid_value, resolve_inputs};
pub use session::{BoardSession, LoadReport, ReconcileReport, SessionServices};
pub use store::{GraphStore, SharedGraphStore};
pub use types::{
    Board, Dimensions, Edge, EdgeType, LastExecution, Node, NodeCategory, NodeId, NodeStatus,
    Port, Position, ValueMap,
};
pub use undo::UndoStack;
pub use validation::{
    validate_board, validate_connection, ConnectionCandidate, ConnectionCheck, ConnectionOptions,
    ValidationError,
};
