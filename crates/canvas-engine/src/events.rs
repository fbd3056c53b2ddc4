//! Event types for board changes and execution progress
//!
//! Events are sent from the engine to the UI (or any consumer) to report
//! graph changes, execution state and user-facing notifications.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::types::{Edge, NodeId, NodeStatus, Position};

/// Trait for sending canvas events
///
/// This abstracts over the transport mechanism (UI channel, mpsc, etc.)
/// so the engine never relies on ambient callbacks.
pub trait EventSink: Send + Sync {
    /// Send an event
    ///
    /// Returns an error if the event could not be sent (e.g., channel closed)
    fn send(&self, event: CanvasEvent) -> Result<(), EventError>;
}

/// Error when an event could not be delivered
#[derive(Debug, Clone, Error)]
pub enum EventError {
    /// The receiving side has gone away
    #[error("Event channel closed")]
    ChannelClosed,
    /// A collecting sink's lock was poisoned
    #[error("Event sink unavailable")]
    Unavailable,
}

/// Severity of a user-facing notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// Events emitted by a board session and its executions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CanvasEvent {
    #[serde(rename_all = "camelCase")]
    NodeAdded { node_id: NodeId, node_type: String },

    /// A node and its incident edges were removed
    #[serde(rename_all = "camelCase")]
    NodeRemoved {
        node_id: NodeId,
        removed_edges: Vec<String>,
    },

    #[serde(rename_all = "camelCase")]
    EdgeAdded { edge: Edge },

    #[serde(rename_all = "camelCase")]
    EdgeRemoved { edge_id: String },

    /// A node moved between idle/running/completed/error
    #[serde(rename_all = "camelCase")]
    StatusChanged { node_id: NodeId, status: NodeStatus },

    #[serde(rename_all = "camelCase")]
    ExecutionStarted { node_id: NodeId },

    /// A run finished and its output is cached on the node
    #[serde(rename_all = "camelCase")]
    ExecutionCompleted {
        node_id: NodeId,
        output: serde_json::Value,
    },

    #[serde(rename_all = "camelCase")]
    ExecutionFailed { node_id: NodeId, error: String },

    /// An asynchronous job is still running on the provider
    #[serde(rename_all = "camelCase")]
    JobQueued { node_id: NodeId, job_id: String },

    /// A status poll failed and will be retried
    #[serde(rename_all = "camelCase")]
    PollRetry {
        node_id: NodeId,
        error: String,
        retry_in_ms: u64,
    },

    /// Layout or collision resolution moved nodes
    #[serde(rename_all = "camelCase")]
    PositionsAdjusted { positions: Vec<(NodeId, Position)> },

    /// Transient, dismissible message for the user
    #[serde(rename_all = "camelCase")]
    Notification {
        level: NotificationLevel,
        message: String,
    },
}

impl CanvasEvent {
    /// Create an error notification
    pub fn error(message: impl Into<String>) -> Self {
        Self::Notification {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }

    /// Create a warning notification
    pub fn warning(message: impl Into<String>) -> Self {
        Self::Notification {
            level: NotificationLevel::Warning,
            message: message.into(),
        }
    }

    /// Create a status change event
    pub fn status(node_id: &str, status: NodeStatus) -> Self {
        Self::StatusChanged {
            node_id: node_id.to_string(),
            status,
        }
    }
}

/// Send an event, logging instead of failing when the sink is gone
pub(crate) fn emit(sink: &dyn EventSink, event: CanvasEvent) {
    if let Err(e) = sink.send(event) {
        log::warn!("Dropping canvas event: {}", e);
    }
}

/// A no-op event sink that discards all events
///
/// Useful for testing or when events aren't needed.
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn send(&self, _event: CanvasEvent) -> Result<(), EventError> {
        Ok(())
    }
}

/// A vector-based event sink that collects events
///
/// Useful for testing to verify events were emitted correctly.
pub struct VecEventSink {
    events: std::sync::Mutex<Vec<CanvasEvent>>,
}

impl VecEventSink {
    pub fn new() -> Self {
        Self {
            events: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Get all collected events
    pub fn events(&self) -> Vec<CanvasEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Clear all collected events
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl Default for VecEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for VecEventSink {
    fn send(&self, event: CanvasEvent) -> Result<(), EventError> {
        self.events
            .lock()
            .map_err(|_| EventError::Unavailable)?
            .push(event);
        Ok(())
    }
}

/// Forwards events into a tokio channel
///
/// The host owns the receiver and drains it on its own task.
#[derive(Clone)]
pub struct ChannelEventSink {
    sender: mpsc::UnboundedSender<CanvasEvent>,
}

impl ChannelEventSink {
    pub fn new(sender: mpsc::UnboundedSender<CanvasEvent>) -> Self {
        Self { sender }
    }

    /// Sink plus the receiver to drain
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<CanvasEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }
}

impl EventSink for ChannelEventSink {
    fn send(&self, event: CanvasEvent) -> Result<(), EventError> {
        self.sender
            .send(event)
            .map_err(|_| EventError::ChannelClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_event_sink() {
        let sink = VecEventSink::new();

        sink.send(CanvasEvent::status("node1", NodeStatus::Running))
            .unwrap();

        let events = sink.events();
        assert_eq!(events.len(), 1);

        match &events[0] {
            CanvasEvent::StatusChanged { node_id, status } => {
                assert_eq!(node_id, "node1");
                assert_eq!(*status, NodeStatus::Running);
            }
            _ => panic!("Expected StatusChanged event"),
        }

        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_null_event_sink() {
        let sink = NullEventSink;
        sink.send(CanvasEvent::error("boom")).unwrap();
    }

    #[test]
    fn test_channel_sink_reports_closed_receiver() {
        let (sink, mut receiver) = ChannelEventSink::channel();
        sink.send(CanvasEvent::status("n1", NodeStatus::Completed))
            .unwrap();
        assert_eq!(
            receiver.try_recv().unwrap(),
            CanvasEvent::status("n1", NodeStatus::Completed)
        );

        drop(receiver);
        assert!(matches!(
            sink.send(CanvasEvent::error("lost")),
            Err(EventError::ChannelClosed)
        ));
        // emit swallows the failure
        emit(&sink, CanvasEvent::error("lost"));
    }

    #[test]
    fn test_event_wire_format() {
        let json = serde_json::to_value(CanvasEvent::PollRetry {
            node_id: "n1".to_string(),
            error: "timeout".to_string(),
            retry_in_ms: 3000,
        })
        .unwrap();
        assert_eq!(json["type"], "pollRetry");
        assert_eq!(json["nodeId"], "n1");
        assert_eq!(json["retryInMs"], 3000);

        let json = serde_json::to_value(CanvasEvent::warning("saved locally")).unwrap();
        assert_eq!(json["type"], "notification");
        assert_eq!(json["level"], "warning");
    }
}
