//! Debounced, per-node coalescing of persisted writes
//!
//! Parameter edits are applied to the store immediately; their persisted
//! counterpart is folded into one pending patch per node and written once
//! the node has been quiet for the debounce period. A write the backend
//! fails is put back and attempted again after a retry delay, unless the
//! node no longer exists there.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::constants;
use crate::persistence::{BoardPersistence, NodePatch};
use crate::types::NodeId;

struct PendingWrite {
    patch: NodePatch,
    deadline: Instant,
}

/// Pending patches keyed by node, each with its own quiet-period deadline
pub struct WriteBuffer {
    pending: HashMap<NodeId, PendingWrite>,
    quiet: Duration,
    retry: Duration,
}

impl WriteBuffer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            quiet,
            retry: Duration::from_millis(constants::persistence::RETRY_MS),
        }
    }

    pub fn with_retry(mut self, retry: Duration) -> Self {
        self.retry = retry;
        self
    }

    /// Merge a patch into the node's pending write and restart its timer
    pub fn enqueue(&mut self, node_id: &str, patch: NodePatch, now: Instant) {
        let deadline = now + self.quiet;
        match self.pending.get_mut(node_id) {
            Some(pending) => {
                pending.patch.merge(patch);
                pending.deadline = deadline;
            }
            None => {
                self.pending
                    .insert(node_id.to_string(), PendingWrite { patch, deadline });
            }
        }
    }

    /// Put back a write that failed
    ///
    /// Edits queued since the failed attempt win over the failed patch, and
    /// keep their own deadline. Otherwise the write is retried after the
    /// retry delay.
    pub fn requeue(&mut self, node_id: &str, failed: NodePatch, now: Instant) {
        match self.pending.get_mut(node_id) {
            Some(pending) => {
                let newer = std::mem::replace(&mut pending.patch, failed);
                pending.patch.merge(newer);
            }
            None => {
                self.pending.insert(
                    node_id.to_string(),
                    PendingWrite {
                        patch: failed,
                        deadline: now + self.retry,
                    },
                );
            }
        }
    }

    /// Remove and return every write whose quiet period has elapsed
    pub fn due(&mut self, now: Instant) -> Vec<(NodeId, NodePatch)> {
        let ready: Vec<NodeId> = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(id, _)| id.clone())
            .collect();
        self.take(ready)
    }

    /// Remove and return every pending write
    pub fn flush_all(&mut self) -> Vec<(NodeId, NodePatch)> {
        let all: Vec<NodeId> = self.pending.keys().cloned().collect();
        self.take(all)
    }

    fn take(&mut self, ids: Vec<NodeId>) -> Vec<(NodeId, NodePatch)> {
        let mut taken: Vec<(Instant, NodeId, NodePatch)> = ids
            .into_iter()
            .filter_map(|id| {
                self.pending
                    .remove(&id)
                    .map(|p| (p.deadline, id, p.patch))
            })
            .collect();
        taken.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        taken.into_iter().map(|(_, id, patch)| (id, patch)).collect()
    }

    /// Drop the pending write for a node (e.g. it was deleted)
    pub fn discard(&mut self, node_id: &str) -> bool {
        self.pending.remove(node_id).is_some()
    }

    /// Earliest deadline among pending writes
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.deadline).min()
    }

    pub fn is_pending(&self, node_id: &str) -> bool {
        self.pending.contains_key(node_id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// A [`WriteBuffer`] drained by a background flusher task
pub struct WriteCoalescer {
    buffer: Arc<Mutex<WriteBuffer>>,
    persistence: Arc<dyn BoardPersistence>,
    wake: Arc<Notify>,
    token: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl WriteCoalescer {
    /// Start the flusher task; must be called inside a tokio runtime
    pub fn spawn(persistence: Arc<dyn BoardPersistence>, quiet: Duration) -> Self {
        let buffer = Arc::new(Mutex::new(WriteBuffer::new(quiet)));
        let wake = Arc::new(Notify::new());
        let token = CancellationToken::new();

        let handle = tokio::spawn(run_flusher(
            buffer.clone(),
            persistence.clone(),
            wake.clone(),
            token.clone(),
        ));

        Self {
            buffer,
            persistence,
            wake,
            token,
            handle: Mutex::new(Some(handle)),
        }
    }

    pub fn enqueue(&self, node_id: &str, patch: NodePatch) {
        if let Ok(mut buffer) = self.buffer.lock() {
            buffer.enqueue(node_id, patch, Instant::now());
        }
        self.wake.notify_one();
    }

    pub fn discard(&self, node_id: &str) -> bool {
        self.buffer
            .lock()
            .map(|mut buffer| buffer.discard(node_id))
            .unwrap_or(false)
    }

    pub fn pending(&self) -> usize {
        self.buffer.lock().map(|b| b.len()).unwrap_or(0)
    }

    /// Write everything pending now, ignoring quiet periods
    pub async fn flush(&self) {
        let writes = self
            .buffer
            .lock()
            .map(|mut buffer| buffer.flush_all())
            .unwrap_or_default();
        let failed = write_all(self.persistence.as_ref(), writes).await;
        if !failed.is_empty() {
            requeue(&self.buffer, failed);
            self.wake.notify_one();
        }
    }

    /// Stop the flusher and write whatever is still pending
    pub async fn shutdown(&self) {
        self.token.cancel();
        let handle = self.handle.lock().ok().and_then(|mut h| h.take());
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                log::warn!("Write flusher ended abnormally: {}", e);
            }
        }
        self.flush().await;
    }
}

impl Drop for WriteCoalescer {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn run_flusher(
    buffer: Arc<Mutex<WriteBuffer>>,
    persistence: Arc<dyn BoardPersistence>,
    wake: Arc<Notify>,
    token: CancellationToken,
) {
    loop {
        let deadline = match buffer.lock() {
            Ok(buffer) => buffer.next_deadline(),
            Err(_) => return,
        };

        match deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = wake.notified() => continue,
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = wake.notified() => continue,
                }
            }
        }

        let writes = match buffer.lock() {
            Ok(mut buffer) => buffer.due(Instant::now()),
            Err(_) => return,
        };
        let failed = write_all(persistence.as_ref(), writes).await;
        requeue(&buffer, failed);
    }
}

fn requeue(buffer: &Mutex<WriteBuffer>, failed: Vec<(NodeId, NodePatch)>) {
    if failed.is_empty() {
        return;
    }
    if let Ok(mut buffer) = buffer.lock() {
        let now = Instant::now();
        for (node_id, patch) in failed {
            buffer.requeue(&node_id, patch, now);
        }
    }
}

/// Write each patch, returning the ones worth retrying
async fn write_all(
    persistence: &dyn BoardPersistence,
    writes: Vec<(NodeId, NodePatch)>,
) -> Vec<(NodeId, NodePatch)> {
    let mut failed = Vec::new();
    for (node_id, patch) in writes {
        match persistence.update_node(&node_id, &patch).await {
            Ok(_) => log::debug!("Flushed pending write for '{}'", node_id),
            Err(e) if e.is_not_found() => {
                log::debug!("Dropping write for missing node '{}'", node_id)
            }
            Err(e) => {
                log::warn!("Failed to persist '{}', will retry: {}", node_id, e);
                failed.push((node_id, patch));
            }
        }
    }
    failed
}
