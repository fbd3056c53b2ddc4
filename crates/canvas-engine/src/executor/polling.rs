//! Cancellable per-node polling tasks
//!
//! Each running job owns one task handle plus a cancellation token. Starting
//! a new poll for a node cancels the previous one, and deleting a node
//! cancels its poll deterministically instead of relying on the loop to
//! notice.
//!
//! The registry also numbers runs. Only the latest run of a node may record
//! a result or start a poll; replies belonging to an older run are dropped.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::types::NodeId;

struct PollHandle {
    token: CancellationToken,
    handle: JoinHandle<()>,
    generation: u64,
}

/// Registry of outstanding polling tasks, one per node
#[derive(Default)]
pub struct PollRegistry {
    tasks: Mutex<HashMap<NodeId, PollHandle>>,
    runs: Mutex<HashMap<NodeId, u64>>,
    next_generation: AtomicU64,
}

impl PollRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a polling task for a node, cancelling any previous one
    ///
    /// `make_task` receives the task's cancellation token and generation;
    /// the task should call [`PollRegistry::finished`] with that generation
    /// when it ends on its own.
    pub fn start<F, Fut>(&self, node_id: &str, make_task: F)
    where
        F: FnOnce(CancellationToken, u64) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CancellationToken::new();

        // Held across the spawn so a task that ends immediately cannot call
        // `finished` before its handle is registered
        let Ok(mut tasks) = self.tasks.lock() else {
            return;
        };
        let handle = tokio::spawn(make_task(token.clone(), generation));
        let previous = tasks.insert(
            node_id.to_string(),
            PollHandle {
                token,
                handle,
                generation,
            },
        );
        drop(tasks);
        if let Some(previous) = previous {
            log::debug!("Replacing poll for '{}'", node_id);
            previous.token.cancel();
        }
    }

    /// Open a new run for a node, superseding any earlier one
    pub fn begin_run(&self, node_id: &str) -> u64 {
        let run = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut runs) = self.runs.lock() {
            runs.insert(node_id.to_string(), run);
        }
        run
    }

    /// Whether `run` is still the latest run of the node
    pub fn is_current(&self, node_id: &str, run: u64) -> bool {
        self.runs
            .lock()
            .map(|runs| runs.get(node_id) == Some(&run))
            .unwrap_or(true)
    }

    /// Like [`PollRegistry::start`], but only while `run` is current
    ///
    /// The run table stays locked until the task is registered, so a newer
    /// run cannot begin in between and have its poll replaced by this one.
    pub fn start_for_run<F, Fut>(&self, node_id: &str, run: u64, make_task: F) -> bool
    where
        F: FnOnce(CancellationToken, u64) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let Ok(runs) = self.runs.lock() else {
            return false;
        };
        if runs.get(node_id) != Some(&run) {
            return false;
        }
        self.start(node_id, make_task);
        drop(runs);
        true
    }

    /// Cancel the poll for a node, returning whether one was running
    pub fn cancel(&self, node_id: &str) -> bool {
        let removed = self
            .tasks
            .lock()
            .ok()
            .and_then(|mut tasks| tasks.remove(node_id));
        match removed {
            Some(poll) => {
                poll.token.cancel();
                log::debug!("Cancelled poll for '{}'", node_id);
                true
            }
            None => false,
        }
    }

    /// Remove a task that ended by itself
    ///
    /// Ignored when a newer poll has replaced it in the meantime.
    pub fn finished(&self, node_id: &str, generation: u64) {
        if let Ok(mut tasks) = self.tasks.lock() {
            if tasks.get(node_id).map(|p| p.generation) == Some(generation) {
                tasks.remove(node_id);
            }
        }
    }

    pub fn is_polling(&self, node_id: &str) -> bool {
        self.tasks
            .lock()
            .map(|tasks| tasks.contains_key(node_id))
            .unwrap_or(false)
    }

    pub fn active(&self) -> usize {
        self.tasks.lock().map(|tasks| tasks.len()).unwrap_or(0)
    }

    /// Cancel every poll and wait for the tasks to stop
    pub async fn shutdown(&self) {
        let polls: Vec<PollHandle> = match self.tasks.lock() {
            Ok(mut tasks) => tasks.drain().map(|(_, poll)| poll).collect(),
            Err(_) => Vec::new(),
        };
        for poll in &polls {
            poll.token.cancel();
        }
        for poll in polls {
            if let Err(e) = poll.handle.await {
                log::warn!("Poll task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for PollRegistry {
    fn drop(&mut self) {
        if let Ok(tasks) = self.tasks.get_mut() {
            for poll in tasks.values() {
                poll.token.cancel();
            }
        }
    }
}

/// Shared handle to the registry
pub type SharedPolls = Arc<PollRegistry>;
