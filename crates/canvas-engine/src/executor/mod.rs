//! Node execution
//!
//! `NodeExecutor` drives a single node through `idle → running →
//! {completed, error}`. The execution route comes from the node type's
//! [`ProviderBinding`]; asynchronous provider jobs are followed by a
//! cancellable polling task per node.

mod output;
mod polling;
mod provider;

pub use output::NormalizedOutput;
pub use polling::{PollRegistry, SharedPolls};
pub use provider::{
    AdapterRegistry, ExecutionAdapter, ExecutionRequest, GenerationProvider, JobStatus,
    ProviderResponse, ScriptedProvider, StatusResponse,
};

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::config::ExecutionConfig;
use crate::descriptor::{AdapterKind, ProviderBinding};
use crate::error::{EngineError, Result};
use crate::events::{emit, CanvasEvent, EventSink, NullEventSink};
use crate::persistence::{BoardPersistence, NodePatch};
use crate::resolver::{is_valid_value, resolve_inputs};
use crate::store::SharedGraphStore;
use crate::types::{Node, NodeStatus, ValueMap};

/// Result of a call to [`NodeExecutor::execute`]
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    /// The run finished and its output is cached on the node
    Completed { output: ValueMap },
    /// The provider accepted an asynchronous job; a poll task follows it
    Running { job_id: Option<String> },
    /// The run failed; the message is stored on the node
    Failed { error: String },
    /// The node was removed, or a newer run replaced this one, before the
    /// result arrived
    Discarded,
}

/// Executes nodes against a generation provider
///
/// Cheap to clone; clones share the store, the provider and the poll tasks.
#[derive(Clone)]
pub struct NodeExecutor {
    store: SharedGraphStore,
    provider: Arc<dyn GenerationProvider>,
    adapters: Arc<AdapterRegistry>,
    persistence: Option<Arc<dyn BoardPersistence>>,
    events: Arc<dyn EventSink>,
    config: ExecutionConfig,
    polls: SharedPolls,
}

impl NodeExecutor {
    pub fn new(store: SharedGraphStore, provider: Arc<dyn GenerationProvider>) -> Self {
        Self {
            store,
            provider,
            adapters: Arc::new(AdapterRegistry::new()),
            persistence: None,
            events: Arc::new(NullEventSink),
            config: ExecutionConfig::default(),
            polls: Arc::new(PollRegistry::new()),
        }
    }

    pub fn with_adapters(mut self, adapters: AdapterRegistry) -> Self {
        self.adapters = Arc::new(adapters);
        self
    }

    /// Persist terminal execution state through this backend
    pub fn with_persistence(mut self, persistence: Arc<dyn BoardPersistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_config(mut self, config: ExecutionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(&self) -> &SharedGraphStore {
        &self.store
    }

    /// Run a node
    ///
    /// Returns an error only when the node cannot be started at all (e.g. it
    /// does not exist). Provider rejections and unmet preconditions end in
    /// [`ExecutionOutcome::Failed`] with the node in the error state.
    pub async fn execute(&self, node_id: &str) -> Result<ExecutionOutcome> {
        // Re-execution supersedes any job still being followed
        self.polls.cancel(node_id);

        let (node, request, binding, run) = {
            let mut store = self.store.write().await;
            let node = store
                .node(node_id)
                .cloned()
                .ok_or_else(|| EngineError::NodeNotFound(node_id.to_string()))?;
            let inputs = resolve_inputs(store.board(), node_id)?;
            let binding = store.registry().binding_for(&node.node_type);
            store.mark_running(node_id)?;
            let run = self.polls.begin_run(node_id);
            let request = ExecutionRequest {
                inputs,
                parameters: node.parameters.clone(),
            };
            (node, request, binding, run)
        };

        log::debug!("Executing '{}' ({}) via {:?}", node_id, node.node_type, binding);
        emit(
            self.events.as_ref(),
            CanvasEvent::ExecutionStarted {
                node_id: node_id.to_string(),
            },
        );
        emit(self.events.as_ref(), CanvasEvent::status(node_id, NodeStatus::Running));

        let response = match binding {
            ProviderBinding::Passthrough => {
                let output = meaningful_parameters(&request.parameters);
                return Ok(self.complete(node_id, run, output).await);
            }
            ProviderBinding::Uniform => self.provider.execute(node_id, &request).await,
            ProviderBinding::Dedicated(kind) => self.execute_dedicated(kind, &node, &request).await,
        };

        Ok(match response {
            Ok(response) => self.handle_response(node_id, run, response).await,
            Err(e) => self.fail(node_id, run, e.to_string()).await,
        })
    }

    async fn execute_dedicated(
        &self,
        kind: AdapterKind,
        node: &Node,
        request: &ExecutionRequest,
    ) -> Result<ProviderResponse> {
        let adapter = self
            .adapters
            .get(kind)
            .ok_or_else(|| EngineError::failed(format!("no adapter registered for {:?}", kind)))?;
        let payload = adapter.build_payload(node, request)?;
        self.provider
            .execute_dedicated(kind.route(), &node.id, &payload)
            .await
    }

    async fn handle_response(
        &self,
        node_id: &str,
        run: u64,
        response: ProviderResponse,
    ) -> ExecutionOutcome {
        match response.status {
            JobStatus::Completed => {
                let output = NormalizedOutput::classify(response.output.unwrap_or(Value::Null))
                    .into_cached_output();
                self.complete(node_id, run, output).await
            }
            JobStatus::Running => {
                if !self.start_polling(node_id, run) {
                    log::debug!(
                        "Dropping job {:?} of a superseded run of '{}'",
                        response.job_id,
                        node_id
                    );
                    return ExecutionOutcome::Discarded;
                }
                if let Some(job_id) = &response.job_id {
                    emit(
                        self.events.as_ref(),
                        CanvasEvent::JobQueued {
                            node_id: node_id.to_string(),
                            job_id: job_id.clone(),
                        },
                    );
                }
                log::debug!("'{}' queued as job {:?}", node_id, response.job_id);
                ExecutionOutcome::Running {
                    job_id: response.job_id,
                }
            }
            JobStatus::Error => {
                let error = response
                    .error
                    .unwrap_or_else(|| "provider reported an error".to_string());
                self.fail(node_id, run, error).await
            }
        }
    }

    async fn complete(&self, node_id: &str, run: u64, output: ValueMap) -> ExecutionOutcome {
        let updated = {
            let mut store = self.store.write().await;
            if !self.polls.is_current(node_id, run) {
                log::debug!("Dropping result of a superseded run of '{}'", node_id);
                return ExecutionOutcome::Discarded;
            }
            if store.mark_completed(node_id, output.clone()).is_err() {
                None
            } else {
                store.node(node_id).cloned()
            }
        };
        let Some(node) = updated else {
            log::debug!("'{}' was removed before its result arrived", node_id);
            return ExecutionOutcome::Discarded;
        };

        log::debug!("'{}' completed", node_id);
        emit(
            self.events.as_ref(),
            CanvasEvent::ExecutionCompleted {
                node_id: node_id.to_string(),
                output: Value::Object(output.clone()),
            },
        );
        emit(self.events.as_ref(), CanvasEvent::status(node_id, NodeStatus::Completed));
        self.persist(&node).await;
        ExecutionOutcome::Completed { output }
    }

    async fn fail(&self, node_id: &str, run: u64, error: String) -> ExecutionOutcome {
        let updated = {
            let mut store = self.store.write().await;
            if !self.polls.is_current(node_id, run) {
                log::debug!("Dropping failure of a superseded run of '{}': {}", node_id, error);
                return ExecutionOutcome::Discarded;
            }
            if store.mark_failed(node_id, error.clone()).is_err() {
                None
            } else {
                store.node(node_id).cloned()
            }
        };
        let Some(node) = updated else {
            log::debug!("'{}' was removed before its failure arrived", node_id);
            return ExecutionOutcome::Discarded;
        };

        log::error!("Execution of '{}' failed: {}", node_id, error);
        emit(
            self.events.as_ref(),
            CanvasEvent::ExecutionFailed {
                node_id: node_id.to_string(),
                error: error.clone(),
            },
        );
        emit(self.events.as_ref(), CanvasEvent::status(node_id, NodeStatus::Error));
        emit(
            self.events.as_ref(),
            CanvasEvent::error(format!("{} failed: {}", node.node_type, error)),
        );
        self.persist(&node).await;
        ExecutionOutcome::Failed { error }
    }

    /// Best-effort write of the node's execution state
    async fn persist(&self, node: &Node) {
        let Some(persistence) = &self.persistence else {
            return;
        };
        if let Err(e) = persistence
            .update_node(&node.id, &NodePatch::execution_state(node))
            .await
        {
            log::warn!("Failed to persist execution state of '{}': {}", node.id, e);
        }
    }

    // =========================================================================
    // Polling
    // =========================================================================

    /// Follow the run's job; `false` when a newer run owns the node
    fn start_polling(&self, node_id: &str, run: u64) -> bool {
        let executor = self.clone();
        let id = node_id.to_string();
        self.polls.start_for_run(node_id, run, move |token, generation| async move {
            executor.poll_until_settled(&id, run, &token).await;
            executor.polls.finished(&id, generation);
        })
    }

    async fn poll_until_settled(&self, node_id: &str, run: u64, token: &CancellationToken) {
        let mut delay = self.config.poll_interval();
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    log::debug!("Polling for '{}' cancelled", node_id);
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            if !self.store.read().await.contains_node(node_id) {
                log::debug!("'{}' no longer exists, stopping poll", node_id);
                return;
            }

            let status = self.provider.get_status(node_id).await;
            if token.is_cancelled() {
                return;
            }

            match status {
                Ok(status) => match status.status {
                    JobStatus::Running => delay = self.config.poll_interval(),
                    JobStatus::Completed => {
                        let output = status.cached_output.unwrap_or_default();
                        let outcome = self.complete(node_id, run, output).await;
                        log::debug!("Poll for '{}' settled: {:?}", node_id, outcome);
                        return;
                    }
                    JobStatus::Error => {
                        let error = status
                            .error
                            .unwrap_or_else(|| "provider reported an error".to_string());
                        let outcome = self.fail(node_id, run, error).await;
                        log::debug!("Poll for '{}' settled: {:?}", node_id, outcome);
                        return;
                    }
                },
                Err(e) => {
                    delay = self.config.retry_interval();
                    log::warn!(
                        "Status poll for '{}' failed, retrying in {:?}: {}",
                        node_id,
                        delay,
                        e
                    );
                    emit(
                        self.events.as_ref(),
                        CanvasEvent::PollRetry {
                            node_id: node_id.to_string(),
                            error: e.to_string(),
                            retry_in_ms: duration_ms(delay),
                        },
                    );
                }
            }
        }
    }

    /// Stop following a node's job, returning whether a poll was running
    pub fn cancel(&self, node_id: &str) -> bool {
        self.polls.cancel(node_id)
    }

    pub fn is_polling(&self, node_id: &str) -> bool {
        self.polls.is_polling(node_id)
    }

    /// Cancel every poll and wait for the tasks to end
    pub async fn shutdown(&self) {
        self.polls.shutdown().await;
    }
}

/// Parameters an input node publishes as its output
fn meaningful_parameters(parameters: &ValueMap) -> ValueMap {
    parameters
        .iter()
        .filter(|(_, value)| is_valid_value(value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::BoardBuilder;
    use crate::descriptor::NodeDefinition;
    use crate::events::VecEventSink;
    use crate::persistence::InMemoryPersistence;
    use crate::registry::NodeRegistry;
    use crate::store::GraphStore;
    use crate::types::{Board, NodeCategory};
    use crate::error::PersistenceError;
    use serde_json::json;

    fn registry() -> Arc<NodeRegistry> {
        let mut registry = NodeRegistry::new();
        registry.register(
            NodeDefinition::new("text-prompt", NodeCategory::Input, "Prompt")
                .with_binding(ProviderBinding::Passthrough),
        );
        registry.register(NodeDefinition::new("video-generation", NodeCategory::Video, "Video"));
        registry.register(
            NodeDefinition::new("virtual-try-on", NodeCategory::Fashion, "Try-on")
                .with_binding(ProviderBinding::Dedicated(AdapterKind::VirtualTryOn)),
        );
        Arc::new(registry)
    }

    fn board() -> Board {
        BoardBuilder::new("b1")
            .add_node("prompt", "text-prompt", (0.0, 0.0))
            .with_parameters(json!({"text": "a fox in the snow", "negative": ""}))
            .add_node("video", "video-generation", (400.0, 0.0))
            .with_parameters(json!({"duration": 5}))
            .add_edge("prompt", "text", "video", "prompt")
            .add_node("tryon", "virtual-try-on", (800.0, 0.0))
            .build()
    }

    struct Harness {
        executor: NodeExecutor,
        provider: Arc<ScriptedProvider>,
        events: Arc<VecEventSink>,
        persistence: Arc<InMemoryPersistence>,
    }

    fn harness() -> Harness {
        let board = board();
        let persistence = Arc::new(InMemoryPersistence::with_board(&board));
        let store = GraphStore::from_board(board, registry()).into_shared();
        let provider = Arc::new(ScriptedProvider::new());
        let events = Arc::new(VecEventSink::new());
        let executor = NodeExecutor::new(store, provider.clone())
            .with_events(events.clone())
            .with_persistence(persistence.clone());
        Harness {
            executor,
            provider,
            events,
            persistence,
        }
    }

    /// Replies to `execute` in order, each after its own delay
    struct DelayedProvider {
        replies: std::sync::Mutex<std::collections::VecDeque<(Duration, ProviderResponse)>>,
        status_calls: std::sync::atomic::AtomicUsize,
    }

    impl DelayedProvider {
        fn new(replies: Vec<(Duration, ProviderResponse)>) -> Self {
            Self {
                replies: std::sync::Mutex::new(replies.into()),
                status_calls: Default::default(),
            }
        }

        fn status_calls(&self) -> usize {
            self.status_calls.load(std::sync::atomic::Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl GenerationProvider for DelayedProvider {
        async fn execute(
            &self,
            _node_id: &str,
            _request: &ExecutionRequest,
        ) -> Result<ProviderResponse> {
            let next = self.replies.lock().unwrap().pop_front();
            let (delay, response) = next.ok_or_else(|| EngineError::provider("no reply left"))?;
            tokio::time::sleep(delay).await;
            Ok(response)
        }

        async fn get_status(&self, _node_id: &str) -> Result<StatusResponse> {
            self.status_calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(StatusResponse::completed(
                json!({"text": "polled"}).as_object().unwrap().clone(),
            ))
        }

        async fn execute_dedicated(
            &self,
            _route: &str,
            _node_id: &str,
            _payload: &Value,
        ) -> Result<ProviderResponse> {
            Err(EngineError::provider("not scripted"))
        }
    }

    fn delayed_executor(
        replies: Vec<(Duration, ProviderResponse)>,
    ) -> (NodeExecutor, Arc<DelayedProvider>) {
        let store = GraphStore::from_board(board(), registry()).into_shared();
        let provider = Arc::new(DelayedProvider::new(replies));
        (NodeExecutor::new(store, provider.clone()), provider)
    }

    async fn status_of(executor: &NodeExecutor, node_id: &str) -> NodeStatus {
        executor.store().read().await.node(node_id).unwrap().status
    }

    struct RequireGarment;

    impl ExecutionAdapter for RequireGarment {
        fn kind(&self) -> AdapterKind {
            AdapterKind::VirtualTryOn
        }

        fn build_payload(&self, _node: &Node, request: &ExecutionRequest) -> Result<Value> {
            let garment = request
                .inputs
                .get("garment")
                .ok_or_else(|| EngineError::precondition("requires a garment image"))?;
            Ok(json!({"garment": garment}))
        }
    }

    #[tokio::test]
    async fn test_passthrough_publishes_meaningful_parameters() {
        let h = harness();
        let outcome = h.executor.execute("prompt").await.unwrap();

        let expected = json!({"text": "a fox in the snow"}).as_object().unwrap().clone();
        assert_eq!(outcome, ExecutionOutcome::Completed { output: expected.clone() });
        assert!(h.provider.requests().is_empty());

        let store = h.executor.store().read().await;
        let node = store.node("prompt").unwrap();
        assert_eq!(node.status, NodeStatus::Completed);
        assert_eq!(node.cached_output.as_ref(), Some(&expected));
        assert!(node.last_execution.as_ref().unwrap().duration_ms.is_some());
    }

    #[tokio::test]
    async fn test_uniform_sends_resolved_inputs_and_normalizes_output() {
        let h = harness();
        h.provider
            .push_execute(Ok(ProviderResponse::completed(json!({"videoUrl": "v.mp4"}))));

        let outcome = h.executor.execute("video").await.unwrap();
        let ExecutionOutcome::Completed { output } = outcome else {
            panic!("expected completion");
        };
        assert_eq!(output["video"], "v.mp4");

        let requests = h.provider.requests();
        assert_eq!(requests.len(), 1);
        let (node_id, request) = &requests[0];
        assert_eq!(node_id, "video");
        assert_eq!(request.inputs["prompt"], "a fox in the snow");
        assert_eq!(request.parameters["duration"], 5);

        let persisted = h.persistence.stored_node("video").unwrap();
        assert_eq!(persisted.status, NodeStatus::Completed);
        assert_eq!(persisted.cached_output.unwrap()["video"], "v.mp4");

        let events = h.events.events();
        assert_eq!(
            events.first(),
            Some(&CanvasEvent::ExecutionStarted {
                node_id: "video".to_string()
            })
        );
        assert_eq!(
            events.last(),
            Some(&CanvasEvent::status("video", NodeStatus::Completed))
        );
    }

    #[tokio::test]
    async fn test_provider_rejection_marks_error_without_retry() {
        let h = harness();
        h.provider.push_execute(Err("quota exceeded".to_string()));

        let outcome = h.executor.execute("video").await.unwrap();
        let ExecutionOutcome::Failed { error } = outcome else {
            panic!("expected failure");
        };
        assert!(error.contains("quota exceeded"));
        assert_eq!(status_of(&h.executor, "video").await, NodeStatus::Error);
        assert_eq!(h.provider.requests().len(), 1);
        assert!(!h.executor.is_polling("video"));
        assert!(h
            .events
            .events()
            .iter()
            .any(|e| matches!(e, CanvasEvent::Notification { .. })));
    }

    #[tokio::test]
    async fn test_persistence_failure_does_not_fail_the_run() {
        let h = harness();
        h.persistence
            .fail_with(PersistenceError::Transport("offline".to_string()));
        h.provider
            .push_execute(Ok(ProviderResponse::completed(json!("done"))));

        let outcome = h.executor.execute("video").await.unwrap();
        assert!(matches!(outcome, ExecutionOutcome::Completed { .. }));
        assert_eq!(status_of(&h.executor, "video").await, NodeStatus::Completed);
    }

    #[tokio::test]
    async fn test_dedicated_precondition_fails_before_provider_call() {
        let h = harness();
        let mut adapters = AdapterRegistry::new();
        adapters.register(Arc::new(RequireGarment));
        let executor = h.executor.clone().with_adapters(adapters);

        let outcome = executor.execute("tryon").await.unwrap();
        assert_eq!(
            outcome,
            ExecutionOutcome::Failed {
                error: "requires a garment image".to_string()
            }
        );
        assert!(h.provider.dedicated_calls().is_empty());

        let store = executor.store().read().await;
        let run = store.node("tryon").unwrap().last_execution.clone().unwrap();
        assert_eq!(run.error.as_deref(), Some("requires a garment image"));
    }

    #[tokio::test]
    async fn test_dedicated_without_adapter_fails() {
        let h = harness();
        let outcome = h.executor.execute("tryon").await.unwrap();
        assert!(matches!(outcome, ExecutionOutcome::Failed { .. }));
        assert_eq!(status_of(&h.executor, "tryon").await, NodeStatus::Error);
    }

    #[tokio::test]
    async fn test_missing_node_is_an_error() {
        let h = harness();
        assert!(matches!(
            h.executor.execute("ghost").await,
            Err(EngineError::NodeNotFound(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_async_job_polls_once_then_completes() {
        let h = harness();
        h.provider.push_execute(Ok(ProviderResponse::running("job-1")));
        h.provider.push_status(Ok(StatusResponse::completed(
            json!({"video": "v.mp4"}).as_object().unwrap().clone(),
        )));

        let outcome = h.executor.execute("video").await.unwrap();
        assert_eq!(
            outcome,
            ExecutionOutcome::Running {
                job_id: Some("job-1".to_string())
            }
        );
        assert_eq!(status_of(&h.executor, "video").await, NodeStatus::Running);
        assert!(h.executor.is_polling("video"));

        tokio::time::sleep(Duration::from_millis(1900)).await;
        assert_eq!(h.provider.status_calls(), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(h.provider.status_calls(), 1);
        assert_eq!(status_of(&h.executor, "video").await, NodeStatus::Completed);
        assert!(!h.executor.is_polling("video"));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(h.provider.status_calls(), 1);
        assert!(h.events.events().contains(&CanvasEvent::JobQueued {
            node_id: "video".to_string(),
            job_id: "job-1".to_string()
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_failure_retries_at_longer_interval() {
        let h = harness();
        h.provider.push_execute(Ok(ProviderResponse::running("job-1")));
        h.provider
            .push_status(Err("gateway timeout".to_string()))
            .push_status(Ok(StatusResponse::error("content policy")));

        h.executor.execute("video").await.unwrap();

        // First poll at 2s fails, the retry lands at 5s
        tokio::time::sleep(Duration::from_millis(4900)).await;
        assert_eq!(h.provider.status_calls(), 1);
        assert_eq!(status_of(&h.executor, "video").await, NodeStatus::Running);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(h.provider.status_calls(), 2);
        assert_eq!(status_of(&h.executor, "video").await, NodeStatus::Error);
        assert!(h.events.events().iter().any(|e| matches!(
            e,
            CanvasEvent::PollRetry { retry_in_ms: 3000, .. }
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deleted_node_stops_polling() {
        let h = harness();
        h.provider.push_execute(Ok(ProviderResponse::running("job-1")));
        h.executor.execute("video").await.unwrap();

        h.executor.store().write().await.remove_node("video").unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(h.provider.status_calls(), 0);
        assert!(!h.executor.is_polling("video"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_polling() {
        let h = harness();
        h.provider.push_execute(Ok(ProviderResponse::running("job-1")));
        h.executor.execute("video").await.unwrap();

        assert!(h.executor.cancel("video"));
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(h.provider.status_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reexecution_replaces_previous_poll() {
        let h = harness();
        h.provider
            .push_execute(Ok(ProviderResponse::running("job-1")))
            .push_execute(Ok(ProviderResponse::running("job-2")));

        h.executor.execute("video").await.unwrap();
        tokio::time::sleep(Duration::from_millis(1000)).await;
        h.executor.execute("video").await.unwrap();

        // Only the second job's poll survives; it first fires at 3s
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(h.provider.status_calls(), 0);
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(h.provider.status_calls(), 1);

        h.executor.shutdown().await;
        assert!(!h.executor.is_polling("video"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_reply_of_replaced_run_is_dropped() {
        let (executor, _provider) = delayed_executor(vec![
            (
                Duration::from_secs(5),
                ProviderResponse::completed(json!({"text": "old"})),
            ),
            (Duration::ZERO, ProviderResponse::completed(json!({"text": "new"}))),
        ]);

        let first = tokio::spawn({
            let executor = executor.clone();
            async move { executor.execute("video").await }
        });
        tokio::time::sleep(Duration::from_secs(1)).await;

        let second = executor.execute("video").await.unwrap();
        let ExecutionOutcome::Completed { output } = second else {
            panic!("expected completion");
        };
        assert_eq!(output["text"], "new");

        let first = first.await.unwrap().unwrap();
        assert_eq!(first, ExecutionOutcome::Discarded);

        let store = executor.store().read().await;
        let node = store.node("video").unwrap();
        assert_eq!(node.status, NodeStatus::Completed);
        assert_eq!(node.cached_output.as_ref().unwrap()["text"], "new");
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_job_of_replaced_run_is_not_polled() {
        let (executor, provider) = delayed_executor(vec![
            (Duration::from_secs(5), ProviderResponse::running("job-old")),
            (Duration::ZERO, ProviderResponse::completed(json!({"text": "new"}))),
        ]);

        let first = tokio::spawn({
            let executor = executor.clone();
            async move { executor.execute("video").await }
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        executor.execute("video").await.unwrap();

        assert_eq!(first.await.unwrap().unwrap(), ExecutionOutcome::Discarded);
        assert!(!executor.is_polling("video"));

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(provider.status_calls(), 0);
        let store = executor.store().read().await;
        let output = store.node("video").unwrap().cached_output.clone().unwrap();
        assert_eq!(output["text"], "new");
    }
}
