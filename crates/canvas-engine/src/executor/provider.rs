//! Generation provider contract and execution adapters

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::descriptor::AdapterKind;
use crate::error::{EngineError, Result};
use crate::types::{Node, ValueMap};

/// Status reported by a provider for a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[serde(alias = "pending", alias = "queued", alias = "processing")]
    Running,
    #[serde(alias = "succeeded", alias = "success")]
    Completed,
    #[serde(alias = "failed")]
    Error,
}

/// Payload of a uniform execution call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    /// Resolved upstream values
    pub inputs: ValueMap,
    /// Snapshot of the node's own parameters
    pub parameters: ValueMap,
}

/// Reply to an execute call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderResponse {
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProviderResponse {
    pub fn completed(output: Value) -> Self {
        Self {
            status: JobStatus::Completed,
            output: Some(output),
            job_id: None,
            error: None,
        }
    }

    pub fn running(job_id: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Running,
            output: None,
            job_id: Some(job_id.into()),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Error,
            output: None,
            job_id: None,
            error: Some(message.into()),
        }
    }
}

/// Reply to a status poll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_output: Option<ValueMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusResponse {
    pub fn running() -> Self {
        Self {
            status: JobStatus::Running,
            cached_output: None,
            error: None,
        }
    }

    pub fn completed(cached_output: ValueMap) -> Self {
        Self {
            status: JobStatus::Completed,
            cached_output: Some(cached_output),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Error,
            cached_output: None,
            error: Some(message.into()),
        }
    }
}

/// External generation service
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Uniform execution call
    async fn execute(&self, node_id: &str, request: &ExecutionRequest) -> Result<ProviderResponse>;

    /// Current status of the job started for a node
    async fn get_status(&self, node_id: &str) -> Result<StatusResponse>;

    /// Provider-specific call for node types with bespoke request shaping
    async fn execute_dedicated(
        &self,
        route: &str,
        node_id: &str,
        payload: &Value,
    ) -> Result<ProviderResponse>;
}

/// Request shaping for one dedicated provider route
///
/// Adapters validate their required inputs and raise a descriptive
/// precondition error before anything is sent to the provider.
pub trait ExecutionAdapter: Send + Sync {
    fn kind(&self) -> AdapterKind;

    /// Build the dedicated payload for a node
    fn build_payload(&self, node: &Node, request: &ExecutionRequest) -> Result<Value>;
}

/// Adapters keyed by the dedicated route they serve
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<AdapterKind, Arc<dyn ExecutionAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter, replacing any previous one for the same kind
    pub fn register(&mut self, adapter: Arc<dyn ExecutionAdapter>) {
        self.adapters.insert(adapter.kind(), adapter);
    }

    pub fn get(&self, kind: AdapterKind) -> Option<&Arc<dyn ExecutionAdapter>> {
        self.adapters.get(&kind)
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("kinds", &self.adapters.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// In-process provider that replays scripted replies
///
/// Execute replies are consumed in order; once the status script is
/// exhausted every poll reports the job as still running. Useful for tests
/// and offline demos.
#[derive(Default)]
pub struct ScriptedProvider {
    execute_replies: Mutex<VecDeque<std::result::Result<ProviderResponse, String>>>,
    status_replies: Mutex<VecDeque<std::result::Result<StatusResponse, String>>>,
    requests: Mutex<Vec<(String, ExecutionRequest)>>,
    dedicated: Mutex<Vec<(String, String, Value)>>,
    status_calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the reply to the next execute (uniform or dedicated) call
    pub fn push_execute(&self, reply: std::result::Result<ProviderResponse, String>) -> &Self {
        if let Ok(mut replies) = self.execute_replies.lock() {
            replies.push_back(reply);
        }
        self
    }

    /// Queue the reply to the next status poll
    pub fn push_status(&self, reply: std::result::Result<StatusResponse, String>) -> &Self {
        if let Ok(mut replies) = self.status_replies.lock() {
            replies.push_back(reply);
        }
        self
    }

    /// Uniform requests received so far
    pub fn requests(&self) -> Vec<(String, ExecutionRequest)> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Dedicated calls received so far as `(route, node_id, payload)`
    pub fn dedicated_calls(&self) -> Vec<(String, String, Value)> {
        self.dedicated
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    fn next_execute(&self) -> Result<ProviderResponse> {
        let reply = self
            .execute_replies
            .lock()
            .map_err(|_| EngineError::provider("script poisoned"))?
            .pop_front();
        match reply {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(EngineError::Provider(message)),
            None => Err(EngineError::provider("no scripted reply")),
        }
    }
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    async fn execute(&self, node_id: &str, request: &ExecutionRequest) -> Result<ProviderResponse> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((node_id.to_string(), request.clone()));
        }
        self.next_execute()
    }

    async fn get_status(&self, _node_id: &str) -> Result<StatusResponse> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self
            .status_replies
            .lock()
            .map_err(|_| EngineError::provider("script poisoned"))?
            .pop_front();
        match reply {
            Some(Ok(status)) => Ok(status),
            Some(Err(message)) => Err(EngineError::Provider(message)),
            None => Ok(StatusResponse::running()),
        }
    }

    async fn execute_dedicated(
        &self,
        route: &str,
        node_id: &str,
        payload: &Value,
    ) -> Result<ProviderResponse> {
        if let Ok(mut calls) = self.dedicated.lock() {
            calls.push((route.to_string(), node_id.to_string(), payload.clone()));
        }
        self.next_execute()
    }
}
