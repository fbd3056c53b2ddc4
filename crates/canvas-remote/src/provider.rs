//! HTTP generation provider

use async_trait::async_trait;
use canvas_engine::{
    ExecutionRequest, GenerationProvider, ProviderResponse, Result, StatusResponse,
};
use serde_json::Value;

use crate::client::RemoteClient;

/// Generation provider reached over the canvas REST API
///
/// - `POST /nodes/{id}/execute` for uniform execution
/// - `GET /nodes/{id}/status` while a job is running
/// - `POST /providers/{route}` for dedicated routes
#[derive(Debug, Clone)]
pub struct HttpProvider {
    client: RemoteClient,
}

impl HttpProvider {
    pub fn new(client: RemoteClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &RemoteClient {
        &self.client
    }
}

/// Dedicated payloads carry the node id so the provider can report back
fn with_node_id(payload: &Value, node_id: &str) -> Value {
    match payload {
        Value::Object(map) if !map.contains_key("nodeId") => {
            let mut map = map.clone();
            map.insert("nodeId".to_string(), Value::String(node_id.to_string()));
            Value::Object(map)
        }
        other => other.clone(),
    }
}

#[async_trait]
impl GenerationProvider for HttpProvider {
    async fn execute(&self, node_id: &str, request: &ExecutionRequest) -> Result<ProviderResponse> {
        let path = format!("/nodes/{}/execute", node_id);
        log::debug!("POST {}", path);
        let request = self.client.post(&path).json(request);
        Ok(self.client.send_json(request, &path).await?)
    }

    async fn get_status(&self, node_id: &str) -> Result<StatusResponse> {
        let path = format!("/nodes/{}/status", node_id);
        let request = self.client.get(&path);
        Ok(self.client.send_json(request, &path).await?)
    }

    async fn execute_dedicated(
        &self,
        route: &str,
        node_id: &str,
        payload: &Value,
    ) -> Result<ProviderResponse> {
        let path = format!("/providers/{}", route);
        log::debug!("POST {} for node '{}'", path, node_id);
        let request = self.client.post(&path).json(&with_node_id(payload, node_id));
        Ok(self.client.send_json(request, &path).await?)
    }
}
