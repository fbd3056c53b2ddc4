//! HTTP board persistence

use async_trait::async_trait;
use canvas_engine::{
    BatchSummary, BoardPersistence, Edge, FallbackPersistence, Node, NodePatch, PersistenceError,
    PositionUpdate,
};
use serde::Serialize;

use crate::client::{Listing, RemoteClient};
use crate::error::RemoteError;

type PersistResult<T> = std::result::Result<T, PersistenceError>;

/// Board storage behind the canvas REST API
///
/// A 404 from any endpoint surfaces as [`PersistenceError::NotFound`], which
/// is what [`FallbackPersistence`] keys its legacy retry on.
#[derive(Debug, Clone)]
pub struct HttpPersistence {
    client: RemoteClient,
}

/// Primary backend with a legacy backend consulted on not-found
pub type HttpFallbackPersistence = FallbackPersistence<HttpPersistence, HttpPersistence>;

#[derive(Serialize)]
struct PositionBatch<'a> {
    updates: &'a [PositionUpdate],
}

impl HttpPersistence {
    pub fn new(client: RemoteClient) -> Self {
        Self { client }
    }

    /// Current API at `primary`, older API at `legacy`
    pub fn with_legacy(primary: RemoteClient, legacy: RemoteClient) -> HttpFallbackPersistence {
        FallbackPersistence::new(Self::new(primary), Self::new(legacy))
    }

    pub fn client(&self) -> &RemoteClient {
        &self.client
    }

    async fn list<T: serde::de::DeserializeOwned>(&self, path: &str) -> PersistResult<Vec<T>> {
        let listing: Listing<T> = self.client.send_json(self.client.get(path), path).await?;
        Ok(listing.into_vec())
    }
}

fn persist<T>(result: std::result::Result<T, RemoteError>) -> PersistResult<T> {
    result.map_err(PersistenceError::from)
}

#[async_trait]
impl BoardPersistence for HttpPersistence {
    async fn create_node(&self, board_id: &str, node: &Node) -> PersistResult<Node> {
        let path = format!("/boards/{}/nodes", board_id);
        persist(self.client.send_json(self.client.post(&path).json(node), &path).await)
    }

    async fn list_nodes(&self, board_id: &str) -> PersistResult<Vec<Node>> {
        self.list(&format!("/boards/{}/nodes", board_id)).await
    }

    async fn update_node(&self, node_id: &str, patch: &NodePatch) -> PersistResult<Node> {
        let path = format!("/nodes/{}", node_id);
        persist(self.client.send_json(self.client.patch(&path).json(patch), &path).await)
    }

    async fn delete_node(&self, node_id: &str) -> PersistResult<()> {
        let path = format!("/nodes/{}", node_id);
        persist(self.client.send_empty(self.client.delete(&path), &path).await)
    }

    async fn batch_update_positions(
        &self,
        board_id: &str,
        updates: &[PositionUpdate],
    ) -> PersistResult<BatchSummary> {
        if updates.is_empty() {
            return Ok(BatchSummary::default());
        }
        let path = format!("/boards/{}/positions", board_id);
        let request = self.client.post(&path).json(&PositionBatch { updates });
        persist(self.client.send_json(request, &path).await)
    }

    async fn create_edge(&self, board_id: &str, edge: &Edge) -> PersistResult<Edge> {
        let path = format!("/boards/{}/edges", board_id);
        persist(self.client.send_json(self.client.post(&path).json(edge), &path).await)
    }

    async fn list_edges(&self, board_id: &str) -> PersistResult<Vec<Edge>> {
        self.list(&format!("/boards/{}/edges", board_id)).await
    }

    async fn delete_edge(&self, edge_id: &str) -> PersistResult<()> {
        let path = format!("/edges/{}", edge_id);
        persist(self.client.send_empty(self.client.delete(&path), &path).await)
    }
}
