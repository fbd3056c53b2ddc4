//! In-process canvas backend for the client tests

use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use canvas_engine::{
    BatchSummary, Edge, ExecutionRequest, Node, NodePatch, PositionUpdate, ProviderResponse,
    StatusResponse,
};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Default)]
pub(crate) struct FakeState {
    pub nodes: Vec<(String, Node)>,
    pub edges: Vec<(String, Edge)>,
    /// `(node id, inputs.prompt)` per execute call
    pub executed: Vec<(String, Value)>,
}

type Shared = Arc<Mutex<FakeState>>;

pub(crate) struct Backend {
    pub url: String,
    pub state: Shared,
}

pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            log::error!("test backend error: {}", e);
        }
    });
    format!("http://{}", addr)
}

/// Backend implementing every route the clients use
pub(crate) async fn spawn_backend() -> Backend {
    let state = Shared::default();
    let app = Router::new()
        .route("/boards/:board/nodes", get(list_nodes).post(create_node))
        .route("/boards/:board/edges", get(list_edges).post(create_edge))
        .route("/boards/:board/positions", post(update_positions))
        .route("/nodes/:id", patch(update_node).delete(delete_node))
        .route("/nodes/:id/execute", post(execute))
        .route("/nodes/:id/status", get(status))
        .route("/edges/:id", delete(delete_edge))
        .route("/providers/:route", post(dedicated))
        .with_state(state.clone());
    Backend {
        url: serve(app).await,
        state,
    }
}

/// Backend answering 500 to everything
pub(crate) async fn spawn_failing() -> String {
    let app = Router::new()
        .fallback(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "backend down") });
    serve(app).await
}

async fn create_node(
    State(state): State<Shared>,
    Path(board): Path<String>,
    Json(node): Json<Node>,
) -> Json<Node> {
    state.lock().unwrap().nodes.push((board, node.clone()));
    Json(node)
}

async fn list_nodes(State(state): State<Shared>, Path(board): Path<String>) -> Json<Value> {
    let state = state.lock().unwrap();
    let nodes: Vec<&Node> = state
        .nodes
        .iter()
        .filter(|(b, _)| *b == board)
        .map(|(_, n)| n)
        .collect();
    Json(json!({ "nodes": nodes }))
}

async fn update_node(
    State(state): State<Shared>,
    Path(id): Path<String>,
    Json(patch): Json<NodePatch>,
) -> Result<Json<Node>, StatusCode> {
    let mut state = state.lock().unwrap();
    let (_, node) = state
        .nodes
        .iter_mut()
        .find(|(_, n)| n.id == id)
        .ok_or(StatusCode::NOT_FOUND)?;
    patch.apply_to(node);
    Ok(Json(node.clone()))
}

async fn delete_node(State(state): State<Shared>, Path(id): Path<String>) -> StatusCode {
    let mut state = state.lock().unwrap();
    let before = state.nodes.len();
    state.nodes.retain(|(_, n)| n.id != id);
    if state.nodes.len() == before {
        return StatusCode::NOT_FOUND;
    }
    state.edges.retain(|(_, e)| !e.touches(&id));
    StatusCode::NO_CONTENT
}

#[derive(Deserialize)]
struct PositionBatch {
    updates: Vec<PositionUpdate>,
}

async fn update_positions(
    State(state): State<Shared>,
    Json(batch): Json<PositionBatch>,
) -> Json<BatchSummary> {
    let mut state = state.lock().unwrap();
    let mut summary = BatchSummary::default();
    for update in batch.updates {
        match state.nodes.iter_mut().find(|(_, n)| n.id == update.node_id) {
            Some((_, node)) => {
                node.position = update.position;
                summary.updated += 1;
            }
            None => summary.missing.push(update.node_id),
        }
    }
    Json(summary)
}

async fn create_edge(
    State(state): State<Shared>,
    Path(board): Path<String>,
    Json(edge): Json<Edge>,
) -> Json<Edge> {
    state.lock().unwrap().edges.push((board, edge.clone()));
    Json(edge)
}

async fn list_edges(State(state): State<Shared>, Path(board): Path<String>) -> Json<Vec<Edge>> {
    let state = state.lock().unwrap();
    Json(
        state
            .edges
            .iter()
            .filter(|(b, _)| *b == board)
            .map(|(_, e)| e.clone())
            .collect(),
    )
}

async fn delete_edge(State(state): State<Shared>, Path(id): Path<String>) -> StatusCode {
    let mut state = state.lock().unwrap();
    let before = state.edges.len();
    state.edges.retain(|(_, e)| e.id != id);
    if state.edges.len() == before {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::NO_CONTENT
    }
}

async fn execute(
    State(state): State<Shared>,
    Path(id): Path<String>,
    Json(request): Json<ExecutionRequest>,
) -> Json<ProviderResponse> {
    let prompt = request.inputs.get("prompt").cloned().unwrap_or(Value::Null);
    state.lock().unwrap().executed.push((id.clone(), prompt));
    Json(ProviderResponse::running(format!("job-{}", id)))
}

async fn status(Path(_id): Path<String>) -> Json<StatusResponse> {
    let output = json!({ "image": "https://x/out.png" });
    Json(StatusResponse::completed(
        output.as_object().cloned().unwrap_or_default(),
    ))
}

async fn dedicated(Path(route): Path<String>, Json(payload): Json<Value>) -> Json<ProviderResponse> {
    Json(ProviderResponse::completed(
        json!({ "route": route, "payload": payload }),
    ))
}
