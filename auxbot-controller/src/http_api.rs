//! Operator HTTP API.
//!
//! - `GET /health`
//! - `GET /workers`
//! - `POST /workers` `{guildId, channelId}`
//! - `DELETE /workers/{name}`
//! - `GET /workers/{name}/status`

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use auxbot_common::models::player::PlayerStatus;
use auxbot_common::{Error, ShutdownSignal};

use crate::registry::{WorkerRegistry, WorkerSummary};
use crate::worker_client::WorkerClient;

#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<WorkerRegistry>,
    pub workers: WorkerClient,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionRequest {
    pub guild_id: String,
    pub channel_id: String,
}

/// Error body: `{"message": ...}` with a status picked from the error kind.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Parse(_) | Error::Config(_) => StatusCode::BAD_REQUEST,
            e if e.is_rpc() => StatusCode::BAD_GATEWAY,
            Error::Provisioning(_) | Error::Registration(_) | Error::Reclamation { .. } | Error::Cluster { .. } => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "message": self.0.to_string() }))).into_response()
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/workers", get(list_workers).post(provision_worker))
        .route("/workers/{name}", axum::routing::delete(delete_worker))
        .route("/workers/{name}/status", get(worker_status))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn list_workers(State(state): State<ApiState>) -> Json<Vec<WorkerSummary>> {
    let mut workers: Vec<WorkerSummary> = state
        .registry
        .get_all_workers()
        .await
        .iter()
        .map(WorkerSummary::from)
        .collect();
    workers.sort_by(|a, b| a.pod_name.cmp(&b.pod_name));
    Json(workers)
}

async fn provision_worker(
    State(state): State<ApiState>,
    Json(req): Json<ProvisionRequest>,
) -> Result<Response, ApiError> {
    if req.guild_id.trim().is_empty() || req.channel_id.trim().is_empty() {
        return Err(Error::Parse("guildId and channelId are required".into()).into());
    }
    let provisioned = state.registry.provision_worker(&req.guild_id, &req.channel_id).await?;
    let status = if provisioned.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(provisioned)).into_response())
}

async fn delete_worker(State(state): State<ApiState>, Path(name): Path<String>) -> Result<StatusCode, ApiError> {
    state.registry.cleanup_worker(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn worker_status(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let worker = state
        .registry
        .get_worker(&name)
        .await
        .ok_or_else(|| Error::NotFound(format!("Worker {} not found", name)))?;
    let status = state.workers.get_player_status(&worker.guild_id).await?;
    let player_status = PlayerStatus::from(status.status());

    Ok(Json(json!({
        "podName": name,
        "guildId": worker.guild_id,
        "status": player_status,
        "currentUrl": status.current_url,
        "requesterId": status.requester_id,
        "hasQueue": status.has_queue,
        "queueLength": status.queue_length,
    })))
}

/// Binds `addr` and serves the API until shutdown.
pub async fn spawn_http_server(
    addr: SocketAddr,
    state: ApiState,
    shutdown: ShutdownSignal,
) -> Result<(SocketAddr, JoinHandle<()>), Error> {
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    info!("Operator API listening on http://{}", local_addr);

    let app = router(state);
    let handle = tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.wait().await;
            })
            .await;
        if let Err(e) = result {
            error!("Operator API error: {}", e);
        }
        info!("Operator API shut down.");
    });

    Ok((local_addr, handle))
}
