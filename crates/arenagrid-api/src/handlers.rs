//! Admin handlers for the standalone backends.
//!
//! Each handler reads/writes via `StateStore` and returns JSON in the
//! `{success, data, error}` envelope.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;

use arenagrid_core::ConnectionEndpoint;
use arenagrid_state::*;

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

fn state_error(e: &StateError) -> axum::response::Response {
    let status = match e {
        StateError::NotFound(_) => StatusCode::NOT_FOUND,
        StateError::Conflict(_) => StatusCode::CONFLICT,
        StateError::InvalidToken(_) | StateError::InvalidKey(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(&e.to_string(), status).into_response()
}

// ── Health ─────────────────────────────────────────────────────

/// GET /healthz
pub async fn healthz() -> impl IntoResponse {
    ApiResponse::ok("ok")
}

// ── Game servers ───────────────────────────────────────────────

/// Register request body.
#[derive(Debug, Deserialize)]
pub struct RegisterGameServerRequest {
    pub server_id: String,
    pub connection_info: String,
}

/// GET /api/v1/game-server-groups/:group/servers
pub async fn list_game_servers(
    State(state): State<ApiState>,
    Path(group): Path<String>,
) -> impl IntoResponse {
    match state.store.list_game_servers(&group) {
        Ok(servers) => ApiResponse::ok(servers).into_response(),
        Err(e) => state_error(&e),
    }
}

/// POST /api/v1/game-server-groups/:group/servers
pub async fn register_game_server(
    State(state): State<ApiState>,
    Path(group): Path<String>,
    Json(req): Json<RegisterGameServerRequest>,
) -> impl IntoResponse {
    if req.server_id.is_empty() {
        return error_response("server_id must not be empty", StatusCode::BAD_REQUEST)
            .into_response();
    }
    if let Err(e) = ConnectionEndpoint::parse(&req.connection_info) {
        return error_response(&e.to_string(), StatusCode::BAD_REQUEST).into_response();
    }
    match state
        .store
        .register_game_server(&group, &req.server_id, &req.connection_info, epoch_millis())
    {
        Ok(server) => (StatusCode::CREATED, ApiResponse::ok(server)).into_response(),
        Err(e) => state_error(&e),
    }
}

/// PUT /api/v1/game-server-groups/:group/servers/:id
pub async fn update_game_server(
    State(state): State<ApiState>,
    Path((group, id)): Path<(String, String)>,
    Json(update): Json<GameServerUpdate>,
) -> impl IntoResponse {
    if let Some(info) = &update.connection_info {
        if let Err(e) = ConnectionEndpoint::parse(info) {
            return error_response(&e.to_string(), StatusCode::BAD_REQUEST).into_response();
        }
    }
    match state
        .store
        .update_game_server(&group, &id, &update, epoch_millis())
    {
        Ok(server) => ApiResponse::ok(server).into_response(),
        Err(e) => state_error(&e),
    }
}

/// DELETE /api/v1/game-server-groups/:group/servers/:id
pub async fn deregister_game_server(
    State(state): State<ApiState>,
    Path((group, id)): Path<(String, String)>,
) -> impl IntoResponse {
    match state.store.deregister_game_server(&group, &id) {
        Ok(true) => ApiResponse::ok("deregistered").into_response(),
        Ok(false) => error_response("game server not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => state_error(&e),
    }
}

// ── Cluster ────────────────────────────────────────────────────

/// Node registration body.
#[derive(Debug, Deserialize)]
pub struct RegisterNodeRequest {
    pub node_id: String,
    pub cpu: u64,
    pub memory: u64,
}

/// GET /api/v1/clusters/:cluster/nodes
pub async fn list_nodes(
    State(state): State<ApiState>,
    Path(cluster): Path<String>,
) -> impl IntoResponse {
    match state.store.list_nodes(&cluster) {
        Ok(nodes) => ApiResponse::ok(nodes).into_response(),
        Err(e) => state_error(&e),
    }
}

/// POST /api/v1/clusters/:cluster/nodes
///
/// Registering an existing node id resets its capacity.
pub async fn register_node(
    State(state): State<ApiState>,
    Path(cluster): Path<String>,
    Json(req): Json<RegisterNodeRequest>,
) -> impl IntoResponse {
    if req.node_id.is_empty() {
        return error_response("node_id must not be empty", StatusCode::BAD_REQUEST)
            .into_response();
    }
    let node = NodeRecord::new(&cluster, &req.node_id, req.cpu, req.memory, epoch_millis());
    match state.store.put_node(&node) {
        Ok(()) => (StatusCode::CREATED, ApiResponse::ok(node)).into_response(),
        Err(e) => state_error(&e),
    }
}

/// GET /api/v1/clusters/:cluster/tasks
pub async fn list_tasks(
    State(state): State<ApiState>,
    Path(cluster): Path<String>,
) -> impl IntoResponse {
    match state.store.list_tasks(&cluster) {
        Ok(tasks) => ApiResponse::ok(tasks).into_response(),
        Err(e) => state_error(&e),
    }
}

/// DELETE /api/v1/clusters/:cluster/tasks/:id
pub async fn stop_task(
    State(state): State<ApiState>,
    Path((cluster, id)): Path<(String, String)>,
) -> impl IntoResponse {
    match state.store.stop_task(&cluster, &id) {
        Ok(true) => ApiResponse::ok("stopped").into_response(),
        Ok(false) => error_response("task not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => state_error(&e),
    }
}

/// Task definition registration body.
#[derive(Debug, Deserialize)]
pub struct RegisterTaskDefinitionRequest {
    pub id: String,
    pub cpu: u64,
    pub memory: u64,
}

/// POST /api/v1/task-definitions
pub async fn register_task_definition(
    State(state): State<ApiState>,
    Json(req): Json<RegisterTaskDefinitionRequest>,
) -> impl IntoResponse {
    if req.id.is_empty() || req.cpu == 0 || req.memory == 0 {
        return error_response(
            "task definition needs an id and non-zero cpu and memory",
            StatusCode::BAD_REQUEST,
        )
        .into_response();
    }
    let def = TaskDefinition::new(&req.id, req.cpu, req.memory, epoch_millis());
    match state.store.put_task_definition(&def) {
        Ok(()) => (StatusCode::CREATED, ApiResponse::ok(def)).into_response(),
        Err(e) => state_error(&e),
    }
}

// ── Stack outputs ──────────────────────────────────────────────

/// Stack output body.
#[derive(Debug, Deserialize)]
pub struct StackOutputRequest {
    pub value: String,
}

/// PUT /api/v1/stacks/:stack/outputs/:key
pub async fn put_stack_output(
    State(state): State<ApiState>,
    Path((stack, key)): Path<(String, String)>,
    Json(req): Json<StackOutputRequest>,
) -> impl IntoResponse {
    match state.store.put_stack_output(&stack, &key, &req.value) {
        Ok(()) => ApiResponse::ok(req.value).into_response(),
        Err(e) => state_error(&e),
    }
}
