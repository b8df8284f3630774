// JSON file API for the browser file manager.
//
// Every mutation that changes the tree is followed by a list-changed
// broadcast; no-op deletes stay silent.

pub mod error;

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    routing::{get, post},
    Json, Router,
};
use focal_common::types::{ServerStatus, TreeNode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use self::error::ApiError;
use crate::runtime::AppState;
use crate::workspace::{self, WorkspaceStore};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/status", get(status_route))
        .route("/api/tree", get(tree_route))
        .route("/api/file", get(read_file_route).post(write_file_route).delete(delete_file_route))
        .route("/api/folder", post(create_folder_route).delete(delete_folder_route))
        .route("/api/move", post(move_entry_route))
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathParams {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilePayload {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MovePayload {
    pub src: String,
    pub dst: String,
}

async fn status_route(State(state): State<AppState>) -> Result<Json<ServerStatus>, ApiError> {
    let fingerprint = run_store(&state, WorkspaceStore::fingerprint).await?;
    let workspace_root = state.store.root().display().to_string();
    Ok(Json(ServerStatus::new(&*state.server_id, workspace_root, &fingerprint)))
}

async fn tree_route(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let tree: Vec<TreeNode> = run_store(&state, WorkspaceStore::tree).await?;
    Ok(Json(json!({ "root": tree })))
}

async fn read_file_route(
    State(state): State<AppState>,
    params: Result<Query<PathParams>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(PathParams { path }) = params?;
    let content = run_store(&state, move |store| store.read_file(&path)).await?;
    Ok(Json(json!({ "content": content })))
}

async fn write_file_route(
    State(state): State<AppState>,
    payload: Result<Json<FilePayload>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(FilePayload { path, content }) = payload?;
    let target = path.clone();
    let bytes = run_store(&state, move |store| store.write_file(&target, &content)).await?;
    info!(path = %path, bytes, "wrote file");
    state.notifier.broadcast_list_changed().await;
    Ok(ok())
}

async fn delete_file_route(
    State(state): State<AppState>,
    params: Result<Query<PathParams>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(PathParams { path }) = params?;
    let target = path.clone();
    if run_store(&state, move |store| store.delete_file(&target)).await? {
        info!(path = %path, "deleted file");
        state.notifier.broadcast_list_changed().await;
    }
    Ok(ok())
}

async fn create_folder_route(
    State(state): State<AppState>,
    payload: Result<Json<PathParams>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(PathParams { path }) = payload?;
    let target = path.clone();
    run_store(&state, move |store| store.create_folder(&target)).await?;
    info!(path = %path, "created folder");
    state.notifier.broadcast_list_changed().await;
    Ok(ok())
}

async fn delete_folder_route(
    State(state): State<AppState>,
    params: Result<Query<PathParams>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(PathParams { path }) = params?;
    let target = path.clone();
    if run_store(&state, move |store| store.delete_folder(&target)).await? {
        info!(path = %path, "deleted folder");
        state.notifier.broadcast_list_changed().await;
    }
    Ok(ok())
}

async fn move_entry_route(
    State(state): State<AppState>,
    payload: Result<Json<MovePayload>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(MovePayload { src, dst }) = payload?;
    let (from, to) = (src.clone(), dst.clone());
    run_store(&state, move |store| store.move_entry(&from, &to)).await?;
    info!(src = %src, dst = %dst, "moved entry");
    state.notifier.broadcast_list_changed().await;
    Ok(ok())
}

fn ok() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Run a store operation on the blocking pool.
async fn run_store<T, F>(state: &AppState, operation: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&WorkspaceStore) -> workspace::Result<T> + Send + 'static,
{
    let store = Arc::clone(&state.store);
    match tokio::task::spawn_blocking(move || operation(&store)).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(join_error) => {
            error!(?join_error, "file api task failed");
            Err(ApiError::internal())
        }
    }
}
