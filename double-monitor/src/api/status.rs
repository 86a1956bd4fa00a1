//! ノード状態参照API

use crate::types::node::NodeStatus;
use crate::AppState;
use axum::{
    extract::{Path, State},
    Json,
};

/// GET /status - 全ノードの状態
pub async fn list_all(State(state): State<AppState>) -> Json<Vec<NodeStatus>> {
    Json(state.registry.list(None, None).await)
}

/// GET /status/{project} - プロジェクト内のノード状態
pub async fn list_by_project(
    State(state): State<AppState>,
    Path(project): Path<String>,
) -> Json<Vec<NodeStatus>> {
    Json(state.registry.list(Some(project.as_str()), None).await)
}

/// GET /status/{project}/{environment} - プロジェクト・環境内のノード状態
pub async fn list_by_environment(
    State(state): State<AppState>,
    Path((project, environment)): Path<(String, String)>,
) -> Json<Vec<NodeStatus>> {
    Json(
        state
            .registry
            .list(Some(project.as_str()), Some(environment.as_str()))
            .await,
    )
}
