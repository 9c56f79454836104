//! Task REST routes
//!
//! Tasks are read-only at runtime; preload endpoints start background jobs
//! keyed by task id and report their progress.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};

use panowalk_core::{PanoId, PreloadState, TaskId};
use panowalk_preload::PreloadProgress;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::types::{PreloadRequest, PreloadStatusResponse, TaskInfo, TaskListResponse};

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /api/tasks - List all tasks
#[utoipa::path(
    get,
    path = "/api/tasks",
    tag = "Tasks",
    responses((status = 200, description = "Available tasks", body = TaskListResponse))
)]
pub async fn list_tasks(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let tasks = state
        .engine
        .tasks()
        .list()
        .iter()
        .map(|task| TaskInfo {
            task_id: task.task_id.to_string(),
            description: task.description.clone(),
        })
        .collect();
    Ok(Json(TaskListResponse { tasks }))
}

/// GET /api/tasks/{id} - Full task definition
#[utoipa::path(
    get,
    path = "/api/tasks/{id}",
    tag = "Tasks",
    params(("id" = String, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task definition", body = panowalk_core::Task),
        (status = 404, description = "Task not found", body = ApiError),
    )
)]
pub async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let task = state.engine.tasks().load(&TaskId::new(task_id))?;
    Ok(Json(task.as_ref().clone()))
}

/// POST /api/tasks/{id}/preload - Fill the cache for a task's geofence
#[utoipa::path(
    post,
    path = "/api/tasks/{id}/preload",
    tag = "Tasks",
    params(("id" = String, Path, description = "Task ID")),
    request_body = PreloadRequest,
    responses(
        (status = 200, description = "Preload started or already running", body = PreloadStatusResponse),
        (status = 404, description = "Task or geofence not found", body = ApiError),
    )
)]
pub async fn preload_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    request: Option<Json<PreloadRequest>>,
) -> ApiResult<impl IntoResponse> {
    let task = state.engine.tasks().load(&TaskId::new(task_id.clone()))?;
    let fence = state.geofences.get(&task.geofence)?;
    let zoom = request
        .and_then(|Json(r)| r.zoom_level)
        .unwrap_or(state.settings.panorama_zoom_level);

    Ok(Json(start_preload(&state, &task_id, fence, zoom)))
}

/// GET /api/tasks/{id}/preload/status - Progress of a task preload
#[utoipa::path(
    get,
    path = "/api/tasks/{id}/preload/status",
    tag = "Tasks",
    params(("id" = String, Path, description = "Task ID")),
    responses((status = 200, description = "Preload progress", body = PreloadStatusResponse))
)]
pub async fn preload_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(to_status(state.registry.get(&task_id))))
}

// ============================================================================
// HELPERS (shared with the geofence routes)
// ============================================================================

/// Kick off a preload job unless one is already running under this key.
pub(crate) fn start_preload(
    state: &AppState,
    key: &str,
    fence: std::collections::HashSet<PanoId>,
    zoom: u8,
) -> PreloadStatusResponse {
    let snapshot = state.registry.get(key);
    if snapshot.status == PreloadState::InProgress {
        return to_status(snapshot);
    }

    let mut pano_ids: Vec<PanoId> = fence.into_iter().collect();
    pano_ids.sort();
    let total = pano_ids.len();

    let preloader = state.preloader.clone();
    let key = key.to_string();
    tokio::spawn(async move {
        preloader.preload(&key, &pano_ids, zoom).await;
    });

    PreloadStatusResponse {
        status: PreloadState::InProgress,
        progress: 0,
        total,
        percentage: 0.0,
        failed: Vec::new(),
    }
}

pub(crate) fn to_status(progress: PreloadProgress) -> PreloadStatusResponse {
    PreloadStatusResponse {
        status: progress.status,
        progress: progress.done,
        total: progress.total,
        percentage: progress.percentage(),
        failed: progress.failed.iter().map(|p| p.to_string()).collect(),
    }
}

pub fn create_router() -> axum::Router<AppState> {
    use axum::routing::{get, post};
    axum::Router::new()
        .route("/tasks", get(list_tasks))
        .route("/tasks/:id", get(get_task))
        .route("/tasks/:id/preload", post(preload_task))
        .route("/tasks/:id/preload/status", get(preload_status))
}
