//! Player progress routes

use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};

use panowalk_core::AgentId;

use crate::error::ApiResult;
use crate::state::AppState;
use crate::types::{PlayerProgressResponse, PlayerTaskProgress};

/// GET /api/players/{id}/progress - One player's progress over all tasks
#[utoipa::path(
    get,
    path = "/api/players/{id}/progress",
    tag = "Players",
    params(("id" = String, Path, description = "Player ID")),
    responses((status = 200, description = "Per-task progress", body = PlayerProgressResponse))
)]
pub async fn get_player_progress(
    State(state): State<AppState>,
    Path(player_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let rows = state.cache.player_progress(&AgentId::new(player_id.clone()))?;
    let by_task: HashMap<String, _> = rows
        .into_iter()
        .map(|row| (row.task_id.to_string(), row))
        .collect();

    let all_tasks = state.engine.tasks().list();
    let mut completed = 0;
    let mut in_progress = 0;
    let mut not_started = 0;

    let tasks: Vec<PlayerTaskProgress> = all_tasks
        .iter()
        .map(|task| {
            let task_id = task.task_id.to_string();
            match by_task.get(&task_id) {
                Some(row) => {
                    match row.status.as_str() {
                        "completed" => completed += 1,
                        "running" | "paused" => in_progress += 1,
                        _ => not_started += 1,
                    }
                    PlayerTaskProgress {
                        task_id,
                        status: row.status.clone(),
                        attempts: row.attempts,
                        score: row.score,
                        last_attempt_at: row.last_attempt_at,
                    }
                }
                None => {
                    not_started += 1;
                    PlayerTaskProgress {
                        task_id,
                        status: "not_started".to_string(),
                        attempts: 0,
                        score: None,
                        last_attempt_at: None,
                    }
                }
            }
        })
        .collect();

    Ok(Json(PlayerProgressResponse {
        player_id,
        total_tasks: all_tasks.len(),
        completed,
        in_progress,
        not_started,
        tasks,
    }))
}

pub fn create_router() -> axum::Router<AppState> {
    use axum::routing::get;
    axum::Router::new().route("/players/:id/progress", get(get_player_progress))
}
