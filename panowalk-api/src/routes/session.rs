//! Session REST routes
//!
//! Each handler is one engine transition. Transitions run on the blocking
//! pool (renderer CPU + synchronous log write); the per-session mutex in
//! the engine totally orders concurrent requests against one session.

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use panowalk_core::{AgentId, SessionId, TaskId};
use panowalk_engine::{Action, LogEntry, SessionEngine};

use crate::error::{run_engine, ApiError, ApiResult, ErrorKind};
use crate::state::AppState;
use crate::types::{
    ActionRequest, ActionResponse, CreateSessionRequest, CreateSessionResponse,
    PauseSessionResponse, ResumeSessionResponse, SessionInfo, SessionListResponse,
    SessionLogResponse, SessionStateResponse,
};

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// POST /api/session/create - Create a session and emit the initial observation
#[utoipa::path(
    post,
    path = "/api/session/create",
    tag = "Sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 200, description = "Session created", body = CreateSessionResponse),
        (status = 400, description = "Bad task", body = ApiError),
        (status = 404, description = "Task not found", body = ApiError),
        (status = 409, description = "Geofence not preloaded", body = ApiError),
    )
)]
pub async fn create_session(
    State(engine): State<Arc<SessionEngine>>,
    Json(req): Json<CreateSessionRequest>,
) -> ApiResult<impl IntoResponse> {
    let agent_id = AgentId::new(req.agent_id);
    let task_id = TaskId::new(req.task_id);
    let mode = req.mode;

    let (session_id, observation) =
        run_engine(move || engine.create_session(agent_id, &task_id, mode)).await?;

    Ok(Json(CreateSessionResponse {
        session_id,
        observation,
    }))
}

/// GET /api/session/{id}/state - Current status and observation
#[utoipa::path(
    get,
    path = "/api/session/{id}/state",
    tag = "Sessions",
    params(("id" = String, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Session state", body = SessionStateResponse),
        (status = 404, description = "Session not found", body = ApiError),
    )
)]
pub async fn get_session_state(
    State(engine): State<Arc<SessionEngine>>,
    Path(id): Path<SessionId>,
) -> ApiResult<impl IntoResponse> {
    let snapshot = run_engine(move || engine.get_state(id)).await?;
    Ok(Json(SessionStateResponse {
        session_id: id,
        status: snapshot.status,
        step_count: snapshot.step_count,
        elapsed_seconds: snapshot.elapsed_seconds,
        observation: snapshot.observation,
    }))
}

/// POST /api/session/{id}/action - Execute one agent action
#[utoipa::path(
    post,
    path = "/api/session/{id}/action",
    tag = "Sessions",
    params(("id" = String, Path, description = "Session ID")),
    request_body = ActionRequest,
    responses(
        (status = 200, description = "Action applied", body = ActionResponse),
        (status = 400, description = "Invalid action, state unchanged", body = ActionResponse),
        (status = 409, description = "Session already terminal", body = ActionResponse),
    )
)]
pub async fn execute_action(
    State(engine): State<Arc<SessionEngine>>,
    Path(id): Path<SessionId>,
    Json(req): Json<ActionRequest>,
) -> ApiResult<Response> {
    let action = match parse_action(req) {
        Ok(action) => action,
        Err(error) => return Ok(action_failure(error)),
    };

    match run_engine(move || engine.execute_action(id, action)).await {
        Ok(outcome) => Ok(Json(ActionResponse {
            success: true,
            observation: outcome.observation,
            done: outcome.done,
            done_reason: outcome.done_reason,
            error_kind: None,
            detail: None,
        })
        .into_response()),
        Err(error)
            if matches!(
                error.error_kind,
                ErrorKind::ActionInvalid | ErrorKind::RotationInvalid | ErrorKind::SessionTerminated
            ) =>
        {
            Ok(action_failure(error))
        }
        Err(error) => Err(error),
    }
}

/// POST /api/session/{id}/end - Terminate without an answer
#[utoipa::path(
    post,
    path = "/api/session/{id}/end",
    tag = "Sessions",
    params(("id" = String, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Session summary", body = panowalk_core::SessionSummary),
        (status = 404, description = "Session not found", body = ApiError),
    )
)]
pub async fn end_session(
    State(engine): State<Arc<SessionEngine>>,
    Path(id): Path<SessionId>,
) -> ApiResult<impl IntoResponse> {
    let summary = run_engine(move || engine.end_session(id)).await?;
    Ok(Json(summary))
}

/// POST /api/session/{id}/pause - Pause time accounting (human mode)
#[utoipa::path(
    post,
    path = "/api/session/{id}/pause",
    tag = "Sessions",
    params(("id" = String, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Paused", body = PauseSessionResponse),
        (status = 400, description = "Not a human session", body = ApiError),
    )
)]
pub async fn pause_session(
    State(engine): State<Arc<SessionEngine>>,
    Path(id): Path<SessionId>,
) -> ApiResult<impl IntoResponse> {
    let status = run_engine(move || engine.pause_session(id)).await?;
    Ok(Json(PauseSessionResponse {
        success: true,
        status,
    }))
}

/// POST /api/session/{id}/resume - Resume a paused session
#[utoipa::path(
    post,
    path = "/api/session/{id}/resume",
    tag = "Sessions",
    params(("id" = String, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Resumed", body = ResumeSessionResponse),
        (status = 404, description = "Session not found", body = ApiError),
    )
)]
pub async fn resume_session(
    State(engine): State<Arc<SessionEngine>>,
    Path(id): Path<SessionId>,
) -> ApiResult<impl IntoResponse> {
    let snapshot = run_engine(move || engine.resume_session(id)).await?;
    Ok(Json(ResumeSessionResponse {
        success: true,
        status: snapshot.status,
        step_count: snapshot.step_count,
        elapsed_seconds: snapshot.elapsed_seconds,
        observation: snapshot.observation,
    }))
}

/// GET /api/sessions - List sessions from their logs
#[utoipa::path(
    get,
    path = "/api/sessions",
    tag = "Sessions",
    responses((status = 200, description = "Known sessions", body = SessionListResponse))
)]
pub async fn list_sessions(
    State(engine): State<Arc<SessionEngine>>,
) -> ApiResult<impl IntoResponse> {
    let sessions = run_engine(move || Ok(collect_session_infos(&engine))).await?;
    Ok(Json(SessionListResponse { sessions }))
}

/// GET /api/sessions/{id}/log - Full replay log of one session
#[utoipa::path(
    get,
    path = "/api/sessions/{id}/log",
    tag = "Sessions",
    params(("id" = String, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Step log", body = SessionLogResponse),
        (status = 404, description = "No log for this session", body = ApiError),
    )
)]
pub async fn get_session_log(
    State(engine): State<Arc<SessionEngine>>,
    Path(id): Path<SessionId>,
) -> ApiResult<impl IntoResponse> {
    let entries = run_engine(move || {
        engine
            .logger()
            .read_log(id)
            .map_err(|_| panowalk_engine::EngineError::SessionNotFound(id))
    })
    .await?;

    let entries = entries
        .iter()
        .filter_map(|entry| serde_json::to_value(entry).ok())
        .collect();
    Ok(Json(SessionLogResponse {
        session_id: id,
        entries,
    }))
}

// ============================================================================
// HELPERS
// ============================================================================

fn parse_action(req: ActionRequest) -> Result<Action, ApiError> {
    match req.action_type.as_str() {
        "move" => {
            let move_id = req.move_id.ok_or_else(|| {
                ApiError::new(ErrorKind::ActionInvalid, "move requires a move_id")
            })?;
            Ok(Action::Move { move_id })
        }
        "rotation" => Ok(Action::Rotation {
            heading: req.heading,
            pitch: req.pitch,
            fov: req.fov,
        }),
        "stop" => Ok(Action::Stop { answer: req.answer }),
        other => Err(ApiError::new(
            ErrorKind::ActionInvalid,
            format!("unknown action type: {}", other),
        )),
    }
}

/// Action-level failures keep the `{success: false, error_kind}` shape so
/// agents have a single envelope to parse.
fn action_failure(error: ApiError) -> Response {
    let status = error.status_code();
    let done = error.error_kind == ErrorKind::SessionTerminated;
    (
        status,
        Json(ActionResponse {
            success: false,
            observation: None,
            done,
            done_reason: None,
            error_kind: Some(error.error_kind),
            detail: Some(error.detail),
        }),
    )
        .into_response()
}

fn collect_session_infos(engine: &SessionEngine) -> Vec<SessionInfo> {
    engine
        .logger()
        .list_sessions()
        .into_iter()
        .map(|id| {
            let first = engine
                .logger()
                .read_log(id)
                .ok()
                .and_then(|entries| entries.into_iter().next());
            let summary = engine.logger().read_summary(id);

            let (agent_id, task_id, mode, started_at) = match first {
                Some(LogEntry::SessionStart {
                    agent_id,
                    task_id,
                    mode,
                    timestamp,
                    ..
                }) => (
                    Some(agent_id.to_string()),
                    Some(task_id.to_string()),
                    Some(mode),
                    Some(timestamp),
                ),
                _ => (None, None, None, None),
            };

            SessionInfo {
                session_id: id,
                agent_id,
                task_id,
                mode,
                started_at,
                status: summary.as_ref().map(|s| s.status),
                total_steps: summary.as_ref().map(|s| s.total_steps),
            }
        })
        .collect()
}

/// POST /api/session/{id}/action and friends live here.
pub fn create_router() -> axum::Router<AppState> {
    use axum::routing::{get, post};
    axum::Router::new()
        .route("/session/create", post(create_session))
        .route("/session/:id/state", get(get_session_state))
        .route("/session/:id/action", post(execute_action))
        .route("/session/:id/end", post(end_session))
        .route("/session/:id/pause", post(pause_session))
        .route("/session/:id/resume", post(resume_session))
        .route("/sessions", get(list_sessions))
        .route("/sessions/:id/log", get(get_session_log))
}
