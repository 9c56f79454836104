//! OpenAPI document for the Panowalk API

use utoipa::OpenApi;

use crate::error::{ApiError, ErrorKind};
use crate::routes;
use crate::types::{
    ActionRequest, ActionResponse, CreateSessionRequest, CreateSessionResponse, GeofenceInfo,
    GeofenceListResponse, HealthResponse, PauseSessionResponse, PlayerProgressResponse,
    PlayerTaskProgress, PreloadRequest, PreloadStatusResponse, ResumeSessionResponse, SessionInfo,
    SessionListResponse, SessionLogResponse, SessionStateResponse, TaskInfo, TaskListResponse,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Panowalk API",
        description = "Benchmark runtime for vision-language navigation agents: \
                       sessions over a cached panorama graph, offline preload, replay logs."
    ),
    paths(
        routes::session::create_session,
        routes::session::get_session_state,
        routes::session::execute_action,
        routes::session::end_session,
        routes::session::pause_session,
        routes::session::resume_session,
        routes::session::list_sessions,
        routes::session::get_session_log,
        routes::task::list_tasks,
        routes::task::get_task,
        routes::task::preload_task,
        routes::task::preload_status,
        routes::geofence::list_geofences,
        routes::geofence::reload_geofences,
        routes::geofence::preload_geofence,
        routes::geofence::geofence_preload_status,
        routes::player::get_player_progress,
        routes::health::health,
    ),
    components(schemas(
        ApiError,
        ErrorKind,
        CreateSessionRequest,
        CreateSessionResponse,
        SessionStateResponse,
        ActionRequest,
        ActionResponse,
        PauseSessionResponse,
        ResumeSessionResponse,
        SessionInfo,
        SessionListResponse,
        SessionLogResponse,
        TaskInfo,
        TaskListResponse,
        PreloadRequest,
        PreloadStatusResponse,
        GeofenceInfo,
        GeofenceListResponse,
        PlayerTaskProgress,
        PlayerProgressResponse,
        HealthResponse,
        panowalk_core::PanoId,
        panowalk_core::TaskId,
        panowalk_core::AgentId,
        panowalk_core::GeofenceName,
        panowalk_core::SessionId,
        panowalk_core::Task,
        panowalk_core::GroundTruth,
        panowalk_core::Link,
        panowalk_core::Observation,
        panowalk_core::AvailableMove,
        panowalk_core::SessionSummary,
        panowalk_core::SessionStatus,
        panowalk_core::SessionMode,
        panowalk_core::TaskType,
        panowalk_core::DoneReason,
        panowalk_core::PreloadState,
    ))
)]
pub struct ApiDoc;
