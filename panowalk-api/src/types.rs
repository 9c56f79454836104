//! Request/response DTOs for the Panowalk API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use panowalk_core::{
    DoneReason, Observation, PreloadState, SessionId, SessionMode, SessionStatus,
};

// ============================================================================
// SESSIONS
// ============================================================================

/// Request to create a new evaluation session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CreateSessionRequest {
    /// Agent or player identifier.
    pub agent_id: String,
    /// Task identifier (the task file stem).
    pub task_id: String,
    #[serde(default = "default_mode")]
    pub mode: SessionMode,
}

fn default_mode() -> SessionMode {
    SessionMode::Agent
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CreateSessionResponse {
    pub session_id: SessionId,
    pub observation: Observation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SessionStateResponse {
    pub session_id: SessionId,
    pub status: SessionStatus,
    pub step_count: u32,
    pub elapsed_seconds: f64,
    pub observation: Observation,
}

/// An agent action as posted to `/session/{id}/action`.
///
/// Deliberately permissive: `type` is a free string so an unknown action
/// type becomes `action_invalid` instead of a deserialization failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ActionRequest {
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub move_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fov: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ActionResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation: Option<Observation>,
    pub done: bool,
    pub done_reason: Option<DoneReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<crate::error::ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct PauseSessionResponse {
    pub success: bool,
    pub status: SessionStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ResumeSessionResponse {
    pub success: bool,
    pub status: SessionStatus,
    pub step_count: u32,
    pub elapsed_seconds: f64,
    pub observation: Observation,
}

/// One row in the session listing, assembled from log files so finished
/// runs survive restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SessionInfo {
    pub session_id: SessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<SessionMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SessionStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_steps: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SessionLogResponse {
    pub session_id: SessionId,
    /// Raw log records in write order.
    #[schema(value_type = Vec<Object>)]
    pub entries: Vec<serde_json::Value>,
}

// ============================================================================
// TASKS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct TaskInfo {
    pub task_id: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct TaskListResponse {
    pub tasks: Vec<TaskInfo>,
}

// ============================================================================
// PRELOAD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default, utoipa::ToSchema)]
pub struct PreloadRequest {
    /// Override of the configured panorama zoom level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoom_level: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct PreloadStatusResponse {
    pub status: PreloadState,
    pub progress: usize,
    pub total: usize,
    pub percentage: f64,
    /// Panoramas that failed after retry exhaustion.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<String>,
}

// ============================================================================
// GEOFENCES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct GeofenceInfo {
    pub name: String,
    pub pano_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct GeofenceListResponse {
    pub geofences: Vec<GeofenceInfo>,
}

// ============================================================================
// PLAYER PROGRESS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct PlayerTaskProgress {
    pub task_id: String,
    pub status: String,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct PlayerProgressResponse {
    pub player_id: String,
    pub total_tasks: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub not_started: usize,
    pub tasks: Vec<PlayerTaskProgress>,
}

// ============================================================================
// HEALTH
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub active_geofences: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_request_accepts_unknown_type() {
        let req: ActionRequest =
            serde_json::from_str(r#"{"type": "teleport", "move_id": 3}"#).unwrap();
        assert_eq!(req.action_type, "teleport");
        assert_eq!(req.move_id, Some(3));
    }

    #[test]
    fn test_create_session_defaults_to_agent_mode() {
        let req: CreateSessionRequest =
            serde_json::from_str(r#"{"agent_id": "a1", "task_id": "t1"}"#).unwrap();
        assert_eq!(req.mode, SessionMode::Agent);

        let req: CreateSessionRequest =
            serde_json::from_str(r#"{"agent_id": "a1", "task_id": "t1", "mode": "human"}"#)
                .unwrap();
        assert_eq!(req.mode, SessionMode::Human);
    }

    #[test]
    fn test_action_response_omits_empty_fields() {
        let response = ActionResponse {
            success: true,
            observation: None,
            done: false,
            done_reason: None,
            error_kind: None,
            detail: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("error_kind").is_none());
        assert!(json.get("observation").is_none());
        // done_reason is always present, null when the session continues.
        assert!(json["done_reason"].is_null());
    }
}
