//! Core entity structures

use crate::{AgentId, DoneReason, GeofenceName, PanoId, SessionId, SessionStatus, TaskId, TaskType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// PANORAMA GRAPH
// ============================================================================

/// Directed adjacency from one panorama toward a neighbour.
///
/// `heading` is the true-north bearing from the owning panorama to the
/// target, in `[0, 360)`. Links flagged `virtual` were synthesized by the
/// task generator to patch missing native adjacency; at runtime they are
/// legal moves like any other and the flag is carried for logging only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Link {
    pub pano_id: PanoId,
    pub heading: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_meters: Option<f64>,
    #[serde(rename = "virtual", default)]
    pub is_virtual: bool,
}

/// Metadata for one captured panorama, immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PanoMetadata {
    pub pano_id: PanoId,
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture_date: Option<String>,
    /// Heading at the horizontal center of the tile set; maps true-north
    /// headings into image longitude at render time.
    pub center_heading: f64,
    #[serde(default)]
    pub links: Vec<Link>,
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub fetched_at: DateTime<Utc>,
    /// Which upstream API produced this row, for reproducibility.
    pub source: String,
}

impl PanoMetadata {
    /// Coordinates are within WGS84 bounds and headings normalized.
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
            && (0.0..360.0).contains(&self.center_heading)
            && self.links.iter().all(|l| (0.0..360.0).contains(&l.heading))
    }
}

// ============================================================================
// TASKS
// ============================================================================

/// Offline-recorded ground truth for scoring a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct GroundTruth {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_pano_id: Option<PanoId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimal_distance_meters: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

/// A benchmark task as emitted by the offline task generator.
///
/// The JSON field names are the on-disk contract for `tasks/{taskId}.json`.
/// `task_id` defaults to empty and is overwritten with the file stem on
/// load - the stem is authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Task {
    #[serde(default = "TaskId::default_empty")]
    pub task_id: TaskId,
    pub task_type: TaskType,
    pub geofence: GeofenceName,
    pub spawn_point: PanoId,
    #[serde(default)]
    pub spawn_heading: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default)]
    pub target_pano_ids: Vec<PanoId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_steps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_time_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ground_truth: Option<GroundTruth>,
}

impl TaskId {
    fn default_empty() -> Self {
        TaskId::new("")
    }
}

// ============================================================================
// OBSERVATIONS
// ============================================================================

/// One legal move as presented to the agent.
///
/// `id` is assigned per observation and is only valid for the very next
/// action against the same session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AvailableMove {
    pub id: u32,
    pub pano_id: PanoId,
    /// Human-readable relative direction, e.g. `front-right 23°`.
    pub direction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    /// Absolute true-north heading toward the target.
    pub heading: f64,
    #[serde(rename = "virtual", default)]
    pub is_virtual: bool,
}

/// What the agent is shown after every state-changing transition.
///
/// Agent sessions get `current_image`, a freshly rendered perspective
/// frame; human sessions get `panorama_url`, the raw equirectangular image
/// for a client-side viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Observation {
    pub task_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub panorama_url: Option<String>,
    pub heading: f64,
    pub pitch: f64,
    pub fov: f64,
    /// Bearing at the image center of the current panorama; viewers need
    /// it to align the image with true north.
    pub center_heading: f64,
    pub available_moves: Vec<AvailableMove>,
}

// ============================================================================
// SESSION SUMMARY
// ============================================================================

/// Terminal summary persisted next to the step log, consumed by the
/// offline scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub agent_id: AgentId,
    pub task_id: TaskId,
    pub status: SessionStatus,
    pub done_reason: DoneReason,
    pub total_steps: u32,
    pub elapsed_seconds: f64,
    pub final_pano_id: PanoId,
    /// True iff the final panorama is one of the task's targets. Answer
    /// correctness for exploration tasks is judged by the offline scorer.
    pub reached_target: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_answer: Option<String>,
    pub trajectory: Vec<PanoId>,
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub ended_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(lat: f64, lng: f64, center: f64) -> PanoMetadata {
        PanoMetadata {
            pano_id: PanoId::new("p0"),
            lat,
            lng,
            capture_date: Some("2023-06".to_string()),
            center_heading: center,
            links: vec![Link {
                pano_id: PanoId::new("p1"),
                heading: 90.0,
                distance_meters: None,
                is_virtual: false,
            }],
            fetched_at: Utc::now(),
            source: "tiles_api".to_string(),
        }
    }

    #[test]
    fn test_metadata_validation() {
        assert!(meta(35.68, 139.76, 12.5).is_valid());
        assert!(!meta(91.0, 0.0, 0.0).is_valid());
        assert!(!meta(0.0, 181.0, 0.0).is_valid());
        assert!(!meta(0.0, 0.0, 360.0).is_valid());
    }

    #[test]
    fn test_task_json_contract() {
        let json = r#"{
            "task_id": "nav_001",
            "task_type": "navigation_to_poi",
            "geofence": "shibuya_west",
            "spawn_point": "pano_a",
            "spawn_heading": 45.0,
            "description": "Walk to the red awning cafe.",
            "target_pano_ids": ["pano_z"],
            "max_steps": 40,
            "ground_truth": {
                "target_pano_id": "pano_z",
                "target_name": "Cafe Louise",
                "optimal_distance_meters": 182.0
            }
        }"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.task_type, TaskType::NavigationToPoi);
        assert_eq!(task.spawn_point, PanoId::new("pano_a"));
        assert_eq!(task.target_pano_ids.len(), 1);
        assert_eq!(task.max_steps, Some(40));
        assert_eq!(task.max_time_seconds, None);
        assert_eq!(
            task.ground_truth.unwrap().target_name.as_deref(),
            Some("Cafe Louise")
        );
    }

    #[test]
    fn test_task_id_defaults_when_absent() {
        let json = r#"{
            "task_type": "exploration_find_poi",
            "geofence": "g1",
            "spawn_point": "p0",
            "answer": "yes"
        }"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.task_id.as_str(), "");
        assert_eq!(task.spawn_heading, 0.0);
        assert!(task.target_pano_ids.is_empty());
    }

    #[test]
    fn test_link_virtual_flag_wire_name() {
        let json = r#"{"pano_id": "p1", "heading": 12.0, "virtual": true}"#;
        let link: Link = serde_json::from_str(json).unwrap();
        assert!(link.is_virtual);
        let out = serde_json::to_value(&link).unwrap();
        assert_eq!(out["virtual"], serde_json::json!(true));
    }
}
