//! Enum types for Panowalk entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// SESSION ENUMS
// ============================================================================

/// Status of an evaluation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    Paused,
    Completed,
    Timeout,
    Stopped,
}

impl SessionStatus {
    /// True once the session can accept no further actions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::Timeout | SessionStatus::Stopped
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Running => "running",
            SessionStatus::Paused => "paused",
            SessionStatus::Completed => "completed",
            SessionStatus::Timeout => "timeout",
            SessionStatus::Stopped => "stopped",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who is driving the session: an autonomous agent (gets perspective
/// renders) or a human player (gets the raw panorama for a client-side
/// viewer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    Agent,
    Human,
}

/// Why a session reached a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum DoneReason {
    Stopped,
    MaxSteps,
    MaxTime,
    Error,
}

impl DoneReason {
    /// The terminal status this reason transitions the session into.
    pub fn terminal_status(&self) -> SessionStatus {
        match self {
            DoneReason::Stopped => SessionStatus::Stopped,
            DoneReason::MaxSteps => SessionStatus::Completed,
            DoneReason::MaxTime => SessionStatus::Timeout,
            DoneReason::Error => SessionStatus::Stopped,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DoneReason::Stopped => "stopped",
            DoneReason::MaxSteps => "max_steps",
            DoneReason::MaxTime => "max_time",
            DoneReason::Error => "error",
        }
    }
}

impl fmt::Display for DoneReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// TASK ENUMS
// ============================================================================

/// Kind of benchmark task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Navigate to a target panorama.
    NavigationToPoi,
    /// Explore and answer whether a POI exists.
    ExplorationFindPoi,
}

// ============================================================================
// PRELOAD ENUMS
// ============================================================================

/// Lifecycle of a preload job for one geofence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum PreloadState {
    NotStarted,
    InProgress,
    Completed,
    CompletedWithErrors,
}

impl PreloadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreloadState::NotStarted => "not_started",
            PreloadState::InProgress => "in_progress",
            PreloadState::Completed => "completed",
            PreloadState::CompletedWithErrors => "completed_with_errors",
        }
    }
}

impl fmt::Display for PreloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// TEMP IMAGE CLEANUP
// ============================================================================

/// Policy for disposing of per-session rendered frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum CleanupPolicy {
    /// Never delete rendered frames.
    KeepAll,
    /// Delete frames only for sessions that reach a terminal state normally.
    KeepOnComplete,
    /// Delete each frame right after it has been served once.
    DeleteOnSend,
    /// Delete the whole session directory when the session terminates.
    #[default]
    DeleteOnSessionEnd,
    /// Background sweep deletes frames older than the configured age.
    AutoExpire,
}

impl FromStr for CleanupPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keep_all" => Ok(CleanupPolicy::KeepAll),
            "keep_on_complete" => Ok(CleanupPolicy::KeepOnComplete),
            "delete_on_send" => Ok(CleanupPolicy::DeleteOnSend),
            "delete_on_session_end" => Ok(CleanupPolicy::DeleteOnSessionEnd),
            "auto_expire" => Ok(CleanupPolicy::AutoExpire),
            other => Err(format!("unknown cleanup policy: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(!SessionStatus::Running.is_terminal());
        assert!(!SessionStatus::Paused.is_terminal());
        assert!(SessionStatus::Completed.is_terminal());
        assert!(SessionStatus::Timeout.is_terminal());
        assert!(SessionStatus::Stopped.is_terminal());
    }

    #[test]
    fn test_done_reason_status_mapping() {
        assert_eq!(DoneReason::Stopped.terminal_status(), SessionStatus::Stopped);
        assert_eq!(DoneReason::MaxSteps.terminal_status(), SessionStatus::Completed);
        assert_eq!(DoneReason::MaxTime.terminal_status(), SessionStatus::Timeout);
        assert_eq!(DoneReason::Error.terminal_status(), SessionStatus::Stopped);
    }

    #[test]
    fn test_snake_case_wire_format() {
        assert_eq!(
            serde_json::to_string(&TaskType::NavigationToPoi).unwrap(),
            "\"navigation_to_poi\""
        );
        assert_eq!(
            serde_json::to_string(&PreloadState::CompletedWithErrors).unwrap(),
            "\"completed_with_errors\""
        );
        assert_eq!(serde_json::to_string(&DoneReason::MaxSteps).unwrap(), "\"max_steps\"");
    }

    #[test]
    fn test_cleanup_policy_parse() {
        assert_eq!("keep_all".parse::<CleanupPolicy>().unwrap(), CleanupPolicy::KeepAll);
        assert_eq!(
            "delete_on_session_end".parse::<CleanupPolicy>().unwrap(),
            CleanupPolicy::DeleteOnSessionEnd
        );
        assert!("keep_forever".parse::<CleanupPolicy>().is_err());
    }
}
