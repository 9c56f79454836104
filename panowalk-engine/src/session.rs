//! Session state
//!
//! A session is an explicit state object; every mutation goes through the
//! engine's transition functions while the per-session mutex is held.
//! Elapsed time is monotonic (`Instant`-based) and excludes paused
//! intervals.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use panowalk_core::{
    AgentId, AvailableMove, DoneReason, PanoId, SessionId, SessionMode, SessionStatus, Task,
};

/// Camera pose plus position; the part of session state that the step log
/// records verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub pano_id: PanoId,
    pub heading: f64,
    pub pitch: f64,
    pub fov: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
}

/// An agent action, as received on the wire and as logged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Move {
        move_id: u32,
    },
    Rotation {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        heading: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pitch: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fov: Option<f64>,
    },
    Stop {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        answer: Option<String>,
    },
}

/// One run of one agent over one task.
pub struct Session {
    pub id: SessionId,
    pub agent_id: AgentId,
    pub task: Arc<Task>,
    pub mode: SessionMode,
    pub status: SessionStatus,
    pub pose: Pose,
    pub step_count: u32,
    pub started_wall: DateTime<Utc>,
    pub trajectory: Vec<PanoId>,
    pub done_reason: Option<DoneReason>,
    pub submitted_answer: Option<String>,
    /// Moves offered by the last observation; their ids are only valid for
    /// the very next action.
    pub offered_moves: Vec<AvailableMove>,
    /// Path of the most recently rendered frame (agent mode).
    pub last_image_step: Option<u32>,

    started_at: Instant,
    paused_since: Option<Instant>,
    paused_total: Duration,
}

impl Session {
    pub fn new(
        id: SessionId,
        agent_id: AgentId,
        task: Arc<Task>,
        mode: SessionMode,
        pose: Pose,
    ) -> Self {
        let spawn = pose.pano_id.clone();
        Self {
            id,
            agent_id,
            task,
            mode,
            status: SessionStatus::Running,
            pose,
            step_count: 0,
            started_wall: Utc::now(),
            trajectory: vec![spawn],
            done_reason: None,
            submitted_answer: None,
            offered_moves: Vec::new(),
            last_image_step: None,
            started_at: Instant::now(),
            paused_since: None,
            paused_total: Duration::ZERO,
        }
    }

    /// Wall-clock time this session has been running, excluding paused
    /// intervals.
    pub fn elapsed(&self) -> Duration {
        let paused = match self.paused_since {
            Some(since) => self.paused_total + since.elapsed(),
            None => self.paused_total,
        };
        self.started_at.elapsed().saturating_sub(paused)
    }

    pub fn pause(&mut self) {
        if self.paused_since.is_none() {
            self.paused_since = Some(Instant::now());
            self.status = SessionStatus::Paused;
        }
    }

    pub fn resume(&mut self) {
        if let Some(since) = self.paused_since.take() {
            self.paused_total += since.elapsed();
            self.status = SessionStatus::Running;
        }
    }

    /// Which termination rule fires now, if any. Evaluated after every
    /// advancing transition and by the background monitor.
    pub fn due_termination(&self) -> Option<DoneReason> {
        if let Some(max_steps) = self.task.max_steps {
            if self.step_count >= max_steps {
                return Some(DoneReason::MaxSteps);
            }
        }
        if let Some(max_time) = self.task.max_time_seconds {
            if self.elapsed() >= Duration::from_secs(max_time) {
                return Some(DoneReason::MaxTime);
            }
        }
        None
    }

    /// Append to the trajectory unless the panorama repeats the tail.
    pub fn record_visit(&mut self, pano_id: PanoId) {
        if self.trajectory.last() != Some(&pano_id) {
            self.trajectory.push(pano_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panowalk_core::{GeofenceName, TaskType};

    fn task(max_steps: Option<u32>, max_time: Option<u64>) -> Arc<Task> {
        Arc::new(Task {
            task_id: panowalk_core::TaskId::new("t1"),
            task_type: TaskType::NavigationToPoi,
            geofence: GeofenceName::new("g1"),
            spawn_point: PanoId::new("p0"),
            spawn_heading: 0.0,
            description: String::new(),
            answer: None,
            target_pano_ids: Vec::new(),
            max_steps,
            max_time_seconds: max_time,
            ground_truth: None,
        })
    }

    fn session(max_steps: Option<u32>, max_time: Option<u64>) -> Session {
        Session::new(
            SessionId::generate(),
            AgentId::new("a1"),
            task(max_steps, max_time),
            SessionMode::Agent,
            Pose {
                pano_id: PanoId::new("p0"),
                heading: 0.0,
                pitch: 0.0,
                fov: 90.0,
                lat: None,
                lng: None,
            },
        )
    }

    #[test]
    fn test_max_steps_termination() {
        let mut s = session(Some(2), None);
        assert_eq!(s.due_termination(), None);
        s.step_count = 1;
        assert_eq!(s.due_termination(), None);
        s.step_count = 2;
        assert_eq!(s.due_termination(), Some(DoneReason::MaxSteps));
    }

    #[test]
    fn test_max_time_termination() {
        let s = session(None, Some(0));
        assert_eq!(s.due_termination(), Some(DoneReason::MaxTime));

        let s = session(None, Some(3600));
        assert_eq!(s.due_termination(), None);
    }

    #[test]
    fn test_pause_excludes_elapsed_time() {
        let mut s = session(None, None);
        s.pause();
        assert_eq!(s.status, SessionStatus::Paused);
        std::thread::sleep(Duration::from_millis(30));
        s.resume();
        assert_eq!(s.status, SessionStatus::Running);
        assert!(s.elapsed() < Duration::from_millis(25), "elapsed {:?}", s.elapsed());
    }

    #[test]
    fn test_double_pause_is_idempotent() {
        let mut s = session(None, None);
        s.pause();
        s.pause();
        s.resume();
        s.resume();
        assert_eq!(s.status, SessionStatus::Running);
    }

    #[test]
    fn test_trajectory_skips_repeats() {
        let mut s = session(None, None);
        s.record_visit(PanoId::new("p0"));
        s.record_visit(PanoId::new("p1"));
        s.record_visit(PanoId::new("p1"));
        s.record_visit(PanoId::new("p0"));
        assert_eq!(
            s.trajectory,
            vec![PanoId::new("p0"), PanoId::new("p1"), PanoId::new("p0")]
        );
    }

    #[test]
    fn test_action_wire_format() {
        let action: Action = serde_json::from_str(r#"{"type": "move", "move_id": 2}"#).unwrap();
        assert_eq!(action, Action::Move { move_id: 2 });

        let action: Action =
            serde_json::from_str(r#"{"type": "rotation", "heading": 45.0, "pitch": -10.0}"#)
                .unwrap();
        assert_eq!(
            action,
            Action::Rotation {
                heading: Some(45.0),
                pitch: Some(-10.0),
                fov: None
            }
        );

        let action: Action = serde_json::from_str(r#"{"type": "stop", "answer": "yes"}"#).unwrap();
        assert_eq!(
            action,
            Action::Stop {
                answer: Some("yes".to_string())
            }
        );
    }
}
