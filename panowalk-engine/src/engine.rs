//! Session engine
//!
//! Owns the registry of live sessions and applies every transition:
//! create, action (move / rotation / stop), pause, resume, end. A
//! transition runs entirely under its session's mutex and follows
//! log-then-commit: the step log record is durable on disk before any
//! session state mutates, so a failed write aborts the action with state
//! unchanged.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

use chrono::Utc;

use panowalk_cache::{Cache, GeofenceIndex};
use panowalk_core::{
    AgentId, AvailableMove, DoneReason, Observation, PanoId, PanoMetadata, SessionId, SessionMode,
    SessionStatus, SessionSummary, Settings, TaskId,
};
use panowalk_render::{render_perspective, ViewParams, FOV_MAX, FOV_MIN, PITCH_MAX, PITCH_MIN};

use crate::cleanup;
use crate::error::{EngineError, EngineResult};
use crate::logger::{LogEntry, StepLogger};
use crate::moves::available_moves;
use crate::session::{Action, Pose, Session};
use crate::tasks::TaskStore;

/// Result of one action transition.
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    /// The post-action observation; absent once the session is terminal.
    pub observation: Option<Observation>,
    pub done: bool,
    pub done_reason: Option<DoneReason>,
}

/// Snapshot returned by `get_state`.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub step_count: u32,
    pub elapsed_seconds: f64,
    pub observation: Observation,
}

/// The runtime's core: per-session finite state machines over a shared
/// read-only cache.
pub struct SessionEngine {
    cache: Arc<Cache>,
    geofences: Arc<GeofenceIndex>,
    tasks: Arc<TaskStore>,
    logger: StepLogger,
    settings: Arc<Settings>,
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<Session>>>>,
}

impl SessionEngine {
    pub fn new(
        cache: Arc<Cache>,
        geofences: Arc<GeofenceIndex>,
        tasks: Arc<TaskStore>,
        settings: Arc<Settings>,
    ) -> EngineResult<Self> {
        let logger = StepLogger::new(settings.logs_dir())
            .map_err(|e| EngineError::Internal(format!("cannot create logs dir: {}", e)))?;
        std::fs::create_dir_all(settings.temp_images_dir())
            .map_err(|e| EngineError::Internal(format!("cannot create temp image dir: {}", e)))?;

        Ok(Self {
            cache,
            geofences,
            tasks,
            logger,
            settings,
            sessions: RwLock::new(HashMap::new()),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn logger(&self) -> &StepLogger {
        &self.logger
    }

    pub fn tasks(&self) -> &TaskStore {
        &self.tasks
    }

    pub fn geofences(&self) -> &GeofenceIndex {
        &self.geofences
    }

    // ========================================================================
    // TRANSITIONS
    // ========================================================================

    /// Spawn a new session and emit its initial observation.
    pub fn create_session(
        &self,
        agent_id: AgentId,
        task_id: &TaskId,
        mode: SessionMode,
    ) -> EngineResult<(SessionId, Observation)> {
        let task = self.tasks.load(task_id)?;
        let fence = self.geofences.get(&task.geofence)?;
        if !fence.contains(&task.spawn_point) {
            return Err(EngineError::BadTask(format!(
                "spawn point {} is not in geofence {}",
                task.spawn_point, task.geofence
            )));
        }

        let meta = self.cache.get_meta(&task.spawn_point)?;
        let pose = Pose {
            pano_id: task.spawn_point.clone(),
            heading: panowalk_core::normalize_heading(task.spawn_heading),
            pitch: 0.0,
            fov: self.settings.render_default_fov,
            lat: Some(meta.lat),
            lng: Some(meta.lng),
        };

        let id = SessionId::generate();
        let mut session = Session::new(id, agent_id, Arc::clone(&task), mode, pose);
        let moves = self.compute_moves(&meta, &fence, session.pose.heading)?;

        if mode == SessionMode::Agent {
            self.render_frame(id, &session.pose, 0, meta.center_heading)?;
            session.last_image_step = Some(0);
        }

        self.logger
            .append(
                id,
                &LogEntry::SessionStart {
                    session_id: id,
                    agent_id: session.agent_id.clone(),
                    task_id: task.task_id.clone(),
                    mode,
                    timestamp: Utc::now(),
                    initial_state: session.pose.clone(),
                    task_description: task.description.clone(),
                },
            )
            .map_err(|e| EngineError::LogWriteFailed(e.to_string()))?;

        session.offered_moves = moves;
        let observation = self.observation(&session, meta.center_heading);

        tracing::info!(session_id = %id, agent_id = %session.agent_id, task_id = %task.task_id,
            mode = ?mode, spawn = %task.spawn_point, "session created");

        self.write_sessions().insert(id, Arc::new(Mutex::new(session)));
        Ok((id, observation))
    }

    /// Apply one agent action.
    pub fn execute_action(&self, id: SessionId, action: Action) -> EngineResult<ActionOutcome> {
        let handle = self.session_handle(id)?;
        let mut session = lock_session(&handle);

        if session.status.is_terminal() {
            return Err(EngineError::SessionTerminated(id));
        }
        if session.status == SessionStatus::Paused {
            return Err(EngineError::ActionInvalid(
                "session is paused; resume it first".to_string(),
            ));
        }

        match action {
            Action::Move { move_id } => self.apply_move(&mut session, move_id),
            Action::Rotation { heading, pitch, fov } => {
                self.apply_rotation(&mut session, heading, pitch, fov)
            }
            Action::Stop { answer } => self.apply_stop(&mut session, answer),
        }
    }

    fn apply_move(&self, session: &mut Session, move_id: u32) -> EngineResult<ActionOutcome> {
        let chosen = session
            .offered_moves
            .iter()
            .find(|m| m.id == move_id)
            .cloned()
            .ok_or_else(|| {
                let offered: Vec<u32> = session.offered_moves.iter().map(|m| m.id).collect();
                EngineError::ActionInvalid(format!(
                    "unknown move_id {}; offered ids were {:?}",
                    move_id, offered
                ))
            })?;

        let fence = self.geofences.get(&session.task.geofence)?;
        if !fence.contains(&session.pose.pano_id) {
            // Invariant violation: the session somehow left its geofence.
            return self.invariant_violation(session, &fence);
        }
        if !fence.contains(&chosen.pano_id) {
            return self.invariant_violation(session, &fence);
        }

        let target_meta = self.cache.get_meta(&chosen.pano_id)?;
        let new_step = session.step_count + 1;
        // The agent turns to face its direction of travel; pitch carries
        // over, fov resets to the default.
        let new_pose = Pose {
            pano_id: chosen.pano_id.clone(),
            heading: chosen.heading,
            pitch: session.pose.pitch,
            fov: self.settings.render_default_fov,
            lat: Some(target_meta.lat),
            lng: Some(target_meta.lng),
        };
        let new_moves = self.compute_moves(&target_meta, &fence, new_pose.heading)?;

        let done_reason = termination_after(session, new_step);

        let rendered = if done_reason.is_none() && session.mode == SessionMode::Agent {
            self.render_frame(session.id, &new_pose, new_step, target_meta.center_heading)?;
            true
        } else {
            false
        };

        self.append_action_log(
            session,
            new_step,
            &new_pose,
            Action::Move { move_id },
            &new_moves,
            rendered,
        )?;

        session.pose = new_pose;
        session.step_count = new_step;
        session.record_visit(chosen.pano_id.clone());
        session.offered_moves = new_moves;
        if rendered {
            session.last_image_step = Some(new_step);
        }

        tracing::debug!(session_id = %session.id, step = new_step, pano = %chosen.pano_id,
            "move applied");

        if let Some(reason) = done_reason {
            self.finalize(session, reason, None)?;
            return Ok(ActionOutcome {
                observation: None,
                done: true,
                done_reason: Some(reason),
            });
        }

        Ok(ActionOutcome {
            observation: Some(self.observation(session, target_meta.center_heading)),
            done: false,
            done_reason: None,
        })
    }

    fn apply_rotation(
        &self,
        session: &mut Session,
        heading: Option<f64>,
        pitch: Option<f64>,
        fov: Option<f64>,
    ) -> EngineResult<ActionOutcome> {
        if session.mode != SessionMode::Agent {
            return Err(EngineError::ActionInvalid(
                "rotation is only available in agent mode".to_string(),
            ));
        }

        let heading = heading.unwrap_or(session.pose.heading);
        let pitch = pitch.unwrap_or(session.pose.pitch);
        let fov = fov.unwrap_or(session.pose.fov);

        if !(0.0..360.0).contains(&heading) {
            return Err(EngineError::RotationInvalid(format!(
                "heading {} outside [0, 360)",
                heading
            )));
        }
        if !(PITCH_MIN..=PITCH_MAX).contains(&pitch) {
            return Err(EngineError::RotationInvalid(format!(
                "pitch {} outside [{}, {}]",
                pitch, PITCH_MIN, PITCH_MAX
            )));
        }
        if !(FOV_MIN..=FOV_MAX).contains(&fov) {
            return Err(EngineError::RotationInvalid(format!(
                "fov {} outside [{}, {}]",
                fov, FOV_MIN, FOV_MAX
            )));
        }

        let meta = self.cache.get_meta(&session.pose.pano_id)?;
        let fence = self.geofences.get(&session.task.geofence)?;

        let new_pose = Pose {
            heading,
            pitch,
            fov,
            ..session.pose.clone()
        };
        // Directions are relative to the agent's heading, so the offered
        // moves change even though the panorama does not.
        let new_moves = self.compute_moves(&meta, &fence, heading)?;

        // Rotation never advances the step counter, but time still runs.
        let done_reason = match session.due_termination() {
            Some(DoneReason::MaxTime) => Some(DoneReason::MaxTime),
            _ => None,
        };

        let rendered = if done_reason.is_none() {
            self.render_frame(session.id, &new_pose, session.step_count, meta.center_heading)?;
            true
        } else {
            false
        };

        self.append_action_log(
            session,
            session.step_count,
            &new_pose,
            Action::Rotation {
                heading: Some(heading),
                pitch: Some(pitch),
                fov: Some(fov),
            },
            &new_moves,
            rendered,
        )?;

        session.pose = new_pose;
        session.offered_moves = new_moves;
        if rendered {
            session.last_image_step = Some(session.step_count);
        }

        if let Some(reason) = done_reason {
            self.finalize(session, reason, None)?;
            return Ok(ActionOutcome {
                observation: None,
                done: true,
                done_reason: Some(reason),
            });
        }

        Ok(ActionOutcome {
            observation: Some(self.observation(session, meta.center_heading)),
            done: false,
            done_reason: None,
        })
    }

    fn apply_stop(
        &self,
        session: &mut Session,
        answer: Option<String>,
    ) -> EngineResult<ActionOutcome> {
        self.append_action_log(
            session,
            session.step_count,
            &session.pose.clone(),
            Action::Stop {
                answer: answer.clone(),
            },
            &session.offered_moves.clone(),
            false,
        )?;

        self.finalize(session, DoneReason::Stopped, answer)?;
        Ok(ActionOutcome {
            observation: None,
            done: true,
            done_reason: Some(DoneReason::Stopped),
        })
    }

    /// Pause time accounting; human sessions only.
    pub fn pause_session(&self, id: SessionId) -> EngineResult<SessionStatus> {
        let handle = self.session_handle(id)?;
        let mut session = lock_session(&handle);
        if session.status.is_terminal() {
            return Err(EngineError::SessionTerminated(id));
        }
        if session.mode != SessionMode::Human {
            return Err(EngineError::ActionInvalid(
                "pause is only available in human mode".to_string(),
            ));
        }
        session.pause();
        Ok(session.status)
    }

    /// Resume a paused session and return the current observation.
    pub fn resume_session(&self, id: SessionId) -> EngineResult<SessionSnapshot> {
        let handle = self.session_handle(id)?;
        let mut session = lock_session(&handle);
        if session.status.is_terminal() {
            return Err(EngineError::SessionTerminated(id));
        }
        session.resume();
        self.snapshot(&session)
    }

    /// Current status and observation, without re-rendering.
    pub fn get_state(&self, id: SessionId) -> EngineResult<SessionSnapshot> {
        let handle = self.session_handle(id)?;
        let session = lock_session(&handle);
        self.snapshot(&session)
    }

    /// Terminate without an answer (explicit end). Idempotent on terminal
    /// sessions: returns the existing summary.
    pub fn end_session(&self, id: SessionId) -> EngineResult<SessionSummary> {
        let handle = self.session_handle(id)?;
        let mut session = lock_session(&handle);
        if !session.status.is_terminal() {
            self.finalize(&mut session, DoneReason::Stopped, None)?;
        }
        self.logger
            .read_summary(id)
            .ok_or_else(|| EngineError::Internal(format!("summary missing for session {}", id)))
    }

    /// Terminate running sessions whose time budget has elapsed. Called by
    /// the background monitor; returns how many sessions were reaped.
    pub fn reap_expired(&self) -> usize {
        let handles: Vec<_> = self.read_sessions().values().cloned().collect();
        let mut reaped = 0;
        for handle in handles {
            let mut session = lock_session(&handle);
            if session.status != SessionStatus::Running {
                continue;
            }
            if let Some(DoneReason::MaxTime) = session.due_termination() {
                match self.finalize(&mut session, DoneReason::MaxTime, None) {
                    Ok(_) => reaped += 1,
                    Err(error) => {
                        tracing::error!(session_id = %session.id, %error,
                            "failed to finalize expired session");
                    }
                }
            }
        }
        reaped
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    fn snapshot(&self, session: &Session) -> EngineResult<SessionSnapshot> {
        let meta = self.cache.get_meta(&session.pose.pano_id)?;
        Ok(SessionSnapshot {
            status: session.status,
            step_count: session.step_count,
            elapsed_seconds: session.elapsed().as_secs_f64(),
            observation: self.observation(session, meta.center_heading),
        })
    }

    fn observation(&self, session: &Session, center_heading: f64) -> Observation {
        let current_image = match session.mode {
            SessionMode::Agent => session
                .last_image_step
                .map(|step| format!("/temp_images/{}/step_{}.jpg", session.id, step)),
            SessionMode::Human => None,
        };
        let panorama_url = (session.mode == SessionMode::Human).then(|| {
            format!(
                "/data/panoramas/{}_z{}.jpg",
                session.pose.pano_id, self.settings.panorama_zoom_level
            )
        });

        Observation {
            task_description: session.task.description.clone(),
            current_image,
            panorama_url,
            heading: session.pose.heading,
            pitch: session.pose.pitch,
            fov: session.pose.fov,
            center_heading,
            available_moves: session.offered_moves.clone(),
        }
    }

    fn compute_moves(
        &self,
        meta: &PanoMetadata,
        fence: &HashSet<PanoId>,
        agent_heading: f64,
    ) -> EngineResult<Vec<AvailableMove>> {
        let targets: Vec<PanoId> = meta.links.iter().map(|l| l.pano_id.clone()).collect();
        let locations = self.cache.locations(&targets)?;
        Ok(available_moves(
            meta,
            fence,
            agent_heading,
            Some((meta.lat, meta.lng)),
            &locations,
        ))
    }

    /// Render one perspective frame into the session's temp directory.
    fn render_frame(
        &self,
        session_id: SessionId,
        pose: &Pose,
        step: u32,
        center_heading: f64,
    ) -> EngineResult<()> {
        let zoom = self.settings.panorama_zoom_level;
        let bytes = self.cache.image_bytes(&pose.pano_id, zoom)?;

        let (width, height) = self.settings.render_output_size;
        let jpeg = render_perspective(
            &bytes,
            &ViewParams {
                heading: pose.heading,
                pitch: pose.pitch,
                fov: pose.fov,
                center_heading,
                width,
                height,
            },
        )
        .map_err(|e| EngineError::from_render(e, &pose.pano_id, zoom))?;

        let dir = self.settings.temp_images_dir().join(session_id.to_string());
        std::fs::create_dir_all(&dir)
            .map_err(|e| EngineError::Internal(format!("temp image dir: {}", e)))?;
        std::fs::write(dir.join(format!("step_{}.jpg", step)), jpeg)
            .map_err(|e| EngineError::Internal(format!("temp image write: {}", e)))?;
        Ok(())
    }

    fn append_action_log(
        &self,
        session: &Session,
        step: u32,
        state: &Pose,
        action: Action,
        available: &[AvailableMove],
        rendered: bool,
    ) -> EngineResult<()> {
        let image_path =
            rendered.then(|| format!("temp_images/{}/step_{}.jpg", session.id, step));
        self.logger
            .append(
                session.id,
                &LogEntry::Action {
                    session_id: session.id,
                    timestamp: Utc::now(),
                    step,
                    state: state.clone(),
                    action,
                    available_moves: available.to_vec(),
                    image_path,
                },
            )
            .map_err(|e| EngineError::LogWriteFailed(e.to_string()))
    }

    /// Transition to a terminal state and persist the summary.
    fn finalize(
        &self,
        session: &mut Session,
        reason: DoneReason,
        answer: Option<String>,
    ) -> EngineResult<SessionSummary> {
        session.status = reason.terminal_status();
        session.done_reason = Some(reason);
        if answer.is_some() {
            session.submitted_answer = answer;
        }

        let summary = SessionSummary {
            session_id: session.id,
            agent_id: session.agent_id.clone(),
            task_id: session.task.task_id.clone(),
            status: session.status,
            done_reason: reason,
            total_steps: session.step_count,
            elapsed_seconds: session.elapsed().as_secs_f64(),
            final_pano_id: session.pose.pano_id.clone(),
            reached_target: session.task.target_pano_ids.contains(&session.pose.pano_id),
            submitted_answer: session.submitted_answer.clone(),
            trajectory: session.trajectory.clone(),
            ended_at: Utc::now(),
        };
        self.logger
            .write_summary(&summary)
            .map_err(|e| EngineError::LogWriteFailed(e.to_string()))?;

        if let Err(error) = self.cache.record_attempt(
            &session.agent_id,
            &session.task.task_id,
            session.id,
            session.status.as_str(),
            None,
        ) {
            tracing::warn!(session_id = %session.id, %error, "failed to record player progress");
        }

        if cleanup::delete_on_session_end(self.settings.temp_image_cleanup_policy, session.status)
        {
            cleanup::remove_session_dir(&self.settings.temp_images_dir(), session.id);
        }

        tracing::info!(session_id = %session.id, reason = %reason, steps = session.step_count,
            final_pano = %session.pose.pano_id, "session finished");
        Ok(summary)
    }

    /// Handle an out-of-geofence invariant violation: the session is
    /// force-stopped with done_reason `error` and the violation surfaces.
    fn invariant_violation(
        &self,
        session: &mut Session,
        _fence: &HashSet<PanoId>,
    ) -> EngineResult<ActionOutcome> {
        tracing::error!(session_id = %session.id, pano = %session.pose.pano_id,
            geofence = %session.task.geofence, "session escaped its geofence");
        if let Err(error) = self.finalize(session, DoneReason::Error, None) {
            tracing::error!(session_id = %session.id, %error,
                "failed to finalize session after geofence violation");
        }
        Err(EngineError::OutOfGeofence {
            pano_id: session.pose.pano_id.clone(),
            geofence: session.task.geofence.clone(),
        })
    }

    fn session_handle(&self, id: SessionId) -> EngineResult<Arc<Mutex<Session>>> {
        self.read_sessions()
            .get(&id)
            .cloned()
            .ok_or(EngineError::SessionNotFound(id))
    }

    fn read_sessions(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<SessionId, Arc<Mutex<Session>>>> {
        self.sessions.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_sessions(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<SessionId, Arc<Mutex<Session>>>> {
        self.sessions.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn lock_session(handle: &Arc<Mutex<Session>>) -> MutexGuard<'_, Session> {
    handle.lock().unwrap_or_else(|e| e.into_inner())
}

/// Which termination rule fires once the step counter reaches `new_step`.
fn termination_after(session: &Session, new_step: u32) -> Option<DoneReason> {
    if let Some(max_steps) = session.task.max_steps {
        if new_step >= max_steps {
            return Some(DoneReason::MaxSteps);
        }
    }
    if let Some(max_time) = session.task.max_time_seconds {
        if session.elapsed() >= Duration::from_secs(max_time) {
            return Some(DoneReason::MaxTime);
        }
    }
    None
}
