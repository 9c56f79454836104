//! Step logging
//!
//! Each session writes one JSON-Lines file plus a summary file. Entries
//! are flushed and synced before the owning transition commits, so a crash
//! can lose at most an uncommitted transition, never reorder history.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use panowalk_core::{
    AgentId, AvailableMove, SessionId, SessionMode, SessionSummary, TaskId,
};

use crate::session::{Action, Pose};

/// One record in a session's JSON-Lines log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEntry {
    SessionStart {
        session_id: SessionId,
        agent_id: AgentId,
        task_id: TaskId,
        mode: SessionMode,
        timestamp: DateTime<Utc>,
        initial_state: Pose,
        task_description: String,
    },
    Action {
        session_id: SessionId,
        timestamp: DateTime<Utc>,
        step: u32,
        state: Pose,
        action: Action,
        available_moves: Vec<AvailableMove>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        image_path: Option<String>,
    },
}

/// Writer/reader for `logs/{sessionId}.jsonl` and
/// `logs/{sessionId}.summary.json`.
pub struct StepLogger {
    logs_dir: PathBuf,
}

impl StepLogger {
    pub fn new(logs_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let logs_dir = logs_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&logs_dir)?;
        Ok(Self { logs_dir })
    }

    pub fn log_path(&self, session_id: SessionId) -> PathBuf {
        self.logs_dir.join(format!("{}.jsonl", session_id))
    }

    pub fn summary_path(&self, session_id: SessionId) -> PathBuf {
        self.logs_dir.join(format!("{}.summary.json", session_id))
    }

    /// Append one record, durable before return.
    pub fn append(&self, session_id: SessionId, entry: &LogEntry) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path(session_id))?;
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');
        file.write_all(&line)?;
        file.flush()?;
        file.sync_data()
    }

    /// Write the terminal summary next to the step log.
    pub fn write_summary(&self, summary: &SessionSummary) -> std::io::Result<()> {
        let bytes = serde_json::to_vec_pretty(summary)?;
        let path = self.summary_path(summary.session_id);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, path)
    }

    /// All entries of one session's log, in write order.
    pub fn read_log(&self, session_id: SessionId) -> std::io::Result<Vec<LogEntry>> {
        let raw = std::fs::read_to_string(self.log_path(session_id))?;
        let mut entries = Vec::new();
        for line in raw.lines().filter(|l| !l.trim().is_empty()) {
            entries.push(serde_json::from_str(line)?);
        }
        Ok(entries)
    }

    pub fn read_summary(&self, session_id: SessionId) -> Option<SessionSummary> {
        let raw = std::fs::read_to_string(self.summary_path(session_id)).ok()?;
        serde_json::from_str(&raw).ok()
    }

    /// Session ids that have a log on disk, newest first by modification
    /// time. Sessions from earlier runs of the server are included.
    pub fn list_sessions(&self) -> Vec<SessionId> {
        let Ok(dir) = std::fs::read_dir(&self.logs_dir) else {
            return Vec::new();
        };
        let mut found: Vec<(SessionId, std::time::SystemTime)> = dir
            .flatten()
            .filter_map(|entry| {
                let path = entry.path();
                if path.extension()? != "jsonl" {
                    return None;
                }
                let id: SessionId = path.file_stem()?.to_str()?.parse().ok()?;
                let modified = entry.metadata().ok()?.modified().ok()?;
                Some((id, modified))
            })
            .collect();
        found.sort_by(|a, b| b.1.cmp(&a.1));
        found.into_iter().map(|(id, _)| id).collect()
    }
}
