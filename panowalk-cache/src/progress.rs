//! Player progress records
//!
//! Human evaluation tracks one row per (player, task): latest session,
//! status, score, and attempt count. Rows are upserted when a session
//! terminates and read back by the progress endpoint.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use panowalk_core::{AgentId, SessionId, TaskId};

use crate::db::Cache;
use crate::error::CacheResult;

/// One player's progress on one task.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerProgress {
    pub player_id: AgentId,
    pub task_id: TaskId,
    pub session_id: Option<SessionId>,
    pub status: String,
    pub score: Option<f64>,
    pub attempts: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

impl Cache {
    /// Record one attempt at a task, incrementing the attempt counter.
    pub fn record_attempt(
        &self,
        player_id: &AgentId,
        task_id: &TaskId,
        session_id: SessionId,
        status: &str,
        score: Option<f64>,
    ) -> CacheResult<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO player_progress
                 (player_id, task_id, session_id, status, score, attempts, last_attempt_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)
             ON CONFLICT(player_id, task_id) DO UPDATE SET
                 session_id = excluded.session_id,
                 status = excluded.status,
                 score = excluded.score,
                 attempts = player_progress.attempts + 1,
                 last_attempt_at = excluded.last_attempt_at",
            params![
                player_id.as_str(),
                task_id.as_str(),
                session_id.to_string(),
                status,
                score,
                Utc::now(),
            ],
        )?;
        Ok(())
    }

    /// All progress rows for one player.
    pub fn player_progress(&self, player_id: &AgentId) -> CacheResult<Vec<PlayerProgress>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT task_id, session_id, status, score, attempts, last_attempt_at
             FROM player_progress WHERE player_id = ?1 ORDER BY task_id",
        )?;
        let rows = stmt.query_map(params![player_id.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<f64>>(3)?,
                row.get::<_, u32>(4)?,
                row.get::<_, Option<DateTime<Utc>>>(5)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (task_id, session_id, status, score, attempts, last_attempt_at) = row?;
            out.push(PlayerProgress {
                player_id: player_id.clone(),
                task_id: TaskId::new(task_id),
                session_id: session_id.and_then(|s| s.parse().ok()),
                status,
                score,
                attempts,
                last_attempt_at,
            });
        }
        Ok(out)
    }

    /// Progress on a single task, if any attempt was recorded.
    pub fn task_progress(
        &self,
        player_id: &AgentId,
        task_id: &TaskId,
    ) -> CacheResult<Option<PlayerProgress>> {
        let conn = self.conn();
        let row = conn
            .query_row(
                "SELECT session_id, status, score, attempts, last_attempt_at
                 FROM player_progress WHERE player_id = ?1 AND task_id = ?2",
                params![player_id.as_str(), task_id.as_str()],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<f64>>(2)?,
                        row.get::<_, u32>(3)?,
                        row.get::<_, Option<DateTime<Utc>>>(4)?,
                    ))
                },
            )
            .optional()?;

        Ok(row.map(|(session_id, status, score, attempts, last_attempt_at)| PlayerProgress {
            player_id: player_id.clone(),
            task_id: task_id.clone(),
            session_id: session_id.and_then(|s| s.parse().ok()),
            status,
            score,
            attempts,
            last_attempt_at,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_cache(dir: &TempDir) -> Cache {
        Cache::open(dir.path().join("cache.db"), dir.path().join("panoramas")).unwrap()
    }

    #[test]
    fn test_attempts_accumulate() {
        let dir = TempDir::new().unwrap();
        let cache = open_cache(&dir);
        let player = AgentId::new("player_7");
        let task = TaskId::new("nav_001");

        cache
            .record_attempt(&player, &task, SessionId::generate(), "stopped", None)
            .unwrap();
        cache
            .record_attempt(&player, &task, SessionId::generate(), "completed", Some(0.8))
            .unwrap();

        let row = cache.task_progress(&player, &task).unwrap().unwrap();
        assert_eq!(row.attempts, 2);
        assert_eq!(row.status, "completed");
        assert_eq!(row.score, Some(0.8));
        assert!(row.last_attempt_at.is_some());
    }

    #[test]
    fn test_progress_is_per_player() {
        let dir = TempDir::new().unwrap();
        let cache = open_cache(&dir);
        let task = TaskId::new("nav_001");

        cache
            .record_attempt(&AgentId::new("a"), &task, SessionId::generate(), "timeout", None)
            .unwrap();

        assert_eq!(cache.player_progress(&AgentId::new("a")).unwrap().len(), 1);
        assert!(cache.player_progress(&AgentId::new("b")).unwrap().is_empty());
        assert!(cache
            .task_progress(&AgentId::new("b"), &task)
            .unwrap()
            .is_none());
    }
}
