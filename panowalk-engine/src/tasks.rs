//! Task store
//!
//! Tasks are JSON files under the tasks directory, produced offline by the
//! task generator. The file stem is the authoritative task id. Loaded
//! tasks are cached in memory; task files never change while the server
//! runs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use panowalk_core::{Task, TaskId};

use crate::error::{EngineError, EngineResult};

pub struct TaskStore {
    tasks_dir: PathBuf,
    loaded: RwLock<HashMap<TaskId, Arc<Task>>>,
}

impl TaskStore {
    pub fn new(tasks_dir: impl AsRef<Path>) -> Self {
        Self {
            tasks_dir: tasks_dir.as_ref().to_path_buf(),
            loaded: RwLock::new(HashMap::new()),
        }
    }

    /// Load a task by id, consulting the in-memory cache first.
    pub fn load(&self, task_id: &TaskId) -> EngineResult<Arc<Task>> {
        if let Some(task) = self.read().get(task_id) {
            return Ok(Arc::clone(task));
        }

        let path = self.tasks_dir.join(format!("{}.json", task_id));
        if !path.is_file() {
            return Err(EngineError::TaskNotFound(task_id.clone()));
        }

        let task = Arc::new(Self::parse(&path, task_id)?);
        self.write().insert(task_id.clone(), Arc::clone(&task));
        Ok(task)
    }

    /// All tasks on disk. Unparseable files are skipped with a warning.
    pub fn list(&self) -> Vec<Arc<Task>> {
        let Ok(dir) = std::fs::read_dir(&self.tasks_dir) else {
            return Vec::new();
        };
        let mut ids: Vec<TaskId> = dir
            .flatten()
            .filter_map(|entry| {
                let path = entry.path();
                if path.extension()? != "json" {
                    return None;
                }
                Some(TaskId::new(path.file_stem()?.to_str()?))
            })
            .collect();
        ids.sort();

        ids.iter()
            .filter_map(|id| match self.load(id) {
                Ok(task) => Some(task),
                Err(error) => {
                    tracing::warn!(task_id = %id, %error, "skipping unreadable task file");
                    None
                }
            })
            .collect()
    }

    fn parse(path: &Path, task_id: &TaskId) -> EngineResult<Task> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| EngineError::BadTask(format!("{}: {}", path.display(), e)))?;
        let mut task: Task = serde_json::from_str(&raw)
            .map_err(|e| EngineError::BadTask(format!("{}: {}", path.display(), e)))?;
        // File stem wins over whatever the JSON claims.
        task.task_id = task_id.clone();
        Ok(task)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<TaskId, Arc<Task>>> {
        self.loaded.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<TaskId, Arc<Task>>> {
        self.loaded.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TASK_JSON: &str = r#"{
        "task_id": "claimed_id",
        "task_type": "navigation_to_poi",
        "geofence": "g1",
        "spawn_point": "p0",
        "spawn_heading": 10.0,
        "description": "go"
    }"#;

    #[test]
    fn test_load_uses_file_stem_as_id() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("nav_001.json"), TASK_JSON).unwrap();

        let store = TaskStore::new(dir.path());
        let task = store.load(&TaskId::new("nav_001")).unwrap();
        assert_eq!(task.task_id, TaskId::new("nav_001"));
        assert_eq!(task.spawn_heading, 10.0);
    }

    #[test]
    fn test_missing_task() {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::new(dir.path());
        assert!(matches!(
            store.load(&TaskId::new("nope")).unwrap_err(),
            EngineError::TaskNotFound(_)
        ));
    }

    #[test]
    fn test_list_skips_broken_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("good.json"), TASK_JSON).unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();

        let store = TaskStore::new(dir.path());
        let tasks = store.list();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].task_id, TaskId::new("good"));
    }

    #[test]
    fn test_malformed_task_is_bad_task() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("bad.json"), r#"{"task_type": "navigation_to_poi"}"#)
            .unwrap();
        let store = TaskStore::new(dir.path());
        assert!(matches!(
            store.load(&TaskId::new("bad")).unwrap_err(),
            EngineError::BadTask(_)
        ));
    }
}
