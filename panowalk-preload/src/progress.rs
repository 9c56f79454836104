//! Preload progress registry
//!
//! One entry per preload key (geofence or task). Shared between the worker
//! pool, which updates counters, and the HTTP API, which reads them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use panowalk_core::{PanoId, PreloadState};

/// Progress of one preload job.
#[derive(Debug, Clone, Serialize)]
pub struct PreloadProgress {
    pub status: PreloadState,
    pub done: usize,
    pub total: usize,
    /// Panoramas that failed after retry exhaustion.
    pub failed: Vec<PanoId>,
}

impl PreloadProgress {
    pub fn not_started() -> Self {
        Self {
            status: PreloadState::NotStarted,
            done: 0,
            total: 0,
            failed: Vec::new(),
        }
    }

    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.done as f64 / self.total as f64 * 1000.0).round() / 10.0
    }
}

/// Shared registry of preload jobs, keyed by geofence or task name.
#[derive(Clone, Default)]
pub struct PreloadRegistry {
    inner: Arc<Mutex<HashMap<String, PreloadProgress>>>,
}

impl PreloadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a job as started. Returns false (and changes nothing) if the
    /// job is already running.
    pub fn begin(&self, key: &str, total: usize) -> bool {
        let mut inner = self.lock();
        if let Some(progress) = inner.get(key) {
            if progress.status == PreloadState::InProgress {
                return false;
            }
        }
        inner.insert(
            key.to_string(),
            PreloadProgress {
                status: PreloadState::InProgress,
                done: 0,
                total,
                failed: Vec::new(),
            },
        );
        true
    }

    pub fn item_done(&self, key: &str) {
        let mut inner = self.lock();
        if let Some(progress) = inner.get_mut(key) {
            progress.done += 1;
        }
    }

    pub fn item_failed(&self, key: &str, pano_id: PanoId) {
        let mut inner = self.lock();
        if let Some(progress) = inner.get_mut(key) {
            progress.done += 1;
            progress.failed.push(pano_id);
        }
    }

    /// Transition a running job to its terminal state.
    pub fn finish(&self, key: &str) {
        let mut inner = self.lock();
        if let Some(progress) = inner.get_mut(key) {
            progress.status = if progress.failed.is_empty() {
                PreloadState::Completed
            } else {
                PreloadState::CompletedWithErrors
            };
        }
    }

    /// Snapshot of a job's progress; unknown keys read as not started.
    pub fn get(&self, key: &str) -> PreloadProgress {
        self.lock()
            .get(key)
            .cloned()
            .unwrap_or_else(PreloadProgress::not_started)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, PreloadProgress>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let registry = PreloadRegistry::new();
        assert_eq!(registry.get("g1").status, PreloadState::NotStarted);

        assert!(registry.begin("g1", 3));
        assert!(!registry.begin("g1", 3), "double start must be rejected");

        registry.item_done("g1");
        registry.item_done("g1");
        registry.item_failed("g1", PanoId::new("p2"));
        registry.finish("g1");

        let progress = registry.get("g1");
        assert_eq!(progress.status, PreloadState::CompletedWithErrors);
        assert_eq!(progress.done, 3);
        assert_eq!(progress.failed, vec![PanoId::new("p2")]);
        assert_eq!(progress.percentage(), 100.0);
    }

    #[test]
    fn test_clean_completion() {
        let registry = PreloadRegistry::new();
        registry.begin("g1", 2);
        registry.item_done("g1");
        assert_eq!(registry.get("g1").percentage(), 50.0);
        registry.item_done("g1");
        registry.finish("g1");
        assert_eq!(registry.get("g1").status, PreloadState::Completed);
    }

    #[test]
    fn test_finished_job_can_restart() {
        let registry = PreloadRegistry::new();
        registry.begin("g1", 1);
        registry.item_done("g1");
        registry.finish("g1");
        assert!(registry.begin("g1", 1));
        assert_eq!(registry.get("g1").done, 0);
    }
}
