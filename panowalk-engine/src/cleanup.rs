//! Temp image cleanup
//!
//! Rendered frames live under `temp_images/{sessionId}/step_{n}.jpg` and
//! are disposed of according to the configured policy.

use std::path::Path;
use std::time::{Duration, SystemTime};

use panowalk_core::{CleanupPolicy, SessionId, SessionStatus};

/// Whether a terminated session's frame directory should be removed.
pub fn delete_on_session_end(policy: CleanupPolicy, status: SessionStatus) -> bool {
    match policy {
        CleanupPolicy::DeleteOnSessionEnd => true,
        CleanupPolicy::KeepOnComplete => status != SessionStatus::Completed,
        CleanupPolicy::KeepAll | CleanupPolicy::DeleteOnSend | CleanupPolicy::AutoExpire => false,
    }
}

/// Remove one session's frame directory, tolerating its absence.
pub fn remove_session_dir(temp_images_dir: &Path, session_id: SessionId) {
    let dir = temp_images_dir.join(session_id.to_string());
    if dir.is_dir() {
        if let Err(error) = std::fs::remove_dir_all(&dir) {
            tracing::warn!(path = %dir.display(), %error, "failed to remove temp image dir");
        }
    }
}

/// Delete frames older than `max_age` (the auto_expire policy). Returns
/// how many files were removed. Empty session directories are removed
/// along the way.
pub fn sweep_expired(temp_images_dir: &Path, max_age: Duration) -> std::io::Result<usize> {
    let cutoff = SystemTime::now() - max_age;
    let mut removed = 0;

    for session_dir in std::fs::read_dir(temp_images_dir)?.flatten() {
        let dir_path = session_dir.path();
        if !dir_path.is_dir() {
            continue;
        }
        for file in std::fs::read_dir(&dir_path)?.flatten() {
            let path = file.path();
            let Ok(meta) = file.metadata() else { continue };
            let Ok(modified) = meta.modified() else { continue };
            if modified < cutoff && std::fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }
        // Drop the directory once nothing is left in it.
        if std::fs::read_dir(&dir_path)?.next().is_none() {
            let _ = std::fs::remove_dir(&dir_path);
        }
    }
    Ok(removed)
}
