//! Error types for the session engine

use panowalk_cache::CacheError;
use panowalk_core::{GeofenceName, PanoId, SessionId, TaskId};
use panowalk_render::RenderError;

pub type EngineResult<T> = Result<T, EngineError>;

/// Errors from session transitions.
///
/// Each variant corresponds to one `error_kind` on the wire. Session-local
/// errors (`ActionInvalid`, `RotationInvalid`, `SessionTerminated`) leave
/// session state untouched.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("task {0} not found")]
    TaskNotFound(TaskId),

    #[error("bad task: {0}")]
    BadTask(String),

    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    #[error("session {0} is already terminal")]
    SessionTerminated(SessionId),

    #[error("invalid action: {0}")]
    ActionInvalid(String),

    #[error("invalid rotation: {0}")]
    RotationInvalid(String),

    #[error("panorama {pano_id} is outside geofence {geofence}")]
    OutOfGeofence {
        pano_id: PanoId,
        geofence: GeofenceName,
    },

    #[error("metadata for {0} is not cached; run preload for this geofence first")]
    CacheMissMeta(PanoId),

    #[error("image for {pano_id} at zoom {zoom} is not cached; run preload for this geofence first")]
    CacheMissImage { pano_id: PanoId, zoom: u8 },

    #[error("step log write failed: {0}")]
    LogWriteFailed(String),

    #[error("internal engine error: {0}")]
    Internal(String),
}

impl From<CacheError> for EngineError {
    fn from(error: CacheError) -> Self {
        match error {
            CacheError::MetadataMissing(pano_id) => EngineError::CacheMissMeta(pano_id),
            CacheError::ImageMissing { pano_id, zoom } => {
                EngineError::CacheMissImage { pano_id, zoom }
            }
            CacheError::GeofenceMissing(name) => {
                EngineError::BadTask(format!("geofence {} is not configured", name))
            }
            other => EngineError::Internal(other.to_string()),
        }
    }
}

impl EngineError {
    /// Fold a renderer failure into the engine taxonomy. A panorama that
    /// will not decode is a corrupt cache entry and reads as a miss; bad
    /// camera parameters are a rotation problem.
    pub fn from_render(error: RenderError, pano_id: &PanoId, zoom: u8) -> Self {
        match error {
            RenderError::Decode(source) => {
                tracing::error!(pano_id = %pano_id, zoom, %source,
                    "cached panorama failed to decode, treating as cache miss");
                EngineError::CacheMissImage {
                    pano_id: pano_id.clone(),
                    zoom,
                }
            }
            RenderError::PitchOutOfRange(v) => {
                EngineError::RotationInvalid(format!("pitch {} out of range", v))
            }
            RenderError::FovOutOfRange(v) => {
                EngineError::RotationInvalid(format!("fov {} out of range", v))
            }
            other => EngineError::Internal(other.to_string()),
        }
    }
}
