//! Error types for the cache layer

use panowalk_core::{GeofenceName, PanoId};

/// Result type alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors from the cache layer.
///
/// `MetadataMissing` and `ImageMissing` are not transient: at runtime they
/// mean the geofence was never fully preloaded, and callers surface them
/// instead of reaching for the network.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("cache io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt cache record: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("no metadata cached for panorama {0}")]
    MetadataMissing(PanoId),

    #[error("no image cached for panorama {pano_id} at zoom {zoom}")]
    ImageMissing { pano_id: PanoId, zoom: u8 },

    #[error("geofence {0} is not configured")]
    GeofenceMissing(GeofenceName),
}
