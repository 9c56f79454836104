//! Error Types for the Panowalk API
//!
//! One `ApiError { error_kind, detail }` envelope for every failure, with
//! the kind drawn from the benchmark's error taxonomy. Engine and cache
//! errors convert into it; `IntoResponse` picks the HTTP status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use panowalk_cache::CacheError;
use panowalk_engine::EngineError;

// ============================================================================
// ERROR KIND ENUM
// ============================================================================

/// Wire-level error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Task JSON missing required fields, or spawn outside its geofence.
    BadTask,

    /// A session escaped its geofence; an invariant violation.
    OutOfGeofence,

    /// Unknown action type or unknown move id; state unchanged.
    ActionInvalid,

    /// Heading, pitch, or fov out of range; state unchanged.
    RotationInvalid,

    /// Action arrived on a terminal session.
    SessionTerminated,

    /// Panorama metadata absent from the cache; run preload first.
    CacheMissMeta,

    /// Panorama image absent from the cache; run preload first.
    CacheMissImage,

    /// Upstream fetch failed after retry exhaustion.
    PreloadSourceUnavailable,

    /// Upstream rate limit hit.
    RateLimited,

    /// Step log could not be made durable; the action was aborted.
    LogWriteFailed,

    /// Requested task, session, or geofence does not exist.
    NotFound,

    /// Anything else.
    Internal,
}

impl ErrorKind {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorKind::BadTask
            | ErrorKind::ActionInvalid
            | ErrorKind::RotationInvalid => StatusCode::BAD_REQUEST,

            ErrorKind::NotFound => StatusCode::NOT_FOUND,

            ErrorKind::SessionTerminated
            | ErrorKind::CacheMissMeta
            | ErrorKind::CacheMissImage => StatusCode::CONFLICT,

            ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,

            ErrorKind::PreloadSourceUnavailable => StatusCode::BAD_GATEWAY,

            ErrorKind::OutOfGeofence
            | ErrorKind::LogWriteFailed
            | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The wire form (snake_case) is the canonical spelling.
        let s = serde_json::to_string(self).unwrap_or_default();
        f.write_str(s.trim_matches('"'))
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response returned by every endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ApiError {
    pub error_kind: ErrorKind,
    pub detail: String,
}

impl ApiError {
    pub fn new(error_kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            error_kind,
            detail: detail.into(),
        }
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, detail)
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, detail)
    }

    pub fn status_code(&self) -> StatusCode {
        self.error_kind.status_code()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_kind, self.detail)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error_kind = %self.error_kind, detail = %self.detail, "request failed");
        }
        (status, Json(self)).into_response()
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<EngineError> for ApiError {
    fn from(error: EngineError) -> Self {
        let detail = error.to_string();
        let kind = match error {
            EngineError::TaskNotFound(_) | EngineError::SessionNotFound(_) => ErrorKind::NotFound,
            EngineError::BadTask(_) => ErrorKind::BadTask,
            EngineError::SessionTerminated(_) => ErrorKind::SessionTerminated,
            EngineError::ActionInvalid(_) => ErrorKind::ActionInvalid,
            EngineError::RotationInvalid(_) => ErrorKind::RotationInvalid,
            EngineError::OutOfGeofence { .. } => ErrorKind::OutOfGeofence,
            EngineError::CacheMissMeta(_) => ErrorKind::CacheMissMeta,
            EngineError::CacheMissImage { .. } => ErrorKind::CacheMissImage,
            EngineError::LogWriteFailed(_) => ErrorKind::LogWriteFailed,
            EngineError::Internal(_) => ErrorKind::Internal,
        };
        Self::new(kind, detail)
    }
}

impl From<CacheError> for ApiError {
    fn from(error: CacheError) -> Self {
        let detail = error.to_string();
        let kind = match error {
            CacheError::MetadataMissing(_) => ErrorKind::CacheMissMeta,
            CacheError::ImageMissing { .. } => ErrorKind::CacheMissImage,
            CacheError::GeofenceMissing(_) => ErrorKind::NotFound,
            _ => ErrorKind::Internal,
        };
        Self::new(kind, detail)
    }
}

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Run a synchronous engine transition on the blocking pool.
pub async fn run_engine<T, F>(f: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, EngineError> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(join_error) => Err(ApiError::internal(format!(
            "engine task failed: {}",
            join_error
        ))),
    }
}
