//! Media routes
//!
//! Rendered frames and cached panoramas are served by handlers rather than
//! a static-file layer so the `delete_on_send` cleanup policy can drop a
//! frame right after it has been delivered.

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};

use panowalk_core::{CleanupPolicy, SessionId};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// GET /temp_images/{session_id}/{file} - One rendered observation frame
pub async fn temp_image(
    State(state): State<AppState>,
    Path((session_id, file)): Path<(String, String)>,
) -> ApiResult<Response> {
    // Session directories are uuid-named; anything else is no file of ours.
    if session_id.parse::<SessionId>().is_err() || !safe_file_name(&file) {
        return Err(ApiError::not_found("no such image"));
    }

    let path = state
        .settings
        .temp_images_dir()
        .join(&session_id)
        .join(&file);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| ApiError::not_found("no such image"))?;

    if state.settings.temp_image_cleanup_policy == CleanupPolicy::DeleteOnSend {
        if let Err(error) = tokio::fs::remove_file(&path).await {
            tracing::warn!(path = %path.display(), %error, "delete_on_send cleanup failed");
        }
    }

    Ok(jpeg_response(bytes))
}

/// GET /data/panoramas/{file} - Raw cached equirectangular panorama
pub async fn panorama_image(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> ApiResult<Response> {
    if !safe_file_name(&file) {
        return Err(ApiError::not_found("no such panorama"));
    }

    let path = state.settings.panoramas_dir().join(&file);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| ApiError::not_found("no such panorama"))?;
    Ok(jpeg_response(bytes))
}

fn jpeg_response(bytes: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, "image/jpeg")], bytes).into_response()
}

/// Reject anything that could walk out of the serving directory.
fn safe_file_name(name: &str) -> bool {
    !name.is_empty()
        && name.ends_with(".jpg")
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && !name.contains("..")
}
