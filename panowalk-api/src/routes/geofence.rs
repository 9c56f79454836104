//! Geofence REST routes
//!
//! Preload is also addressable by geofence name directly, for operators
//! filling the cache ahead of task assignment.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};

use panowalk_core::GeofenceName;

use crate::error::{ApiError, ApiResult};
use crate::routes::task::{start_preload, to_status};
use crate::state::AppState;
use crate::types::{GeofenceInfo, GeofenceListResponse, PreloadRequest, PreloadStatusResponse};

/// GET /api/geofences - All configured geofences with their sizes
#[utoipa::path(
    get,
    path = "/api/geofences",
    tag = "Geofences",
    responses((status = 200, description = "Configured geofences", body = GeofenceListResponse))
)]
pub async fn list_geofences(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let geofences = state
        .geofences
        .sizes()
        .into_iter()
        .map(|(name, pano_count)| GeofenceInfo {
            name: name.to_string(),
            pano_count,
        })
        .collect();
    Ok(Json(GeofenceListResponse { geofences }))
}

/// POST /api/geofences/{name}/preload - Fill the cache for a geofence
#[utoipa::path(
    post,
    path = "/api/geofences/{name}/preload",
    tag = "Geofences",
    params(("name" = String, Path, description = "Geofence name")),
    request_body = PreloadRequest,
    responses(
        (status = 200, description = "Preload started or already running", body = PreloadStatusResponse),
        (status = 404, description = "Geofence not found", body = ApiError),
    )
)]
pub async fn preload_geofence(
    State(state): State<AppState>,
    Path(name): Path<String>,
    request: Option<Json<PreloadRequest>>,
) -> ApiResult<impl IntoResponse> {
    let fence = state.geofences.get(&GeofenceName::new(name.clone()))?;
    let zoom = request
        .and_then(|Json(r)| r.zoom_level)
        .unwrap_or(state.settings.panorama_zoom_level);

    Ok(Json(start_preload(&state, &name, fence, zoom)))
}

/// POST /api/geofences/reload - Re-read the geofence config file
#[utoipa::path(
    post,
    path = "/api/geofences/reload",
    tag = "Geofences",
    responses((status = 200, description = "Config re-read", body = GeofenceListResponse))
)]
pub async fn reload_geofences(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    state.geofences.reload()?;
    list_geofences(State(state)).await
}

/// GET /api/geofences/{name}/preload/status - Progress of a geofence preload
#[utoipa::path(
    get,
    path = "/api/geofences/{name}/preload/status",
    tag = "Geofences",
    params(("name" = String, Path, description = "Geofence name")),
    responses((status = 200, description = "Preload progress", body = PreloadStatusResponse))
)]
pub async fn geofence_preload_status(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(to_status(state.registry.get(&name))))
}

pub fn create_router() -> axum::Router<AppState> {
    use axum::routing::{get, post};
    axum::Router::new()
        .route("/geofences", get(list_geofences))
        .route("/geofences/reload", post(reload_geofences))
        .route("/geofences/:name/preload", post(preload_geofence))
        .route("/geofences/:name/preload/status", get(geofence_preload_status))
}
