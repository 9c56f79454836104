//! Health check route

use axum::{extract::State, response::IntoResponse, Json};

use crate::error::ApiResult;
use crate::state::AppState;
use crate::types::HealthResponse;

/// GET /api/health - Liveness probe
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Health",
    responses((status = 200, description = "Server is up", body = HealthResponse))
)]
pub async fn health(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        active_geofences: state.geofences.sizes().len(),
    }))
}

pub fn create_router() -> axum::Router<AppState> {
    use axum::routing::get;
    axum::Router::new().route("/health", get(health))
}
