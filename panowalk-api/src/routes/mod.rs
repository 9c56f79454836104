//! REST API Routes Module
//!
//! One module per resource, each exposing `create_router()`; this module
//! composes them under `/api`, mounts the media handlers at their
//! root-level paths, and applies CORS.

pub mod geofence;
pub mod health;
pub mod media;
pub mod player;
pub mod session;
pub mod task;

use axum::{response::IntoResponse, routing::get, Json, Router};
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;

use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Handler for /openapi.json.
async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

/// Build the full application router.
pub fn create_api_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .merge(session::create_router())
        .merge(task::create_router())
        .merge(geofence::create_router())
        .merge(player::create_router())
        .merge(health::create_router());

    Router::new()
        .nest("/api", api)
        .route("/temp_images/:session_id/:file", get(media::temp_image))
        .route("/data/panoramas/:file", get(media::panorama_image))
        .route("/openapi.json", get(openapi_json))
        .layer(cors)
        .with_state(state)
}
