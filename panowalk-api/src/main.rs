//! Panowalk API Server Entry Point
//!
//! Bootstraps settings, opens the cache, wires the session engine and
//! preloader together, and starts the Axum HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use panowalk_api::{create_api_router, ApiError, ApiResult, AppState};
use panowalk_cache::{Cache, GeofenceIndex};
use panowalk_core::Settings;
use panowalk_engine::{run_monitor, SessionEngine, TaskStore};
use panowalk_preload::{
    HttpMetadataSource, HttpTilesSource, MetadataSource, Pacing, Preloader, RetryPolicy,
    TilesSource,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ApiResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Arc::new(Settings::from_env());
    if settings.upstream_api_key.is_empty() {
        tracing::warn!("UPSTREAM_API_KEY is empty; preload requests will fail against real providers");
    }

    let cache = Arc::new(Cache::open(
        settings.cache_db_path(),
        settings.panoramas_dir(),
    )?);
    let geofences = Arc::new(GeofenceIndex::load(settings.geofence_config_path())?);
    let tasks = Arc::new(TaskStore::new(settings.tasks_dir()));

    let engine = Arc::new(SessionEngine::new(
        Arc::clone(&cache),
        Arc::clone(&geofences),
        Arc::clone(&tasks),
        Arc::clone(&settings),
    )?);

    let tiles: Arc<dyn TilesSource> = Arc::new(HttpTilesSource::new(
        settings.tiles_api_base_url.clone(),
        settings.upstream_api_key.clone(),
    ));
    let metadata: Arc<dyn MetadataSource> = Arc::new(HttpMetadataSource::new(
        settings.metadata_api_base_url.clone(),
        settings.upstream_api_key.clone(),
    ));
    let preloader = Arc::new(Preloader::new(
        Arc::clone(&cache),
        tiles,
        metadata,
        RetryPolicy::new(settings.prefetch_retry_max, settings.prefetch_retry_backoff),
        Pacing::new(
            settings.prefetch_request_delay_min,
            settings.prefetch_request_delay_max,
        ),
        settings.prefetch_parallel_workers,
    ));
    let registry = preloader.registry();

    tokio::spawn(run_monitor(Arc::clone(&engine)));

    let state = AppState {
        engine,
        cache,
        geofences,
        preloader,
        registry,
        settings,
    };
    let app = create_api_router(state);

    let addr = resolve_bind_addr()?;
    tracing::info!(%addr, "starting panowalk api server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal(format!("failed to bind {}: {}", addr, e)))?;

    tokio::select! {
        result = axum::serve(listener, app) => {
            result.map_err(|e| ApiError::internal(format!("server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    Ok(())
}

fn resolve_bind_addr() -> ApiResult<SocketAddr> {
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("PORT").unwrap_or_else(|_| "8000".to_string());

    format!("{}:{}", host, port)
        .parse()
        .map_err(|e| ApiError::internal(format!("invalid bind address: {}", e)))
}
