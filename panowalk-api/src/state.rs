//! Shared application state for Axum routers.

use std::sync::Arc;

use panowalk_cache::{Cache, GeofenceIndex};
use panowalk_core::Settings;
use panowalk_engine::SessionEngine;
use panowalk_preload::{PreloadRegistry, Preloader};

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SessionEngine>,
    pub cache: Arc<Cache>,
    pub geofences: Arc<GeofenceIndex>,
    pub preloader: Arc<Preloader>,
    pub registry: PreloadRegistry,
    pub settings: Arc<Settings>,
}

impl_from_ref!(Arc<SessionEngine>, engine);
impl_from_ref!(Arc<Cache>, cache);
impl_from_ref!(Arc<GeofenceIndex>, geofences);
impl_from_ref!(Arc<Preloader>, preloader);
impl_from_ref!(PreloadRegistry, registry);
impl_from_ref!(Arc<Settings>, settings);
