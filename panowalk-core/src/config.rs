//! Runtime Configuration
//!
//! All settings load from environment variables with defaults that work
//! for local development. Path layout is rooted at a single base directory
//! so tests can point the whole runtime at a temp dir.

use crate::CleanupPolicy;
use std::path::{Path, PathBuf};

// ============================================================================
// DEFAULTS
// ============================================================================

/// Default panorama zoom level (2048x1024 equirectangular).
pub const DEFAULT_ZOOM_LEVEL: u8 = 2;

/// Default expiry age for the auto_expire cleanup policy, in hours.
pub const DEFAULT_TEMP_IMAGE_EXPIRE_HOURS: u64 = 24;

/// Default rendered observation size.
pub const DEFAULT_RENDER_OUTPUT_SIZE: (u32, u32) = (1024, 768);

/// Default horizontal field of view in degrees.
pub const DEFAULT_RENDER_FOV: f64 = 90.0;

/// Default pacing delay bounds between upstream requests, in seconds.
pub const DEFAULT_PREFETCH_DELAY_MIN: f64 = 1.0;
pub const DEFAULT_PREFETCH_DELAY_MAX: f64 = 3.0;

/// Default retry budget for one upstream fetch.
pub const DEFAULT_PREFETCH_RETRY_MAX: u32 = 3;

/// Default exponential backoff base for upstream retries.
pub const DEFAULT_PREFETCH_RETRY_BACKOFF: f64 = 2.0;

/// Default preload worker pool size.
pub const DEFAULT_PREFETCH_WORKERS: usize = 4;

// ============================================================================
// SETTINGS
// ============================================================================

/// Process-wide runtime settings.
///
/// Built once at startup and shared behind an `Arc`; no module mutates it
/// afterwards.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Root under which data/, tasks/, logs/, temp_images/, config/ live.
    pub base_dir: PathBuf,

    /// Zoom level of the panoramas served and rendered at runtime.
    pub panorama_zoom_level: u8,

    /// Disposal policy for per-session rendered frames.
    pub temp_image_cleanup_policy: CleanupPolicy,

    /// Age threshold for the auto_expire policy, in hours.
    pub temp_image_expire_hours: u64,

    /// Rendered observation size (width, height).
    pub render_output_size: (u32, u32),

    /// Default horizontal field of view in degrees.
    pub render_default_fov: f64,

    /// Pacing delay bounds between upstream requests, in seconds.
    pub prefetch_request_delay_min: f64,
    pub prefetch_request_delay_max: f64,

    /// Maximum retry attempts per upstream fetch.
    pub prefetch_retry_max: u32,

    /// Exponential backoff base between retries.
    pub prefetch_retry_backoff: f64,

    /// Preload worker pool size.
    pub prefetch_parallel_workers: usize,

    /// Base URL of the upstream tiles API.
    pub tiles_api_base_url: String,

    /// Base URL of the upstream metadata API.
    pub metadata_api_base_url: String,

    /// API key for the upstream provider; empty disables preloading.
    pub upstream_api_key: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            panorama_zoom_level: DEFAULT_ZOOM_LEVEL,
            temp_image_cleanup_policy: CleanupPolicy::default(),
            temp_image_expire_hours: DEFAULT_TEMP_IMAGE_EXPIRE_HOURS,
            render_output_size: DEFAULT_RENDER_OUTPUT_SIZE,
            render_default_fov: DEFAULT_RENDER_FOV,
            prefetch_request_delay_min: DEFAULT_PREFETCH_DELAY_MIN,
            prefetch_request_delay_max: DEFAULT_PREFETCH_DELAY_MAX,
            prefetch_retry_max: DEFAULT_PREFETCH_RETRY_MAX,
            prefetch_retry_backoff: DEFAULT_PREFETCH_RETRY_BACKOFF,
            prefetch_parallel_workers: DEFAULT_PREFETCH_WORKERS,
            tiles_api_base_url: "https://tile.googleapis.com/v1".to_string(),
            metadata_api_base_url: "https://maps.googleapis.com/maps/api/streetview".to_string(),
            upstream_api_key: String::new(),
        }
    }
}

impl Settings {
    /// Load settings from environment variables.
    ///
    /// Environment variables:
    /// - `PANOWALK_BASE_DIR`: root directory (default: current directory)
    /// - `PANORAMA_ZOOM_LEVEL`: 0-5 (default: 2)
    /// - `TEMP_IMAGE_CLEANUP_POLICY`: keep_all / keep_on_complete /
    ///   delete_on_send / delete_on_session_end / auto_expire
    /// - `TEMP_IMAGE_EXPIRE_HOURS`: age for auto_expire (default: 24)
    /// - `RENDER_OUTPUT_SIZE`: "WIDTHxHEIGHT" (default: 1024x768)
    /// - `RENDER_DEFAULT_FOV`: degrees (default: 90)
    /// - `PREFETCH_REQUEST_DELAY_MIN` / `PREFETCH_REQUEST_DELAY_MAX`:
    ///   seconds (defaults: 1.0 / 3.0)
    /// - `PREFETCH_RETRY_MAX`: attempts (default: 3)
    /// - `PREFETCH_RETRY_BACKOFF`: multiplier (default: 2.0)
    /// - `PREFETCH_PARALLEL_WORKERS`: pool size (default: 4)
    /// - `TILES_API_BASE_URL` / `METADATA_API_BASE_URL`: upstream endpoints
    /// - `UPSTREAM_API_KEY`: provider key (empty disables preloading)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            base_dir: std::env::var("PANOWALK_BASE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.base_dir),
            panorama_zoom_level: env_parse("PANORAMA_ZOOM_LEVEL", defaults.panorama_zoom_level),
            temp_image_cleanup_policy: std::env::var("TEMP_IMAGE_CLEANUP_POLICY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.temp_image_cleanup_policy),
            temp_image_expire_hours: env_parse(
                "TEMP_IMAGE_EXPIRE_HOURS",
                defaults.temp_image_expire_hours,
            ),
            render_output_size: std::env::var("RENDER_OUTPUT_SIZE")
                .ok()
                .and_then(|s| parse_size(&s))
                .unwrap_or(defaults.render_output_size),
            render_default_fov: env_parse("RENDER_DEFAULT_FOV", defaults.render_default_fov),
            prefetch_request_delay_min: env_parse(
                "PREFETCH_REQUEST_DELAY_MIN",
                defaults.prefetch_request_delay_min,
            ),
            prefetch_request_delay_max: env_parse(
                "PREFETCH_REQUEST_DELAY_MAX",
                defaults.prefetch_request_delay_max,
            ),
            prefetch_retry_max: env_parse("PREFETCH_RETRY_MAX", defaults.prefetch_retry_max),
            prefetch_retry_backoff: env_parse(
                "PREFETCH_RETRY_BACKOFF",
                defaults.prefetch_retry_backoff,
            ),
            prefetch_parallel_workers: env_parse(
                "PREFETCH_PARALLEL_WORKERS",
                defaults.prefetch_parallel_workers,
            ),
            tiles_api_base_url: std::env::var("TILES_API_BASE_URL")
                .unwrap_or(defaults.tiles_api_base_url),
            metadata_api_base_url: std::env::var("METADATA_API_BASE_URL")
                .unwrap_or(defaults.metadata_api_base_url),
            upstream_api_key: std::env::var("UPSTREAM_API_KEY")
                .unwrap_or(defaults.upstream_api_key),
        }
    }

    /// Settings rooted at an explicit directory (used by tests).
    pub fn with_base_dir(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    // ========================================================================
    // Path layout
    // ========================================================================

    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join("data")
    }

    pub fn cache_db_path(&self) -> PathBuf {
        self.data_dir().join("cache.db")
    }

    pub fn panoramas_dir(&self) -> PathBuf {
        self.data_dir().join("panoramas")
    }

    pub fn tasks_dir(&self) -> PathBuf {
        self.base_dir.join("tasks")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    pub fn temp_images_dir(&self) -> PathBuf {
        self.base_dir.join("temp_images")
    }

    pub fn geofence_config_path(&self) -> PathBuf {
        self.base_dir.join("config").join("geofence_config.json")
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn parse_size(s: &str) -> Option<(u32, u32)> {
    let (w, h) = s.split_once('x')?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}
