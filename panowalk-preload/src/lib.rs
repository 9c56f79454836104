//! Panowalk Preload - Offline Cache Fill
//!
//! Walks a geofence and makes the cache complete for it: a metadata row
//! and an assembled equirectangular image for every panorama. This is the
//! only component that talks to upstream providers; the runtime request
//! path is strictly cache-read-only.
//!
//! Fetches are paced with a jittered delay, retried with exponential
//! backoff on rate limiting, and fanned out over a bounded worker pool.
//! Per-panorama failures are recorded and skipped, never fatal for the
//! job.

mod error;
mod job;
mod progress;
mod retry;
mod source;
mod stitch;

pub use error::{PreloadError, PreloadResult};
pub use job::Preloader;
pub use progress::{PreloadProgress, PreloadRegistry};
pub use retry::{Pacing, RetryPolicy};
pub use source::{HttpMetadataSource, HttpTilesSource, MetadataSource, TilesSource};
pub use stitch::{stitch_tiles, tile_grid, TILE_SIZE};
