//! Panowalk Cache - Runtime Panorama Store
//!
//! Single source of truth at runtime: panorama metadata, assembled
//! equirectangular images, coordinate lookups, geofence whitelists, and
//! player progress. The preloader is the only writer of panorama data;
//! everything on the request path is read-only.
//!
//! Storage is one embedded SQLite database (WAL mode) plus a
//! content-addressed directory of JPEG files; the database indexes the
//! files, never the bytes.

mod db;
mod error;
mod geofence;
mod images;
mod progress;

pub use db::Cache;
pub use error::{CacheError, CacheResult};
pub use geofence::GeofenceIndex;
pub use progress::PlayerProgress;
