//! Cache database handle and metadata operations
//!
//! One SQLite file holds the panorama index, metadata, coordinate lookup,
//! and player progress tables. WAL mode lets the preloader write while
//! request handlers read. All writes are `INSERT OR REPLACE`, so repeating
//! a preload is harmless.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use panowalk_core::{Link, PanoId, PanoMetadata};

use crate::error::{CacheError, CacheResult};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS panoramas (
    pano_id    TEXT NOT NULL,
    zoom       INTEGER NOT NULL,
    image_path TEXT NOT NULL,
    fetched_at TEXT NOT NULL,
    PRIMARY KEY (pano_id, zoom)
);

CREATE TABLE IF NOT EXISTS metadata (
    pano_id        TEXT PRIMARY KEY,
    lat            REAL NOT NULL,
    lng            REAL NOT NULL,
    capture_date   TEXT,
    center_heading REAL NOT NULL DEFAULT 0,
    links_json     TEXT NOT NULL,
    fetched_at     TEXT NOT NULL,
    source         TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS locations (
    pano_id TEXT PRIMARY KEY,
    lat     REAL NOT NULL,
    lng     REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS player_progress (
    player_id       TEXT NOT NULL,
    task_id         TEXT NOT NULL,
    session_id      TEXT,
    status          TEXT NOT NULL DEFAULT 'not_started',
    score           REAL,
    attempts        INTEGER NOT NULL DEFAULT 0,
    last_attempt_at TEXT,
    PRIMARY KEY (player_id, task_id)
);

CREATE INDEX IF NOT EXISTS idx_panoramas_pano_id ON panoramas(pano_id);
";

/// Handle to the runtime panorama store.
///
/// Cheap point lookups go through one connection behind a mutex; the WAL
/// journal keeps concurrent readers of the file (and the image directory,
/// whose paths are immutable once written) from ever blocking on it.
pub struct Cache {
    conn: Mutex<Connection>,
    panoramas_dir: PathBuf,
}

impl Cache {
    /// Open (creating if needed) the cache database and image directory.
    pub fn open(db_path: impl AsRef<Path>, panoramas_dir: impl AsRef<Path>) -> CacheResult<Self> {
        let panoramas_dir = panoramas_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&panoramas_dir)?;
        if let Some(parent) = db_path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
            panoramas_dir,
        })
    }

    /// Directory holding the assembled equirectangular JPEGs.
    pub fn panoramas_dir(&self) -> &Path {
        &self.panoramas_dir
    }

    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        // A poisoned lock only means another thread panicked mid-query;
        // the connection itself is still usable.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    /// True if a metadata row exists for the panorama.
    pub fn has_meta(&self, pano_id: &PanoId) -> CacheResult<bool> {
        let conn = self.conn();
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM metadata WHERE pano_id = ?1",
                params![pano_id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Fetch metadata, failing with `MetadataMissing` when absent.
    pub fn get_meta(&self, pano_id: &PanoId) -> CacheResult<PanoMetadata> {
        self.find_meta(pano_id)?
            .ok_or_else(|| CacheError::MetadataMissing(pano_id.clone()))
    }

    /// Fetch metadata if present.
    pub fn find_meta(&self, pano_id: &PanoId) -> CacheResult<Option<PanoMetadata>> {
        let conn = self.conn();
        let row = conn
            .query_row(
                "SELECT pano_id, lat, lng, capture_date, center_heading, links_json,
                        fetched_at, source
                 FROM metadata WHERE pano_id = ?1",
                params![pano_id.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, f64>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, DateTime<Utc>>(6)?,
                        row.get::<_, String>(7)?,
                    ))
                },
            )
            .optional()?;

        let Some((pano_id, lat, lng, capture_date, center_heading, links_json, fetched_at, source)) =
            row
        else {
            return Ok(None);
        };

        let links: Vec<Link> = serde_json::from_str(&links_json)?;
        Ok(Some(PanoMetadata {
            pano_id: PanoId::new(pano_id),
            lat,
            lng,
            capture_date,
            center_heading,
            links,
            fetched_at,
            source,
        }))
    }

    /// Insert or replace a metadata row, refreshing the coordinate lookup
    /// table in the same transaction.
    pub fn put_meta(&self, meta: &PanoMetadata) -> CacheResult<()> {
        let links_json = serde_json::to_string(&meta.links)?;
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO metadata
             (pano_id, lat, lng, capture_date, center_heading, links_json, fetched_at, source)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                meta.pano_id.as_str(),
                meta.lat,
                meta.lng,
                meta.capture_date,
                meta.center_heading,
                links_json,
                meta.fetched_at,
                meta.source,
            ],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO locations (pano_id, lat, lng) VALUES (?1, ?2, ?3)",
            params![meta.pano_id.as_str(), meta.lat, meta.lng],
        )?;
        tx.commit()?;
        Ok(())
    }

    // ========================================================================
    // Coordinate lookup
    // ========================================================================

    /// Coordinates of a panorama, if known.
    pub fn location(&self, pano_id: &PanoId) -> CacheResult<Option<(f64, f64)>> {
        let conn = self.conn();
        Ok(conn
            .query_row(
                "SELECT lat, lng FROM locations WHERE pano_id = ?1",
                params![pano_id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?)
    }

    /// Batch coordinate lookup; absent panoramas are simply not in the map.
    pub fn locations(&self, pano_ids: &[PanoId]) -> CacheResult<HashMap<PanoId, (f64, f64)>> {
        let mut out = HashMap::with_capacity(pano_ids.len());
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT lat, lng FROM locations WHERE pano_id = ?1")?;
        for pano_id in pano_ids {
            let loc = stmt
                .query_row(params![pano_id.as_str()], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })
                .optional()?;
            if let Some(loc) = loc {
                out.insert(pano_id.clone(), loc);
            }
        }
        Ok(out)
    }
}
