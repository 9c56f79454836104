//! Panorama image index
//!
//! Image bytes live as `{panoId}_z{N}.jpg` files under the panoramas
//! directory; the database only indexes paths. Files are written with the
//! temp+rename pattern so a crash mid-write never leaves a half image
//! behind a committed row.

use std::path::PathBuf;

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use panowalk_core::PanoId;

use crate::db::Cache;
use crate::error::{CacheError, CacheResult};

impl Cache {
    /// File name convention for an assembled panorama.
    pub fn image_file_name(pano_id: &PanoId, zoom: u8) -> String {
        format!("{}_z{}.jpg", pano_id, zoom)
    }

    /// True if an image row exists and its file is still on disk.
    pub fn has_image(&self, pano_id: &PanoId, zoom: u8) -> CacheResult<bool> {
        Ok(self.find_image_path(pano_id, zoom)?.is_some())
    }

    /// Path of a cached image, failing with `ImageMissing` when absent.
    pub fn image_path(&self, pano_id: &PanoId, zoom: u8) -> CacheResult<PathBuf> {
        self.find_image_path(pano_id, zoom)?
            .ok_or_else(|| CacheError::ImageMissing {
                pano_id: pano_id.clone(),
                zoom,
            })
    }

    /// Path of a cached image if the row exists and the file is readable.
    ///
    /// A row whose file has vanished is reported and treated as a miss;
    /// the runtime never repairs the cache.
    pub fn find_image_path(&self, pano_id: &PanoId, zoom: u8) -> CacheResult<Option<PathBuf>> {
        let conn = self.conn();
        let path: Option<String> = conn
            .query_row(
                "SELECT image_path FROM panoramas WHERE pano_id = ?1 AND zoom = ?2",
                params![pano_id.as_str(), zoom],
                |row| row.get(0),
            )
            .optional()?;
        drop(conn);

        let Some(path) = path else { return Ok(None) };
        let path = PathBuf::from(path);
        if !path.is_file() {
            tracing::warn!(pano_id = %pano_id, zoom, path = %path.display(),
                "cached image file is missing on disk, treating as cache miss");
            return Ok(None);
        }
        Ok(Some(path))
    }

    /// Read the raw bytes of a cached image.
    pub fn image_bytes(&self, pano_id: &PanoId, zoom: u8) -> CacheResult<Vec<u8>> {
        let path = self.image_path(pano_id, zoom)?;
        Ok(std::fs::read(path)?)
    }

    /// Write an assembled equirectangular JPEG and index it.
    ///
    /// Atomic on the file level (temp + rename) and idempotent on the row
    /// level (`INSERT OR REPLACE`).
    pub fn put_image(&self, pano_id: &PanoId, zoom: u8, bytes: &[u8]) -> CacheResult<PathBuf> {
        let path = self.panoramas_dir().join(Self::image_file_name(pano_id, zoom));
        let tmp = path.with_extension("jpg.tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &path)?;

        let conn = self.conn();
        conn.execute(
            "INSERT OR REPLACE INTO panoramas (pano_id, zoom, image_path, fetched_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                pano_id.as_str(),
                zoom,
                path.to_string_lossy().into_owned(),
                Utc::now(),
            ],
        )?;
        Ok(path)
    }
}
