//! Preload job execution
//!
//! A job walks one geofence and fills the cache for it. The cache is
//! compared first so only missing work is enqueued; a fully cached
//! geofence finishes without a single upstream request. A fixed pool of
//! workers drains the queue; each worker fetches under pacing + retry and
//! records per-item failures without stopping the job.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use tokio::task::JoinSet;

use panowalk_cache::Cache;
use panowalk_core::PanoId;

use crate::error::PreloadResult;
use crate::progress::{PreloadProgress, PreloadRegistry};
use crate::retry::{fetch_with_retry, Pacing, RetryPolicy};
use crate::source::{MetadataSource, TilesSource};
use crate::stitch::{stitch_tiles, tile_grid};

struct WorkItem {
    pano_id: PanoId,
    needs_meta: bool,
    needs_image: bool,
}

/// Bounded-concurrency cache filler for geofences.
pub struct Preloader {
    cache: Arc<Cache>,
    tiles: Arc<dyn TilesSource>,
    metadata: Arc<dyn MetadataSource>,
    policy: RetryPolicy,
    pacing: Pacing,
    workers: usize,
    registry: PreloadRegistry,
}

impl Preloader {
    pub fn new(
        cache: Arc<Cache>,
        tiles: Arc<dyn TilesSource>,
        metadata: Arc<dyn MetadataSource>,
        policy: RetryPolicy,
        pacing: Pacing,
        workers: usize,
    ) -> Self {
        Self {
            cache,
            tiles,
            metadata,
            policy,
            pacing,
            workers: workers.max(1),
            registry: PreloadRegistry::new(),
        }
    }

    /// The shared progress registry, for the HTTP API.
    pub fn registry(&self) -> PreloadRegistry {
        self.registry.clone()
    }

    /// Run a preload job to completion and return the final progress.
    ///
    /// `key` names the job in the registry (a geofence or task id). If a
    /// job under the same key is already running, nothing starts and the
    /// running job's progress is returned.
    pub async fn preload(&self, key: &str, pano_ids: &[PanoId], zoom: u8) -> PreloadProgress {
        if !self.registry.begin(key, pano_ids.len()) {
            return self.registry.get(key);
        }

        let mut queue = VecDeque::new();
        for pano_id in pano_ids {
            let needs_meta = match self.cache.has_meta(pano_id) {
                Ok(has) => !has,
                Err(error) => {
                    tracing::error!(pano_id = %pano_id, %error, "cache probe failed");
                    self.registry.item_failed(key, pano_id.clone());
                    continue;
                }
            };
            let needs_image = match self.cache.has_image(pano_id, zoom) {
                Ok(has) => !has,
                Err(error) => {
                    tracing::error!(pano_id = %pano_id, %error, "cache probe failed");
                    self.registry.item_failed(key, pano_id.clone());
                    continue;
                }
            };

            if !needs_meta && !needs_image {
                self.registry.item_done(key);
            } else {
                queue.push_back(WorkItem {
                    pano_id: pano_id.clone(),
                    needs_meta,
                    needs_image,
                });
            }
        }

        let pending = queue.len();
        tracing::info!(key, total = pano_ids.len(), pending, zoom, "preload started");

        if pending > 0 {
            let queue = Arc::new(Mutex::new(queue));
            let mut workers = JoinSet::new();
            for _ in 0..self.workers.min(pending) {
                let queue = Arc::clone(&queue);
                let cache = Arc::clone(&self.cache);
                let tiles = Arc::clone(&self.tiles);
                let metadata = Arc::clone(&self.metadata);
                let registry = self.registry.clone();
                let policy = self.policy;
                let pacing = self.pacing;
                let key = key.to_string();

                workers.spawn(async move {
                    loop {
                        let item = {
                            let mut queue = queue.lock().unwrap_or_else(|e| e.into_inner());
                            queue.pop_front()
                        };
                        let Some(item) = item else { break };

                        let pano_id = item.pano_id.clone();
                        match process_item(&cache, &*tiles, &*metadata, &policy, &pacing, item, zoom)
                            .await
                        {
                            Ok(()) => registry.item_done(&key),
                            Err(error) => {
                                tracing::warn!(pano_id = %pano_id, %error,
                                    "preload item failed, continuing");
                                registry.item_failed(&key, pano_id);
                            }
                        }
                    }
                });
            }
            while workers.join_next().await.is_some() {}
        }

        self.registry.finish(key);
        let progress = self.registry.get(key);
        tracing::info!(key, status = %progress.status, done = progress.done,
            failed = progress.failed.len(), "preload finished");
        progress
    }
}

async fn process_item(
    cache: &Cache,
    tiles: &dyn TilesSource,
    metadata: &dyn MetadataSource,
    policy: &RetryPolicy,
    pacing: &Pacing,
    item: WorkItem,
    zoom: u8,
) -> PreloadResult<()> {
    let pano_id = &item.pano_id;

    if item.needs_meta {
        let meta = fetch_with_retry(policy, pacing, || metadata.fetch_metadata(pano_id)).await?;
        cache.put_meta(&meta)?;
    }

    if item.needs_image {
        let (cols, rows) = tile_grid(zoom);
        let mut grid = HashMap::new();
        for y in 0..rows {
            for x in 0..cols {
                let bytes =
                    fetch_with_retry(policy, pacing, || tiles.fetch_tile(pano_id, zoom, x, y))
                        .await?;
                grid.insert((x, y), bytes);
            }
        }
        let jpeg = stitch_tiles(&grid, zoom)?;
        cache.put_image(pano_id, zoom, &jpeg)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PreloadError;
    use async_trait::async_trait;
    use chrono::Utc;
    use image::codecs::jpeg::JpegEncoder;
    use image::RgbImage;
    use panowalk_core::PanoMetadata;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct MockTiles {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TilesSource for MockTiles {
        async fn fetch_tile(
            &self,
            _pano_id: &PanoId,
            _zoom: u8,
            _x: u32,
            _y: u32,
        ) -> PreloadResult<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let img = RgbImage::from_pixel(8, 8, image::Rgb([120, 130, 140]));
            let mut bytes = Vec::new();
            let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut bytes), 90);
            img.write_with_encoder(encoder).unwrap();
            Ok(bytes)
        }
    }

    struct MockMetadata {
        calls: AtomicUsize,
        fail_for: Option<PanoId>,
    }

    #[async_trait]
    impl MetadataSource for MockMetadata {
        async fn fetch_metadata(&self, pano_id: &PanoId) -> PreloadResult<PanoMetadata> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_for.as_ref() == Some(pano_id) {
                return Err(PreloadError::Status(404));
            }
            Ok(PanoMetadata {
                pano_id: pano_id.clone(),
                lat: 35.0,
                lng: 139.0,
                capture_date: None,
                center_heading: 0.0,
                links: Vec::new(),
                fetched_at: Utc::now(),
                source: "mock".to_string(),
            })
        }
    }

    fn preloader(
        dir: &TempDir,
        fail_for: Option<PanoId>,
    ) -> (Preloader, Arc<MockTiles>, Arc<MockMetadata>) {
        let cache = Arc::new(
            Cache::open(dir.path().join("cache.db"), dir.path().join("panoramas")).unwrap(),
        );
        let tiles = Arc::new(MockTiles {
            calls: AtomicUsize::new(0),
        });
        let metadata = Arc::new(MockMetadata {
            calls: AtomicUsize::new(0),
            fail_for,
        });
        let preloader = Preloader::new(
            cache,
            Arc::clone(&tiles) as Arc<dyn TilesSource>,
            Arc::clone(&metadata) as Arc<dyn MetadataSource>,
            RetryPolicy::new(1, 2.0),
            Pacing::none(),
            2,
        );
        (preloader, tiles, metadata)
    }

    fn panos(ids: &[&str]) -> Vec<PanoId> {
        ids.iter().map(|s| PanoId::new(*s)).collect()
    }

    #[tokio::test]
    async fn test_preload_fills_cache() {
        let dir = TempDir::new().unwrap();
        let (preloader, tiles, metadata) = preloader(&dir, None);
        let ids = panos(&["p0", "p1"]);

        let progress = preloader.preload("g1", &ids, 0).await;
        assert_eq!(progress.status.as_str(), "completed");
        assert_eq!(progress.done, 2);
        assert!(progress.failed.is_empty());

        // Zoom 0 is a single tile per panorama.
        assert_eq!(tiles.calls.load(Ordering::SeqCst), 2);
        assert_eq!(metadata.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_second_preload_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let (preloader, tiles, metadata) = preloader(&dir, None);
        let ids = panos(&["p0", "p1"]);

        preloader.preload("g1", &ids, 0).await;
        let before_tiles = tiles.calls.load(Ordering::SeqCst);
        let before_meta = metadata.calls.load(Ordering::SeqCst);

        let progress = preloader.preload("g1", &ids, 0).await;
        assert_eq!(progress.status.as_str(), "completed");
        assert_eq!(progress.percentage(), 100.0);
        assert_eq!(tiles.calls.load(Ordering::SeqCst), before_tiles);
        assert_eq!(metadata.calls.load(Ordering::SeqCst), before_meta);
    }

    #[tokio::test]
    async fn test_failures_are_recorded_not_fatal() {
        let dir = TempDir::new().unwrap();
        let (preloader, _tiles, _metadata) = preloader(&dir, Some(PanoId::new("bad")));
        let ids = panos(&["p0", "bad", "p1"]);

        let progress = preloader.preload("g1", &ids, 0).await;
        assert_eq!(progress.status.as_str(), "completed_with_errors");
        assert_eq!(progress.done, 3);
        assert_eq!(progress.failed, vec![PanoId::new("bad")]);
    }
}
