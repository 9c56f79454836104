//! Geofence whitelists
//!
//! A geofence is a named set of panorama ids that bounds where a task
//! takes place. The config file maps name -> array of ids and is loaded
//! once at startup; `reload` re-reads it on demand.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use panowalk_core::{GeofenceName, PanoId};

use crate::error::{CacheError, CacheResult};

/// In-memory index of geofence whitelists.
pub struct GeofenceIndex {
    config_path: PathBuf,
    fences: RwLock<HashMap<GeofenceName, HashSet<PanoId>>>,
}

impl GeofenceIndex {
    /// Load the index from `config/geofence_config.json`.
    ///
    /// A missing file yields an empty index rather than an error so a
    /// fresh checkout can boot; every lookup against it will fail with
    /// `GeofenceMissing`, which is the honest answer.
    pub fn load(config_path: impl AsRef<Path>) -> CacheResult<Self> {
        let index = Self {
            config_path: config_path.as_ref().to_path_buf(),
            fences: RwLock::new(HashMap::new()),
        };
        index.reload()?;
        Ok(index)
    }

    /// Re-read the config file, replacing the in-memory index.
    pub fn reload(&self) -> CacheResult<()> {
        let fences = if self.config_path.is_file() {
            let raw = std::fs::read_to_string(&self.config_path)?;
            let parsed: HashMap<String, Vec<String>> = serde_json::from_str(&raw)?;
            parsed
                .into_iter()
                .map(|(name, ids)| {
                    (
                        GeofenceName::new(name),
                        ids.into_iter().map(PanoId::new).collect(),
                    )
                })
                .collect()
        } else {
            tracing::warn!(path = %self.config_path.display(), "geofence config file not found");
            HashMap::new()
        };

        *self.write() = fences;
        Ok(())
    }

    /// The whitelist for a named geofence.
    pub fn get(&self, name: &GeofenceName) -> CacheResult<HashSet<PanoId>> {
        self.read()
            .get(name)
            .cloned()
            .ok_or_else(|| CacheError::GeofenceMissing(name.clone()))
    }

    /// True if the named geofence exists and contains the panorama.
    pub fn contains(&self, name: &GeofenceName, pano_id: &PanoId) -> bool {
        self.read()
            .get(name)
            .map(|set| set.contains(pano_id))
            .unwrap_or(false)
    }

    /// All geofence names with their whitelist sizes.
    pub fn sizes(&self) -> Vec<(GeofenceName, usize)> {
        let mut out: Vec<_> = self
            .read()
            .iter()
            .map(|(name, set)| (name.clone(), set.len()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<GeofenceName, HashSet<PanoId>>> {
        self.fences.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<GeofenceName, HashSet<PanoId>>> {
        self.fences.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, json: &str) -> PathBuf {
        let path = dir.path().join("geofence_config.json");
        std::fs::write(&path, json).unwrap();
        path
    }

    #[test]
    fn test_load_and_lookup() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, r#"{"list001": ["p0", "p1", "p2"], "list002": ["p9"]}"#);
        let index = GeofenceIndex::load(path).unwrap();

        let g = index.get(&GeofenceName::new("list001")).unwrap();
        assert_eq!(g.len(), 3);
        assert!(g.contains(&PanoId::new("p1")));

        assert!(index.contains(&GeofenceName::new("list002"), &PanoId::new("p9")));
        assert!(!index.contains(&GeofenceName::new("list002"), &PanoId::new("p0")));
    }

    #[test]
    fn test_unknown_geofence_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "{}");
        let index = GeofenceIndex::load(path).unwrap();
        assert!(matches!(
            index.get(&GeofenceName::new("nope")).unwrap_err(),
            CacheError::GeofenceMissing(_)
        ));
    }

    #[test]
    fn test_missing_file_yields_empty_index() {
        let dir = TempDir::new().unwrap();
        let index = GeofenceIndex::load(dir.path().join("absent.json")).unwrap();
        assert!(index.sizes().is_empty());
    }

    #[test]
    fn test_reload_picks_up_changes() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, r#"{"a": ["p0"]}"#);
        let index = GeofenceIndex::load(&path).unwrap();
        assert_eq!(index.sizes(), vec![(GeofenceName::new("a"), 1)]);

        std::fs::write(&path, r#"{"a": ["p0", "p1"], "b": []}"#).unwrap();
        index.reload().unwrap();
        assert_eq!(
            index.sizes(),
            vec![(GeofenceName::new("a"), 2), (GeofenceName::new("b"), 0)]
        );
    }
}
