//! Persisted volume state
//!
//! `volume.state` is a JSON array of `{ "name": ..., "volume": ... }` entries
//! keyed by object name. Ids change between server restarts, names do not.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::Result;
use crate::persist;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeStateEntry {
    pub name: String,
    pub volume: f32,
}

/// Name to volume, as stored on disk
pub type VolumeState = BTreeMap<String, f32>;

pub struct VolumeStateFile {
    path: PathBuf,
    /// Serializes read-modify-write cycles
    lock: Mutex<()>,
}

impl VolumeStateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current entries; a missing file is empty
    pub fn load(&self) -> Result<VolumeState> {
        let _guard = self.lock.lock();
        self.read()
    }

    pub fn get(&self, name: &str) -> Result<Option<f32>> {
        Ok(self.load()?.get(name).copied())
    }

    /// Store volumes by name, keeping every other entry
    pub fn save(&self, updates: impl IntoIterator<Item = (String, f32)>) -> Result<usize> {
        let _guard = self.lock.lock();
        let mut state = self.read()?;
        let mut count = 0;
        for (name, volume) in updates {
            debug!("Volume state: {} = {:.3}", name, volume);
            state.insert(name, volume);
            count += 1;
        }

        let entries: Vec<VolumeStateEntry> = state
            .into_iter()
            .map(|(name, volume)| VolumeStateEntry { name, volume })
            .collect();
        persist::write_json_atomic(&self.path, &entries)?;
        info!("Saved {} volume(s) to {}", count, self.path.display());
        Ok(count)
    }

    fn read(&self) -> Result<VolumeState> {
        let entries: Vec<VolumeStateEntry> = persist::read_json(&self.path)?.unwrap_or_default();
        Ok(entries.into_iter().map(|e| (e.name, e.volume)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_preserves_other_entries() {
        let dir = TempDir::new().unwrap();
        let file = VolumeStateFile::new(dir.path().join("volume.state"));
        assert!(file.load().unwrap().is_empty());

        file.save([("a".to_string(), 0.2), ("b".to_string(), 0.4)]).unwrap();
        file.save([("a".to_string(), 0.6)]).unwrap();

        let state = file.load().unwrap();
        assert_eq!(state.len(), 2);
        assert_eq!(state["a"], 0.6);
        assert_eq!(file.get("b").unwrap(), Some(0.4));
        assert_eq!(file.get("c").unwrap(), None);
    }

    #[test]
    fn test_on_disk_format() {
        let dir = TempDir::new().unwrap();
        let file = VolumeStateFile::new(dir.path().join("volume.state"));
        file.save([("sink".to_string(), 0.5)]).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(file.path()).unwrap()).unwrap();
        assert_eq!(raw, serde_json::json!([{"name": "sink", "volume": 0.5}]));
    }
}
