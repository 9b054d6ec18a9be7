//! Store snapshot persistence (JSON)

use crate::{models::StoreSnapshot, Result};
use std::path::PathBuf;

pub struct SnapshotStorage {
    data_dir: PathBuf,
}

impl SnapshotStorage {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join("store.json")
    }

    /// Load the last snapshot; a missing file is an empty store.
    pub fn load(&self) -> Result<StoreSnapshot> {
        let path = self.snapshot_path();

        if !path.exists() {
            return Ok(StoreSnapshot::default());
        }

        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(StoreSnapshot::default());
        }

        let snapshot: StoreSnapshot = serde_json::from_str(&content)?;
        Ok(snapshot)
    }

    /// Write the snapshot through a temp file so a crash never leaves half a file.
    pub fn save(&self, snapshot: &StoreSnapshot) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;

        let tmp_path = self.data_dir.join("store.json.tmp");
        let content = serde_json::to_string_pretty(snapshot)?;
        std::fs::write(&tmp_path, content)?;
        std::fs::rename(tmp_path, self.snapshot_path())?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{new_roster_key, RosterEntry, TimerRecord};
    use tempfile::TempDir;

    #[test]
    fn test_missing_snapshot_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let storage = SnapshotStorage::new(temp_dir.path().to_path_buf());

        let snapshot = storage.load().unwrap();
        assert!(snapshot.timer.is_none());
        assert!(snapshot.roster.is_empty());
        assert_eq!(snapshot.timer_or_default(), TimerRecord::zero());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let storage = SnapshotStorage::new(temp_dir.path().to_path_buf());

        let mut snapshot = StoreSnapshot {
            timer: Some(TimerRecord {
                running: true,
                start_time: 1_700_000_000_000,
                elapsed: 12_000,
            }),
            ..StoreSnapshot::default()
        };
        let key = new_roster_key();
        snapshot
            .roster
            .insert(key.clone(), RosterEntry::new("Lando", "4", "McLaren").unwrap());
        storage.save(&snapshot).unwrap();

        let loaded = storage.load().unwrap();
        assert_eq!(loaded.timer, snapshot.timer);
        assert_eq!(loaded.roster[&key].name, "Lando");
        assert!(!temp_dir.path().join("store.json.tmp").exists());
    }
}
