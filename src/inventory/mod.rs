//! Named per-player inventory snapshots ("profiles").
//!
//! At most one snapshot exists per (player, profile). Saving overwrites,
//! loading applies the snapshot and leaves it stored, clearing removes it.
//! Snapshots live in a single JSON document that is rewritten atomically on
//! every change.

use crate::core::{PlayerId, ProfileError};
use crate::interface::Platform;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

pub const MAIN_PROFILE: &str = "main";
pub const AFTERLIFE_PROFILE: &str = "afterlife";

/// One inventory slot's item, opaque to the core apart from type and count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemStack {
    pub material: String,
    pub amount: u32,
    /// Host-serialized item metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ItemStack {
    pub fn new(material: impl Into<String>, amount: u32) -> Self {
        Self {
            material: material.into(),
            amount,
            data: None,
        }
    }
}

/// Held items of one player.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    pub contents: Vec<Option<ItemStack>>,
    #[serde(default)]
    pub armor: Vec<Option<ItemStack>>,
    #[serde(default)]
    pub offhand: Option<ItemStack>,
}

impl Inventory {
    pub fn is_empty(&self) -> bool {
        self.contents.iter().all(Option::is_none)
            && self.armor.iter().all(Option::is_none)
            && self.offhand.is_none()
    }
}

type Snapshots = BTreeMap<PlayerId, BTreeMap<String, Inventory>>;

/// File-backed store of inventory profiles.
pub struct ProfileStore {
    path: PathBuf,
    snapshots: Mutex<Snapshots>,
}

impl ProfileStore {
    /// Opens (or starts) the profile file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ProfileError> {
        let path = path.as_ref().to_path_buf();
        let snapshots = if path.exists() {
            let data = std::fs::read(&path)
                .map_err(|e| ProfileError::Io(format!("{}: {}", path.display(), e)))?;
            if data.is_empty() {
                Snapshots::new()
            } else {
                serde_json::from_slice(&data).map_err(|e| ProfileError::Serde(e.to_string()))?
            }
        } else {
            Snapshots::new()
        };

        Ok(Self {
            path,
            snapshots: Mutex::new(snapshots),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshots the player's held items under `profile`, replacing any
    /// previous snapshot. Returns `false` when the player is not reachable.
    pub fn save_profile(
        &self,
        platform: &dyn Platform,
        id: PlayerId,
        profile: &str,
    ) -> Result<bool, ProfileError> {
        let Some(inventory) = platform.inventory(id) else {
            return Ok(false);
        };
        self.store(id, profile, inventory)?;
        Ok(true)
    }

    /// Applies the stored snapshot to the player.
    ///
    /// Returns `false` when nothing was ever saved under `profile`; the
    /// player's items are left untouched in that case.
    pub fn load_profile(&self, platform: &dyn Platform, id: PlayerId, profile: &str) -> bool {
        match self.snapshot(id, profile) {
            Some(inventory) => {
                platform.set_inventory(id, &inventory);
                true
            }
            None => false,
        }
    }

    pub fn clear_profile(&self, id: PlayerId, profile: &str) -> Result<(), ProfileError> {
        let mut snapshots = self.lock();
        let mut next = snapshots.clone();
        let removed = match next.get_mut(&id) {
            Some(profiles) => {
                let removed = profiles.remove(profile).is_some();
                if profiles.is_empty() {
                    next.remove(&id);
                }
                removed
            }
            None => false,
        };
        if removed {
            self.write(&next)?;
            *snapshots = next;
        }
        Ok(())
    }

    pub fn has_profile(&self, id: PlayerId, profile: &str) -> bool {
        self.lock()
            .get(&id)
            .is_some_and(|profiles| profiles.contains_key(profile))
    }

    /// The stored snapshot, if any.
    pub fn snapshot(&self, id: PlayerId, profile: &str) -> Option<Inventory> {
        self.lock()
            .get(&id)
            .and_then(|profiles| profiles.get(profile))
            .cloned()
    }

    /// Stores `inventory` under `profile` directly.
    pub fn store(
        &self,
        id: PlayerId,
        profile: &str,
        inventory: Inventory,
    ) -> Result<(), ProfileError> {
        let mut snapshots = self.lock();
        let mut next = snapshots.clone();
        next.entry(id)
            .or_default()
            .insert(profile.to_string(), inventory);
        // Memory only changes once the file holds the new snapshot.
        self.write(&next)?;
        *snapshots = next;
        debug!(player = %id, profile, "saved inventory profile");
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Snapshots> {
        match self.snapshots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self, snapshots: &Snapshots) -> Result<(), ProfileError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)
            .map_err(|e| ProfileError::Io(format!("{}: {}", dir.display(), e)))?;

        let mut temp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| ProfileError::Io(format!("failed to create temp file: {}", e)))?;
        serde_json::to_writer_pretty(temp.as_file_mut(), snapshots)
            .map_err(|e| ProfileError::Serde(e.to_string()))?;
        temp.as_file_mut()
            .flush()
            .and_then(|_| temp.as_file().sync_all())
            .map_err(|e| ProfileError::Io(format!("failed to flush profiles: {}", e)))?;
        temp.persist(&self.path).map_err(|e| {
            ProfileError::Io(format!(
                "failed to persist profiles to {}: {}",
                self.path.display(),
                e
            ))
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn kit() -> Inventory {
        Inventory {
            contents: vec![Some(ItemStack::new("DIAMOND_SWORD", 1)), None],
            armor: vec![None, Some(ItemStack::new("IRON_HELMET", 1))],
            offhand: Some(ItemStack::new("TORCH", 16)),
        }
    }

    #[test]
    fn test_snapshots_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("inventories.json");
        let id = PlayerId::random();

        let store = ProfileStore::open(&path).unwrap();
        store.store(id, MAIN_PROFILE, kit()).unwrap();
        drop(store);

        let reopened = ProfileStore::open(&path).unwrap();
        assert_eq!(reopened.snapshot(id, MAIN_PROFILE), Some(kit()));
        assert!(!reopened.has_profile(id, AFTERLIFE_PROFILE));
    }

    #[test]
    fn test_clear_profile_removes_only_that_profile() {
        let dir = TempDir::new().unwrap();
        let store = ProfileStore::open(dir.path().join("inventories.json")).unwrap();
        let id = PlayerId::random();
        store.store(id, MAIN_PROFILE, kit()).unwrap();
        store.store(id, AFTERLIFE_PROFILE, Inventory::default()).unwrap();

        store.clear_profile(id, AFTERLIFE_PROFILE).unwrap();
        assert!(store.has_profile(id, MAIN_PROFILE));
        assert!(!store.has_profile(id, AFTERLIFE_PROFILE));

        // Clearing something that is not there is fine.
        store.clear_profile(PlayerId::random(), MAIN_PROFILE).unwrap();
    }

    #[test]
    fn test_empty_snapshot_is_distinct_from_missing() {
        let dir = TempDir::new().unwrap();
        let store = ProfileStore::open(dir.path().join("inventories.json")).unwrap();
        let id = PlayerId::random();
        store.store(id, AFTERLIFE_PROFILE, Inventory::default()).unwrap();

        let stored = store.snapshot(id, AFTERLIFE_PROFILE).unwrap();
        assert!(stored.is_empty());
        assert!(store.snapshot(id, MAIN_PROFILE).is_none());
    }

    #[derive(Default)]
    struct RecordingPlatform {
        applied: std::sync::Mutex<Vec<(PlayerId, Inventory)>>,
    }

    impl Platform for RecordingPlatform {
        fn is_online(&self, _id: PlayerId) -> bool {
            true
        }
        fn inventory(&self, _id: PlayerId) -> Option<Inventory> {
            Some(kit())
        }
        fn set_inventory(&self, id: PlayerId, inventory: &Inventory) {
            self.applied.lock().unwrap().push((id, inventory.clone()));
        }
        fn clear_inventory(&self, _id: PlayerId) {}
        fn teleport(&self, _id: PlayerId, _to: &crate::core::Location) -> bool {
            true
        }
        fn apply_capacity(&self, _id: PlayerId, _capacity: f64) {}
        fn world_spawn(&self, _world: &str) -> Option<crate::core::Location> {
            None
        }
        fn primary_spawn(&self) -> crate::core::Location {
            crate::core::Location::new("world", 0.0, 64.0, 0.0)
        }
    }

    #[test]
    fn test_load_of_unsaved_profile_leaves_inventory_alone() {
        let dir = TempDir::new().unwrap();
        let store = ProfileStore::open(dir.path().join("inventories.json")).unwrap();
        let platform = RecordingPlatform::default();
        let id = PlayerId::random();

        assert!(!store.load_profile(&platform, id, AFTERLIFE_PROFILE));
        assert!(platform.applied.lock().unwrap().is_empty());

        assert!(store.save_profile(&platform, id, MAIN_PROFILE).unwrap());
        assert!(store.load_profile(&platform, id, MAIN_PROFILE));
        assert_eq!(platform.applied.lock().unwrap().clone(), vec![(id, kit())]);
    }

    #[test]
    fn test_failed_write_keeps_memory_unchanged() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("inventories.json");
        let store = ProfileStore::open(&path).unwrap();
        let id = PlayerId::random();
        store.store(id, MAIN_PROFILE, kit()).unwrap();

        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        assert!(store.store(id, AFTERLIFE_PROFILE, kit()).is_err());
        assert!(!store.has_profile(id, AFTERLIFE_PROFILE));
        assert!(store.clear_profile(id, MAIN_PROFILE).is_err());
        assert!(store.has_profile(id, MAIN_PROFILE));
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("inventories.json");
        std::fs::write(&path, "{ nope").unwrap();
        assert!(matches!(
            ProfileStore::open(&path),
            Err(ProfileError::Serde(_))
        ));
    }
}
