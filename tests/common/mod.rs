#![allow(dead_code)]

use heartline::config::Settings;
use heartline::inventory::Inventory;
use heartline::world::{WorldRules, WorldSpec};
use heartline::{
    Clock, Collaborators, GroupSync, Location, ManualClock, Notifier, PlayerId, Platform,
    RemovalAction, WorldHost,
};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

pub const START: i64 = 1_700_000_000_000;

#[derive(Default)]
pub struct FakePlatform {
    pub online: Mutex<HashSet<PlayerId>>,
    pub inventories: Mutex<HashMap<PlayerId, Inventory>>,
    pub positions: Mutex<HashMap<PlayerId, Location>>,
    pub capacities: Mutex<HashMap<PlayerId, f64>>,
    pub refuse_teleport: Mutex<bool>,
    pub loaded_worlds: Mutex<HashSet<String>>,
}

impl FakePlatform {
    pub fn join(&self, id: PlayerId) {
        self.online.lock().unwrap().insert(id);
    }

    pub fn position(&self, id: PlayerId) -> Option<Location> {
        self.positions.lock().unwrap().get(&id).cloned()
    }

    pub fn capacity(&self, id: PlayerId) -> Option<f64> {
        self.capacities.lock().unwrap().get(&id).copied()
    }

    pub fn give(&self, id: PlayerId, inventory: Inventory) {
        self.inventories.lock().unwrap().insert(id, inventory);
    }

    pub fn held(&self, id: PlayerId) -> Inventory {
        self.inventories
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_refuse_teleport(&self, refuse: bool) {
        *self.refuse_teleport.lock().unwrap() = refuse;
    }
}

impl Platform for FakePlatform {
    fn is_online(&self, id: PlayerId) -> bool {
        self.online.lock().unwrap().contains(&id)
    }

    fn inventory(&self, id: PlayerId) -> Option<Inventory> {
        self.is_online(id).then(|| self.held(id))
    }

    fn set_inventory(&self, id: PlayerId, inventory: &Inventory) {
        self.give(id, inventory.clone());
    }

    fn clear_inventory(&self, id: PlayerId) {
        self.give(id, Inventory::default());
    }

    fn teleport(&self, id: PlayerId, to: &Location) -> bool {
        if *self.refuse_teleport.lock().unwrap() {
            return false;
        }
        self.positions.lock().unwrap().insert(id, to.clone());
        true
    }

    fn apply_capacity(&self, id: PlayerId, capacity: f64) {
        self.capacities.lock().unwrap().insert(id, capacity);
    }

    fn world_spawn(&self, world: &str) -> Option<Location> {
        self.loaded_worlds
            .lock()
            .unwrap()
            .contains(world)
            .then(|| Location::new(world, 0.5, 70.0, 0.5))
    }

    fn primary_spawn(&self) -> Location {
        Location::new("world", 0.0, 64.0, 0.0)
    }
}

#[derive(Default)]
pub struct FakeWorldHost {
    pub loaded: Mutex<HashSet<String>>,
    pub created: Mutex<Vec<WorldSpec>>,
    pub configured: Mutex<Vec<(String, WorldRules)>>,
    pub spawns: Mutex<Vec<Location>>,
    pub occupants: Mutex<HashMap<String, Vec<PlayerId>>>,
    pub deleted: Mutex<Vec<String>>,
    pub fail_create: Mutex<bool>,
    pub refuse_unload: Mutex<bool>,
}

impl FakeWorldHost {
    pub fn set_fail_create(&self, fail: bool) {
        *self.fail_create.lock().unwrap() = fail;
    }

    pub fn set_refuse_unload(&self, refuse: bool) {
        *self.refuse_unload.lock().unwrap() = refuse;
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }
}

impl WorldHost for FakeWorldHost {
    fn world_exists(&self, name: &str) -> bool {
        self.loaded.lock().unwrap().contains(name)
    }

    fn create_world(&self, spec: &WorldSpec) -> bool {
        if *self.fail_create.lock().unwrap() {
            return false;
        }
        self.created.lock().unwrap().push(spec.clone());
        self.loaded.lock().unwrap().insert(spec.name.clone());
        true
    }

    fn configure(&self, name: &str, rules: &WorldRules) {
        self.configured
            .lock()
            .unwrap()
            .push((name.to_string(), rules.clone()));
    }

    fn default_spawn_y(&self, _name: &str) -> i32 {
        72
    }

    fn set_spawn(&self, spawn: &Location) {
        self.spawns.lock().unwrap().push(spawn.clone());
    }

    fn players_in(&self, name: &str) -> Vec<PlayerId> {
        self.occupants
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    fn unload_world(&self, name: &str) -> bool {
        if *self.refuse_unload.lock().unwrap() {
            return false;
        }
        self.loaded.lock().unwrap().remove(name);
        self.occupants.lock().unwrap().remove(name);
        true
    }

    fn delete_world_storage(&self, name: &str) -> Result<(), String> {
        if self.world_exists(name) {
            return Err("world is loaded".to_string());
        }
        self.deleted.lock().unwrap().push(name.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sent {
    pub to: Option<PlayerId>,
    pub key: String,
    pub params: Vec<(String, String)>,
}

impl Sent {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Sent>>,
}

impl RecordingNotifier {
    pub fn keys(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|s| s.key.clone()).collect()
    }

    pub fn find(&self, key: &str) -> Option<Sent> {
        self.sent.lock().unwrap().iter().find(|s| s.key == key).cloned()
    }

    pub fn count(&self, key: &str) -> usize {
        self.sent.lock().unwrap().iter().filter(|s| s.key == key).count()
    }

    fn push(&self, to: Option<PlayerId>, key: &str, params: &[(&str, String)]) {
        self.sent.lock().unwrap().push(Sent {
            to,
            key: key.to_string(),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        });
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, id: PlayerId, key: &str, params: &[(&str, String)]) {
        self.push(Some(id), key, params);
    }

    fn broadcast(&self, key: &str, params: &[(&str, String)]) {
        self.push(None, key, params);
    }
}

#[derive(Default)]
pub struct RecordingRemoval {
    pub removed: Mutex<Vec<(PlayerId, String)>>,
}

impl RemovalAction for RecordingRemoval {
    fn remove(&self, id: PlayerId, reason: &str) {
        self.removed.lock().unwrap().push((id, reason.to_string()));
    }
}

#[derive(Default)]
pub struct RecordingGroups {
    pub changes: Mutex<Vec<(PlayerId, u32, u32)>>,
}

impl GroupSync for RecordingGroups {
    fn prestige_changed(&self, id: PlayerId, new_level: u32, old_level: u32) {
        self.changes.lock().unwrap().push((id, new_level, old_level));
    }
}

/// Every fake, kept typed so tests can inspect what the core did.
pub struct Harness {
    pub platform: Arc<FakePlatform>,
    pub world_host: Arc<FakeWorldHost>,
    pub notifier: Arc<RecordingNotifier>,
    pub removal: Arc<RecordingRemoval>,
    pub groups: Arc<RecordingGroups>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new() -> Self {
        let platform = Arc::new(FakePlatform::default());
        platform.loaded_worlds.lock().unwrap().insert("world".to_string());
        Self {
            platform,
            world_host: Arc::new(FakeWorldHost::default()),
            notifier: Arc::new(RecordingNotifier::default()),
            removal: Arc::new(RecordingRemoval::default()),
            groups: Arc::new(RecordingGroups::default()),
            clock: Arc::new(ManualClock::new(START)),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            platform: self.platform.clone() as Arc<dyn Platform>,
            world_host: self.world_host.clone() as Arc<dyn WorldHost>,
            removal: self.removal.clone() as Arc<dyn RemovalAction>,
            notifier: self.notifier.clone() as Arc<dyn Notifier>,
            groups: self.groups.clone() as Arc<dyn GroupSync>,
            clock: self.clock.clone() as Arc<dyn Clock>,
        }
    }
}

/// Settings with the afterlife on, storing everything under `dir`.
pub fn afterlife_settings(dir: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.afterlife.enabled = true;
    settings.afterlife.duration_seconds = 3600;
    settings.afterlife.fixed_hearts = Some(3);
    settings.afterlife.revive_hearts = 5;
    settings.afterlife.sweep_interval_ms = 60_000;
    settings.storage.path = dir.join("userData.db");
    settings.storage.inventory_path = dir.join("inventories.json");
    settings
}
