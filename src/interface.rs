//! Collaborator contracts consumed by the lifecycle core.
//!
//! The game host implements these; the core never touches engine or UI
//! types directly. Implementations must be cheap to call from async code:
//! anything that blocks on I/O belongs behind the host's own scheduling.

use crate::core::{Location, PlayerId};
use crate::inventory::Inventory;
use crate::world::{WorldRules, WorldSpec};

/// Players and their in-game presence.
pub trait Platform: Send + Sync {
    /// Whether the identity is currently connected.
    fn is_online(&self, id: PlayerId) -> bool;

    /// Held items, `None` when the player is not reachable.
    fn inventory(&self, id: PlayerId) -> Option<Inventory>;

    fn set_inventory(&self, id: PlayerId, inventory: &Inventory);

    fn clear_inventory(&self, id: PlayerId);

    /// Moves the player. Returns `false` when the host refused.
    fn teleport(&self, id: PlayerId, to: &Location) -> bool;

    /// Syncs the live health ceiling with the stored capacity.
    fn apply_capacity(&self, id: PlayerId, capacity: f64);

    /// Spawn point of a loaded world, `None` if no such world is loaded.
    fn world_spawn(&self, world: &str) -> Option<Location>;

    /// Spawn point of the host's first world.
    fn primary_spawn(&self) -> Location;
}

/// World provisioning on the host.
pub trait WorldHost: Send + Sync {
    fn world_exists(&self, name: &str) -> bool;

    /// Creates and loads a world. Returns `false` when creation failed.
    fn create_world(&self, spec: &WorldSpec) -> bool;

    fn configure(&self, name: &str, rules: &WorldRules);

    /// Spawn height the host picked for a freshly created world.
    fn default_spawn_y(&self, name: &str) -> i32;

    fn set_spawn(&self, spawn: &Location);

    fn players_in(&self, name: &str) -> Vec<PlayerId>;

    /// Unloads without saving. Returns `false` when the host refused.
    fn unload_world(&self, name: &str) -> bool;

    /// Deletes the world's on-disk storage. Only valid while unloaded.
    fn delete_world_storage(&self, name: &str) -> Result<(), String>;
}

/// Irreversible removal (e.g. access revocation) on elimination.
pub trait RemovalAction: Send + Sync {
    fn remove(&self, id: PlayerId, reason: &str);
}

/// Renders and delivers user-facing text.
///
/// The core selects a template key and its substitutions; it never
/// formats display strings itself.
pub trait Notifier: Send + Sync {
    fn notify(&self, id: PlayerId, key: &str, params: &[(&str, String)]);

    fn broadcast(&self, key: &str, params: &[(&str, String)]);
}

/// Rank or permission-group integration.
pub trait GroupSync: Send + Sync {
    fn prestige_changed(&self, id: PlayerId, new_level: u32, old_level: u32);
}

/// A [`GroupSync`] that does nothing, for hosts without group integration.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoGroupSync;

impl GroupSync for NoGroupSync {
    fn prestige_changed(&self, _id: PlayerId, _new_level: u32, _old_level: u32) {}
}
