//! Provisioning of the holding world that afterlife players are confined to.

pub mod generator;

use crate::config::{AfterlifeSettings, Environment};
use crate::core::{Location, WorldError};
use crate::interface::{Platform, WorldHost};
use std::sync::Arc;
use tracing::{info, warn};

pub use generator::{Block, ChunkData, GeneratorMode, generate_chunk};

pub const BORDER_WARNING_DISTANCE: i32 = 20;

/// Creation parameters handed to the host.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldSpec {
    pub name: String,
    pub environment: Environment,
    pub generator: GeneratorMode,
    pub seed: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BorderSpec {
    pub center_x: f64,
    pub center_z: f64,
    pub size: f64,
    pub warning_distance: i32,
}

/// Rules applied to the holding world every time it is (re)acquired.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldRules {
    pub pvp: bool,
    pub mob_spawning: bool,
    pub keep_inventory: bool,
    pub daylight_cycle: bool,
    pub keep_spawn_loaded: bool,
    pub border: BorderSpec,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorldInfo {
    pub name: String,
    pub loaded: bool,
    pub occupants: usize,
    pub environment: Environment,
    pub generator: GeneratorMode,
    pub border_size: u32,
}

/// The auxiliary world afterlife players are relocated to.
pub struct HoldingWorld {
    host: Arc<dyn WorldHost>,
    platform: Arc<dyn Platform>,
    settings: AfterlifeSettings,
}

impl HoldingWorld {
    pub fn new(
        host: Arc<dyn WorldHost>,
        platform: Arc<dyn Platform>,
        settings: AfterlifeSettings,
    ) -> Self {
        Self {
            host,
            platform,
            settings,
        }
    }

    pub fn name(&self) -> &str {
        &self.settings.world_name
    }

    pub fn is_holding_world(&self, world: &str) -> bool {
        world == self.settings.world_name
    }

    pub fn spec(&self, seed: Option<i64>) -> WorldSpec {
        // Custom terrain only applies to the overworld environment.
        let generator = match self.settings.environment {
            Environment::Normal => GeneratorMode::from_settings(&self.settings),
            Environment::Nether => GeneratorMode::Default,
        };
        WorldSpec {
            name: self.settings.world_name.clone(),
            environment: self.settings.environment,
            generator,
            seed: seed.or(self.settings.seed),
        }
    }

    pub fn rules(&self) -> WorldRules {
        WorldRules {
            pvp: self.settings.allow_pvp,
            mob_spawning: self.settings.mob_spawning,
            keep_inventory: true,
            daylight_cycle: true,
            keep_spawn_loaded: true,
            border: BorderSpec {
                center_x: 0.0,
                center_z: 0.0,
                size: f64::from(self.settings.border_size),
                warning_distance: BORDER_WARNING_DISTANCE,
            },
        }
    }

    /// Creates the world if absent, (re)applies its rules and spawn point.
    ///
    /// Safe to call repeatedly. Returns the spawn point.
    pub fn ensure(&self, seed: Option<i64>) -> Result<Location, WorldError> {
        let name = self.name();
        if !self.host.world_exists(name) {
            let spec = self.spec(seed);
            info!(
                world = name,
                environment = ?spec.environment,
                generator = ?spec.generator,
                "creating holding world"
            );
            if !self.host.create_world(&spec) {
                return Err(WorldError::CreateFailed(name.to_string()));
            }
        }

        self.host.configure(name, &self.rules());

        let spawn_y = self
            .settings
            .spawn_y
            .unwrap_or_else(|| self.host.default_spawn_y(name));
        let spawn = Location::new(name, 0.5, f64::from(spawn_y), 0.5);
        self.host.set_spawn(&spawn);

        info!(
            world = name,
            border = self.settings.border_size,
            "holding world ready"
        );
        Ok(spawn)
    }

    /// Spawn point of the loaded world, `None` while it is not loaded.
    pub fn spawn_point(&self) -> Option<Location> {
        if !self.host.world_exists(self.name()) {
            return None;
        }
        self.platform.world_spawn(self.name())
    }

    pub fn info(&self) -> WorldInfo {
        let loaded = self.host.world_exists(self.name());
        let spec = self.spec(None);
        WorldInfo {
            name: self.name().to_string(),
            loaded,
            occupants: if loaded {
                self.host.players_in(self.name()).len()
            } else {
                0
            },
            environment: spec.environment,
            generator: spec.generator,
            border_size: self.settings.border_size,
        }
    }

    /// Tears the world down and recreates it.
    ///
    /// Occupants are moved to the primary spawn first. Storage is never
    /// deleted while the host still has the world loaded.
    pub fn regenerate(&self, seed: Option<i64>) -> Result<Location, WorldError> {
        let name = self.name();

        if self.host.world_exists(name) {
            let fallback = self.platform.primary_spawn();
            for id in self.host.players_in(name) {
                if !self.platform.teleport(id, &fallback) {
                    warn!(player = %id, world = name, "failed to move occupant out");
                }
            }
            if !self.host.unload_world(name) {
                return Err(WorldError::UnloadRefused(name.to_string()));
            }
        }

        if self.host.world_exists(name) {
            return Err(WorldError::StillLoaded(name.to_string()));
        }

        self.host
            .delete_world_storage(name)
            .map_err(|err| WorldError::DeleteFailed(name.to_string(), err))?;

        info!(world = name, "regenerating holding world");
        self.ensure(seed)
    }
}
