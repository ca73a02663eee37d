// ============================================================================
// heartline Library
// ============================================================================

pub mod config;
pub mod connection;
pub mod core;
pub mod interface;
pub mod inventory;
pub mod lifecycle;
pub mod storage;
pub mod telemetry;
pub mod world;

// Re-export main types for convenience
pub use config::Settings;
pub use crate::core::{
    Clock, LifeState, LifecycleError, Location, ManualClock, PlayerId, PlayerRecord, Result,
    StoreError, SystemClock,
};
pub use interface::{GroupSync, NoGroupSync, Notifier, Platform, RemovalAction, WorldHost};
pub use inventory::{Inventory, ItemStack, ProfileStore};
pub use lifecycle::{
    AfterlifePolicy, LifecycleDeps, LifecycleService, PrestigeService, ReleaseCause,
    ReleaseScheduler,
};
pub use storage::{MigrationReport, PlayerStore};
pub use world::HoldingWorld;

use std::sync::Arc;
use tracing::{info, warn};

// ============================================================================
// Assembled runtime
// ============================================================================

/// Host-provided collaborators.
#[derive(Clone)]
pub struct Collaborators {
    pub platform: Arc<dyn Platform>,
    pub world_host: Arc<dyn WorldHost>,
    pub removal: Arc<dyn RemovalAction>,
    pub notifier: Arc<dyn Notifier>,
    pub groups: Arc<dyn GroupSync>,
    pub clock: Arc<dyn Clock>,
}

/// Storage, lifecycle, prestige and the release scheduler wired together.
///
/// # Examples
///
/// ```ignore
/// let settings = Settings::load("config.json")?;
/// let heartline = Heartline::start(settings, collaborators).await?;
///
/// heartline.lifecycle().on_identity_present(id, "Steve").await?;
/// heartline.lifecycle().on_capacity_depleted(id).await?;
///
/// heartline.shutdown().await;
/// ```
pub struct Heartline {
    settings: Arc<Settings>,
    store: Arc<PlayerStore>,
    lifecycle: Arc<LifecycleService>,
    prestige: PrestigeService,
    policy: AfterlifePolicy,
    migration: MigrationReport,
    scheduler: Option<ReleaseScheduler>,
}

impl Heartline {
    /// Opens the store, runs the migration, provisions the holding world
    /// and starts the release scheduler when the afterlife is enabled.
    pub async fn start(settings: Settings, collaborators: Collaborators) -> Result<Self> {
        settings
            .validate()
            .map_err(|e| LifecycleError::ConfigInvalid(e.to_string()))?;
        let settings = Arc::new(settings);

        let store = Arc::new(PlayerStore::open(&settings.storage).await?);
        let migration = store.migrate().await;
        if migration.changed() {
            info!(columns = ?migration.added, "storage schema upgraded");
        }

        let profiles = Arc::new(ProfileStore::open(&settings.storage.inventory_path)?);
        let world = Arc::new(HoldingWorld::new(
            Arc::clone(&collaborators.world_host),
            Arc::clone(&collaborators.platform),
            settings.afterlife.clone(),
        ));
        if settings.afterlife.enabled {
            if let Err(err) = world.ensure(settings.afterlife.seed) {
                warn!(error = %err, "holding world not provisioned at startup");
            }
        }

        let lifecycle = Arc::new(LifecycleService::new(
            Arc::clone(&settings),
            LifecycleDeps {
                store: Arc::clone(&store),
                profiles,
                world,
                platform: Arc::clone(&collaborators.platform),
                removal: Arc::clone(&collaborators.removal),
                notifier: Arc::clone(&collaborators.notifier),
                clock: Arc::clone(&collaborators.clock),
            },
        ));
        let prestige = PrestigeService::new(
            Arc::clone(&settings),
            Arc::clone(&store),
            Arc::clone(&collaborators.platform),
            Arc::clone(&collaborators.notifier),
            Arc::clone(&collaborators.groups),
        );
        let policy = AfterlifePolicy::new(settings.afterlife.clone());

        let scheduler = settings.afterlife.enabled.then(|| {
            ReleaseScheduler::spawn(
                Arc::clone(&lifecycle),
                Arc::clone(&collaborators.clock),
                settings.afterlife.sweep_interval(),
            )
        });

        info!(
            backend = store.backend_name(),
            afterlife = settings.afterlife.enabled,
            added_columns = migration.added.len(),
            "heartline started"
        );

        Ok(Self {
            settings,
            store,
            lifecycle,
            prestige,
            policy,
            migration,
            scheduler,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<PlayerStore> {
        &self.store
    }

    pub fn lifecycle(&self) -> &Arc<LifecycleService> {
        &self.lifecycle
    }

    pub fn prestige(&self) -> &PrestigeService {
        &self.prestige
    }

    pub fn policy(&self) -> &AfterlifePolicy {
        &self.policy
    }

    pub fn migration(&self) -> &MigrationReport {
        &self.migration
    }

    /// Stops the scheduler, letting an in-flight sweep finish.
    pub async fn shutdown(mut self) {
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.shutdown().await;
        }
        info!("heartline stopped");
    }
}
