use super::engine::StorageBackend;
use super::migration::run_additive_migration;
use super::schema::MigrationReport;
use super::sqlite::SqliteBackend;
use crate::config::{StorageKind, StorageSettings};
use crate::core::{LifeState, PlayerId, PlayerRecord, StoreError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, warn};

/// Held for the duration of one load-mutate-save cycle on a single identity.
pub type IdentityGuard = OwnedMutexGuard<()>;

/// Write instrumentation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Upserts issued to the backend.
    pub writes: u64,
    /// `save` calls skipped because nothing was dirty.
    pub skipped: u64,
}

/// Durable store of [`PlayerRecord`]s keyed by identity.
///
/// Wraps a [`StorageBackend`] with incremental persistence (clean records are
/// never written) and per-identity serialization.
pub struct PlayerStore {
    backend: Arc<dyn StorageBackend>,
    locks: Mutex<HashMap<PlayerId, Arc<AsyncMutex<()>>>>,
    writes: AtomicU64,
    skipped: AtomicU64,
}

impl PlayerStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            locks: Mutex::new(HashMap::new()),
            writes: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
        }
    }

    /// Opens the backend selected by `settings`.
    pub async fn open(settings: &StorageSettings) -> Result<Self, StoreError> {
        let config = settings
            .connection_config()
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        let backend: Arc<dyn StorageBackend> = match settings.kind {
            StorageKind::Sqlite => Arc::new(SqliteBackend::open(config)?),
            #[cfg(feature = "mariadb")]
            StorageKind::Mariadb => Arc::new(super::mariadb::MariaDbBackend::connect(&config).await?),
            #[cfg(not(feature = "mariadb"))]
            StorageKind::Mariadb => {
                return Err(StoreError::Connection(
                    "mariadb storage requires the `mariadb` feature".to_string(),
                ));
            }
        };
        Ok(Self::new(backend))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Additive, idempotent schema migration. Run once before any load or save.
    pub async fn migrate(&self) -> MigrationReport {
        let report = run_additive_migration(self.backend.as_ref()).await;
        if report.is_clean() {
            debug!(added = report.added.len(), "migration complete");
        } else {
            warn!(failed = report.failed.len(), "migration finished with failures");
        }
        report
    }

    /// The stored record with an empty dirty set, or `None` if absent.
    pub async fn load(&self, id: PlayerId) -> Result<Option<PlayerRecord>, StoreError> {
        self.backend.fetch(id).await
    }

    /// Writes the full row when the record has dirty fields.
    ///
    /// Returns whether a write was issued. On failure the record keeps its
    /// dirty set so a later save retries the same change.
    pub async fn save(&self, record: &mut PlayerRecord) -> Result<bool, StoreError> {
        if !record.is_dirty() {
            self.skipped.fetch_add(1, Ordering::Relaxed);
            return Ok(false);
        }

        self.backend.upsert(record).await?;
        self.writes.fetch_add(1, Ordering::Relaxed);
        record.clear_dirty();
        Ok(true)
    }

    /// Loads the record, creating and persisting it on first presence.
    ///
    /// A new record starts with `capacity` and `first_seen_at = now`. For an
    /// existing record only the display name is refreshed.
    pub async fn load_or_create(
        &self,
        id: PlayerId,
        name: &str,
        capacity: f64,
        now: i64,
    ) -> Result<PlayerRecord, StoreError> {
        let mut record = match self.load(id).await? {
            Some(record) => record,
            None => {
                debug!(player = %id, "creating record on first presence");
                let mut record = PlayerRecord::new(id, name);
                record.set_capacity(capacity);
                record.set_first_seen_at(now);
                record
            }
        };
        record.set_name(name);
        self.save(&mut record).await?;
        Ok(record)
    }

    pub async fn records_in_state(&self, state: LifeState) -> Result<Vec<PlayerRecord>, StoreError> {
        self.backend.fetch_all_in_state(state).await
    }

    /// Acquires the critical section of one identity.
    ///
    /// Transitions hold the guard across load, mutate and save so that two
    /// transitions on the same identity never interleave.
    pub async fn lock(&self, id: PlayerId) -> IdentityGuard {
        let slot = {
            let mut locks = match self.locks.lock() {
                Ok(locks) => locks,
                Err(poisoned) => poisoned.into_inner(),
            };
            // Drop slots nobody holds or waits on.
            locks.retain(|_, slot| Arc::strong_count(slot) > 1);
            Arc::clone(locks.entry(id).or_default())
        };
        slot.lock_owned().await
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            writes: self.writes.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}
