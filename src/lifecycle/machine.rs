use super::format::format_duration;
use crate::config::Settings;
use crate::core::{Clock, LifeState, LifecycleError, Location, PlayerId, PlayerRecord, Result};
use crate::interface::{Notifier, Platform, RemovalAction};
use crate::inventory::{AFTERLIFE_PROFILE, MAIN_PROFILE, ProfileStore};
use crate::storage::{IdentityGuard, PlayerStore};
use crate::world::HoldingWorld;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

/// Why a release happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseCause {
    /// The deadline elapsed.
    Timed,
    /// An administrator released early; the deadline is ignored.
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepletionOutcome {
    EnteredAfterlife,
    Eliminated,
    /// The record was not alive; nothing changed.
    Ignored(LifeState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnterOutcome {
    Entered { deadline: i64, placed: bool },
    Ignored(LifeState),
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReleaseOutcome {
    Released { capacity: f64 },
    NotInAfterlife,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceOutcome {
    /// No pending afterlife work for this identity.
    Ready(LifeState),
    /// The deadline had passed while away; the identity was released.
    Released,
    /// Still serving time; placed back into the holding world if possible.
    Confined { remaining_millis: i64, placed: bool },
}

/// Result of one scheduler tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub checked: usize,
    pub released: usize,
    pub placed: usize,
    pub failed: usize,
}

/// Collaborators of the life-state machine.
#[derive(Clone)]
pub struct LifecycleDeps {
    pub store: Arc<PlayerStore>,
    pub profiles: Arc<ProfileStore>,
    pub world: Arc<HoldingWorld>,
    pub platform: Arc<dyn Platform>,
    pub removal: Arc<dyn RemovalAction>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
}

/// The life-state machine: the only component that changes a record's
/// life-state.
///
/// Every entry point runs under the identity's critical section and persists
/// the record before any side effect on the player, so placement or
/// inventory failures never leave the stored state half-applied.
pub struct LifecycleService {
    settings: Arc<Settings>,
    deps: LifecycleDeps,
    pending_placement: Mutex<HashSet<PlayerId>>,
}

impl LifecycleService {
    pub fn new(settings: Arc<Settings>, deps: LifecycleDeps) -> Self {
        Self {
            settings,
            deps,
            pending_placement: Mutex::new(HashSet::new()),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<PlayerStore> {
        &self.deps.store
    }

    pub fn world(&self) -> &Arc<HoldingWorld> {
        &self.deps.world
    }

    /// Identities whose relocation into the holding world is still owed.
    pub fn pending_placements(&self) -> Vec<PlayerId> {
        let mut pending: Vec<_> = self.pending().iter().copied().collect();
        pending.sort();
        pending
    }

    /// Depletion signal: exactly one of enter-afterlife or eliminate fires.
    pub async fn on_capacity_depleted(&self, id: PlayerId) -> Result<DepletionOutcome> {
        let (_guard, mut record) = self.locked_record(id).await?;
        if !record.is_alive() {
            debug!(player = %id, state = %record.life_state(), "depletion ignored");
            return Ok(DepletionOutcome::Ignored(record.life_state()));
        }

        if self.settings.afterlife.enabled {
            self.enter_locked(&mut record).await?;
            Ok(DepletionOutcome::EnteredAfterlife)
        } else {
            self.eliminate_locked(&mut record).await?;
            Ok(DepletionOutcome::Eliminated)
        }
    }

    /// `ALIVE -> AFTERLIFE`.
    pub async fn enter_afterlife(&self, id: PlayerId) -> Result<EnterOutcome> {
        if !self.settings.afterlife.enabled {
            return Ok(EnterOutcome::Disabled);
        }
        let (_guard, mut record) = self.locked_record(id).await?;
        if !record.is_alive() {
            debug!(player = %id, state = %record.life_state(), "enter-afterlife ignored");
            return Ok(EnterOutcome::Ignored(record.life_state()));
        }
        self.enter_locked(&mut record).await
    }

    /// `AFTERLIFE -> ALIVE`.
    pub async fn release(&self, id: PlayerId, cause: ReleaseCause) -> Result<ReleaseOutcome> {
        let (_guard, mut record) = self.locked_record(id).await?;
        self.release_locked(&mut record, cause).await
    }

    /// `ALIVE -> ELIMINATED`. Returns `false` when the record was not alive.
    pub async fn eliminate(&self, id: PlayerId) -> Result<bool> {
        let (_guard, mut record) = self.locked_record(id).await?;
        if !record.is_alive() {
            return Ok(false);
        }
        self.eliminate_locked(&mut record).await?;
        Ok(true)
    }

    /// Presence signal: creates the record on first sight, then settles any
    /// afterlife work left from while the identity was away.
    pub async fn on_identity_present(&self, id: PlayerId, name: &str) -> Result<PresenceOutcome> {
        let _guard = self.deps.store.lock(id).await;
        let now = self.deps.clock.now_millis();
        let start_capacity = f64::from(self.settings.start_hearts) * 2.0;
        let mut record = self
            .deps
            .store
            .load_or_create(id, name, start_capacity, now)
            .await?;
        self.deps.platform.apply_capacity(id, record.capacity());

        if !self.settings.afterlife.enabled || !record.is_in_afterlife() {
            return Ok(PresenceOutcome::Ready(record.life_state()));
        }

        if record.release_due(now) {
            self.release_locked(&mut record, ReleaseCause::Timed).await?;
            return Ok(PresenceOutcome::Released);
        }

        let remaining_millis = record.release_deadline() - now;
        let placed = self.place_in_holding_world(id);
        self.deps.notifier.notify(
            id,
            "afterlifeRemaining",
            &[("%time%", format_duration(remaining_millis / 1000))],
        );
        Ok(PresenceOutcome::Confined {
            remaining_millis,
            placed,
        })
    }

    /// One scheduler tick: releases every connected afterlife identity whose
    /// deadline is at or before `now`, and retries owed placements.
    ///
    /// Each identity is re-checked under its own lock, so a tick that races a
    /// manual release (or a second tick) observes ALIVE and skips.
    pub async fn sweep(&self, now: i64) -> SweepReport {
        let mut report = SweepReport::default();
        if !self.settings.afterlife.enabled {
            return report;
        }

        let confined = match self.deps.store.records_in_state(LifeState::Afterlife).await {
            Ok(records) => records,
            Err(err) => {
                report.failed += 1;
                error!(error = %err, "failed to list afterlife records");
                return report;
            }
        };

        for id in confined.iter().map(PlayerRecord::id) {
            if !self.deps.platform.is_online(id) {
                continue;
            }
            report.checked += 1;
            match self.sweep_one(id, now).await {
                Ok(SweepAction::Released) => report.released += 1,
                Ok(SweepAction::Placed) => report.placed += 1,
                Ok(SweepAction::None) => {}
                Err(err) => {
                    report.failed += 1;
                    error!(player = %id, error = %err, "afterlife sweep failed for player");
                }
            }
        }

        if report.released > 0 || report.failed > 0 {
            info!(
                checked = report.checked,
                released = report.released,
                failed = report.failed,
                "afterlife sweep"
            );
        }
        report
    }

    async fn sweep_one(&self, id: PlayerId, now: i64) -> Result<SweepAction> {
        let _guard = self.deps.store.lock(id).await;
        let Some(mut record) = self.deps.store.load(id).await? else {
            return Ok(SweepAction::None);
        };
        if record.release_due(now) {
            self.release_locked(&mut record, ReleaseCause::Timed).await?;
            return Ok(SweepAction::Released);
        }
        let owed = self.pending().contains(&id);
        if owed && record.is_in_afterlife() && self.place_in_holding_world(id) {
            return Ok(SweepAction::Placed);
        }
        Ok(SweepAction::None)
    }

    async fn locked_record(&self, id: PlayerId) -> Result<(IdentityGuard, PlayerRecord)> {
        let guard = self.deps.store.lock(id).await;
        let record = self
            .deps
            .store
            .load(id)
            .await?
            .ok_or(LifecycleError::NotFound(id))?;
        Ok((guard, record))
    }

    async fn enter_locked(&self, record: &mut PlayerRecord) -> Result<EnterOutcome> {
        let afterlife = &self.settings.afterlife;
        let id = record.id();
        let now = self.deps.clock.now_millis();
        let deadline = now.saturating_add(afterlife.duration_millis());

        record.begin_afterlife(deadline);
        record.set_capacity(f64::from(afterlife.fixed_hearts()) * 2.0);
        self.deps.store.save(record).await?;
        self.deps.platform.apply_capacity(id, record.capacity());

        if afterlife.separate_inventories {
            // Live items are only replaced once they are safely snapshotted.
            if self.save_profile(id, MAIN_PROFILE) {
                let restored = self
                    .deps
                    .profiles
                    .load_profile(self.deps.platform.as_ref(), id, AFTERLIFE_PROFILE);
                if !restored && afterlife.clear_inventory {
                    self.deps.platform.clear_inventory(id);
                }
            } else {
                warn!(player = %id, "main inventory not saved; afterlife swap skipped");
            }
        } else if afterlife.clear_inventory {
            self.deps.platform.clear_inventory(id);
        }

        let placed = self.place_in_holding_world(id);

        self.deps.notifier.notify(
            id,
            "afterlifeEnter",
            &[("%time%", format_duration(afterlife.duration_seconds))],
        );
        if self.settings.announce_elimination {
            self.deps.notifier.broadcast(
                "eliminationAnnouncementAfterlife",
                &[("%player%", record.name().to_string())],
            );
        }

        info!(
            player = %id,
            name = record.name(),
            duration_seconds = afterlife.duration_seconds,
            placed,
            "sent to the afterlife"
        );
        Ok(EnterOutcome::Entered { deadline, placed })
    }

    async fn release_locked(
        &self,
        record: &mut PlayerRecord,
        cause: ReleaseCause,
    ) -> Result<ReleaseOutcome> {
        if !record.is_in_afterlife() {
            return Ok(ReleaseOutcome::NotInAfterlife);
        }
        let afterlife = &self.settings.afterlife;
        let id = record.id();

        record.return_to_life();
        record.set_capacity(f64::from(afterlife.revive_hearts) * 2.0);
        record.set_revival_count(record.revival_count().saturating_add(1));
        self.deps.store.save(record).await?;
        self.deps.platform.apply_capacity(id, record.capacity());
        self.pending().remove(&id);

        if afterlife.separate_inventories {
            if self.save_profile(id, AFTERLIFE_PROFILE) {
                self.deps
                    .profiles
                    .load_profile(self.deps.platform.as_ref(), id, MAIN_PROFILE);
            } else {
                warn!(player = %id, "afterlife inventory not saved; main restore skipped");
            }
        }

        let destination = self.return_point();
        if !self.deps.platform.teleport(id, &destination) {
            warn!(player = %id, to = %destination, "failed to relocate released player");
        }

        self.deps.notifier.notify(
            id,
            "afterlifeRelease",
            &[("%hearts%", afterlife.revive_hearts.to_string())],
        );
        info!(
            player = %id,
            name = record.name(),
            ?cause,
            hearts = afterlife.revive_hearts,
            "released from the afterlife"
        );
        Ok(ReleaseOutcome::Released {
            capacity: record.capacity(),
        })
    }

    async fn eliminate_locked(&self, record: &mut PlayerRecord) -> Result<()> {
        let id = record.id();
        record.set_capacity(0.0);
        record.mark_eliminated();
        self.deps.store.save(record).await?;
        self.deps.platform.apply_capacity(id, 0.0);

        if self.settings.disable_removal_on_elimination {
            info!(player = %id, "eliminated; removal disabled");
            return Ok(());
        }

        self.deps
            .removal
            .remove(id, &self.settings.elimination_reason);
        if self.settings.announce_elimination {
            self.deps.notifier.broadcast(
                "eliminationAnnouncementNature",
                &[("%player%", record.name().to_string())],
            );
        }
        info!(player = %id, name = record.name(), "eliminated");
        Ok(())
    }

    /// Ensures the holding world and moves the identity there. On failure the
    /// identity is queued for a later retry.
    fn place_in_holding_world(&self, id: PlayerId) -> bool {
        let spawn = match self.deps.world.ensure(self.settings.afterlife.seed) {
            Ok(spawn) => spawn,
            Err(err) => {
                warn!(player = %id, error = %err, "holding world unavailable; placement deferred");
                self.pending().insert(id);
                return false;
            }
        };

        if self.deps.platform.teleport(id, &spawn) {
            self.pending().remove(&id);
            true
        } else {
            warn!(player = %id, to = %spawn, "teleport refused; placement deferred");
            self.pending().insert(id);
            false
        }
    }

    /// Whether the snapshot is now persisted.
    fn save_profile(&self, id: PlayerId, profile: &str) -> bool {
        match self
            .deps
            .profiles
            .save_profile(self.deps.platform.as_ref(), id, profile)
        {
            Ok(true) => true,
            Ok(false) => {
                debug!(player = %id, profile, "player unreachable; inventory not snapshotted");
                false
            }
            Err(err) => {
                error!(player = %id, profile, error = %err, "failed to save inventory profile");
                false
            }
        }
    }

    fn return_point(&self) -> Location {
        self.deps
            .platform
            .world_spawn(&self.settings.afterlife.return_world)
            .unwrap_or_else(|| self.deps.platform.primary_spawn())
    }

    fn pending(&self) -> std::sync::MutexGuard<'_, HashSet<PlayerId>> {
        match self.pending_placement.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

enum SweepAction {
    None,
    Released,
    Placed,
}
