use crate::config::{PrestigeSettings, Settings};
use crate::core::{LifecycleError, PlayerId, Result};
use crate::interface::{GroupSync, Notifier, Platform};
use crate::storage::PlayerStore;
use std::sync::Arc;
use tracing::info;

/// Key of the published prestige multiplier attribute.
pub const PRESTIGE_MULTIPLIER: &str = "prestige.multiplier";

/// Prefix of the permission-string form of the multiplier, for systems that
/// can only read permissions.
pub const MULTIPLIER_PERMISSION_PREFIX: &str = "heartline.prestige.multiplier.";

pub fn multiplier_for_level(settings: &PrestigeSettings, level: u32) -> f64 {
    settings.multiplier.base + f64::from(level) * settings.multiplier.increment
}

/// `heartline.prestige.multiplier.<round(m * 100)>`
pub fn multiplier_permission(multiplier: f64) -> String {
    format!(
        "{}{}",
        MULTIPLIER_PERMISSION_PREFIX,
        (multiplier * 100.0).round() as i64
    )
}

/// Highest multiplier encoded in `permissions`, or 1.0 when none is present.
pub fn multiplier_from_permissions<I, S>(permissions: I) -> f64
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    permissions
        .into_iter()
        .filter_map(|perm| {
            perm.as_ref()
                .strip_prefix(MULTIPLIER_PERMISSION_PREFIX)
                .map(|value| value.parse::<f64>().map(|v| v / 100.0).unwrap_or(1.0))
        })
        .fold(None, |best: Option<f64>, value| {
            Some(best.map_or(value, |best| best.max(value)))
        })
        .unwrap_or(1.0)
}

/// Prestige progression: player-initiated prestige and administrative
/// adjustments.
pub struct PrestigeService {
    settings: Arc<Settings>,
    store: Arc<PlayerStore>,
    platform: Arc<dyn Platform>,
    notifier: Arc<dyn Notifier>,
    groups: Arc<dyn GroupSync>,
}

impl PrestigeService {
    pub fn new(
        settings: Arc<Settings>,
        store: Arc<PlayerStore>,
        platform: Arc<dyn Platform>,
        notifier: Arc<dyn Notifier>,
        groups: Arc<dyn GroupSync>,
    ) -> Self {
        Self {
            settings,
            store,
            platform,
            notifier,
            groups,
        }
    }

    /// Trades accumulated hearts for the next prestige level.
    ///
    /// Denials are delivered to the player and returned as
    /// [`LifecycleError::Denied`]. Returns the new level.
    pub async fn prestige(&self, id: PlayerId) -> Result<u32> {
        let prestige = &self.settings.prestige;
        let _guard = self.store.lock(id).await;
        let mut record = self
            .store
            .load(id)
            .await?
            .ok_or(LifecycleError::NotFound(id))?;

        let current_hearts = record.hearts();
        let required = i64::from(prestige.min_hearts);
        if current_hearts < required {
            return Err(self.deny(
                id,
                "prestigeNotEnoughHearts",
                &[
                    ("%needed%", (required - current_hearts).to_string()),
                    ("%current%", current_hearts.to_string()),
                    ("%required%", required.to_string()),
                ],
            ));
        }

        let old_level = record.prestige_level();
        let new_level = old_level.saturating_add(1);
        if prestige.exceeds_max(u64::from(new_level)) {
            return Err(self.deny(
                id,
                "prestigeMaxReached",
                &[
                    ("%current%", old_level.to_string()),
                    ("%max%", prestige.max_prestiges.to_string()),
                ],
            ));
        }

        record.set_capacity(f64::from(prestige.reset_hearts) * 2.0);
        record.set_prestige_level(new_level);
        self.store.save(&mut record).await?;
        self.platform.apply_capacity(id, record.capacity());
        self.groups.prestige_changed(id, new_level, old_level);

        let level_label = format!("Prestige {}", new_level);
        self.notifier.notify(
            id,
            "prestigeSuccess",
            &[
                ("%prestige_level%", level_label.clone()),
                ("%reset_hearts%", prestige.reset_hearts.to_string()),
            ],
        );
        self.notifier.broadcast(
            "prestigeBroadcast",
            &[
                ("%player%", record.name().to_string()),
                ("%prestige_level%", level_label),
            ],
        );
        info!(player = %id, level = new_level, "prestiged");
        Ok(new_level)
    }

    /// Administrative set. Returns the prior level.
    ///
    /// Negative amounts and amounts above `max-prestiges` are rejected
    /// before the record is touched.
    pub async fn set_prestige(&self, id: PlayerId, amount: i64) -> Result<u32> {
        if amount < 0 {
            return Err(LifecycleError::ConfigInvalid(
                "prestige amount must be 0 or greater".to_string(),
            ));
        }
        let max = self.settings.prestige.max_prestiges;
        let amount = u32::try_from(amount).map_err(|_| {
            LifecycleError::ConfigInvalid(format!("prestige amount {} is out of range", amount))
        })?;
        if self.settings.prestige.exceeds_max(u64::from(amount)) {
            return Err(LifecycleError::ConfigInvalid(format!(
                "prestige amount {} exceeds the maximum of {}",
                amount, max
            )));
        }
        self.assign(id, amount).await
    }

    /// Administrative reset to 0. Returns the prior level.
    pub async fn reset_prestige(&self, id: PlayerId) -> Result<u32> {
        self.assign(id, 0).await
    }

    pub async fn get_prestige(&self, id: PlayerId) -> Result<u32> {
        let record = self
            .store
            .load(id)
            .await?
            .ok_or(LifecycleError::NotFound(id))?;
        Ok(record.prestige_level())
    }

    /// Derived numeric attributes other components may read without
    /// depending on the record layout. `None` for unknown keys.
    pub async fn derived_attribute(&self, id: PlayerId, key: &str) -> Result<Option<f64>> {
        match key {
            PRESTIGE_MULTIPLIER => {
                let level = self.get_prestige(id).await?;
                Ok(Some(multiplier_for_level(&self.settings.prestige, level)))
            }
            _ => Ok(None),
        }
    }

    async fn assign(&self, id: PlayerId, level: u32) -> Result<u32> {
        let _guard = self.store.lock(id).await;
        let mut record = self
            .store
            .load(id)
            .await?
            .ok_or(LifecycleError::NotFound(id))?;

        let old_level = record.prestige_level();
        record.set_prestige_level(level);
        self.store.save(&mut record).await?;
        if old_level != level {
            self.groups.prestige_changed(id, level, old_level);
        }
        info!(player = %id, old = old_level, new = level, "prestige set");
        Ok(old_level)
    }

    fn deny(&self, id: PlayerId, key: &'static str, params: &[(&str, String)]) -> LifecycleError {
        self.notifier.notify(id, key, params);
        LifecycleError::Denied { key }
    }
}
