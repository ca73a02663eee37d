//! What an afterlife player may and may not do.
//!
//! Pure decisions over a record and the afterlife settings. Event adapters
//! on the host ask these before letting an action through and deliver the
//! returned denial key to the player.

use crate::config::AfterlifeSettings;
use crate::core::{Location, PlayerRecord};

/// Why a teleport was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeleportCause {
    /// Issued by this crate (placement, release).
    Plugin,
    Command,
    Portal,
    EndPortal,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(&'static str),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

pub const CHAT_TAG_KEY: &str = "afterlifeDeathTag";

pub struct AfterlifePolicy {
    settings: AfterlifeSettings,
}

impl AfterlifePolicy {
    pub fn new(settings: AfterlifeSettings) -> Self {
        Self { settings }
    }

    fn confined(&self, record: Option<&PlayerRecord>) -> bool {
        self.settings.enabled && record.is_some_and(PlayerRecord::is_in_afterlife)
    }

    /// Only commands on the allow-list pass; the label is compared
    /// case-insensitively and arguments are ignored.
    pub fn command_allowed(&self, record: Option<&PlayerRecord>, command_line: &str) -> Decision {
        if !self.confined(record) {
            return Decision::Allow;
        }
        let label = command_line
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_lowercase();
        let allowed = self
            .settings
            .allowed_commands
            .iter()
            .any(|allowed| allowed.to_lowercase() == label);
        if allowed {
            Decision::Allow
        } else {
            Decision::Deny("afterlifeCommandBlocked")
        }
    }

    /// Leaving the holding world is reserved for teleports this crate issues.
    pub fn teleport_allowed(
        &self,
        record: Option<&PlayerRecord>,
        to: &Location,
        cause: TeleportCause,
    ) -> Decision {
        if !self.confined(record)
            || to.world == self.settings.world_name
            || cause == TeleportCause::Plugin
        {
            Decision::Allow
        } else {
            Decision::Deny("afterlifeTeleportBlocked")
        }
    }

    pub fn portal_allowed(&self, record: Option<&PlayerRecord>, cause: TeleportCause) -> Decision {
        if !self.confined(record) {
            Decision::Allow
        } else if cause == TeleportCause::EndPortal {
            Decision::Deny("afterlifeEndPortalBlocked")
        } else {
            Decision::Deny("afterlifePortalBlocked")
        }
    }

    /// Respawn location override; `None` leaves the host's choice alone.
    pub fn respawn_point(
        &self,
        record: Option<&PlayerRecord>,
        holding_spawn: Option<Location>,
    ) -> Option<Location> {
        if self.confined(record) {
            holding_spawn
        } else {
            None
        }
    }

    /// Player-versus-player damage, denied when either side is confined and
    /// the holding world does not allow it.
    pub fn combat_allowed(
        &self,
        attacker: Option<&PlayerRecord>,
        victim: Option<&PlayerRecord>,
    ) -> Decision {
        if self.settings.allow_pvp || !(self.confined(attacker) || self.confined(victim)) {
            Decision::Allow
        } else {
            Decision::Deny("afterlifeCombatBlocked")
        }
    }

    /// Template key prefixed to a confined player's chat messages.
    pub fn chat_tag(&self, record: Option<&PlayerRecord>) -> Option<&'static str> {
        self.confined(record).then_some(CHAT_TAG_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PlayerId;

    fn policy() -> AfterlifePolicy {
        AfterlifePolicy::new(AfterlifeSettings {
            enabled: true,
            allowed_commands: vec!["/msg".into(), "/Spawn".into()],
            ..AfterlifeSettings::default()
        })
    }

    fn exiled() -> PlayerRecord {
        let mut record = PlayerRecord::new(PlayerId::random(), "Ghost");
        record.begin_afterlife(10_000);
        record
    }

    #[test]
    fn test_commands_limited_to_allow_list() {
        let policy = policy();
        let ghost = exiled();
        assert!(policy.command_allowed(Some(&ghost), "/MSG Steve hi").is_allowed());
        assert!(policy.command_allowed(Some(&ghost), "/spawn").is_allowed());
        assert_eq!(
            policy.command_allowed(Some(&ghost), "/home"),
            Decision::Deny("afterlifeCommandBlocked")
        );

        let alive = PlayerRecord::new(PlayerId::random(), "Alive");
        assert!(policy.command_allowed(Some(&alive), "/home").is_allowed());
        assert!(policy.command_allowed(None, "/home").is_allowed());
    }

    #[test]
    fn test_teleport_out_only_by_plugin() {
        let policy = policy();
        let ghost = exiled();
        let outside = Location::new("world", 0.0, 64.0, 0.0);
        let inside = Location::new("afterlife", 10.0, 64.0, 10.0);

        assert!(!policy.teleport_allowed(Some(&ghost), &outside, TeleportCause::Command).is_allowed());
        assert!(policy.teleport_allowed(Some(&ghost), &outside, TeleportCause::Plugin).is_allowed());
        assert!(policy.teleport_allowed(Some(&ghost), &inside, TeleportCause::Command).is_allowed());
    }

    #[test]
    fn test_portals_blocked_with_end_portal_message() {
        let policy = policy();
        let ghost = exiled();
        assert_eq!(
            policy.portal_allowed(Some(&ghost), TeleportCause::EndPortal),
            Decision::Deny("afterlifeEndPortalBlocked")
        );
        assert_eq!(
            policy.portal_allowed(Some(&ghost), TeleportCause::Portal),
            Decision::Deny("afterlifePortalBlocked")
        );
    }

    #[test]
    fn test_combat_blocked_when_either_side_confined() {
        let policy = policy();
        let ghost = exiled();
        let alive = PlayerRecord::new(PlayerId::random(), "Alive");
        assert!(!policy.combat_allowed(Some(&alive), Some(&ghost)).is_allowed());
        assert!(!policy.combat_allowed(Some(&ghost), Some(&alive)).is_allowed());
        assert!(policy.combat_allowed(Some(&alive), Some(&alive)).is_allowed());

        let pvp = AfterlifePolicy::new(AfterlifeSettings {
            enabled: true,
            allow_pvp: true,
            ..AfterlifeSettings::default()
        });
        assert!(pvp.combat_allowed(Some(&ghost), Some(&alive)).is_allowed());
    }

    #[test]
    fn test_respawn_and_chat_tag() {
        let policy = policy();
        let ghost = exiled();
        let spawn = Location::new("afterlife", 0.5, 64.0, 0.5);
        assert_eq!(
            policy.respawn_point(Some(&ghost), Some(spawn.clone())),
            Some(spawn.clone())
        );
        assert_eq!(policy.respawn_point(None, Some(spawn)), None);
        assert_eq!(policy.chat_tag(Some(&ghost)), Some(CHAT_TAG_KEY));
    }

    #[test]
    fn test_disabled_feature_allows_everything() {
        let policy = AfterlifePolicy::new(AfterlifeSettings::default());
        let ghost = exiled();
        assert!(policy.command_allowed(Some(&ghost), "/home").is_allowed());
        assert_eq!(policy.chat_tag(Some(&ghost)), None);
    }
}
