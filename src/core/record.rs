//! The persisted per-player record and its dirty-field tracking.

use super::types::{LifeState, PlayerId};
use std::collections::BTreeSet;

/// Default capacity of a record that has never been configured: ten hearts.
pub const DEFAULT_CAPACITY: f64 = 20.0;

/// Mutable fields of a [`PlayerRecord`], each mapped to its storage column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordField {
    Name,
    Capacity,
    RevivalCount,
    CraftedHearts,
    CraftedRevives,
    EliminationKills,
    FirstSeenAt,
    LifeState,
    ReleaseDeadline,
    PrestigeLevel,
}

impl RecordField {
    pub const ALL: [RecordField; 10] = [
        RecordField::Name,
        RecordField::Capacity,
        RecordField::RevivalCount,
        RecordField::CraftedHearts,
        RecordField::CraftedRevives,
        RecordField::EliminationKills,
        RecordField::FirstSeenAt,
        RecordField::LifeState,
        RecordField::ReleaseDeadline,
        RecordField::PrestigeLevel,
    ];

    pub fn column(&self) -> &'static str {
        match self {
            RecordField::Name => "name",
            RecordField::Capacity => "maxhp",
            RecordField::RevivalCount => "hasbeenRevived",
            RecordField::CraftedHearts => "craftedHearts",
            RecordField::CraftedRevives => "craftedRevives",
            RecordField::EliminationKills => "killedOtherPlayers",
            RecordField::FirstSeenAt => "firstJoin",
            RecordField::LifeState => "lifeState",
            RecordField::ReleaseDeadline => "afterlifeReleaseTime",
            RecordField::PrestigeLevel => "prestigeCount",
        }
    }
}

/// Backend-agnostic row layout: one column per record field.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordRow {
    pub uuid: String,
    pub name: String,
    pub maxhp: f64,
    pub has_been_revived: i64,
    pub crafted_hearts: i64,
    pub crafted_revives: i64,
    pub killed_other_players: i64,
    pub first_join: i64,
    pub life_state: String,
    pub afterlife_release_time: i64,
    pub prestige_count: i64,
}

/// Persistent progression state of one player.
///
/// Setters only mark a field dirty when its value changes, so a
/// read-modify-save cycle that changes nothing costs no write.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRecord {
    id: PlayerId,
    name: String,
    capacity: f64,
    revival_count: u32,
    crafted_hearts: u32,
    crafted_revives: u32,
    elimination_kills: u32,
    first_seen_at: i64,
    life_state: LifeState,
    release_deadline: i64,
    prestige_level: u32,
    dirty: BTreeSet<RecordField>,
}

fn assign<T: PartialEq>(
    slot: &mut T,
    value: T,
    dirty: &mut BTreeSet<RecordField>,
    field: RecordField,
) {
    if *slot != value {
        *slot = value;
        dirty.insert(field);
    }
}

impl PlayerRecord {
    /// A record that has never been persisted. Every field starts dirty.
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            capacity: DEFAULT_CAPACITY,
            revival_count: 0,
            crafted_hearts: 0,
            crafted_revives: 0,
            elimination_kills: 0,
            first_seen_at: 0,
            life_state: LifeState::Alive,
            release_deadline: 0,
            prestige_level: 0,
            dirty: RecordField::ALL.into_iter().collect(),
        }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Capacity expressed in whole hearts.
    pub fn hearts(&self) -> i64 {
        (self.capacity / 2.0).floor() as i64
    }

    pub fn revival_count(&self) -> u32 {
        self.revival_count
    }

    pub fn crafted_hearts(&self) -> u32 {
        self.crafted_hearts
    }

    pub fn crafted_revives(&self) -> u32 {
        self.crafted_revives
    }

    pub fn elimination_kills(&self) -> u32 {
        self.elimination_kills
    }

    pub fn first_seen_at(&self) -> i64 {
        self.first_seen_at
    }

    pub fn life_state(&self) -> LifeState {
        self.life_state
    }

    pub fn release_deadline(&self) -> i64 {
        self.release_deadline
    }

    pub fn prestige_level(&self) -> u32 {
        self.prestige_level
    }

    pub fn is_alive(&self) -> bool {
        self.life_state == LifeState::Alive
    }

    pub fn is_in_afterlife(&self) -> bool {
        self.life_state == LifeState::Afterlife
    }

    pub fn is_eliminated(&self) -> bool {
        self.life_state == LifeState::Eliminated
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        assign(&mut self.name, name.into(), &mut self.dirty, RecordField::Name);
    }

    /// Negative and non-finite values clamp to zero.
    pub fn set_capacity(&mut self, capacity: f64) {
        let capacity = if capacity.is_finite() { capacity.max(0.0) } else { 0.0 };
        assign(&mut self.capacity, capacity, &mut self.dirty, RecordField::Capacity);
    }

    pub fn set_crafted_hearts(&mut self, value: u32) {
        assign(&mut self.crafted_hearts, value, &mut self.dirty, RecordField::CraftedHearts);
    }

    pub fn set_crafted_revives(&mut self, value: u32) {
        assign(&mut self.crafted_revives, value, &mut self.dirty, RecordField::CraftedRevives);
    }

    pub fn set_elimination_kills(&mut self, value: u32) {
        assign(&mut self.elimination_kills, value, &mut self.dirty, RecordField::EliminationKills);
    }

    pub fn set_first_seen_at(&mut self, millis: i64) {
        assign(&mut self.first_seen_at, millis, &mut self.dirty, RecordField::FirstSeenAt);
    }

    pub(crate) fn set_revival_count(&mut self, value: u32) {
        assign(&mut self.revival_count, value, &mut self.dirty, RecordField::RevivalCount);
    }

    pub(crate) fn set_prestige_level(&mut self, level: u32) {
        assign(&mut self.prestige_level, level, &mut self.dirty, RecordField::PrestigeLevel);
    }

    /// `deadline` is clamped to at least 1 so that a non-zero deadline always
    /// marks the afterlife state.
    pub(crate) fn begin_afterlife(&mut self, deadline: i64) {
        assign(&mut self.life_state, LifeState::Afterlife, &mut self.dirty, RecordField::LifeState);
        assign(&mut self.release_deadline, deadline.max(1), &mut self.dirty, RecordField::ReleaseDeadline);
    }

    pub(crate) fn return_to_life(&mut self) {
        assign(&mut self.life_state, LifeState::Alive, &mut self.dirty, RecordField::LifeState);
        assign(&mut self.release_deadline, 0, &mut self.dirty, RecordField::ReleaseDeadline);
    }

    pub(crate) fn mark_eliminated(&mut self) {
        assign(&mut self.life_state, LifeState::Eliminated, &mut self.dirty, RecordField::LifeState);
        assign(&mut self.release_deadline, 0, &mut self.dirty, RecordField::ReleaseDeadline);
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn dirty_fields(&self) -> &BTreeSet<RecordField> {
        &self.dirty
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty.clear();
    }

    /// Whether the deadline has elapsed at `now` (epoch millis).
    pub fn release_due(&self, now: i64) -> bool {
        self.is_in_afterlife() && now >= self.release_deadline
    }

    pub fn to_row(&self) -> RecordRow {
        RecordRow {
            uuid: self.id.to_string(),
            name: self.name.clone(),
            maxhp: self.capacity,
            has_been_revived: self.revival_count as i64,
            crafted_hearts: self.crafted_hearts as i64,
            crafted_revives: self.crafted_revives as i64,
            killed_other_players: self.elimination_kills as i64,
            first_join: self.first_seen_at,
            life_state: self.life_state.as_str().to_string(),
            afterlife_release_time: self.release_deadline,
            prestige_count: self.prestige_level as i64,
        }
    }

    /// Materializes a stored row. The result has an empty dirty set.
    ///
    /// Rows written by older schema versions may carry a deadline without the
    /// afterlife state (or the reverse); those are normalized here so the
    /// deadline invariant holds for every loaded record.
    pub fn from_row(row: RecordRow) -> Result<Self, String> {
        let id = row
            .uuid
            .parse::<PlayerId>()
            .map_err(|err| format!("invalid uuid '{}': {}", row.uuid, err))?;
        let life_state = LifeState::parse(&row.life_state)
            .ok_or_else(|| format!("unknown life state '{}'", row.life_state))?;
        let release_deadline = match life_state {
            LifeState::Afterlife => row.afterlife_release_time.max(1),
            _ => 0,
        };

        Ok(Self {
            id,
            name: row.name,
            capacity: if row.maxhp.is_finite() { row.maxhp.max(0.0) } else { 0.0 },
            revival_count: clamp_counter(row.has_been_revived),
            crafted_hearts: clamp_counter(row.crafted_hearts),
            crafted_revives: clamp_counter(row.crafted_revives),
            elimination_kills: clamp_counter(row.killed_other_players),
            first_seen_at: row.first_join,
            life_state,
            release_deadline,
            prestige_level: clamp_counter(row.prestige_count),
            dirty: BTreeSet::new(),
        })
    }
}

fn clamp_counter(value: i64) -> u32 {
    value.clamp(0, u32::MAX as i64) as u32
}
