//! Reconstructed session state.
//!
//! Everything here is copied from event payloads. Nothing is computed.

use std::collections::BTreeMap;

use skirmish_types::{CanonicalEffect, EffectId, Side, SimTime, StatBlock, UnitId};

/// One unit as seen by a replay consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitRecord {
    /// Unit id.
    pub unit_id: UnitId,
    /// Display name.
    pub name: String,
    /// Team.
    pub side: Side,
    /// Last reported hp.
    pub hp: u32,
    /// Maximum hp.
    pub max_hp: u32,
    /// Last reported total shield.
    pub shield: u32,
    /// Last reported mana.
    pub mana: u32,
    /// Maximum mana.
    pub max_mana: u32,
    /// Last reported gold total.
    pub gold: u32,
    /// Last reported live stats.
    pub stats: StatBlock,
    /// Cleared by `unit_died`.
    pub alive: bool,
    /// Active effects keyed by id.
    pub effects: BTreeMap<EffectId, CanonicalEffect>,
}

/// The full reconstructed state of a session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStateView {
    /// Every spawned unit.
    pub units: BTreeMap<UnitId, UnitRecord>,
    /// Unit ids in spawn order.
    pub spawn_order: Vec<UnitId>,
    /// Seq of the last applied event (0 before the first).
    pub last_seq: u64,
    /// Sim time of the last applied event.
    pub sim_time: SimTime,
    /// Whether `combat_ended` has been seen.
    pub ended: bool,
    /// Winner announced by `combat_ended`.
    pub winner: Option<Side>,
    /// Number of events skipped because their kind was unknown.
    pub skipped_unknown: u64,
}

impl SessionStateView {
    /// Look up a unit.
    pub fn unit(&self, unit_id: UnitId) -> Option<&UnitRecord> {
        self.units.get(&unit_id)
    }

    /// Units in spawn order.
    pub fn units_in_order(&self) -> impl Iterator<Item = &UnitRecord> {
        self.spawn_order.iter().filter_map(|id| self.units.get(id))
    }

    /// Living units of one side.
    pub fn living(&self, side: Side) -> impl Iterator<Item = &UnitRecord> {
        self.units_in_order()
            .filter(move |unit| unit.alive && unit.side == side)
    }

    /// Total number of active effects across all units.
    pub fn active_effects(&self) -> usize {
        self.units.values().map(|unit| unit.effects.len()).sum()
    }
}
