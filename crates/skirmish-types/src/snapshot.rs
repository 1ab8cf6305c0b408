//! Snapshot export types.
//!
//! A [`Snapshot`] is an independent copy of the full roster at a given seq.
//! It exists only so the desync detector can check reconstructed state; no
//! presentation consumer reads state from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{EffectKind, Side, Stat};
use crate::ids::{EffectId, SessionId, UnitId};
use crate::stats::StatBlock;
use crate::time::{SimDuration, SimTime};

/// The comparison form of an active effect.
///
/// `value` is the raw stat value for buffs and debuffs, the granted amount
/// for shields, the per-tick damage for damage over time and `0.0` for
/// stuns. `duration` is `None` only for permanent stat effects.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CanonicalEffect {
    /// Effect id.
    pub id: EffectId,
    /// Effect category.
    pub kind: EffectKind,
    /// Modified stat, for buffs and debuffs.
    pub stat: Option<Stat>,
    /// Kind-dependent magnitude.
    pub value: f64,
    /// Total lifetime.
    pub duration: Option<SimDuration>,
}

/// One unit's exported state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct UnitSnapshot {
    /// The unit.
    pub unit_id: UnitId,
    /// Display name.
    pub name: String,
    /// Team.
    pub side: Side,
    /// Current hp.
    pub hp: u32,
    /// Maximum hp.
    pub max_hp: u32,
    /// Current total shield.
    pub shield: u32,
    /// Current mana.
    pub mana: u32,
    /// Maximum mana.
    pub max_mana: u32,
    /// Gold earned from death rewards.
    pub gold: u32,
    /// Live stats.
    pub stats: StatBlock,
    /// Whether the unit is alive.
    pub alive: bool,
    /// Active effects, sorted by id.
    pub effects: Vec<CanonicalEffect>,
}

/// A full-roster dump tagged with the seq it corresponds to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Snapshot {
    /// The session the snapshot was taken from.
    pub session_id: SessionId,
    /// Seq of the last event emitted before the snapshot (0 if none).
    pub seq: u64,
    /// Sim clock reading at capture.
    pub sim_time: SimTime,
    /// Every unit, in spawn order.
    pub units: Vec<UnitSnapshot>,
}

impl Snapshot {
    /// Look up one unit.
    pub fn unit(&self, unit_id: UnitId) -> Option<&UnitSnapshot> {
        self.units.iter().find(|u| u.unit_id == unit_id)
    }
}

/// Metadata written at the start of a recording.
///
/// `recorded_at` is wall-clock time and is never compared or replayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RecordingHeader {
    /// The recorded session.
    pub session_id: SessionId,
    /// RNG seed the battle ran with.
    pub seed: u64,
    /// When the recording was started.
    pub recorded_at: DateTime<Utc>,
}
