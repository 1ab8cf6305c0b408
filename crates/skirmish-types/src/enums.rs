//! Enumeration types shared by the simulator and replay consumers.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Teams
// ---------------------------------------------------------------------------

/// Which team a unit fights for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Side {
    /// The first roster.
    A,
    /// The second roster.
    B,
}

impl Side {
    /// The opposing side.
    pub const fn opponent(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

impl core::fmt::Display for Side {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::A => write!(f, "a"),
            Self::B => write!(f, "b"),
        }
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// A live stat that effects may modify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Stat {
    /// Damage dealt per basic attack before defense.
    Attack,
    /// Flat damage mitigation score.
    Defense,
    /// Basic attacks per sim-second.
    AttackSpeed,
}

impl Stat {
    /// Every stat, in canonical order.
    pub const ALL: [Self; 3] = [Self::Attack, Self::Defense, Self::AttackSpeed];

    /// Number of decimal places a computed delta on this stat is rounded to.
    ///
    /// `attack` and `defense` are whole numbers; `attack_speed` keeps two
    /// decimals.
    pub const fn delta_precision(self) -> u32 {
        match self {
            Self::Attack | Self::Defense => 0,
            Self::AttackSpeed => 2,
        }
    }
}

impl core::fmt::Display for Stat {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Attack => write!(f, "attack"),
            Self::Defense => write!(f, "defense"),
            Self::AttackSpeed => write!(f, "attack_speed"),
        }
    }
}

/// How a stat effect's raw value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ValueKind {
    /// The value is added to the live stat as-is.
    Flat,
    /// The value is a percentage of the unit's base stat.
    Percentage,
}

// ---------------------------------------------------------------------------
// Damage
// ---------------------------------------------------------------------------

/// The category of incoming damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum DamageKind {
    /// Basic attack damage.
    Physical,
    /// Skill damage.
    Magic,
    /// Periodic damage from a damage-over-time effect.
    Periodic,
}

// ---------------------------------------------------------------------------
// Effects
// ---------------------------------------------------------------------------

/// The five effect categories.
///
/// This tag is what canonical effect tuples carry; the simulator's own
/// effect representation is a richer enum with per-kind fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum EffectKind {
    /// A stat modifier with a non-negative value.
    Buff,
    /// A stat modifier with a negative value.
    Debuff,
    /// Absorbs incoming direct damage before hp.
    Shield,
    /// Prevents the unit from acting.
    Stun,
    /// Deals periodic damage on a fixed interval.
    DamageOverTime,
}

impl EffectKind {
    /// Classify a stat modifier by the sign of its raw value.
    pub fn for_stat_value(value: f64) -> Self {
        if value < 0.0 {
            Self::Debuff
        } else {
            Self::Buff
        }
    }
}

impl core::fmt::Display for EffectKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Buff => write!(f, "buff"),
            Self::Debuff => write!(f, "debuff"),
            Self::Shield => write!(f, "shield"),
            Self::Stun => write!(f, "stun"),
            Self::DamageOverTime => write!(f, "damage_over_time"),
        }
    }
}

/// Why an effect left the `Active` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ExpiryReason {
    /// The sim clock reached the stored absolute expiry.
    Elapsed,
    /// A damage-over-time effect ran out of ticks.
    Exhausted,
    /// The unit carrying the effect died.
    OwnerDied,
    /// The combat session ended with the effect still active.
    SessionEnded,
}

// ---------------------------------------------------------------------------
// Rewards
// ---------------------------------------------------------------------------

/// Why a unit received a gold reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum RewardCause {
    /// An ally of the recipient died.
    AllyDeath,
    /// The recipient landed the killing blow.
    Kill,
}

impl core::fmt::Display for RewardCause {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AllyDeath => write!(f, "ally_death"),
            Self::Kill => write!(f, "kill"),
        }
    }
}
