//! Combat events: the only channel through which state leaves the simulator.
//!
//! Every payload that changes a numeric quantity carries the value *after*
//! the mutation (`resulting_hp`, `resulting_mana`, ...). Consumers copy those
//! values; they never apply deltas themselves.
//!
//! On the wire an event is a flat JSON object:
//!
//! ```text
//! { "seq": 7, "sim_time": 1200, "kind": "damage", "target_id": 2, ... }
//! ```
//!
//! The typed [`Event`] keeps the payload nested so the enum can be shared
//! with the display client; flattening happens in the transport encoder.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{DamageKind, EffectKind, ExpiryReason, RewardCause, Side, Stat, ValueKind};
use crate::ids::{EffectId, UnitId};
use crate::stats::StatBlock;
use crate::time::{SimDuration, SimTime};

/// A sequenced combat event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Event {
    /// Strictly increasing per session, starting at 1.
    pub seq: u64,
    /// Sim clock reading when the event was emitted.
    pub sim_time: SimTime,
    /// Kind-specific authoritative payload.
    pub payload: EventPayload,
}

/// Kind-specific event payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum EventPayload {
    /// A unit joined the session with the given initial state.
    UnitSpawned {
        /// The new unit.
        unit_id: UnitId,
        /// Display name.
        name: String,
        /// Team.
        side: Side,
        /// Starting hp.
        hp: u32,
        /// Maximum hp.
        max_hp: u32,
        /// Starting mana.
        mana: u32,
        /// Maximum mana.
        max_mana: u32,
        /// Base stats; live stats start equal to these.
        stats: StatBlock,
    },

    /// Direct damage was dealt.
    Damage {
        /// Who dealt the damage, if anyone.
        attacker_id: Option<UnitId>,
        /// Who received it.
        target_id: UnitId,
        /// Damage category.
        damage_kind: DamageKind,
        /// Incoming amount before shields.
        raw_amount: u32,
        /// Portion absorbed by shields.
        shield_absorbed: u32,
        /// Target hp after the hit.
        resulting_hp: u32,
        /// Target shield after the hit.
        resulting_shield: u32,
    },

    /// Hp was restored.
    Heal {
        /// Who was healed.
        target_id: UnitId,
        /// Requested heal amount.
        amount: u32,
        /// Hp after clamping to `max_hp`.
        resulting_hp: u32,
    },

    /// Mana changed.
    ManaDelta {
        /// Whose mana changed.
        unit_id: UnitId,
        /// Requested change (informational).
        delta: i64,
        /// Mana after clamping to `[0, max_mana]`.
        resulting_mana: u32,
    },

    /// A buff or debuff became active.
    StatEffectApplied {
        /// The affected unit.
        unit_id: UnitId,
        /// The new effect.
        effect_id: EffectId,
        /// Who applied it, if anyone.
        source_id: Option<UnitId>,
        /// Buff or debuff, as classified by the simulator.
        effect_kind: EffectKind,
        /// Modified stat.
        stat: Stat,
        /// Raw value as requested.
        value: f64,
        /// How `value` is interpreted.
        value_kind: ValueKind,
        /// Exact change made to the live stat.
        applied_delta: f64,
        /// Live stat value after the change.
        resulting_stat_value: f64,
        /// Duration, or `None` for a permanent effect.
        duration: Option<SimDuration>,
        /// Absolute expiry, or `None` for a permanent effect.
        expires_at: Option<SimTime>,
    },

    /// A buff or debuff was reverted.
    StatEffectExpired {
        /// The affected unit.
        unit_id: UnitId,
        /// The expired effect.
        effect_id: EffectId,
        /// The stat that was reverted.
        stat: Stat,
        /// Live stat value after reversion.
        resulting_stat_value: f64,
        /// Why the effect ended.
        reason: ExpiryReason,
    },

    /// A shield became active.
    ShieldApplied {
        /// The shielded unit.
        unit_id: UnitId,
        /// The new effect.
        effect_id: EffectId,
        /// Who applied it, if anyone.
        source_id: Option<UnitId>,
        /// Shield points granted.
        amount: u32,
        /// Shield lifetime.
        duration: SimDuration,
        /// Absolute expiry.
        expires_at: SimTime,
        /// Total shield on the unit after the grant.
        resulting_shield: u32,
    },

    /// A shield ran out of time; its unspent points were removed.
    ShieldExpired {
        /// The shielded unit.
        unit_id: UnitId,
        /// The expired effect.
        effect_id: EffectId,
        /// Total shield on the unit after removal.
        resulting_shield: u32,
        /// Why the effect ended.
        reason: ExpiryReason,
    },

    /// A stun became active.
    StunApplied {
        /// The stunned unit.
        unit_id: UnitId,
        /// The new effect.
        effect_id: EffectId,
        /// Who applied it, if anyone.
        source_id: Option<UnitId>,
        /// Stun lifetime.
        duration: SimDuration,
        /// Absolute expiry.
        expires_at: SimTime,
    },

    /// A stun ended.
    StunExpired {
        /// The formerly stunned unit.
        unit_id: UnitId,
        /// The expired effect.
        effect_id: EffectId,
        /// Why the effect ended.
        reason: ExpiryReason,
    },

    /// A damage-over-time effect became active.
    DotApplied {
        /// The afflicted unit.
        unit_id: UnitId,
        /// The new effect.
        effect_id: EffectId,
        /// Who applied it, if anyone.
        source_id: Option<UnitId>,
        /// Damage dealt on each tick.
        damage_per_tick: u32,
        /// Time between ticks.
        interval: SimDuration,
        /// Total number of ticks.
        ticks: u32,
        /// Total lifetime, `interval` times `ticks`.
        duration: SimDuration,
        /// Time of the final tick.
        expires_at: SimTime,
        /// Unit hp (unchanged by the application itself).
        resulting_hp: u32,
    },

    /// A damage-over-time effect ticked.
    DotTick {
        /// The afflicted unit.
        unit_id: UnitId,
        /// The ticking effect.
        effect_id: EffectId,
        /// Hp removed by this tick.
        damage: u32,
        /// Ticks left after this one.
        remaining_ticks: u32,
        /// Unit hp after the tick.
        resulting_hp: u32,
    },

    /// A damage-over-time effect ended.
    DotExpired {
        /// The afflicted unit.
        unit_id: UnitId,
        /// The expired effect.
        effect_id: EffectId,
        /// Unit hp at expiry.
        resulting_hp: u32,
        /// Why the effect ended.
        reason: ExpiryReason,
    },

    /// A unit died. Emitted exactly once per unit, after its death rewards.
    UnitDied {
        /// The fallen unit.
        unit_id: UnitId,
        /// Who dealt the killing blow, if anyone.
        killer_id: Option<UnitId>,
    },

    /// A death-triggered gold reward was granted.
    GoldReward {
        /// The recipient.
        unit_id: UnitId,
        /// Gold granted.
        amount: u32,
        /// Why it was granted.
        cause: RewardCause,
        /// Recipient's gold total after the grant.
        resulting_gold: u32,
    },

    /// The session ended.
    CombatEnded {
        /// The surviving side, or `None` on a draw or timeout.
        winner: Option<Side>,
    },
}

impl EventPayload {
    /// The wire `kind` tag for this payload.
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::UnitSpawned { .. } => "unit_spawned",
            Self::Damage { .. } => "damage",
            Self::Heal { .. } => "heal",
            Self::ManaDelta { .. } => "mana_delta",
            Self::StatEffectApplied { .. } => "stat_effect_applied",
            Self::StatEffectExpired { .. } => "stat_effect_expired",
            Self::ShieldApplied { .. } => "shield_applied",
            Self::ShieldExpired { .. } => "shield_expired",
            Self::StunApplied { .. } => "stun_applied",
            Self::StunExpired { .. } => "stun_expired",
            Self::DotApplied { .. } => "dot_applied",
            Self::DotTick { .. } => "dot_tick",
            Self::DotExpired { .. } => "dot_expired",
            Self::UnitDied { .. } => "unit_died",
            Self::GoldReward { .. } => "gold_reward",
            Self::CombatEnded { .. } => "combat_ended",
        }
    }

    /// The unit this event is about, if any.
    pub const fn subject(&self) -> Option<UnitId> {
        match self {
            Self::UnitSpawned { unit_id, .. }
            | Self::ManaDelta { unit_id, .. }
            | Self::StatEffectApplied { unit_id, .. }
            | Self::StatEffectExpired { unit_id, .. }
            | Self::ShieldApplied { unit_id, .. }
            | Self::ShieldExpired { unit_id, .. }
            | Self::StunApplied { unit_id, .. }
            | Self::StunExpired { unit_id, .. }
            | Self::DotApplied { unit_id, .. }
            | Self::DotTick { unit_id, .. }
            | Self::DotExpired { unit_id, .. }
            | Self::UnitDied { unit_id, .. }
            | Self::GoldReward { unit_id, .. } => Some(*unit_id),
            Self::Damage { target_id, .. } | Self::Heal { target_id, .. } => Some(*target_id),
            Self::CombatEnded { .. } => None,
        }
    }

    /// The effect created by this event, if it is an apply-kind event.
    pub const fn applied_effect(&self) -> Option<EffectId> {
        match self {
            Self::StatEffectApplied { effect_id, .. }
            | Self::ShieldApplied { effect_id, .. }
            | Self::StunApplied { effect_id, .. }
            | Self::DotApplied { effect_id, .. } => Some(*effect_id),
            _ => None,
        }
    }

    /// The effect destroyed by this event, if it is an expire-kind event.
    pub const fn expired_effect(&self) -> Option<EffectId> {
        match self {
            Self::StatEffectExpired { effect_id, .. }
            | Self::ShieldExpired { effect_id, .. }
            | Self::StunExpired { effect_id, .. }
            | Self::DotExpired { effect_id, .. } => Some(*effect_id),
            _ => None,
        }
    }
}
