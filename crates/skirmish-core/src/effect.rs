//! Effect model and lifecycle state.
//!
//! An effect is created `Pending` by an apply operation, moves to `Active`
//! (timed) or `Permanent` (untimed stat effect) inside that same call, and
//! ends `Expired` exactly once. Every schedule value (`expires_at`, the next
//! DoT tick) is computed when the effect is created and never recomputed.

use skirmish_types::{
    CanonicalEffect, EffectId, EffectKind, SimDuration, SimTime, Stat, UnitId, ValueKind,
};

use crate::error::CoreError;

/// Lifecycle phase of an effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EffectPhase {
    /// Created but not yet applied to the unit.
    Pending,
    /// Applied and waiting for its expiry.
    Active,
    /// Applied with no expiry.
    Permanent,
    /// Reverted and removed. Terminal.
    Expired,
}

/// A buff or debuff on one stat.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatModifier {
    /// The modified stat.
    pub stat: Stat,
    /// Raw value as requested.
    pub value: f64,
    /// How `value` is interpreted.
    pub value_kind: ValueKind,
    /// Exact amount added to the live stat; subtracted again on expiry.
    pub applied_delta: f64,
}

/// Kind-specific effect data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EffectBody {
    /// Buff or debuff, classified by the sign of `value`.
    Stat(StatModifier),
    /// Damage absorption.
    Shield {
        /// Shield points granted.
        amount: u32,
        /// Points not yet consumed by damage.
        remaining: u32,
    },
    /// Prevents the unit from acting.
    Stun,
    /// Periodic damage.
    DamageOverTime {
        /// Damage dealt on each tick.
        damage_per_tick: u32,
        /// Time between ticks.
        interval: SimDuration,
        /// Ticks scheduled at creation.
        total_ticks: u32,
        /// Ticks not yet dealt.
        remaining_ticks: u32,
        /// When the next tick is due.
        next_tick_at: SimTime,
    },
}

/// An effect attached to a unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Effect {
    /// Session-unique id.
    pub id: EffectId,
    /// Who applied the effect.
    pub source: Option<UnitId>,
    /// Sim time of application.
    pub applied_at: SimTime,
    /// Total lifetime, `None` for permanent stat effects.
    pub duration: Option<SimDuration>,
    /// Absolute expiry, `None` for permanent stat effects.
    pub expires_at: Option<SimTime>,
    /// Lifecycle phase.
    pub phase: EffectPhase,
    /// Kind-specific data.
    pub body: EffectBody,
}

impl Effect {
    /// Build a pending effect and compute its absolute schedule.
    ///
    /// For damage over time, `duration` is ignored and derived as
    /// `interval * total_ticks`; the final tick lands on `expires_at`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TimeOverflow`] if the schedule does not fit the
    /// sim clock.
    pub fn pending(
        id: EffectId,
        source: Option<UnitId>,
        applied_at: SimTime,
        duration: Option<SimDuration>,
        body: EffectBody,
    ) -> Result<Self, CoreError> {
        let overflow = CoreError::TimeOverflow { effect_id: id };
        let (duration, body) = match body {
            EffectBody::DamageOverTime {
                damage_per_tick,
                interval,
                total_ticks,
                ..
            } => {
                let lifetime = interval
                    .checked_mul(u64::from(total_ticks))
                    .ok_or_else(|| overflow.clone())?;
                let next_tick_at = applied_at
                    .checked_add(interval)
                    .ok_or_else(|| overflow.clone())?;
                (
                    Some(lifetime),
                    EffectBody::DamageOverTime {
                        damage_per_tick,
                        interval,
                        total_ticks,
                        remaining_ticks: total_ticks,
                        next_tick_at,
                    },
                )
            }
            other => (duration, other),
        };
        let expires_at = match duration {
            Some(span) => Some(applied_at.checked_add(span).ok_or(overflow)?),
            None => None,
        };
        Ok(Self {
            id,
            source,
            applied_at,
            duration,
            expires_at,
            phase: EffectPhase::Pending,
            body,
        })
    }

    /// `Pending -> Active | Permanent`.
    pub const fn activate(&mut self) {
        if matches!(self.phase, EffectPhase::Pending) {
            self.phase = if self.expires_at.is_some() {
                EffectPhase::Active
            } else {
                EffectPhase::Permanent
            };
        }
    }

    /// Move to the terminal phase.
    pub const fn expire(&mut self) {
        self.phase = EffectPhase::Expired;
    }

    /// Whether the effect ends on its own.
    pub const fn is_permanent(&self) -> bool {
        matches!(self.phase, EffectPhase::Permanent)
    }

    /// The category tag.
    pub fn kind(&self) -> EffectKind {
        match self.body {
            EffectBody::Stat(modifier) => EffectKind::for_stat_value(modifier.value),
            EffectBody::Shield { .. } => EffectKind::Shield,
            EffectBody::Stun => EffectKind::Stun,
            EffectBody::DamageOverTime { .. } => EffectKind::DamageOverTime,
        }
    }

    /// The next sim time at which the lifecycle engine must act on this
    /// effect, if any.
    pub const fn next_due(&self) -> Option<SimTime> {
        if !matches!(self.phase, EffectPhase::Active) {
            return None;
        }
        match self.body {
            EffectBody::DamageOverTime { next_tick_at, .. } => Some(next_tick_at),
            EffectBody::Stat(_) | EffectBody::Shield { .. } | EffectBody::Stun => self.expires_at,
        }
    }

    /// The comparison form used in snapshots.
    pub fn canonical(&self) -> CanonicalEffect {
        let (stat, value) = match self.body {
            EffectBody::Stat(modifier) => (Some(modifier.stat), modifier.value),
            EffectBody::Shield { amount, .. } => (None, f64::from(amount)),
            EffectBody::Stun => (None, 0.0),
            EffectBody::DamageOverTime {
                damage_per_tick, ..
            } => (None, f64::from(damage_per_tick)),
        };
        CanonicalEffect {
            id: self.id,
            kind: self.kind(),
            stat,
            value,
            duration: self.duration,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn buff(duration: Option<SimDuration>) -> Effect {
        Effect::pending(
            EffectId::new(1),
            None,
            SimTime(1_000),
            duration,
            EffectBody::Stat(StatModifier {
                stat: Stat::Attack,
                value: 20.0,
                value_kind: ValueKind::Percentage,
                applied_delta: 10.0,
            }),
        )
        .unwrap()
    }

    #[test]
    fn timed_effect_becomes_active() {
        let mut effect = buff(Some(SimDuration(5_000)));
        assert_eq!(effect.phase, EffectPhase::Pending);
        assert_eq!(effect.expires_at, Some(SimTime(6_000)));
        effect.activate();
        assert_eq!(effect.phase, EffectPhase::Active);
        assert_eq!(effect.next_due(), Some(SimTime(6_000)));
    }

    #[test]
    fn untimed_effect_becomes_permanent() {
        let mut effect = buff(None);
        effect.activate();
        assert!(effect.is_permanent());
        assert_eq!(effect.next_due(), None);
    }

    #[test]
    fn expired_effect_is_never_due() {
        let mut effect = buff(Some(SimDuration(5)));
        effect.activate();
        effect.expire();
        effect.activate();
        assert_eq!(effect.phase, EffectPhase::Expired);
        assert_eq!(effect.next_due(), None);
    }

    #[test]
    fn dot_schedule_is_computed_once() {
        let mut effect = Effect::pending(
            EffectId::new(4),
            Some(UnitId::new(1)),
            SimTime(200),
            None,
            EffectBody::DamageOverTime {
                damage_per_tick: 5,
                interval: SimDuration(500),
                total_ticks: 3,
                remaining_ticks: 0,
                next_tick_at: SimTime::ZERO,
            },
        )
        .unwrap();
        effect.activate();
        assert_eq!(effect.duration, Some(SimDuration(1_500)));
        assert_eq!(effect.expires_at, Some(SimTime(1_700)));
        assert_eq!(effect.next_due(), Some(SimTime(700)));
        assert!(matches!(
            effect.body,
            EffectBody::DamageOverTime {
                remaining_ticks: 3,
                ..
            }
        ));
    }

    #[test]
    fn overflowing_schedule_is_an_error() {
        let result = Effect::pending(
            EffectId::new(2),
            None,
            SimTime(u64::MAX),
            Some(SimDuration(1)),
            EffectBody::Stun,
        );
        assert_eq!(
            result.err(),
            Some(CoreError::TimeOverflow {
                effect_id: EffectId::new(2)
            })
        );
    }

    #[test]
    fn canonical_form_per_kind() {
        let debuff = Effect::pending(
            EffectId::new(3),
            None,
            SimTime::ZERO,
            Some(SimDuration(100)),
            EffectBody::Stat(StatModifier {
                stat: Stat::Defense,
                value: -5.0,
                value_kind: ValueKind::Flat,
                applied_delta: -5.0,
            }),
        )
        .unwrap();
        let canonical = debuff.canonical();
        assert_eq!(canonical.kind, EffectKind::Debuff);
        assert_eq!(canonical.stat, Some(Stat::Defense));
        assert_eq!(canonical.duration, Some(SimDuration(100)));

        let shield = Effect::pending(
            EffectId::new(5),
            None,
            SimTime::ZERO,
            Some(SimDuration(100)),
            EffectBody::Shield {
                amount: 40,
                remaining: 12,
            },
        )
        .unwrap();
        let canonical = shield.canonical();
        assert_eq!(canonical.kind, EffectKind::Shield);
        assert!((canonical.value - 40.0).abs() < f64::EPSILON);
    }
}
