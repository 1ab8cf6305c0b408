//! Effect Lifecycle Engine.
//!
//! Advancing the session clock drives every timed effect: damage over time
//! ticks on its interval boundaries, and timed effects whose stored expiry
//! has been reached are reverted. All due work up to the new clock reading
//! is processed in `(due_time, effect_id)` order, so effects due in the same
//! step always resolve the same way.

use skirmish_types::{EffectId, EventPayload, ExpiryReason, SimDuration, SimTime, UnitId};
use tracing::{debug, trace};

use crate::effect::EffectBody;
use crate::error::CoreError;
use crate::sequencer::EventSink;
use crate::session::CombatSession;

impl<S: EventSink> CombatSession<S> {
    /// Move the clock forward by `step` and process everything that became
    /// due.
    ///
    /// # Errors
    ///
    /// Returns a [`CoreError`] if the clock or a counter overflows.
    pub fn advance(&mut self, step: SimDuration) -> Result<SimTime, CoreError> {
        let now = self.clock.advance(step)?;
        trace!(sim_time = %now, step = self.clock.steps(), "Clock advanced");
        self.process_due_effects(now)?;
        Ok(now)
    }

    /// The earliest effect due at or before `now`, by `(due, id)`.
    fn next_due_effect(&self, now: SimTime) -> Option<(SimTime, EffectId, UnitId)> {
        self.units()
            .flat_map(|unit| {
                unit.effects()
                    .iter()
                    .filter_map(move |effect| effect.next_due().map(|due| (due, effect.id, unit.id())))
            })
            .filter(|(due, _, _)| *due <= now)
            .min_by_key(|(due, id, _)| (*due, *id))
    }

    fn process_due_effects(&mut self, now: SimTime) -> Result<(), CoreError> {
        while let Some((due, effect_id, unit_id)) = self.next_due_effect(now) {
            let is_dot = self
                .unit(unit_id)
                .and_then(|unit| unit.effects().iter().find(|effect| effect.id == effect_id))
                .is_some_and(|effect| matches!(effect.body, EffectBody::DamageOverTime { .. }));
            trace!(effect_id = %effect_id, unit_id = %unit_id, due = %due, "Effect due");
            if is_dot {
                self.dot_tick(unit_id, effect_id)?;
            } else {
                self.expire_effect(unit_id, effect_id, ExpiryReason::Elapsed)?;
            }
        }
        Ok(())
    }

    /// Deal one damage-over-time tick.
    fn dot_tick(&mut self, unit_id: UnitId, effect_id: EffectId) -> Result<(), CoreError> {
        let unit = self.unit_mut(unit_id)?;
        let index = unit.effect_index(effect_id).ok_or_else(|| CoreError::Invariant {
            unit_id,
            context: format!("due effect {effect_id} missing"),
        })?;
        let effect = unit.effects.get_mut(index).ok_or_else(|| CoreError::Invariant {
            unit_id,
            context: format!("effect index for {effect_id} out of range"),
        })?;
        let source = effect.source;
        let EffectBody::DamageOverTime {
            damage_per_tick,
            interval,
            remaining_ticks,
            next_tick_at,
            ..
        } = &mut effect.body
        else {
            return Err(CoreError::Invariant {
                unit_id,
                context: format!("{effect_id} is not damage over time"),
            });
        };
        *remaining_ticks = remaining_ticks.saturating_sub(1);
        *next_tick_at = next_tick_at
            .checked_add(*interval)
            .ok_or(CoreError::TimeOverflow { effect_id })?;
        let damage = *damage_per_tick;
        let remaining = *remaining_ticks;

        unit.hp = unit.hp.saturating_sub(damage);
        let resulting_hp = unit.hp;

        self.emit(EventPayload::DotTick {
            unit_id,
            effect_id,
            damage,
            remaining_ticks: remaining,
            resulting_hp,
        })?;
        debug!(unit_id = %unit_id, effect_id = %effect_id, damage, remaining, resulting_hp, "DoT tick");

        if remaining == 0 {
            self.expire_effect(unit_id, effect_id, ExpiryReason::Exhausted)?;
        }
        if resulting_hp == 0 {
            self.run_death_pipeline(unit_id, source)?;
        }
        Ok(())
    }

    /// Remove an effect, revert what it changed and emit its expire event.
    ///
    /// Returns the seq of the expire event.
    pub(crate) fn expire_effect(
        &mut self,
        unit_id: UnitId,
        effect_id: EffectId,
        reason: ExpiryReason,
    ) -> Result<u64, CoreError> {
        let unit = self.unit_mut(unit_id)?;
        let index = unit.effect_index(effect_id).ok_or_else(|| CoreError::Invariant {
            unit_id,
            context: format!("expiring unknown effect {effect_id}"),
        })?;
        let mut effect = unit.effects.remove(index);
        effect.expire();

        let payload = match effect.body {
            EffectBody::Stat(modifier) => {
                let resulting_stat_value = unit.stats.get(modifier.stat) - modifier.applied_delta;
                unit.stats.set(modifier.stat, resulting_stat_value);
                EventPayload::StatEffectExpired {
                    unit_id,
                    effect_id,
                    stat: modifier.stat,
                    resulting_stat_value,
                    reason,
                }
            }
            EffectBody::Shield { remaining, .. } => {
                unit.shield = unit.shield.saturating_sub(remaining);
                EventPayload::ShieldExpired {
                    unit_id,
                    effect_id,
                    resulting_shield: unit.shield,
                    reason,
                }
            }
            EffectBody::Stun => EventPayload::StunExpired {
                unit_id,
                effect_id,
                reason,
            },
            EffectBody::DamageOverTime { .. } => EventPayload::DotExpired {
                unit_id,
                effect_id,
                resulting_hp: unit.hp,
                reason,
            },
        };

        let seq = self.emit(payload)?;
        debug!(unit_id = %unit_id, effect_id = %effect_id, reason = ?reason, "Effect expired");
        Ok(seq)
    }
}
