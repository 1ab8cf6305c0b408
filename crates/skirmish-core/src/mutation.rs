//! Authoritative Mutation Core.
//!
//! Every change to unit state goes through one of these operations. Each
//! operation validates its request, mutates the unit, asks the sequencer
//! for the next seq and emits exactly one event carrying the post-mutation
//! values. A lethal hp change hands off to the death pipeline before the
//! operation returns.
//!
//! Expected conditions come back as [`MutationOutcome::Skipped`] or
//! [`MutationOutcome::Rejected`] with no event emitted. Only counter
//! exhaustion and invariant breaches are errors.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use skirmish_types::{
    DamageKind, EffectKind, EventPayload, RewardCause, SimDuration, Stat, UnitId, ValueKind,
};
use tracing::debug;

use crate::effect::{Effect, EffectBody, StatModifier};
use crate::error::CoreError;
use crate::outcome::{Applied, MutationOutcome, RejectReason, SkipReason};
use crate::sequencer::EventSink;
use crate::session::CombatSession;

/// Compute a percentage-of-base stat delta.
///
/// The product is taken in exact decimal arithmetic and rounded half to
/// even at the stat's precision (whole numbers for attack and defense, two
/// decimals for attack speed). Returns `None` if either input has no
/// decimal representation.
pub fn percentage_delta(base: f64, percent: f64, stat: Stat) -> Option<f64> {
    let base = Decimal::from_f64(base)?;
    let percent = Decimal::from_f64(percent)?;
    let raw = base
        .checked_mul(percent)?
        .checked_div(Decimal::ONE_HUNDRED)?;
    raw.round_dp_with_strategy(stat.delta_precision(), RoundingStrategy::MidpointNearestEven)
        .to_f64()
}

impl<S: EventSink> CombatSession<S> {
    /// Check that `target` exists, is alive and the session is open.
    fn gate(&self, target: UnitId) -> Option<MutationOutcome> {
        if self.ended {
            return Some(MutationOutcome::Rejected(RejectReason::SessionClosed));
        }
        match self.units.get(&target) {
            None => Some(MutationOutcome::Rejected(RejectReason::UnknownUnit(target))),
            Some(unit) if !unit.alive => Some(MutationOutcome::Skipped(SkipReason::TargetDead)),
            Some(_) => None,
        }
    }

    /// Register a freshly built effect on `target` and mark it active.
    fn attach(&mut self, target: UnitId, mut effect: Effect) -> Result<(), CoreError> {
        effect.activate();
        self.unit_mut(target)?.effects.push(effect);
        Ok(())
    }

    /// Deal direct damage.
    ///
    /// Shields absorb the damage first (oldest shield first) unless the
    /// damage is [`DamageKind::Periodic`]; the remainder is subtracted from
    /// hp with a floor of 0. If hp reaches 0 the death pipeline runs before
    /// this call returns, so the `damage` event always precedes the death
    /// rewards and `unit_died`.
    pub fn apply_damage(
        &mut self,
        attacker: Option<UnitId>,
        target: UnitId,
        raw_amount: u32,
        damage_kind: DamageKind,
    ) -> Result<MutationOutcome, CoreError> {
        if let Some(outcome) = self.gate(target) {
            return Ok(outcome);
        }
        if raw_amount == 0 {
            return Ok(MutationOutcome::Skipped(SkipReason::ZeroAmount));
        }

        let unit = self.unit_mut(target)?;
        let shield_absorbed = if matches!(damage_kind, DamageKind::Periodic) {
            0
        } else {
            unit.absorb(raw_amount)
        };
        let to_hp = raw_amount.saturating_sub(shield_absorbed);
        unit.hp = unit.hp.saturating_sub(to_hp);
        let resulting_hp = unit.hp;
        let resulting_shield = unit.shield;

        let seq = self.emit(EventPayload::Damage {
            attacker_id: attacker,
            target_id: target,
            damage_kind,
            raw_amount,
            shield_absorbed,
            resulting_hp,
            resulting_shield,
        })?;
        debug!(
            target_id = %target,
            raw_amount,
            shield_absorbed,
            resulting_hp,
            "Damage applied"
        );

        if resulting_hp == 0 {
            self.run_death_pipeline(target, attacker)?;
        }
        Ok(MutationOutcome::Applied(Applied {
            seq,
            effect_id: None,
        }))
    }

    /// Restore hp, clamped to `max_hp`.
    pub fn apply_heal(&mut self, target: UnitId, amount: u32) -> Result<MutationOutcome, CoreError> {
        if let Some(outcome) = self.gate(target) {
            return Ok(outcome);
        }
        if amount == 0 {
            return Ok(MutationOutcome::Skipped(SkipReason::ZeroAmount));
        }

        let unit = self.unit_mut(target)?;
        unit.hp = unit.hp.saturating_add(amount).min(unit.max_hp);
        let resulting_hp = unit.hp;

        let seq = self.emit(EventPayload::Heal {
            target_id: target,
            amount,
            resulting_hp,
        })?;
        debug!(target_id = %target, amount, resulting_hp, "Heal applied");
        Ok(MutationOutcome::Applied(Applied {
            seq,
            effect_id: None,
        }))
    }

    /// Change mana by `delta`, clamped to `[0, max_mana]`.
    pub fn apply_mana_delta(
        &mut self,
        target: UnitId,
        delta: i64,
    ) -> Result<MutationOutcome, CoreError> {
        if let Some(outcome) = self.gate(target) {
            return Ok(outcome);
        }
        if delta == 0 {
            return Ok(MutationOutcome::Skipped(SkipReason::ZeroAmount));
        }

        let unit = self.unit_mut(target)?;
        let clamped = i64::from(unit.mana)
            .saturating_add(delta)
            .clamp(0, i64::from(unit.max_mana));
        unit.mana = u32::try_from(clamped).unwrap_or(unit.max_mana);
        let resulting_mana = unit.mana;

        let seq = self.emit(EventPayload::ManaDelta {
            unit_id: target,
            delta,
            resulting_mana,
        })?;
        debug!(unit_id = %target, delta, resulting_mana, "Mana changed");
        Ok(MutationOutcome::Applied(Applied {
            seq,
            effect_id: None,
        }))
    }

    /// Apply a buff (non-negative `value`) or debuff (negative `value`).
    ///
    /// A flat value is added to the live stat as-is. A percentage value is
    /// taken of the unit's `base_stats`, never of the live stat, so stacked
    /// percentage effects never compound. The exact delta is stored on the
    /// effect and subtracted again on expiry. `duration` of `None` makes the
    /// effect permanent.
    pub fn apply_stat_effect(
        &mut self,
        target: UnitId,
        stat: Stat,
        value: f64,
        value_kind: ValueKind,
        duration: Option<SimDuration>,
        source: Option<UnitId>,
    ) -> Result<MutationOutcome, CoreError> {
        if let Some(outcome) = self.gate(target) {
            return Ok(outcome);
        }
        if !value.is_finite() {
            return Ok(MutationOutcome::Rejected(RejectReason::NonFiniteValue));
        }
        if duration.is_some_and(SimDuration::is_zero) {
            return Ok(MutationOutcome::Rejected(RejectReason::ZeroDuration));
        }

        let base = self.unit_mut(target)?.base_stats.get(stat);
        let applied_delta = match value_kind {
            ValueKind::Flat => value,
            ValueKind::Percentage => match percentage_delta(base, value, stat) {
                Some(delta) => delta,
                None => return Ok(MutationOutcome::Rejected(RejectReason::NonFiniteValue)),
            },
        };

        let effect_id = self.allocate_effect_id()?;
        let now = self.now();
        let effect = Effect::pending(
            effect_id,
            source,
            now,
            duration,
            EffectBody::Stat(StatModifier {
                stat,
                value,
                value_kind,
                applied_delta,
            }),
        )?;
        let expires_at = effect.expires_at;

        let unit = self.unit_mut(target)?;
        let resulting_stat_value = unit.stats.get(stat) + applied_delta;
        unit.stats.set(stat, resulting_stat_value);
        self.attach(target, effect)?;

        let seq = self.emit(EventPayload::StatEffectApplied {
            unit_id: target,
            effect_id,
            source_id: source,
            effect_kind: EffectKind::for_stat_value(value),
            stat,
            value,
            value_kind,
            applied_delta,
            resulting_stat_value,
            duration,
            expires_at,
        })?;
        debug!(
            unit_id = %target,
            effect_id = %effect_id,
            stat = %stat,
            applied_delta,
            resulting_stat_value,
            "Stat effect applied"
        );
        Ok(MutationOutcome::Applied(Applied {
            seq,
            effect_id: Some(effect_id),
        }))
    }

    /// Grant a timed shield.
    pub fn apply_shield(
        &mut self,
        target: UnitId,
        amount: u32,
        duration: SimDuration,
        source: Option<UnitId>,
    ) -> Result<MutationOutcome, CoreError> {
        if let Some(outcome) = self.gate(target) {
            return Ok(outcome);
        }
        if duration.is_zero() {
            return Ok(MutationOutcome::Rejected(RejectReason::ZeroDuration));
        }
        if amount == 0 {
            return Ok(MutationOutcome::Skipped(SkipReason::ZeroAmount));
        }
        let Some(resulting_shield) = self.unit_mut(target)?.shield.checked_add(amount) else {
            return Ok(MutationOutcome::Rejected(RejectReason::ShieldOverflow));
        };

        let effect_id = self.allocate_effect_id()?;
        let now = self.now();
        let effect = Effect::pending(
            effect_id,
            source,
            now,
            Some(duration),
            EffectBody::Shield {
                amount,
                remaining: amount,
            },
        )?;
        let expires_at = effect.expires_at.unwrap_or(now);

        self.unit_mut(target)?.shield = resulting_shield;
        self.attach(target, effect)?;

        let seq = self.emit(EventPayload::ShieldApplied {
            unit_id: target,
            effect_id,
            source_id: source,
            amount,
            duration,
            expires_at,
            resulting_shield,
        })?;
        debug!(unit_id = %target, effect_id = %effect_id, amount, resulting_shield, "Shield applied");
        Ok(MutationOutcome::Applied(Applied {
            seq,
            effect_id: Some(effect_id),
        }))
    }

    /// Stun a unit for `duration`.
    pub fn apply_stun(
        &mut self,
        target: UnitId,
        duration: SimDuration,
        source: Option<UnitId>,
    ) -> Result<MutationOutcome, CoreError> {
        if let Some(outcome) = self.gate(target) {
            return Ok(outcome);
        }
        if duration.is_zero() {
            return Ok(MutationOutcome::Rejected(RejectReason::ZeroDuration));
        }

        let effect_id = self.allocate_effect_id()?;
        let now = self.now();
        let effect = Effect::pending(effect_id, source, now, Some(duration), EffectBody::Stun)?;
        let expires_at = effect.expires_at.unwrap_or(now);
        self.attach(target, effect)?;

        let seq = self.emit(EventPayload::StunApplied {
            unit_id: target,
            effect_id,
            source_id: source,
            duration,
            expires_at,
        })?;
        debug!(unit_id = %target, effect_id = %effect_id, duration = %duration, "Stun applied");
        Ok(MutationOutcome::Applied(Applied {
            seq,
            effect_id: Some(effect_id),
        }))
    }

    /// Attach damage over time: `ticks` ticks of `damage_per_tick`, one
    /// every `interval`, the first one `interval` after now. Ticks bypass
    /// shields.
    pub fn apply_damage_over_time(
        &mut self,
        target: UnitId,
        damage_per_tick: u32,
        interval: SimDuration,
        ticks: u32,
        source: Option<UnitId>,
    ) -> Result<MutationOutcome, CoreError> {
        if let Some(outcome) = self.gate(target) {
            return Ok(outcome);
        }
        if interval.is_zero() {
            return Ok(MutationOutcome::Rejected(RejectReason::ZeroInterval));
        }
        if ticks == 0 {
            return Ok(MutationOutcome::Rejected(RejectReason::ZeroTicks));
        }
        if damage_per_tick == 0 {
            return Ok(MutationOutcome::Skipped(SkipReason::ZeroAmount));
        }

        let effect_id = self.allocate_effect_id()?;
        let now = self.now();
        let effect = Effect::pending(
            effect_id,
            source,
            now,
            None,
            EffectBody::DamageOverTime {
                damage_per_tick,
                interval,
                total_ticks: ticks,
                remaining_ticks: ticks,
                next_tick_at: now,
            },
        )?;
        let duration = effect.duration.unwrap_or(interval);
        let expires_at = effect.expires_at.unwrap_or(now);
        self.attach(target, effect)?;
        let resulting_hp = self.unit_mut(target)?.hp;

        let seq = self.emit(EventPayload::DotApplied {
            unit_id: target,
            effect_id,
            source_id: source,
            damage_per_tick,
            interval,
            ticks,
            duration,
            expires_at,
            resulting_hp,
        })?;
        debug!(
            unit_id = %target,
            effect_id = %effect_id,
            damage_per_tick,
            ticks,
            "Damage over time applied"
        );
        Ok(MutationOutcome::Applied(Applied {
            seq,
            effect_id: Some(effect_id),
        }))
    }

    /// Grant gold. Only death reward handlers reach this.
    pub(crate) fn grant_gold(
        &mut self,
        recipient: UnitId,
        amount: u32,
        cause: RewardCause,
    ) -> Result<MutationOutcome, CoreError> {
        if let Some(outcome) = self.gate(recipient) {
            return Ok(outcome);
        }
        if amount == 0 {
            return Ok(MutationOutcome::Skipped(SkipReason::ZeroAmount));
        }

        let unit = self.unit_mut(recipient)?;
        unit.gold = unit.gold.saturating_add(amount);
        let resulting_gold = unit.gold;

        let seq = self.emit(EventPayload::GoldReward {
            unit_id: recipient,
            amount,
            cause,
            resulting_gold,
        })?;
        debug!(unit_id = %recipient, amount, cause = %cause, resulting_gold, "Gold granted");
        Ok(MutationOutcome::Applied(Applied {
            seq,
            effect_id: None,
        }))
    }
}
