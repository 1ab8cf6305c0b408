//! Unit model.
//!
//! Units are owned exclusively by their [`CombatSession`]; code outside
//! this crate only sees read accessors and [`UnitSnapshot`] copies. Every
//! field is mutated by the Mutation Core, the lifecycle engine or the death
//! pipeline, never directly by callers.
//!
//! [`CombatSession`]: crate::session::CombatSession

use skirmish_types::{Side, StatBlock, UnitId, UnitSnapshot};

use crate::death::DeathPhase;
use crate::effect::{Effect, EffectBody};

/// Static definition of a unit before it is spawned.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitTemplate {
    /// Display name.
    pub name: String,
    /// Team.
    pub side: Side,
    /// Maximum (and starting) hp.
    pub max_hp: u32,
    /// Maximum mana.
    pub max_mana: u32,
    /// Mana at spawn, clamped to `max_mana`.
    pub starting_mana: u32,
    /// Base stats; live stats start equal to these.
    pub stats: StatBlock,
}

impl UnitTemplate {
    /// A template with no mana pool.
    pub fn new(name: &str, side: Side, max_hp: u32, stats: StatBlock) -> Self {
        Self {
            name: name.to_owned(),
            side,
            max_hp,
            max_mana: 0,
            starting_mana: 0,
            stats,
        }
    }

    /// Set the mana pool.
    #[must_use]
    pub const fn with_mana(mut self, max_mana: u32, starting_mana: u32) -> Self {
        self.max_mana = max_mana;
        self.starting_mana = starting_mana;
        self
    }
}

/// A unit in a combat session.
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    pub(crate) id: UnitId,
    pub(crate) name: String,
    pub(crate) side: Side,
    pub(crate) hp: u32,
    pub(crate) max_hp: u32,
    pub(crate) shield: u32,
    pub(crate) mana: u32,
    pub(crate) max_mana: u32,
    pub(crate) gold: u32,
    pub(crate) stats: StatBlock,
    pub(crate) base_stats: StatBlock,
    /// Active and permanent effects, in application (id) order.
    pub(crate) effects: Vec<Effect>,
    pub(crate) alive: bool,
    pub(crate) death_phase: DeathPhase,
    death_processed: bool,
}

impl Unit {
    pub(crate) fn from_template(id: UnitId, template: &UnitTemplate) -> Self {
        Self {
            id,
            name: template.name.clone(),
            side: template.side,
            hp: template.max_hp,
            max_hp: template.max_hp,
            shield: 0,
            mana: template.starting_mana.min(template.max_mana),
            max_mana: template.max_mana,
            gold: 0,
            stats: template.stats,
            base_stats: template.stats,
            effects: Vec::new(),
            alive: true,
            death_phase: DeathPhase::Alive,
            death_processed: false,
        }
    }

    /// Unit id.
    pub const fn id(&self) -> UnitId {
        self.id
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Team.
    pub const fn side(&self) -> Side {
        self.side
    }

    /// Current hp.
    pub const fn hp(&self) -> u32 {
        self.hp
    }

    /// Maximum hp.
    pub const fn max_hp(&self) -> u32 {
        self.max_hp
    }

    /// Current total shield.
    pub const fn shield(&self) -> u32 {
        self.shield
    }

    /// Current mana.
    pub const fn mana(&self) -> u32 {
        self.mana
    }

    /// Maximum mana.
    pub const fn max_mana(&self) -> u32 {
        self.max_mana
    }

    /// Gold earned from death rewards.
    pub const fn gold(&self) -> u32 {
        self.gold
    }

    /// Live stats.
    pub const fn stats(&self) -> StatBlock {
        self.stats
    }

    /// Stats captured at spawn. Never modified.
    pub const fn base_stats(&self) -> StatBlock {
        self.base_stats
    }

    /// Active and permanent effects, in id order.
    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    /// Whether the unit is alive.
    pub const fn is_alive(&self) -> bool {
        self.alive
    }

    /// Where the unit is in the death pipeline.
    pub const fn death_phase(&self) -> DeathPhase {
        self.death_phase
    }

    /// Whether the death pipeline has finished for this unit.
    pub const fn death_processed(&self) -> bool {
        self.death_processed
    }

    /// Whether an active stun is attached.
    pub fn is_stunned(&self) -> bool {
        self.effects
            .iter()
            .any(|effect| matches!(effect.body, EffectBody::Stun))
    }

    /// Consume up to `amount` shield points, oldest shield first, and return
    /// how many were absorbed.
    pub(crate) fn absorb(&mut self, amount: u32) -> u32 {
        let mut left = amount;
        for effect in &mut self.effects {
            if left == 0 {
                break;
            }
            if let EffectBody::Shield { remaining, .. } = &mut effect.body {
                let taken = (*remaining).min(left);
                *remaining = remaining.saturating_sub(taken);
                left = left.saturating_sub(taken);
            }
        }
        let absorbed = amount.saturating_sub(left);
        self.shield = self.shield.saturating_sub(absorbed);
        absorbed
    }

    /// Index of an attached effect by id.
    pub(crate) fn effect_index(&self, effect_id: skirmish_types::EffectId) -> Option<usize> {
        self.effects.iter().position(|effect| effect.id == effect_id)
    }

    /// Mark the death pipeline complete. Only the death pipeline calls this.
    pub(crate) fn finalize_death(&mut self) {
        debug_assert_eq!(self.death_phase, DeathPhase::RewardsProcessed);
        self.death_phase = DeathPhase::Dead;
        self.death_processed = true;
    }

    /// An independent copy of this unit's state.
    pub fn snapshot(&self) -> UnitSnapshot {
        let mut effects: Vec<_> = self.effects.iter().map(Effect::canonical).collect();
        effects.sort_by_key(|effect| effect.id);
        UnitSnapshot {
            unit_id: self.id,
            name: self.name.clone(),
            side: self.side,
            hp: self.hp,
            max_hp: self.max_hp,
            shield: self.shield,
            mana: self.mana,
            max_mana: self.max_mana,
            gold: self.gold,
            stats: self.stats,
            alive: self.alive,
            effects,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use skirmish_types::{EffectId, SimDuration, SimTime};

    use super::*;

    fn knight() -> Unit {
        let template = UnitTemplate::new("Knight", Side::A, 100, StatBlock::new(50.0, 10.0, 1.0))
            .with_mana(50, 80);
        Unit::from_template(UnitId::new(1), &template)
    }

    fn shield(id: u64, amount: u32) -> Effect {
        let mut effect = Effect::pending(
            EffectId::new(id),
            None,
            SimTime::ZERO,
            Some(SimDuration(1_000)),
            EffectBody::Shield {
                amount,
                remaining: amount,
            },
        )
        .unwrap();
        effect.activate();
        effect
    }

    #[test]
    fn spawns_at_full_hp_with_clamped_mana() {
        let unit = knight();
        assert_eq!(unit.hp(), 100);
        assert_eq!(unit.mana(), 50);
        assert!(unit.is_alive());
        assert!(!unit.death_processed());
        assert_eq!(unit.stats(), unit.base_stats());
    }

    #[test]
    fn absorb_consumes_oldest_shield_first() {
        let mut unit = knight();
        unit.effects.push(shield(1, 10));
        unit.effects.push(shield(2, 15));
        unit.shield = 25;

        assert_eq!(unit.absorb(12), 12);
        assert_eq!(unit.shield(), 13);
        assert!(matches!(
            unit.effects.first().map(|e| e.body),
            Some(EffectBody::Shield { remaining: 0, .. })
        ));
        assert!(matches!(
            unit.effects.get(1).map(|e| e.body),
            Some(EffectBody::Shield { remaining: 13, .. })
        ));

        assert_eq!(unit.absorb(100), 13);
        assert_eq!(unit.shield(), 0);
    }

    #[test]
    fn snapshot_sorts_effects_by_id() {
        let mut unit = knight();
        unit.effects.push(shield(7, 5));
        unit.effects.push(shield(3, 5));
        let snapshot = unit.snapshot();
        let ids: Vec<_> = snapshot.effects.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![EffectId::new(3), EffectId::new(7)]);
    }
}
