//! Reconstructor: a pure fold of the event stream into a [`SessionStateView`].
//!
//! The reconstructor copies authoritative values out of each payload. It
//! never computes a delta, infers a stat, derives an expiry or consults a
//! snapshot. Effects enter the view only through apply-kind events and
//! leave it only through the expire-kind event carrying the same id.
//!
//! Stream order is checked as events arrive: the first seq must be 1 and
//! each seq must be exactly one more than the previous. Events of an
//! unknown kind are logged and skipped but still consume their seq.

use std::collections::{BTreeMap, BTreeSet};

use skirmish_types::{CanonicalEffect, EffectId, EffectKind, Event, EventPayload, UnitId};
use tracing::{trace, warn};

use crate::error::ProtocolViolation;
use crate::view::{SessionStateView, UnitRecord};
use crate::wire::{Decoded, WireEvent, decode};

/// Incremental stream consumer.
#[derive(Debug, Clone, Default)]
pub struct Reconstructor {
    view: SessionStateView,
    /// Every effect id ever applied; ids are never reused.
    seen_effects: BTreeSet<EffectId>,
}

impl Reconstructor {
    /// A consumer that has seen nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// The state so far.
    pub const fn view(&self) -> &SessionStateView {
        &self.view
    }

    /// Consume the reconstructor.
    pub fn into_view(self) -> SessionStateView {
        self.view
    }

    /// Seq of the last applied event.
    pub const fn last_seq(&self) -> u64 {
        self.view.last_seq
    }

    /// Apply one wire record.
    ///
    /// # Errors
    ///
    /// Returns a [`ProtocolViolation`] on any stream defect; the view is
    /// left as it was before the record.
    pub fn apply_wire(&mut self, wire: &WireEvent) -> Result<(), ProtocolViolation> {
        self.check_seq(wire.seq)?;
        match decode(wire)? {
            Decoded::Known(event) => self.apply_payload(&event),
            Decoded::Unknown { seq, kind } => {
                warn!(seq, kind = %kind, "Skipping unknown event kind");
                self.view.last_seq = seq;
                self.view.sim_time = wire.sim_time;
                self.view.skipped_unknown = self.view.skipped_unknown.saturating_add(1);
                Ok(())
            }
        }
    }

    /// Apply one typed event.
    ///
    /// # Errors
    ///
    /// Returns a [`ProtocolViolation`] on any stream defect.
    pub fn apply_event(&mut self, event: &Event) -> Result<(), ProtocolViolation> {
        self.check_seq(event.seq)?;
        self.apply_payload(event)
    }

    fn check_seq(&self, found: u64) -> Result<(), ProtocolViolation> {
        let previous = self.view.last_seq;
        let expected = previous.saturating_add(1);
        if found == expected {
            return Ok(());
        }
        if previous == 0 || found > expected {
            return Err(ProtocolViolation::SequenceGap { expected, found });
        }
        if found == previous {
            return Err(ProtocolViolation::DuplicateSeq { seq: found });
        }
        Err(ProtocolViolation::SeqRegression { previous, found })
    }

    fn record(&mut self, seq: u64, unit_id: UnitId) -> Result<&mut UnitRecord, ProtocolViolation> {
        self.view
            .units
            .get_mut(&unit_id)
            .ok_or(ProtocolViolation::UnknownUnit { seq, unit_id })
    }

    fn add_effect(
        &mut self,
        seq: u64,
        unit_id: UnitId,
        effect: CanonicalEffect,
    ) -> Result<(), ProtocolViolation> {
        if self.seen_effects.contains(&effect.id) {
            return Err(ProtocolViolation::DuplicateEffect {
                seq,
                effect_id: effect.id,
            });
        }
        self.record(seq, unit_id)?.effects.insert(effect.id, effect);
        self.seen_effects.insert(effect.id);
        Ok(())
    }

    fn remove_effect(
        &mut self,
        seq: u64,
        unit_id: UnitId,
        effect_id: EffectId,
    ) -> Result<(), ProtocolViolation> {
        self.record(seq, unit_id)?
            .effects
            .remove(&effect_id)
            .map(|_| ())
            .ok_or(ProtocolViolation::UnknownEffect {
                seq,
                unit_id,
                effect_id,
            })
    }

    fn require_effect(
        &mut self,
        seq: u64,
        unit_id: UnitId,
        effect_id: EffectId,
    ) -> Result<&mut UnitRecord, ProtocolViolation> {
        let record = self.record(seq, unit_id)?;
        if record.effects.contains_key(&effect_id) {
            Ok(record)
        } else {
            Err(ProtocolViolation::UnknownEffect {
                seq,
                unit_id,
                effect_id,
            })
        }
    }

    #[allow(clippy::too_many_lines)]
    fn apply_payload(&mut self, event: &Event) -> Result<(), ProtocolViolation> {
        let seq = event.seq;
        match &event.payload {
            EventPayload::UnitSpawned {
                unit_id,
                name,
                side,
                hp,
                max_hp,
                mana,
                max_mana,
                stats,
            } => {
                if self.view.units.contains_key(unit_id) {
                    return Err(ProtocolViolation::DuplicateSpawn {
                        seq,
                        unit_id: *unit_id,
                    });
                }
                self.view.units.insert(
                    *unit_id,
                    UnitRecord {
                        unit_id: *unit_id,
                        name: name.clone(),
                        side: *side,
                        hp: *hp,
                        max_hp: *max_hp,
                        shield: 0,
                        mana: *mana,
                        max_mana: *max_mana,
                        gold: 0,
                        stats: *stats,
                        alive: true,
                        effects: BTreeMap::new(),
                    },
                );
                self.view.spawn_order.push(*unit_id);
            }
            EventPayload::Damage {
                target_id,
                resulting_hp,
                resulting_shield,
                ..
            } => {
                let record = self.record(seq, *target_id)?;
                record.hp = *resulting_hp;
                record.shield = *resulting_shield;
            }
            EventPayload::Heal {
                target_id,
                resulting_hp,
                ..
            } => {
                self.record(seq, *target_id)?.hp = *resulting_hp;
            }
            EventPayload::ManaDelta {
                unit_id,
                resulting_mana,
                ..
            } => {
                self.record(seq, *unit_id)?.mana = *resulting_mana;
            }
            EventPayload::StatEffectApplied {
                unit_id,
                effect_id,
                effect_kind,
                stat,
                value,
                resulting_stat_value,
                duration,
                ..
            } => {
                self.add_effect(
                    seq,
                    *unit_id,
                    CanonicalEffect {
                        id: *effect_id,
                        kind: *effect_kind,
                        stat: Some(*stat),
                        value: *value,
                        duration: *duration,
                    },
                )?;
                self.record(seq, *unit_id)?
                    .stats
                    .set(*stat, *resulting_stat_value);
            }
            EventPayload::StatEffectExpired {
                unit_id,
                effect_id,
                stat,
                resulting_stat_value,
                ..
            } => {
                self.remove_effect(seq, *unit_id, *effect_id)?;
                self.record(seq, *unit_id)?
                    .stats
                    .set(*stat, *resulting_stat_value);
            }
            EventPayload::ShieldApplied {
                unit_id,
                effect_id,
                amount,
                duration,
                resulting_shield,
                ..
            } => {
                self.add_effect(
                    seq,
                    *unit_id,
                    CanonicalEffect {
                        id: *effect_id,
                        kind: EffectKind::Shield,
                        stat: None,
                        value: f64::from(*amount),
                        duration: Some(*duration),
                    },
                )?;
                self.record(seq, *unit_id)?.shield = *resulting_shield;
            }
            EventPayload::ShieldExpired {
                unit_id,
                effect_id,
                resulting_shield,
                ..
            } => {
                self.remove_effect(seq, *unit_id, *effect_id)?;
                self.record(seq, *unit_id)?.shield = *resulting_shield;
            }
            EventPayload::StunApplied {
                unit_id,
                effect_id,
                duration,
                ..
            } => {
                self.add_effect(
                    seq,
                    *unit_id,
                    CanonicalEffect {
                        id: *effect_id,
                        kind: EffectKind::Stun,
                        stat: None,
                        value: 0.0,
                        duration: Some(*duration),
                    },
                )?;
            }
            EventPayload::StunExpired {
                unit_id, effect_id, ..
            } => {
                self.remove_effect(seq, *unit_id, *effect_id)?;
            }
            EventPayload::DotApplied {
                unit_id,
                effect_id,
                damage_per_tick,
                duration,
                resulting_hp,
                ..
            } => {
                self.add_effect(
                    seq,
                    *unit_id,
                    CanonicalEffect {
                        id: *effect_id,
                        kind: EffectKind::DamageOverTime,
                        stat: None,
                        value: f64::from(*damage_per_tick),
                        duration: Some(*duration),
                    },
                )?;
                self.record(seq, *unit_id)?.hp = *resulting_hp;
            }
            EventPayload::DotTick {
                unit_id,
                effect_id,
                resulting_hp,
                ..
            } => {
                self.require_effect(seq, *unit_id, *effect_id)?.hp = *resulting_hp;
            }
            EventPayload::DotExpired {
                unit_id,
                effect_id,
                resulting_hp,
                ..
            } => {
                self.remove_effect(seq, *unit_id, *effect_id)?;
                self.record(seq, *unit_id)?.hp = *resulting_hp;
            }
            EventPayload::UnitDied { unit_id, .. } => {
                let record = self.record(seq, *unit_id)?;
                if !record.alive {
                    return Err(ProtocolViolation::DuplicateDeath {
                        seq,
                        unit_id: *unit_id,
                    });
                }
                record.alive = false;
            }
            EventPayload::GoldReward {
                unit_id,
                resulting_gold,
                ..
            } => {
                self.record(seq, *unit_id)?.gold = *resulting_gold;
            }
            EventPayload::CombatEnded { winner } => {
                self.view.ended = true;
                self.view.winner = *winner;
            }
        }
        self.view.last_seq = seq;
        self.view.sim_time = event.sim_time;
        trace!(seq, kind = event.payload.kind_name(), "Event applied");
        Ok(())
    }
}

/// Rebuild session state from wire records.
///
/// # Errors
///
/// Returns the first [`ProtocolViolation`] in the stream.
pub fn reconstruct(records: &[WireEvent]) -> Result<SessionStateView, ProtocolViolation> {
    let mut reconstructor = Reconstructor::new();
    for record in records {
        reconstructor.apply_wire(record)?;
    }
    Ok(reconstructor.into_view())
}

/// Rebuild session state from typed events.
///
/// # Errors
///
/// Returns the first [`ProtocolViolation`] in the stream.
pub fn reconstruct_events(events: &[Event]) -> Result<SessionStateView, ProtocolViolation> {
    let mut reconstructor = Reconstructor::new();
    for event in events {
        reconstructor.apply_event(event)?;
    }
    Ok(reconstructor.into_view())
}
