//! The combat session: sole owner of all mutable combat state.
//!
//! A session owns both rosters, the sim clock, the event sequencer, the
//! effect-id counter and the registered death handlers. Nothing outside the
//! session holds a mutable reference to a unit, so every state change is
//! forced through the Mutation Core and therefore produces an event.
//!
//! # Structure
//!
//! The session's operations are split across modules by concern:
//!
//! - this module: construction, spawning, accessors, snapshots, shutdown
//! - [`mutation`](crate::mutation): the Mutation Core apply operations
//! - [`lifecycle`](crate::lifecycle): clock advance, DoT ticks, expiry
//! - [`death`](crate::death): the death pipeline and reward handlers

use std::collections::BTreeMap;

use skirmish_types::{
    EffectId, EventPayload, ExpiryReason, SessionId, Side, SimTime, Snapshot, UnitId,
};
use tracing::{debug, info};

use crate::clock::SimClock;
use crate::death::DeathRewardHandler;
use crate::error::CoreError;
use crate::outcome::{Applied, MutationOutcome, RejectReason};
use crate::sequencer::{EventSequencer, EventSink};
use crate::unit::{Unit, UnitTemplate};

/// An authoritative combat session.
#[derive(Debug)]
pub struct CombatSession<S> {
    pub(crate) session_id: SessionId,
    pub(crate) clock: SimClock,
    pub(crate) sequencer: EventSequencer<S>,
    pub(crate) units: BTreeMap<UnitId, Unit>,
    /// Unit ids in spawn order.
    pub(crate) roster: Vec<UnitId>,
    next_unit_id: u32,
    next_effect_id: u64,
    pub(crate) death_handlers: Vec<Box<dyn DeathRewardHandler>>,
    pub(crate) ended: bool,
}

impl<S: EventSink> CombatSession<S> {
    /// An empty session emitting into `sink`.
    pub fn new(sink: S) -> Self {
        Self::with_session_id(SessionId::new(), sink)
    }

    /// An empty session with a caller-chosen session id.
    pub fn with_session_id(session_id: SessionId, sink: S) -> Self {
        Self {
            session_id,
            clock: SimClock::new(),
            sequencer: EventSequencer::new(sink),
            units: BTreeMap::new(),
            roster: Vec::new(),
            next_unit_id: 0,
            next_effect_id: 0,
            death_handlers: Vec::new(),
            ended: false,
        }
    }

    /// Append a death reward handler. Handlers run in registration order.
    pub fn register_death_handler(&mut self, handler: Box<dyn DeathRewardHandler>) {
        debug!(handler = handler.name(), "Death handler registered");
        self.death_handlers.push(handler);
    }

    /// Add a unit to the session and emit `unit_spawned`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTemplate`] for a template with zero hp,
    /// non-finite or negative stats, or a non-positive attack speed, and [`CoreError::SessionEnded`] after
    /// [`end_session`](Self::end_session).
    pub fn spawn(&mut self, template: &UnitTemplate) -> Result<UnitId, CoreError> {
        if self.ended {
            return Err(CoreError::SessionEnded);
        }
        if template.max_hp == 0 {
            return Err(CoreError::InvalidTemplate {
                reason: format!("{} has max_hp 0", template.name),
            });
        }
        if !template.stats.is_finite() {
            return Err(CoreError::InvalidTemplate {
                reason: format!("{} has non-finite stats", template.name),
            });
        }
        let stats = &template.stats;
        if stats.attack < 0.0 || stats.defense < 0.0 || stats.attack_speed <= 0.0 {
            return Err(CoreError::InvalidTemplate {
                reason: format!(
                    "{} needs non-negative attack and defense and a positive attack_speed",
                    template.name
                ),
            });
        }

        let raw = self
            .next_unit_id
            .checked_add(1)
            .ok_or(CoreError::UnitIdsExhausted)?;
        self.next_unit_id = raw;
        let unit_id = UnitId::new(raw);
        let unit = Unit::from_template(unit_id, template);

        let payload = EventPayload::UnitSpawned {
            unit_id,
            name: unit.name.clone(),
            side: unit.side,
            hp: unit.hp,
            max_hp: unit.max_hp,
            mana: unit.mana,
            max_mana: unit.max_mana,
            stats: unit.base_stats,
        };
        self.units.insert(unit_id, unit);
        self.roster.push(unit_id);
        self.emit(payload)?;

        debug!(unit_id = %unit_id, name = %template.name, side = %template.side, "Unit spawned");
        Ok(unit_id)
    }

    /// Session id (metadata only).
    pub const fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Current sim time.
    pub const fn now(&self) -> SimTime {
        self.clock.now()
    }

    /// The sim clock.
    pub const fn clock(&self) -> &SimClock {
        &self.clock
    }

    /// Seq of the most recent event (0 before the first).
    pub const fn last_seq(&self) -> u64 {
        self.sequencer.last_seq()
    }

    /// Whether [`end_session`](Self::end_session) has run.
    pub const fn is_ended(&self) -> bool {
        self.ended
    }

    /// Look up a unit.
    pub fn unit(&self, unit_id: UnitId) -> Option<&Unit> {
        self.units.get(&unit_id)
    }

    /// Unit ids in spawn order.
    pub fn roster(&self) -> &[UnitId] {
        &self.roster
    }

    /// Units in spawn order.
    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.roster.iter().filter_map(|id| self.units.get(id))
    }

    /// Living units of one side, in spawn order.
    pub fn living(&self, side: Side) -> impl Iterator<Item = &Unit> {
        self.units()
            .filter(move |unit| unit.is_alive() && unit.side() == side)
    }

    /// An independent copy of the full roster tagged with the current seq.
    pub fn export_snapshot(&self) -> Snapshot {
        Snapshot {
            session_id: self.session_id,
            seq: self.last_seq(),
            sim_time: self.now(),
            units: self.units().map(Unit::snapshot).collect(),
        }
    }

    /// Close the session.
    ///
    /// Every remaining non-permanent effect is expired with
    /// [`ExpiryReason::SessionEnded`], then `combat_ended` is emitted. All
    /// later mutations are rejected.
    ///
    /// # Errors
    ///
    /// Returns a [`CoreError`] if the sequence is exhausted.
    pub fn end_session(&mut self, winner: Option<Side>) -> Result<MutationOutcome, CoreError> {
        if self.ended {
            return Ok(MutationOutcome::Rejected(RejectReason::SessionClosed));
        }

        let pending: Vec<(UnitId, EffectId)> = self
            .units()
            .flat_map(|unit| {
                unit.effects()
                    .iter()
                    .filter(|effect| !effect.is_permanent())
                    .map(|effect| (unit.id(), effect.id))
            })
            .collect();
        for (unit_id, effect_id) in pending {
            self.expire_effect(unit_id, effect_id, ExpiryReason::SessionEnded)?;
        }

        let seq = self.emit(EventPayload::CombatEnded { winner })?;
        self.ended = true;
        info!(
            session_id = %self.session_id,
            winner = ?winner,
            sim_time = %self.now(),
            last_seq = seq,
            "Combat session ended"
        );
        Ok(MutationOutcome::Applied(Applied {
            seq,
            effect_id: None,
        }))
    }

    /// Borrow the sink.
    pub const fn sink(&self) -> &S {
        self.sequencer.sink()
    }

    /// Mutably borrow the sink.
    pub const fn sink_mut(&mut self) -> &mut S {
        self.sequencer.sink_mut()
    }

    /// Consume the session and return the sink.
    pub fn into_sink(self) -> S {
        self.sequencer.into_sink()
    }

    // -----------------------------------------------------------------------
    // Crate-internal helpers
    // -----------------------------------------------------------------------

    /// Emit one event at the current sim time.
    pub(crate) fn emit(&mut self, payload: EventPayload) -> Result<u64, CoreError> {
        let now = self.clock.now();
        self.sequencer.emit(now, payload)
    }

    /// Allocate the next effect id.
    pub(crate) fn allocate_effect_id(&mut self) -> Result<EffectId, CoreError> {
        let raw = self
            .next_effect_id
            .checked_add(1)
            .ok_or(CoreError::EffectIdsExhausted)?;
        self.next_effect_id = raw;
        Ok(EffectId::new(raw))
    }

    /// Mutable unit lookup that reports a missing unit as an invariant
    /// breach.
    pub(crate) fn unit_mut(&mut self, unit_id: UnitId) -> Result<&mut Unit, CoreError> {
        self.units.get_mut(&unit_id).ok_or_else(|| CoreError::Invariant {
            unit_id,
            context: "unit missing from roster".to_owned(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use skirmish_types::{SimDuration, StatBlock};

    use super::*;
    use crate::sequencer::EventLog;

    fn template(name: &str, side: Side) -> UnitTemplate {
        UnitTemplate::new(name, side, 100, StatBlock::new(50.0, 10.0, 1.0)).with_mana(50, 0)
    }

    #[test]
    fn spawn_assigns_dense_ids_and_emits() {
        let mut session = CombatSession::new(EventLog::new());
        let a = session.spawn(&template("Knight", Side::A)).unwrap();
        let b = session.spawn(&template("Orc", Side::B)).unwrap();
        assert_eq!(a, UnitId::new(1));
        assert_eq!(b, UnitId::new(2));
        assert_eq!(session.roster(), &[a, b]);
        assert_eq!(session.last_seq(), 2);

        let first = session.sink().events().first().unwrap();
        assert!(matches!(
            first.payload,
            EventPayload::UnitSpawned { hp: 100, max_mana: 50, .. }
        ));
    }

    #[test]
    fn zero_hp_template_is_rejected() {
        let mut session = CombatSession::new(EventLog::new());
        let mut bad = template("Ghost", Side::A);
        bad.max_hp = 0;
        assert!(matches!(
            session.spawn(&bad),
            Err(CoreError::InvalidTemplate { .. })
        ));
        assert!(session.sink().is_empty());
    }

    #[test]
    fn negative_base_stats_are_rejected() {
        let mut session = CombatSession::new(EventLog::new());
        for stats in [
            StatBlock::new(-50.0, 10.0, 1.0),
            StatBlock::new(50.0, -1.0, 1.0),
            StatBlock::new(50.0, 10.0, 0.0),
            StatBlock::new(50.0, 10.0, -0.5),
        ] {
            let bad = UnitTemplate::new("Cursed", Side::A, 100, stats);
            assert!(matches!(
                session.spawn(&bad),
                Err(CoreError::InvalidTemplate { .. })
            ));
        }
        assert!(session.sink().is_empty());
        assert!(session.roster().is_empty());

        // Zero attack and defense are still a legal unit.
        let pacifist = UnitTemplate::new("Monk", Side::A, 100, StatBlock::new(0.0, 0.0, 1.0));
        assert!(session.spawn(&pacifist).is_ok());
    }

    #[test]
    fn snapshot_is_an_independent_copy() {
        let mut session = CombatSession::new(EventLog::new());
        let a = session.spawn(&template("Knight", Side::A)).unwrap();
        let before = session.export_snapshot();
        let _ = session.apply_heal(a, 5).unwrap();
        let _ = session
            .apply_damage(None, a, 30, skirmish_types::DamageKind::Physical)
            .unwrap();
        let after = session.export_snapshot();
        assert_eq!(before.unit(a).map(|u| u.hp), Some(100));
        assert_eq!(after.unit(a).map(|u| u.hp), Some(70));
        assert_eq!(after.seq, session.last_seq());
    }

    #[test]
    fn end_session_expires_timed_effects_and_closes() {
        let mut session = CombatSession::new(EventLog::new());
        let a = session.spawn(&template("Knight", Side::A)).unwrap();
        let _ = session
            .apply_stun(a, SimDuration(1_000), None)
            .unwrap();
        let _ = session
            .apply_stat_effect(a, skirmish_types::Stat::Defense, 5.0, skirmish_types::ValueKind::Flat, None, None)
            .unwrap();

        let outcome = session.end_session(Some(Side::A)).unwrap();
        assert!(outcome.is_applied());
        assert!(session.is_ended());

        let kinds: Vec<&str> = session
            .sink()
            .events()
            .iter()
            .map(|e| e.payload.kind_name())
            .collect();
        assert_eq!(
            kinds,
            vec!["unit_spawned", "stun_applied", "stat_effect_applied", "stun_expired", "combat_ended"]
        );
        // The permanent effect survives shutdown.
        assert_eq!(session.unit(a).map(|u| u.effects().len()), Some(1));

        assert_eq!(
            session.end_session(None).unwrap(),
            MutationOutcome::Rejected(RejectReason::SessionClosed)
        );
        assert_eq!(
            session.apply_heal(a, 10).unwrap(),
            MutationOutcome::Rejected(RejectReason::SessionClosed)
        );
        assert!(matches!(
            session.spawn(&template("Late", Side::B)),
            Err(CoreError::SessionEnded)
        ));
    }
}
