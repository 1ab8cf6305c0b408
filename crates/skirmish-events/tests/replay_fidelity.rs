//! Full battles replayed through the wire format, reconstructor and desync
//! detector.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::arithmetic_side_effects,
    clippy::cast_possible_truncation,
    clippy::too_many_lines
)]

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use skirmish_core::death::handler_for;
use skirmish_core::{
    Battle, BattleOutcome, CombatSession, EventLog, RewardRule, StepObserver, SkirmishConfig,
    UnitTemplate,
};
use skirmish_events::{ProtocolViolation, WireEvent, desync, encode, reconstruct, reconstruct_events};
use skirmish_types::{
    DamageKind, EffectId, EffectKind, Event, EventPayload, ExpiryReason, Side, SimDuration,
    Snapshot, Stat, StatBlock, UnitId, ValueKind,
};

/// Takes a snapshot after every step.
#[derive(Default)]
struct EveryStep {
    snapshots: Vec<Snapshot>,
}

impl StepObserver<EventLog> for EveryStep {
    fn on_step(&mut self, _step: u64, session: &CombatSession<EventLog>) {
        self.snapshots.push(session.export_snapshot());
    }
}

struct Recorded {
    outcome: BattleOutcome,
    events: Vec<Event>,
    wire: Vec<WireEvent>,
    snapshots: Vec<Snapshot>,
}

fn record_battle(config: &SkirmishConfig) -> Recorded {
    let mut battle = Battle::new(config, EventLog::new()).expect("battle");
    let mut observer = EveryStep::default();
    observer.snapshots.push(battle.session().export_snapshot());
    let outcome = battle.run(&mut observer).expect("run");
    let events = battle.into_session().into_sink().into_events();
    let wire = events.iter().map(|e| encode(e).expect("encode")).collect();
    Recorded {
        outcome,
        events,
        wire,
        snapshots: observer.snapshots,
    }
}

fn default_battle() -> Recorded {
    record_battle(&SkirmishConfig::default())
}

#[test]
fn full_battle_replays_without_diffs() {
    let recorded = default_battle();
    let report = desync::run(&recorded.wire, &recorded.snapshots, 1e-9).unwrap();

    assert!(report.is_clean(), "diffs: {:?}", report.diffs);
    assert!(report.unchecked_snapshots.is_empty());
    assert_eq!(report.checked_snapshots, recorded.snapshots.len() as u64);
    assert_eq!(report.events_applied, recorded.wire.len() as u64);

    let view = reconstruct(&recorded.wire).unwrap();
    assert!(view.ended);
    assert_eq!(view.winner, recorded.outcome.winner);
    assert_eq!(view.last_seq, recorded.outcome.last_seq);
}

#[test]
fn typed_and_wire_reconstruction_agree() {
    let recorded = default_battle();
    assert_eq!(
        reconstruct(&recorded.wire).unwrap(),
        reconstruct_events(&recorded.events).unwrap()
    );
}

#[test]
fn identical_seed_gives_identical_wire_stream() {
    let first = default_battle();
    let second = default_battle();
    let a: Vec<Value> = first.wire.iter().map(|w| serde_json::to_value(w).unwrap()).collect();
    let b: Vec<Value> = second.wire.iter().map(|w| serde_json::to_value(w).unwrap()).collect();
    assert_eq!(a, b);
}

#[test]
fn effect_ids_are_unique_and_expire_exactly_once() {
    let recorded = default_battle();
    let mut applied: BTreeMap<EffectId, bool> = BTreeMap::new();
    let mut expired: BTreeSet<EffectId> = BTreeSet::new();

    for event in &recorded.events {
        if let Some(id) = event.payload.applied_effect() {
            let permanent = matches!(
                event.payload,
                EventPayload::StatEffectApplied { duration: None, .. }
            );
            assert!(applied.insert(id, permanent).is_none(), "{id} applied twice");
        }
        if let Some(id) = event.payload.expired_effect() {
            assert!(applied.contains_key(&id), "{id} expired before it was applied");
            assert!(expired.insert(id), "{id} expired twice");
        }
    }

    assert!(!applied.is_empty());
    for (id, permanent) in &applied {
        if !permanent {
            assert!(expired.contains(id), "{id} never expired");
        }
    }
}

#[test]
fn stat_deltas_match_value_sign() {
    let recorded = default_battle();
    let mut checked = 0;
    for event in &recorded.events {
        if let EventPayload::StatEffectApplied {
            value,
            applied_delta,
            ..
        } = event.payload
        {
            checked += 1;
            if value > 0.0 {
                assert!(applied_delta >= 0.0, "seq {}", event.seq);
            } else if value < 0.0 {
                assert!(applied_delta <= 0.0, "seq {}", event.seq);
            }
        }
    }
    assert!(checked > 0);
}

#[test]
fn session_end_expires_timed_effects_but_keeps_permanent_ones() {
    let mut session = CombatSession::new(EventLog::new());
    let knight = session
        .spawn(&UnitTemplate::new("Knight", Side::A, 100, StatBlock::new(50.0, 10.0, 1.0)))
        .unwrap();
    let _ = session
        .apply_stat_effect(knight, Stat::Defense, 5.0, ValueKind::Flat, None, None)
        .unwrap();
    let _ = session
        .apply_stat_effect(
            knight,
            Stat::Attack,
            -10.0,
            ValueKind::Percentage,
            Some(SimDuration(2_000)),
            None,
        )
        .unwrap();
    let _ = session.apply_shield(knight, 20, SimDuration(4_000), None).unwrap();
    let _ = session
        .apply_damage_over_time(knight, 3, SimDuration(500), 4, None)
        .unwrap();
    session.advance(SimDuration(1_000)).unwrap();
    let _ = session
        .apply_damage(None, knight, 30, DamageKind::Physical)
        .unwrap();
    let before_end = session.export_snapshot();
    let _ = session.end_session(None).unwrap();
    let after_end = session.export_snapshot();

    let events = session.into_sink().into_events();
    let wire: Vec<WireEvent> = events.iter().map(|e| encode(e).unwrap()).collect();
    let report = desync::run(&wire, &[before_end, after_end], 1e-9).unwrap();
    assert!(report.is_clean(), "diffs: {:?}", report.diffs);
    assert_eq!(report.checked_snapshots, 2);

    let session_ended = events
        .iter()
        .filter(|e| {
            matches!(
                e.payload,
                EventPayload::StatEffectExpired {
                    reason: ExpiryReason::SessionEnded,
                    ..
                } | EventPayload::ShieldExpired {
                    reason: ExpiryReason::SessionEnded,
                    ..
                } | EventPayload::DotExpired {
                    reason: ExpiryReason::SessionEnded,
                    ..
                }
            )
        })
        .count();
    assert_eq!(session_ended, 3);

    let view = reconstruct(&wire).unwrap();
    let record = view.unit(knight).unwrap();
    assert_eq!(record.effects.len(), 1);
    assert!((record.stats.defense - 15.0).abs() < f64::EPSILON);
}

fn position(events: &[Event], what: impl Fn(&EventPayload) -> bool) -> usize {
    events
        .iter()
        .position(|e| what(&e.payload))
        .expect("event present")
}

#[test]
fn dot_kill_with_vengeance_and_debuff_replays_cleanly() {
    let mut session = CombatSession::new(EventLog::new());
    session.register_death_handler(handler_for(&RewardRule::Vengeance {
        stat: Stat::Attack,
        percent: 10.0,
        duration_ms: 3_000,
    }));
    let mut spawn = |name: &str, side, hp| {
        session
            .spawn(&UnitTemplate::new(name, side, hp, StatBlock::new(50.0, 10.0, 1.0)))
            .unwrap()
    };
    let knight = spawn("Knight", Side::A, 100);
    let orc = spawn("Orc", Side::B, 20);
    let goblin = spawn("Goblin", Side::B, 60);

    let mut snapshots = vec![session.export_snapshot()];
    let sunder = session
        .apply_stat_effect(
            orc,
            Stat::Defense,
            -30.0,
            ValueKind::Percentage,
            Some(SimDuration(4_000)),
            Some(knight),
        )
        .unwrap()
        .effect_id()
        .unwrap();
    let venom = session
        .apply_damage_over_time(orc, 5, SimDuration(500), 4, Some(knight))
        .unwrap()
        .effect_id()
        .unwrap();
    snapshots.push(session.export_snapshot());
    for _ in 0..60 {
        session.advance(SimDuration(100)).unwrap();
        snapshots.push(session.export_snapshot());
    }
    let _ = session.end_session(Some(Side::A)).unwrap();
    snapshots.push(session.export_snapshot());

    let events = session.into_sink().into_events();
    let wire: Vec<WireEvent> = events.iter().map(|e| encode(e).unwrap()).collect();
    let report = desync::run(&wire, &snapshots, 1e-9).unwrap();
    assert!(report.is_clean(), "diffs: {:?}", report.diffs);
    assert_eq!(report.checked_snapshots, snapshots.len() as u64);

    // Lethal tick, then the reward, then the purge, then the announcement.
    let lethal = position(&events, |p| {
        matches!(p, EventPayload::DotTick { unit_id, resulting_hp: 0, .. } if *unit_id == orc)
    });
    let reward = position(&events, |p| {
        matches!(p, EventPayload::StatEffectApplied { unit_id, source_id: Some(src), .. }
            if *unit_id == goblin && *src == orc)
    });
    let purge = position(&events, |p| {
        matches!(p, EventPayload::StatEffectExpired { effect_id, reason: ExpiryReason::OwnerDied, .. }
            if *effect_id == sunder)
    });
    let died = position(&events, |p| {
        matches!(p, EventPayload::UnitDied { unit_id, .. } if *unit_id == orc)
    });
    assert!(lethal < reward, "lethal {lethal} reward {reward}");
    assert!(reward < purge, "reward {reward} purge {purge}");
    assert!(purge < died, "purge {purge} died {died}");
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e.payload, EventPayload::UnitDied { .. }))
            .count(),
        1
    );

    // Vengeance went to the fallen unit's side only.
    let rewarded: Vec<UnitId> = events
        .iter()
        .filter_map(|e| match e.payload {
            EventPayload::StatEffectApplied {
                unit_id,
                source_id: Some(src),
                ..
            } if src == orc => Some(unit_id),
            _ => None,
        })
        .collect();
    assert_eq!(rewarded, vec![goblin]);

    // Every effect expires exactly once.
    let mut expiries: BTreeMap<EffectId, Vec<ExpiryReason>> = BTreeMap::new();
    for event in &events {
        if let Some(id) = event.payload.expired_effect() {
            let reason = match event.payload {
                EventPayload::StatEffectExpired { reason, .. }
                | EventPayload::DotExpired { reason, .. }
                | EventPayload::ShieldExpired { reason, .. }
                | EventPayload::StunExpired { reason, .. } => reason,
                _ => panic!("unexpected expiry event {:?}", event.payload),
            };
            expiries.entry(id).or_default().push(reason);
        }
    }
    let applied: Vec<EffectId> = events
        .iter()
        .filter_map(|e| e.payload.applied_effect())
        .collect();
    assert_eq!(applied.len(), 3);
    for id in &applied {
        assert_eq!(expiries.get(id).map(Vec::len), Some(1), "{id}");
    }
    assert_eq!(expiries[&sunder], vec![ExpiryReason::OwnerDied]);
    assert_eq!(expiries.get(&venom).map(Vec::len), Some(1));
    let vengeance = applied[2];
    assert_eq!(expiries[&vengeance], vec![ExpiryReason::Elapsed]);

    // Sign and kind agree for both the debuff and the reward buff.
    for event in &events {
        if let EventPayload::StatEffectApplied {
            effect_kind,
            value,
            applied_delta,
            ..
        } = event.payload
        {
            if value < 0.0 {
                assert_eq!(effect_kind, EffectKind::Debuff);
                assert!(applied_delta < 0.0);
            } else {
                assert_eq!(effect_kind, EffectKind::Buff);
                assert!(applied_delta > 0.0);
            }
        }
    }

    let view = reconstruct(&wire).unwrap();
    assert!(!view.unit(orc).unwrap().alive);
    assert!(view.unit(orc).unwrap().effects.is_empty());
    let goblin_record = view.unit(goblin).unwrap();
    assert!(goblin_record.effects.is_empty());
    assert!((goblin_record.stats.attack - 50.0).abs() < f64::EPSILON);
}

#[test]
fn missing_field_is_a_protocol_violation() {
    let mut recorded = default_battle();
    let index = recorded
        .wire
        .iter()
        .position(|w| w.kind == "damage")
        .expect("a damage event");
    recorded.wire[index].fields.remove("resulting_hp");
    let seq = recorded.wire[index].seq;

    assert_eq!(
        reconstruct(&recorded.wire),
        Err(ProtocolViolation::MissingField {
            kind: "damage".to_owned(),
            seq,
            field: "resulting_hp",
        })
    );
}

#[test]
fn dropped_event_is_a_sequence_gap() {
    let mut recorded = default_battle();
    let dropped = recorded.wire.remove(10);

    assert_eq!(
        desync::run(&recorded.wire, &recorded.snapshots, 1e-9),
        Err(ProtocolViolation::SequenceGap {
            expected: dropped.seq,
            found: dropped.seq + 1,
        })
    );
}

#[test]
fn tampered_hp_is_reported_as_a_diff() {
    let mut recorded = default_battle();
    let index = recorded
        .wire
        .iter()
        .rposition(|w| w.fields.contains_key("resulting_hp"))
        .expect("an hp-carrying event");
    let record = &mut recorded.wire[index];
    let hp = record.fields["resulting_hp"].as_u64().unwrap();
    record
        .fields
        .insert("resulting_hp".to_owned(), Value::from(hp + 1));
    let unit_field = if record.kind == "damage" || record.kind == "heal" {
        "target_id"
    } else {
        "unit_id"
    };
    let unit_id = record.fields[unit_field].as_u64().unwrap();

    let report = desync::run(&recorded.wire, &recorded.snapshots, 1e-9).unwrap();
    assert!(!report.is_clean());
    assert!(report.diffs.iter().all(|d| d.field == "hp"));
    assert!(
        report
            .diffs
            .iter()
            .all(|d| d.unit_id.map(|id| u64::from(id.into_inner())) == Some(unit_id))
    );
    assert_eq!(report.diffs.last().map(|d| d.actual.clone()), Some((hp + 1).to_string()));
}
