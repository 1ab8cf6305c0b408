//! End-to-end combat scenarios against the public session API.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::arithmetic_side_effects,
    clippy::too_many_lines
)]

use skirmish_core::death::{AllyDeathGold, KillBounty};
use skirmish_core::{CombatSession, EventLog, MutationOutcome, SkipReason, UnitTemplate};
use skirmish_types::{
    DamageKind, EventPayload, ExpiryReason, RewardCause, Side, SimDuration, Stat, StatBlock,
    UnitId, ValueKind,
};

fn session_with_handlers() -> CombatSession<EventLog> {
    let mut session = CombatSession::new(EventLog::new());
    session.register_death_handler(Box::new(AllyDeathGold { amount: 1 }));
    session.register_death_handler(Box::new(KillBounty { amount: 2 }));
    session
}

fn spawn(session: &mut CombatSession<EventLog>, name: &str, side: Side, hp: u32) -> UnitId {
    session
        .spawn(&UnitTemplate::new(name, side, hp, StatBlock::new(50.0, 10.0, 1.0)))
        .expect("spawn")
}

#[test]
fn ally_reward_precedes_unit_died() {
    let mut session = session_with_handlers();
    let target = spawn(&mut session, "Target", Side::A, 100);
    let ally = spawn(&mut session, "Ally", Side::A, 100);
    let enemy = spawn(&mut session, "Enemy", Side::B, 100);

    let first = session
        .apply_damage(Some(enemy), target, 30, DamageKind::Physical)
        .unwrap();
    let second = session
        .apply_damage(Some(enemy), target, 70, DamageKind::Physical)
        .unwrap();
    assert!(first.is_applied() && second.is_applied());

    let events = session.sink().events();
    let damage: Vec<_> = events
        .iter()
        .filter_map(|e| match e.payload {
            EventPayload::Damage { resulting_hp, .. } => Some((e.seq, resulting_hp)),
            _ => None,
        })
        .collect();
    assert_eq!(damage.iter().map(|d| d.1).collect::<Vec<_>>(), vec![70, 0]);

    let deaths: Vec<_> = events
        .iter()
        .filter(|e| matches!(e.payload, EventPayload::UnitDied { .. }))
        .collect();
    assert_eq!(deaths.len(), 1);

    let lethal_seq = damage[1].0;
    let ally_reward_seq = events
        .iter()
        .find_map(|e| match e.payload {
            EventPayload::GoldReward {
                unit_id,
                cause: RewardCause::AllyDeath,
                ..
            } if unit_id == ally => Some(e.seq),
            _ => None,
        })
        .expect("ally reward");
    assert!(ally_reward_seq > lethal_seq);
    assert!(ally_reward_seq < deaths[0].seq);
}

#[test]
fn percentage_buff_reverts_exactly_on_expiry() {
    let mut session = CombatSession::new(EventLog::new());
    let unit = spawn(&mut session, "Knight", Side::A, 100);

    let outcome = session
        .apply_stat_effect(
            unit,
            Stat::Attack,
            20.0,
            ValueKind::Percentage,
            Some(SimDuration::from_secs(5).unwrap()),
            None,
        )
        .unwrap();
    let effect_id = outcome.effect_id().expect("effect id");

    match session.sink().events().last().map(|e| &e.payload) {
        Some(EventPayload::StatEffectApplied {
            applied_delta,
            resulting_stat_value,
            ..
        }) => {
            assert!((applied_delta - 10.0).abs() < f64::EPSILON);
            assert!((resulting_stat_value - 60.0).abs() < f64::EPSILON);
        }
        other => panic!("unexpected event {other:?}"),
    }

    session.advance(SimDuration::from_millis(5_000)).unwrap();
    match session.sink().events().last().map(|e| &e.payload) {
        Some(EventPayload::StatEffectExpired {
            effect_id: expired,
            resulting_stat_value,
            reason,
            ..
        }) => {
            assert_eq!(*expired, effect_id);
            assert_eq!(*reason, ExpiryReason::Elapsed);
            assert!((resulting_stat_value - 50.0).abs() < f64::EPSILON);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn heal_on_dead_unit_is_skipped() {
    let mut session = CombatSession::new(EventLog::new());
    let unit = spawn(&mut session, "Knight", Side::A, 100);
    let _ = session
        .apply_damage(None, unit, 100, DamageKind::Physical)
        .unwrap();
    let before = session.sink().len();

    let outcome = session.apply_heal(unit, 25).unwrap();
    assert_eq!(outcome, MutationOutcome::Skipped(SkipReason::TargetDead));
    assert_eq!(session.sink().len(), before);
}

#[test]
fn repeated_lethal_damage_is_idempotent() {
    let mut session = session_with_handlers();
    let target = spawn(&mut session, "Target", Side::A, 10);
    let enemy = spawn(&mut session, "Enemy", Side::B, 10);

    for _ in 0..5 {
        let _ = session
            .apply_damage(Some(enemy), target, 50, DamageKind::Physical)
            .unwrap();
    }
    let events = session.sink().events();
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e.payload, EventPayload::Damage { .. }))
            .count(),
        1
    );
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e.payload, EventPayload::UnitDied { .. }))
            .count(),
        1
    );
    assert_eq!(session.unit(enemy).map(skirmish_core::Unit::gold), Some(2));
}

#[test]
fn seqs_are_dense_across_a_busy_session() {
    let mut session = session_with_handlers();
    let a = spawn(&mut session, "A", Side::A, 60);
    let b = spawn(&mut session, "B", Side::B, 60);
    let _ = session.apply_shield(a, 15, SimDuration(700), Some(a)).unwrap();
    let _ = session
        .apply_damage_over_time(b, 7, SimDuration(250), 6, Some(a))
        .unwrap();
    let _ = session.apply_stun(b, SimDuration(400), Some(a)).unwrap();
    for _ in 0..12 {
        session.advance(SimDuration(100)).unwrap();
        let _ = session
            .apply_damage(Some(b), a, 9, DamageKind::Physical)
            .unwrap();
    }
    let _ = session.end_session(None).unwrap();

    let seqs: Vec<u64> = session.sink().events().iter().map(|e| e.seq).collect();
    let expected: Vec<u64> = (1..=seqs.len() as u64).collect();
    assert_eq!(seqs, expected);
}
