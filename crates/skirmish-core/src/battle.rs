//! Battle driver: turns a configured roster into Mutation Core intents.
//!
//! The driver owns a [`CombatSession`] and runs a fixed-step loop:
//!
//! 1. Advance the clock (the lifecycle engine ticks and expires effects).
//! 2. End the battle if a side has been eliminated.
//! 3. Regenerate mana for every living unit.
//! 4. Every living, un-stunned unit whose attack timer is ready hits the
//!    first living enemy in spawn order, gains mana, and casts its skill on
//!    full mana.
//! 5. End the battle on elimination or when the time limit is reached.
//!
//! The driver never touches unit state itself. Crits come from a seeded
//! RNG, so the same seed and roster always produce the same event stream.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use skirmish_types::{DamageKind, Side, SimDuration, SimTime, Stat, StatBlock, UnitId, ValueKind};
use tracing::{debug, info, warn};

use crate::config::{CombatRules, FighterConfig, SkirmishConfig};
use crate::death::handler_for;
use crate::error::CoreError;
use crate::outcome::MutationOutcome;
use crate::sequencer::EventSink;
use crate::session::CombatSession;
use crate::unit::UnitTemplate;

/// Crit rolls are drawn from `0..CRIT_ROLL_RANGE`.
const CRIT_ROLL_RANGE: u32 = 10_000;

// ---------------------------------------------------------------------------
// Skills
// ---------------------------------------------------------------------------

/// A skill a unit casts when its mana is full.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Skill {
    /// Percentage buff on every living ally, the caster included.
    Rally {
        /// Buffed stat.
        stat: Stat,
        /// Percentage of base stat.
        percent: f64,
        /// Buff lifetime in sim milliseconds.
        duration_ms: u64,
    },
    /// Shield on the caster.
    Barrier {
        /// Shield points.
        amount: u32,
        /// Shield lifetime in sim milliseconds.
        duration_ms: u64,
    },
    /// Damage over time on the current target.
    Venom {
        /// Damage per tick.
        damage_per_tick: u32,
        /// Milliseconds between ticks.
        interval_ms: u64,
        /// Number of ticks.
        ticks: u32,
    },
    /// Magic damage and a stun on the current target.
    Bash {
        /// Magic damage dealt.
        damage: u32,
        /// Stun lifetime in sim milliseconds.
        stun_ms: u64,
    },
    /// Heal the most wounded living ally.
    Mend {
        /// Hp restored.
        amount: u32,
    },
    /// Percentage debuff on the current target.
    Sunder {
        /// Debuffed stat.
        stat: Stat,
        /// Percentage of base stat removed.
        percent: f64,
        /// Debuff lifetime in sim milliseconds.
        duration_ms: u64,
    },
}

// ---------------------------------------------------------------------------
// Outcome and observers
// ---------------------------------------------------------------------------

/// Why a battle stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// At least one side has no living units.
    Elimination,
    /// The time limit was reached.
    Timeout,
}

/// Summary of a finished battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BattleOutcome {
    /// The surviving side, `None` on a draw or timeout.
    pub winner: Option<Side>,
    /// Why the battle stopped.
    pub reason: EndReason,
    /// Sim time of `combat_ended`.
    pub ended_at: SimTime,
    /// Steps run.
    pub steps: u64,
    /// Seq of `combat_ended`.
    pub last_seq: u64,
}

/// Called after every battle step.
pub trait StepObserver<S> {
    /// Inspect the session after step `step` (1-based) completed.
    fn on_step(&mut self, step: u64, session: &CombatSession<S>);
}

/// Observer that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl<S> StepObserver<S> for NoOpObserver {
    fn on_step(&mut self, _step: u64, _session: &CombatSession<S>) {}
}

// ---------------------------------------------------------------------------
// Battle
// ---------------------------------------------------------------------------

/// Whether a side has been wiped out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Standing {
    Contested,
    /// The survivor, `None` if both sides fell together.
    Decided(Option<Side>),
}

#[derive(Debug, Clone)]
struct FighterState {
    skill: Option<Skill>,
    next_attack_at: Option<SimTime>,
}

/// A configured battle between two rosters.
#[derive(Debug)]
pub struct Battle<S> {
    session: CombatSession<S>,
    rules: CombatRules,
    step: SimDuration,
    time_limit: SimTime,
    rng: StdRng,
    fighters: BTreeMap<UnitId, FighterState>,
    outcome: Option<BattleOutcome>,
}

impl<S: EventSink> Battle<S> {
    /// Build a session from `config`, register its reward handlers and
    /// spawn both teams (side A first, each in listed order).
    ///
    /// # Errors
    ///
    /// Returns a [`CoreError`] if a fighter cannot be spawned.
    pub fn new(config: &SkirmishConfig, sink: S) -> Result<Self, CoreError> {
        Self::with_session(config, CombatSession::new(sink))
    }

    /// Like [`new`](Self::new) but with a caller-built empty session.
    ///
    /// # Errors
    ///
    /// Returns a [`CoreError`] if a fighter cannot be spawned.
    pub fn with_session(
        config: &SkirmishConfig,
        mut session: CombatSession<S>,
    ) -> Result<Self, CoreError> {
        for rule in &config.rewards {
            session.register_death_handler(handler_for(rule));
        }

        let mut fighters = BTreeMap::new();
        let teams = config
            .teams
            .a
            .iter()
            .map(|f| (Side::A, f))
            .chain(config.teams.b.iter().map(|f| (Side::B, f)));
        for (side, fighter) in teams {
            let template = fighter_template(fighter, side);
            let unit_id = session.spawn(&template)?;
            fighters.insert(
                unit_id,
                FighterState {
                    skill: fighter.skill.clone(),
                    next_attack_at: attack_interval(template.stats.attack_speed)
                        .and_then(|span| SimTime::ZERO.checked_add(span)),
                },
            );
        }

        info!(
            session_id = %session.session_id(),
            seed = config.session.seed,
            side_a = config.teams.a.len(),
            side_b = config.teams.b.len(),
            "Battle initialized"
        );

        Ok(Self {
            session,
            rules: config.combat.clone(),
            step: SimDuration::from_millis(config.session.step_ms),
            time_limit: SimTime::from_millis(config.session.max_duration_ms),
            rng: StdRng::seed_from_u64(config.session.seed),
            fighters,
            outcome: None,
        })
    }

    /// The underlying session.
    pub const fn session(&self) -> &CombatSession<S> {
        &self.session
    }

    /// Consume the battle and return the session.
    pub fn into_session(self) -> CombatSession<S> {
        self.session
    }

    /// The outcome, once the battle has finished.
    pub const fn outcome(&self) -> Option<BattleOutcome> {
        self.outcome
    }

    /// Run one step. Returns the outcome once the battle has finished;
    /// further calls return the same outcome without doing anything.
    ///
    /// # Errors
    ///
    /// Returns a [`CoreError`] on counter exhaustion or an invariant breach.
    pub fn step(&mut self) -> Result<Option<BattleOutcome>, CoreError> {
        if let Some(outcome) = self.outcome {
            return Ok(Some(outcome));
        }

        let now = self.session.advance(self.step)?;
        if let Standing::Decided(winner) = self.standing() {
            return self.finish(winner, EndReason::Elimination).map(Some);
        }

        if self.rules.mana_regen_per_step > 0 {
            let regen = i64::from(self.rules.mana_regen_per_step);
            let living: Vec<UnitId> = self.living_ids();
            for unit_id in living {
                let outcome = self.session.apply_mana_delta(unit_id, regen)?;
                log_refused("mana_regen", unit_id, outcome);
            }
        }

        let order: Vec<UnitId> = self.session.roster().to_vec();
        for unit_id in order {
            if self.ready_to_attack(unit_id, now) {
                self.attack(unit_id, now)?;
                if let Standing::Decided(winner) = self.standing() {
                    return self.finish(winner, EndReason::Elimination).map(Some);
                }
            }
        }

        if now >= self.time_limit {
            return self.finish(None, EndReason::Timeout).map(Some);
        }
        Ok(None)
    }

    /// Step until the battle finishes, calling `observer` after each step.
    ///
    /// # Errors
    ///
    /// Returns the first [`CoreError`] raised by a step.
    pub fn run(&mut self, observer: &mut dyn StepObserver<S>) -> Result<BattleOutcome, CoreError> {
        loop {
            let outcome = self.step()?;
            observer.on_step(self.session.clock().steps(), &self.session);
            if let Some(outcome) = outcome {
                return Ok(outcome);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Step internals
    // -----------------------------------------------------------------------

    fn standing(&self) -> Standing {
        let a = self.session.living(Side::A).next().is_some();
        let b = self.session.living(Side::B).next().is_some();
        match (a, b) {
            (true, true) => Standing::Contested,
            (true, false) => Standing::Decided(Some(Side::A)),
            (false, true) => Standing::Decided(Some(Side::B)),
            (false, false) => Standing::Decided(None),
        }
    }

    fn living_ids(&self) -> Vec<UnitId> {
        self.session
            .units()
            .filter(|unit| unit.is_alive())
            .map(crate::unit::Unit::id)
            .collect()
    }

    fn ready_to_attack(&self, unit_id: UnitId, now: SimTime) -> bool {
        let Some(unit) = self.session.unit(unit_id) else {
            return false;
        };
        if !unit.is_alive() || unit.is_stunned() {
            return false;
        }
        self.fighters
            .get(&unit_id)
            .and_then(|state| state.next_attack_at)
            .is_some_and(|at| at <= now)
    }

    fn first_enemy(&self, side: Side) -> Option<UnitId> {
        self.session
            .living(side.opponent())
            .next()
            .map(crate::unit::Unit::id)
    }

    fn attack(&mut self, attacker: UnitId, now: SimTime) -> Result<(), CoreError> {
        let Some(unit) = self.session.unit(attacker) else {
            return Ok(());
        };
        let side = unit.side();
        let stats = unit.stats();
        let interval = attack_interval(stats.attack_speed);
        if let Some(state) = self.fighters.get_mut(&attacker) {
            state.next_attack_at = interval.and_then(|span| now.checked_add(span));
        }

        let Some(target) = self.first_enemy(side) else {
            return Ok(());
        };
        let defense = self
            .session
            .unit(target)
            .map_or(0.0, |unit| unit.stats().defense);
        let threshold = crit_threshold(self.rules.crit_chance);
        let crit = self.rng.random_range(0..CRIT_ROLL_RANGE) < threshold;
        let damage = basic_attack_damage(&stats, defense, &self.rules, crit);
        debug!(attacker = %attacker, target = %target, damage, crit, "Basic attack");
        let outcome = self
            .session
            .apply_damage(Some(attacker), target, damage, DamageKind::Physical)?;
        log_refused("basic_attack", target, outcome);

        let outcome = self
            .session
            .apply_mana_delta(attacker, i64::from(self.rules.mana_per_attack))?;
        log_refused("attack_mana", attacker, outcome);
        self.maybe_cast(attacker)
    }

    fn maybe_cast(&mut self, caster: UnitId) -> Result<(), CoreError> {
        let Some(unit) = self.session.unit(caster) else {
            return Ok(());
        };
        let max_mana = unit.max_mana();
        if max_mana == 0 || unit.mana() < max_mana || !unit.is_alive() {
            return Ok(());
        }
        let side = unit.side();
        let Some(skill) = self.fighters.get(&caster).and_then(|s| s.skill.clone()) else {
            return Ok(());
        };
        debug!(caster = %caster, skill = ?skill, "Casting skill");
        self.cast(caster, side, &skill)?;
        let outcome = self
            .session
            .apply_mana_delta(caster, i64::from(max_mana).saturating_neg())?;
        log_refused("skill_mana", caster, outcome);
        Ok(())
    }

    fn cast(&mut self, caster: UnitId, side: Side, skill: &Skill) -> Result<(), CoreError> {
        match *skill {
            Skill::Rally {
                stat,
                percent,
                duration_ms,
            } => {
                let allies: Vec<UnitId> = self
                    .session
                    .living(side)
                    .map(crate::unit::Unit::id)
                    .collect();
                for ally in allies {
                    let outcome = self.session.apply_stat_effect(
                        ally,
                        stat,
                        percent,
                        ValueKind::Percentage,
                        Some(SimDuration::from_millis(duration_ms)),
                        Some(caster),
                    )?;
                    log_refused("rally", ally, outcome);
                }
            }
            Skill::Barrier {
                amount,
                duration_ms,
            } => {
                let outcome = self.session.apply_shield(
                    caster,
                    amount,
                    SimDuration::from_millis(duration_ms),
                    Some(caster),
                )?;
                log_refused("barrier", caster, outcome);
            }
            Skill::Venom {
                damage_per_tick,
                interval_ms,
                ticks,
            } => {
                if let Some(target) = self.first_enemy(side) {
                    let outcome = self.session.apply_damage_over_time(
                        target,
                        damage_per_tick,
                        SimDuration::from_millis(interval_ms),
                        ticks,
                        Some(caster),
                    )?;
                    log_refused("venom", target, outcome);
                }
            }
            Skill::Bash { damage, stun_ms } => {
                if let Some(target) = self.first_enemy(side) {
                    let outcome = self
                        .session
                        .apply_damage(Some(caster), target, damage, DamageKind::Magic)?;
                    log_refused("bash", target, outcome);
                    let outcome = self.session.apply_stun(
                        target,
                        SimDuration::from_millis(stun_ms),
                        Some(caster),
                    )?;
                    log_refused("bash_stun", target, outcome);
                }
            }
            Skill::Mend { amount } => {
                let wounded = self
                    .session
                    .living(side)
                    .filter(|unit| unit.hp() < unit.max_hp())
                    .min_by_key(|unit| (unit.hp(), unit.id()))
                    .map(crate::unit::Unit::id);
                if let Some(ally) = wounded {
                    let outcome = self.session.apply_heal(ally, amount)?;
                    log_refused("mend", ally, outcome);
                }
            }
            Skill::Sunder {
                stat,
                percent,
                duration_ms,
            } => {
                if let Some(target) = self.first_enemy(side) {
                    let outcome = self.session.apply_stat_effect(
                        target,
                        stat,
                        -percent,
                        ValueKind::Percentage,
                        Some(SimDuration::from_millis(duration_ms)),
                        Some(caster),
                    )?;
                    log_refused("sunder", target, outcome);
                }
            }
        }
        Ok(())
    }

    fn finish(
        &mut self,
        winner: Option<Side>,
        reason: EndReason,
    ) -> Result<BattleOutcome, CoreError> {
        if let MutationOutcome::Rejected(reason) = self.session.end_session(winner)? {
            warn!(reason = %reason, "Session end rejected");
        }
        let outcome = BattleOutcome {
            winner,
            reason,
            ended_at: self.session.now(),
            steps: self.session.clock().steps(),
            last_seq: self.session.last_seq(),
        };
        info!(
            winner = ?winner,
            reason = ?reason,
            ended_at = %outcome.ended_at,
            steps = outcome.steps,
            events = outcome.last_seq,
            "Battle finished"
        );
        self.outcome = Some(outcome);
        Ok(outcome)
    }
}

// ---------------------------------------------------------------------------
// Formulas
// ---------------------------------------------------------------------------

/// Log an intent the Mutation Core refused. Skips are routine and stay quiet.
fn log_refused(intent: &'static str, unit_id: UnitId, outcome: MutationOutcome) {
    if let MutationOutcome::Rejected(reason) = outcome {
        warn!(intent, unit_id = %unit_id, reason = %reason, "Intent rejected");
    }
}

/// Build the spawn template for a configured fighter.
pub fn fighter_template(fighter: &FighterConfig, side: Side) -> UnitTemplate {
    UnitTemplate::new(
        &fighter.name,
        side,
        fighter.max_hp,
        StatBlock::new(fighter.attack, fighter.defense, fighter.attack_speed),
    )
    .with_mana(fighter.max_mana, fighter.starting_mana)
}

/// Time between basic attacks at `attack_speed` attacks per second;
/// `None` if the unit cannot attack.
pub fn attack_interval(attack_speed: f64) -> Option<SimDuration> {
    if !attack_speed.is_finite() || attack_speed <= 0.0 {
        return None;
    }
    let ms = round_to_u32((1000.0 / attack_speed).round()).max(1);
    Some(SimDuration::from_millis(u64::from(ms)))
}

/// Basic attack damage: `attack * scale / (scale + defense)`, with negative
/// defense treated as 0, rounded to the nearest point and at least 1 for a
/// positive attack.
pub fn basic_attack_damage(stats: &StatBlock, defense: f64, rules: &CombatRules, crit: bool) -> u32 {
    if !stats.attack.is_finite() || stats.attack <= 0.0 {
        return 0;
    }
    let scale = rules.defense_scale.max(1.0);
    let mitigation = scale / (scale + defense.max(0.0));
    let mut damage = stats.attack * mitigation;
    if crit {
        damage = damage * f64::from(rules.crit_multiplier_pct) / 100.0;
    }
    round_to_u32(damage.round()).max(1)
}

fn crit_threshold(crit_chance: f64) -> u32 {
    round_to_u32((crit_chance.clamp(0.0, 1.0) * f64::from(CRIT_ROLL_RANGE)).round())
}

/// Saturating float to integer conversion.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn round_to_u32(value: f64) -> u32 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    if value >= f64::from(u32::MAX) {
        return u32::MAX;
    }
    value as u32
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use skirmish_types::EventPayload;

    use super::*;
    use crate::config::{RewardRule, TeamsConfig};
    use crate::sequencer::EventLog;

    fn duel(seed: u64) -> SkirmishConfig {
        let mut config = SkirmishConfig::default();
        config.session.seed = seed;
        config.rewards = vec![RewardRule::KillBounty { amount: 3 }];
        config.teams = TeamsConfig {
            a: vec![FighterConfig {
                name: "Knight".to_owned(),
                max_hp: 60,
                max_mana: 30,
                starting_mana: 20,
                attack: 20.0,
                defense: 0.0,
                attack_speed: 1.0,
                skill: Some(Skill::Bash {
                    damage: 10,
                    stun_ms: 500,
                }),
            }],
            b: vec![FighterConfig {
                name: "Orc".to_owned(),
                max_hp: 100,
                max_mana: 0,
                starting_mana: 0,
                attack: 10.0,
                defense: 0.0,
                attack_speed: 2.0,
                skill: None,
            }],
        };
        config
    }

    #[test]
    fn attack_interval_from_speed() {
        assert_eq!(attack_interval(1.0), Some(SimDuration(1_000)));
        assert_eq!(attack_interval(0.8), Some(SimDuration(1_250)));
        assert_eq!(attack_interval(0.0), None);
        assert_eq!(attack_interval(f64::NAN), None);
    }

    #[test]
    fn damage_formula() {
        let rules = CombatRules::default();
        let stats = StatBlock::new(50.0, 0.0, 1.0);
        // 50 * 100 / (100 + 25) = 40
        assert_eq!(basic_attack_damage(&stats, 25.0, &rules, false), 40);
        // 40 * 150% = 60
        assert_eq!(basic_attack_damage(&stats, 25.0, &rules, true), 60);
        // Negative defense counts as 0.
        assert_eq!(basic_attack_damage(&stats, -10.0, &rules, false), 50);
        assert_eq!(basic_attack_damage(&StatBlock::new(0.1, 0.0, 1.0), 500.0, &rules, false), 1);
        assert_eq!(basic_attack_damage(&StatBlock::new(0.0, 0.0, 1.0), 0.0, &rules, false), 0);
    }

    #[test]
    fn battle_runs_to_elimination() {
        let mut battle = Battle::new(&duel(1), EventLog::new()).unwrap();
        let outcome = battle.run(&mut NoOpObserver).unwrap();
        assert_eq!(outcome.reason, EndReason::Elimination);
        assert!(outcome.winner.is_some());

        let session = battle.session();
        assert!(session.is_ended());
        let events = session.sink().events();
        assert!(matches!(
            events.last().map(|e| &e.payload),
            Some(EventPayload::CombatEnded { winner }) if *winner == outcome.winner
        ));
        assert_eq!(
            events
                .iter()
                .filter(|e| e.payload.kind_name() == "unit_died")
                .count(),
            1
        );
        assert!(events.iter().any(|e| e.payload.kind_name() == "stun_applied"));
        // Further steps are no-ops.
        let again = battle.step().unwrap();
        assert_eq!(again, Some(outcome));
        assert_eq!(battle.session().last_seq(), outcome.last_seq);
    }

    #[test]
    fn same_seed_same_stream() {
        let run = |seed| {
            let mut battle = Battle::new(&duel(seed), EventLog::new()).unwrap();
            let _ = battle.run(&mut NoOpObserver).unwrap();
            battle.into_session().into_sink().into_events()
        };
        assert_eq!(run(9), run(9));
    }

    #[test]
    fn timeout_is_a_draw() {
        let mut config = duel(3);
        config.session.max_duration_ms = 500;
        let mut battle = Battle::new(&config, EventLog::new()).unwrap();
        let outcome = battle.run(&mut NoOpObserver).unwrap();
        assert_eq!(outcome.reason, EndReason::Timeout);
        assert_eq!(outcome.winner, None);
        assert_eq!(outcome.ended_at, SimTime(500));
    }

    #[test]
    fn observer_sees_every_step() {
        struct Counter {
            steps: Vec<u64>,
        }
        impl StepObserver<EventLog> for Counter {
            fn on_step(&mut self, step: u64, _session: &CombatSession<EventLog>) {
                self.steps.push(step);
            }
        }

        let mut config = duel(4);
        config.session.max_duration_ms = 300;
        let mut battle = Battle::new(&config, EventLog::new()).unwrap();
        let mut counter = Counter { steps: Vec::new() };
        let _ = battle.run(&mut counter).unwrap();
        assert_eq!(counter.steps, vec![1, 2, 3]);
    }

    #[test]
    fn stunned_units_do_not_attack() {
        let mut battle = Battle::new(&duel(5), EventLog::new()).unwrap();
        let orc = UnitId::new(2);
        let _ = battle
            .session
            .apply_stun(orc, SimDuration(5_000), None)
            .unwrap();
        for _ in 0..10 {
            let _ = battle.step().unwrap();
        }
        let orc_attacks = battle
            .session()
            .sink()
            .events()
            .iter()
            .filter(|e| {
                matches!(e.payload, EventPayload::Damage { attacker_id: Some(id), .. } if id == orc)
            })
            .count();
        assert_eq!(orc_attacks, 0);
    }

    #[test]
    fn rejected_skill_does_not_stop_the_battle() {
        let mut config = duel(6);
        if let Some(knight) = config.teams.a.first_mut() {
            knight.skill = Some(Skill::Rally {
                stat: Stat::Attack,
                percent: 20.0,
                duration_ms: 0,
            });
        }
        assert!(config.validate().is_err());

        // The driver itself does not validate; a refused cast is logged and
        // the battle carries on.
        let mut battle = Battle::new(&config, EventLog::new()).unwrap();
        let outcome = battle.run(&mut NoOpObserver).unwrap();
        assert_eq!(outcome.reason, EndReason::Elimination);
        let events = battle.session().sink().events();
        assert!(
            !events
                .iter()
                .any(|e| e.payload.kind_name() == "stat_effect_applied")
        );
        assert!(events.iter().any(|e| {
            matches!(e.payload, EventPayload::ManaDelta { resulting_mana: 0, .. })
        }));
    }
}
