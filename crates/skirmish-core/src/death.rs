//! Death Pipeline and death-triggered reward handlers.
//!
//! A unit whose hp reaches 0 through direct damage or a DoT tick goes
//! through four phases, each exactly once:
//!
//! 1. `Dying`: `alive` is cleared but nothing is announced yet.
//! 2. Every registered [`DeathRewardHandler`] runs in registration order;
//!    its rewards go through the Mutation Core like any other mutation.
//! 3. `RewardsProcessed`: remaining effects on the fallen unit are expired
//!    with [`ExpiryReason::OwnerDied`] and a single `unit_died` is emitted.
//! 4. `Dead`: `death_processed` is set.
//!
//! Entering the pipeline for a unit that is not `Alive` is an invariant
//! breach: it is logged, asserted in debug builds and otherwise ignored.

use skirmish_types::{
    EventPayload, ExpiryReason, RewardCause, Side, SimDuration, SimTime, Stat, UnitId, ValueKind,
};
use tracing::{debug, error, info, warn};

use crate::config::RewardRule;
use crate::error::CoreError;
use crate::outcome::MutationOutcome;
use crate::sequencer::EventSink;
use crate::session::CombatSession;

/// Where a unit is in the death pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DeathPhase {
    /// Not dying.
    Alive,
    /// Lethal hp reached; rewards not yet run.
    Dying,
    /// Rewards granted; death not yet announced.
    RewardsProcessed,
    /// `unit_died` emitted. Terminal.
    Dead,
}

impl core::fmt::Display for DeathPhase {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Alive => write!(f, "alive"),
            Self::Dying => write!(f, "dying"),
            Self::RewardsProcessed => write!(f, "rewards_processed"),
            Self::Dead => write!(f, "dead"),
        }
    }
}

/// What a reward handler knows about the death.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeathContext {
    /// The fallen unit.
    pub unit_id: UnitId,
    /// Its side.
    pub side: Side,
    /// Who dealt the killing blow, if anyone.
    pub killer: Option<UnitId>,
    /// When the unit died.
    pub sim_time: SimTime,
}

/// Read-only view of one roster entry, handed to reward handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitView {
    /// Unit id.
    pub id: UnitId,
    /// Team.
    pub side: Side,
    /// Whether the unit is alive. The fallen unit is already `false`.
    pub alive: bool,
    /// Current hp.
    pub hp: u32,
    /// Maximum hp.
    pub max_hp: u32,
}

/// A reward produced by a handler, applied through the Mutation Core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reward {
    /// Grant gold.
    Gold {
        /// Recipient.
        recipient: UnitId,
        /// Gold granted.
        amount: u32,
        /// Why.
        cause: RewardCause,
    },
    /// Apply a stat effect, sourced from the fallen unit.
    StatEffect {
        /// Recipient.
        recipient: UnitId,
        /// Modified stat.
        stat: Stat,
        /// Raw value.
        value: f64,
        /// How `value` is interpreted.
        value_kind: ValueKind,
        /// Lifetime, `None` for permanent.
        duration: Option<SimDuration>,
    },
}

/// A death-triggered reward rule.
///
/// Handlers only decide *what* is granted; they never touch unit state.
pub trait DeathRewardHandler: Send + Sync + core::fmt::Debug {
    /// Short name for logging.
    fn name(&self) -> &'static str;

    /// Rewards to grant for this death, in the order they should be applied.
    fn rewards(&self, death: &DeathContext, roster: &[UnitView]) -> Vec<Reward>;
}

/// Every living ally of the fallen unit gains gold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllyDeathGold {
    /// Gold per ally.
    pub amount: u32,
}

impl DeathRewardHandler for AllyDeathGold {
    fn name(&self) -> &'static str {
        "ally_death_gold"
    }

    fn rewards(&self, death: &DeathContext, roster: &[UnitView]) -> Vec<Reward> {
        living_allies(death, roster)
            .map(|ally| Reward::Gold {
                recipient: ally.id,
                amount: self.amount,
                cause: RewardCause::AllyDeath,
            })
            .collect()
    }
}

/// The killer gains gold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KillBounty {
    /// Gold for the killer.
    pub amount: u32,
}

impl DeathRewardHandler for KillBounty {
    fn name(&self) -> &'static str {
        "kill_bounty"
    }

    fn rewards(&self, death: &DeathContext, roster: &[UnitView]) -> Vec<Reward> {
        let Some(killer) = death.killer else {
            return Vec::new();
        };
        roster
            .iter()
            .filter(|unit| unit.id == killer && unit.alive && unit.side != death.side)
            .map(|unit| Reward::Gold {
                recipient: unit.id,
                amount: self.amount,
                cause: RewardCause::Kill,
            })
            .collect()
    }
}

/// Every living ally of the fallen unit gains a timed percentage buff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vengeance {
    /// Buffed stat.
    pub stat: Stat,
    /// Percentage of base stat.
    pub percent: f64,
    /// Buff lifetime.
    pub duration: SimDuration,
}

impl DeathRewardHandler for Vengeance {
    fn name(&self) -> &'static str {
        "vengeance"
    }

    fn rewards(&self, death: &DeathContext, roster: &[UnitView]) -> Vec<Reward> {
        living_allies(death, roster)
            .map(|ally| Reward::StatEffect {
                recipient: ally.id,
                stat: self.stat,
                value: self.percent,
                value_kind: ValueKind::Percentage,
                duration: Some(self.duration),
            })
            .collect()
    }
}

fn living_allies<'a>(
    death: &'a DeathContext,
    roster: &'a [UnitView],
) -> impl Iterator<Item = &'a UnitView> {
    roster
        .iter()
        .filter(move |unit| unit.alive && unit.side == death.side && unit.id != death.unit_id)
}

/// Build the handler a config rule describes.
pub fn handler_for(rule: &RewardRule) -> Box<dyn DeathRewardHandler> {
    match *rule {
        RewardRule::AllyDeathGold { amount } => Box::new(AllyDeathGold { amount }),
        RewardRule::KillBounty { amount } => Box::new(KillBounty { amount }),
        RewardRule::Vengeance {
            stat,
            percent,
            duration_ms,
        } => Box::new(Vengeance {
            stat,
            percent,
            duration: SimDuration::from_millis(duration_ms),
        }),
    }
}

impl<S: EventSink> CombatSession<S> {
    fn unit_views(&self) -> Vec<UnitView> {
        self.units()
            .map(|unit| UnitView {
                id: unit.id(),
                side: unit.side(),
                alive: unit.is_alive(),
                hp: unit.hp(),
                max_hp: unit.max_hp(),
            })
            .collect()
    }

    /// Run the death pipeline for a unit whose hp just reached 0.
    pub(crate) fn run_death_pipeline(
        &mut self,
        unit_id: UnitId,
        killer: Option<UnitId>,
    ) -> Result<(), CoreError> {
        let now = self.now();
        let unit = self.unit_mut(unit_id)?;
        let phase = unit.death_phase;
        debug_assert_eq!(
            phase,
            DeathPhase::Alive,
            "death pipeline re-entered for {unit_id}"
        );
        if phase != DeathPhase::Alive {
            error!(unit_id = %unit_id, phase = %phase, "Death pipeline re-entered; ignoring");
            return Ok(());
        }

        // Phase 1: dying, not yet announced.
        unit.alive = false;
        unit.death_phase = DeathPhase::Dying;
        let death = DeathContext {
            unit_id,
            side: unit.side,
            killer,
            sim_time: now,
        };
        debug!(unit_id = %unit_id, killer = ?killer, "Unit dying");

        // Phase 2: rewards, in handler registration order.
        let mut index = 0_usize;
        while let Some(handler) = self.death_handlers.get(index) {
            let name = handler.name();
            let rewards = handler.rewards(&death, &self.unit_views());
            for reward in rewards {
                match self.apply_reward(unit_id, reward)? {
                    MutationOutcome::Applied(_) => {}
                    MutationOutcome::Skipped(reason) => {
                        debug!(handler = name, reason = %reason, "Death reward skipped");
                    }
                    MutationOutcome::Rejected(reason) => {
                        warn!(handler = name, reason = %reason, "Death reward rejected");
                    }
                }
            }
            index = index.saturating_add(1);
        }
        self.unit_mut(unit_id)?.death_phase = DeathPhase::RewardsProcessed;

        // Phase 3: purge remaining effects, then announce.
        let effect_ids: Vec<_> = self
            .unit_mut(unit_id)?
            .effects
            .iter()
            .map(|effect| effect.id)
            .collect();
        for effect_id in effect_ids {
            self.expire_effect(unit_id, effect_id, ExpiryReason::OwnerDied)?;
        }
        self.emit(EventPayload::UnitDied {
            unit_id,
            killer_id: killer,
        })?;

        // Phase 4.
        self.unit_mut(unit_id)?.finalize_death();
        info!(unit_id = %unit_id, killer = ?killer, sim_time = %now, "Unit died");
        Ok(())
    }

    fn apply_reward(
        &mut self,
        fallen: UnitId,
        reward: Reward,
    ) -> Result<MutationOutcome, CoreError> {
        match reward {
            Reward::Gold {
                recipient,
                amount,
                cause,
            } => self.grant_gold(recipient, amount, cause),
            Reward::StatEffect {
                recipient,
                stat,
                value,
                value_kind,
                duration,
            } => self.apply_stat_effect(recipient, stat, value, value_kind, duration, Some(fallen)),
        }
    }
}
