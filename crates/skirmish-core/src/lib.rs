//! Authoritative combat simulation for Skirmish.
//!
//! A [`CombatSession`] owns every unit and is the only thing that mutates
//! them. Each mutation emits exactly one sequenced event carrying the
//! post-mutation values, so a remote consumer can rebuild the exact combat
//! state from the stream alone.
//!
//! # Modules
//!
//! - [`battle`] -- Fixed-step battle driver: attacks, skills, mana regen.
//! - [`clock`] -- Monotonic millisecond sim clock.
//! - [`config`] -- Configuration loading from `skirmish-config.yaml`.
//! - [`death`] -- Death pipeline phases and reward handlers.
//! - [`effect`] -- Effect model and lifecycle phases.
//! - [`error`] -- [`CoreError`], the only fatal error type.
//! - [`lifecycle`] -- Clock advance, DoT ticks and timed expiry.
//! - [`mutation`] -- The Mutation Core apply operations.
//! - [`outcome`] -- [`MutationOutcome`] statuses.
//! - [`sequencer`] -- Seq allocation and the [`EventSink`] trait.
//! - [`session`] -- [`CombatSession`] construction, snapshots, shutdown.
//! - [`unit`] -- Unit model and spawn templates.

pub mod battle;
pub mod clock;
pub mod config;
pub mod death;
pub mod effect;
pub mod error;
pub mod lifecycle;
pub mod mutation;
pub mod outcome;
pub mod sequencer;
pub mod session;
pub mod unit;

pub use battle::{Battle, BattleOutcome, EndReason, NoOpObserver, Skill, StepObserver};
pub use clock::{ClockError, SimClock};
pub use config::{ConfigError, RewardRule, SkirmishConfig};
pub use death::{DeathContext, DeathPhase, DeathRewardHandler, Reward, UnitView};
pub use effect::{Effect, EffectBody, EffectPhase};
pub use error::CoreError;
pub use outcome::{Applied, MutationOutcome, RejectReason, SkipReason};
pub use sequencer::{EventLog, EventSequencer, EventSink};
pub use session::CombatSession;
pub use unit::{Unit, UnitTemplate};
