//! Core simulation error type.
//!
//! Expected conditions (dead targets, bad arguments) are reported through
//! [`MutationOutcome`](crate::outcome::MutationOutcome), never as errors.
//! A [`CoreError`] means a counter ran out or an internal invariant broke;
//! the session should be abandoned.

use skirmish_types::{EffectId, UnitId};

use crate::clock::ClockError;

/// Fatal errors raised by a combat session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// The event sequence counter reached `u64::MAX`.
    #[error("event sequence exhausted")]
    SequenceExhausted,

    /// The effect id counter reached `u64::MAX`.
    #[error("effect id space exhausted")]
    EffectIdsExhausted,

    /// The unit id counter reached `u32::MAX`.
    #[error("unit id space exhausted")]
    UnitIdsExhausted,

    /// An absolute expiry or tick time does not fit the sim clock.
    #[error("sim time overflow computing expiry for {effect_id}")]
    TimeOverflow {
        /// The effect whose schedule overflowed.
        effect_id: EffectId,
    },

    /// The sim clock refused to advance.
    #[error("clock error: {0}")]
    Clock(#[from] ClockError),

    /// A unit was spawned after the session ended.
    #[error("session has ended")]
    SessionEnded,

    /// A unit template cannot be spawned.
    #[error("invalid unit template: {reason}")]
    InvalidTemplate {
        /// Explanation of what is wrong.
        reason: String,
    },

    /// An internal invariant was violated.
    #[error("invariant violated for {unit_id}: {context}")]
    Invariant {
        /// The unit involved.
        unit_id: UnitId,
        /// What went wrong.
        context: String,
    },
}
