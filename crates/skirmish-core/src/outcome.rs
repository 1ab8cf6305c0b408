//! Results of Mutation Core operations.

use skirmish_types::{EffectId, UnitId};

/// What a mutation did.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// State changed and an event was emitted.
    Applied(Applied),
    /// Nothing happened and nothing was emitted; the request was legal.
    Skipped(SkipReason),
    /// The request was malformed; nothing happened.
    Rejected(RejectReason),
}

impl MutationOutcome {
    /// Whether state changed.
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    /// The seq of the primary event, if one was emitted.
    pub const fn seq(&self) -> Option<u64> {
        match self {
            Self::Applied(applied) => Some(applied.seq),
            Self::Skipped(_) | Self::Rejected(_) => None,
        }
    }

    /// The effect created by an apply operation.
    pub const fn effect_id(&self) -> Option<EffectId> {
        match self {
            Self::Applied(applied) => applied.effect_id,
            Self::Skipped(_) | Self::Rejected(_) => None,
        }
    }
}

/// Details of an applied mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applied {
    /// Seq of the event describing the mutation itself.
    pub seq: u64,
    /// The effect registered, for apply-kind operations.
    pub effect_id: Option<EffectId>,
}

/// Why a legal mutation did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The target is already dead.
    TargetDead,
    /// The requested amount was zero.
    ZeroAmount,
}

/// Why a mutation request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// No unit with this id exists in the session.
    UnknownUnit(UnitId),
    /// A stat value was NaN or infinite.
    NonFiniteValue,
    /// A timed effect was given an empty duration.
    ZeroDuration,
    /// A damage-over-time effect was given an empty interval.
    ZeroInterval,
    /// A damage-over-time effect was given no ticks.
    ZeroTicks,
    /// The shield total would overflow.
    ShieldOverflow,
    /// The session has already ended.
    SessionClosed,
}

impl core::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::TargetDead => write!(f, "target_dead"),
            Self::ZeroAmount => write!(f, "zero_amount"),
        }
    }
}

impl core::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::UnknownUnit(id) => write!(f, "unknown unit {id}"),
            Self::NonFiniteValue => write!(f, "non-finite value"),
            Self::ZeroDuration => write!(f, "zero duration"),
            Self::ZeroInterval => write!(f, "zero interval"),
            Self::ZeroTicks => write!(f, "zero ticks"),
            Self::ShieldOverflow => write!(f, "shield overflow"),
            Self::SessionClosed => write!(f, "session closed"),
        }
    }
}
