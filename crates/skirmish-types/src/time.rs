//! Simulation time.
//!
//! Sim time is an integer count of milliseconds since the session started.
//! It is the only clock the simulation and the replay pipeline ever read;
//! wall-clock time never enters derived state.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// An absolute point on the simulation clock, in milliseconds.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export, export_to = "bindings/")]
pub struct SimTime(pub u64);

/// A span of simulation time, in milliseconds.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export, export_to = "bindings/")]
pub struct SimDuration(pub u64);

impl SimTime {
    /// The start of every session.
    pub const ZERO: Self = Self(0);

    /// Construct from milliseconds.
    pub const fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    /// Return the millisecond count.
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Add a duration, returning `None` on overflow.
    pub const fn checked_add(self, span: SimDuration) -> Option<Self> {
        match self.0.checked_add(span.0) {
            Some(ms) => Some(Self(ms)),
            None => None,
        }
    }
}

impl SimDuration {
    /// Construct from milliseconds.
    pub const fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    /// Construct from whole seconds, returning `None` on overflow.
    pub const fn from_secs(secs: u64) -> Option<Self> {
        match secs.checked_mul(1000) {
            Some(ms) => Some(Self(ms)),
            None => None,
        }
    }

    /// Return the millisecond count.
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Whether this span is empty.
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Multiply by an integer factor, returning `None` on overflow.
    pub const fn checked_mul(self, factor: u64) -> Option<Self> {
        match self.0.checked_mul(factor) {
            Some(ms) => Some(Self(ms)),
            None => None,
        }
    }
}

impl core::fmt::Display for SimTime {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

impl core::fmt::Display for SimDuration {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}
