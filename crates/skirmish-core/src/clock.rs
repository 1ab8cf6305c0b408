//! Simulation clock.
//!
//! The clock is the single source of temporal state for a combat session.
//! It only moves forward, in whole-millisecond steps chosen by the caller,
//! and every expiry in the session is compared against its reading.

use skirmish_types::{SimDuration, SimTime};

/// Errors that can occur during clock operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ClockError {
    /// The clock would overflow `u64::MAX` milliseconds.
    #[error("sim clock overflow: cannot advance beyond u64::MAX ms")]
    TimeOverflow,

    /// A zero-length step was requested.
    #[error("sim clock step must be at least 1ms")]
    ZeroStep,
}

/// Monotonic sim clock with a step counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimClock {
    now: SimTime,
    steps: u64,
}

impl SimClock {
    /// A clock at time zero.
    pub const fn new() -> Self {
        Self {
            now: SimTime::ZERO,
            steps: 0,
        }
    }

    /// The current reading.
    pub const fn now(&self) -> SimTime {
        self.now
    }

    /// Number of completed steps.
    pub const fn steps(&self) -> u64 {
        self.steps
    }

    /// Move the clock forward by `step` and return the new reading.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::ZeroStep`] for an empty step and
    /// [`ClockError::TimeOverflow`] if either counter would overflow.
    pub fn advance(&mut self, step: SimDuration) -> Result<SimTime, ClockError> {
        if step.is_zero() {
            return Err(ClockError::ZeroStep);
        }
        let next = self.now.checked_add(step).ok_or(ClockError::TimeOverflow)?;
        let steps = self.steps.checked_add(1).ok_or(ClockError::TimeOverflow)?;
        self.now = next;
        self.steps = steps;
        Ok(next)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero() {
        let clock = SimClock::new();
        assert_eq!(clock.now(), SimTime::ZERO);
        assert_eq!(clock.steps(), 0);
    }

    #[test]
    fn advance_accumulates() {
        let mut clock = SimClock::new();
        clock.advance(SimDuration(100)).unwrap();
        let now = clock.advance(SimDuration(250)).unwrap();
        assert_eq!(now, SimTime(350));
        assert_eq!(clock.steps(), 2);
    }

    #[test]
    fn zero_step_rejected() {
        let mut clock = SimClock::new();
        assert_eq!(clock.advance(SimDuration(0)), Err(ClockError::ZeroStep));
        assert_eq!(clock.now(), SimTime::ZERO);
    }

    #[test]
    fn overflow_leaves_clock_unchanged() {
        let mut clock = SimClock::new();
        clock.advance(SimDuration(u64::MAX)).unwrap();
        assert_eq!(clock.advance(SimDuration(1)), Err(ClockError::TimeOverflow));
        assert_eq!(clock.now(), SimTime(u64::MAX));
        assert_eq!(clock.steps(), 1);
    }
}
