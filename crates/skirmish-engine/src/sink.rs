//! Channel plumbing between the battle task and the validator task.
//!
//! The battle thread pushes events through a [`ChannelSink`] and snapshots
//! through a [`SnapshotObserver`]; both share one unbounded FIFO channel so
//! the validator sees every snapshot exactly where it was taken relative to
//! the events around it.

use skirmish_core::{CombatSession, EventSink, StepObserver};
use skirmish_types::{Event, Snapshot};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

/// One item on the battle-to-validator channel.
#[derive(Debug, Clone)]
pub enum Frame {
    /// An emitted event.
    Event(Event),
    /// A validation snapshot.
    Snapshot(Snapshot),
}

/// Event sink that forwards into the validator channel.
#[derive(Debug)]
pub struct ChannelSink {
    tx: UnboundedSender<Frame>,
    dropped: u64,
}

impl ChannelSink {
    /// Forward events into `tx`.
    pub const fn new(tx: UnboundedSender<Frame>) -> Self {
        Self { tx, dropped: 0 }
    }

    /// Events that could not be delivered because the receiver was gone.
    pub const fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl EventSink for ChannelSink {
    fn accept(&mut self, event: Event) {
        let seq = event.seq;
        if self.tx.send(Frame::Event(event)).is_err() {
            if self.dropped == 0 {
                warn!(seq, "Validator channel closed; events are being dropped");
            }
            self.dropped = self.dropped.saturating_add(1);
        }
    }
}

/// Step observer that exports a snapshot every `every` steps.
#[derive(Debug)]
pub struct SnapshotObserver {
    tx: UnboundedSender<Frame>,
    every: u64,
    sent: u64,
}

impl SnapshotObserver {
    /// Snapshot every `every` steps; `0` disables periodic snapshots.
    pub const fn new(tx: UnboundedSender<Frame>, every: u64) -> Self {
        Self { tx, every, sent: 0 }
    }

    /// Export a snapshot of `session` now.
    pub fn send(&mut self, session: &CombatSession<ChannelSink>) {
        let snapshot = session.export_snapshot();
        let seq = snapshot.seq;
        if self.tx.send(Frame::Snapshot(snapshot)).is_ok() {
            self.sent = self.sent.saturating_add(1);
            debug!(seq, "Snapshot exported");
        }
    }

    /// Snapshots delivered so far.
    pub const fn sent(&self) -> u64 {
        self.sent
    }
}

impl StepObserver<ChannelSink> for SnapshotObserver {
    fn on_step(&mut self, step: u64, session: &CombatSession<ChannelSink>) {
        if step.checked_rem(self.every) == Some(0) {
            self.send(session);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use skirmish_core::{Battle, SkirmishConfig};
    use tokio::sync::mpsc;

    use super::*;

    #[test]
    fn frames_arrive_in_emission_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut config = SkirmishConfig::default();
        config.session.max_duration_ms = 1_000;
        let mut battle = Battle::new(&config, ChannelSink::new(tx.clone())).unwrap();
        let mut observer = SnapshotObserver::new(tx, 2);
        let outcome = battle.run(&mut observer).unwrap();
        drop(battle);
        drop(observer);

        let mut last_seq = 0;
        let mut snapshots = 0;
        while let Ok(frame) = rx.try_recv() {
            match frame {
                Frame::Event(event) => {
                    assert_eq!(event.seq, last_seq + 1);
                    last_seq = event.seq;
                }
                Frame::Snapshot(snapshot) => {
                    assert_eq!(snapshot.seq, last_seq);
                    snapshots += 1;
                }
            }
        }
        assert_eq!(last_seq, outcome.last_seq);
        assert_eq!(snapshots, outcome.steps / 2);
    }

    #[test]
    fn zero_interval_disables_periodic_snapshots() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let config = SkirmishConfig::default();
        let battle = Battle::new(&config, ChannelSink::new(tx.clone())).unwrap();
        let mut observer = SnapshotObserver::new(tx, 0);
        for step in 1..=5 {
            observer.on_step(step, battle.session());
        }
        assert_eq!(observer.sent(), 0);
        observer.send(battle.session());
        assert_eq!(observer.sent(), 1);
    }

    #[test]
    fn closed_channel_counts_dropped_events() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let config = SkirmishConfig::default();
        let battle = Battle::new(&config, ChannelSink::new(tx)).unwrap();
        let sink = battle.into_session().into_sink();
        assert_eq!(sink.dropped(), 6);
    }
}
