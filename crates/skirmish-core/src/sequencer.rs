//! Event Sequencer: assigns seq numbers and hands events to a sink.
//!
//! The sequencer is owned by the session and is the only place a seq is
//! allocated. Seqs start at 1 and increase by exactly 1 per emitted event,
//! so a consumer can detect gaps and duplicates from the numbers alone.

use skirmish_types::{Event, EventPayload, SimTime};

use crate::error::CoreError;

/// Receiver of sequenced events.
///
/// Sinks must preserve the order in which events are accepted. A sink may
/// forward events across a thread boundary as long as FIFO order holds.
pub trait EventSink {
    /// Take ownership of the next event.
    fn accept(&mut self, event: Event);
}

/// In-memory sink that keeps every event in emission order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    /// An empty log.
    pub const fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// All events accepted so far.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Consume the log.
    pub fn into_events(self) -> Vec<Event> {
        self.events
    }

    /// Number of events accepted.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether no event has been accepted.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventSink for EventLog {
    fn accept(&mut self, event: Event) {
        self.events.push(event);
    }
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn accept(&mut self, event: Event) {
        (**self).accept(event);
    }
}

/// Allocates seqs and forwards events to the sink.
#[derive(Debug)]
pub struct EventSequencer<S> {
    last_seq: u64,
    sink: S,
}

impl<S: EventSink> EventSequencer<S> {
    /// A sequencer whose first event will carry seq 1.
    pub const fn new(sink: S) -> Self {
        Self { last_seq: 0, sink }
    }

    /// Seq of the most recently emitted event, or 0 before the first.
    pub const fn last_seq(&self) -> u64 {
        self.last_seq
    }

    /// Emit one event and return its seq.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SequenceExhausted`] if the counter would overflow.
    pub fn emit(&mut self, sim_time: SimTime, payload: EventPayload) -> Result<u64, CoreError> {
        let seq = self
            .last_seq
            .checked_add(1)
            .ok_or(CoreError::SequenceExhausted)?;
        self.last_seq = seq;
        tracing::trace!(seq, kind = payload.kind_name(), sim_time = %sim_time, "Event emitted");
        self.sink.accept(Event {
            seq,
            sim_time,
            payload,
        });
        Ok(seq)
    }

    /// Borrow the sink.
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    /// Mutably borrow the sink.
    pub const fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Consume the sequencer and return the sink.
    pub fn into_sink(self) -> S {
        self.sink
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use skirmish_types::Side;

    use super::*;

    #[test]
    fn seqs_start_at_one_and_increase_by_one() {
        let mut sequencer = EventSequencer::new(EventLog::new());
        assert_eq!(sequencer.last_seq(), 0);
        for expected in 1..=5 {
            let seq = sequencer
                .emit(SimTime(0), EventPayload::CombatEnded { winner: None })
                .unwrap();
            assert_eq!(seq, expected);
        }
        let seqs: Vec<u64> = sequencer.sink().events().iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn emitted_event_keeps_time_and_payload() {
        let mut sequencer = EventSequencer::new(EventLog::new());
        sequencer
            .emit(SimTime(300), EventPayload::CombatEnded { winner: Some(Side::B) })
            .unwrap();
        let log = sequencer.into_sink();
        let event = log.events().first().unwrap();
        assert_eq!(event.sim_time, SimTime(300));
        assert_eq!(event.payload, EventPayload::CombatEnded { winner: Some(Side::B) });
    }

    #[test]
    fn boxed_sinks_forward() {
        let mut sink: Box<EventLog> = Box::default();
        sink.accept(Event {
            seq: 1,
            sim_time: SimTime(0),
            payload: EventPayload::CombatEnded { winner: None },
        });
        assert_eq!(sink.len(), 1);
    }
}
