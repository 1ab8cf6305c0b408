//! Protocol violations detected while consuming an event stream.
//!
//! Every variant is fatal to the consuming session: once one is raised the
//! reconstructed state can no longer be trusted.

use skirmish_types::{EffectId, UnitId};

/// A defect in the event stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolViolation {
    /// A mandatory field for the event kind is absent or null.
    #[error("{kind} event seq {seq} is missing mandatory field `{field}`")]
    MissingField {
        /// Event kind tag.
        kind: String,
        /// Event seq.
        seq: u64,
        /// The missing field.
        field: &'static str,
    },

    /// The record could not be parsed into a typed event.
    #[error("malformed {kind} event seq {seq}: {reason}")]
    Malformed {
        /// Event kind tag, as read.
        kind: String,
        /// Event seq, as read.
        seq: u64,
        /// Parser message.
        reason: String,
    },

    /// One or more seqs were skipped.
    #[error("sequence gap: expected seq {expected}, found {found}")]
    SequenceGap {
        /// The next seq the consumer expected.
        expected: u64,
        /// The seq received.
        found: u64,
    },

    /// The previous seq was delivered again.
    #[error("duplicate seq {seq}")]
    DuplicateSeq {
        /// The repeated seq.
        seq: u64,
    },

    /// A seq older than the previous one was delivered.
    #[error("seq regression: {found} after {previous}")]
    SeqRegression {
        /// The last seq applied.
        previous: u64,
        /// The seq received.
        found: u64,
    },

    /// An apply-kind event reused an effect id.
    #[error("seq {seq} applies effect {effect_id}, which was already applied")]
    DuplicateEffect {
        /// Event seq.
        seq: u64,
        /// The reused id.
        effect_id: EffectId,
    },

    /// An expire- or tick-kind event referenced an effect that is not active
    /// on the unit.
    #[error("seq {seq} references effect {effect_id}, which is not active on {unit_id}")]
    UnknownEffect {
        /// Event seq.
        seq: u64,
        /// The unit named by the event.
        unit_id: UnitId,
        /// The unknown id.
        effect_id: EffectId,
    },

    /// An event referenced a unit that was never spawned.
    #[error("seq {seq} references unit {unit_id}, which was never spawned")]
    UnknownUnit {
        /// Event seq.
        seq: u64,
        /// The unknown unit.
        unit_id: UnitId,
    },

    /// A unit that already died was announced dead again.
    #[error("seq {seq} announces the death of {unit_id}, which already died")]
    DuplicateDeath {
        /// Event seq.
        seq: u64,
        /// The unit.
        unit_id: UnitId,
    },

    /// A unit was spawned twice.
    #[error("seq {seq} spawns {unit_id} a second time")]
    DuplicateSpawn {
        /// Event seq.
        seq: u64,
        /// The unit.
        unit_id: UnitId,
    },
}
