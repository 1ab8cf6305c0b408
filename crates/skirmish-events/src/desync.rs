//! Desync Detector: replays the stream and diffs it against snapshots.
//!
//! A snapshot is the simulator's own copy of the roster at a given seq. The
//! detector reconstructs state from events alone and, whenever the stream
//! reaches a snapshot's seq, compares the two field by field. Any diff is an
//! emission defect in the simulator.
//!
//! Integer, enum and boolean fields compare exactly. Float fields compare
//! within `epsilon`; a nonzero difference inside the tolerance is traced and
//! not reported.
//!
//! The detector runs in two modes. [`run`] checks a complete recording.
//! [`DesyncDetector::observe_event`] and [`DesyncDetector::observe_snapshot`]
//! check a live stream as frames arrive.

use std::collections::BTreeMap;
use std::fmt::Display;

use serde::Serialize;
use skirmish_types::{CanonicalEffect, EffectId, Snapshot, UnitId, UnitSnapshot};
use tracing::{debug, trace, warn};

use crate::error::ProtocolViolation;
use crate::reconstruct::Reconstructor;
use crate::view::{SessionStateView, UnitRecord};
use crate::wire::WireEvent;

/// One field that differs between a snapshot and the reconstruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffEntry {
    /// The unit the field belongs to.
    pub unit_id: Option<UnitId>,
    /// Seq of the snapshot.
    pub seq: u64,
    /// Field path, e.g. `hp` or `effects[fx-3].value`.
    pub field: String,
    /// Value in the snapshot.
    pub expected: String,
    /// Value in the reconstruction.
    pub actual: String,
}

impl Display for DiffEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.unit_id {
            Some(unit_id) => write!(f, "seq {} {unit_id} ", self.seq)?,
            None => write!(f, "seq {} ", self.seq)?,
        }
        write!(
            f,
            "{}: expected {}, actual {}",
            self.field, self.expected, self.actual
        )
    }
}

/// Summary of a detector run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DesyncReport {
    /// Every diff found, in the order found.
    pub diffs: Vec<DiffEntry>,
    /// Snapshots that were compared.
    pub checked_snapshots: u64,
    /// Seqs of snapshots that could not be compared because the stream
    /// never stood at their seq.
    pub unchecked_snapshots: Vec<u64>,
    /// Events applied.
    pub events_applied: u64,
}

impl DesyncReport {
    /// Whether the run found no diffs.
    pub fn is_clean(&self) -> bool {
        self.diffs.is_empty()
    }
}

/// Incremental detector over a live or recorded stream.
#[derive(Debug, Clone)]
pub struct DesyncDetector {
    reconstructor: Reconstructor,
    epsilon: f64,
    pending: BTreeMap<u64, Vec<Snapshot>>,
    report: DesyncReport,
}

impl DesyncDetector {
    /// A detector with the given float tolerance.
    pub fn new(epsilon: f64) -> Self {
        Self {
            reconstructor: Reconstructor::new(),
            epsilon,
            pending: BTreeMap::new(),
            report: DesyncReport::default(),
        }
    }

    /// The reconstruction so far.
    pub const fn view(&self) -> &SessionStateView {
        self.reconstructor.view()
    }

    /// The report so far.
    pub const fn report(&self) -> &DesyncReport {
        &self.report
    }

    /// Apply one event, then compare any snapshot waiting for its seq.
    ///
    /// # Errors
    ///
    /// Returns the [`ProtocolViolation`] raised by the reconstructor.
    pub fn observe_event(&mut self, event: &WireEvent) -> Result<(), ProtocolViolation> {
        self.reconstructor.apply_wire(event)?;
        self.report.events_applied = self.report.events_applied.saturating_add(1);
        let seq = self.reconstructor.last_seq();
        if let Some(waiting) = self.pending.remove(&seq) {
            for snapshot in &waiting {
                self.check(snapshot);
            }
        }
        Ok(())
    }

    /// Compare a snapshot now if the stream stands at its seq, hold it if
    /// its seq is still ahead, or mark it unchecked if the seq has passed.
    pub fn observe_snapshot(&mut self, snapshot: Snapshot) {
        let current = self.reconstructor.last_seq();
        if snapshot.seq == current {
            self.check(&snapshot);
        } else if snapshot.seq > current {
            self.pending.entry(snapshot.seq).or_default().push(snapshot);
        } else {
            warn!(
                snapshot_seq = snapshot.seq,
                current_seq = current,
                "Snapshot arrived after its seq was passed"
            );
            self.report.unchecked_snapshots.push(snapshot.seq);
        }
    }

    /// Close the run. Snapshots still waiting are reported as unchecked.
    pub fn finish(mut self) -> DesyncReport {
        for (seq, waiting) in std::mem::take(&mut self.pending) {
            self.report
                .unchecked_snapshots
                .extend(std::iter::repeat_n(seq, waiting.len()));
        }
        self.report
    }

    fn check(&mut self, snapshot: &Snapshot) {
        let diffs = diff_state(snapshot, self.reconstructor.view(), self.epsilon);
        for diff in &diffs {
            warn!(
                seq = diff.seq,
                unit_id = ?diff.unit_id,
                field = %diff.field,
                expected = %diff.expected,
                actual = %diff.actual,
                "Desync"
            );
        }
        debug!(seq = snapshot.seq, diffs = diffs.len(), "Snapshot checked");
        self.report.checked_snapshots = self.report.checked_snapshots.saturating_add(1);
        self.report.diffs.extend(diffs);
    }
}

/// Check a complete recording.
///
/// # Errors
///
/// Returns the first [`ProtocolViolation`] in the stream.
pub fn run(
    events: &[WireEvent],
    snapshots: &[Snapshot],
    epsilon: f64,
) -> Result<DesyncReport, ProtocolViolation> {
    let mut detector = DesyncDetector::new(epsilon);
    for snapshot in snapshots {
        detector.observe_snapshot(snapshot.clone());
    }
    for event in events {
        detector.observe_event(event)?;
    }
    Ok(detector.finish())
}

/// Diff one snapshot against a reconstructed view.
pub fn diff_state(snapshot: &Snapshot, view: &SessionStateView, epsilon: f64) -> Vec<DiffEntry> {
    let mut diff = Differ {
        seq: snapshot.seq,
        epsilon,
        entries: Vec::new(),
    };
    for expected in &snapshot.units {
        match view.unit(expected.unit_id) {
            Some(actual) => diff.unit(expected, actual),
            None => diff.push(Some(expected.unit_id), "presence", "present", "absent"),
        }
    }
    for actual in view.units_in_order() {
        if snapshot.unit(actual.unit_id).is_none() {
            diff.push(Some(actual.unit_id), "presence", "absent", "present");
        }
    }
    diff.entries
}

struct Differ {
    seq: u64,
    epsilon: f64,
    entries: Vec<DiffEntry>,
}

impl Differ {
    fn push(
        &mut self,
        unit_id: Option<UnitId>,
        field: impl Into<String>,
        expected: impl Display,
        actual: impl Display,
    ) {
        self.entries.push(DiffEntry {
            unit_id,
            seq: self.seq,
            field: field.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }

    fn exact<T: PartialEq + Display>(&mut self, unit_id: UnitId, field: &str, expected: T, actual: T) {
        if expected != actual {
            self.push(Some(unit_id), field, expected, actual);
        }
    }

    fn float(&mut self, unit_id: UnitId, field: &str, expected: f64, actual: f64) {
        let delta = (expected - actual).abs();
        if delta > self.epsilon || delta.is_nan() {
            self.push(Some(unit_id), field, expected, actual);
        } else if delta > 0.0 {
            trace!(
                seq = self.seq,
                unit_id = %unit_id,
                field,
                delta,
                "Float difference within tolerance"
            );
        }
    }

    fn unit(&mut self, expected: &UnitSnapshot, actual: &UnitRecord) {
        let id = expected.unit_id;
        self.exact(id, "side", expected.side, actual.side);
        self.exact(id, "hp", expected.hp, actual.hp);
        self.exact(id, "max_hp", expected.max_hp, actual.max_hp);
        self.exact(id, "shield", expected.shield, actual.shield);
        self.exact(id, "mana", expected.mana, actual.mana);
        self.exact(id, "max_mana", expected.max_mana, actual.max_mana);
        self.exact(id, "gold", expected.gold, actual.gold);
        self.exact(id, "alive", expected.alive, actual.alive);
        self.float(id, "stats.attack", expected.stats.attack, actual.stats.attack);
        self.float(id, "stats.defense", expected.stats.defense, actual.stats.defense);
        self.float(
            id,
            "stats.attack_speed",
            expected.stats.attack_speed,
            actual.stats.attack_speed,
        );
        self.effects(id, &expected.effects, &actual.effects);
    }

    fn effects(
        &mut self,
        unit_id: UnitId,
        expected: &[CanonicalEffect],
        actual: &BTreeMap<EffectId, CanonicalEffect>,
    ) {
        let expected: BTreeMap<EffectId, &CanonicalEffect> =
            expected.iter().map(|effect| (effect.id, effect)).collect();
        for (id, want) in &expected {
            match actual.get(id) {
                Some(got) => self.effect(unit_id, want, got),
                None => self.push(Some(unit_id), format!("effects[{id}]"), "present", "absent"),
            }
        }
        for id in actual.keys() {
            if !expected.contains_key(id) {
                self.push(Some(unit_id), format!("effects[{id}]"), "absent", "present");
            }
        }
    }

    fn effect(&mut self, unit_id: UnitId, expected: &CanonicalEffect, actual: &CanonicalEffect) {
        let id = expected.id;
        self.exact(unit_id, &format!("effects[{id}].kind"), expected.kind, actual.kind);
        self.exact(
            unit_id,
            &format!("effects[{id}].stat"),
            show(expected.stat),
            show(actual.stat),
        );
        self.exact(
            unit_id,
            &format!("effects[{id}].duration"),
            show(expected.duration),
            show(actual.duration),
        );
        self.float(
            unit_id,
            &format!("effects[{id}].value"),
            expected.value,
            actual.value,
        );
    }
}

fn show<T: Display>(value: Option<T>) -> String {
    value.map_or_else(|| "none".to_owned(), |value| value.to_string())
}
