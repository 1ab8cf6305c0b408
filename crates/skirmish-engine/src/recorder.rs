//! Validator task: records the live stream and checks it as it arrives.
//!
//! Runs on a blocking thread. Every event is encoded to its wire form, fed to
//! the live [`DesyncDetector`] and, when a recording path is configured,
//! appended to the JSON-lines recording. Snapshots take the same route.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use skirmish_events::{DesyncDetector, DesyncReport, RecordingWriter, encode, read_recording};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info};

use crate::error::EngineError;
use crate::sink::Frame;

/// What the validator saw.
#[derive(Debug)]
pub struct ValidationSummary {
    /// Detector output.
    pub report: DesyncReport,
    /// Frames written to the recording, header included, if recording.
    pub frames_recorded: Option<u64>,
}

/// Open a recording file for writing.
pub fn create_recording(
    path: &Path,
    header: skirmish_types::RecordingHeader,
) -> Result<RecordingWriter<BufWriter<File>>, EngineError> {
    let file = File::create(path)?;
    let writer = RecordingWriter::new(BufWriter::new(file), header)?;
    info!(path = %path.display(), "Recording started");
    Ok(writer)
}

/// Drain the channel until every sender is gone. Returns the summary and,
/// if a recording was written, the flushed underlying writer.
///
/// Must run on a blocking thread.
pub fn validate<W: Write>(
    mut rx: UnboundedReceiver<Frame>,
    epsilon: f64,
    mut writer: Option<RecordingWriter<W>>,
) -> Result<(ValidationSummary, Option<W>), EngineError> {
    let mut detector = DesyncDetector::new(epsilon);

    while let Some(frame) = rx.blocking_recv() {
        match frame {
            Frame::Event(event) => {
                let wire = encode(&event)?;
                if let Some(writer) = writer.as_mut() {
                    writer.write_event(&wire)?;
                }
                detector.observe_event(&wire)?;
            }
            Frame::Snapshot(snapshot) => {
                if let Some(writer) = writer.as_mut() {
                    writer.write_snapshot(&snapshot)?;
                }
                debug!(seq = snapshot.seq, "Snapshot received");
                detector.observe_snapshot(snapshot);
            }
        }
    }

    let (frames_recorded, output) = match writer {
        Some(writer) => {
            let frames = writer.frames();
            (Some(frames), Some(writer.finish()?))
        }
        None => (None, None),
    };

    let summary = ValidationSummary {
        report: detector.finish(),
        frames_recorded,
    };
    Ok((summary, output))
}

/// Check a recording file offline.
pub fn verify_file(path: &Path, epsilon: f64) -> Result<DesyncReport, EngineError> {
    let file = File::open(path)?;
    let recording = read_recording(BufReader::new(file))?;
    info!(
        path = %path.display(),
        session_id = %recording.header.session_id,
        seed = recording.header.seed,
        events = recording.events.len(),
        snapshots = recording.snapshots.len(),
        "Recording loaded"
    );
    Ok(recording.verify(epsilon)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use chrono::Utc;
    use skirmish_core::{Battle, SkirmishConfig};
    use skirmish_types::{RecordingHeader, SessionId};
    use tokio::sync::mpsc;

    use super::*;
    use crate::sink::{ChannelSink, SnapshotObserver};

    fn channel_battle(every: u64) -> UnboundedReceiver<Frame> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut config = SkirmishConfig::default();
        config.session.max_duration_ms = 3_000;
        let mut battle = Battle::new(&config, ChannelSink::new(tx.clone())).unwrap();
        let mut observer = SnapshotObserver::new(tx, every);
        let _ = battle.run(&mut observer).unwrap();
        observer.send(battle.session());
        rx
    }

    #[test]
    fn live_stream_validates_clean() {
        let (summary, output) = validate::<Vec<u8>>(channel_battle(1), 1e-9, None).unwrap();
        assert!(summary.report.is_clean());
        assert!(summary.report.checked_snapshots > 0);
        assert!(summary.report.unchecked_snapshots.is_empty());
        assert_eq!(summary.frames_recorded, None);
        assert!(output.is_none());
    }

    #[test]
    fn recording_replays_to_the_same_verdict() {
        let header = RecordingHeader {
            session_id: SessionId::new(),
            seed: 42,
            recorded_at: Utc::now(),
        };
        let writer = RecordingWriter::new(Vec::new(), header.clone()).unwrap();
        let (summary, output) = validate(channel_battle(5), 1e-9, Some(writer)).unwrap();
        assert!(summary.report.is_clean());

        let bytes = output.unwrap();
        let recording = read_recording(bytes.as_slice()).unwrap();
        assert_eq!(recording.header, header);
        assert_eq!(
            summary.frames_recorded,
            Some(1 + recording.events.len() as u64 + recording.snapshots.len() as u64)
        );

        let offline = recording.verify(1e-9).unwrap();
        assert_eq!(offline.diffs, summary.report.diffs);
        assert_eq!(offline.checked_snapshots, summary.report.checked_snapshots);
        assert_eq!(offline.events_applied, summary.report.events_applied);
    }
}
