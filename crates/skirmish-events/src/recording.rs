//! JSON-lines session recordings.
//!
//! A recording is a header line followed by event and snapshot lines in
//! emission order. Each line is tagged by `frame`:
//!
//! ```text
//! {"frame":"header","session_id":"...","seed":42,"recorded_at":"..."}
//! {"frame":"event","seq":1,"sim_time":0,"kind":"unit_spawned",...}
//! {"frame":"snapshot","session_id":"...","seq":1,"sim_time":0,"units":[...]}
//! ```
//!
//! Recordings are a debugging aid for offline verification, not a durable
//! log. Writes are not fsynced.

use std::io::{BufRead, Write};

use serde::{Deserialize, Serialize};
use skirmish_types::{RecordingHeader, Snapshot};

use crate::desync::{self, DesyncReport};
use crate::error::ProtocolViolation;
use crate::wire::WireEvent;

/// Errors reading or writing a recording.
#[derive(Debug, thiserror::Error)]
pub enum RecordingError {
    /// Underlying I/O failure.
    #[error("recording I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame could not be serialized.
    #[error("failed to encode recording frame: {0}")]
    Encode(#[source] serde_json::Error),

    /// A line could not be parsed.
    #[error("recording line {line}: {source}")]
    Json {
        /// One-based line number.
        line: usize,
        /// Parser error.
        source: serde_json::Error,
    },

    /// The first frame was not a header.
    #[error("recording does not start with a header frame")]
    MissingHeader,

    /// A header frame appeared after the first line.
    #[error("unexpected header frame on line {line}")]
    MisplacedHeader {
        /// One-based line number.
        line: usize,
    },
}

/// One line of a recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum RecordLine {
    /// Session metadata, always first.
    Header(RecordingHeader),
    /// A flat wire event.
    Event(WireEvent),
    /// A validation snapshot.
    Snapshot(Snapshot),
}

/// A recording read back into memory.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    /// Session metadata.
    pub header: RecordingHeader,
    /// Events in line order.
    pub events: Vec<WireEvent>,
    /// Snapshots in line order.
    pub snapshots: Vec<Snapshot>,
}

impl Recording {
    /// Run the desync detector over the recording.
    ///
    /// # Errors
    ///
    /// Returns the first [`ProtocolViolation`] in the recorded stream.
    pub fn verify(&self, epsilon: f64) -> Result<DesyncReport, ProtocolViolation> {
        desync::run(&self.events, &self.snapshots, epsilon)
    }
}

/// Writes recording frames, one JSON object per line.
#[derive(Debug)]
pub struct RecordingWriter<W: Write> {
    out: W,
    frames: u64,
}

impl<W: Write> RecordingWriter<W> {
    /// Start a recording by writing its header.
    ///
    /// # Errors
    ///
    /// Returns a [`RecordingError`] if the header cannot be written.
    pub fn new(out: W, header: RecordingHeader) -> Result<Self, RecordingError> {
        let mut writer = Self { out, frames: 0 };
        writer.write(&RecordLine::Header(header))?;
        Ok(writer)
    }

    /// Append an event frame.
    ///
    /// # Errors
    ///
    /// Returns a [`RecordingError`] on encode or I/O failure.
    pub fn write_event(&mut self, event: &WireEvent) -> Result<(), RecordingError> {
        self.write(&RecordLine::Event(event.clone()))
    }

    /// Append a snapshot frame.
    ///
    /// # Errors
    ///
    /// Returns a [`RecordingError`] on encode or I/O failure.
    pub fn write_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), RecordingError> {
        self.write(&RecordLine::Snapshot(snapshot.clone()))
    }

    /// Frames written so far, header included.
    pub const fn frames(&self) -> u64 {
        self.frames
    }

    /// Flush and return the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns a [`RecordingError`] if the flush fails.
    pub fn finish(mut self) -> Result<W, RecordingError> {
        self.out.flush()?;
        Ok(self.out)
    }

    fn write(&mut self, line: &RecordLine) -> Result<(), RecordingError> {
        serde_json::to_writer(&mut self.out, line).map_err(RecordingError::Encode)?;
        self.out.write_all(b"\n")?;
        self.frames = self.frames.saturating_add(1);
        Ok(())
    }
}

/// Read a whole recording. Blank lines are ignored.
///
/// # Errors
///
/// Returns a [`RecordingError`] on I/O failure, an unparsable line, or a
/// missing or misplaced header.
pub fn read_recording<R: BufRead>(reader: R) -> Result<Recording, RecordingError> {
    let mut header = None;
    let mut events = Vec::new();
    let mut snapshots = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let number = index.saturating_add(1);
        if line.trim().is_empty() {
            continue;
        }
        let frame: RecordLine = serde_json::from_str(&line).map_err(|source| RecordingError::Json {
            line: number,
            source,
        })?;
        match frame {
            RecordLine::Header(h) if header.is_none() => {
                header = Some(h);
            }
            RecordLine::Header(_) => return Err(RecordingError::MisplacedHeader { line: number }),
            _ if header.is_none() => return Err(RecordingError::MissingHeader),
            RecordLine::Event(event) => events.push(event),
            RecordLine::Snapshot(snapshot) => snapshots.push(snapshot),
        }
    }

    let header = header.ok_or(RecordingError::MissingHeader)?;
    Ok(Recording {
        header,
        events,
        snapshots,
    })
}
