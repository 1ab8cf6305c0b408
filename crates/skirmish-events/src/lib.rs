//! Consumer side of the Skirmish event stream.
//!
//! Everything a remote client needs to rebuild combat state from events
//! alone, and everything the simulator's own test harness needs to prove
//! that it can.
//!
//! # Modules
//!
//! - [`wire`] -- Flat JSON records and mandatory-field enforcement
//! - [`error`] -- Protocol violations
//! - [`view`] -- The reconstructed session state
//! - [`reconstruct`] -- Pure fold of events into a view
//! - [`desync`] -- Snapshot-vs-reconstruction diffing
//! - [`recording`] -- JSON-lines recordings for offline verification

pub mod desync;
pub mod error;
pub mod reconstruct;
pub mod recording;
pub mod view;
pub mod wire;

pub use desync::{DesyncDetector, DesyncReport, DiffEntry};
pub use error::ProtocolViolation;
pub use reconstruct::{Reconstructor, reconstruct, reconstruct_events};
pub use recording::{RecordLine, Recording, RecordingError, RecordingWriter, read_recording};
pub use view::{SessionStateView, UnitRecord};
pub use wire::{Decoded, WireEvent, decode, encode, parse_line};
