//! Shared type definitions for the Skirmish combat simulator.
//!
//! This crate is the single source of truth for every type that crosses a
//! crate or process boundary: the simulator emits these events, the replay
//! pipeline consumes them, and the display client receives them as
//! `TypeScript` via `ts-rs`.
//!
//! # Modules
//!
//! - [`ids`] -- Integer-backed unit and effect ids, UUID session id
//! - [`time`] -- Millisecond sim clock types
//! - [`enums`] -- Sides, stats, effect kinds, expiry reasons
//! - [`stats`] -- The live/base stat block
//! - [`event`] -- Sequenced events and their payloads
//! - [`snapshot`] -- Validation-only roster snapshots

pub mod enums;
pub mod event;
pub mod ids;
pub mod snapshot;
pub mod stats;
pub mod time;

// Re-export all public types at crate root for convenience.
pub use enums::{DamageKind, EffectKind, ExpiryReason, RewardCause, Side, Stat, ValueKind};
pub use event::{Event, EventPayload};
pub use ids::{EffectId, SessionId, UnitId};
pub use snapshot::{CanonicalEffect, RecordingHeader, Snapshot, UnitSnapshot};
pub use stats::StatBlock;
pub use time::{SimDuration, SimTime};
