//! Type-safe identifier wrappers.
//!
//! Units and effects are identified by dense integers allocated by the
//! owning `CombatSession`, so the same seed and roster always produce the
//! same ids. Only the session itself carries a UUID v7, which is metadata
//! and never participates in state comparison.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around an integer with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident($inner:ty), $prefix:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub $inner);

        impl $name {
            /// Wrap a raw identifier value.
            pub const fn new(raw: $inner) -> Self {
                Self(raw)
            }

            /// Return the inner integer value.
            pub const fn into_inner(self) -> $inner {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }

        impl From<$inner> for $name {
            fn from(raw: $inner) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for $inner {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a unit within a combat session.
    UnitId(u32), "unit-"
}

define_id! {
    /// Unique identifier for an effect instance within a combat session.
    ///
    /// Never reused, even after the effect expires.
    EffectId(u64), "fx-"
}

/// Identifier for a whole combat session (UUID v7, time-ordered).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Create a new session identifier using UUID v7.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for SessionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_prefix() {
        assert_eq!(UnitId::new(3).to_string(), "unit-3");
        assert_eq!(EffectId::new(12).to_string(), "fx-12");
    }

    #[test]
    fn ids_serialize_as_bare_integers() {
        let json = serde_json::to_string(&EffectId::new(7)).ok();
        assert_eq!(json.as_deref(), Some("7"));
        let restored: Result<UnitId, _> = serde_json::from_str("4");
        assert_eq!(restored.ok(), Some(UnitId::new(4)));
    }

    #[test]
    fn ids_order_by_raw_value() {
        assert!(EffectId::new(2) < EffectId::new(10));
    }

    #[test]
    fn session_ids_are_distinct() {
        assert_ne!(SessionId::new(), SessionId::new());
    }
}
