//! Flat wire records and mandatory-field enforcement.
//!
//! On the wire an event is one JSON object:
//!
//! ```text
//! { "seq": 7, "sim_time": 1200, "kind": "damage", "target_id": 2, ... }
//! ```
//!
//! [`encode`] flattens a typed [`Event`] into a [`WireEvent`]. [`decode`]
//! checks the kind's mandatory fields first, so a missing field is reported
//! by name rather than as a generic parse failure, then parses the payload.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use skirmish_types::{Event, EventPayload, SimTime};

use crate::error::ProtocolViolation;

/// One event as it travels on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireEvent {
    /// Stream position.
    pub seq: u64,
    /// Sim clock reading at emission.
    pub sim_time: SimTime,
    /// Event kind tag.
    pub kind: String,
    /// Kind-specific fields.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Result of decoding a wire record.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// A kind this consumer understands.
    Known(Event),
    /// A kind this consumer does not understand. It still occupies its seq.
    Unknown {
        /// Stream position.
        seq: u64,
        /// The unrecognized kind tag.
        kind: String,
    },
}

/// Fields a record of `kind` must carry, or `None` for an unknown kind.
pub fn mandatory_fields(kind: &str) -> Option<&'static [&'static str]> {
    let fields: &'static [&'static str] = match kind {
        "unit_spawned" => &[
            "unit_id", "name", "side", "hp", "max_hp", "mana", "max_mana", "stats",
        ],
        "damage" => &[
            "target_id",
            "raw_amount",
            "shield_absorbed",
            "resulting_hp",
            "resulting_shield",
        ],
        "heal" => &["target_id", "amount", "resulting_hp"],
        "mana_delta" => &["unit_id", "resulting_mana"],
        "stat_effect_applied" => &[
            "unit_id",
            "effect_id",
            "effect_kind",
            "stat",
            "value",
            "value_kind",
            "applied_delta",
            "resulting_stat_value",
        ],
        "stat_effect_expired" => &["unit_id", "effect_id", "stat", "resulting_stat_value"],
        "shield_applied" => &["unit_id", "effect_id", "amount", "duration", "resulting_shield"],
        "shield_expired" => &["unit_id", "effect_id", "resulting_shield"],
        "stun_applied" => &["unit_id", "effect_id", "duration"],
        "stun_expired" => &["unit_id", "effect_id"],
        "dot_applied" | "dot_tick" | "dot_expired" => &["unit_id", "effect_id", "resulting_hp"],
        "unit_died" => &["unit_id"],
        "gold_reward" => &["unit_id", "amount", "cause", "resulting_gold"],
        "combat_ended" => &[],
        _ => return None,
    };
    Some(fields)
}

/// Flatten a typed event into its wire record.
pub fn encode(event: &Event) -> Result<WireEvent, ProtocolViolation> {
    let kind = event.payload.kind_name();
    let malformed = |reason: String| ProtocolViolation::Malformed {
        kind: kind.to_owned(),
        seq: event.seq,
        reason,
    };
    let value = serde_json::to_value(&event.payload).map_err(|e| malformed(e.to_string()))?;
    let Value::Object(mut fields) = value else {
        return Err(malformed("payload did not serialize to an object".to_owned()));
    };
    fields.remove("kind");
    Ok(WireEvent {
        seq: event.seq,
        sim_time: event.sim_time,
        kind: kind.to_owned(),
        fields,
    })
}

/// Parse a wire record into a typed event.
pub fn decode(wire: &WireEvent) -> Result<Decoded, ProtocolViolation> {
    let Some(required) = mandatory_fields(&wire.kind) else {
        return Ok(Decoded::Unknown {
            seq: wire.seq,
            kind: wire.kind.clone(),
        });
    };
    if let Some(field) = required
        .iter()
        .copied()
        .find(|field| wire.fields.get(*field).is_none_or(Value::is_null))
    {
        return Err(ProtocolViolation::MissingField {
            kind: wire.kind.clone(),
            seq: wire.seq,
            field,
        });
    }

    let mut object = wire.fields.clone();
    object.insert("kind".to_owned(), Value::String(wire.kind.clone()));
    let payload: EventPayload =
        serde_json::from_value(Value::Object(object)).map_err(|e| ProtocolViolation::Malformed {
            kind: wire.kind.clone(),
            seq: wire.seq,
            reason: e.to_string(),
        })?;
    Ok(Decoded::Known(Event {
        seq: wire.seq,
        sim_time: wire.sim_time,
        payload,
    }))
}

/// Parse one JSON line into a wire record.
pub fn parse_line(line: &str) -> Result<WireEvent, serde_json::Error> {
    serde_json::from_str(line)
}
