//! Live and base stat blocks.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::Stat;

/// The three modifiable combat stats of a unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct StatBlock {
    /// Damage dealt per basic attack before defense.
    pub attack: f64,
    /// Flat damage mitigation score.
    pub defense: f64,
    /// Basic attacks per sim-second.
    pub attack_speed: f64,
}

impl StatBlock {
    /// Construct a stat block.
    pub const fn new(attack: f64, defense: f64, attack_speed: f64) -> Self {
        Self {
            attack,
            defense,
            attack_speed,
        }
    }

    /// Read one stat.
    pub const fn get(&self, stat: Stat) -> f64 {
        match stat {
            Stat::Attack => self.attack,
            Stat::Defense => self.defense,
            Stat::AttackSpeed => self.attack_speed,
        }
    }

    /// Overwrite one stat.
    pub const fn set(&mut self, stat: Stat, value: f64) {
        match stat {
            Stat::Attack => self.attack = value,
            Stat::Defense => self.defense = value,
            Stat::AttackSpeed => self.attack_speed = value,
        }
    }

    /// Whether every stat is a finite number.
    pub const fn is_finite(&self) -> bool {
        self.attack.is_finite() && self.defense.is_finite() && self.attack_speed.is_finite()
    }
}
