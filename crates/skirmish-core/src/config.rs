//! Configuration loading and typed config structures.
//!
//! The canonical configuration lives in `skirmish-config.yaml` at the
//! workspace root. Every field has a default, so an empty document (or no
//! file at all) yields a runnable 3v3 battle.

use std::path::Path;

use serde::Deserialize;
use skirmish_types::Stat;

use crate::battle::Skill;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The document parsed but describes an unusable battle.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SkirmishConfig {
    /// Session timing and seed.
    #[serde(default)]
    pub session: SessionConfig,

    /// Combat formula parameters.
    #[serde(default)]
    pub combat: CombatRules,

    /// Death-triggered reward handlers, in registration order.
    #[serde(default = "default_rewards")]
    pub rewards: Vec<RewardRule>,

    /// Replay validation settings.
    #[serde(default)]
    pub replay: ReplayConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// The two rosters.
    #[serde(default)]
    pub teams: TeamsConfig,
}

impl Default for SkirmishConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            combat: CombatRules::default(),
            rewards: default_rewards(),
            replay: ReplayConfig::default(),
            logging: LoggingConfig::default(),
            teams: TeamsConfig::default(),
        }
    }
}

impl SkirmishConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `SKIRMISH_SEED` overrides `session.seed`
    /// - `SKIRMISH_RECORD_PATH` overrides `replay.record_path`
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, then apply environment
    /// overrides and validate.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `SKIRMISH_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SKIRMISH_SEED") {
            match val.parse::<u64>() {
                Ok(seed) => self.session.seed = seed,
                Err(err) => tracing::warn!(value = %val, error = %err, "Ignoring invalid SKIRMISH_SEED"),
            }
        }
        if let Ok(val) = std::env::var("SKIRMISH_RECORD_PATH") {
            self.replay.record_path = Some(val);
        }
    }

    /// Reject configurations the battle driver cannot run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.step_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "session.step_ms must be at least 1".to_owned(),
            });
        }
        if self.teams.a.is_empty() || self.teams.b.is_empty() {
            return Err(ConfigError::Invalid {
                reason: "both teams need at least one fighter".to_owned(),
            });
        }
        if !(0.0..=1.0).contains(&self.combat.crit_chance) {
            return Err(ConfigError::Invalid {
                reason: format!("combat.crit_chance must be in [0, 1], got {}", self.combat.crit_chance),
            });
        }
        if !self.replay.float_epsilon.is_finite() || self.replay.float_epsilon < 0.0 {
            return Err(ConfigError::Invalid {
                reason: "replay.float_epsilon must be a non-negative number".to_owned(),
            });
        }
        for fighter in self.teams.a.iter().chain(&self.teams.b) {
            fighter.validate()?;
        }
        for rule in &self.rewards {
            if let RewardRule::Vengeance {
                percent,
                duration_ms,
                ..
            } = *rule
            {
                check_timed_percent("rewards.vengeance", percent, duration_ms)?;
            }
        }
        Ok(())
    }
}

impl FighterConfig {
    /// Reject a fighter whose stats or skill the Mutation Core would refuse.
    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |what: &str| ConfigError::Invalid {
            reason: format!("fighter {} {what}", self.name),
        };
        if self.max_hp == 0 {
            return Err(invalid("has max_hp 0"));
        }
        if !(self.attack.is_finite() && self.attack >= 0.0) {
            return Err(invalid("needs a finite, non-negative attack"));
        }
        if !(self.defense.is_finite() && self.defense >= 0.0) {
            return Err(invalid("needs a finite, non-negative defense"));
        }
        if !(self.attack_speed.is_finite() && self.attack_speed > 0.0) {
            return Err(invalid("needs a finite, positive attack_speed"));
        }
        let context = format!("fighter {} skill", self.name);
        match self.skill {
            Some(
                Skill::Rally {
                    percent,
                    duration_ms,
                    ..
                }
                | Skill::Sunder {
                    percent,
                    duration_ms,
                    ..
                },
            ) => check_timed_percent(&context, percent, duration_ms),
            Some(Skill::Barrier { duration_ms: 0, .. }) => {
                Err(invalid("skill barrier needs duration_ms of at least 1"))
            }
            Some(Skill::Venom {
                interval_ms, ticks, ..
            }) if interval_ms == 0 || ticks == 0 => {
                Err(invalid("skill venom needs interval_ms and ticks of at least 1"))
            }
            Some(Skill::Bash { stun_ms: 0, .. }) => {
                Err(invalid("skill bash needs stun_ms of at least 1"))
            }
            None
            | Some(
                Skill::Barrier { .. } | Skill::Venom { .. } | Skill::Bash { .. } | Skill::Mend { .. },
            ) => Ok(()),
        }
    }
}

fn check_timed_percent(context: &str, percent: f64, duration_ms: u64) -> Result<(), ConfigError> {
    if !percent.is_finite() {
        return Err(ConfigError::Invalid {
            reason: format!("{context}: percent must be finite"),
        });
    }
    if duration_ms == 0 {
        return Err(ConfigError::Invalid {
            reason: format!("{context}: duration_ms must be at least 1"),
        });
    }
    Ok(())
}

/// Session timing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionConfig {
    /// Seed for the crit RNG.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Sim milliseconds per battle step.
    #[serde(default = "default_step_ms")]
    pub step_ms: u64,

    /// The battle ends in a draw after this much sim time.
    #[serde(default = "default_max_duration_ms")]
    pub max_duration_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            step_ms: default_step_ms(),
            max_duration_ms: default_max_duration_ms(),
        }
    }
}

/// Combat formula parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CombatRules {
    /// Mana gained by the attacker per basic attack.
    #[serde(default = "default_mana_per_attack")]
    pub mana_per_attack: u32,

    /// Mana gained by every living unit per step (0 disables regen).
    #[serde(default)]
    pub mana_regen_per_step: u32,

    /// Probability in [0, 1] that a basic attack crits.
    #[serde(default = "default_crit_chance")]
    pub crit_chance: f64,

    /// Crit damage as a percentage of normal damage.
    #[serde(default = "default_crit_multiplier_pct")]
    pub crit_multiplier_pct: u32,

    /// Defense value that halves incoming physical damage.
    #[serde(default = "default_defense_scale")]
    pub defense_scale: f64,
}

impl Default for CombatRules {
    fn default() -> Self {
        Self {
            mana_per_attack: default_mana_per_attack(),
            mana_regen_per_step: 0,
            crit_chance: default_crit_chance(),
            crit_multiplier_pct: default_crit_multiplier_pct(),
            defense_scale: default_defense_scale(),
        }
    }
}

/// A death-triggered reward handler.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RewardRule {
    /// Every living ally of the fallen unit gains gold.
    AllyDeathGold {
        /// Gold per ally.
        amount: u32,
    },
    /// The killer gains gold.
    KillBounty {
        /// Gold for the killer.
        amount: u32,
    },
    /// Every living ally of the fallen unit gains a timed percentage buff.
    Vengeance {
        /// Buffed stat.
        stat: Stat,
        /// Percentage of base stat.
        percent: f64,
        /// Buff lifetime in sim milliseconds.
        duration_ms: u64,
    },
}

/// Replay validation settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReplayConfig {
    /// Tolerance for floating-point field comparisons.
    #[serde(default = "default_float_epsilon")]
    pub float_epsilon: f64,

    /// Export a snapshot every this many steps (0 disables periodic snapshots;
    /// a final snapshot is always exported).
    #[serde(default = "default_snapshot_every_steps")]
    pub snapshot_every_steps: u64,

    /// Where to write the JSON-lines recording, if anywhere.
    #[serde(default)]
    pub record_path: Option<String>,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            float_epsilon: default_float_epsilon(),
            snapshot_every_steps: default_snapshot_every_steps(),
            record_path: None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable logs.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// The two rosters, in spawn order.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TeamsConfig {
    /// Side A fighters.
    #[serde(default)]
    pub a: Vec<FighterConfig>,
    /// Side B fighters.
    #[serde(default)]
    pub b: Vec<FighterConfig>,
}

impl Default for TeamsConfig {
    fn default() -> Self {
        Self {
            a: vec![
                FighterConfig::new("Vanguard", 160, 60, 18.0, 20.0, 0.8, Some(Skill::Barrier {
                    amount: 40,
                    duration_ms: 4_000,
                })),
                FighterConfig::new("Ranger", 100, 40, 24.0, 5.0, 1.2, Some(Skill::Venom {
                    damage_per_tick: 6,
                    interval_ms: 500,
                    ticks: 4,
                })),
                FighterConfig::new("Herald", 90, 50, 14.0, 8.0, 1.0, Some(Skill::Rally {
                    stat: Stat::Attack,
                    percent: 20.0,
                    duration_ms: 5_000,
                })),
            ],
            b: vec![
                FighterConfig::new("Brute", 180, 70, 20.0, 15.0, 0.7, Some(Skill::Bash {
                    damage: 25,
                    stun_ms: 1_000,
                })),
                FighterConfig::new("Hexer", 95, 40, 16.0, 6.0, 1.0, Some(Skill::Sunder {
                    stat: Stat::Defense,
                    percent: 30.0,
                    duration_ms: 4_000,
                })),
                FighterConfig::new("Mender", 85, 50, 12.0, 6.0, 0.9, Some(Skill::Mend { amount: 35 })),
            ],
        }
    }
}

/// One fighter's static definition.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FighterConfig {
    /// Display name.
    pub name: String,
    /// Maximum (and starting) hp.
    pub max_hp: u32,
    /// Mana needed to cast the skill.
    #[serde(default)]
    pub max_mana: u32,
    /// Mana at spawn.
    #[serde(default)]
    pub starting_mana: u32,
    /// Base attack.
    pub attack: f64,
    /// Base defense.
    #[serde(default)]
    pub defense: f64,
    /// Base attacks per sim-second.
    #[serde(default = "default_attack_speed")]
    pub attack_speed: f64,
    /// Skill cast on full mana.
    #[serde(default)]
    pub skill: Option<Skill>,
}

impl FighterConfig {
    fn new(
        name: &str,
        max_hp: u32,
        max_mana: u32,
        attack: f64,
        defense: f64,
        attack_speed: f64,
        skill: Option<Skill>,
    ) -> Self {
        Self {
            name: name.to_owned(),
            max_hp,
            max_mana,
            starting_mana: 0,
            attack,
            defense,
            attack_speed,
            skill,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

const fn default_seed() -> u64 {
    42
}

const fn default_step_ms() -> u64 {
    100
}

const fn default_max_duration_ms() -> u64 {
    120_000
}

const fn default_mana_per_attack() -> u32 {
    10
}

const fn default_crit_chance() -> f64 {
    0.1
}

const fn default_crit_multiplier_pct() -> u32 {
    150
}

const fn default_defense_scale() -> f64 {
    100.0
}

const fn default_float_epsilon() -> f64 {
    1e-9
}

const fn default_snapshot_every_steps() -> u64 {
    10
}

const fn default_attack_speed() -> f64 {
    1.0
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_rewards() -> Vec<RewardRule> {
    vec![
        RewardRule::AllyDeathGold { amount: 2 },
        RewardRule::KillBounty { amount: 3 },
        RewardRule::Vengeance {
            stat: Stat::Attack,
            percent: 10.0,
            duration_ms: 3_000,
        },
    ]
}
