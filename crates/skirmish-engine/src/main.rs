//! Battle runner binary for the Skirmish simulator.
//!
//! Runs one seeded battle and checks, while it runs, that its event stream
//! alone is enough to rebuild the simulator's state. Can also re-check a
//! saved recording offline.
//!
//! # Run sequence
//!
//! 1. Load configuration (`--config`, `SKIRMISH_CONFIG`, or
//!    `skirmish-config.yaml`)
//! 2. Initialize structured logging (tracing)
//! 3. Open the recording, if `replay.record_path` is set
//! 4. Start the validator on a blocking task
//! 5. Run the battle on another blocking task, streaming events and
//!    snapshots to the validator over one FIFO channel
//! 6. Join both tasks and log the verdict

mod error;
mod recorder;
mod sink;

use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{Parser, Subcommand};
use skirmish_core::{Battle, BattleOutcome, CombatSession, SkirmishConfig};
use skirmish_core::config::LoggingConfig;
use skirmish_events::DesyncReport;
use skirmish_types::RecordingHeader;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::recorder::ValidationSummary;
use crate::sink::{ChannelSink, SnapshotObserver};

/// Skirmish - an event-sourced auto-battler combat simulator
#[derive(Parser, Debug)]
#[command(name = "skirmish-engine")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(
        short,
        long,
        env = "SKIRMISH_CONFIG",
        default_value = "skirmish-config.yaml",
        global = true
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a battle and live-check its event stream (the default)
    Run,

    /// Re-check a JSON-lines recording offline
    Verify {
        /// Recording file
        #[arg(required = true)]
        recording: PathBuf,
    },
}

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, the battle, the recording or the
/// replay check fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // 1. Load configuration.
    let config = load_config(&args.config)?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!(
        path = %args.config.display(),
        seed = config.session.seed,
        step_ms = config.session.step_ms,
        max_duration_ms = config.session.max_duration_ms,
        "Configuration loaded"
    );

    match args.command.unwrap_or(Commands::Run) {
        Commands::Run => run_battle(config).await?,
        Commands::Verify { recording } => {
            let report = recorder::verify_file(&recording, config.replay.float_epsilon)?;
            check_report(&report)?;
        }
    }

    info!("skirmish-engine shutdown complete");
    Ok(())
}

/// Load the configuration from `path`, or defaults if it does not exist.
fn load_config(path: &Path) -> Result<SkirmishConfig, EngineError> {
    if path.exists() {
        Ok(SkirmishConfig::from_file(path)?)
    } else {
        let mut config = SkirmishConfig::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }
}

/// Install the global tracing subscriber. `RUST_LOG` wins over the
/// configured level.
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Run a battle with the validator attached.
async fn run_battle(config: SkirmishConfig) -> Result<(), EngineError> {
    let (tx, rx) = mpsc::unbounded_channel();
    let session = CombatSession::new(ChannelSink::new(tx.clone()));

    // 3. Open the recording.
    let writer = match config.replay.record_path.as_deref() {
        Some(path) => {
            let header = RecordingHeader {
                session_id: session.session_id(),
                seed: config.session.seed,
                recorded_at: Utc::now(),
            };
            Some(recorder::create_recording(Path::new(path), header)?)
        }
        None => None,
    };

    // 4. Start the validator.
    let epsilon = config.replay.float_epsilon;
    let validator = tokio::task::spawn_blocking(move || recorder::validate(rx, epsilon, writer));

    // 5. Run the battle.
    let every = config.replay.snapshot_every_steps;
    let simulation = tokio::task::spawn_blocking(move || -> Result<BattleOutcome, EngineError> {
        let mut battle = Battle::with_session(&config, session)?;
        let mut observer = SnapshotObserver::new(tx, every);
        observer.send(battle.session());
        let outcome = battle.run(&mut observer)?;
        observer.send(battle.session());
        let dropped = battle.session().sink().dropped();
        if dropped > 0 {
            warn!(dropped, "Events were not delivered to the validator");
        }
        info!(snapshots = observer.sent(), "Battle task finished");
        Ok(outcome)
    });

    // 6. Join and report.
    let outcome = simulation.await??;
    let (summary, _) = validator.await??;
    log_run(&outcome, &summary);
    check_report(&summary.report)
}

fn log_run(outcome: &BattleOutcome, summary: &ValidationSummary) {
    info!(
        winner = ?outcome.winner,
        reason = ?outcome.reason,
        ended_at = %outcome.ended_at,
        steps = outcome.steps,
        events = outcome.last_seq,
        frames_recorded = ?summary.frames_recorded,
        "Battle complete"
    );
}

/// Log the detector verdict; any diff is an error.
fn check_report(report: &DesyncReport) -> Result<(), EngineError> {
    info!(
        events = report.events_applied,
        checked_snapshots = report.checked_snapshots,
        unchecked_snapshots = report.unchecked_snapshots.len(),
        diffs = report.diffs.len(),
        "Replay check finished"
    );
    if report.is_clean() {
        Ok(())
    } else {
        Err(EngineError::Desync {
            diffs: report.diffs.len(),
        })
    }
}
