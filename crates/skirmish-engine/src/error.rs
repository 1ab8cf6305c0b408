//! Error types for the battle runner binary.
//!
//! [`EngineError`] wraps every failure mode of a run or a verification so
//! `main` can propagate with `?`.

/// Top-level error for the battle runner.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: skirmish_core::ConfigError,
    },

    /// The simulation failed.
    #[error("simulation error: {source}")]
    Core {
        /// The underlying core error.
        #[from]
        source: skirmish_core::CoreError,
    },

    /// The event stream broke protocol.
    #[error("protocol violation: {source}")]
    Protocol {
        /// The violation.
        #[from]
        source: skirmish_events::ProtocolViolation,
    },

    /// Reading or writing the recording failed.
    #[error("recording error: {source}")]
    Recording {
        /// The underlying recording error.
        #[from]
        source: skirmish_events::RecordingError,
    },

    /// Opening a file failed.
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// A blocking task panicked or was cancelled.
    #[error("task error: {source}")]
    Task {
        /// The join failure.
        #[from]
        source: tokio::task::JoinError,
    },

    /// Reconstructed state diverged from the simulator's snapshots.
    #[error("desync detected: {diffs} field(s) differ")]
    Desync {
        /// Number of diff entries.
        diffs: usize,
    },
}
