#![forbid(unsafe_code)]

//! Error types surfaced by the collaborators.

use thiserror::Error;

/// Why a command invocation produced no output.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CommandError<E> {
    /// The command was disabled (or already executing) when applied.
    #[error("command is disabled")]
    Disabled,
    /// The command ran and its work failed.
    #[error("command failed: {0}")]
    Failed(E),
}

/// Failure to hand work to the UI scheduler from another thread.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    /// The UI thread that owned the scheduler has exited.
    #[error("UI scheduler is no longer running")]
    Disconnected,
}

/// Invalid runtime configuration.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {var} value {value:?}: expected a non-negative integer or \"unbounded\"")]
    InvalidRemoteBudget { var: &'static str, value: String },
}
