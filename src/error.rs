//! Error types for the operator console.
//!
//! Each component fails with its own error type so callers can tell operator
//! input problems (`MoveError`) apart from external-process problems
//! (`DispatchError`) and per-file tagging problems (`TagError`). None of
//! these are fatal to the process: every one is caught at the component
//! boundary, logged with context, and the engine keeps ticking.
//! `ConsoleError` covers the startup paths (configuration, watch setup)
//! where bailing out is the right answer.

use thiserror::Error;

/// Convenience alias for results using the console error type.
pub type ConsoleResult<T> = std::result::Result<T, ConsoleError>;

/// Errors raised while loading configuration or starting the engine.
#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("Configuration load error: {0}")]
    Config(#[from] figment::Error),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid watch pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        source: glob::PatternError,
    },
}

/// A mechanism move that could not be carried out.
///
/// A failed move never updates the mechanism's recorded position.
#[derive(Error, Debug)]
pub enum MoveError {
    /// A discrete mechanism was asked to move with no position selected,
    /// or with a label that is not in its position table.
    #[error("no valid position selected for '{0}'")]
    NoSelection(String),

    /// A continuous mechanism target that does not parse as an integer.
    #[error("'{0}' is not a valid integer target")]
    InvalidValue(String),

    /// No mechanism with the requested name is configured.
    #[error("unknown mechanism '{0}'")]
    UnknownMechanism(String),

    /// The control program could not be run at all.
    #[error("dispatch failed: {0}")]
    DispatchFailed(#[from] DispatchError),

    /// The control program ran but returned a non-zero exit code.
    #[error("control program rejected the move (exit code {0})")]
    CommandRejected(i32),
}

/// The external control program could not be executed.
///
/// A non-zero exit code from a program that did run is *not* a
/// `DispatchError`; the dispatcher reports the code and the caller decides
/// what it means.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("failed to launch '{program}': {source}")]
    LaunchFailed {
        program: String,
        source: std::io::Error,
    },

    /// The child was terminated by a signal and produced no exit code.
    #[error("'{0}' terminated without an exit code")]
    NoExitCode(String),
}

/// One data file's header could not be read or written.
///
/// Tag errors are logged and skipped; they never stop the polling loop.
#[derive(Error, Debug)]
pub enum TagError {
    #[error("I/O failure on '{path}': {source}")]
    IoFailure {
        path: String,
        source: std::io::Error,
    },

    #[error("'{path}' does not parse as a FITS header: {reason}")]
    BadHeader { path: String, reason: String },
}
