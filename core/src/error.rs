//! Error types for the dispatcher.
//!
//! # Design
//! A failed transfer is not an error here: it is an `Outcome` with status 0
//! and a message, recorded like any other result. The types below cover the
//! remaining failure modes: outcome-log and spool I/O, malformed environment
//! configuration, and a detached batch whose worker thread died.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Outcome-log and per-ID file failures.
#[derive(Debug, Error)]
pub enum LogError {
    /// Logging is enabled but no path was configured for this outcome.
    #[error("no {tag} log path configured")]
    MissingPath { tag: &'static str },

    /// Opening, writing or reading a log or spool file failed.
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl LogError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        LogError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Malformed or missing environment configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    Missing(&'static str),

    #[error("environment variable {var} has invalid value {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Failures of a detached batch.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The background thread running a detached batch panicked.
    #[error("batch worker panicked")]
    WorkerPanicked,

    /// The OS refused to start the batch thread; no transfer ran.
    #[error("batch thread could not be started")]
    NotStarted,
}
