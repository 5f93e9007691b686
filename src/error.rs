//! Error conditions raised by the sampling core.
//!
//! Only [`MonitorError::Config`] is fatal. Everything else is retried by the
//! monitor loop on its normal cadence.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    /// No live process has the marker in its command line.
    #[error("no process matching {marker:?} is running")]
    TargetNotFound { marker: String },

    /// A metric source could not be read this tick.
    #[error("{what} unavailable: {reason}")]
    MetricsUnavailable { what: String, reason: String },

    #[error("failed to write sample log {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl MonitorError {
    pub fn unavailable(what: impl Into<String>, reason: impl ToString) -> Self {
        MonitorError::MetricsUnavailable {
            what: what.into(),
            reason: reason.to_string(),
        }
    }

    pub fn write(path: impl Into<PathBuf>, source: impl Into<std::io::Error>) -> Self {
        MonitorError::Write {
            path: path.into(),
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MonitorError>;
