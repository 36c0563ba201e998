//! Error taxonomy for harness operations.

use std::path::PathBuf;

use thiserror::Error;

use crate::session::SessionState;

/// Errors surfaced by the record/replay harness.
///
/// An unmatched replay lookup is deliberately absent: it is reported as
/// `Ok(None)` with a logged warning.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// A recording or replay was started while another session is active.
    #[error("cannot start a new session while {active} is active")]
    SessionConflict {
        /// The session state that blocked the request.
        active: SessionState,
    },

    /// A stop (or replay lookup) was requested but no matching session is active.
    #[error("no active {expected} session")]
    NoActiveSession {
        /// The session state the caller expected.
        expected: SessionState,
    },

    /// The requested scenario is not known to the store.
    #[error("scenario not found: {0}")]
    ScenarioNotFound(String),

    /// A scenario with this identifier is already persisted; scenarios are immutable.
    #[error("scenario already exists: {0}")]
    ScenarioExists(String),

    /// Reading or writing a document failed.
    #[error("I/O error on {}: {source}", path.display())]
    Persistence {
        /// Document path that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A document could not be encoded or decoded.
    #[error("invalid document {}: {source}", path.display())]
    Serialization {
        /// Document path being processed.
        path: PathBuf,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },

    /// An HTTP-archive document could not be produced or interpreted.
    #[error("archive error: {0}")]
    Archive(String),

    /// Configuration could not be resolved.
    #[error("configuration error: {0}")]
    Config(String),

    /// The system-under-test executor failed.
    #[error("execution failed: {0}")]
    Execution(String),
}

impl HarnessError {
    pub(crate) fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence { path: path.into(), source }
    }

    pub(crate) fn serialization(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Serialization { path: path.into(), source }
    }
}

/// Result alias used throughout the harness.
pub type Result<T> = std::result::Result<T, HarnessError>;
