//! Error types for the replay engine.

use rewind_log::{LogError, SequenceNumber};
use thiserror::Error;

/// Result type for replay operations.
pub type ReplayResult<T> = Result<T, ReplayError>;

/// Errors that can surface from a seek.
///
/// Only integrity failures reach the caller. Recoverable conditions
/// (corrupt cached snapshots, oversized checkpoints) are absorbed inside
/// the engine and visible via telemetry only.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// The event log reported a gap or an out-of-range read.
    ///
    /// Indicates data corruption, not a transient failure; never retried.
    #[error("event log error: {0}")]
    Log(#[from] LogError),

    /// The reducer rejected an event during the fold.
    ///
    /// Indicates a malformed or unrecognized event; the seek is aborted and
    /// no checkpoint at or past the failing sequence is ever inserted.
    #[error("reducer failed at {sequence}: {message}")]
    Reducer {
        /// Sequence of the event the reducer rejected.
        sequence: SequenceNumber,
        /// Description of the failure.
        message: String,
    },

    /// The engine was constructed with an unusable configuration.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration problem.
        message: String,
    },
}

impl ReplayError {
    /// Creates a reducer failure error.
    pub fn reducer(sequence: SequenceNumber, message: impl Into<String>) -> Self {
        Self::Reducer {
            sequence,
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
