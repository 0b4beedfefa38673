//! Error types for event-log operations.

use crate::types::SequenceNumber;
use thiserror::Error;

/// Result type for log operations.
pub type LogResult<T> = Result<T, LogError>;

/// Errors that can occur during event-log operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LogError {
    /// A requested sequence is missing from the log.
    ///
    /// A gap is a data-integrity violation, not a recoverable condition.
    #[error("sequence gap in event log: expected {expected}, got {got}")]
    RangeGap {
        /// The sequence that should have come next.
        expected: SequenceNumber,
        /// The sequence actually found.
        got: SequenceNumber,
    },

    /// A requested range extends past the log head.
    #[error("range past log head: requested {requested}, head is {head}")]
    PastHead {
        /// The last sequence requested.
        requested: SequenceNumber,
        /// The current head of the log.
        head: SequenceNumber,
    },

    /// An append did not continue the gapless sequence.
    #[error("non-monotonic append: expected {expected}, got {got}")]
    NonMonotonicAppend {
        /// The sequence the log expected.
        expected: SequenceNumber,
        /// The sequence offered.
        got: SequenceNumber,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_sequences() {
        let err = LogError::RangeGap {
            expected: SequenceNumber::new(5),
            got: SequenceNumber::new(7),
        };
        assert_eq!(
            err.to_string(),
            "sequence gap in event log: expected seq:5, got seq:7"
        );
    }
}
