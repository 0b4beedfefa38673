//! Core type definitions for the event log.

use std::fmt;

/// Sequence number identifying an event in the log.
///
/// Sequence numbers are unique, gapless, and strictly increasing. Sequence 0
/// denotes the origin (empty) state; the first event in a log carries
/// sequence 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequenceNumber(pub u64);

impl SequenceNumber {
    /// The origin sequence, before any event has been applied.
    pub const ORIGIN: Self = Self(0);

    /// Creates a new sequence number.
    #[must_use]
    pub const fn new(seq: u64) -> Self {
        Self(seq)
    }

    /// Returns the raw sequence value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next sequence number.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns true if this is the origin sequence.
    #[must_use]
    pub const fn is_origin(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seq:{}", self.0)
    }
}

impl From<u64> for SequenceNumber {
    fn from(seq: u64) -> Self {
        Self(seq)
    }
}
