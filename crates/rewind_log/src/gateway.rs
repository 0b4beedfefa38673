//! Event log gateway trait definition.

use crate::error::LogResult;
use crate::event::Event;
use crate::types::SequenceNumber;

/// Read-side gateway to the append-only event log.
///
/// Gateways are **opaque event stores**. They hand out ordered ranges of
/// recorded events; the replay subsystem owns all interpretation of
/// payloads and never writes through this trait.
///
/// # Invariants
///
/// - `head_sequence` returns the sequence of the newest event, or the
///   origin sequence (0) for an empty log
/// - `events_in_range` returns events in strictly ascending, gapless
///   sequence order covering exactly `(from_exclusive, to_inclusive]`
/// - A missing sequence inside a requested range is a data-integrity
///   violation and must fail the read, never silently shrink it
/// - Gateways must be `Send + Sync` for concurrent seeks
pub trait EventLog: Send + Sync {
    /// Returns the sequence number of the newest event in the log.
    ///
    /// Returns [`SequenceNumber::ORIGIN`] for an empty log.
    ///
    /// # Errors
    ///
    /// Returns an error if the head cannot be determined.
    fn head_sequence(&self) -> LogResult<SequenceNumber>;

    /// Reads the half-open range `(from_exclusive, to_inclusive]`.
    ///
    /// An empty range (`from_exclusive >= to_inclusive`) yields an empty
    /// vector.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `to_inclusive` is past the log head (`LogError::PastHead`)
    /// - any sequence in the range is missing (`LogError::RangeGap`)
    fn events_in_range(
        &self,
        from_exclusive: SequenceNumber,
        to_inclusive: SequenceNumber,
    ) -> LogResult<Vec<Event>>;
}
