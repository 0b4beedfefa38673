//! Event record definition.

use crate::types::SequenceNumber;

/// A single recorded event in the append-only log.
///
/// Events are owned exclusively by the event log. The replay engine only
/// reads ranges of them; the payload is opaque at this layer and is only
/// interpreted by the reducer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Unique, gapless, strictly increasing sequence number.
    pub sequence: SequenceNumber,
    /// Event type tag, e.g. `"stroke.added"`.
    pub kind: String,
    /// Opaque event payload bytes.
    pub payload: Vec<u8>,
    /// Wall-clock timestamp of recording, in milliseconds since the epoch.
    pub timestamp_ms: u64,
}

impl Event {
    /// Creates a new event.
    pub fn new(
        sequence: SequenceNumber,
        kind: impl Into<String>,
        payload: Vec<u8>,
        timestamp_ms: u64,
    ) -> Self {
        Self {
            sequence,
            kind: kind.into(),
            payload,
            timestamp_ms,
        }
    }
}
