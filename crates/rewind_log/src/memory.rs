//! In-memory event log for testing and ephemeral documents.

use crate::error::{LogError, LogResult};
use crate::event::Event;
use crate::gateway::EventLog;
use crate::types::SequenceNumber;
use parking_lot::RwLock;

/// An in-memory event log.
///
/// Stores all events in memory and is suitable for:
/// - Unit and integration tests
/// - Ephemeral documents that are never persisted
///
/// The append path enforces the gapless, strictly increasing sequence
/// invariant. `with_events` bypasses that check so tests can construct
/// deliberately corrupt logs.
///
/// # Thread Safety
///
/// The log is thread-safe; reads may proceed concurrently with appends.
///
/// # Example
///
/// ```rust
/// use rewind_log::{EventLog, InMemoryEventLog, SequenceNumber};
///
/// let log = InMemoryEventLog::new();
/// log.append("stroke.added", vec![1], 0).unwrap();
/// log.append("stroke.added", vec![2], 1).unwrap();
///
/// let events = log
///     .events_in_range(SequenceNumber::ORIGIN, SequenceNumber::new(2))
///     .unwrap();
/// assert_eq!(events.len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryEventLog {
    events: RwLock<Vec<Event>>,
}

impl InMemoryEventLog {
    /// Creates a new empty in-memory log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a log from pre-existing events without sequence validation.
    ///
    /// Useful for testing recovery from corrupt histories.
    #[must_use]
    pub fn with_events(events: Vec<Event>) -> Self {
        Self {
            events: RwLock::new(events),
        }
    }

    /// Appends a new event, assigning the next sequence number.
    ///
    /// Returns the sequence assigned to the event.
    pub fn append(
        &self,
        kind: impl Into<String>,
        payload: Vec<u8>,
        timestamp_ms: u64,
    ) -> LogResult<SequenceNumber> {
        let mut events = self.events.write();
        let sequence = match events.last() {
            Some(last) => last.sequence.next(),
            None => SequenceNumber::new(1),
        };
        events.push(Event::new(sequence, kind, payload, timestamp_ms));
        Ok(sequence)
    }

    /// Appends a fully formed event, enforcing sequence continuity.
    pub fn append_event(&self, event: Event) -> LogResult<()> {
        let mut events = self.events.write();
        let expected = match events.last() {
            Some(last) => last.sequence.next(),
            None => SequenceNumber::new(1),
        };
        if event.sequence != expected {
            return Err(LogError::NonMonotonicAppend {
                expected,
                got: event.sequence,
            });
        }
        events.push(event);
        Ok(())
    }

    /// Returns the number of events in the log.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if the log contains no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

impl EventLog for InMemoryEventLog {
    fn head_sequence(&self) -> LogResult<SequenceNumber> {
        Ok(self
            .events
            .read()
            .last()
            .map(|e| e.sequence)
            .unwrap_or(SequenceNumber::ORIGIN))
    }

    fn events_in_range(
        &self,
        from_exclusive: SequenceNumber,
        to_inclusive: SequenceNumber,
    ) -> LogResult<Vec<Event>> {
        if from_exclusive >= to_inclusive {
            return Ok(Vec::new());
        }

        let events = self.events.read();
        let head = events
            .last()
            .map(|e| e.sequence)
            .unwrap_or(SequenceNumber::ORIGIN);
        if to_inclusive > head {
            return Err(LogError::PastHead {
                requested: to_inclusive,
                head,
            });
        }

        // Collect (from, to] and verify gaplessness as we go. The log may
        // have been constructed unchecked, so contiguity is re-validated on
        // every read.
        let mut out = Vec::with_capacity((to_inclusive.0 - from_exclusive.0) as usize);
        let mut expected = from_exclusive.next();
        for event in events
            .iter()
            .filter(|e| e.sequence > from_exclusive && e.sequence <= to_inclusive)
        {
            if event.sequence != expected {
                return Err(LogError::RangeGap {
                    expected,
                    got: event.sequence,
                });
            }
            out.push(event.clone());
            expected = expected.next();
        }

        if expected != to_inclusive.next() {
            // Range ended early: the tail of the request is missing.
            return Err(LogError::RangeGap {
                expected,
                got: to_inclusive,
            });
        }

        Ok(out)
    }
}
