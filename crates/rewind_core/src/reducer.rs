//! State reducer trait.

use rewind_log::Event;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Error returned by a reducer that rejects an event.
///
/// Reducers must fail fast on malformed or unrecognized events rather than
/// silently producing divergent state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ReducerError {
    /// Description of why the event could not be applied.
    pub message: String,
}

impl ReducerError {
    /// Creates a new reducer error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A deterministic state-reduction function.
///
/// The replay engine is event-type agnostic: it only ever calls `apply` in
/// strictly ascending sequence order. Concrete reducers should dispatch
/// over a closed event enum with exhaustive matching, decoded from the
/// event's opaque payload.
///
/// # Invariants
///
/// - `apply` is pure: no I/O, no hidden state, deterministic for a given
///   `(state, event)` pair
/// - `apply` never mutates its input; it consumes the state and returns the
///   successor
/// - The state type serializes deterministically (ordered containers), so
///   a checkpoint reproduces the exact state of a full replay
pub trait Reducer: Send + Sync {
    /// The reconstructed application state.
    type State: Clone + Serialize + DeserializeOwned + Send + Sync;

    /// Returns the origin state, before any event has been applied.
    fn initial_state(&self) -> Self::State;

    /// Applies one event, producing the successor state.
    ///
    /// # Errors
    ///
    /// Returns an error if the event is malformed or unrecognized. The
    /// engine surfaces this to the seek caller; it is never retried.
    fn apply(&self, state: Self::State, event: &Event) -> Result<Self::State, ReducerError>;
}
