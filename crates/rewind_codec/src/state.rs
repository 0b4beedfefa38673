//! CBOR (de)serialization of reducer state.

use crate::error::{CodecError, CodecResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Serializes reducer state to CBOR bytes.
///
/// CBOR via `ciborium` is deterministic for a fixed Rust type with ordered
/// containers, which is what the equivalence guarantee requires: the same
/// state always serializes to the same bytes.
///
/// # Errors
///
/// Returns an error if the state cannot be represented in CBOR.
pub fn encode_state<S: Serialize>(state: &S) -> CodecResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(state, &mut buf)
        .map_err(|e| CodecError::serialize(e.to_string()))?;
    Ok(buf)
}

/// Deserializes reducer state from CBOR bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not valid CBOR for the target type.
pub fn decode_state<S: DeserializeOwned>(bytes: &[u8]) -> CodecResult<S> {
    ciborium::de::from_reader(bytes).map_err(|e| CodecError::deserialize(e.to_string()))
}
