//! # Rewind Log
//!
//! Event model and event-log gateway trait for Rewind.
//!
//! This crate defines the read-side contract of the append-only event log:
//! the replay engine only ever reads ranges of events; appending happens on
//! the interaction-recording path, which is outside the replay subsystem.
//!
//! ## Design Principles
//!
//! - The log is logically append-only, single-writer
//! - Sequence numbers are unique, gapless, and strictly increasing
//! - Gateways are **opaque event stores**: payloads are uninterpreted bytes
//! - Must be `Send + Sync` for concurrent seeks
//!
//! ## Example
//!
//! ```rust
//! use rewind_log::{EventLog, InMemoryEventLog};
//!
//! let log = InMemoryEventLog::new();
//! log.append("stroke.added", vec![1, 2, 3], 0).unwrap();
//! assert_eq!(log.head_sequence().unwrap().as_u64(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod event;
mod gateway;
mod memory;
mod types;

pub use error::{LogError, LogResult};
pub use event::Event;
pub use gateway::EventLog;
pub use memory::InMemoryEventLog;
pub use types::SequenceNumber;
