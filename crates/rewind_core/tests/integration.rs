//! End-to-end tests over a document-style event model.

use proptest::prelude::*;
use rewind_codec::encode_state;
use rewind_core::{
    Direction, PlaybackDriver, PlaybackState, ReplayConfig, ReplayEngine, ReplayError, Reducer,
    ReducerError, Speed,
};
use rewind_log::{Event, InMemoryEventLog, SequenceNumber};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// The document event vocabulary: a closed enum, dispatched exhaustively
/// by the reducer.
#[derive(Debug, Clone, Serialize, Deserialize)]
enum DocEvent {
    NodeAdded { id: u32, kind: String },
    NodeMoved { id: u32, dx: i64, dy: i64 },
    NodeRemoved { id: u32 },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Node {
    kind: String,
    x: i64,
    y: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct DocState {
    nodes: BTreeMap<u32, Node>,
    revision: u64,
}

struct DocReducer;

impl Reducer for DocReducer {
    type State = DocState;

    fn initial_state(&self) -> DocState {
        DocState::default()
    }

    fn apply(&self, mut state: DocState, event: &Event) -> Result<DocState, ReducerError> {
        let doc_event: DocEvent = serde_json::from_slice(&event.payload)
            .map_err(|e| ReducerError::new(format!("malformed payload: {e}")))?;
        match doc_event {
            DocEvent::NodeAdded { id, kind } => {
                state.nodes.insert(
                    id,
                    Node {
                        kind,
                        ..Node::default()
                    },
                );
            }
            DocEvent::NodeMoved { id, dx, dy } => {
                let node = state
                    .nodes
                    .get_mut(&id)
                    .ok_or_else(|| ReducerError::new(format!("moved unknown node {id}")))?;
                node.x += dx;
                node.y += dy;
            }
            DocEvent::NodeRemoved { id } => {
                state.nodes.remove(&id);
            }
        }
        state.revision += 1;
        Ok(state)
    }
}

fn push(log: &InMemoryEventLog, event: &DocEvent) {
    let payload = serde_json::to_vec(event).unwrap();
    log.append("doc", payload, 0).unwrap();
}

/// A log that always adds nodes first, then mixes moves and removals, so
/// every generated history is valid.
fn doc_log(n: u64) -> Arc<InMemoryEventLog> {
    let log = InMemoryEventLog::new();
    for i in 0..n {
        let id = (i % 11) as u32;
        let event = if i < 11 {
            DocEvent::NodeAdded {
                id,
                kind: "rect".to_string(),
            }
        } else {
            match i % 3 {
                0 => DocEvent::NodeMoved {
                    id,
                    dx: (i % 17) as i64,
                    dy: -((i % 5) as i64),
                },
                1 => DocEvent::NodeRemoved { id },
                _ => DocEvent::NodeAdded {
                    id,
                    kind: "path".to_string(),
                },
            }
        };
        push(&log, &event);
    }
    Arc::new(log)
}

fn engine_with(log: Arc<InMemoryEventLog>, config: ReplayConfig) -> ReplayEngine<DocReducer> {
    ReplayEngine::new(log, DocReducer, config).unwrap()
}

/// Replays from origin with a never-reached interval: the reference
/// (uncached) reconstruction.
fn reference_state(log: &Arc<InMemoryEventLog>, target: u64) -> DocState {
    let cold = engine_with(
        Arc::clone(log),
        ReplayConfig::default().checkpoint_interval_events(u64::MAX / 2),
    );
    cold.seek(SequenceNumber::new(target)).unwrap().state
}

#[test]
fn scenario_empty_log() {
    let engine = engine_with(Arc::new(InMemoryEventLog::new()), ReplayConfig::default());
    let result = engine.seek(SequenceNumber::ORIGIN).unwrap();
    assert_eq!(result.state, DocState::default());
    assert_eq!(result.events_replayed, 0);
}

#[test]
fn scenario_cold_then_warm() {
    let log = doc_log(1500);
    let engine = engine_with(
        Arc::clone(&log),
        ReplayConfig::default().checkpoint_interval_events(1000),
    );

    let first = engine.seek(SequenceNumber::new(1500)).unwrap();
    assert_eq!(first.events_replayed, 1500);
    assert!(!first.checkpoint_hit);

    let second = engine.seek(SequenceNumber::new(1500)).unwrap();
    assert_eq!(second.events_replayed, 500);
    assert!(second.checkpoint_hit);
    assert_eq!(second.state, first.state);
    assert_eq!(second.state, reference_state(&log, 1500));
}

#[test]
fn idempotent_double_seek() {
    let log = doc_log(2300);
    let engine = engine_with(
        Arc::clone(&log),
        ReplayConfig::default().checkpoint_interval_events(1000),
    );

    let first = engine.seek(SequenceNumber::new(2300)).unwrap();
    let second = engine.seek(SequenceNumber::new(2300)).unwrap();
    assert_eq!(first.state, second.state);
    assert!(second.checkpoint_hit);
    assert!(second.events_replayed <= 1000);
}

#[test]
fn monotonic_interval_property() {
    let log = doc_log(2500);
    let engine = engine_with(
        Arc::clone(&log),
        ReplayConfig::default().checkpoint_interval_events(1000),
    );

    // First seek creates the checkpoint at 2000 on its way through.
    engine.seek(SequenceNumber::new(2500)).unwrap();
    let result = engine.seek(SequenceNumber::new(2500)).unwrap();
    assert!(result.events_replayed <= 500);
}

#[test]
fn scenario_capacity_two_eviction() {
    let log = doc_log(3500);

    // Boundary states differ slightly in size, so measure each one and
    // size the budget to hold the last two but not all three.
    let size_at = |seq: u64| -> u64 {
        let state = reference_state(&log, seq);
        encode_state(&state).unwrap().len() as u64
    };
    let (s1, s2, s3) = (size_at(1000), size_at(2000), size_at(3000));
    let threshold = s2 + s3 + s1 / 2;

    let engine = engine_with(
        Arc::clone(&log),
        ReplayConfig::default()
            .checkpoint_interval_events(1000)
            .memory_threshold_bytes(threshold),
    );

    // Crosses boundaries 1000, 2000, 3000; the cache can hold two, so the
    // least-recently-used (the checkpoint at 1000) is evicted.
    engine.seek(SequenceNumber::new(3500)).unwrap();
    let stats = engine.cache().stats();
    assert_eq!(stats.resident, 2);
    assert!(stats.evictions >= 1);

    // A seek at the evicted boundary finds nothing at or before it.
    let result = engine.seek(SequenceNumber::new(1500)).unwrap();
    assert!(!result.checkpoint_hit);
    assert_eq!(result.events_replayed, 1500);
    assert_eq!(result.state, reference_state(&log, 1500));
}

#[test]
fn reducer_error_is_surfaced_not_retried() {
    let log = InMemoryEventLog::new();
    for _ in 0..5 {
        push(
            &log,
            &DocEvent::NodeAdded {
                id: 1,
                kind: "rect".to_string(),
            },
        );
    }
    log.append("doc", b"not json at all".to_vec(), 0).unwrap();
    let engine = engine_with(Arc::new(log), ReplayConfig::default());

    let result = engine.seek(SequenceNumber::new(6));
    assert!(matches!(
        result,
        Err(ReplayError::Reducer { sequence, .. }) if sequence.as_u64() == 6
    ));

    // Seeking short of the malformed event still works.
    let ok = engine.seek(SequenceNumber::new(5)).unwrap();
    assert_eq!(ok.state.revision, 5);
}

#[test]
fn bulk_replay_matches_interactive_seek() {
    let log = doc_log(4000);
    let engine = engine_with(Arc::clone(&log), ReplayConfig::default());

    let bulk = engine.replay_from_snapshot(SequenceNumber::new(4000)).unwrap();
    let interactive = engine.seek(SequenceNumber::new(4000)).unwrap();
    assert_eq!(bulk.state, interactive.state);

    let snap = engine.telemetry().snapshot();
    assert_eq!(snap.bulk_replays, 1);
    assert_eq!(snap.seeks, 1);
}

#[test]
fn metrics_accumulate_across_seeks() {
    let log = doc_log(2500);
    let engine = engine_with(
        Arc::clone(&log),
        ReplayConfig::default().checkpoint_interval_events(1000),
    );

    engine.seek(SequenceNumber::new(2500)).unwrap();
    engine.seek(SequenceNumber::new(2500)).unwrap();
    engine.seek(SequenceNumber::new(100)).unwrap();

    let snap = engine.telemetry().snapshot();
    assert_eq!(snap.seeks, 3);
    assert_eq!(snap.checkpoints_created, 2);
    assert_eq!(snap.hits + snap.misses, 3);
    assert!(snap.events_replayed >= 2500 + 500 + 100);
}

#[test]
fn playback_final_state_matches_reference() {
    let log = doc_log(200);
    let config = ReplayConfig::default()
        .tick_interval(Duration::from_millis(1))
        .events_per_tick(32);
    let engine = Arc::new(engine_with(Arc::clone(&log), config));
    let driver = PlaybackDriver::new(Arc::clone(&engine));
    let rx = driver.subscribe();

    driver.play(Speed::Normal, Direction::Forward);
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while driver.session().state != PlaybackState::Stopped {
        assert!(std::time::Instant::now() < deadline, "playback never finished");
        std::thread::sleep(Duration::from_millis(2));
    }

    let last = rx.try_iter().last().unwrap();
    assert_eq!(last.sequence_reached.as_u64(), 200);
    assert_eq!(last.state, reference_state(&log, 200));
}

#[test]
fn scrub_pattern_stays_accelerated() {
    // Simulates a user dragging the timeline back and forth.
    let log = doc_log(5000);
    let engine = engine_with(
        Arc::clone(&log),
        ReplayConfig::default().checkpoint_interval_events(500),
    );

    // Warm pass.
    engine.seek(SequenceNumber::new(5000)).unwrap();

    for target in [4200u64, 1700, 3300, 800, 4900, 2501] {
        let result = engine.seek(SequenceNumber::new(target)).unwrap();
        assert!(result.checkpoint_hit, "cold at {target}");
        assert!(result.events_replayed <= 500, "slow at {target}");
        assert_eq!(result.state, reference_state(&log, target));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn equivalence_at_arbitrary_targets(
        len in 1u64..400,
        targets in proptest::collection::vec(0u64..500, 1..8),
    ) {
        let log = doc_log(len);
        let engine = engine_with(
            Arc::clone(&log),
            ReplayConfig::default().checkpoint_interval_events(50),
        );

        for &target in &targets {
            let result = engine.seek(SequenceNumber::new(target)).unwrap();
            let clamped = target.min(len);
            prop_assert_eq!(result.sequence_reached.as_u64(), clamped);
            prop_assert_eq!(result.state, reference_state(&log, clamped));
        }
    }

    #[test]
    fn cache_stays_bounded_under_scrubbing(
        targets in proptest::collection::vec(0u64..2000, 1..12),
    ) {
        let log = doc_log(2000);
        let threshold = 400u64;
        let engine = engine_with(
            Arc::clone(&log),
            ReplayConfig::default()
                .checkpoint_interval_events(100)
                .memory_threshold_bytes(threshold),
        );

        for &target in &targets {
            engine.seek(SequenceNumber::new(target)).unwrap();
            prop_assert!(engine.cache().stats().resident_bytes <= threshold);
        }
    }
}
