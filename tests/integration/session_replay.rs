//! Integration tests for session recording and replay
//!
//! Tests the path from a live recorder through the event log (and JSONL
//! tapes) into a replayer, plus failure handling of the history service.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::time::Instant;

use super::common::determinism::{session_timeline, TEST_EPOCH_MS};
use super::common::fakes::{FailingHistorySource, StaticHistorySource};
use stackdeck::eventlog::session_log_key;
use stackdeck::session::EntryType;
use stackdeck::{
    EventLogStore, HistoryEntry, MemoryEventLogStore, ReplayState, SessionRecorder,
    SessionReplayer, SessionTape,
};

fn memory_store() -> Arc<dyn EventLogStore> {
    Arc::new(MemoryEventLogStore::in_memory())
}

async fn record(store: &Arc<dyn EventLogStore>, session_id: &str, entries: Vec<HistoryEntry>) {
    let recorder = SessionRecorder::start(store.clone(), session_id);
    for entry in entries {
        recorder.record(entry);
    }
    recorder.finish().await;
}

/// Empty provided history and a failing service resolve to an error state.
#[tokio::test]
async fn test_failing_history_source_yields_error_state() {
    let replayer = SessionReplayer::new().with_history_source(Arc::new(FailingHistorySource));

    let state = replayer.load("s-missing", Some(Vec::new())).await;
    assert!(matches!(state, ReplayState::Error { .. }));
    assert!(replayer.events().is_empty());

    let state = replayer.load("s-missing", None).await;
    assert!(matches!(state, ReplayState::Error { ref message } if message.contains("connection refused")));
}

/// With the service down, a locally recorded session still replays.
#[tokio::test]
async fn test_local_recording_covers_history_outage() {
    let store = memory_store();
    record(&store, "s1", session_timeline(&[0, 200, 400])).await;

    let replayer = SessionReplayer::new()
        .with_history_source(Arc::new(FailingHistorySource))
        .with_store(store);

    assert_eq!(
        replayer.load("s1", None).await,
        ReplayState::Ready { events: 3 }
    );
    assert_eq!(replayer.events()[0].entry_type, EntryType::Command);
}

/// The service is preferred over the local log when it answers.
#[tokio::test]
async fn test_history_source_takes_precedence_over_local_log() {
    let store = memory_store();
    record(&store, "s1", session_timeline(&[0])).await;

    let remote = session_timeline(&[0, 10, 20, 30]);
    let replayer = SessionReplayer::new()
        .with_history_source(Arc::new(StaticHistorySource(remote.clone())))
        .with_store(store);

    replayer.load("s1", None).await;
    assert_eq!(replayer.events().as_slice(), remote.as_slice());
}

/// Recording then replaying twice produces the same sequence at the same times.
#[tokio::test(start_paused = true)]
async fn test_replay_is_deterministic() {
    let store = memory_store();
    record(&store, "s1", session_timeline(&[0, 300, 900, 1000])).await;

    let mut runs = Vec::new();
    for _ in 0..2 {
        let replayer = SessionReplayer::new().with_store(store.clone());
        replayer.load("s1", None).await;
        let mut cursor = replayer.subscribe();
        let started = Instant::now();
        let handle = replayer.play(1.0).unwrap();

        let mut seen = Vec::new();
        let mut last = 0;
        loop {
            let current = *cursor.borrow_and_update();
            if current.position > last {
                last = current.position;
                seen.push((last, started.elapsed().as_millis() / 100));
            }
            if !current.playing {
                break;
            }
            cursor.changed().await.unwrap();
        }
        handle.finished().await;
        runs.push(seen);
    }

    assert_eq!(runs[0], runs[1]);
    assert_eq!(runs[0].last().unwrap().0, 4);
    // Gaps are honoured on the virtual clock: the last event lands at ~1s
    assert_eq!(runs[0].last().unwrap().1, 10);
}

/// Double speed halves the wall time needed to reach the end.
#[tokio::test(start_paused = true)]
async fn test_speed_scales_playback_duration() {
    let replayer = SessionReplayer::new();
    replayer
        .load("s1", Some(session_timeline(&[0, 1000, 2000])))
        .await;

    let started = Instant::now();
    replayer.play(2.0).unwrap().finished().await;

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(1000));
    assert!(elapsed < Duration::from_millis(1100));
    assert_eq!(replayer.visible_events().len(), 3);
}

/// A session exported to a tape replays identically after import elsewhere.
#[tokio::test]
async fn test_tape_roundtrip_through_file_replays() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let tape_path = dir.path().join("s1.jsonl");

    let source = memory_store();
    record(&source, "s1", session_timeline(&[0, 50, 75])).await;
    SessionTape::export(source.as_ref(), "s1")
        .write_jsonl_to_path(&tape_path)
        .unwrap();

    let target = memory_store();
    let tape = SessionTape::read_jsonl_from_path(&tape_path).unwrap();
    assert_eq!(tape.import_into(target.as_ref(), "copy"), 3);
    // Importing the same tape again adds nothing
    assert_eq!(tape.import_into(target.as_ref(), "copy"), 0);

    let replayer = SessionReplayer::new().with_store(target.clone());
    replayer.load("copy", None).await;
    assert_eq!(replayer.events().len(), 3);
    assert_eq!(replayer.events()[2].timestamp, TEST_EPOCH_MS + 75);
    assert_eq!(
        target.read(&session_log_key("copy")),
        source.read(&session_log_key("s1"))
    );
}
