//! Consumer state machine tests against scripted in-memory connections.

use std::time::Duration;

use event_stream::{
    apply_update, drive_timeline, EntityKind, EventStreamConsumer, MemoryChunk, MemoryConnection,
    MemoryEventSource, StreamConfig, StreamState, StreamUpdate,
};
use pod_events::EventTimeline;
use tokio::sync::mpsc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn fast_config() -> StreamConfig {
    StreamConfig {
        max_retries: 3,
        initial_backoff_ms: 1,
        max_backoff_ms: 5,
        flush_interval_ms: 5,
        flush_max_events: 200,
        connect_timeout_secs: 1,
        stable_connection_secs: 30,
    }
}

fn line(reason: &str, second: u32, pod: &str) -> String {
    format!(
        "{{\"reason\":\"{reason}\",\"type\":\"Normal\",\"timestamp\":\"2024-05-01T10:00:{second:02}Z\",\"involved_object\":{{\"name\":\"{pod}\"}}}}\n"
    )
}

fn three_lines() -> String {
    [
        line("Scheduled", 0, "train"),
        line("Pulled", 1, "train"),
        line("Started", 2, "train"),
    ]
    .concat()
}

/// Run a consumer to completion and return (final state, every update).
async fn run_to_end(
    source: MemoryEventSource,
    kind: EntityKind,
    config: StreamConfig,
) -> (StreamState, Vec<StreamUpdate>, usize) {
    init_tracing();
    let consumer = EventStreamConsumer::new(source, kind, config);
    let (tx, mut rx) = mpsc::channel(1024);
    let state = consumer.run(tx).await;

    let mut updates = Vec::new();
    while let Ok(update) = rx.try_recv() {
        updates.push(update);
    }
    (state, updates, consumer.source().open_count())
}

fn states(updates: &[StreamUpdate]) -> Vec<StreamState> {
    updates
        .iter()
        .filter_map(|u| match u {
            StreamUpdate::State(s) => Some(s.clone()),
            StreamUpdate::Batch(_) => None,
        })
        .collect()
}

fn batch_sizes(updates: &[StreamUpdate]) -> Vec<usize> {
    updates
        .iter()
        .filter_map(|u| match u {
            StreamUpdate::Batch(events) => Some(events.len()),
            StreamUpdate::State(_) => None,
        })
        .collect()
}

#[tokio::test]
async fn test_terminal_blob_closes_on_eof() {
    let source = MemoryEventSource::from_body(three_lines());
    let (state, updates, opens) = run_to_end(source, EntityKind::Terminal, fast_config()).await;

    assert_eq!(state, StreamState::Closed);
    assert_eq!(
        states(&updates),
        vec![
            StreamState::Connecting,
            StreamState::Streaming,
            StreamState::Closed
        ]
    );
    assert_eq!(batch_sizes(&updates), vec![3]);
    assert_eq!(opens, 1);
}

#[tokio::test]
async fn test_live_stream_without_marker_reconnects() {
    let source = MemoryEventSource::new([
        MemoryConnection::Body(vec![MemoryChunk::text(three_lines())]),
        MemoryConnection::Body(vec![MemoryChunk::text(format!(
            "{}{}[DONE]\n",
            three_lines(),
            line("Completed", 9, "train")
        ))]),
    ]);
    let (state, updates, opens) = run_to_end(source, EntityKind::Live, fast_config()).await;

    assert_eq!(state, StreamState::Closed);
    assert_eq!(
        states(&updates),
        vec![
            StreamState::Connecting,
            StreamState::Streaming,
            StreamState::Reconnecting { attempt: 1 },
            StreamState::Connecting,
            StreamState::Streaming,
            StreamState::Closed,
        ]
    );
    assert_eq!(opens, 2);

    // The replayed prefix is dropped by the timeline
    let mut timeline = EventTimeline::new();
    for update in updates {
        apply_update(&mut timeline, update);
    }
    assert_eq!(timeline.events().len(), 4);
    assert_eq!(timeline.groups().len(), 1);
}

#[tokio::test]
async fn test_live_stream_with_marker_closes() {
    let source = MemoryEventSource::from_body(format!("{}[DONE]\n", three_lines()));
    let (state, updates, opens) = run_to_end(source, EntityKind::Live, fast_config()).await;

    assert_eq!(state, StreamState::Closed);
    assert!(!states(&updates)
        .iter()
        .any(|s| matches!(s, StreamState::Reconnecting { .. })));
    assert_eq!(opens, 1);
}

#[tokio::test]
async fn test_marker_closes_connection_held_open() {
    let source = MemoryEventSource::new([MemoryConnection::Body(vec![
        MemoryChunk::text(format!("{}[DONE]\n", line("Completed", 9, "train"))),
        MemoryChunk::Hang,
    ])]);
    let (state, updates, opens) = tokio::time::timeout(
        Duration::from_secs(5),
        run_to_end(source, EntityKind::Live, fast_config()),
    )
    .await
    .expect("consumer kept streaming after the end marker");

    assert_eq!(state, StreamState::Closed);
    assert_eq!(batch_sizes(&updates), vec![1]);
    assert_eq!(opens, 1);
}

#[tokio::test]
async fn test_stable_connection_resets_retry_budget() {
    let config = StreamConfig {
        max_retries: 1,
        stable_connection_secs: 0,
        ..fast_config()
    };
    let source = MemoryEventSource::new([
        MemoryConnection::Body(vec![MemoryChunk::text(line("Scheduled", 0, "train"))]),
        MemoryConnection::Body(vec![MemoryChunk::text(line("Pulled", 1, "train"))]),
        MemoryConnection::Body(vec![MemoryChunk::text(line("Started", 2, "train"))]),
        MemoryConnection::Body(vec![MemoryChunk::text(format!(
            "{}[DONE]\n",
            line("Completed", 9, "train")
        ))]),
    ]);
    let (state, updates, opens) = run_to_end(source, EntityKind::Live, config).await;

    assert_eq!(state, StreamState::Closed);
    let reconnects: Vec<StreamState> = states(&updates)
        .into_iter()
        .filter(|s| matches!(s, StreamState::Reconnecting { .. }))
        .collect();
    assert_eq!(reconnects, vec![StreamState::Reconnecting { attempt: 1 }; 3]);
    assert_eq!(opens, 4);
}

#[tokio::test]
async fn test_reconnect_replays_keep_repeated_events() {
    let backoff = format!(
        "{{\"reason\":\"BackOff\",\"type\":\"Warning\",\"timestamp\":\"2024-05-01T10:00:04Z\",\"involved_object\":{{\"name\":\"train\"}}}}\n"
    );
    let first = format!("{}{backoff}{backoff}", line("Started", 2, "train"));
    let source = MemoryEventSource::new([
        MemoryConnection::Body(vec![MemoryChunk::text(first.clone())]),
        MemoryConnection::Body(vec![MemoryChunk::text(format!("{first}{backoff}[DONE]\n"))]),
    ]);
    let (state, updates, _) = run_to_end(source, EntityKind::Live, fast_config()).await;
    assert_eq!(state, StreamState::Closed);

    let mut timeline = EventTimeline::new();
    for update in updates {
        apply_update(&mut timeline, update);
    }
    let backoffs = timeline
        .events()
        .iter()
        .filter(|e| e.reason == "BackOff")
        .count();
    assert_eq!(backoffs, 3);
}

#[tokio::test]
async fn test_reconnects_are_bounded() {
    let config = StreamConfig {
        max_retries: 2,
        ..fast_config()
    };
    // One connection, after which every open fails
    let source = MemoryEventSource::from_body(three_lines());
    let (state, updates, opens) = run_to_end(source, EntityKind::Live, config).await;

    let StreamState::Error { message } = &state else {
        panic!("expected error, got {state:?}");
    };
    assert!(message.contains("2 reconnect attempts"), "{message}");
    assert_eq!(
        states(&updates),
        vec![
            StreamState::Connecting,
            StreamState::Streaming,
            StreamState::Reconnecting { attempt: 1 },
            StreamState::Connecting,
            StreamState::Reconnecting { attempt: 2 },
            StreamState::Connecting,
            state.clone(),
        ]
    );
    assert_eq!(opens, 3);
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let source = MemoryEventSource::new([MemoryConnection::Refused(404)]);
    let (state, updates, opens) = run_to_end(source, EntityKind::Live, fast_config()).await;

    assert!(matches!(state, StreamState::Error { .. }));
    assert_eq!(states(&updates).len(), 2);
    assert_eq!(opens, 1);
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let source = MemoryEventSource::new([
        MemoryConnection::Refused(503),
        MemoryConnection::Body(vec![MemoryChunk::text(three_lines())]),
    ]);
    let (state, _, opens) = run_to_end(source, EntityKind::Terminal, fast_config()).await;

    assert_eq!(state, StreamState::Closed);
    assert_eq!(opens, 2);
}

#[tokio::test]
async fn test_mid_read_failure_keeps_delivered_events() {
    let source = MemoryEventSource::new([
        MemoryConnection::Body(vec![
            MemoryChunk::text(line("Scheduled", 0, "eval")),
            MemoryChunk::Fail("connection reset by peer".to_string()),
        ]),
        MemoryConnection::Body(vec![MemoryChunk::text(format!(
            "{}{}",
            line("Scheduled", 0, "eval"),
            line("Started", 3, "eval")
        ))]),
    ]);
    let (state, updates, _) = run_to_end(source, EntityKind::Terminal, fast_config()).await;

    assert_eq!(state, StreamState::Closed);
    assert_eq!(batch_sizes(&updates), vec![1, 2]);
}

#[tokio::test]
async fn test_burst_is_coalesced_into_one_batch() {
    let chunks = (0..10)
        .map(|i| MemoryChunk::text(line("Pulled", i, "train")))
        .collect();
    let source = MemoryEventSource::new([MemoryConnection::Body(chunks)]);
    let config = StreamConfig {
        flush_interval_ms: 1_000,
        ..fast_config()
    };
    let (_, updates, _) = run_to_end(source, EntityKind::Terminal, config).await;

    assert_eq!(batch_sizes(&updates), vec![10]);
}

#[tokio::test]
async fn test_batch_size_threshold_flushes() {
    let chunks = (0..10)
        .map(|i| MemoryChunk::text(line("Pulled", i, "train")))
        .collect();
    let source = MemoryEventSource::new([MemoryConnection::Body(chunks)]);
    let config = StreamConfig {
        flush_interval_ms: 1_000,
        flush_max_events: 4,
        ..fast_config()
    };
    let (_, updates, _) = run_to_end(source, EntityKind::Terminal, config).await;

    assert_eq!(batch_sizes(&updates), vec![4, 4, 2]);
}

#[tokio::test]
async fn test_flush_interval_flushes_quiet_stream() {
    let source = MemoryEventSource::new([MemoryConnection::Body(vec![
        MemoryChunk::text(line("Scheduled", 0, "train")),
        MemoryChunk::Delay(Duration::from_millis(100)),
        MemoryChunk::text(line("Started", 1, "train")),
    ])]);
    let (_, updates, _) = run_to_end(source, EntityKind::Terminal, fast_config()).await;

    assert_eq!(batch_sizes(&updates), vec![1, 1]);
}

#[tokio::test]
async fn test_cancel_aborts_in_flight_read() {
    init_tracing();
    let source = MemoryEventSource::new([MemoryConnection::Body(vec![
        MemoryChunk::text(three_lines()),
        MemoryChunk::Hang,
    ])]);
    let consumer = EventStreamConsumer::new(source, EntityKind::Live, fast_config());
    let cancel = consumer.cancellation_token();
    let (tx, mut rx) = mpsc::channel(64);
    let handle = consumer.spawn(tx);

    // Wait for the first batch, then leave the view
    loop {
        match rx.recv().await {
            Some(StreamUpdate::Batch(events)) => {
                assert_eq!(events.len(), 3);
                break;
            }
            Some(StreamUpdate::State(_)) => {}
            None => panic!("consumer ended before delivering events"),
        }
    }
    cancel.cancel();

    let state = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("consumer did not stop after cancel")
        .unwrap();
    assert_eq!(state, StreamState::Closed);
    assert_eq!(rx.recv().await, Some(StreamUpdate::State(StreamState::Closed)));
}

#[tokio::test]
async fn test_cancel_while_view_stops_draining() {
    init_tracing();
    let source = MemoryEventSource::from_body(three_lines());
    let consumer = EventStreamConsumer::new(source, EntityKind::Terminal, fast_config());
    let cancel = consumer.cancellation_token();
    // Room for `Connecting` only; the next send blocks
    let (tx, mut rx) = mpsc::channel(1);
    let handle = consumer.spawn(tx);

    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let state = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("consumer blocked on a full channel after cancel")
        .unwrap();
    assert_eq!(state, StreamState::Closed);
    assert_eq!(
        rx.recv().await,
        Some(StreamUpdate::State(StreamState::Connecting))
    );
}

#[tokio::test]
async fn test_drive_timeline_applies_batches() {
    init_tracing();
    let source = MemoryEventSource::from_body(format!(
        "{}{}",
        three_lines(),
        line("Scheduled", 5, "eval-retry-1")
    ));
    let consumer = EventStreamConsumer::new(source, EntityKind::Terminal, fast_config());
    let (tx, mut rx) = mpsc::channel(8);
    let handle = consumer.spawn(tx);

    let mut timeline = EventTimeline::new();
    let state = drive_timeline(&mut rx, &mut timeline).await;

    assert_eq!(state, StreamState::Closed);
    assert_eq!(handle.await.unwrap(), StreamState::Closed);
    let keys: Vec<String> = timeline.groups().iter().map(|g| g.key.to_string()).collect();
    assert_eq!(keys, vec!["train#0", "eval#1"]);
}
