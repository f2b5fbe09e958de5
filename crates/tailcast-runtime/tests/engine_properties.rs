//! Behavioral tests for the broadcast engine: ordering, replay, eviction,
//! isolation, idempotent registration and lifecycle.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tailcast_core::{
    BroadcastSettings, DeliveryError, EngineState, LineSink, LineSource, ProcessOutcome,
    SubscriberId, TaggedLine,
};
use tailcast_runtime::{
    BroadcastEngine, ChannelSink, EngineHandle, StreamEnd, Subscription, spawn_framer,
};
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(5);

fn engine_with(capacity: usize) -> EngineHandle {
    let settings = BroadcastSettings {
        replay_capacity: capacity,
        subscriber_queue_depth: 4096,
        ..BroadcastSettings::default()
    };
    BroadcastEngine::spawn(&settings)
}

async fn drain(sub: &mut Subscription) -> Vec<Arc<TaggedLine>> {
    let mut lines = Vec::new();
    while let Some(line) = timeout(WAIT, sub.next_line()).await.expect("stream stalled") {
        lines.push(line);
    }
    lines
}

fn texts(lines: &[Arc<TaggedLine>]) -> Vec<&str> {
    lines.iter().map(|l| l.text.as_str()).collect()
}

fn sequences(lines: &[Arc<TaggedLine>]) -> Vec<u64> {
    lines.iter().map(|l| l.sequence).collect()
}

fn assert_gap_free(lines: &[Arc<TaggedLine>]) {
    for pair in lines.windows(2) {
        assert_eq!(
            pair[1].sequence,
            pair[0].sequence + 1,
            "gap or repeat between {} and {}",
            pair[0].sequence,
            pair[1].sequence
        );
    }
}

struct RecordingSink {
    id: SubscriberId,
    seen: Mutex<Vec<u64>>,
}

impl RecordingSink {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            id: SubscriberId::next(),
            seen: Mutex::new(Vec::new()),
        })
    }
}

impl LineSink for RecordingSink {
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn deliver(&self, line: &Arc<TaggedLine>) -> Result<(), DeliveryError> {
        self.seen.lock().unwrap().push(line.sequence);
        Ok(())
    }
}

struct DeadSink(SubscriberId);

impl LineSink for DeadSink {
    fn id(&self) -> SubscriberId {
        self.0
    }

    fn deliver(&self, _line: &Arc<TaggedLine>) -> Result<(), DeliveryError> {
        Err(DeliveryError::Transport("connection reset".to_string()))
    }
}

#[tokio::test]
async fn scenario_a_snapshot_keeps_most_recent() {
    let engine = engine_with(3);
    for text in ["a", "b", "c", "d"] {
        engine.ingest(LineSource::Stdout, text).unwrap();
    }

    let snapshot = engine.snapshot().await.unwrap();
    assert_eq!(texts(&snapshot), vec!["b", "c", "d"]);
    assert_eq!(sequences(&snapshot), vec![2, 3, 4]);
}

#[tokio::test]
async fn scenario_b_join_then_live_without_duplicates() {
    let engine = engine_with(2);
    engine.ingest(LineSource::Stdout, "x1").unwrap();

    let mut sub = engine.connect().await.unwrap();
    assert_eq!(sub.pending_replay(), 1);
    let first = sub.next_line().await.unwrap();
    assert_eq!((first.sequence, first.text.as_str()), (1, "x1"));

    engine.ingest(LineSource::Stdout, "x2").unwrap();
    let second = timeout(WAIT, sub.next_line()).await.unwrap().unwrap();
    assert_eq!((second.sequence, second.text.as_str()), (2, "x2"));

    // Nothing else is pending: x1 is never redelivered
    assert!(
        timeout(Duration::from_millis(100), sub.next_line())
            .await
            .is_err()
    );
}

#[tokio::test]
async fn scenario_c_streams_interleave_in_arrival_order() {
    let engine = engine_with(10);
    let mut first = engine.connect().await.unwrap();
    let mut second = engine.connect().await.unwrap();

    let out = engine.attach_stream(LineSource::Stdout).unwrap();
    let err = engine.attach_stream(LineSource::Stderr).unwrap();
    out.send(tailcast_core::FramedLine::new(LineSource::Stdout, "out-1"))
        .unwrap();
    err.send(tailcast_core::FramedLine::new(LineSource::Stderr, "err-1"))
        .unwrap();
    out.send(tailcast_core::FramedLine::new(LineSource::Stdout, "out-2"))
        .unwrap();

    for sub in [&mut first, &mut second] {
        let mut seen = Vec::new();
        for _ in 0..3 {
            let line = timeout(WAIT, sub.next_line()).await.unwrap().unwrap();
            seen.push((line.sequence, line.source, line.text.clone()));
        }
        assert_eq!(
            seen,
            vec![
                (1, LineSource::Stdout, "out-1".to_string()),
                (2, LineSource::Stderr, "err-1".to_string()),
                (3, LineSource::Stdout, "out-2".to_string()),
            ]
        );
    }
}

#[tokio::test]
async fn scenario_d_exit_waits_for_partial_line() {
    let engine = engine_with(16);
    let mut sub = engine.connect().await.unwrap();

    let (reader, mut writer) = tokio::io::duplex(64);
    let feed = engine.attach_stream(LineSource::Stdout).unwrap();
    let framer = spawn_framer(reader, feed, 1024, CancellationToken::new());

    writer.write_all(b"complete\npartial").await.unwrap();
    let complete = timeout(WAIT, sub.next_line()).await.unwrap().unwrap();
    assert_eq!(complete.text, "complete");

    engine.process_exited(ProcessOutcome::succeeded()).unwrap();
    let status = engine.status().await.unwrap();
    assert_eq!(status.state, EngineState::Draining);
    assert_eq!(status.open_streams, 1);
    assert_ne!(engine.state(), EngineState::Closed);

    // Closing the pipe flushes the partial line, then the stream finishes
    drop(writer);
    timeout(WAIT, engine.wait_closed()).await.unwrap().unwrap();
    framer.await.unwrap();

    let rest = drain(&mut sub).await;
    assert_eq!(texts(&rest), vec!["partial", "Command completed successfully"]);
    assert_eq!(sequences(&rest), vec![2, 3]);
    assert!(rest[1].is_system());
    assert_eq!(sub.end_reason(), StreamEnd::Completed);
}

#[tokio::test]
async fn eviction_keeps_exactly_capacity_lines() {
    let capacity = 5;
    for extra in [0_u64, 1, 7] {
        let engine = engine_with(capacity);
        let total = capacity as u64 + extra;
        for i in 1..=total {
            engine.ingest(LineSource::Stdout, format!("line {i}")).unwrap();
        }
        let snapshot = engine.snapshot().await.unwrap();
        let expected: Vec<u64> = (extra + 1..=total).collect();
        assert_eq!(sequences(&snapshot), expected);
    }
}

#[tokio::test]
async fn replay_then_live_is_gap_free() {
    let engine = engine_with(100);
    for i in 1..=40 {
        engine.ingest(LineSource::Stdout, format!("before {i}")).unwrap();
    }

    let mut sub = engine.connect().await.unwrap();
    assert_eq!(sub.pending_replay(), 40);

    for i in 1..=10 {
        engine.ingest(LineSource::Stderr, format!("after {i}")).unwrap();
    }
    engine.process_exited(ProcessOutcome::succeeded()).unwrap();

    let lines = drain(&mut sub).await;
    assert_eq!(lines.len(), 51);
    assert_eq!(lines[0].sequence, 1);
    assert_eq!(lines[39].text, "before 40");
    assert_eq!(lines[40].text, "after 1");
    assert_gap_free(&lines);
}

#[tokio::test]
async fn concurrent_streams_and_joins_preserve_order() {
    let engine = engine_with(64);
    let mut early = engine.connect().await.unwrap();

    let mut producers = Vec::new();
    for source in [LineSource::Stdout, LineSource::Stderr] {
        let feed = engine.attach_stream(source).unwrap();
        producers.push(tokio::spawn(async move {
            for i in 0..500 {
                feed.send(tailcast_core::FramedLine::new(source, format!("{source} {i}")))
                    .unwrap();
                if i % 50 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        }));
    }

    // Join while both producers are running
    tokio::task::yield_now().await;
    let mut late = engine.connect().await.unwrap();

    for producer in producers {
        producer.await.unwrap();
    }
    engine.process_exited(ProcessOutcome::succeeded()).unwrap();

    let early_lines = drain(&mut early).await;
    assert_eq!(early_lines.len(), 1001);
    assert_eq!(early_lines[0].sequence, 1);
    assert_gap_free(&early_lines);

    let late_lines = drain(&mut late).await;
    assert_gap_free(&late_lines);
    assert_eq!(late_lines.last().unwrap().sequence, 1001);

    // Per-stream order survives interleaving
    for source in [LineSource::Stdout, LineSource::Stderr] {
        let own: Vec<String> = early_lines
            .iter()
            .filter(|l| l.source == source)
            .map(|l| l.text.clone())
            .collect();
        let expected: Vec<String> = (0..500).map(|i| format!("{source} {i}")).collect();
        assert_eq!(own, expected);
    }
}

#[tokio::test]
async fn failing_subscriber_does_not_affect_others() {
    let engine = engine_with(10);
    let dead_id = SubscriberId::next();
    engine.register(Arc::new(DeadSink(dead_id))).await.unwrap();

    // A viewer that never reads and has room for a single line
    let (lagging, mut lagging_rx) = ChannelSink::channel(1);
    engine.register(Arc::new(lagging)).await.unwrap();

    let mut healthy = engine.connect().await.unwrap();
    assert_eq!(engine.status().await.unwrap().subscribers, 3);

    for i in 1..=5 {
        engine.ingest(LineSource::Stdout, format!("l{i}")).unwrap();
    }

    for i in 1..=5 {
        let line = timeout(Duration::from_millis(500), healthy.next_line())
            .await
            .expect("healthy viewer delayed")
            .unwrap();
        assert_eq!(line.sequence, i);
    }

    let status = engine.status().await.unwrap();
    assert_eq!(status.subscribers, 1);

    // The lagging viewer got what fit in its queue, then its stream ended
    assert_eq!(lagging_rx.recv().await.unwrap().sequence, 1);
    assert!(lagging_rx.recv().await.is_none());
}

#[tokio::test]
async fn dropped_viewer_ends_with_dropped_reason() {
    let settings = BroadcastSettings {
        replay_capacity: 10,
        subscriber_queue_depth: 2,
        ..BroadcastSettings::default()
    };
    let engine = BroadcastEngine::spawn(&settings);
    let mut slow = engine.connect().await.unwrap();

    for i in 1..=5 {
        engine.ingest(LineSource::Stdout, format!("l{i}")).unwrap();
    }
    engine.status().await.unwrap();

    let lines = drain(&mut slow).await;
    assert_eq!(sequences(&lines), vec![1, 2]);
    assert_eq!(slow.end_reason(), StreamEnd::Dropped);
}

#[tokio::test]
async fn lagged_viewer_draining_after_close_is_not_completed() {
    let settings = BroadcastSettings {
        replay_capacity: 10,
        subscriber_queue_depth: 1,
        ..BroadcastSettings::default()
    };
    let engine = BroadcastEngine::spawn(&settings);
    let mut slow = engine.connect().await.unwrap();

    for i in 1..=4 {
        engine.ingest(LineSource::Stdout, format!("l{i}")).unwrap();
    }
    engine.process_exited(ProcessOutcome::succeeded()).unwrap();
    timeout(WAIT, engine.wait_closed()).await.unwrap().unwrap();
    assert_eq!(engine.final_sequence(), Some(5));

    // The queue still holds line 1, queued before the viewer was pruned
    let lines = drain(&mut slow).await;
    assert_eq!(sequences(&lines), vec![1]);
    assert_eq!(slow.end_reason(), StreamEnd::Dropped);
}

#[tokio::test]
async fn live_viewer_reaching_final_line_is_completed() {
    let engine = engine_with(10);
    let mut viewer = engine.connect().await.unwrap();
    assert_eq!(engine.final_sequence(), None);

    engine.ingest(LineSource::Stdout, "work").unwrap();
    engine.process_exited(ProcessOutcome::succeeded()).unwrap();

    let lines = drain(&mut viewer).await;
    assert_eq!(texts(&lines), vec!["work", "Command completed successfully"]);
    assert_eq!(engine.final_sequence(), Some(2));
    assert_eq!(viewer.end_reason(), StreamEnd::Completed);
}

#[tokio::test]
async fn registering_twice_delivers_once() {
    let engine = engine_with(10);
    let sink = RecordingSink::new();

    let first = engine.register(sink.clone()).await.unwrap();
    let second = engine.register(sink.clone()).await.unwrap();
    assert!(first.registered);
    assert!(!second.registered);

    engine.ingest(LineSource::Stdout, "once").unwrap();
    engine.status().await.unwrap();
    assert_eq!(*sink.seen.lock().unwrap(), vec![1]);

    // Unregistering an absent subscriber is a no-op
    engine.unregister(SubscriberId::next()).unwrap();
    engine.unregister(sink.id()).unwrap();
    engine.unregister(sink.id()).unwrap();
    assert_eq!(engine.status().await.unwrap().subscribers, 0);
}

#[tokio::test]
async fn dropping_subscription_unregisters() {
    let engine = engine_with(10);
    let sub = engine.connect().await.unwrap();
    assert_eq!(engine.status().await.unwrap().subscribers, 1);
    drop(sub);
    assert_eq!(engine.status().await.unwrap().subscribers, 0);
}

#[tokio::test]
async fn lifecycle_idle_streaming_draining_closed() {
    let engine = engine_with(10);
    assert_eq!(engine.status().await.unwrap().state, EngineState::Idle);

    let feed = engine.attach_stream(LineSource::Stdout).unwrap();
    feed.send(tailcast_core::FramedLine::new(LineSource::Stdout, "hi"))
        .unwrap();
    assert_eq!(engine.status().await.unwrap().state, EngineState::Streaming);

    engine
        .process_exited(ProcessOutcome::failed(Some(3), "exit status: 3"))
        .unwrap();
    assert_eq!(engine.status().await.unwrap().state, EngineState::Draining);

    feed.finish();
    timeout(WAIT, engine.wait_closed()).await.unwrap().unwrap();

    let snapshot = engine.snapshot().await.unwrap();
    let last = snapshot.last().unwrap();
    assert!(last.is_system());
    assert_eq!(last.text, "Command exited with error: exit status: 3");

    // Closed engines drop further input and refuse new streams
    engine.ingest(LineSource::Stdout, "late").unwrap();
    assert!(engine.attach_stream(LineSource::Stderr).is_err());
    let status = engine.status().await.unwrap();
    assert_eq!(status.last_sequence, 2);
    assert_eq!(status.state, EngineState::Closed);
}

#[tokio::test]
async fn exit_without_streams_closes_immediately() {
    let engine = engine_with(10);
    engine
        .process_exited(ProcessOutcome::launch_failed("failed to start command: not found"))
        .unwrap();
    timeout(WAIT, engine.wait_closed()).await.unwrap().unwrap();

    let snapshot = engine.snapshot().await.unwrap();
    assert_eq!(
        texts(&snapshot),
        vec!["Command exited with error: failed to start command: not found"]
    );
}

#[tokio::test]
async fn duplicate_exit_signal_is_ignored() {
    let engine = engine_with(10);
    engine.process_exited(ProcessOutcome::succeeded()).unwrap();
    engine
        .process_exited(ProcessOutcome::failed(Some(1), "exit status: 1"))
        .unwrap();
    timeout(WAIT, engine.wait_closed()).await.unwrap().unwrap();

    let snapshot = engine.snapshot().await.unwrap();
    assert_eq!(texts(&snapshot), vec!["Command completed successfully"]);
}

#[tokio::test]
async fn late_joiner_after_close_gets_history_only() {
    let engine = engine_with(10);
    engine.ingest(LineSource::Stdout, "only").unwrap();
    engine.process_exited(ProcessOutcome::succeeded()).unwrap();
    timeout(WAIT, engine.wait_closed()).await.unwrap().unwrap();

    let mut sub = engine.connect().await.unwrap();
    assert_eq!(sub.joined_state(), EngineState::Closed);
    let lines = drain(&mut sub).await;
    assert_eq!(texts(&lines), vec!["only", "Command completed successfully"]);
    assert_eq!(sub.end_reason(), StreamEnd::Completed);
    assert_eq!(engine.status().await.unwrap().subscribers, 0);
}

#[tokio::test]
async fn zero_capacity_is_live_only() {
    let engine = engine_with(0);
    engine.ingest(LineSource::Stdout, "missed").unwrap();

    let mut sub = engine.connect().await.unwrap();
    assert_eq!(sub.pending_replay(), 0);

    engine.ingest(LineSource::Stdout, "seen").unwrap();
    let line = timeout(WAIT, sub.next_line()).await.unwrap().unwrap();
    assert_eq!((line.sequence, line.text.as_str()), (2, "seen"));
    assert!(engine.snapshot().await.unwrap().is_empty());
}
