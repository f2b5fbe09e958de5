//! End-to-end tests running real child processes through the driver.

#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;

use tailcast_core::{BroadcastSettings, EngineState, LineSource, ProcessError, TaggedLine};
use tailcast_runtime::{BroadcastEngine, CommandSpec, EngineHandle, ProcessDriver};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(10);

fn engine() -> EngineHandle {
    BroadcastEngine::spawn(&BroadcastSettings::default())
}

fn driver(command_line: &str) -> ProcessDriver {
    let spec = CommandSpec::parse(command_line).unwrap();
    ProcessDriver::new(spec, 1024)
        .with_shutdown_grace(Duration::from_millis(500))
        .with_drain_timeout(Duration::from_secs(1))
}

fn lines_from(snapshot: &[Arc<TaggedLine>], source: LineSource) -> Vec<&str> {
    snapshot
        .iter()
        .filter(|l| l.source == source)
        .map(|l| l.text.as_str())
        .collect()
}

#[tokio::test]
async fn captures_both_streams_and_reports_success() {
    let engine = engine();
    let driver = driver(r#"sh -c 'echo one; echo two >&2; printf three'"#);

    let outcome = timeout(WAIT, driver.run(&engine, CancellationToken::new()))
        .await
        .unwrap()
        .unwrap();
    assert!(outcome.success);
    timeout(WAIT, engine.wait_closed()).await.unwrap().unwrap();

    let snapshot = engine.snapshot().await.unwrap();
    assert_eq!(lines_from(&snapshot, LineSource::Stdout), vec!["one", "three"]);
    assert_eq!(lines_from(&snapshot, LineSource::Stderr), vec!["two"]);

    let first = snapshot.first().unwrap();
    assert_eq!(first.sequence, 1);
    assert!(first.text.starts_with("Executing command: sh -c"));

    let last = snapshot.last().unwrap();
    assert_eq!(last.source, LineSource::System);
    assert_eq!(last.text, "Command completed successfully");
}

#[tokio::test]
async fn nonzero_exit_is_reported_after_output() {
    let engine = engine();
    let mut sub = engine.connect().await.unwrap();
    let driver = driver(r#"sh -c 'echo failing; exit 3'"#);

    let outcome = timeout(WAIT, driver.run(&engine, CancellationToken::new()))
        .await
        .unwrap()
        .unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.exit_code, Some(3));

    let mut seen = Vec::new();
    while let Some(line) = timeout(WAIT, sub.next_line()).await.unwrap() {
        seen.push(line.text.clone());
    }
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[1], "failing");
    assert!(seen[2].starts_with("Command exited with error: "));
    assert!(seen[2].contains('3'));
}

#[tokio::test]
async fn spawn_failure_closes_engine_with_error_line() {
    let engine = engine();
    let driver = driver("/definitely/not/a/real/binary --flag");

    let result = driver.run(&engine, CancellationToken::new()).await;
    assert!(matches!(result, Err(ProcessError::SpawnFailed(_))));

    timeout(WAIT, engine.wait_closed()).await.unwrap().unwrap();
    let snapshot = engine.snapshot().await.unwrap();
    assert_eq!(snapshot.len(), 2);
    assert!(snapshot[0].text.starts_with("Executing command: "));
    assert!(
        snapshot[1]
            .text
            .starts_with("Command exited with error: failed to start command:")
    );
}

#[tokio::test]
async fn cancellation_stops_long_running_child() {
    let engine = engine();
    let mut sub = engine.connect().await.unwrap();
    let driver = driver(r#"sh -c 'echo started; sleep 30'"#);
    let cancel = CancellationToken::new();

    let run = {
        let engine = engine.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { driver.run(&engine, cancel).await })
    };

    // Executing line, then the child's first output
    let _ = timeout(WAIT, sub.next_line()).await.unwrap().unwrap();
    let started = timeout(WAIT, sub.next_line()).await.unwrap().unwrap();
    assert_eq!(started.text, "started");
    assert_eq!(engine.state(), EngineState::Streaming);

    cancel.cancel();
    let outcome = timeout(WAIT, run).await.unwrap().unwrap().unwrap();
    assert!(!outcome.success);

    timeout(WAIT, engine.wait_closed()).await.unwrap().unwrap();
}

#[tokio::test]
async fn grandchild_holding_pipes_does_not_block_close() {
    let engine = engine();
    let spec = CommandSpec::parse(r#"sh -c 'sleep 30 & echo parent done'"#).unwrap();
    let driver = ProcessDriver::new(spec, 1024).with_drain_timeout(Duration::from_millis(300));

    let outcome = timeout(WAIT, driver.run(&engine, CancellationToken::new()))
        .await
        .unwrap()
        .unwrap();
    assert!(outcome.success);

    timeout(WAIT, engine.wait_closed()).await.unwrap().unwrap();
    let snapshot = engine.snapshot().await.unwrap();
    assert_eq!(lines_from(&snapshot, LineSource::Stdout), vec!["parent done"]);
}
