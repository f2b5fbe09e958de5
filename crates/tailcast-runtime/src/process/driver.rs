//! Runs the captured child and wires its output into the engine.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use futures_util::future::join_all;
use tailcast_core::{LineSource, ProcessError, ProcessOutcome};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::command::CommandSpec;
use super::shutdown::{DEFAULT_SHUTDOWN_GRACE, shutdown_child};
use crate::engine::EngineHandle;
use crate::framer::spawn_framer;

/// How long framers may keep draining after the child exits.
///
/// A grandchild that inherited the pipes can hold them open forever; once
/// this elapses the framers are cancelled so the engine can close.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Spawns one command and reports its lifecycle to a broadcast engine.
#[derive(Debug, Clone)]
pub struct ProcessDriver {
    spec: CommandSpec,
    max_line_bytes: usize,
    shutdown_grace: Duration,
    drain_timeout: Duration,
}

impl ProcessDriver {
    pub fn new(spec: CommandSpec, max_line_bytes: usize) -> Self {
        Self {
            spec,
            max_line_bytes,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    #[must_use]
    pub const fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    pub const fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    /// Run the command to completion, streaming its output into `engine`.
    ///
    /// Exactly one exit signal reaches the engine, including on spawn
    /// failure and on cancellation. A spawn failure is also returned as
    /// [`ProcessError::SpawnFailed`]; everything after a successful spawn
    /// is reported through the returned outcome.
    pub async fn run(
        &self,
        engine: &EngineHandle,
        cancel: CancellationToken,
    ) -> Result<ProcessOutcome, ProcessError> {
        let _ = engine.ingest(LineSource::System, format!("Executing command: {}", self.spec));

        let mut cmd = self.spec.to_command();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(command = %self.spec, error = %e, "failed to start command");
                let detail = format!("failed to start command: {e}");
                let _ = engine.process_exited(ProcessOutcome::launch_failed(detail));
                return Err(ProcessError::SpawnFailed(e.to_string()));
            }
        };
        info!(command = %self.spec, pid = ?child.id(), "command started");

        let framer_cancel = cancel.child_token();
        let mut framers: Vec<JoinHandle<()>> = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            if let Ok(feed) = engine.attach_stream(LineSource::Stdout) {
                framers.push(spawn_framer(
                    stdout,
                    feed,
                    self.max_line_bytes,
                    framer_cancel.clone(),
                ));
            }
        }
        if let Some(stderr) = child.stderr.take() {
            if let Ok(feed) = engine.attach_stream(LineSource::Stderr) {
                framers.push(spawn_framer(
                    stderr,
                    feed,
                    self.max_line_bytes,
                    framer_cancel.clone(),
                ));
            }
        }

        let waited = tokio::select! {
            status = child.wait() => status,
            () = cancel.cancelled() => {
                info!(command = %self.spec, "cancellation requested, stopping command");
                shutdown_child(&mut child, self.shutdown_grace).await
            }
        };

        let outcome = match waited {
            Ok(status) => outcome_from_status(status),
            Err(e) => {
                warn!(error = %e, "failed to wait for command");
                ProcessOutcome::failed(None, format!("failed to wait for command: {e}"))
            }
        };
        debug!(?outcome, "command finished");
        let _ = engine.process_exited(outcome.clone());

        let drain = join_all(framers);
        tokio::pin!(drain);
        if timeout(self.drain_timeout, &mut drain).await.is_err() {
            warn!(
                timeout_ms = u64::try_from(self.drain_timeout.as_millis()).unwrap_or(u64::MAX),
                "output streams still open after exit, cancelling framers"
            );
            framer_cancel.cancel();
            drain.await;
        }

        Ok(outcome)
    }
}

fn outcome_from_status(status: ExitStatus) -> ProcessOutcome {
    if status.success() {
        ProcessOutcome::succeeded()
    } else {
        ProcessOutcome::failed(status.code(), status.to_string())
    }
}
