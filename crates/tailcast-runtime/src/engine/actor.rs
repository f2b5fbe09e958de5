//! The engine task: sole owner of the replay buffer and the registry.
//!
//! Every ingestion, join, and removal is a [`Command`] processed one at a
//! time, which makes "append + fan-out" and "snapshot + register" atomic
//! with respect to each other without any locks.

use std::sync::Arc;

use serde::Serialize;
use tailcast_core::{
    EngineState, FramedLine, LineSink, LineSource, ProcessOutcome, SubscriberId, TaggedLine,
};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::registry::SubscriberRegistry;
use crate::replay::ReplayBuffer;

// ── Commands ───────────────────────────────────────────────────────

/// A request sent from a handle to the engine task.
pub(crate) enum Command {
    /// Sequence, retain and fan out one line.
    Ingest { line: FramedLine },

    /// A framer is about to start feeding this stream.
    AttachStream { source: LineSource },

    /// A framer has sent its last line.
    StreamFinished { source: LineSource },

    /// The child process ended. Accepted once.
    ProcessExited { outcome: ProcessOutcome },

    /// Race-free join: snapshot and register in one step.
    Register {
        sink: Arc<dyn LineSink>,
        reply: oneshot::Sender<JoinSnapshot>,
    },

    /// Remove a subscriber (idempotent).
    Unregister { id: SubscriberId },

    /// Point-in-time copy of the replay buffer.
    Snapshot {
        reply: oneshot::Sender<Vec<Arc<TaggedLine>>>,
    },

    /// Engine counters for status endpoints.
    Status { reply: oneshot::Sender<EngineStatus> },
}

/// What a joining subscriber receives.
#[derive(Debug, Clone)]
pub struct JoinSnapshot {
    /// Replay history at the moment of joining.
    pub lines: Vec<Arc<TaggedLine>>,
    /// Engine state at the moment of joining.
    pub state: EngineState,
    /// False if the sink was already registered or the engine is closed.
    pub registered: bool,
}

/// What the engine publishes on its watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Lifecycle {
    pub(crate) state: EngineState,
    /// Sequence of the closing summary line, set once the engine is closed.
    pub(crate) final_sequence: Option<u64>,
}

impl Lifecycle {
    pub(crate) const fn idle() -> Self {
        Self {
            state: EngineState::Idle,
            final_sequence: None,
        }
    }
}

/// Engine counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    pub state: EngineState,
    pub last_sequence: u64,
    pub buffered_lines: usize,
    pub subscribers: usize,
    pub open_streams: usize,
}

// ── Actor ──────────────────────────────────────────────────────────

pub(crate) struct EngineActor {
    replay: ReplayBuffer,
    registry: SubscriberRegistry,
    state: EngineState,
    next_sequence: u64,
    open_streams: usize,
    exit: Option<ProcessOutcome>,
    lifecycle_tx: watch::Sender<Lifecycle>,
}

impl EngineActor {
    pub(crate) fn new(replay_capacity: usize, lifecycle_tx: watch::Sender<Lifecycle>) -> Self {
        Self {
            replay: ReplayBuffer::new(replay_capacity),
            registry: SubscriberRegistry::new(),
            state: EngineState::Idle,
            next_sequence: 1,
            open_streams: 0,
            exit: None,
            lifecycle_tx,
        }
    }

    /// Process commands until every handle is gone.
    pub(crate) async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        debug!(capacity = self.replay.capacity(), "broadcast engine started");
        while let Some(command) = commands.recv().await {
            self.handle(command);
        }
        debug!(state = ?self.state, "broadcast engine task exiting");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Ingest { line } => self.ingest(line),
            Command::AttachStream { source } => self.attach_stream(source),
            Command::StreamFinished { source } => self.stream_finished(source),
            Command::ProcessExited { outcome } => self.process_exited(outcome),
            Command::Register { sink, reply } => {
                let join = self.register(sink);
                let _ = reply.send(join);
            }
            Command::Unregister { id } => {
                if self.registry.unregister(id) {
                    debug!(subscriber = %id, remaining = self.registry.len(), "subscriber detached");
                }
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.replay.snapshot());
            }
            Command::Status { reply } => {
                let _ = reply.send(self.status());
            }
        }
    }

    fn ingest(&mut self, line: FramedLine) {
        if self.state.is_closed() {
            warn!(source = %line.source, "line ingested after close, dropping");
            return;
        }
        if self.state == EngineState::Idle {
            self.transition(EngineState::Streaming);
        }
        self.publish(line);
    }

    /// Steps 1-3 of ingestion: sequence, retain, fan out.
    fn publish(&mut self, line: FramedLine) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let tagged = Arc::new(TaggedLine::new(sequence, line.source, line.text));
        self.replay.append(Arc::clone(&tagged));

        let report = self.registry.for_each(&tagged);
        if !report.all_delivered() {
            let removed = self.registry.prune(&report);
            debug!(removed, remaining = self.registry.len(), "pruned unreachable subscribers");
        }
    }

    fn attach_stream(&mut self, source: LineSource) {
        if self.state.is_closed() {
            warn!(%source, "stream attached after close, ignoring");
            return;
        }
        self.open_streams += 1;
        debug!(%source, open = self.open_streams, "stream attached");
    }

    fn stream_finished(&mut self, source: LineSource) {
        if self.open_streams == 0 {
            warn!(%source, "stream finished without being attached");
            return;
        }
        self.open_streams -= 1;
        debug!(%source, open = self.open_streams, "stream finished");
        self.maybe_close();
    }

    fn process_exited(&mut self, outcome: ProcessOutcome) {
        if self.exit.is_some() {
            warn!(?outcome, "duplicate process exit signal ignored");
            return;
        }
        info!(success = outcome.success, exit_code = ?outcome.exit_code, "process exited");
        self.exit = Some(outcome);
        if matches!(self.state, EngineState::Idle | EngineState::Streaming) {
            self.transition(EngineState::Draining);
        }
        self.maybe_close();
    }

    /// Close once the process has exited and every stream has drained.
    fn maybe_close(&mut self) {
        if self.state.is_closed() || self.open_streams > 0 {
            return;
        }
        let Some(outcome) = self.exit.as_ref() else {
            return;
        };
        let summary = outcome.summary();
        self.publish(FramedLine::system(summary));
        self.transition(EngineState::Closed);

        // Dropping the sinks ends every live stream
        self.registry.clear();
        info!(
            last_sequence = self.next_sequence - 1,
            "broadcast engine closed"
        );
    }

    fn register(&mut self, sink: Arc<dyn LineSink>) -> JoinSnapshot {
        let id = sink.id();
        let lines = self.replay.snapshot();
        let registered = if self.state.is_closed() {
            false
        } else {
            self.registry.register(sink)
        };
        debug!(
            subscriber = %id,
            replayed = lines.len(),
            registered,
            total = self.registry.len(),
            "subscriber joined"
        );
        JoinSnapshot {
            lines,
            state: self.state,
            registered,
        }
    }

    fn status(&self) -> EngineStatus {
        EngineStatus {
            state: self.state,
            last_sequence: self.next_sequence - 1,
            buffered_lines: self.replay.len(),
            subscribers: self.registry.len(),
            open_streams: self.open_streams,
        }
    }

    fn transition(&mut self, next: EngineState) {
        debug!(from = ?self.state, to = ?next, "engine state change");
        self.state = next;
        let final_sequence = next.is_closed().then(|| self.next_sequence - 1);
        self.lifecycle_tx.send_replace(Lifecycle {
            state: next,
            final_sequence,
        });
    }
}
