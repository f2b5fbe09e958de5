//! Cloneable handles onto the engine task.

use std::sync::Arc;

use tailcast_core::{
    BroadcastSettings, EngineError, EngineState, FramedLine, LineSink, LineSource,
    ProcessOutcome, SubscriberId, TaggedLine,
};
use tokio::sync::{mpsc, oneshot, watch};

use super::actor::{Command, EngineActor, EngineStatus, JoinSnapshot, Lifecycle};
use crate::subscription::{ChannelSink, Subscription};

/// Entry point for creating a broadcast engine.
pub struct BroadcastEngine;

impl BroadcastEngine {
    /// Spawn the engine task on the current runtime and return a handle.
    pub fn spawn(settings: &BroadcastSettings) -> EngineHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let (lifecycle_tx, lifecycle_rx) = watch::channel(Lifecycle::idle());

        let actor = EngineActor::new(settings.replay_capacity, lifecycle_tx);
        tokio::spawn(actor.run(rx));

        EngineHandle {
            tx,
            lifecycle_rx,
            queue_depth: settings.subscriber_queue_depth.max(1),
        }
    }
}

/// `Send + Sync + Clone` proxy to the engine task.
///
/// Commands are queued on an unbounded channel. The engine never blocks
/// on subscribers, so the queue drains at ingestion speed.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<Command>,
    lifecycle_rx: watch::Receiver<Lifecycle>,
    queue_depth: usize,
}

impl EngineHandle {
    fn send(&self, command: Command) -> Result<(), EngineError> {
        self.tx.send(command).map_err(|_| EngineError::Stopped)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, EngineError> {
        let (reply, response) = oneshot::channel();
        self.send(build(reply))?;
        response.await.map_err(|_| EngineError::Stopped)
    }

    // ── Ingestion ──────────────────────────────────────────────────

    /// Ingest one line directly (driver notices, tests).
    ///
    /// Lines arriving after the engine closed are dropped by the engine.
    pub fn ingest(&self, source: LineSource, text: impl Into<String>) -> Result<(), EngineError> {
        self.send(Command::Ingest {
            line: FramedLine::new(source, text),
        })
    }

    /// Register a stream the engine must wait for before closing.
    ///
    /// The engine counts the stream as finished when the returned feed is
    /// dropped.
    pub fn attach_stream(&self, source: LineSource) -> Result<StreamFeed, EngineError> {
        if self.state().is_closed() {
            return Err(EngineError::Closed);
        }
        self.send(Command::AttachStream { source })?;
        Ok(StreamFeed {
            source,
            tx: self.tx.clone(),
        })
    }

    /// Signal that the child process ended.
    pub fn process_exited(&self, outcome: ProcessOutcome) -> Result<(), EngineError> {
        self.send(Command::ProcessExited { outcome })
    }

    // ── Subscribers ────────────────────────────────────────────────

    /// Snapshot the replay buffer and register `sink` in one step.
    pub async fn register(&self, sink: Arc<dyn LineSink>) -> Result<JoinSnapshot, EngineError> {
        self.request(|reply| Command::Register { sink, reply }).await
    }

    /// Remove a subscriber. No-op if it is not registered.
    pub fn unregister(&self, id: SubscriberId) -> Result<(), EngineError> {
        self.send(Command::Unregister { id })
    }

    /// Join as a channel-backed viewer.
    ///
    /// The subscription yields the replay snapshot, then live lines until
    /// the engine closes, the viewer lags too far behind, or it is dropped.
    pub async fn connect(&self) -> Result<Subscription, EngineError> {
        let (sink, receiver) = ChannelSink::channel(self.queue_depth);
        let id = sink.id();
        let join = self.register(Arc::new(sink)).await?;
        Ok(Subscription::new(id, join, receiver, self.clone()))
    }

    // ── Queries ────────────────────────────────────────────────────

    /// Point-in-time copy of the replay buffer.
    pub async fn snapshot(&self) -> Result<Vec<Arc<TaggedLine>>, EngineError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    pub async fn status(&self) -> Result<EngineStatus, EngineError> {
        self.request(|reply| Command::Status { reply }).await
    }

    /// Last published lifecycle state.
    pub fn state(&self) -> EngineState {
        self.lifecycle_rx.borrow().state
    }

    /// Sequence of the last line the engine will ever publish, once closed.
    pub fn final_sequence(&self) -> Option<u64> {
        self.lifecycle_rx.borrow().final_sequence
    }

    /// Wait until the engine reaches `Closed`.
    pub async fn wait_closed(&self) -> Result<(), EngineError> {
        let mut lifecycle_rx = self.lifecycle_rx.clone();
        lifecycle_rx
            .wait_for(|lifecycle| lifecycle.state.is_closed())
            .await
            .map(|_| ())
            .map_err(|_| EngineError::Stopped)
    }
}

/// Ingestion channel for one framed stream.
///
/// Lines sent through one feed keep their relative order. Dropping the
/// feed marks the stream finished.
pub struct StreamFeed {
    source: LineSource,
    tx: mpsc::UnboundedSender<Command>,
}

impl StreamFeed {
    pub const fn source(&self) -> LineSource {
        self.source
    }

    pub fn send(&self, line: FramedLine) -> Result<(), EngineError> {
        self.tx
            .send(Command::Ingest { line })
            .map_err(|_| EngineError::Stopped)
    }

    /// Mark the stream finished. Equivalent to dropping the feed.
    pub fn finish(self) {}
}

impl Drop for StreamFeed {
    fn drop(&mut self) {
        let _ = self.tx.send(Command::StreamFinished {
            source: self.source,
        });
    }
}
