//! Channel-backed subscribers.
//!
//! Each viewer gets a bounded queue. The engine enqueues with `try_send`
//! and never waits; a full queue means the viewer is too slow and it is
//! dropped rather than allowed to stall ingestion or other viewers.

use std::collections::VecDeque;
use std::sync::Arc;

use tailcast_core::{DeliveryError, EngineState, LineSink, SubscriberId, TaggedLine};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

use crate::engine::{EngineHandle, JoinSnapshot};

/// [`LineSink`] that forwards lines into a bounded channel.
#[derive(Debug)]
pub struct ChannelSink {
    id: SubscriberId,
    sender: mpsc::Sender<Arc<TaggedLine>>,
    capacity: usize,
}

impl ChannelSink {
    /// Create a sink and the receiver its viewer drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Arc<TaggedLine>>) {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        let sink = Self {
            id: SubscriberId::next(),
            sender,
            capacity,
        };
        (sink, receiver)
    }
}

impl LineSink for ChannelSink {
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn deliver(&self, line: &Arc<TaggedLine>) -> Result<(), DeliveryError> {
        self.sender
            .try_send(Arc::clone(line))
            .map_err(|e| match e {
                TrySendError::Full(_) => DeliveryError::Lagged {
                    capacity: self.capacity,
                },
                TrySendError::Closed(_) => DeliveryError::Closed,
            })
    }
}

/// Why a subscription stopped yielding lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The viewer received every line up to the engine's closing line.
    Completed,
    /// The viewer was dropped by the engine (lagging or failed delivery).
    Dropped,
}

/// A joined viewer: replay snapshot first, then live lines.
///
/// Dropping the subscription unregisters it from the engine.
pub struct Subscription {
    id: SubscriberId,
    snapshot: VecDeque<Arc<TaggedLine>>,
    receiver: mpsc::Receiver<Arc<TaggedLine>>,
    engine: EngineHandle,
    joined_state: EngineState,
    last_sequence: u64,
}

impl Subscription {
    pub(crate) fn new(
        id: SubscriberId,
        join: JoinSnapshot,
        receiver: mpsc::Receiver<Arc<TaggedLine>>,
        engine: EngineHandle,
    ) -> Self {
        Self {
            id,
            snapshot: join.lines.into(),
            receiver,
            engine,
            joined_state: join.state,
            last_sequence: 0,
        }
    }

    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// Engine state at the moment this viewer joined.
    pub const fn joined_state(&self) -> EngineState {
        self.joined_state
    }

    /// Lines still to be replayed from the join snapshot.
    pub fn pending_replay(&self) -> usize {
        self.snapshot.len()
    }

    /// Next line in sequence order, or `None` once the stream has ended.
    pub async fn next_line(&mut self) -> Option<Arc<TaggedLine>> {
        let line = match self.snapshot.pop_front() {
            Some(line) => line,
            None => self.receiver.recv().await?,
        };
        debug_assert!(
            self.last_sequence == 0 || line.sequence == self.last_sequence + 1,
            "subscriber observed a sequence gap or repeat"
        );
        self.last_sequence = line.sequence;
        Some(line)
    }

    /// Why the stream ended. Meaningful once `next_line` returned `None`.
    ///
    /// A viewer that joined live only counts as completed if it reached
    /// the engine's final line. One that was pruned for lagging can still
    /// drain its queue after the engine closed, and it has missed lines.
    pub fn end_reason(&self) -> StreamEnd {
        if self.joined_state.is_closed() && self.snapshot.is_empty() {
            // Joined after close: the replay snapshot was all there was
            return StreamEnd::Completed;
        }
        match self.engine.final_sequence() {
            Some(last) if last == self.last_sequence && self.snapshot.is_empty() => {
                StreamEnd::Completed
            }
            _ => StreamEnd::Dropped,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        debug!(subscriber = %self.id, "subscription dropped");
        let _ = self.engine.unregister(self.id);
    }
}
