//! Subscriber sink port for live line delivery.
//!
//! A sink is the engine's view of one connected viewer. The engine never
//! owns the viewer's transport; it only hands lines to the sink and
//! reacts to the delivery result.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::TaggedLine;

/// Counter for generating unique subscriber IDs
static SUBSCRIBER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identity of a registered sink. Used as the registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Allocate a fresh, process-unique ID.
    pub fn next() -> Self {
        Self(SUBSCRIBER_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Terminal failure delivering a line to one subscriber.
///
/// Every variant means the subscriber is unreachable; the registry
/// removes it and never retries.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// The subscriber's outbound queue is full (viewer too slow).
    #[error("subscriber queue full ({capacity} lines)")]
    Lagged { capacity: usize },

    /// The viewer side has gone away.
    #[error("subscriber disconnected")]
    Closed,

    /// Transport-specific failure.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Port for handing sequenced lines to one viewer.
///
/// `deliver` is called from the engine's serialization point and must not
/// block: implementations either enqueue and return, or fail fast.
pub trait LineSink: Send + Sync {
    /// Stable identity of this sink.
    fn id(&self) -> SubscriberId;

    /// Hand one line to the viewer.
    fn deliver(&self, line: &Arc<TaggedLine>) -> Result<(), DeliveryError>;
}
