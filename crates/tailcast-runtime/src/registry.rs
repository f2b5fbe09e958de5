//! Subscriber registration and fan-out.
//!
//! The registry is owned by the engine task; every mutation happens at
//! that single serialization point. Fan-out never blocks: sinks enqueue
//! or fail, and failures are handed back to the caller as a
//! [`FanOutReport`] instead of being retried.

use std::collections::BTreeMap;
use std::sync::Arc;

use tailcast_core::{DeliveryError, LineSink, SubscriberId, TaggedLine};
use tracing::warn;

/// Result of delivering one line to every registered sink.
#[derive(Debug, Default)]
pub struct FanOutReport {
    pub delivered: usize,
    pub failed: Vec<(SubscriberId, DeliveryError)>,
}

impl FanOutReport {
    pub fn all_delivered(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Set of live subscribers keyed by sink identity.
#[derive(Default)]
pub struct SubscriberRegistry {
    sinks: BTreeMap<SubscriberId, Arc<dyn LineSink>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink. Returns `false` if it was already registered.
    pub fn register(&mut self, sink: Arc<dyn LineSink>) -> bool {
        let id = sink.id();
        if self.sinks.contains_key(&id) {
            return false;
        }
        self.sinks.insert(id, sink);
        true
    }

    /// Remove a sink. Returns `false` if it was not registered.
    pub fn unregister(&mut self, id: SubscriberId) -> bool {
        self.sinks.remove(&id).is_some()
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.sinks.contains_key(&id)
    }

    /// Deliver `line` to every registered sink.
    ///
    /// One failing sink never affects delivery to the others.
    pub fn for_each(&self, line: &Arc<TaggedLine>) -> FanOutReport {
        let mut report = FanOutReport::default();
        for (id, sink) in &self.sinks {
            match sink.deliver(line) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(subscriber = %id, sequence = line.sequence, error = %e, "line delivery failed");
                    report.failed.push((*id, e));
                }
            }
        }
        report
    }

    /// Drop every sink whose delivery failed in `report`.
    ///
    /// Returns how many were removed.
    pub fn prune(&mut self, report: &FanOutReport) -> usize {
        report
            .failed
            .iter()
            .filter(|(id, _)| self.unregister(*id))
            .count()
    }

    /// Remove every sink, closing their live streams.
    pub fn clear(&mut self) {
        self.sinks.clear();
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}
