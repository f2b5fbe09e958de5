//! Bounded replay history for late joiners.

use std::collections::VecDeque;
use std::sync::Arc;

use tailcast_core::TaggedLine;

/// Ring buffer of the most recent sequenced lines, oldest evicted first.
///
/// Owned by the engine task, so appends and snapshots never interleave.
/// Retained sequence numbers are always contiguous.
#[derive(Debug)]
pub struct ReplayBuffer {
    lines: VecDeque<Arc<TaggedLine>>,
    capacity: usize,
}

impl ReplayBuffer {
    /// Create an empty buffer. A capacity of 0 retains nothing.
    pub fn new(capacity: usize) -> Self {
        Self {
            // Avoid reserving huge capacities up front
            lines: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
        }
    }

    /// Add a line at the tail, evicting the head if at capacity.
    pub fn append(&mut self, line: Arc<TaggedLine>) {
        debug_assert!(
            self.lines
                .back()
                .is_none_or(|last| line.sequence == last.sequence + 1),
            "replay buffer sequence gap"
        );
        if self.capacity == 0 {
            return;
        }
        if self.lines.len() >= self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    /// Ordered copy of every retained line.
    pub fn snapshot(&self) -> Vec<Arc<TaggedLine>> {
        self.lines.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}
