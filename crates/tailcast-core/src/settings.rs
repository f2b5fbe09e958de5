//! Broadcast settings and validation.
//!
//! Pure configuration values for the engine and the viewer transport.
//! Adapters build these from CLI flags or environment variables and call
//! [`validate_settings`] before wiring anything up.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default number of lines retained for late joiners.
pub const DEFAULT_REPLAY_CAPACITY: usize = 1000;

/// Default depth of each subscriber's outbound queue.
pub const DEFAULT_SUBSCRIBER_QUEUE_DEPTH: usize = 256;

/// Default per-frame transport send deadline in milliseconds.
pub const DEFAULT_SEND_TIMEOUT_MS: u64 = 2_000;

/// Default safety cap on a single framed line (1 MiB).
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

const MAX_REPLAY_CAPACITY: usize = 1_000_000;
const MAX_SUBSCRIBER_QUEUE_DEPTH: usize = 65_536;
const MIN_LINE_BYTES: usize = 64;

/// Engine and transport tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BroadcastSettings {
    /// Lines kept in the replay buffer. 0 means live-only.
    pub replay_capacity: usize,

    /// Lines a subscriber may have queued before it is dropped as lagging.
    pub subscriber_queue_depth: usize,

    /// Deadline for writing one frame to a viewer's transport.
    pub send_timeout_ms: u64,

    /// Longest line a framer emits before splitting it.
    pub max_line_bytes: usize,
}

impl BroadcastSettings {
    /// Create settings with sensible defaults.
    #[must_use]
    pub const fn with_defaults() -> Self {
        Self {
            replay_capacity: DEFAULT_REPLAY_CAPACITY,
            subscriber_queue_depth: DEFAULT_SUBSCRIBER_QUEUE_DEPTH,
            send_timeout_ms: DEFAULT_SEND_TIMEOUT_MS,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }

    #[must_use]
    pub const fn with_replay_capacity(mut self, capacity: usize) -> Self {
        self.replay_capacity = capacity;
        self
    }

    #[must_use]
    pub const fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Settings validation error.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Replay capacity must be at most 1000000, got {0}")]
    InvalidReplayCapacity(usize),

    #[error("Subscriber queue depth must be between 1 and 65536, got {0}")]
    InvalidQueueDepth(usize),

    #[error("Send timeout must be greater than zero")]
    InvalidSendTimeout,

    #[error("Max line bytes must be at least 64, got {0}")]
    InvalidMaxLineBytes(usize),
}

/// Validate broadcast settings.
pub fn validate_settings(settings: &BroadcastSettings) -> Result<(), SettingsError> {
    if settings.replay_capacity > MAX_REPLAY_CAPACITY {
        return Err(SettingsError::InvalidReplayCapacity(
            settings.replay_capacity,
        ));
    }

    if !(1..=MAX_SUBSCRIBER_QUEUE_DEPTH).contains(&settings.subscriber_queue_depth) {
        return Err(SettingsError::InvalidQueueDepth(
            settings.subscriber_queue_depth,
        ));
    }

    if settings.send_timeout_ms == 0 {
        return Err(SettingsError::InvalidSendTimeout);
    }

    if settings.max_line_bytes < MIN_LINE_BYTES {
        return Err(SettingsError::InvalidMaxLineBytes(settings.max_line_bytes));
    }

    Ok(())
}
