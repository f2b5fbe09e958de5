//! Broadcast engine lifecycle states.

use serde::{Deserialize, Serialize};

/// Lifecycle of a broadcast engine.
///
/// ```text
/// Idle --first ingest--> Streaming --process exit--> Draining --all streams done--> Closed
/// ```
///
/// `Closed` is terminal: no further ingestion, but snapshots and late
/// joins are still served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    #[default]
    Idle,
    Streaming,
    Draining,
    Closed,
}

impl EngineState {
    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }
}
