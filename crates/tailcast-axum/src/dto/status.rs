use serde::Serialize;
use tailcast_core::EngineState;
use tailcast_runtime::EngineStatus;

/// Body of `GET /api/status`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub state: EngineState,
    pub last_sequence: u64,
    pub buffered_lines: usize,
    pub subscribers: usize,
    /// Command line being broadcast, if known.
    pub command: Option<String>,
}

impl StatusResponse {
    pub fn new(status: EngineStatus, command: Option<String>) -> Self {
        Self {
            state: status.state,
            last_sequence: status.last_sequence,
            buffered_lines: status.buffered_lines,
            subscribers: status.subscribers,
            command,
        }
    }
}
