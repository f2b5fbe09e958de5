//! Process completion reported by the process driver.

use serde::{Deserialize, Serialize};

/// How the captured child process ended.
///
/// Delivered to the engine exactly once per run. A launch failure is an
/// outcome too: `success == false`, no exit code, and the spawn error as
/// `detail`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessOutcome {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub detail: Option<String>,
}

impl ProcessOutcome {
    /// The child exited with status 0.
    #[must_use]
    pub const fn succeeded() -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            detail: None,
        }
    }

    /// The child ran but exited unsuccessfully.
    pub fn failed(exit_code: Option<i32>, detail: impl Into<String>) -> Self {
        Self {
            success: false,
            exit_code,
            detail: Some(detail.into()),
        }
    }

    /// The child could not be started at all.
    pub fn launch_failed(detail: impl Into<String>) -> Self {
        Self::failed(None, detail)
    }

    /// Text of the final `system` line recorded when the engine closes.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.success {
            return "Command completed successfully".to_string();
        }
        match (&self.detail, self.exit_code) {
            (Some(detail), _) => format!("Command exited with error: {detail}"),
            (None, Some(code)) => format!("Command exited with error: exit status {code}"),
            (None, None) => "Command exited with error".to_string(),
        }
    }
}
