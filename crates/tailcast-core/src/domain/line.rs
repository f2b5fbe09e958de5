//! Captured output lines.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stream a captured line originated from.
///
/// `System` lines are synthesized by tailcast itself (launch notices,
/// stream read errors, exit status) rather than written by the child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineSource {
    Stdout,
    Stderr,
    System,
}

impl LineSource {
    /// Wire label for this source.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
            Self::System => "system",
        }
    }
}

impl fmt::Display for LineSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A line of output that has been sequenced by the broadcast engine.
///
/// The sequence number is assigned exactly once, at ingestion, from a
/// counter shared by every stream. Sequences start at 1 and are gap-free.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedLine {
    /// Global order key.
    pub sequence: u64,
    /// Originating stream.
    pub source: LineSource,
    /// Line content without its terminator.
    pub text: String,
}

impl TaggedLine {
    /// Create a new tagged line.
    pub fn new(sequence: u64, source: LineSource, text: impl Into<String>) -> Self {
        Self {
            sequence,
            source,
            text: text.into(),
        }
    }

    /// Whether this line was synthesized rather than captured.
    #[must_use]
    pub const fn is_system(&self) -> bool {
        matches!(self.source, LineSource::System)
    }
}

/// A line emitted by a framer, not yet sequenced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramedLine {
    pub source: LineSource,
    pub text: String,
}

impl FramedLine {
    pub fn new(source: LineSource, text: impl Into<String>) -> Self {
        Self {
            source,
            text: text.into(),
        }
    }

    /// Shorthand for a synthesized `system` line.
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(LineSource::System, text)
    }
}
