use serde::Serialize;
use tailcast_core::{LineSource, TaggedLine};

/// One message on the `/ws` and SSE feeds.
///
/// ```json
/// {"type":"line","sequence":7,"source":"stderr","text":"warning: ..."}
/// {"type":"closed"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ViewerFrame<'a> {
    Line {
        sequence: u64,
        source: LineSource,
        text: &'a str,
    },
    /// The command finished and every line has been sent.
    Closed,
}

impl<'a> ViewerFrame<'a> {
    pub fn line(line: &'a TaggedLine) -> Self {
        Self::Line {
            sequence: line.sequence,
            source: line.source,
            text: &line.text,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
