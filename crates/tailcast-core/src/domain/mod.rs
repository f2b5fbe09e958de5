//! Domain types shared by every tailcast adapter.

mod line;
mod outcome;
mod state;

pub use line::{FramedLine, LineSource, TaggedLine};
pub use outcome::ProcessOutcome;
pub use state::EngineState;
