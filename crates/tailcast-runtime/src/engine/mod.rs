//! Live broadcast engine.
//!
//! One task owns the replay buffer and the subscriber registry. Framers,
//! the process driver and viewer connections talk to it through
//! [`EngineHandle`]s, so every state change is serialized in one place.
//!
//! Lines from stdout and stderr are sequenced in arrival order at the
//! engine. That is not necessarily the order the child wrote them in (OS
//! pipe buffering can reorder across streams), and no attempt is made to
//! reconstruct it.

mod actor;
mod handle;

pub use actor::{EngineStatus, JoinSnapshot};
pub use handle::{BroadcastEngine, EngineHandle, StreamFeed};
