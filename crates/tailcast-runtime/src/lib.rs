//! Runtime for tailcast: line framing, the broadcast engine, and the
//! process driver.
//!
//! ```text
//! ProcessDriver ──► spawn_framer(stdout) ──┐
//!               └─► spawn_framer(stderr) ──┴─► engine task ──► ReplayBuffer
//!                                                         └──► SubscriberRegistry ──► viewers
//! ```

#![deny(unsafe_code)]

pub mod engine;
pub mod framer;
pub mod process;
pub mod registry;
pub mod replay;
pub mod subscription;

pub use engine::{BroadcastEngine, EngineHandle, EngineStatus, JoinSnapshot, StreamFeed};
pub use framer::{LineFramer, spawn_framer};
pub use process::{CommandSpec, ProcessDriver, shutdown_child};
pub use registry::{FanOutReport, SubscriberRegistry};
pub use replay::ReplayBuffer;
pub use subscription::{ChannelSink, StreamEnd, Subscription};
