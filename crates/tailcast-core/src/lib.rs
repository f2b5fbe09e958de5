//! Core domain types and ports for tailcast.
//!
//! This crate has no runtime or transport dependencies. It defines the
//! sequenced line model, the engine lifecycle, the subscriber sink port
//! and the broadcast settings shared by the runtime, HTTP and CLI crates.

#![deny(unused_crate_dependencies)]

pub mod domain;
pub mod ports;
pub mod settings;

// Re-export commonly used types for convenience
pub use domain::{EngineState, FramedLine, LineSource, ProcessOutcome, TaggedLine};
pub use ports::{DeliveryError, EngineError, LineSink, ProcessError, SubscriberId};
pub use settings::{
    BroadcastSettings, DEFAULT_MAX_LINE_BYTES, DEFAULT_REPLAY_CAPACITY, DEFAULT_SEND_TIMEOUT_MS,
    DEFAULT_SUBSCRIBER_QUEUE_DEPTH, SettingsError, validate_settings,
};

// Silence unused dev-dependency warnings
#[cfg(test)]
use serde_json as _;
