//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces that the core domain expects from infrastructure.
//! They contain no implementation details and use only domain types.

pub mod line_sink;

use thiserror::Error;

pub use line_sink::{DeliveryError, LineSink, SubscriberId};

/// Errors surfaced by a broadcast engine handle.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    /// The engine task is no longer running.
    #[error("broadcast engine has stopped")]
    Stopped,

    /// The engine is closed and no longer accepts ingestion.
    #[error("broadcast engine is closed")]
    Closed,
}

/// Domain-specific errors for the process driver.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// No program was given.
    #[error("empty command")]
    EmptyCommand,

    /// The command line could not be tokenized.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// Failed to start the process.
    #[error("failed to start command: {0}")]
    SpawnFailed(String),

    /// Failed while waiting on or stopping the process.
    #[error("process I/O error: {0}")]
    Io(#[from] std::io::Error),
}
