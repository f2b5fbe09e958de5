//! Command-line front end for tailcast.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Silence unused dev-dependency warnings
#[cfg(test)]
use tokio_test as _;

// Used by main.rs binary
use dotenvy as _;

pub mod bootstrap;
pub mod error;
pub mod logging;
pub mod parser;

// Re-export primary types for convenient access
pub use bootstrap::{CliConfig, CliContext, bootstrap, run};
pub use error::{CliError, exit_code_for};
pub use logging::init_tracing;
pub use parser::Cli;
