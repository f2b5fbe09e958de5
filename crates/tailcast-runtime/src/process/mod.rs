//! Process driver: spawns the captured command and reports its lifecycle.
//!
//! - `CommandSpec` - program and arguments, parsed with shell quoting rules
//! - `ProcessDriver` - spawn, attach framers, wait or cancel, report exit
//! - `shutdown_child` - SIGTERM → SIGKILL escalation

mod command;
mod driver;
mod shutdown;

pub use command::CommandSpec;
pub use driver::{DEFAULT_DRAIN_TIMEOUT, ProcessDriver};
pub use shutdown::{DEFAULT_SHUTDOWN_GRACE, shutdown_child};
