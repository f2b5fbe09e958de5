//! Command-line parser.

use std::net::SocketAddr;

use clap::Parser;
use tailcast_core::{
    BroadcastSettings, DEFAULT_MAX_LINE_BYTES, DEFAULT_REPLAY_CAPACITY, DEFAULT_SEND_TIMEOUT_MS,
    DEFAULT_SUBSCRIBER_QUEUE_DEPTH,
};
use tailcast_runtime::CommandSpec;

use crate::error::CliError;

/// Run a command and broadcast its output to browsers in real time.
///
/// The command is given either with `--cmd "<command line>"` or after a
/// `--` separator:
///
/// ```text
/// tailcast --addr 127.0.0.1:9000 -- cargo build --release
/// ```
#[derive(Debug, Parser)]
#[command(name = "tailcast")]
#[command(about = "Broadcast a command's output to browsers in real time")]
#[command(version)]
pub struct Cli {
    /// HTTP listen address
    #[arg(long, env = "TAILCAST_ADDR", default_value = "0.0.0.0:8080")]
    pub addr: SocketAddr,

    /// Command line to run (shell-style quoting, no shell features)
    #[arg(long = "cmd", env = "TAILCAST_CMD", value_name = "COMMAND LINE")]
    pub cmd: Option<String>,

    /// Lines kept for viewers who join late (0 = live only)
    #[arg(long = "buffer", env = "TAILCAST_BUFFER", default_value_t = DEFAULT_REPLAY_CAPACITY)]
    pub buffer: usize,

    /// Lines queued per viewer before it is dropped as too slow
    #[arg(long, env = "TAILCAST_QUEUE_DEPTH", default_value_t = DEFAULT_SUBSCRIBER_QUEUE_DEPTH)]
    pub queue_depth: usize,

    /// Per-frame write timeout for WebSocket viewers, in milliseconds
    #[arg(long, env = "TAILCAST_SEND_TIMEOUT_MS", default_value_t = DEFAULT_SEND_TIMEOUT_MS)]
    pub send_timeout_ms: u64,

    /// Longest line kept intact; longer lines are split
    #[arg(long, env = "TAILCAST_MAX_LINE_BYTES", default_value_t = DEFAULT_MAX_LINE_BYTES)]
    pub max_line_bytes: usize,

    /// Origin allowed to call `/api` from another site (repeatable; default any)
    #[arg(
        long = "allow-origin",
        env = "TAILCAST_ALLOW_ORIGINS",
        value_delimiter = ',',
        value_name = "ORIGIN"
    )]
    pub allow_origins: Vec<String>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Command and arguments, after `--`
    #[arg(last = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

impl Cli {
    /// Broadcast settings from the flags.
    pub const fn settings(&self) -> BroadcastSettings {
        BroadcastSettings {
            replay_capacity: self.buffer,
            subscriber_queue_depth: self.queue_depth,
            send_timeout_ms: self.send_timeout_ms,
            max_line_bytes: self.max_line_bytes,
        }
    }

    /// The command to run. Trailing arguments win over `--cmd`.
    pub fn command_spec(&self) -> Result<CommandSpec, CliError> {
        if !self.command.is_empty() {
            return Ok(CommandSpec::from_args(self.command.iter().cloned())?);
        }
        match self.cmd.as_deref() {
            Some(line) => Ok(CommandSpec::parse(line)?),
            None => Err(CliError::Arguments(
                "no command given; use --cmd \"<command>\" or -- <command> [args...]".to_string(),
            )),
        }
    }
}
