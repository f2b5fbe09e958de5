//! CLI bootstrap - the composition root.
//!
//! This is the only place where the engine, the process driver and the
//! web server are wired together.

use std::io;
use std::net::SocketAddr;

use tailcast_axum::{AxumContext, CorsConfig, ServerConfig, serve};
use tailcast_core::{BroadcastSettings, ProcessError, ProcessOutcome, validate_settings};
use tailcast_runtime::{BroadcastEngine, CommandSpec, EngineHandle, ProcessDriver};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::CliError;
use crate::parser::Cli;

/// Validated configuration for one run.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub server: ServerConfig,
    pub settings: BroadcastSettings,
    pub command: CommandSpec,
}

impl CliConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let settings = cli.settings();
        validate_settings(&settings)?;
        let mut server = ServerConfig::new(cli.addr);
        if !cli.allow_origins.is_empty() {
            server = server.with_allowed_origins(cli.allow_origins.clone());
        }
        Ok(Self {
            server,
            settings,
            command: cli.command_spec()?,
        })
    }
}

/// Wired-up services, ready to [`run`].
pub struct CliContext {
    pub engine: EngineHandle,
    pub settings: BroadcastSettings,
    pub driver: ProcessDriver,
    listener: TcpListener,
    cors: CorsConfig,
}

impl CliContext {
    /// Address the viewer server is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// Bind the listener and start the broadcast engine.
///
/// Binding happens before the command is launched so that a busy port
/// fails fast without running anything.
pub async fn bootstrap(config: CliConfig) -> Result<CliContext, CliError> {
    let listener = TcpListener::bind(config.server.addr)
        .await
        .map_err(|e| CliError::Io(format!("failed to bind {}: {e}", config.server.addr)))?;

    let engine = BroadcastEngine::spawn(&config.settings);
    let driver = ProcessDriver::new(config.command, config.settings.max_line_bytes);

    Ok(CliContext {
        engine,
        settings: config.settings,
        driver,
        listener,
        cors: config.server.cors,
    })
}

/// Run the command and serve viewers until `shutdown` is cancelled.
///
/// The server keeps running after the command finishes so viewers can
/// still read the transcript. Cancelling `shutdown` stops the command (if
/// still running) and then the server. If the server fails on its own the
/// command is stopped and the server's error is returned.
pub async fn run(ctx: CliContext, shutdown: CancellationToken) -> anyhow::Result<()> {
    let CliContext {
        engine,
        settings,
        driver,
        listener,
        cors,
    } = ctx;

    let command = driver.spec().to_string();
    let axum_ctx = AxumContext::new(engine.clone(), settings).with_command(command);
    let server_shutdown = shutdown.clone();
    let server =
        tokio::spawn(async move { serve(listener, axum_ctx, &cors, server_shutdown).await });

    supervise(server, &driver, &engine, shutdown).await
}

/// Drive the command while watching the server task.
async fn supervise(
    mut server: JoinHandle<anyhow::Result<()>>,
    driver: &ProcessDriver,
    engine: &EngineHandle,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let command = driver.spec().to_string();
    let running = driver.run(engine, shutdown.clone());
    tokio::pin!(running);

    tokio::select! {
        outcome = &mut running => {
            report_outcome(&command, outcome);
            server.await??;
        }
        served = &mut server => {
            if !shutdown.is_cancelled() {
                error!(%command, "server stopped unexpectedly, stopping command");
                shutdown.cancel();
            }
            report_outcome(&command, running.await);
            served??;
        }
    }
    Ok(())
}

fn report_outcome(command: &str, outcome: Result<ProcessOutcome, ProcessError>) {
    match outcome {
        Ok(outcome) if outcome.success => {
            info!(%command, "command completed; still serving, press Ctrl-C to exit");
        }
        Ok(outcome) => {
            warn!(
                %command,
                exit_code = ?outcome.exit_code,
                detail = outcome.detail.as_deref().unwrap_or_default(),
                "command failed; still serving, press Ctrl-C to exit"
            );
        }
        Err(e) => error!(%command, error = %e, "command could not be run"),
    }
}
