//! Axum server bootstrap.
//!
//! Binds the listener and serves the router until the shutdown token is
//! cancelled. The broadcast engine itself is created by the caller.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tailcast_core::BroadcastSettings;
use tailcast_runtime::EngineHandle;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::routes::create_router;

/// CORS configuration for the web server.
#[derive(Debug, Clone, Default)]
pub enum CorsConfig {
    /// Allow all origins.
    #[default]
    AllowAll,
    /// Allow specific origins.
    AllowOrigins(Vec<String>),
}

/// Server configuration for the Axum adapter.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on.
    pub addr: SocketAddr,
    /// CORS configuration for `/api`.
    pub cors: CorsConfig,
}

impl ServerConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            cors: CorsConfig::default(),
        }
    }

    /// Set CORS to allow specific origins.
    #[must_use]
    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.cors = CorsConfig::AllowOrigins(origins);
        self
    }
}

/// Everything the handlers need.
pub struct AxumContext {
    /// Handle onto the running broadcast engine.
    pub engine: EngineHandle,
    /// Settings the engine was started with; viewers use the send timeout.
    pub settings: BroadcastSettings,
    /// Command line being broadcast, shown by `/api/status`.
    pub command: Option<String>,
}

impl AxumContext {
    pub const fn new(engine: EngineHandle, settings: BroadcastSettings) -> Self {
        Self {
            engine,
            settings,
            command: None,
        }
    }

    #[must_use]
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }
}

/// Bind `config.addr` and serve until `shutdown` is cancelled.
pub async fn start_server(
    config: ServerConfig,
    ctx: AxumContext,
    shutdown: CancellationToken,
) -> Result<()> {
    let listener = TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    serve(listener, ctx, &config.cors, shutdown).await
}

/// Serve on an already-bound listener until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    ctx: AxumContext,
    cors: &CorsConfig,
    shutdown: CancellationToken,
) -> Result<()> {
    let local = listener.local_addr()?;
    let app = create_router(ctx, cors);

    info!("tailcast viewer listening on http://{local}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    info!("tailcast viewer stopped");
    Ok(())
}
