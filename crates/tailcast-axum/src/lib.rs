//! Axum web adapter for tailcast.
//!
//! Serves the viewer page, the `/ws` WebSocket feed, a Server-Sent Events
//! feed and a small JSON API on top of a running broadcast engine.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Silence unused dev-dependency warnings
#[cfg(test)]
use http_body_util as _;
#[cfg(test)]
use tokio_test as _;
#[cfg(test)]
use tokio_tungstenite as _;
#[cfg(test)]
use tower as _;

pub mod bootstrap;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod sse;
pub mod state;

// Re-export primary types
pub use bootstrap::{AxumContext, CorsConfig, ServerConfig, serve, start_server};
pub use error::HttpError;
pub use routes::create_router;
pub use state::AppState;
