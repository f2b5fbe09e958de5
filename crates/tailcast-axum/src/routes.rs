//! Route definitions and router construction.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::bootstrap::{AxumContext, CorsConfig};
use crate::handlers;
use crate::state::AppState;

/// Build CORS layer from configuration.
fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    match config {
        CorsConfig::AllowAll => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
        CorsConfig::AllowOrigins(origins) => {
            use axum::http::HeaderValue;
            let allowed: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| match origin.parse() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!(%origin, "ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            CorsLayer::new()
                .allow_origin(allowed)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    }
}

/// JSON API, nested under `/api` by [`create_router`].
pub(crate) fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/lines", get(handlers::lines::snapshot))
        .route("/lines/stream", get(handlers::lines::stream))
        .route("/status", get(handlers::status::status))
        .fallback(handlers::status::not_found)
}

/// Create the full router: viewer page, WebSocket feed, API and health.
pub fn create_router(ctx: AxumContext, cors_config: &CorsConfig) -> Router {
    let state: AppState = Arc::new(ctx);
    let cors = build_cors_layer(cors_config);

    Router::new()
        .route("/", get(handlers::page::index))
        .route("/ws", get(handlers::viewer_ws::viewer_ws))
        .route("/health", get(handlers::status::health))
        .nest("/api", api_routes().layer(cors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
