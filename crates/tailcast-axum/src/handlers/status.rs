//! Status and liveness endpoints.

use axum::Json;
use axum::extract::State;

use crate::dto::StatusResponse;
use crate::error::HttpError;
use crate::state::AppState;

/// `GET /api/status`
pub async fn status(State(state): State<AppState>) -> Result<Json<StatusResponse>, HttpError> {
    let status = state.engine.status().await?;
    Ok(Json(StatusResponse::new(status, state.command.clone())))
}

/// `GET /health`
pub async fn health() -> &'static str {
    "OK"
}

/// Fallback for unknown `/api` paths.
pub async fn not_found(uri: axum::http::Uri) -> HttpError {
    HttpError::NotFound(uri.path().to_string())
}
