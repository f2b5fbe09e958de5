//! Line history endpoints.

use std::convert::Infallible;

use axum::Json;
use axum::extract::State;
use axum::response::sse::{Event, Sse};
use futures_util::stream::Stream;
use tailcast_core::TaggedLine;

use crate::error::HttpError;
use crate::sse::subscription_events;
use crate::state::AppState;

/// `GET /api/lines`: the replay buffer, oldest first.
pub async fn snapshot(State(state): State<AppState>) -> Result<Json<Vec<TaggedLine>>, HttpError> {
    let lines = state.engine.snapshot().await?;
    Ok(Json(lines.iter().map(|line| (**line).clone()).collect()))
}

/// `GET /api/lines/stream`: replay snapshot then live lines as SSE.
pub async fn stream(
    State(state): State<AppState>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static>, HttpError> {
    let subscription = state.engine.connect().await?;
    tracing::debug!(
        subscriber = %subscription.id(),
        replay = subscription.pending_replay(),
        "SSE viewer joined"
    );
    Ok(subscription_events(subscription))
}
