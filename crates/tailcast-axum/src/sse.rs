//! Server-Sent Events rendering of a viewer subscription.
//!
//! Same join semantics as the WebSocket feed: the replay snapshot first,
//! then live lines. Each event carries a [`ViewerFrame`] as JSON data and
//! uses the line sequence as its SSE id.

use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::Stream;
use tailcast_runtime::{StreamEnd, Subscription};
use tracing::{debug, warn};

use crate::dto::ViewerFrame;

/// Keep-alive interval for idle SSE connections.
pub const SSE_KEEP_ALIVE: Duration = Duration::from_secs(30);

/// Turn a subscription into an SSE response.
///
/// When the engine closes and the transcript is complete a final
/// `closed` event is sent before the stream ends. A viewer that was
/// dropped for lagging just sees the stream end and may reconnect.
pub fn subscription_events(
    subscription: Subscription,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static> {
    Sse::new(event_stream(subscription))
        .keep_alive(KeepAlive::new().interval(SSE_KEEP_ALIVE).text("ping"))
}

fn event_stream(
    mut subscription: Subscription,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    async_stream::stream! {
        while let Some(line) = subscription.next_line().await {
            match ViewerFrame::line(&line).to_json() {
                Ok(json) => {
                    yield Ok(Event::default()
                        .event("line")
                        .id(line.sequence.to_string())
                        .data(json));
                }
                Err(e) => warn!(sequence = line.sequence, error = %e, "failed to serialize line"),
            }
        }

        let end = subscription.end_reason();
        debug!(subscriber = %subscription.id(), ?end, "SSE feed ended");
        if end == StreamEnd::Completed {
            if let Ok(json) = ViewerFrame::Closed.to_json() {
                yield Ok(Event::default().event("closed").data(json));
            }
        }
    }
}
