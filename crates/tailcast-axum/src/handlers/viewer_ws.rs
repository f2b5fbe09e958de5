//! WebSocket viewer feed.
//!
//! `GET /ws` upgrades to a text WebSocket carrying [`ViewerFrame`] JSON.
//!
//! ## Protocol
//!
//! | Direction | Content |
//! |---|---|
//! | Server → Client | `{"type":"line","sequence":n,"source":"stdout","text":"..."}` |
//! | Server → Client | `{"type":"closed"}` once the command finished |
//! | Client → Server | ignored |
//!
//! ## Lifecycle
//!
//! 1. Join the engine: the replay snapshot is captured and the viewer is
//!    registered in one step, so no line is missed or repeated.
//! 2. Spawn two tasks:
//!    * **Ingest** drains client frames until close or error.
//!    * **Egress** writes snapshot then live lines, each under the
//!      configured send timeout.
//! 3. `tokio::select!` waits for either task, then aborts the other.
//!    Dropping the subscription unregisters the viewer.

use std::time::Duration;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tailcast_runtime::{StreamEnd, Subscription};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::dto::ViewerFrame;
use crate::error::HttpError;
use crate::state::AppState;

/// `GET /ws`
pub async fn viewer_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Result<Response, HttpError> {
    // Join before upgrading so an unavailable engine is a plain HTTP error
    let subscription = state.engine.connect().await?;
    let send_timeout = state.settings.send_timeout();
    Ok(ws
        .on_upgrade(move |socket| handle_viewer(socket, subscription, send_timeout))
        .into_response())
}

async fn handle_viewer(socket: WebSocket, subscription: Subscription, send_timeout: Duration) {
    let id = subscription.id();
    info!(
        subscriber = %id,
        replay = subscription.pending_replay(),
        "viewer connected"
    );

    let (ws_sender, ws_receiver) = socket.split();

    // ── Ingest: client frames are read and discarded ─────────────────

    let mut ingest = tokio::spawn(async move {
        let mut ws_receiver = ws_receiver;
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(Message::Text(text)) => debug!(len = text.len(), "ignoring viewer message"),
                Ok(_) => {}
            }
        }
    });

    // ── Egress: subscription → JSON text frames ──────────────────────

    let mut egress = tokio::spawn(pump(ws_sender, subscription, send_timeout));

    tokio::select! {
        _ = &mut ingest => { egress.abort(); }
        _ = &mut egress => { ingest.abort(); }
    }

    info!(subscriber = %id, "viewer disconnected");
}

async fn pump(
    mut sender: SplitSink<WebSocket, Message>,
    mut subscription: Subscription,
    send_timeout: Duration,
) {
    while let Some(line) = subscription.next_line().await {
        let json = match ViewerFrame::line(&line).to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!(sequence = line.sequence, error = %e, "failed to serialize line");
                continue;
            }
        };
        if !send_frame(&mut sender, json, send_timeout).await {
            debug!(subscriber = %subscription.id(), "viewer write failed, dropping");
            return;
        }
    }

    if subscription.end_reason() == StreamEnd::Completed {
        if let Ok(json) = ViewerFrame::Closed.to_json() {
            send_frame(&mut sender, json, send_timeout).await;
        }
    } else {
        debug!(subscriber = %subscription.id(), "viewer dropped by engine");
    }
    let _ = timeout(send_timeout, sender.send(Message::Close(None))).await;
}

/// Write one text frame. False if the viewer is gone or too slow.
async fn send_frame(
    sender: &mut SplitSink<WebSocket, Message>,
    json: String,
    send_timeout: Duration,
) -> bool {
    match timeout(send_timeout, sender.send(Message::Text(json.into()))).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            debug!(error = %e, "websocket send failed");
            false
        }
        Err(_) => {
            warn!(
                timeout_ms = u64::try_from(send_timeout.as_millis()).unwrap_or(u64::MAX),
                "websocket send timed out"
            );
            false
        }
    }
}
