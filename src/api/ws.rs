//! WebSocket endpoint streaming market events to connected viewers.
//!
//! Fire and forget: no acknowledgement, no replay on reconnect. A client that
//! lags far enough to drop events must re-fetch state from the listing and
//! bid endpoints; the stream is never a source of truth.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use crate::AppState;

/// WebSocket endpoint for live market events
///
/// GET /ws
pub async fn market_events_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_event_stream(socket, state))
}

async fn handle_event_stream(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.events.subscribe();

    tracing::debug!(
        listeners = state.events.listener_count(),
        "Event stream client connected"
    );

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        let payload = match serde_json::to_string(&event) {
                            Ok(json) => json,
                            Err(e) => {
                                tracing::warn!("Failed to serialize market event: {}", e);
                                continue;
                            }
                        };
                        if sender.send(Message::Text(payload.into())).await.is_err() {
                            return;
                        }
                    }
                    // Slow client: skip whatever was dropped, keep streaming
                    Err(RecvError::Lagged(missed)) => {
                        tracing::debug!(missed, "Event stream client lagged");
                    }
                    Err(RecvError::Closed) => {
                        return;
                    }
                }
            }

            // Handle incoming messages (for ping/pong or close)
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        return;
                    }
                    _ => {}
                }
            }
        }
    }
}
