//! WebSocket transport endpoint
//!
//! One duplex connection per client. Inbound frames are either JSON control
//! commands or raw compressed audio; outbound events all flow through a
//! single writer task so the client sees them in emission order. Closing
//! the socket stops the pipeline exactly as an explicit stop would.

use super::state::AppState;
use crate::session::{SessionEvent, TranscribePipeline};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Outbound events buffered per connection before backpressure reaches the
/// decode loop.
const EVENT_BUFFER: usize = 64;

#[derive(Debug, Deserialize)]
struct ClientCommand {
    command: String,
}

pub async fn ws_handler(
    State(state): State<AppState>,
    upgrade: WebSocketUpgrade,
) -> impl IntoResponse {
    upgrade.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: AppState, socket: WebSocket) {
    let (mut sink, mut stream) = socket.split();
    let (events_tx, mut events_rx) = mpsc::channel::<SessionEvent>(EVENT_BUFFER);

    // Single writer per connection; event order is emission order.
    let send_task = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            let payload = match serde_json::to_string(&event) {
                Ok(payload) => payload,
                Err(e) => {
                    error!("Failed to serialize event: {}", e);
                    continue;
                }
            };
            if sink.send(Message::Text(payload)).await.is_err() {
                break;
            }
        }
    });

    let pipeline = TranscribePipeline::new(
        Arc::clone(&state.store),
        Arc::clone(&state.engine),
        state.config.transcode.clone(),
        events_tx.clone(),
    );

    let _ = events_tx.send(SessionEvent::info("connected")).await;

    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => {
                // Malformed control frames are ignored on purpose.
                let Ok(cmd) = serde_json::from_str::<ClientCommand>(&text) else {
                    continue;
                };
                dispatch_command(&pipeline, &events_tx, &cmd.command).await;
            }
            Message::Binary(bytes) => {
                // Audio with no running pipeline surfaces as an error event
                // so the client can tell "ignored" from "accepted".
                if let Err(e) = pipeline.feed_audio(&bytes).await {
                    let _ = events_tx.send(SessionEvent::error(e.to_string())).await;
                }
            }
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    // Disconnect stops the pipeline whether or not the client asked to.
    if let Err(e) = pipeline.stop().await {
        error!("Stop on disconnect failed: {}", e);
    }

    // Both senders must drop before the writer drains and exits.
    drop(pipeline);
    drop(events_tx);
    let _ = send_task.await;

    info!("Connection closed");
}

async fn dispatch_command(
    pipeline: &TranscribePipeline,
    events: &mpsc::Sender<SessionEvent>,
    command: &str,
) {
    match command {
        "start" => match pipeline.start().await {
            Ok(_) => {
                let _ = events.send(SessionEvent::info("pipeline started")).await;
            }
            Err(e) => {
                let _ = events
                    .send(SessionEvent::error(format!("start failed: {}", e)))
                    .await;
            }
        },
        "stop" => match pipeline.stop().await {
            Ok(_) => {
                let _ = events.send(SessionEvent::info("pipeline stopped")).await;
            }
            Err(e) => {
                let _ = events
                    .send(SessionEvent::error(format!("stop failed: {}", e)))
                    .await;
            }
        },
        other => {
            warn!("Unknown command '{}'", other);
        }
    }
}
