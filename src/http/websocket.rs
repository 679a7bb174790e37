//! Executor WebSocket endpoint.
//!
//! # Responsibilities
//! - Complete the executor's upgrade handshake with frame size limits
//! - Install the connection as the authoritative executor
//! - Pump outbound commands to the socket and inbound frames to the channel
//!
//! # Data Flow
//! ```text
//! ExecutorChannel ── Outbound (frame / probe / terminate) ──→ socket ──→ Executor
//! ExecutorChannel ←── deliver / report_disconnect ─────────── socket ←── Executor
//! ```
//!
//! # Design Decisions
//! - One task per connection owns the socket; no split halves
//! - Oversized messages are rejected by the WebSocket codec, which fails the
//!   connection instead of corrupting framing
//! - Ping/pong control frames are the liveness probe; any inbound frame
//!   counts as an acknowledgment
//! - Terminate drops the socket without a close handshake

use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::http::server::AppState;
use crate::relay::{DisconnectReason, ExecutorChannel, ExecutorConnection, Outbound};

/// Upgrade handler mounted on the executor path.
pub async fn executor_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let channel = state.channel.clone();
    let shutdown = state.shutdown.subscribe();

    ws.max_message_size(state.max_frame_bytes)
        .max_frame_size(state.max_frame_bytes)
        .on_failed_upgrade(|e| tracing::warn!(error = %e, "Executor WebSocket upgrade failed"))
        .on_upgrade(move |socket| serve_executor(socket, channel, shutdown))
}

/// Drive one executor connection until it closes, fails or is terminated.
pub async fn serve_executor(
    mut socket: WebSocket,
    channel: Arc<ExecutorChannel>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let (connection, mut outbound) = ExecutorConnection::open();
    let id = connection.id();
    channel.accept(connection.clone());

    let reason = loop {
        tokio::select! {
            command = outbound.recv() => {
                // `connection` keeps a sender alive, so the queue never closes here
                let Some(command) = command else {
                    break DisconnectReason::Closed;
                };
                let message = match command {
                    Outbound::Frame(text) => Message::Text(text.into()),
                    Outbound::Probe => Message::Ping(Bytes::new()),
                    Outbound::Terminate => break DisconnectReason::Terminated,
                };
                if let Err(e) = socket.send(message).await {
                    break DisconnectReason::Error(e.to_string());
                }
            }
            frame = socket.recv() => {
                let message = match frame {
                    Some(Ok(message)) => message,
                    Some(Err(e)) => break DisconnectReason::Error(e.to_string()),
                    None => break DisconnectReason::Closed,
                };
                connection.mark_alive();
                match message {
                    Message::Text(text) => channel.deliver(id, text.as_str().to_owned()),
                    Message::Binary(bytes) => match String::from_utf8(bytes.to_vec()) {
                        Ok(text) => channel.deliver(id, text),
                        Err(_) => tracing::warn!(
                            connection_id = %id,
                            frame_bytes = bytes.len(),
                            "Ignoring non UTF-8 binary frame from executor"
                        ),
                    },
                    Message::Close(_) => break DisconnectReason::Closed,
                    Message::Ping(_) | Message::Pong(_) => {}
                }
            }
            _ = shutdown.recv() => break DisconnectReason::Shutdown,
        }
    };

    if let DisconnectReason::Error(e) = &reason {
        tracing::error!(connection_id = %id, error = %e, "Executor WebSocket error");
    }
    // later sends fail fast instead of queueing for a dead socket
    drop(outbound);
    channel.report_disconnect(id, reason);
}
