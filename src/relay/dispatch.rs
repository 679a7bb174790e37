//! Dispatch loop: routes executor replies back to their callers.
//!
//! # Responsibilities
//! - Consume the executor channel's event stream in a single task
//! - Resolve the matching pending request for each reply
//! - Drain and fail pending requests when a connection drops
//!
//! # Design Decisions
//! - Malformed frames are logged and dropped, never fatal
//! - A reply for an unknown id is the normal loser of the reply/deadline
//!   race and is ignored silently
//! - Closing a replaced connection only fails the requests sent over it

use std::sync::Arc;
use tokio::sync::broadcast;

use crate::observability::metrics;
use crate::relay::channel::{ChannelEvent, ChannelEvents, ConnectionId, DisconnectReason, ExecutorChannel};
use crate::relay::error::RelayError;
use crate::relay::message::{is_probe_marker, InboundReply};
use crate::relay::table::{CorrelationTable, PendingRequest};

/// What happened to one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Application-level heartbeat.
    Probe,
    /// Not a reply; dropped.
    Malformed,
    /// Reply for an id that is not pending (late, duplicate or unknown).
    Unmatched,
    /// Reply delivered to its caller.
    Resolved,
}

pub struct Dispatcher {
    table: Arc<CorrelationTable>,
    channel: Arc<ExecutorChannel>,
}

impl Dispatcher {
    pub fn new(table: Arc<CorrelationTable>, channel: Arc<ExecutorChannel>) -> Self {
        Self { table, channel }
    }

    /// Handle one inbound text frame.
    pub fn handle_message(&self, text: &str) -> DispatchOutcome {
        if is_probe_marker(text) {
            return DispatchOutcome::Probe;
        }

        let reply = match InboundReply::parse(text) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, frame_bytes = text.len(), "Ignoring malformed executor message");
                metrics::record_malformed_frame();
                return DispatchOutcome::Malformed;
            }
        };

        let Some(pending) = self.table.resolve_and_remove(&reply.id) else {
            tracing::debug!(request_id = %reply.id, "Reply for unknown or already resolved request");
            return DispatchOutcome::Unmatched;
        };

        let result = reply.into_result();
        match &result {
            Ok(_) => tracing::debug!(request_id = %pending.id(), "Executor reply delivered"),
            Err(e) => tracing::warn!(request_id = %pending.id(), error = %e, "Executor reported failure"),
        }
        pending.complete(result);
        DispatchOutcome::Resolved
    }

    /// Handle the end of a connection. Returns how many requests were failed.
    pub fn handle_disconnect(&self, connection: ConnectionId, reason: &DisconnectReason) -> usize {
        // draining under the channel lock keeps a replacement's requests out of the drain
        let drained = match self.channel.release_with(connection, || self.table.drain_all()) {
            Some(drained) => {
                tracing::warn!(connection_id = %connection, %reason, "Executor disconnected");
                drained
            }
            None => {
                tracing::info!(connection_id = %connection, %reason, "Replaced executor connection closed");
                self.table.drain_connection(connection)
            }
        };

        let failed = drained.len();
        if failed > 0 {
            tracing::warn!(connection_id = %connection, failed, "Failing pending requests after disconnect");
        }
        fail_all(drained);
        failed
    }

    /// Fail everything still pending. Used on broker shutdown.
    pub fn fail_pending(&self) -> usize {
        let drained = self.table.drain_all();
        let failed = drained.len();
        fail_all(drained);
        failed
    }

    pub fn handle_event(&self, event: ChannelEvent) {
        match event {
            ChannelEvent::Message { text, .. } => {
                self.handle_message(&text);
            }
            ChannelEvent::Disconnected { connection, reason } => {
                self.handle_disconnect(connection, &reason);
            }
        }
    }

    /// Consume channel events until shutdown or until every sender is gone.
    pub async fn run(self, mut events: ChannelEvents, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!("Dispatch loop starting");

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
                _ = shutdown.recv() => {
                    tracing::info!("Dispatch loop received shutdown signal, exiting loop");
                    break;
                }
            }
        }

        let failed = self.fail_pending();
        if failed > 0 {
            tracing::warn!(failed, "Failed pending requests on dispatch loop exit");
        }
    }
}

fn fail_all(drained: Vec<PendingRequest>) {
    for pending in drained {
        pending.complete(Err(RelayError::Disconnect));
    }
}
