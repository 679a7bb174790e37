//! Ingress adapter: turns an HTTP call into a pending relayed request.
//!
//! # Data Flow
//! ```text
//! handle(path, body)
//!     → channel.current()        NoExecutor if none, nothing registered
//!     → table.register(pending)
//!     → arm deadline timer       removes + completes with Timeout on expiry
//!     → connection.send(frame)   rollback + SendFailure on error
//!     → await own responder      completed by exactly one resolver
//! ```

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

use crate::observability::metrics;
use crate::relay::channel::ExecutorChannel;
use crate::relay::error::RelayError;
use crate::relay::message::OutboundFrame;
use crate::relay::table::{CorrelationId, CorrelationTable, PendingRequest, RelayResult, Responder};

/// A request handed to the executor, waiting for its single resolution.
#[derive(Debug)]
pub struct PendingReply {
    id: CorrelationId,
    reply: oneshot::Receiver<RelayResult>,
}

impl PendingReply {
    pub fn id(&self) -> &CorrelationId {
        &self.id
    }

    /// Wait for whichever resolver wins (reply, deadline or disconnect).
    pub async fn wait(self) -> RelayResult {
        // a dropped responder means the entry vanished without resolution,
        // which only happens when the broker is tearing down
        self.reply.await.unwrap_or(Err(RelayError::Disconnect))
    }
}

pub struct Ingress {
    table: Arc<CorrelationTable>,
    channel: Arc<ExecutorChannel>,
    request_timeout: Duration,
}

impl Ingress {
    pub fn new(table: Arc<CorrelationTable>, channel: Arc<ExecutorChannel>, request_timeout: Duration) -> Self {
        Self {
            table,
            channel,
            request_timeout,
        }
    }

    /// Relay one request and wait for its outcome.
    pub async fn handle(&self, path: &str, body: &Value) -> RelayResult {
        match self.submit(path, body) {
            Ok(pending) => pending.wait().await,
            Err(e) => {
                metrics::record_rejected(e.outcome_label());
                Err(e)
            }
        }
    }

    /// Register and send a request without waiting for the reply.
    ///
    /// Fails synchronously when no executor is connected or the frame
    /// cannot be queued; in both cases nothing stays in the table.
    pub fn submit(&self, path: &str, body: &Value) -> Result<PendingReply, RelayError> {
        let connection = self.channel.current().ok_or(RelayError::NoExecutor)?;

        let id = CorrelationId::generate();
        let frame = OutboundFrame { id: &id, path, body }.encode()?;

        let (responder, reply) = Responder::channel();
        let pending = PendingRequest::new(id.clone(), connection.id(), path.to_string(), responder);
        if self.table.register(pending).is_err() {
            return Err(RelayError::SendFailure(format!("correlation id {} already in use", id)));
        }

        self.arm_deadline(&id);

        if let Err(e) = connection.send(frame) {
            tracing::error!(request_id = %id, error = %e, "Failed to forward request to executor");
            if let Some(pending) = self.table.resolve_and_remove(id.as_str()) {
                pending.discard();
            }
            return Err(e);
        }

        tracing::debug!(
            request_id = %id,
            connection_id = %connection.id(),
            path = %path,
            "Request relayed to executor"
        );

        Ok(PendingReply { id, reply })
    }

    fn arm_deadline(&self, id: &CorrelationId) {
        let table = self.table.clone();
        let timeout = self.request_timeout;
        let timer_id = id.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(pending) = table.resolve_and_remove(timer_id.as_str()) {
                tracing::warn!(
                    request_id = %timer_id,
                    path = %pending.path(),
                    timeout_ms = timeout.as_millis() as u64,
                    "Request deadline exceeded"
                );
                pending.complete(Err(RelayError::Timeout));
            }
        });

        if let Err(handle) = self.table.arm_deadline(id.as_str(), timer.abort_handle()) {
            handle.abort();
        }
    }
}
