//! Correlation table: request id → pending caller.
//!
//! # Responsibilities
//! - Own every in-flight request between send and resolution
//! - Hand each entry to exactly one resolver (reply, deadline, disconnect)
//!
//! # Design Decisions
//! - A single mutex guards the map, so `drain_all` is atomic with respect to
//!   concurrent `register` and `resolve_and_remove`
//! - Removal is the only way to obtain an entry; whoever removes it owns the
//!   responder and every other resolver sees `None`

use serde::Serialize;
use serde_json::Value;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;

use crate::observability::metrics;
use crate::relay::channel::ConnectionId;
use crate::relay::error::RelayError;

/// Result delivered to a waiting caller.
pub type RelayResult = Result<Value, RelayError>;

/// Unique token linking an outbound request to its reply.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generate a fresh random (UUID v4) id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CorrelationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl Borrow<str> for CorrelationId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Completes the reply to one HTTP caller, at most once.
#[derive(Debug)]
pub struct Responder(oneshot::Sender<RelayResult>);

impl Responder {
    /// Create a responder and the receiver the caller waits on.
    pub fn channel() -> (Self, oneshot::Receiver<RelayResult>) {
        let (tx, rx) = oneshot::channel();
        (Self(tx), rx)
    }

    /// Returns false when the caller already went away.
    pub fn send(self, result: RelayResult) -> bool {
        self.0.send(result).is_ok()
    }
}

/// A request that has been sent to the executor and awaits resolution.
#[derive(Debug)]
pub struct PendingRequest {
    id: CorrelationId,
    connection: ConnectionId,
    path: String,
    started: Instant,
    deadline: Option<AbortHandle>,
    responder: Responder,
}

impl PendingRequest {
    pub fn new(id: CorrelationId, connection: ConnectionId, path: String, responder: Responder) -> Self {
        Self {
            id,
            connection,
            path,
            started: Instant::now(),
            deadline: None,
            responder,
        }
    }

    pub fn id(&self) -> &CorrelationId {
        &self.id
    }

    /// Connection the relay message was sent over.
    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Cancel the deadline timer and drop the entry without answering.
    ///
    /// Used to roll back a registration whose relay message never left.
    pub fn discard(self) {
        if let Some(deadline) = &self.deadline {
            deadline.abort();
        }
    }

    /// Cancel the deadline timer and deliver the outcome to the caller.
    ///
    /// Returns false when the caller was no longer waiting.
    pub fn complete(self, result: RelayResult) -> bool {
        if let Some(deadline) = &self.deadline {
            deadline.abort();
        }
        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.outcome_label(),
        };
        metrics::record_relay_outcome(outcome, self.started);
        let delivered = self.responder.send(result);
        if !delivered {
            tracing::debug!(request_id = %self.id, "Caller went away before resolution");
        }
        delivered
    }
}

/// Concurrency-safe map of in-flight requests.
#[derive(Debug, Default)]
pub struct CorrelationTable {
    entries: Mutex<HashMap<CorrelationId, PendingRequest>>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CorrelationId, PendingRequest>> {
        self.entries.lock().expect("correlation table mutex poisoned")
    }

    /// Insert a new entry. An id already present is rejected and the
    /// entry handed back untouched.
    pub fn register(&self, pending: PendingRequest) -> Result<(), PendingRequest> {
        let mut entries = self.lock();
        if entries.contains_key(&pending.id) {
            return Err(pending);
        }
        entries.insert(pending.id.clone(), pending);
        metrics::record_pending(entries.len());
        Ok(())
    }

    /// Attach the deadline timer to a registered entry.
    ///
    /// When the entry is already gone the handle is returned so the caller
    /// can abort the timer.
    pub fn arm_deadline(&self, id: &str, deadline: AbortHandle) -> Result<(), AbortHandle> {
        match self.lock().get_mut(id) {
            Some(pending) => {
                pending.deadline = Some(deadline);
                Ok(())
            }
            None => Err(deadline),
        }
    }

    /// Atomically fetch and remove an entry. `None` means another resolver
    /// already won or the id was never registered.
    pub fn resolve_and_remove(&self, id: &str) -> Option<PendingRequest> {
        let mut entries = self.lock();
        let pending = entries.remove(id);
        if pending.is_some() {
            metrics::record_pending(entries.len());
        }
        pending
    }

    /// Atomically remove and return every entry.
    pub fn drain_all(&self) -> Vec<PendingRequest> {
        let drained: Vec<_> = self.lock().drain().map(|(_, pending)| pending).collect();
        metrics::record_pending(0);
        drained
    }

    /// Atomically remove and return the entries sent over one connection.
    pub fn drain_connection(&self, connection: ConnectionId) -> Vec<PendingRequest> {
        let mut entries = self.lock();
        let ids: Vec<CorrelationId> = entries
            .values()
            .filter(|pending| pending.connection == connection)
            .map(|pending| pending.id.clone())
            .collect();
        let drained = ids.iter().filter_map(|id| entries.remove(id)).collect();
        metrics::record_pending(entries.len());
        drained
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    pub fn size(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }
}
