//! Executor channel: the single authoritative executor connection.
//!
//! # Responsibilities
//! - Hold at most one authoritative connection handle
//! - Route outbound relay frames and probes to the transport task
//! - Publish inbound transport events to the dispatch loop
//!
//! # Data Flow
//! ```text
//! transport task (http/websocket.rs)
//!     → accept(connection)            install / replace
//!     → deliver(id, text)             ┐
//!     → report_disconnect(id, reason) ┴→ ChannelEvents → dispatch loop
//!
//! ingress / liveness
//!     → send(frame) / probe() / terminate()
//!     → Outbound command queue → transport task
//! ```
//!
//! # Design Decisions
//! - The current-connection reference is private; it changes only through
//!   `accept` and `release`
//! - A replaced connection is abandoned, not closed
//! - Each connection carries its own liveness flag, set by any inbound frame

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;

use crate::observability::metrics;
use crate::relay::error::RelayError;

/// Global atomic counter for connection IDs.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for an executor connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "executor-{}", self.0)
    }
}

/// Command for the transport task that owns the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// A serialized relay message.
    Frame(String),
    /// A liveness probe (WebSocket ping).
    Probe,
    /// Drop the socket without a close handshake.
    Terminate,
}

/// Why a transport task stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The peer closed the connection or the stream ended.
    Closed,
    /// The liveness monitor terminated the connection.
    Terminated,
    /// Read or write failure, including oversized frames.
    Error(String),
    /// The broker is shutting down.
    Shutdown,
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisconnectReason::Closed => f.write_str("closed by peer"),
            DisconnectReason::Terminated => f.write_str("terminated after failed probe"),
            DisconnectReason::Error(e) => write!(f, "transport error: {}", e),
            DisconnectReason::Shutdown => f.write_str("broker shutdown"),
        }
    }
}

/// Inbound event consumed by the dispatch loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Message {
        connection: ConnectionId,
        text: String,
    },
    Disconnected {
        connection: ConnectionId,
        reason: DisconnectReason,
    },
}

/// Receiving end of the channel's event stream.
pub type ChannelEvents = mpsc::UnboundedReceiver<ChannelEvent>;

/// Handle to one executor connection. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ExecutorConnection {
    id: ConnectionId,
    outbound: mpsc::UnboundedSender<Outbound>,
    alive: Arc<AtomicBool>,
}

impl ExecutorConnection {
    /// Create a handle plus the command queue its transport task drains.
    pub fn open() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        let connection = Self {
            id: ConnectionId::new(),
            outbound,
            alive: Arc::new(AtomicBool::new(true)),
        };
        (connection, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a relay frame. Fails once the transport task has stopped.
    pub fn send(&self, frame: String) -> Result<(), RelayError> {
        self.outbound
            .send(Outbound::Frame(frame))
            .map_err(|_| RelayError::SendFailure(format!("{} is closed", self.id)))
    }

    /// Queue a liveness probe. Returns false if the transport is gone.
    pub fn probe(&self) -> bool {
        self.outbound.send(Outbound::Probe).is_ok()
    }

    /// Ask the transport to drop the socket.
    pub fn terminate(&self) -> bool {
        self.outbound.send(Outbound::Terminate).is_ok()
    }

    /// Record inbound traffic of any kind.
    pub fn mark_alive(&self) {
        self.alive.store(true, Ordering::SeqCst);
    }

    /// Clear the flag before issuing a probe.
    pub fn clear_alive(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

/// Owner of the authoritative executor connection.
#[derive(Debug)]
pub struct ExecutorChannel {
    current: RwLock<Option<ExecutorConnection>>,
    events: mpsc::UnboundedSender<ChannelEvent>,
}

impl ExecutorChannel {
    /// Create an empty channel and the event stream for the dispatch loop.
    pub fn new() -> (Self, ChannelEvents) {
        let (events, rx) = mpsc::unbounded_channel();
        (
            Self {
                current: RwLock::new(None),
                events,
            },
            rx,
        )
    }

    /// The authoritative connection, if any.
    pub fn current(&self) -> Option<ExecutorConnection> {
        self.current
            .read()
            .expect("executor channel lock poisoned")
            .clone()
    }

    pub fn is_connected(&self) -> bool {
        self.current
            .read()
            .expect("executor channel lock poisoned")
            .is_some()
    }

    /// Install a new authoritative connection.
    ///
    /// Returns the id of the replaced connection, which is left open.
    pub fn accept(&self, connection: ExecutorConnection) -> Option<ConnectionId> {
        let id = connection.id();
        let previous = self
            .current
            .write()
            .expect("executor channel lock poisoned")
            .replace(connection)
            .map(|old| old.id());

        match previous {
            Some(old) => tracing::warn!(
                connection_id = %id,
                replaced = %old,
                "Executor connected, replacing previous connection"
            ),
            None => tracing::info!(connection_id = %id, "Executor connected"),
        }
        metrics::record_executor_connected(true);
        previous
    }

    /// Clear the reference if `connection` is still authoritative.
    pub fn release(&self, connection: ConnectionId) -> bool {
        self.release_with(connection, || ()).is_some()
    }

    /// Clear the reference if `connection` is still authoritative and run
    /// `cleanup` before any other connection can be accepted.
    ///
    /// Returns `None`, without running `cleanup`, when `connection` was
    /// already replaced.
    pub fn release_with<T>(&self, connection: ConnectionId, cleanup: impl FnOnce() -> T) -> Option<T> {
        let mut current = self.current.write().expect("executor channel lock poisoned");
        if current.as_ref().map(ExecutorConnection::id) != Some(connection) {
            return None;
        }
        *current = None;
        metrics::record_executor_connected(false);
        Some(cleanup())
    }

    /// Send a relay frame over the authoritative connection.
    pub fn send(&self, frame: String) -> Result<ConnectionId, RelayError> {
        let connection = self.current().ok_or(RelayError::NoExecutor)?;
        connection.send(frame)?;
        Ok(connection.id())
    }

    /// Probe the authoritative connection. Returns false if none is installed.
    pub fn probe(&self) -> bool {
        self.current().is_some_and(|connection| connection.probe())
    }

    /// Publish an inbound frame for the dispatch loop.
    pub fn deliver(&self, connection: ConnectionId, text: String) {
        if self
            .events
            .send(ChannelEvent::Message { connection, text })
            .is_err()
        {
            tracing::debug!(connection_id = %connection, "Dispatch loop stopped, dropping frame");
        }
    }

    /// Publish the end of a transport task.
    pub fn report_disconnect(&self, connection: ConnectionId, reason: DisconnectReason) {
        if self
            .events
            .send(ChannelEvent::Disconnected { connection, reason })
            .is_err()
        {
            tracing::debug!(connection_id = %connection, "Dispatch loop stopped, dropping disconnect");
        }
    }
}
