//! Relay subsystem: HTTP callers ⇄ single remote executor.
//!
//! # Data Flow
//! ```text
//! HTTP caller
//!     → ingress.rs (allocate id, register, arm deadline, send)
//!     → table.rs (pending until exactly one resolution)
//!     → channel.rs (authoritative executor connection)
//!     ⇢ remote executor ⇢
//!     → channel.rs (event stream)
//!     → dispatch.rs (resolve_and_remove, complete caller)
//!
//! liveness.rs runs beside this flow on a fixed period, reading table
//! occupancy and the connection's liveness flag.
//! ```
//!
//! # Design Decisions
//! - The table's remove-once contract arbitrates every race between reply,
//!   deadline and disconnect
//! - Transport callbacks are replaced by a single event stream consumed by
//!   one dispatch task
//! - No retries: every failure is terminal for its caller

pub mod channel;
pub mod dispatch;
pub mod error;
pub mod ingress;
pub mod liveness;
pub mod message;
pub mod table;

pub use channel::{ChannelEvent, ChannelEvents, ConnectionId, DisconnectReason, ExecutorChannel, ExecutorConnection, Outbound};
pub use dispatch::{DispatchOutcome, Dispatcher};
pub use error::RelayError;
pub use ingress::{Ingress, PendingReply};
pub use liveness::{LivenessMonitor, ProbeOutcome};
pub use table::{CorrelationId, CorrelationTable, PendingRequest, RelayResult, Responder};
