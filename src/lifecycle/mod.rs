//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Fail pending relays → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Background tasks (dispatch loop, liveness monitor) stop on the same broadcast
//! - Pending relays fail as Disconnect rather than hang until their deadlines

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
