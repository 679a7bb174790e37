//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Caller connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (relayed path, JSON body)
//!     → relay ingress (register, send, await)
//!     → response.rs (payload or structured error)
//!     → Send to caller
//!
//! Executor connection
//!     → websocket.rs (upgrade, frame limits, socket pump)
//!     → relay channel
//! ```

pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use server::{AppState, HttpServer};
