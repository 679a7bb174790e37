//! HTTP-to-executor relay broker library.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod relay;

pub use config::BrokerConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
