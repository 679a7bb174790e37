//! Relay Broker
//!
//! Accepts HTTP calls from many callers and relays each one over a single
//! persistent WebSocket to one remote executor, routing the asynchronous
//! reply back to the caller that sent the request.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌──────────────────────────────────────────────────────┐
//!                       │                    RELAY BROKER                      │
//!                       │                                                      │
//!   HTTP Caller         │  ┌─────────┐    ┌──────────┐    ┌─────────────┐      │
//!   ────────────────────┼─▶│  http   │───▶│ ingress  │───▶│ correlation │      │
//!                       │  │ server  │    │ adapter  │    │    table    │      │
//!                       │  └─────────┘    └────┬─────┘    └──────▲──────┘      │
//!                       │                      │ send            │ resolve     │
//!                       │                      ▼                 │             │
//!                       │               ┌──────────────┐   ┌─────┴──────┐      │
//!                       │               │   executor   │──▶│  dispatch  │      │
//!                       │               │   channel    │   │    loop    │      │
//!                       │               └──────┬───────┘   └────────────┘      │
//!                       │                      │  ▲                            │
//!                       │               ┌──────┴──┴────┐                       │
//!                       │               │   liveness   │                       │
//!                       │               │   monitor    │                       │
//!                       │               └──────────────┘                       │
//!                       └──────────────────────┬───────────────────────────────┘
//!                                              │ WebSocket (/ws)
//!                                              ▼
//!                                       Remote Executor
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use relay_broker::config::{self, BrokerConfig};
use relay_broker::lifecycle::{signals, Shutdown};
use relay_broker::observability::{logging, metrics};
use relay_broker::HttpServer;

#[derive(Parser, Debug)]
#[command(name = "relay-broker", version)]
#[command(about = "Relays HTTP requests to a single remote executor over WebSocket", long_about = None)]
struct Args {
    /// TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listening port (overrides the config file and PORT).
    #[arg(short, long)]
    port: Option<u16>,

    /// Deadline for a relayed request, in seconds.
    #[arg(long)]
    request_timeout_secs: Option<u64>,

    /// Liveness probe period, in seconds.
    #[arg(long)]
    probe_interval_secs: Option<u64>,

    /// Maximum executor message size in bytes.
    #[arg(long)]
    max_frame_bytes: Option<usize>,
}

impl Args {
    fn apply(&self, config: &mut BrokerConfig) {
        if let Some(port) = self.port {
            config.listener.set_port(port);
        }
        if let Some(secs) = self.request_timeout_secs {
            config.relay.request_timeout_secs = secs;
        }
        if let Some(secs) = self.probe_interval_secs {
            config.relay.probe_interval_secs = secs;
        }
        if let Some(bytes) = self.max_frame_bytes {
            config.relay.max_frame_bytes = bytes;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => config::load_config(path)?,
        None => {
            let mut config = BrokerConfig::default();
            config::loader::apply_env_overrides(&mut config);
            config
        }
    };
    args.apply(&mut config);
    config::validate_config(&config).map_err(config::ConfigError::Validation)?;

    logging::init_logging(&config.observability);

    tracing::info!("relay-broker v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.relay.request_timeout_secs,
        probe_interval_secs = config.relay.probe_interval_secs,
        max_frame_bytes = config.relay.max_frame_bytes,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let server = HttpServer::new(config, shutdown);
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
