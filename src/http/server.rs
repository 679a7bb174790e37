//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, body limit, request ID, CORS)
//! - Start the dispatch loop and liveness monitor beside the server
//! - Relay caller requests through the ingress adapter

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::BrokerConfig;
use crate::http::request::{decode_body, relayed_path};
use crate::http::response::StatusDocument;
use crate::http::websocket::executor_upgrade;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::relay::{ChannelEvents, CorrelationTable, Dispatcher, ExecutorChannel, Ingress, LivenessMonitor};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub ingress: Arc<Ingress>,
    pub table: Arc<CorrelationTable>,
    pub channel: Arc<ExecutorChannel>,
    pub max_frame_bytes: usize,
    pub shutdown: Shutdown,
}

/// HTTP server for the relay broker.
pub struct HttpServer {
    router: Router,
    config: BrokerConfig,
    state: AppState,
    events: ChannelEvents,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: BrokerConfig, shutdown: Shutdown) -> Self {
        let table = Arc::new(CorrelationTable::new());
        let (channel, events) = ExecutorChannel::new();
        let channel = Arc::new(channel);
        let ingress = Arc::new(Ingress::new(
            table.clone(),
            channel.clone(),
            config.relay.request_timeout(),
        ));

        let state = AppState {
            ingress,
            table,
            channel,
            max_frame_bytes: config.relay.max_frame_bytes,
            shutdown,
        };

        let router = Self::build_router(&config, state.clone());
        Self {
            router,
            config,
            state,
            events,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &BrokerConfig, state: AppState) -> Router {
        let relay_route = format!("{}/{{*rest}}", config.relay.route_prefix.trim_end_matches('/'));

        let router = Router::new()
            .route("/", get(status_handler))
            .route(&relay_route, post(relay_handler))
            .route(&config.relay.executor_path, get(executor_upgrade))
            .with_state(state)
            .layer(DefaultBodyLimit::max(config.relay.max_body_bytes))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

        if config.http.cors_enabled {
            router.layer(CorsLayer::permissive())
        } else {
            router
        }
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Returns after the shutdown signal once in-flight requests have been
    /// answered.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            executor_path = %self.config.relay.executor_path,
            route_prefix = %self.config.relay.route_prefix,
            "HTTP server starting"
        );

        let shutdown = self.state.shutdown.clone();

        let dispatcher = Dispatcher::new(self.state.table.clone(), self.state.channel.clone());
        let dispatch_task = tokio::spawn(dispatcher.run(self.events, shutdown.subscribe()));

        let monitor = LivenessMonitor::new(
            self.state.table.clone(),
            self.state.channel.clone(),
            self.config.relay.probe_interval(),
        );
        tokio::spawn(monitor.run(shutdown.subscribe()));

        let mut server_shutdown = shutdown.subscribe();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = server_shutdown.recv().await;
            })
            .await?;

        if let Err(e) = dispatch_task.await {
            tracing::error!(error = %e, "Dispatch loop task failed");
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Clone of the router, for serving in tests without a listener.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn table(&self) -> Arc<CorrelationTable> {
        self.state.table.clone()
    }

    pub fn channel(&self) -> Arc<ExecutorChannel> {
        self.state.channel.clone()
    }
}

/// `GET /`: broker status.
async fn status_handler(State(state): State<AppState>) -> Json<StatusDocument> {
    Json(StatusDocument {
        status: "running",
        executor_connected: state.channel.is_connected(),
        pending_tasks: state.table.size(),
    })
}

/// `POST {route_prefix}/*`: relay to the executor and wait for the outcome.
async fn relay_handler(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = relayed_path(&uri);
    let body = match decode_body(&headers, &body) {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(path = %path, error = %e, "Rejecting request with invalid body");
            metrics::record_rejected(e.outcome_label());
            return e.into_response();
        }
    };

    match state.ingress.handle(&path, &body).await {
        Ok(payload) => Json(payload).into_response(),
        Err(e) => e.into_response(),
    }
}
