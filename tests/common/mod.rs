//! Shared utilities for integration testing: a broker on a fixed port and a
//! simulated executor speaking the relay protocol over WebSocket.

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use relay_broker::config::BrokerConfig;
use relay_broker::lifecycle::Shutdown;
use relay_broker::relay::{CorrelationTable, ExecutorChannel};
use relay_broker::HttpServer;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

pub type ExecutorSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A running broker plus handles into its shared state.
pub struct TestBroker {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub table: Arc<CorrelationTable>,
    pub channel: Arc<ExecutorChannel>,
}

impl TestBroker {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn executor_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

impl Drop for TestBroker {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start a broker on `addr`, letting the test adjust the defaults first.
pub async fn start_broker(addr: SocketAddr, configure: impl FnOnce(&mut BrokerConfig)) -> TestBroker {
    let mut config = BrokerConfig::default();
    config.listener.bind_address = addr.to_string();
    configure(&mut config);

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, shutdown.clone());
    let table = server.table();
    let channel = server.channel();

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    tokio::spawn(async move {
        let _ = server.run(listener).await;
    });

    TestBroker {
        addr,
        shutdown,
        table,
        channel,
    }
}

/// HTTP client without pooling so each test sees fresh connections.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn wait_until(condition: impl FnMut() -> bool) {
    wait_for(Duration::from_secs(2), condition).await;
}

/// Poll `condition` until it holds or `limit` passes.
pub async fn wait_for(limit: Duration, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + limit;
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Connect a simulated executor and wait for the broker to install it.
pub async fn connect_executor(broker: &TestBroker) -> ExecutorSocket {
    let before = broker.channel.current().map(|c| c.id());
    let (socket, _) = connect_async(broker.executor_url()).await.unwrap();
    let channel = broker.channel.clone();
    wait_until(move || {
        let now = channel.current().map(|c| c.id());
        now.is_some() && now != before
    })
    .await;
    socket
}

/// Next relayed task, skipping control frames and text heartbeats.
pub async fn next_task(socket: &mut ExecutorSocket) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("no task within 5s")
            .expect("executor socket closed")
            .expect("executor socket error");
        if let Message::Text(text) = frame {
            if text.as_str().trim().eq_ignore_ascii_case("ping") {
                continue;
            }
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

pub async fn send_reply(socket: &mut ExecutorSocket, reply: Value) {
    socket.send(Message::Text(reply.to_string().into())).await.unwrap();
}

pub async fn reply_success(socket: &mut ExecutorSocket, id: &Value, payload: Value) {
    send_reply(socket, json!({"id": id, "success": true, "payload": payload})).await;
}

/// Spawn an executor that answers every task with `handler(path, body)`.
pub async fn spawn_executor<F>(broker: &TestBroker, handler: F) -> tokio::task::JoinHandle<()>
where
    F: Fn(&str, &Value) -> Value + Send + 'static,
{
    let mut socket = connect_executor(broker).await;
    tokio::spawn(async move {
        while let Some(Ok(frame)) = socket.next().await {
            let Message::Text(text) = frame else { continue };
            let Ok(task) = serde_json::from_str::<Value>(text.as_str()) else {
                continue;
            };
            let path = task["path"].as_str().unwrap_or_default();
            let reply = json!({
                "id": task["id"],
                "success": true,
                "payload": handler(path, &task["body"]),
            });
            if socket.send(Message::Text(reply.to_string().into())).await.is_err() {
                break;
            }
        }
    })
}
