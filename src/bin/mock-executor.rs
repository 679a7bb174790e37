//! Reference executor for demos and manual testing.
//!
//! Connects to the broker's executor endpoint, echoes every task back as
//! `{"path", "body"}` (or fails it when the body contains `"fail": true`),
//! and reconnects after a fixed delay whenever the connection drops.

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mock-executor")]
#[command(about = "Echo executor that connects to a relay broker", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "ws://localhost:3000/ws")]
    url: String,

    /// Delay before reconnecting after a dropped connection.
    #[arg(long, default_value_t = 3000)]
    reconnect_delay_ms: u64,

    /// Simulated work time per task.
    #[arg(long, default_value_t = 0)]
    work_delay_ms: u64,
}

#[derive(Debug, Deserialize)]
struct Task {
    id: String,
    path: String,
    #[serde(default)]
    body: Value,
}

#[derive(Debug, Serialize)]
struct Reply {
    id: String,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Reply {
    fn for_task(task: Task) -> Self {
        if task.body.get("fail").and_then(Value::as_bool) == Some(true) {
            return Self {
                id: task.id,
                success: false,
                payload: None,
                error: Some(format!("task for {} failed on request", task.path)),
            };
        }
        Self {
            id: task.id,
            success: true,
            payload: Some(json!({ "path": task.path, "body": task.body })),
            error: None,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mock_executor=info")),
        )
        .init();

    let args = Args::parse();
    let reconnect_delay = Duration::from_millis(args.reconnect_delay_ms);

    loop {
        match run_session(&args).await {
            Ok(()) => tracing::info!("Connection closed by broker"),
            Err(e) => tracing::warn!(error = %e, "Connection failed"),
        }
        tracing::info!(delay_ms = args.reconnect_delay_ms, "Reconnecting");
        tokio::time::sleep(reconnect_delay).await;
    }
}

async fn run_session(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let (ws, _) = connect_async(args.url.as_str()).await?;
    tracing::info!(url = %args.url, "Connected to broker");

    let (mut sink, mut stream) = ws.split();
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<String>();
    let work_delay = Duration::from_millis(args.work_delay_ms);

    loop {
        tokio::select! {
            Some(reply) = reply_rx.recv() => {
                sink.send(Message::Text(reply.into())).await?;
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => spawn_task(text.as_str(), &reply_tx, work_delay),
                Some(Ok(Message::Close(_))) | None => return Ok(()),
                // ping/pong is answered by the codec
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }
}

fn spawn_task(text: &str, replies: &mpsc::UnboundedSender<String>, work_delay: Duration) {
    if text.trim().eq_ignore_ascii_case("ping") {
        return;
    }
    let task: Task = match serde_json::from_str(text) {
        Ok(task) => task,
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring unrecognised message");
            return;
        }
    };

    tracing::info!(id = %task.id, path = %task.path, "Processing task");
    let replies = replies.clone();
    tokio::spawn(async move {
        if !work_delay.is_zero() {
            tokio::time::sleep(work_delay).await;
        }
        let reply = Reply::for_task(task);
        match serde_json::to_string(&reply) {
            Ok(text) => {
                let _ = replies.send(text);
            }
            Err(e) => tracing::error!(error = %e, "Failed to encode reply"),
        }
    });
}
