//! Relay wire format.
//!
//! Outbound (broker → executor): `{"id", "path", "body"}`.
//! Inbound (executor → broker): `{"id", "success", "payload"}` or
//! `{"id", "success": false, "error"}`, plus bare text heartbeats.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::relay::error::RelayError;
use crate::relay::table::CorrelationId;

/// Request forwarded to the executor.
#[derive(Debug, Serialize)]
pub struct OutboundFrame<'a> {
    pub id: &'a CorrelationId,
    pub path: &'a str,
    pub body: &'a Value,
}

impl OutboundFrame<'_> {
    pub fn encode(&self) -> Result<String, RelayError> {
        serde_json::to_string(self).map_err(|e| RelayError::SendFailure(e.to_string()))
    }
}

/// Reply received from the executor.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundReply {
    pub id: String,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub payload: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl InboundReply {
    /// Parse a text frame into a reply.
    pub fn parse(text: &str) -> Result<Self, RelayError> {
        serde_json::from_str(text).map_err(|e| RelayError::MalformedMessage(e.to_string()))
    }

    /// Convert into the caller-facing result.
    pub fn into_result(self) -> Result<Value, RelayError> {
        if self.success {
            return Ok(self.payload.unwrap_or(Value::Null));
        }
        let message = match self.error {
            Some(Value::String(text)) if !text.is_empty() => text,
            Some(Value::Null) | None => "Unknown error".to_string(),
            Some(Value::String(_)) => "Unknown error".to_string(),
            Some(other) => other.to_string(),
        };
        Err(RelayError::UpstreamFailure(message))
    }
}

/// Whether a text frame is an application-level heartbeat (`ping`, `pong`, ...).
pub fn is_probe_marker(text: &str) -> bool {
    let head: String = text
        .trim_start()
        .chars()
        .take(4)
        .flat_map(char::to_lowercase)
        .collect();
    head == "ping" || head == "pong"
}
