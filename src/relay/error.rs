//! Relay outcomes and their HTTP mapping.

use axum::http::StatusCode;
use thiserror::Error;

/// Every way a relayed request can end without a payload.
///
/// `MalformedMessage` is only ever logged by the dispatch loop; all other
/// variants reach exactly one HTTP caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    /// No executor connection was installed when the request arrived.
    #[error("Service Unavailable: No executor connected")]
    NoExecutor,

    /// The request deadline fired before any reply.
    #[error("Gateway Timeout")]
    Timeout,

    /// The executor answered with `success: false`.
    #[error("{0}")]
    UpstreamFailure(String),

    /// The executor connection dropped while the request was pending.
    #[error("Execution node disconnected.")]
    Disconnect,

    /// The relay message could not be handed to the executor transport.
    #[error("Failed to forward request to executor: {0}")]
    SendFailure(String),

    /// An inbound frame that is neither a probe marker nor a reply.
    #[error("Malformed executor message: {0}")]
    MalformedMessage(String),

    /// The HTTP body is not valid JSON.
    #[error("Invalid JSON payload: {0}")]
    InvalidBody(String),
}

impl RelayError {
    /// HTTP status reported to the caller.
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::NoExecutor | RelayError::Disconnect | RelayError::SendFailure(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            RelayError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            RelayError::UpstreamFailure(_) | RelayError::MalformedMessage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            RelayError::InvalidBody(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Machine-readable status name carried in the error body.
    pub fn code_name(&self) -> &'static str {
        match self {
            RelayError::NoExecutor | RelayError::Disconnect | RelayError::SendFailure(_) => {
                "UNAVAILABLE"
            }
            RelayError::Timeout => "DEADLINE_EXCEEDED",
            RelayError::UpstreamFailure(_) | RelayError::MalformedMessage(_) => "INTERNAL_ERROR",
            RelayError::InvalidBody(_) => "INVALID_ARGUMENT",
        }
    }

    /// Label used for the `relay_requests_total` outcome dimension.
    pub fn outcome_label(&self) -> &'static str {
        match self {
            RelayError::NoExecutor => "no_executor",
            RelayError::Timeout => "timeout",
            RelayError::UpstreamFailure(_) => "upstream_error",
            RelayError::Disconnect => "disconnected",
            RelayError::SendFailure(_) => "send_failure",
            RelayError::MalformedMessage(_) => "malformed",
            RelayError::InvalidBody(_) => "invalid_body",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(RelayError::NoExecutor.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(RelayError::Disconnect.code_name(), "UNAVAILABLE");
        assert_eq!(RelayError::Timeout.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(RelayError::Timeout.code_name(), "DEADLINE_EXCEEDED");

        let upstream = RelayError::UpstreamFailure("quota exhausted".into());
        assert_eq!(upstream.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(upstream.code_name(), "INTERNAL_ERROR");
        assert_eq!(upstream.to_string(), "quota exhausted");
    }
}
