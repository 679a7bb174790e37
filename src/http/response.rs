//! Response shaping for relay outcomes.
//!
//! # Responsibilities
//! - Render relay failures as `{"error": {"code", "message", "status"}}`
//! - Render the broker status document
//!
//! # Design Decisions
//! - Executor payloads are returned verbatim as JSON with status 200
//! - Error status strings follow the Google API convention
//!   (UNAVAILABLE, DEADLINE_EXCEEDED, INTERNAL_ERROR, INVALID_ARGUMENT)

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::relay::RelayError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: u16,
    pub message: String,
    pub status: &'static str,
}

impl From<&RelayError> for ErrorBody {
    fn from(err: &RelayError) -> Self {
        Self {
            error: ErrorDetail {
                code: err.status().as_u16(),
                message: err.to_string(),
                status: err.code_name(),
            },
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (self.status(), Json(ErrorBody::from(&self))).into_response()
    }
}

/// Body of `GET /`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusDocument {
    pub status: &'static str,
    pub executor_connected: bool,
    pub pending_tasks: usize,
}
