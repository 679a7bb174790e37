//! Inbound request decoding.
//!
//! # Responsibilities
//! - Derive the relayed path (request path plus query string)
//! - Decode the body handed to the executor (JSON, or form fields as an object)
//!
//! # Design Decisions
//! - An empty body relays `null` rather than failing
//! - Any content type other than form-urlencoded is parsed as JSON
//! - Repeated form keys collect into an array
//! - Body decoding happens before any correlation entry exists

use axum::http::{header, HeaderMap, Uri};
use serde_json::{Map, Value};

use crate::relay::RelayError;

/// Path forwarded to the executor, including the query string.
pub fn relayed_path(uri: &Uri) -> String {
    uri.path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string())
}

/// Decode an HTTP body into the JSON value relayed to the executor.
pub fn decode_body(headers: &HeaderMap, bytes: &[u8]) -> Result<Value, RelayError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    if is_form(headers) {
        return Ok(decode_form(bytes));
    }
    serde_json::from_slice(bytes).map_err(|e| RelayError::InvalidBody(e.to_string()))
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/x-www-form-urlencoded"))
}

fn decode_form(bytes: &[u8]) -> Value {
    let mut fields = Map::new();
    for (key, value) in url::form_urlencoded::parse(bytes) {
        let value = Value::String(value.into_owned());
        match fields.get_mut(&*key) {
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                fields.insert(key.into_owned(), value);
            }
        }
    }
    Value::Object(fields)
}
