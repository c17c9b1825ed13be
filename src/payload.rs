use serde_json::{Map, Value};

use crate::error::ApiError;

/// Shape of an incoming data payload, decided once at the entry point.
///
/// Collection handlers accept either one record or an ordered sequence of
/// records on the same route; everything downstream branches on this union
/// instead of re-inspecting the raw JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkPayload {
    Single(Map<String, Value>),
    Many(Vec<Value>),
}

impl BulkPayload {
    pub fn is_bulk(&self) -> bool {
        matches!(self, BulkPayload::Many(_))
    }

    /// Number of records carried by the payload
    pub fn len(&self) -> usize {
        match self {
            BulkPayload::Single(_) => 1,
            BulkPayload::Many(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, BulkPayload::Many(items) if items.is_empty())
    }
}

/// Resolve the effective data payload for a request body.
///
/// When `payload_key` is configured and the body is an object carrying that
/// key, the key's value is the payload (wrapped uploads, e.g. CSV rows
/// extracted upstream and posted under a named field). Otherwise the body
/// itself is the payload. An array resolves to `Many`, an object to `Single`,
/// anything else is a client error.
pub fn resolve_payload(body: Value, payload_key: Option<&str>) -> Result<BulkPayload, ApiError> {
    let effective = match (payload_key, body) {
        (Some(key), Value::Object(mut map)) if map.contains_key(key) => {
            map.remove(key).unwrap_or(Value::Null)
        }
        (_, body) => body,
    };

    match effective {
        Value::Array(items) => Ok(BulkPayload::Many(items)),
        Value::Object(map) => Ok(BulkPayload::Single(map)),
        _ => Err(ApiError::invalid_json("Request body must be a JSON object or array")),
    }
}
