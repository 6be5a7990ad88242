//! Worker protocol: one JSON object per line in each direction.
//!
//! Request:
//!   {"id": 7, "source": "export default () => ...", "kind": "email", "data": {...}}
//!
//! Responses:
//!   {"msgtype": "render", "id": 7, "success": true, "output": "<!DOCTYPE ..."}
//!   {"msgtype": "render", "id": 7, "success": false, "error": "..."}
//!   {"msgtype": "protocol-error", "id": 7, "error": "..."}
//!
//! `id` is opaque and echoed unchanged. Responses are written as renders
//! complete, so they may arrive out of request order.

use crate::{RenderRequest, RenderResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorkerRequest {
    #[serde(default)]
    pub id: Value,
    #[serde(flatten)]
    pub request: RenderRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "msgtype", rename_all = "kebab-case")]
pub enum WorkerMessage {
    Render {
        id: Value,
        #[serde(flatten)]
        result: RenderResult,
    },
    ProtocolError {
        #[serde(skip_serializing_if = "Value::is_null")]
        id: Value,
        error: String,
    },
}

impl WorkerMessage {
    pub fn render(id: Value, result: RenderResult) -> Self {
        Self::Render { id, result }
    }

    pub fn protocol_error(id: Value, error: impl Into<String>) -> Self {
        Self::ProtocolError {
            id,
            error: error.into(),
        }
    }
}

/// Parses one request line. A line that isn't a valid request yields the
/// protocol error to send back, carrying the request's `id` when one could
/// be read.
pub fn parse_request(line: &str) -> Result<WorkerRequest, WorkerMessage> {
    let value: Value = serde_json::from_str(line)
        .map_err(|e| WorkerMessage::protocol_error(Value::Null, format!("invalid JSON: {e}")))?;
    let id = match &value {
        Value::Object(map) => map.get("id").cloned().unwrap_or(Value::Null),
        _ => {
            return Err(WorkerMessage::protocol_error(
                Value::Null,
                "request must be a JSON object",
            ))
        }
    };
    serde_json::from_value(value)
        .map_err(|e| WorkerMessage::protocol_error(id, format!("invalid request: {e}")))
}
