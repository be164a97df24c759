//! JSON-RPC 2.0 envelope types.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

/// Body is not JSON.
pub const PARSE_ERROR: i32 = -32700;
/// Envelope is not a valid request object.
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
/// Caller must (re-)authenticate.
pub const AUTH_REQUIRED: i32 = -32001;
/// Tool call failed; `data` carries the domain error.
pub const TOOL_ERROR: i32 = -32000;

/// Incoming envelope. A missing `id` marks a notification; an explicit
/// `"id": null` is kept as `Some(Value::Null)` and is invalid.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default, deserialize_with = "present_id")]
    pub id: Option<Value>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
}

fn present_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

impl JsonRpcRequest {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    pub fn has_null_id(&self) -> bool {
        matches!(self.id, Some(Value::Null))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Outgoing envelope carrying exactly one of `result` or `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, code: i32, message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data,
            }),
        }
    }

    pub fn error_code(&self) -> Option<i32> {
        self.error.as_ref().map(|e| e.code)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn success_omits_error() {
        let response = JsonRpcResponse::success(json!(1), json!({}));
        let value = serde_json::to_value(response).unwrap();
        assert_eq!(value, json!({ "jsonrpc": "2.0", "id": 1, "result": {} }));
    }

    #[test]
    fn error_omits_result_and_empty_data() {
        let response = JsonRpcResponse::error(json!("a"), METHOD_NOT_FOUND, "nope", None);
        let value = serde_json::to_value(response).unwrap();
        assert_eq!(
            value,
            json!({ "jsonrpc": "2.0", "id": "a", "error": { "code": -32601, "message": "nope" } })
        );
    }

    #[test]
    fn missing_id_is_notification() {
        let body = json!({ "jsonrpc": "2.0", "method": "notifications/initialized" });
        let req: JsonRpcRequest = serde_json::from_value(body).unwrap();
        assert!(req.is_notification());
        let body = json!({ "jsonrpc": "2.0", "id": 0, "method": "ping" });
        let req: JsonRpcRequest = serde_json::from_value(body).unwrap();
        assert!(!req.is_notification());
    }

    #[test]
    fn null_id_is_not_a_notification() {
        let body = json!({ "jsonrpc": "2.0", "id": null, "method": "ping" });
        let req: JsonRpcRequest = serde_json::from_value(body).unwrap();
        assert!(!req.is_notification());
        assert!(req.has_null_id());
    }
}
