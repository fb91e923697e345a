//! Minimal JSON-RPC 2.0 envelope types — the subset MCP's stdio transport
//! requires. No batching, no notifications without an id.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct Response {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    pub fn success(id: Value, result: Value) -> Self {
        Self { jsonrpc: JSONRPC_VERSION, id, result: Some(result), error: None }
    }

    pub fn failure(id: Value, error: RpcError) -> Self {
        Self { jsonrpc: JSONRPC_VERSION, id, result: None, error: Some(error) }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub const PARSE_ERROR: i64 = -32700;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), data: None }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn request_parses_from_minimal_json() {
        let req: Request = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"method":"lookin_ping","params":{}}"#,
        )
        .unwrap();
        assert_eq!(req.method, "lookin_ping");
        assert_eq!(req.id, Value::from(1));
    }

    #[test]
    fn success_response_omits_error_field() {
        let resp = Response::success(Value::from(1), serde_json::json!({"ok": true}));
        let encoded = serde_json::to_string(&resp).unwrap();
        assert!(!encoded.contains("\"error\""));
    }

    #[test]
    fn failure_response_omits_result_field() {
        let resp = Response::failure(Value::from(1), RpcError::new(RpcError::INTERNAL_ERROR, "boom"));
        let encoded = serde_json::to_string(&resp).unwrap();
        assert!(!encoded.contains("\"result\""));
    }
}
