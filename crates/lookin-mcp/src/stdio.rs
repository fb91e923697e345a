//! Newline-delimited JSON-RPC stdio transport. Stdout carries only protocol
//! frames; all diagnostics go to stderr via `tracing`.
//!
//! One request is read, dispatched, and answered before the next line is
//! read — this loop *is* the serialization point spec.md §4.6 assumes an
//! outer MCP dispatcher provides.

use std::time::Duration;

use serde_json::Value;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};

use lookin_proto::Session;

use crate::jsonrpc::{Request, Response, RpcError};
use crate::tools::{self, ToolError};

/// Read JSON-RPC requests from stdin until EOF, answering each on stdout.
pub async fn run(session: &Session, connect_timeout: Duration) -> io::Result<()> {
    let stdin = io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    let mut stdout = io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = handle_line(session, &line, connect_timeout).await;
        let mut encoded = serde_json::to_vec(&response).expect("Response always serializes");
        encoded.push(b'\n');
        stdout.write_all(&encoded).await?;
        stdout.flush().await?;
    }
    Ok(())
}

async fn handle_line(session: &Session, line: &str, connect_timeout: Duration) -> Response {
    let request: Request = match serde_json::from_str(line) {
        Ok(req) => req,
        Err(err) => {
            tracing::warn!(%err, "malformed JSON-RPC line");
            return Response::failure(Value::Null, RpcError::new(RpcError::PARSE_ERROR, err.to_string()));
        }
    };

    match handle_request(session, &request, connect_timeout).await {
        Ok(result) => Response::success(request.id, result),
        Err(err) => Response::failure(request.id, err),
    }
}

async fn handle_request(session: &Session, request: &Request, connect_timeout: Duration) -> Result<Value, RpcError> {
    if request.method == "tools/list" {
        let descriptors: Vec<Value> = tools::tool_descriptors()
            .into_iter()
            .map(|d| serde_json::json!({
                "name": d.name,
                "description": d.description,
                "inputSchema": d.input_schema,
            }))
            .collect();
        return Ok(serde_json::json!({ "tools": descriptors }));
    }

    match tools::dispatch(session, &request.method, &request.params, connect_timeout).await {
        Ok(text) => Ok(serde_json::json!({ "content": [{ "type": "text", "text": text }] })),
        Err(ToolError::UnknownTool(name)) => {
            Err(RpcError::new(RpcError::METHOD_NOT_FOUND, format!("unknown tool {name:?}")))
        }
        Err(ToolError::InvalidParams(msg)) => Err(RpcError::new(RpcError::INVALID_PARAMS, msg)),
        Err(ToolError::Protocol(err)) => {
            tracing::debug!(%err, method = %request.method, "tool call failed");
            Err(RpcError::new(RpcError::INTERNAL_ERROR, err.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn malformed_line_becomes_a_parse_error_response() {
        let session = Session::new();
        let response = handle_line(&session, "not json", Duration::from_secs(1)).await;
        assert_eq!(response.error.as_ref().unwrap().code, RpcError::PARSE_ERROR);
    }

    #[tokio::test]
    async fn unknown_method_becomes_a_method_not_found_response() {
        let session = Session::new();
        let line = r#"{"jsonrpc":"2.0","id":1,"method":"lookin_nonexistent","params":{}}"#;
        let response = handle_line(&session, line, Duration::from_secs(1)).await;
        assert_eq!(response.error.as_ref().unwrap().code, RpcError::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn tools_list_is_served_without_a_connection() {
        let session = Session::new();
        let line = r#"{"jsonrpc":"2.0","id":1,"method":"tools/list","params":{}}"#;
        let response = handle_line(&session, line, Duration::from_secs(1)).await;
        let tools = response.result.unwrap();
        assert_eq!(tools["tools"].as_array().unwrap().len(), 11);
    }
}
