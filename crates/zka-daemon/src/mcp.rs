// SPDX-License-Identifier: MIT OR Apache-2.0
//! MCP frontend (§6): one JSON-RPC endpoint (`POST /mcp`) speaking the
//! Model Context Protocol's `initialize`/`tools/list`/`tools/call` trio.
//! Every skill is exposed as a tool; `generate_proof` is the only one that
//! creates a task rather than answering inline.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;
use zka_error::{AgentError, ErrorCode, ErrorKind};

use crate::AppState;

const PROTOCOL_VERSION: &str = "2024-11-05";

fn tool_schema(name: &str) -> Value {
    match name {
        "get_supported_circuits" => json!({
            "type": "object",
            "properties": { "chainId": { "type": "integer" } },
        }),
        "verify_proof" => json!({
            "type": "object",
            "properties": {
                "circuitId": { "type": "string" },
                "proof": { "type": "object" },
                "publicInputs": { "type": "array" },
            },
            "required": ["circuitId", "proof", "publicInputs"],
        }),
        "request_signing" => json!({
            "type": "object",
            "properties": { "circuitId": { "type": "string" }, "scope": { "type": "string" } },
            "required": ["circuitId", "scope"],
        }),
        "check_status" => json!({
            "type": "object",
            "properties": { "requestId": { "type": "string" } },
            "required": ["requestId"],
        }),
        "request_payment" => json!({
            "type": "object",
            "properties": { "requestId": { "type": "string" } },
            "required": ["requestId"],
        }),
        "generate_proof" => json!({
            "type": "object",
            "properties": {
                "circuitId": { "type": "string" },
                "scope": { "type": "string" },
                "requestId": { "type": "string" },
            },
            "required": ["circuitId", "scope"],
        }),
        _ => json!({ "type": "object" }),
    }
}

fn tools_list() -> Value {
    let tools: Vec<Value> = zka_skills::SKILL_NAMES
        .iter()
        .map(|name| {
            json!({
                "name": name,
                "description": format!("invoke the {name} skill"),
                "inputSchema": tool_schema(name),
            })
        })
        .collect();
    json!({ "tools": tools })
}

fn content_result(value: &Value) -> Value {
    json!({
        "content": [{ "type": "text", "text": value.to_string() }],
        "isError": false,
    })
}

fn error_result(err: &AgentError) -> Value {
    json!({
        "content": [{ "type": "text", "text": json!({ "error": { "code": err.code, "message": err.message } }).to_string() }],
        "isError": true,
    })
}

async fn call_tool(state: &AppState, name: &str, args: Value, paid: bool) -> Result<Value, AgentError> {
    match name {
        "get_supported_circuits" => zka_skills::circuits::get_supported_circuits(&state.deps, &args).await,
        "verify_proof" => zka_skills::verify::verify_proof(&state.deps, &args).await,
        "request_signing" => zka_skills::signing::request_signing(&state.deps, &args).await,
        "check_status" => zka_skills::status::check_status(&state.deps, &args).await,
        "request_payment" => zka_skills::payment::request_payment(&state.deps, &args).await,
        "generate_proof" => {
            if state.payment_gate.requires_payment() && !paid {
                return Err(AgentError::new(ErrorKind::PaymentRequired, ErrorCode::PaymentMissing, "payment required for generate_proof"));
            }
            let now = state.deps.now();
            let context_id = Uuid::new_v4().to_string();
            let task = state.deps.tasks.submit(context_id, "generate_proof", args, now).await?;
            let finished = state.pool.run_task_now(task).await?;
            Ok(json!({
                "taskId": finished.id.to_string(),
                "state": finished.status.to_string(),
                "artifacts": crate::render::task_artifacts(&finished),
            }))
        }
        other => Err(AgentError::validation(ErrorCode::InvalidParam, format!("unknown tool: {other}"))),
    }
}

fn payment_decoded(headers: &HeaderMap) -> bool {
    headers
        .get("x-payment")
        .and_then(|v| v.to_str().ok())
        .and_then(zka_payments::decode_payment_header)
        .is_some()
}

/// Dispatch one JSON-RPC request and build its full response envelope
/// (`jsonrpc`/`id`/`result` or `jsonrpc`/`id`/`error`), independent of
/// whether the caller wants it framed as a single JSON body or as SSE.
async fn dispatch(state: &AppState, headers: &HeaderMap, req: &Value) -> Value {
    let id = req.get("id").cloned().unwrap_or(Value::Null);
    let method = req.get("method").and_then(Value::as_str).unwrap_or_default();
    let params = req.get("params").cloned().unwrap_or(json!({}));

    let result = match method {
        "initialize" => Ok(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": {} },
            "serverInfo": { "name": "zk-proof-agent", "version": state.deps.config.agent_version },
        })),
        "tools/list" => Ok(tools_list()),
        "tools/call" => {
            let name = match params.get("name").and_then(Value::as_str) {
                Some(n) => n,
                None => {
                    return json!({
                        "jsonrpc": "2.0",
                        "id": id,
                        "error": { "code": -32602, "message": "missing required param: name" },
                    })
                }
            };
            let args = params.get("arguments").cloned().unwrap_or(json!({}));
            let paid = payment_decoded(headers);
            match call_tool(state, name, args, paid).await {
                Ok(value) => Ok(content_result(&value)),
                Err(err) => Ok(error_result(&err)),
            }
        }
        other => Err(AgentError::validation(ErrorCode::InvalidParam, format!("unknown method: {other}"))),
    };

    match result {
        Ok(value) => json!({ "jsonrpc": "2.0", "id": id, "result": value }),
        Err(err) => json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": { "code": -32000, "message": err.message },
        }),
    }
}

/// Whether the caller asked for the JSON-RPC envelope framed as SSE rather
/// than a plain JSON body, per the `Accept: text/event-stream` contract.
fn wants_sse(headers: &HeaderMap) -> bool {
    headers
        .get(axum::http::header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("text/event-stream"))
}

/// `tools/call` is the only method that touches the worker pool; every other
/// method resolves immediately, so SSE framing here is a single `message`
/// event carrying the same envelope a plain JSON response would — the
/// stream exists to satisfy clients that always negotiate SSE, not to
/// deliver incremental progress.
async fn sse_response(state: Arc<AppState>, headers: HeaderMap, req: Value) -> Response {
    let (tx, rx) = tokio::sync::mpsc::channel::<Result<Event, Infallible>>(1);
    tokio::spawn(async move {
        let envelope = dispatch(&state, &headers, &req).await;
        if let Ok(event) = Event::default().event("message").json_data(envelope) {
            let _ = tx.send(Ok(event)).await;
        }
    });
    Sse::new(ReceiverStream::new(rx)).keep_alive(KeepAlive::default()).into_response()
}

/// `POST /mcp`.
pub async fn handle(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(req): Json<Value>) -> Response {
    if wants_sse(&headers) {
        return sse_response(state, headers, req).await;
    }
    let envelope = dispatch(&state, &headers, &req).await;
    Json(envelope).into_response()
}
