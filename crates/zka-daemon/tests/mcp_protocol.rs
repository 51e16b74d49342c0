// SPDX-License-Identifier: MIT OR Apache-2.0
//! MCP frontend integration tests: `initialize`, `tools/list`, `tools/call`
//! against a free tool and the payment-gated `generate_proof` tool, the
//! unknown-method error shape, and the `Accept: text/event-stream` framing.

mod support;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn mcp(app: axum::Router, body: Value) -> Value {
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/mcp")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn initialize_reports_protocol_and_server_info() {
    let reply = mcp(support::app(), json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {} })).await;
    assert_eq!(reply["result"]["protocolVersion"], "2024-11-05");
    assert_eq!(reply["result"]["serverInfo"]["name"], "zk-proof-agent");
}

#[tokio::test]
async fn tools_list_includes_generate_proof() {
    let reply = mcp(support::app(), json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list", "params": {} })).await;
    let tools = reply["result"]["tools"].as_array().expect("tools array");
    assert!(tools.iter().any(|t| t["name"] == "generate_proof"), "unexpected tools: {tools:?}");
}

#[tokio::test]
async fn tools_call_on_a_free_tool_returns_non_error_content() {
    let reply = mcp(
        support::app(),
        json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "tools/call",
            "params": { "name": "get_supported_circuits", "arguments": {} },
        }),
    )
    .await;
    assert_eq!(reply["result"]["isError"], false, "unexpected reply: {reply}");
    assert!(reply["result"]["content"][0]["text"].as_str().is_some());
}

#[tokio::test]
async fn tools_call_generate_proof_with_credentials_completes() {
    let reply = mcp(
        support::app(),
        json!({
            "jsonrpc": "2.0",
            "id": 4,
            "method": "tools/call",
            "params": {
                "name": "generate_proof",
                "arguments": {
                    "circuitId": "coinbase_attestation",
                    "scope": "test.example",
                    "address": "0xabc",
                    "signature": "0xsig",
                },
            },
        }),
    )
    .await;
    assert_eq!(reply["result"]["isError"], false, "unexpected reply: {reply}");
    let text: Value = serde_json::from_str(reply["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(text["state"], "completed");
}

#[tokio::test]
async fn tools_call_generate_proof_is_payment_gated_when_enabled() {
    let reply = mcp(
        support::app_payments_enabled(),
        json!({
            "jsonrpc": "2.0",
            "id": 5,
            "method": "tools/call",
            "params": {
                "name": "generate_proof",
                "arguments": {
                    "circuitId": "coinbase_attestation",
                    "scope": "test.example",
                    "address": "0xabc",
                    "signature": "0xsig",
                },
            },
        }),
    )
    .await;
    assert_eq!(reply["result"]["isError"], true, "unexpected reply: {reply}");
    let text: Value = serde_json::from_str(reply["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(text["error"]["message"], "payment required for generate_proof");
}

#[tokio::test]
async fn unknown_method_is_a_json_rpc_error() {
    let reply = mcp(support::app(), json!({ "jsonrpc": "2.0", "id": 6, "method": "bogus/method", "params": {} })).await;
    assert_eq!(reply["error"]["code"], -32000);
}

#[tokio::test]
async fn tools_call_with_missing_name_is_invalid_params() {
    let reply = mcp(support::app(), json!({ "jsonrpc": "2.0", "id": 7, "method": "tools/call", "params": {} })).await;
    assert_eq!(reply["error"]["code"], -32602);
}

#[tokio::test]
async fn accept_event_stream_frames_the_same_envelope_as_sse() {
    let resp = support::app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/mcp")
                .header("content-type", "application/json")
                .header("accept", "text/event-stream")
                .body(Body::from(json!({ "jsonrpc": "2.0", "id": 8, "method": "initialize", "params": {} }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(
        resp.headers().get("content-type").and_then(|v| v.to_str().ok()).is_some_and(|v| v.starts_with("text/event-stream")),
        "expected an SSE content-type, got {:?}",
        resp.headers().get("content-type")
    );
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let body = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(body.contains("event:message") || body.contains("event: message"), "unexpected SSE body: {body}");

    let data_line = body.lines().find(|l| l.starts_with("data:")).expect("an SSE data line");
    let envelope: Value = serde_json::from_str(data_line.trim_start_matches("data:").trim()).unwrap();
    assert_eq!(envelope["result"]["protocolVersion"], "2024-11-05");
}
