// SPDX-License-Identifier: MIT OR Apache-2.0
//! REST frontend integration tests: health, free skills, and the
//! payment-gated proof-creation route, driven in-process against the real
//! `axum::Router`.

mod support;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

async fn call(app: axum::Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let json = if body.is_empty() { serde_json::Value::Null } else { serde_json::from_slice(&body).unwrap() };
    (status, json)
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    call(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

async fn post(app: axum::Router, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    call(
        app,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

#[tokio::test]
async fn health_reports_ok_and_payment_mode() {
    let (status, json) = get(support::app(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["paymentMode"], "disabled");
    assert_eq!(json["paymentRequired"], false);
}

#[tokio::test]
async fn list_circuits_is_free_and_non_empty() {
    let (status, json) = get(support::app(), "/api/v1/circuits").await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["circuits"].as_array().is_some_and(|c| !c.is_empty()), "expected a non-empty circuit list, got {json}");
}

#[tokio::test]
async fn create_proof_without_payment_gate_completes_synchronously() {
    let app = support::app();
    let (status, json) = post(
        app.clone(),
        "/api/v1/proofs",
        serde_json::json!({
            "circuitId": "coinbase_attestation",
            "scope": "test.example",
            "address": "0xabc",
            "signature": "0xsig",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "unexpected body: {json}");
    assert_eq!(json["state"], "completed");
    let task_id = json["taskId"].as_str().expect("taskId present");

    let (status, fetched) = get(app, &format!("/api/v1/proofs/{task_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["state"], "completed");
}

#[tokio::test]
async fn create_proof_is_payment_gated_when_enabled() {
    let (status, json) = post(
        support::app_payments_enabled(),
        "/api/v1/proofs",
        serde_json::json!({ "circuitId": "coinbase_attestation", "scope": "test.example" }),
    )
    .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED, "unexpected body: {json}");
}

#[tokio::test]
async fn get_unknown_proof_is_not_found() {
    let random_id = uuid::Uuid::new_v4();
    let (status, _) = get(support::app(), &format!("/api/v1/proofs/{random_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn chat_endpoint_is_gone() {
    let (status, _) = post(support::app(), "/api/v1/chat", serde_json::json!({})).await;
    assert_eq!(status, StatusCode::GONE);
}
