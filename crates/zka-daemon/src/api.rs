// SPDX-License-Identifier: MIT OR Apache-2.0
//! REST frontend (§6): synchronous JSON responses for free skills,
//! task-creating endpoints for `generate_proof`, and the orchestrated
//! signing/payment/flow surface.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::{http::StatusCode, Json};
use serde_json::{json, Value};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use uuid::Uuid;
use zka_core::request::{FlowId, Phase};
use zka_core::{Task, TaskId, TaskStatus};
use zka_error::{AgentError, ErrorCode};

use crate::error::ApiError;
use crate::AppState;

/// `GET /health`.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let config = &state.deps.config;
    Json(json!({
        "status": "ok",
        "paymentMode": config.payment_mode.to_string(),
        "paymentRequired": state.payment_gate.requires_payment(),
    }))
}

/// `GET /payment/status`.
pub async fn payment_status(State(state): State<Arc<AppState>>) -> Json<Value> {
    let config = &state.deps.config;
    Json(json!({
        "mode": config.payment_mode.to_string(),
        "network": crate::DEFAULT_NETWORK,
        "requiresPayment": state.payment_gate.requires_payment(),
        "description": "one zero-knowledge proof",
    }))
}

/// `GET /tee/status`.
pub async fn tee_status(State(state): State<Arc<AppState>>) -> Json<Value> {
    let config = &state.deps.config;
    let available = state.deps.tee.health_check().await;
    Json(json!({
        "mode": config.tee_mode.to_string(),
        "attestationEnabled": config.tee_mode != zka_config::TeeMode::Disabled,
        "available": available,
    }))
}

/// `GET /api/v1/circuits[?chainId=]`. Free.
pub async fn list_circuits(
    State(state): State<Arc<AppState>>,
    axum::extract::Query(params): axum::extract::Query<std::collections::HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let mut query = json!({});
    if let Some(chain_id) = params.get("chainId") {
        query["chainId"] = json!(chain_id.parse::<u64>().unwrap_or(zka_skills::circuits::DEFAULT_CHAIN_ID));
    }
    let result = zka_skills::circuits::get_supported_circuits(&state.deps, &query).await?;
    Ok(Json(result))
}

fn render_task_creation(task: &Task) -> Value {
    if task.status == TaskStatus::InputRequired {
        if let Some(data) = task.artifacts.first().map(crate::render::artifact_value) {
            return json!({
                "state": "input-required",
                "signingUrl": data.get("signingUrl").cloned().unwrap_or(Value::Null),
                "requestId": data.get("requestId").cloned().unwrap_or(Value::Null),
            });
        }
        return json!({ "taskId": task.id.to_string(), "state": "input-required" });
    }
    json!({
        "taskId": task.id.to_string(),
        "state": task.status.to_string(),
        "result": task.artifacts.last().map(crate::render::artifact_value),
    })
}

fn render_task(task: &Task) -> Value {
    json!({
        "taskId": task.id.to_string(),
        "state": task.status.to_string(),
        "artifacts": crate::render::task_artifacts(task),
    })
}

/// `POST /api/v1/proofs` (payment-gated). Builds and synchronously
/// dispatches a `generate_proof` task.
pub async fn create_proof(State(state): State<Arc<AppState>>, Json(params): Json<Value>) -> Result<Json<Value>, ApiError> {
    let now = state.deps.now();
    let context_id = Uuid::new_v4().to_string();
    let task = state.deps.tasks.submit(context_id, "generate_proof", params, now).await?;
    let finished = state.pool.run_task_now(task).await?;
    Ok(Json(render_task_creation(&finished)))
}

/// `GET /api/v1/proofs/:taskId`. Free.
pub async fn get_proof(State(state): State<Arc<AppState>>, Path(task_id): Path<Uuid>) -> Result<Json<Value>, ApiError> {
    let task = state.deps.tasks.require_task(TaskId(task_id)).await?;
    Ok(Json(render_task(&task)))
}

/// `POST /api/v1/proofs/verify`. Free.
pub async fn verify_proof(State(state): State<Arc<AppState>>, Json(params): Json<Value>) -> Result<Json<Value>, ApiError> {
    let result = zka_skills::verify::verify_proof(&state.deps, &params).await?;
    Ok(Json(result))
}

/// `POST /api/v1/signing`. Free.
pub async fn request_signing(State(state): State<Arc<AppState>>, Json(params): Json<Value>) -> Result<Json<Value>, ApiError> {
    let result = zka_skills::signing::request_signing(&state.deps, &params).await?;
    Ok(Json(result))
}

/// `GET /api/v1/signing/:requestId/status`. Free.
pub async fn signing_status(State(state): State<Arc<AppState>>, Path(request_id): Path<Uuid>) -> Result<Json<Value>, ApiError> {
    let params = json!({ "requestId": request_id.to_string() });
    let result = zka_skills::status::check_status(&state.deps, &params).await?;
    Ok(Json(result))
}

/// `POST /api/v1/signing/:requestId/payment`. Free (precedes settlement).
pub async fn request_payment(State(state): State<Arc<AppState>>, Path(request_id): Path<Uuid>) -> Result<Json<Value>, ApiError> {
    let params = json!({ "requestId": request_id.to_string() });
    let result = zka_skills::payment::request_payment(&state.deps, &params).await?;
    Ok(Json(result))
}

fn require_str<'a>(params: &'a Value, field: &str) -> Result<&'a str, AgentError> {
    params
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| AgentError::validation(ErrorCode::MissingParam, format!("missing required param: {field}")))
}

/// `POST /api/v1/flow`. Starts a signing/payment/proof-generation flow.
pub async fn create_flow(State(state): State<Arc<AppState>>, Json(params): Json<Value>) -> Result<Json<Value>, ApiError> {
    let circuit_id = require_str(&params, "circuitId")?;
    zka_core::circuit::lookup(circuit_id)?;
    let scope = require_str(&params, "scope")?;
    let country_list = params.get("countryList").and_then(Value::as_array).map(|arr| {
        arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect::<Vec<_>>()
    });
    let is_included = params.get("isIncluded").and_then(Value::as_bool);

    let now = state.deps.now();
    let request = state.deps.flows.create_request(circuit_id, scope, country_list, is_included, now).await?;
    let flow = state.deps.flows.create_flow(request.request_id).await?;
    Ok(Json(json!({
        "flowId": flow.flow_id.to_string(),
        "requestId": flow.request_id.to_string(),
        "phase": flow.phase.to_string(),
    })))
}

async fn advance_flow(state: &AppState, flow_id: FlowId) -> Result<Value, AgentError> {
    let now = state.deps.now();
    let payments_enabled = state.payment_gate.requires_payment();
    let (flow, minted) = state.deps.flows.advance(flow_id, payments_enabled, now).await?;

    if let Some(task_id) = minted {
        let request = state.deps.flows.require_request(flow.request_id).await?;
        let params = json!({
            "circuitId": request.circuit_id,
            "scope": request.scope,
            "requestId": request.request_id.to_string(),
        });
        state
            .deps
            .tasks
            .submit_with_id(task_id, flow_id.to_string(), "generate_proof", params, now)
            .await?;
    }

    Ok(json!({
        "flowId": flow.flow_id.to_string(),
        "requestId": flow.request_id.to_string(),
        "phase": flow.phase.to_string(),
        "proofTaskId": flow.proof_task_id.map(|id| id.to_string()),
    }))
}

/// `GET /api/v1/flow/:flowId`. Auto-advances the flow's phase.
pub async fn get_flow(State(state): State<Arc<AppState>>, Path(flow_id): Path<Uuid>) -> Result<Json<Value>, ApiError> {
    let result = advance_flow(&state, FlowId(flow_id)).await?;
    Ok(Json(result))
}

const FLOW_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// `GET /api/v1/flow/:flowId/events`. SSE stream of phase changes plus
/// heartbeats, polling [`zka_runtime::flow::FlowOrchestrator::advance`] since
/// flows are not backed by the per-task event bus.
pub async fn flow_events(
    State(state): State<Arc<AppState>>,
    Path(flow_id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = tokio::sync::mpsc::channel(16);
    let flow_id = FlowId(flow_id);

    tokio::spawn(async move {
        let mut last_phase: Option<Phase> = None;
        loop {
            match advance_flow(&state, flow_id).await {
                Ok(payload) => {
                    let phase = payload.get("phase").and_then(Value::as_str).and_then(phase_from_str);
                    if phase != last_phase {
                        let Ok(event) = Event::default().event("phase").json_data(payload.clone()) else {
                            return;
                        };
                        if tx.send(Ok(event)).await.is_err() {
                            return;
                        }
                        last_phase = phase;
                    } else if tx.send(Ok(Event::default().comment("heartbeat"))).await.is_err() {
                        return;
                    }

                    if matches!(last_phase, Some(Phase::Completed) | Some(Phase::Failed)) {
                        return;
                    }
                }
                Err(_) => return,
            }
            tokio::time::sleep(FLOW_POLL_INTERVAL).await;
        }
    });

    Sse::new(ReceiverStream::new(rx)).keep_alive(KeepAlive::default())
}

fn phase_from_str(s: &str) -> Option<Phase> {
    match s {
        "signing" => Some(Phase::Signing),
        "payment" => Some(Phase::Payment),
        "ready" => Some(Phase::Ready),
        "generating" => Some(Phase::Generating),
        "completed" => Some(Phase::Completed),
        "failed" => Some(Phase::Failed),
        _ => None,
    }
}

/// `POST /api/v1/chat`. Removed.
pub async fn chat_gone() -> Response {
    StatusCode::GONE.into_response()
}
