// SPDX-License-Identifier: MIT OR Apache-2.0
//! A2A frontend (§6): one JSON-RPC 2.0 endpoint (`POST /a2a`) exposing
//! `message/send`, `message/stream`, `tasks/get`, `tasks/cancel`, and
//! `tasks/resubscribe`. Every method normalizes down to `(skill, params,
//! contextId)` and dispatches through the same [`zka_runtime::pool::WorkerPool`]
//! the REST frontend uses.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;
use zka_bus::TaskEvent;
use zka_core::{Task, TaskId, TaskStatus};
use zka_error::{AgentError, ErrorCode, ErrorKind};
use zka_payments::decode_payment_header;

use crate::AppState;

#[derive(Debug, Deserialize)]
struct RpcRequest {
    #[serde(default)]
    id: Value,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Serialize)]
struct RpcError {
    code: i32,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

fn rpc_error_code(err: &AgentError) -> i32 {
    match err.kind {
        ErrorKind::NotFound => -32001,
        ErrorKind::Validation => -32602,
        ErrorKind::PaymentRequired => -32003,
        ErrorKind::InvalidState | ErrorKind::Transient | ErrorKind::Permanent => -32000,
    }
}

fn rpc_ok(id: Value, result: Value) -> Json<Value> {
    Json(json!({ "jsonrpc": "2.0", "id": id, "result": result }))
}

fn rpc_err(id: Value, err: AgentError, challenge: Option<Value>) -> Json<Value> {
    let error = RpcError { code: rpc_error_code(&err), message: err.message, data: challenge };
    Json(json!({ "jsonrpc": "2.0", "id": id, "error": error }))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum MessagePart {
    Data {
        skill: String,
        #[serde(flatten)]
        params: Value,
    },
    Text {
        text: String,
    },
}

#[derive(Debug, Deserialize)]
struct A2aMessage {
    #[serde(rename = "contextId")]
    context_id: Option<String>,
    #[serde(default)]
    parts: Vec<MessagePart>,
}

/// Resolve `(skill, params)` from a message's parts: the first `data` part
/// wins over the first `text` part, per the normalization rule every
/// frontend shares.
async fn resolve_skill(state: &AppState, message: &A2aMessage) -> Result<Option<(String, Value)>, AgentError> {
    for part in &message.parts {
        if let MessagePart::Data { skill, params } = part {
            return Ok(Some((skill.clone(), params.clone())));
        }
    }
    for part in &message.parts {
        if let MessagePart::Text { text } = part {
            let Some(router) = &state.deps.llm_router else {
                return Ok(None);
            };
            let (skill, params) = router.route(text).await?;
            return Ok(Some((skill, params)));
        }
    }
    Ok(None)
}

async fn unresolved_task(state: &AppState, context_id: String) -> Result<Task, AgentError> {
    let now = state.deps.now();
    let task = state.deps.tasks.submit(context_id, "unresolved", json!({}), now).await?;
    let task = state.deps.tasks.update_status(task, TaskStatus::Running, None, now).await?;
    let artifact = zka_core::Artifact::text(
        "text/plain",
        "message has no data part, and no LLM router is configured to interpret its text",
    );
    let task = state.deps.tasks.add_artifact(task, artifact, now).await?;
    state.deps.tasks.update_status(task, TaskStatus::Failed, None, now).await
}

async fn dispatch_message(state: &AppState, message: A2aMessage, paid: bool) -> Result<Task, AgentError> {
    let context_id = message.context_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
    let Some((skill, params)) = resolve_skill(state, &message).await? else {
        return unresolved_task(state, context_id).await;
    };

    if skill == "generate_proof" && state.payment_gate.requires_payment() && !paid {
        return Err(AgentError::new(ErrorKind::PaymentRequired, ErrorCode::PaymentMissing, "payment required for generate_proof"));
    }

    let now = state.deps.now();
    let task = state.deps.tasks.submit(context_id, skill, params, now).await?;
    state.pool.run_task_now(task).await
}

fn payment_decoded(headers: &HeaderMap) -> bool {
    headers
        .get("x-payment")
        .and_then(|v| v.to_str().ok())
        .and_then(decode_payment_header)
        .is_some()
}

fn parse_task_id(params: &Value) -> Result<TaskId, AgentError> {
    params
        .get("taskId")
        .and_then(Value::as_str)
        .ok_or_else(|| AgentError::validation(ErrorCode::MissingParam, "missing required param: taskId"))?
        .parse()
        .map_err(|_| AgentError::validation(ErrorCode::InvalidParam, "taskId is not a valid id"))
}

async fn handle_rpc(state: &AppState, headers: &HeaderMap, req: &RpcRequest) -> Result<Value, AgentError> {
    match req.method.as_str() {
        "message/send" => {
            let message: A2aMessage = serde_json::from_value(req.params.clone())
                .map_err(|e| AgentError::validation(ErrorCode::InvalidParam, format!("invalid message: {e}")))?;
            let paid = payment_decoded(headers);
            let task = dispatch_message(state, message, paid).await?;
            Ok(crate::render::render_a2a_task(&task))
        }
        "tasks/get" => {
            let task = state.deps.tasks.require_task(parse_task_id(&req.params)?).await?;
            Ok(crate::render::render_a2a_task(&task))
        }
        "tasks/cancel" => {
            let task = state.deps.tasks.require_task(parse_task_id(&req.params)?).await?;
            let now = state.deps.now();
            let canceled = state.deps.tasks.update_status(task, TaskStatus::Canceled, None, now).await?;
            Ok(crate::render::render_a2a_task(&canceled))
        }
        other => Err(AgentError::validation(ErrorCode::InvalidParam, format!("unknown method: {other}"))),
    }
}

/// `POST /a2a`.
pub async fn handle(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(req): Json<RpcRequest>) -> Response {
    match req.method.as_str() {
        "message/stream" => return stream_message(state, headers, req).await,
        "tasks/resubscribe" => return resubscribe(state, req).await,
        _ => {}
    }

    match handle_rpc(&state, &headers, &req).await {
        Ok(result) => rpc_ok(req.id, result).into_response(),
        Err(err) => {
            let challenge = matches!(err.kind, ErrorKind::PaymentRequired).then(|| serde_json::to_value(state.payment_gate.challenge()).unwrap_or(Value::Null));
            rpc_err(req.id, err, challenge).into_response()
        }
    }
}

async fn subscribe_and_stream(
    state: Arc<AppState>,
    task_id: TaskId,
    mut rx: broadcast::Receiver<TaskEvent>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let (tx, out_rx) = tokio::sync::mpsc::channel(16);

    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let is_final = matches!(&event, TaskEvent::TaskComplete { .. });
                    let payload = match &event {
                        TaskEvent::StatusUpdate { status, is_final, .. } => json!({ "type": "status", "status": status.to_string(), "final": is_final }),
                        TaskEvent::ArtifactUpdate { artifact, last_chunk, .. } => {
                            json!({ "type": "artifact", "artifact": crate::render::artifact_value(artifact), "lastChunk": last_chunk })
                        }
                        TaskEvent::TaskComplete { task, .. } => json!({ "type": "task", "task": crate::render::render_a2a_task(task) }),
                    };
                    let Ok(sse_event) = Event::default().json_data(payload) else { return };
                    if tx.send(Ok(sse_event)).await.is_err() {
                        return;
                    }
                    if is_final {
                        return;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    });

    let _ = &task_id;
    Sse::new(ReceiverStream::new(out_rx)).keep_alive(KeepAlive::default())
}

async fn stream_message(state: Arc<AppState>, headers: HeaderMap, req: RpcRequest) -> Response {
    let message: A2aMessage = match serde_json::from_value(req.params.clone()) {
        Ok(m) => m,
        Err(e) => return rpc_err(req.id, AgentError::validation(ErrorCode::InvalidParam, format!("invalid message: {e}")), None).into_response(),
    };

    let context_id = message.context_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
    let resolved = match resolve_skill(&state, &message).await {
        Ok(r) => r,
        Err(e) => return rpc_err(req.id, e, None).into_response(),
    };
    let Some((skill, params)) = resolved else {
        return match unresolved_task(&state, context_id).await {
            Ok(task) => rpc_ok(req.id, crate::render::render_a2a_task(&task)).into_response(),
            Err(e) => rpc_err(req.id, e, None).into_response(),
        };
    };

    if skill == "generate_proof" && state.payment_gate.requires_payment() && !payment_decoded(&headers) {
        let challenge = serde_json::to_value(state.payment_gate.challenge()).unwrap_or(Value::Null);
        let err = AgentError::new(ErrorKind::PaymentRequired, ErrorCode::PaymentMissing, "payment required for generate_proof");
        return rpc_err(req.id, err, Some(challenge)).into_response();
    }

    let now = state.deps.now();
    let task = match state.deps.tasks.submit(context_id, skill, params, now).await {
        Ok(t) => t,
        Err(e) => return rpc_err(req.id, e, None).into_response(),
    };
    let task_id = task.id;
    let rx = state.deps.bus.subscribe(task_id);

    let pool = Arc::clone(&state.pool);
    tokio::spawn(async move {
        let _ = pool.run_task_now(task).await;
    });

    subscribe_and_stream(state, task_id, rx).await.into_response()
}

async fn resubscribe(state: Arc<AppState>, req: RpcRequest) -> Response {
    let task_id = match parse_task_id(&req.params) {
        Ok(id) => id,
        Err(e) => return rpc_err(req.id, e, None).into_response(),
    };
    if let Err(e) = state.deps.tasks.require_task(task_id).await {
        return rpc_err(req.id, e, None).into_response();
    }
    let rx = state.deps.bus.subscribe(task_id);
    subscribe_and_stream(state, task_id, rx).await.into_response()
}
