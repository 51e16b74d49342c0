// SPDX-License-Identifier: MIT OR Apache-2.0
//! `/.well-known/*` discovery documents: the agent card, the plain A2A
//! agent descriptor, and the MCP manifest. All three are free and
//! unauthenticated.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use zka_skills::SKILL_NAMES;

use crate::AppState;

fn skills_json() -> Vec<Value> {
    SKILL_NAMES.iter().map(|name| json!({ "name": name })).collect()
}

/// `GET /.well-known/agent-card.json`: the A2A "agent card" document other
/// agents discover this one through.
pub async fn agent_card(State(state): State<Arc<AppState>>) -> Json<Value> {
    let config = &state.deps.config;
    Json(json!({
        "name": "zk-proof-agent",
        "version": config.agent_version,
        "url": config.public_base_url,
        "protocols": ["rest", "a2a", "mcp"],
        "skills": skills_json(),
        "paymentMode": config.payment_mode.to_string(),
    }))
}

/// `GET /.well-known/agent.json`: alias descriptor some A2A clients expect
/// at this path instead of (or alongside) `agent-card.json`.
pub async fn agent_descriptor(State(state): State<Arc<AppState>>) -> Json<Value> {
    let config = &state.deps.config;
    Json(json!({
        "name": "zk-proof-agent",
        "version": config.agent_version,
        "endpoint": format!("{}/a2a", config.public_base_url),
        "skills": skills_json(),
    }))
}

/// `GET /.well-known/mcp.json`: the MCP tool manifest, one tool per skill.
pub async fn mcp_manifest(State(state): State<Arc<AppState>>) -> Json<Value> {
    let config = &state.deps.config;
    Json(json!({
        "name": "zk-proof-agent",
        "version": config.agent_version,
        "endpoint": format!("{}/mcp", config.public_base_url),
        "tools": skills_json(),
    }))
}
