// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared `Task`/`Artifact` → JSON rendering, used identically by the REST,
//! A2A, and MCP frontends so a caller sees the same artifact shape no
//! matter which protocol it went through.

use serde_json::{json, Value};
use zka_core::{Artifact, Task};

/// Render one artifact as JSON: its `data` part if it has one (the normal
/// case for every skill but a failure), else a `{"text": ...}` wrapper
/// around its first text part.
#[must_use]
pub fn artifact_value(artifact: &Artifact) -> Value {
    if let Some(data) = artifact.as_json() {
        return data.clone();
    }
    match artifact.parts.first() {
        Some(zka_core::task::Part::Text { text }) => json!({ "text": text }),
        _ => Value::Null,
    }
}

/// Render every artifact on `task`, in attachment order.
#[must_use]
pub fn task_artifacts(task: &Task) -> Vec<Value> {
    task.artifacts.iter().map(artifact_value).collect()
}

/// Render a full [`Task`] the way the A2A and MCP frontends report it: id,
/// context, status, and artifacts, mirroring the A2A `Task` object shape.
#[must_use]
pub fn render_a2a_task(task: &Task) -> Value {
    json!({
        "id": task.id.to_string(),
        "contextId": task.context_id,
        "status": { "state": task.status.to_string() },
        "artifacts": task_artifacts(task),
    })
}
