// SPDX-License-Identifier: MIT OR Apache-2.0
//! Task store (C13): persists [`Task`] JSON, enqueues submitted tasks, and
//! maintains the `context -> request` mapping `ContextFlow` auto-fill reads.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use zka_core::{Artifact, RequestId, StatusMessage, Task, TaskId, TaskStatus};
use zka_error::{AgentError, ErrorCode};
use zka_kv::KvStore;

/// Default TTL a task is persisted for after creation.
pub const TASK_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Name of the list every newly queued task id is pushed onto.
pub const SUBMITTED_QUEUE: &str = "a2a:queue:submitted";

fn task_key(id: TaskId) -> String {
    format!("task:{id}")
}

fn context_key(context_id: &str) -> String {
    format!("context:{context_id}")
}

fn to_value(task: &Task) -> Result<Value, AgentError> {
    serde_json::to_value(task).map_err(|e| AgentError::permanent(ErrorCode::Internal, format!("serialize task: {e}")))
}

fn from_value(value: Value) -> Result<Task, AgentError> {
    serde_json::from_value(value).map_err(|e| AgentError::permanent(ErrorCode::Internal, format!("corrupt task record: {e}")))
}

fn parse_id<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T, AgentError> {
    raw.parse()
        .map_err(|_| AgentError::permanent(ErrorCode::Internal, format!("corrupt {what}: {raw}")))
}

/// KV-backed persistence for [`Task`]s, shared read-only by the frontends,
/// the worker pool, and the flow orchestrator via an `Arc`.
pub struct TaskStore {
    store: Arc<dyn KvStore>,
}

impl TaskStore {
    /// Construct a store over `store`.
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    async fn persist(&self, task: &Task) -> Result<(), AgentError> {
        self.store.set(&task_key(task.id), to_value(task)?, Some(TASK_TTL)).await
    }

    /// Build a fresh `queued` task, persist it, and push its id onto the
    /// submitted queue for the worker pool to pick up.
    pub async fn submit(
        &self,
        context_id: impl Into<String>,
        skill: impl Into<String>,
        params: Value,
        now: DateTime<Utc>,
    ) -> Result<Task, AgentError> {
        let task = Task::new(context_id, skill, params, now);
        self.enqueue(task).await
    }

    /// Same as [`Self::submit`], but under a caller-supplied [`TaskId`].
    /// Used by the flow orchestrator, which mints the id before the task
    /// itself is created so the flow record can reference it up front.
    pub async fn submit_with_id(
        &self,
        id: TaskId,
        context_id: impl Into<String>,
        skill: impl Into<String>,
        params: Value,
        now: DateTime<Utc>,
    ) -> Result<Task, AgentError> {
        let task = Task::with_id(id, context_id, skill, params, now);
        self.enqueue(task).await
    }

    async fn enqueue(&self, task: Task) -> Result<Task, AgentError> {
        self.persist(&task).await?;
        self.store.list_push_left(SUBMITTED_QUEUE, Value::from(task.id.to_string())).await?;
        Ok(task)
    }

    /// Load a task by id, or `None` if absent/expired.
    pub async fn get_task(&self, id: TaskId) -> Result<Option<Task>, AgentError> {
        match self.store.get(&task_key(id)).await? {
            Some(value) => Ok(Some(from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Load a task by id, failing with `TaskNotFound` if absent.
    pub async fn require_task(&self, id: TaskId) -> Result<Task, AgentError> {
        self.get_task(id)
            .await?
            .ok_or_else(|| AgentError::not_found(ErrorCode::TaskNotFound, format!("task {id} not found")))
    }

    /// Pop the next submitted task id, or `None` if the queue is empty.
    pub async fn pop_submitted(&self) -> Result<Option<TaskId>, AgentError> {
        match self.store.list_pop_right(SUBMITTED_QUEUE).await? {
            Some(Value::String(s)) => Ok(Some(parse_id(&s, "queued task id")?)),
            Some(other) => Err(AgentError::permanent(ErrorCode::Internal, format!("unexpected queue entry shape: {other}"))),
            None => Ok(None),
        }
    }

    /// Transition `task` to `status`, appending `message` to its history if
    /// given, and persist the result.
    pub async fn update_status(
        &self,
        mut task: Task,
        status: TaskStatus,
        message: Option<StatusMessage>,
        now: DateTime<Utc>,
    ) -> Result<Task, AgentError> {
        task.transition(status, message, now)?;
        self.persist(&task).await?;
        Ok(task)
    }

    /// Attach `artifact` to `task` and persist the result.
    pub async fn add_artifact(&self, mut task: Task, artifact: Artifact, now: DateTime<Utc>) -> Result<Task, AgentError> {
        task.add_artifact(artifact, now);
        self.persist(&task).await?;
        Ok(task)
    }

    /// Record that `context_id` is associated with `request_id`, with the
    /// mapping's TTL set to the signing TTL.
    pub async fn set_context_request(&self, context_id: &str, request_id: RequestId, ttl: Duration) -> Result<(), AgentError> {
        self.store
            .set(&context_key(context_id), Value::from(request_id.to_string()), Some(ttl))
            .await
    }

    /// Resolve the request id previously associated with `context_id`, if any.
    pub async fn context_request(&self, context_id: &str) -> Result<Option<RequestId>, AgentError> {
        match self.store.get(&context_key(context_id)).await? {
            Some(Value::String(s)) => Ok(Some(parse_id(&s, "context mapping")?)),
            Some(other) => Err(AgentError::permanent(ErrorCode::Internal, format!("unexpected context mapping shape: {other}"))),
            None => Ok(None),
        }
    }
}
