// SPDX-License-Identifier: MIT OR Apache-2.0
//! Worker pool (C15): parallel pollers draining the submitted-task queue,
//! guarded by an in-memory single-flight processing set, dispatching to a
//! [`SkillHandler`] and publishing lifecycle events on the [`zka_bus::EventBus`].

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use zka_bus::TaskEvent;
use zka_core::{Artifact, StatusMessage, Task, TaskId, TaskStatus};
use zka_error::AgentError;

use crate::deps::Deps;

/// Default interval between queue-poll attempts when the queue was last
/// found empty.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// What a skill handler decided for one dispatched task.
pub enum SkillOutcome {
    /// The skill finished; attach `artifacts` in order and transition to `completed`.
    Completed {
        /// Artifacts to attach, in emission order.
        artifacts: Vec<Artifact>,
    },
    /// The skill failed; attach `artifact` (typically a descriptive text
    /// part) and transition to `failed`.
    Failed {
        /// Failure artifact.
        artifact: Artifact,
    },
    /// The skill needs out-of-band user action (signing, payment) before it
    /// can proceed; transition to the quiescent `input-required` terminal
    /// without attaching artifacts or completing the task.
    InputRequired,
}

impl SkillOutcome {
    /// Build a `Failed` outcome from an [`AgentError`], rendering its
    /// message as a text artifact.
    #[must_use]
    pub fn from_error(err: &AgentError) -> Self {
        Self::Failed {
            artifact: Artifact::text("text/plain", err.message.clone()),
        }
    }
}

/// Business logic for one skill invocation, dispatched once per task by the
/// worker pool.
#[async_trait]
pub trait SkillHandler: Send + Sync {
    /// Execute `task.skill` against `task.params`, returning the outcome to
    /// drive the task's final transition.
    async fn dispatch(&self, task: &Task, deps: &Deps) -> SkillOutcome;
}

/// Drains the submitted-task queue with `worker_count` concurrent pollers.
pub struct WorkerPool {
    deps: Deps,
    handler: Arc<dyn SkillHandler>,
    processing: Arc<Mutex<HashSet<TaskId>>>,
    poll_interval: Duration,
}

impl WorkerPool {
    /// Construct a pool over `deps`, dispatching every dequeued task to `handler`.
    pub fn new(deps: Deps, handler: Arc<dyn SkillHandler>) -> Self {
        Self {
            deps,
            handler,
            processing: Arc::new(Mutex::new(HashSet::new())),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the default poll interval (used by tests to avoid real sleeps).
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Run `worker_count` concurrent poll loops until the process shuts down.
    /// Each loop is an independent `tokio` task so the pool achieves genuine
    /// parallelism on a multi-threaded runtime.
    pub async fn run(self: Arc<Self>, worker_count: usize) {
        let mut handles = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let pool = Arc::clone(&self);
            handles.push(tokio::spawn(async move { pool.run_one(worker_id).await }));
        }
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "worker pool task panicked");
            }
        }
    }

    async fn run_one(&self, worker_id: usize) {
        loop {
            match self.poll_once().await {
                Ok(true) => {}
                Ok(false) => tokio::time::sleep(self.poll_interval).await,
                Err(e) => {
                    warn!(worker_id, error = %e, "worker poll cycle failed");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    /// Run a single dequeue-and-dispatch cycle. Returns `Ok(true)` if a task
    /// was processed (or dropped), `Ok(false)` if the queue was empty.
    pub async fn poll_once(&self) -> Result<bool, AgentError> {
        let Some(task_id) = self.deps.tasks.pop_submitted().await? else {
            return Ok(false);
        };

        let Some(task) = self.deps.tasks.get_task(task_id).await? else {
            debug!(%task_id, "dequeued task vanished before processing");
            return Ok(true);
        };

        if task.status != TaskStatus::Queued {
            debug!(%task_id, status = %task.status, "dropping dequeued task not in queued state");
            return Ok(true);
        }

        {
            let mut processing = self.processing.lock().await;
            if !processing.insert(task_id) {
                debug!(%task_id, "task already being processed by another worker, dropping");
                return Ok(true);
            }
        }

        self.process(task).await;

        self.processing.lock().await.remove(&task_id);
        Ok(true)
    }

    /// Dispatch `task` immediately, bypassing the submitted-queue poll cycle,
    /// and return its persisted final state. Frontends that promise a
    /// synchronous result (A2A `message/send`, `POST /api/v1/proofs`, MCP
    /// `tools/call`) call this directly instead of enqueuing and polling;
    /// the single-flight guard is unnecessary here because the caller itself
    /// is the sole owner of this task id until it returns.
    pub async fn run_task_now(&self, task: Task) -> Result<Task, AgentError> {
        let task_id = task.id;
        self.process(task).await;
        self.deps.tasks.require_task(task_id).await
    }

    async fn process(&self, task: Task) {
        let task_id = task.id;
        let now = self.deps.now();

        let task = match self
            .deps
            .tasks
            .update_status(task, TaskStatus::Running, Some(StatusMessage::agent_text("processing", now)), now)
            .await
        {
            Ok(t) => t,
            Err(e) => {
                warn!(%task_id, error = %e, "failed to mark task running, abandoning cycle");
                return;
            }
        };
        self.deps.bus.publish(TaskEvent::StatusUpdate { task_id, status: TaskStatus::Running, is_final: false });

        let outcome = self.handler.dispatch(&task, &self.deps).await;

        match outcome {
            SkillOutcome::InputRequired => {
                // The handler may have attached artifacts directly (e.g. a
                // signing-session link) against the store, bypassing this
                // loop's own `task` binding — reload before transitioning so
                // that persist doesn't clobber them with the pre-dispatch copy.
                let task = match self.deps.tasks.get_task(task_id).await {
                    Ok(Some(t)) => t,
                    Ok(None) => {
                        warn!(%task_id, "task vanished before input-required transition");
                        return;
                    }
                    Err(e) => {
                        warn!(%task_id, error = %e, "failed to reload task before input-required transition");
                        return;
                    }
                };
                match self
                    .deps
                    .tasks
                    .update_status(task, TaskStatus::InputRequired, None, self.deps.now())
                    .await
                {
                    Ok(_) => {
                        self.deps.bus.publish(TaskEvent::StatusUpdate {
                            task_id,
                            status: TaskStatus::InputRequired,
                            is_final: true,
                        });
                    }
                    Err(e) => warn!(%task_id, error = %e, "failed to persist input-required transition"),
                }
            }
            SkillOutcome::Completed { artifacts } => {
                self.finish(task, TaskStatus::Completed, artifacts).await;
            }
            SkillOutcome::Failed { artifact } => {
                self.finish(task, TaskStatus::Failed, vec![artifact]).await;
            }
        }
    }

    async fn finish(&self, mut task: Task, terminal: TaskStatus, artifacts: Vec<Artifact>) {
        let task_id = task.id;
        let last_index = artifacts.len().checked_sub(1);
        for (i, artifact) in artifacts.into_iter().enumerate() {
            let is_last = Some(i) == last_index;
            match self.deps.tasks.add_artifact(task, artifact.clone(), self.deps.now()).await {
                Ok(updated) => {
                    task = updated;
                    self.deps.bus.publish(TaskEvent::ArtifactUpdate { task_id, artifact, last_chunk: is_last });
                }
                Err(e) => {
                    warn!(%task_id, error = %e, "failed to persist artifact");
                    return;
                }
            }
        }

        let task = match self.deps.tasks.update_status(task, terminal, None, self.deps.now()).await {
            Ok(t) => t,
            Err(e) => {
                warn!(%task_id, error = %e, "failed to persist terminal transition");
                return;
            }
        };
        self.deps.bus.publish(TaskEvent::StatusUpdate { task_id, status: terminal, is_final: true });
        info!(%task_id, status = %terminal, "task reached terminal state");
        self.deps.bus.publish(TaskEvent::TaskComplete { task_id, task });
    }
}
