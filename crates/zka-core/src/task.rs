// SPDX-License-Identifier: MIT OR Apache-2.0
//! The [`Task`] lifecycle: the durable unit of work shared by every frontend
//! and the worker pool.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a [`Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
    /// Generate a fresh, random task id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::str::FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Lifecycle state of a [`Task`].
///
/// ```text
/// queued ──► running ──► completed
///                   ├──► failed
///                   ├──► input-required
///                   └──► canceled
/// queued ──────────────► canceled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    /// Persisted and enqueued; not yet picked up by a worker.
    Queued,
    /// A worker has claimed the task and is executing the skill handler.
    Running,
    /// Terminal: the skill handler finished successfully.
    Completed,
    /// Terminal: the skill handler returned an error.
    Failed,
    /// Quiescent terminal: the task is waiting on out-of-band user action
    /// (e.g. a signing or payment redirect) and will not be resumed itself.
    InputRequired,
    /// Terminal: canceled before or during execution.
    Canceled,
}

impl TaskStatus {
    /// `true` once a task has reached any state from which it cannot transition again.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::InputRequired | Self::Canceled
        )
    }

    /// Whether `self -> next` is a legal transition per the state machine above.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use TaskStatus::*;
        match self {
            Queued => matches!(next, Running | Canceled),
            Running => matches!(next, Completed | Failed | InputRequired | Canceled),
            Completed | Failed | InputRequired | Canceled => false,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::InputRequired => "input-required",
            Self::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

/// Who authored a [`StatusMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Emitted by the agent (skill handler / worker pool).
    Agent,
    /// Supplied by the caller.
    User,
}

/// One part of a [`StatusMessage`] or [`crate::artifact::Artifact`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Part {
    /// Plain text.
    Text {
        /// The text content.
        text: String,
    },
    /// Structured binary/JSON payload.
    Data {
        /// MIME type of `data`.
        mime_type: String,
        /// Opaque payload, typically a JSON object embedded as a `Value`.
        data: Value,
    },
}

impl Part {
    /// Construct a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Construct a data part.
    pub fn data(mime_type: impl Into<String>, data: Value) -> Self {
        Self::Data {
            mime_type: mime_type.into(),
            data,
        }
    }
}

/// A chronological history entry appended on every task status transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusMessage {
    /// Who produced this message.
    pub role: Role,
    /// Ordered message parts.
    pub parts: Vec<Part>,
    /// When the message was recorded.
    pub timestamp: DateTime<Utc>,
}

impl StatusMessage {
    /// Build an agent-authored status message with a single text part.
    pub fn agent_text(text: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            role: Role::Agent,
            parts: vec![Part::text(text)],
            timestamp: now,
        }
    }
}

/// The durable unit of work processed by the worker pool.
///
/// See module docs on [`TaskStatus`] for the lifecycle state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier.
    pub id: TaskId,
    /// Grouping key for a multi-turn conversation.
    pub context_id: String,
    /// The skill (operation name) this task invokes.
    pub skill: String,
    /// Opaque JSON params passed to the skill handler.
    pub params: Value,
    /// Current lifecycle state.
    pub status: TaskStatus,
    /// Chronological status messages.
    pub history: Vec<StatusMessage>,
    /// Ordered artifacts attached by the worker. Never mutated after attachment.
    pub artifacts: Vec<crate::artifact::Artifact>,
    /// Free-form metadata (e.g. payment-skipped flag, cache hit flag).
    #[serde(default)]
    pub metadata: Value,
    /// When the task was created.
    pub created_at: DateTime<Utc>,
    /// Last time the task was mutated.
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Construct a new task in the `queued` state.
    pub fn new(context_id: impl Into<String>, skill: impl Into<String>, params: Value, now: DateTime<Utc>) -> Self {
        Self::with_id(TaskId::new(), context_id, skill, params, now)
    }

    /// Construct a new task in the `queued` state under a caller-supplied
    /// id, for callers (the flow orchestrator) that must mint the id before
    /// the task itself exists.
    pub fn with_id(id: TaskId, context_id: impl Into<String>, skill: impl Into<String>, params: Value, now: DateTime<Utc>) -> Self {
        Self {
            id,
            context_id: context_id.into(),
            skill: skill.into(),
            params,
            status: TaskStatus::Queued,
            history: Vec::new(),
            artifacts: Vec::new(),
            metadata: Value::Object(Default::default()),
            created_at: now,
            updated_at: now,
        }
    }

    /// Attempt to transition to `next`, appending `message` to history and
    /// bumping `updated_at`. Returns an error if the transition is illegal
    /// per [`TaskStatus::can_transition_to`].
    pub fn transition(
        &mut self,
        next: TaskStatus,
        message: Option<StatusMessage>,
        now: DateTime<Utc>,
    ) -> Result<(), zka_error::AgentError> {
        if !self.status.can_transition_to(next) {
            return Err(zka_error::AgentError::invalid_state(
                zka_error::ErrorCode::TaskTerminal,
                format!("cannot transition task {} from {} to {next}", self.id, self.status),
            ));
        }
        self.status = next;
        if let Some(m) = message {
            self.history.push(m);
        }
        self.updated_at = now;
        Ok(())
    }

    /// Append an artifact. Artifacts are never modified after attachment.
    pub fn add_artifact(&mut self, artifact: crate::artifact::Artifact, now: DateTime<Utc>) {
        self.artifacts.push(artifact);
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc)
    }

    #[test]
    fn queued_can_only_reach_running_or_canceled() {
        assert!(TaskStatus::Queued.can_transition_to(TaskStatus::Running));
        assert!(TaskStatus::Queued.can_transition_to(TaskStatus::Canceled));
        assert!(!TaskStatus::Queued.can_transition_to(TaskStatus::Completed));
    }

    #[test]
    fn terminal_states_never_transition() {
        for terminal in [
            TaskStatus::Completed,
            TaskStatus::Failed,
            TaskStatus::InputRequired,
            TaskStatus::Canceled,
        ] {
            for next in [
                TaskStatus::Queued,
                TaskStatus::Running,
                TaskStatus::Completed,
                TaskStatus::Failed,
                TaskStatus::InputRequired,
                TaskStatus::Canceled,
            ] {
                assert!(!terminal.can_transition_to(next), "{terminal} -> {next} should be illegal");
            }
        }
    }

    #[test]
    fn transition_rejects_illegal_move_and_leaves_state_untouched() {
        let mut task = Task::new("ctx", "generate_proof", Value::Null, now());
        task.transition(TaskStatus::Completed, None, now()).unwrap_err();
        assert_eq!(task.status, TaskStatus::Queued);
    }

    #[test]
    fn transition_records_history_and_updated_at() {
        let mut task = Task::new("ctx", "generate_proof", Value::Null, now());
        let later = now() + chrono::Duration::seconds(5);
        task.transition(TaskStatus::Running, Some(StatusMessage::agent_text("starting", later)), later)
            .unwrap();
        assert_eq!(task.status, TaskStatus::Running);
        assert_eq!(task.history.len(), 1);
        assert_eq!(task.updated_at, later);
    }
}
