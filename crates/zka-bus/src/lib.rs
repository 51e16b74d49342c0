// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-task broadcast event bus.
//!
//! Each [`zka_core::TaskId`] gets its own `tokio::sync::broadcast` topic,
//! created lazily on first [`EventBus::subscribe`] or [`EventBus::publish`].
//! The bus makes no durability guarantees: a topic with no subscribers drops
//! its events silently, and a subscriber that falls behind skips ahead
//! (drops oldest) rather than stalling the publisher — the worker pool must
//! never block on a slow SSE client.

#![deny(unsafe_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;
use zka_core::{Artifact, Task, TaskId, TaskStatus};

/// Default per-topic channel capacity.
const DEFAULT_CAPACITY: usize = 64;

/// An event published for a single task.
#[derive(Debug, Clone)]
pub enum TaskEvent {
    /// The task's status changed. `is_final` mirrors `status.is_terminal()`
    /// at publish time and tells subscribers this may be the last update.
    StatusUpdate {
        /// The task this event concerns.
        task_id: TaskId,
        /// The new status.
        status: TaskStatus,
        /// Whether this is the task's terminal status update.
        is_final: bool,
    },
    /// An artifact was attached to the task.
    ArtifactUpdate {
        /// The task this event concerns.
        task_id: TaskId,
        /// The attached artifact.
        artifact: Artifact,
        /// Whether this is the last artifact chunk for a streamed artifact.
        last_chunk: bool,
    },
    /// The task reached a terminal state and its full record is available.
    TaskComplete {
        /// The task this event concerns.
        task_id: TaskId,
        /// The completed task.
        task: Task,
    },
}

impl TaskEvent {
    /// The task id this event concerns, regardless of variant.
    #[must_use]
    pub fn task_id(&self) -> TaskId {
        match self {
            Self::StatusUpdate { task_id, .. } | Self::ArtifactUpdate { task_id, .. } | Self::TaskComplete { task_id, .. } => {
                *task_id
            }
        }
    }
}

/// In-process publish/subscribe bus, one broadcast topic per [`TaskId`].
#[derive(Default)]
pub struct EventBus {
    topics: Mutex<HashMap<TaskId, broadcast::Sender<TaskEvent>>>,
}

impl EventBus {
    /// Construct an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<TaskId, broadcast::Sender<TaskEvent>>> {
        self.topics.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Subscribe to a task's topic, creating it if this is the first subscriber.
    #[must_use]
    pub fn subscribe(&self, task_id: TaskId) -> broadcast::Receiver<TaskEvent> {
        let mut topics = self.lock();
        topics
            .entry(task_id)
            .or_insert_with(|| broadcast::channel(DEFAULT_CAPACITY).0)
            .subscribe()
    }

    /// Publish an event to its task's topic. Silently dropped if no one is subscribed.
    pub fn publish(&self, event: TaskEvent) {
        let task_id = event.task_id();
        let mut topics = self.lock();
        let tx = topics.entry(task_id).or_insert_with(|| broadcast::channel(DEFAULT_CAPACITY).0);
        let _ = tx.send(event);
    }

    /// Drop a task's topic, releasing its channel. Existing receivers observe
    /// the channel closing (`RecvError::Closed`) rather than further events.
    pub fn remove_topic(&self, task_id: TaskId) {
        self.lock().remove(&task_id);
    }

    /// Number of subscribers currently listening on a task's topic.
    #[must_use]
    pub fn subscriber_count(&self, task_id: TaskId) -> usize {
        self.lock().get(&task_id).map_or(0, broadcast::Sender::receiver_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn now() -> chrono::DateTime<chrono::Utc> {
        chrono::DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&chrono::Utc)
    }

    #[tokio::test]
    async fn publish_with_no_subscriber_is_silently_dropped() {
        let bus = EventBus::new();
        let task_id = TaskId::new();
        bus.publish(TaskEvent::StatusUpdate {
            task_id,
            status: TaskStatus::Running,
            is_final: false,
        });
        // No panic, no error: nothing to assert on besides it not blocking.
    }

    #[tokio::test]
    async fn subscriber_receives_events_in_publication_order() {
        let bus = EventBus::new();
        let task_id = TaskId::new();
        let mut rx = bus.subscribe(task_id);

        bus.publish(TaskEvent::StatusUpdate {
            task_id,
            status: TaskStatus::Running,
            is_final: false,
        });
        let task = Task::new("ctx", "generate_proof", Value::Null, now());
        bus.publish(TaskEvent::ArtifactUpdate {
            task_id,
            artifact: Artifact::json("application/json", Value::Null),
            last_chunk: true,
        });
        bus.publish(TaskEvent::TaskComplete { task_id, task });

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, TaskEvent::StatusUpdate { is_final: false, .. }));
        let second = rx.recv().await.unwrap();
        assert!(matches!(second, TaskEvent::ArtifactUpdate { .. }));
        let third = rx.recv().await.unwrap();
        assert!(matches!(third, TaskEvent::TaskComplete { .. }));
    }

    #[tokio::test]
    async fn distinct_tasks_have_isolated_topics() {
        let bus = EventBus::new();
        let a = TaskId::new();
        let b = TaskId::new();
        let mut rx_a = bus.subscribe(a);
        let _rx_b = bus.subscribe(b);

        bus.publish(TaskEvent::StatusUpdate {
            task_id: b,
            status: TaskStatus::Running,
            is_final: false,
        });

        assert_eq!(bus.subscriber_count(a), 1);
        assert_eq!(bus.subscriber_count(b), 1);
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn remove_topic_closes_existing_subscribers() {
        let bus = EventBus::new();
        let task_id = TaskId::new();
        let mut rx = bus.subscribe(task_id);
        bus.remove_topic(task_id);
        assert!(matches!(rx.recv().await, Err(broadcast::error::RecvError::Closed)));
    }
}
