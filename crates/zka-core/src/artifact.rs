// SPDX-License-Identifier: MIT OR Apache-2.0
//! Task artifacts: the output attached by a skill handler once per task.

use crate::task::Part;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A piece of output attached to a [`crate::task::Task`] by its worker.
///
/// Artifacts are attached once and never modified after attachment (the
/// worker pool enforces this by only ever pushing, never replacing, entries
/// in [`crate::task::Task::artifacts`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// Unique identifier for this artifact.
    pub id: Uuid,
    /// Overall MIME type (typically `application/json`).
    pub mime_type: String,
    /// Ordered parts making up the artifact body.
    pub parts: Vec<Part>,
}

impl Artifact {
    /// Build a JSON-valued artifact with a single data part.
    pub fn json(mime_type: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            mime_type: mime_type.into(),
            parts: vec![Part::data("application/json", data)],
        }
    }

    /// Build a plain-text artifact, used for validation failure messages.
    pub fn text(mime_type: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            mime_type: mime_type.into(),
            parts: vec![Part::text(text)],
        }
    }

    /// Extract the first data part's JSON value, if any.
    #[must_use]
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        self.parts.iter().find_map(|p| match p {
            Part::Data { data, .. } => Some(data),
            Part::Text { .. } => None,
        })
    }
}
