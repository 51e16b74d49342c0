// SPDX-License-Identifier: MIT OR Apache-2.0
//! Skill handlers (C16): the business logic behind every operation this
//! agent exposes, written once and called identically by the REST, A2A, and
//! MCP frontends — synchronously for the five free skills, and through the
//! worker pool's [`zka_runtime::pool::SkillHandler`] for `generate_proof`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod circuits;
pub mod derive;
pub mod generate;
pub mod payment;
pub mod signing;
pub mod status;
pub mod verify;

use async_trait::async_trait;
use zka_core::{Artifact, Task};
use zka_error::{AgentError, ErrorCode};
use zka_runtime::deps::Deps;
use zka_runtime::pool::{SkillHandler, SkillOutcome};

/// Stable names of the six skills, matched against `Task::skill` and used by
/// frontends to build their tool/method listings.
pub const SKILL_NAMES: &[&str] = &[
    "get_supported_circuits",
    "verify_proof",
    "request_signing",
    "check_status",
    "request_payment",
    "generate_proof",
];

/// Adapts a free skill's `Result<Value, AgentError>` into the outcome shape
/// the worker pool expects when a free skill is also dispatched as a task
/// (e.g. from an A2A `message/send` call).
fn completed_or_failed(result: Result<serde_json::Value, AgentError>) -> SkillOutcome {
    match result {
        Ok(value) => SkillOutcome::Completed {
            artifacts: vec![Artifact::json("application/json", value)],
        },
        Err(e) => SkillOutcome::from_error(&e),
    }
}

/// Dispatches every skill by name over a shared [`Deps`] bundle. Stateless:
/// all per-call state lives in `Deps` or the dispatched `Task`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Skills;

#[async_trait]
impl SkillHandler for Skills {
    async fn dispatch(&self, task: &Task, deps: &Deps) -> SkillOutcome {
        match task.skill.as_str() {
            "get_supported_circuits" => completed_or_failed(circuits::get_supported_circuits(deps, &task.params).await),
            "verify_proof" => completed_or_failed(verify::verify_proof(deps, &task.params).await),
            "request_signing" => completed_or_failed(signing::request_signing(deps, &task.params).await),
            "check_status" => completed_or_failed(status::check_status(deps, &task.params).await),
            "request_payment" => completed_or_failed(payment::request_payment(deps, &task.params).await),
            "generate_proof" => generate::generate_proof(task, deps).await,
            other => SkillOutcome::from_error(&AgentError::validation(
                ErrorCode::InvalidParam,
                format!("unknown skill: {other}"),
            )),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests_support;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skill_names_cover_every_dispatch_arm() {
        assert_eq!(SKILL_NAMES.len(), 6);
        assert!(SKILL_NAMES.contains(&"generate_proof"));
    }
}
