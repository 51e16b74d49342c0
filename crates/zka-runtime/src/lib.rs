// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
//! Task store, worker pool, and flow orchestrator: the plumbing between the
//! protocol frontends and the skill handlers.

pub mod deps;
pub mod flow;
pub mod pool;
pub mod store;

pub use deps::{
    AttestationBackend, ChainVerifier, Clock, Deps, FixedClock, LlmRouter, NoopAttestationBackend, NoopReputationHook,
    ReputationHook, SystemClock,
};
pub use flow::FlowOrchestrator;
pub use pool::{SkillHandler, SkillOutcome, WorkerPool, DEFAULT_POLL_INTERVAL};
pub use store::{TaskStore, SUBMITTED_QUEUE, TASK_TTL};
