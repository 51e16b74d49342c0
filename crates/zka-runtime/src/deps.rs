// SPDX-License-Identifier: MIT OR Apache-2.0
//! The `Deps` bundle every skill handler, the worker pool, and the flow
//! orchestrator are called with. Per §9, cross-component dependencies are
//! always injected explicitly here — never reached for as a module-scoped
//! singleton.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use zka_config::Config;
use zka_error::AgentError;
use zka_kv::KvStore;
use zka_tee::TeeProvider;

use crate::flow::FlowOrchestrator;
use crate::store::TaskStore;

/// Injectable source of the current time. Real code uses [`SystemClock`];
/// tests substitute a fixed instant.
pub trait Clock: Send + Sync {
    /// The current time.
    fn now(&self) -> DateTime<Utc>;
}

/// [`Clock`] backed by the system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock fixed to one instant, for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// On-chain proof verification (C10), kept as a local trait so this crate
/// never depends on `zka-chain`'s RPC client internals directly.
#[async_trait]
pub trait ChainVerifier: Send + Sync {
    /// Call the verifier contract for `(chain_id, circuit_id)` against the
    /// given hex-encoded proof and public inputs.
    async fn verify(
        &self,
        chain_id: u64,
        circuit_id: &str,
        proof_hex: &str,
        public_inputs_hex: &[String],
    ) -> Result<bool, AgentError>;

    /// The verifier contract address for `(chain_id, circuit_id)`, surfaced
    /// in `get_supported_circuits`/`verify_proof` responses.
    fn verifier_address(&self, chain_id: u64, circuit_id: &str) -> Result<String, AgentError>;
}

/// Best-effort reputation increment (C12). Failures are logged by the
/// implementation and never surfaced here.
pub trait ReputationHook: Send + Sync {
    /// Record a successful `generate_proof` completion, fire-and-forget.
    fn record_success(&self);
}

/// A [`ReputationHook`] that does nothing, used when no reputation registry
/// is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReputationHook;

impl ReputationHook for NoopReputationHook {
    fn record_success(&self) {}
}

/// Fetches an externally attested credential document for a proof request.
/// Stubbed/mocked at the boundary per §1 — this crate only defines the seam.
#[async_trait]
pub trait AttestationBackend: Send + Sync {
    /// Fetch the attestation payload backing `scope`, if the backend has one.
    async fn fetch(&self, scope: &str) -> Result<Option<Value>, AgentError>;
}

/// An [`AttestationBackend`] that never has anything on file, used when no
/// attestation endpoint is reachable (e.g. in disabled/dev configurations).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAttestationBackend;

#[async_trait]
impl AttestationBackend for NoopAttestationBackend {
    async fn fetch(&self, _scope: &str) -> Result<Option<Value>, AgentError> {
        Ok(None)
    }
}

/// Pluggable natural-language-to-skill router for the A2A frontend's
/// text-only message parts. `None` in [`Deps`] means free-text input fails
/// with a descriptive artifact rather than being silently dropped (§4.18).
#[async_trait]
pub trait LlmRouter: Send + Sync {
    /// Resolve free text into a `(skill, params)` invocation.
    async fn route(&self, text: &str) -> Result<(String, Value), AgentError>;
}

/// Everything a skill handler, the worker pool, or the flow orchestrator
/// needs, bundled so it can be passed by reference rather than reached for
/// through module-scoped state.
#[derive(Clone)]
pub struct Deps {
    /// Raw KV handle, for components (payment facilitator, rate limiter,
    /// proof cache) that build short-lived borrowing wrappers over it.
    pub kv: Arc<dyn KvStore>,
    /// Task persistence (C13).
    pub tasks: Arc<TaskStore>,
    /// Signing/payment/flow persistence and auto-advance (C17).
    pub flows: Arc<FlowOrchestrator>,
    /// Per-task event bus (C14).
    pub bus: Arc<zka_bus::EventBus>,
    /// Process-wide configuration, loaded once at startup.
    pub config: Arc<Config>,
    /// Current-time source.
    pub clock: Arc<dyn Clock>,
    /// TEE delegation (C7), already wired to the local prover driver or an
    /// enclave connection depending on `config.tee_mode`.
    pub tee: Arc<dyn TeeProvider>,
    /// On-chain verifier (C10).
    pub chain_verifier: Arc<dyn ChainVerifier>,
    /// Reputation hook (C12).
    pub reputation: Arc<dyn ReputationHook>,
    /// Attestation backend (C8's upstream data source).
    pub attestation: Arc<dyn AttestationBackend>,
    /// Optional free-text-to-skill router for the A2A frontend.
    pub llm_router: Option<Arc<dyn LlmRouter>>,
}

impl Deps {
    /// Current time, per the injected [`Clock`].
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
