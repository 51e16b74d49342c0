// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared `Deps` fixture for every skill's test module.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use zka_error::AgentError;
use zka_kv::{KvStore, MemoryKvStore};
use zka_runtime::{ChainVerifier, Deps, FixedClock, FlowOrchestrator, NoopAttestationBackend, NoopReputationHook, TaskStore};
use zka_tee::{AttestationReport, ProveResult, TeeProvider};

pub fn now() -> DateTime<chrono::Utc> {
    DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&chrono::Utc)
}

/// A [`ChainVerifier`] whose `verify` outcome is fixed at construction and
/// whose address is a deterministic function of `(chain_id, circuit_id)`.
pub struct StubChainVerifier {
    pub valid: bool,
}

#[async_trait]
impl ChainVerifier for StubChainVerifier {
    async fn verify(&self, _chain_id: u64, _circuit_id: &str, _proof_hex: &str, _public_inputs_hex: &[String]) -> Result<bool, AgentError> {
        Ok(self.valid)
    }

    fn verifier_address(&self, chain_id: u64, circuit_id: &str) -> Result<String, AgentError> {
        Ok(format!("0x{chain_id:x}{circuit_id}"))
    }
}

/// A [`TeeProvider`] that always succeeds with fixed hex proof material.
pub struct StubTee;

#[async_trait]
impl TeeProvider for StubTee {
    async fn prove(&self, _circuit_id: &str, _inputs: &serde_json::Value, _request_id: &str) -> ProveResult {
        ProveResult::Proof {
            proof: "deadbeef".to_string(),
            public_inputs: "cafebabe".to_string(),
            attestation_document: None,
        }
    }

    async fn health_check(&self) -> bool {
        true
    }

    async fn get_attestation(&self) -> Option<String> {
        None
    }

    async fn generate_attestation(&self, _proof_hash: &str) -> Option<AttestationReport> {
        None
    }
}

/// A [`TeeProvider`] that always fails, for exercising the `Failed` path.
pub struct FailingTee;

#[async_trait]
impl TeeProvider for FailingTee {
    async fn prove(&self, _circuit_id: &str, _inputs: &serde_json::Value, _request_id: &str) -> ProveResult {
        ProveResult::Error { error: "prover subprocess exited non-zero".to_string() }
    }

    async fn health_check(&self) -> bool {
        false
    }

    async fn get_attestation(&self) -> Option<String> {
        None
    }

    async fn generate_attestation(&self, _proof_hash: &str) -> Option<AttestationReport> {
        None
    }
}

fn test_config() -> zka_config::Config {
    zka_config::Config {
        payment_mode: zka_config::PaymentMode::Disabled,
        kv_store_url: "memory://".into(),
        chain_rpc_url: "http://localhost".into(),
        attestation_endpoint: "http://localhost".into(),
        nullifier_registry_address: "0x0".into(),
        prover_private_key: "deadbeef".into(),
        public_base_url: "https://agent.example".into(),
        port: 4002,
        tee_mode: zka_config::TeeMode::Disabled,
        enclave_cid: None,
        enclave_port: 5000,
        signing_ttl_secs: 300,
        facilitator_url: None,
        payment_pay_to: Some("0xpayee".into()),
        proof_price: "$0.10".into(),
        identity_registry_address: None,
        reputation_registry_address: None,
        settlement_operator_address: None,
        settlement_usdc_address: None,
        agent_version: "test".into(),
        prover_witness_gen_bin: "witness-gen".into(),
        prover_bin: "prove".into(),
    }
}

/// Build a [`Deps`] bundle over an in-memory KV store, a deterministic clock,
/// payments disabled, and a valid chain verifier / always-succeeding TEE.
pub fn test_deps() -> Deps {
    let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
    Deps {
        kv: Arc::clone(&kv),
        tasks: Arc::new(TaskStore::new(Arc::clone(&kv))),
        flows: Arc::new(FlowOrchestrator::new(Arc::clone(&kv), Duration::from_secs(300))),
        bus: Arc::new(zka_bus::EventBus::new()),
        config: Arc::new(test_config()),
        clock: Arc::new(FixedClock(now())),
        tee: Arc::new(StubTee),
        chain_verifier: Arc::new(StubChainVerifier { valid: true }),
        reputation: Arc::new(NoopReputationHook),
        attestation: Arc::new(NoopAttestationBackend),
        llm_router: None,
    }
}

/// Same as [`test_deps`] but with payments enforced in `testnet` mode.
pub fn test_deps_payments_enabled() -> Deps {
    let mut deps = test_deps();
    let mut cfg = test_config();
    cfg.payment_mode = zka_config::PaymentMode::Testnet;
    deps.config = Arc::new(cfg);
    deps
}
