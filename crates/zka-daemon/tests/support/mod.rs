// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared `AppState`/`Router` fixture for the daemon's integration tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use chrono::DateTime;
use zka_daemon::{build_app, AppState};
use zka_error::AgentError;
use zka_kv::MemoryKvStore;
use zka_runtime::deps::{ChainVerifier, Deps, FixedClock, NoopAttestationBackend, NoopReputationHook};
use zka_runtime::flow::FlowOrchestrator;
use zka_runtime::pool::WorkerPool;
use zka_runtime::store::TaskStore;
use zka_skills::Skills;
use zka_tee::{AttestationReport, ProveResult, TeeProvider};

pub fn now() -> DateTime<chrono::Utc> {
    DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&chrono::Utc)
}

struct StubTee;

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

struct StubChainVerifier;

#[async_trait]
impl ChainVerifier for StubChainVerifier {
    async fn verify(&self, _chain_id: u64, _circuit_id: &str, _proof_hex: &str, _public_inputs_hex: &[String]) -> Result<bool, AgentError> {
        Ok(true)
    }

    fn verifier_address(&self, chain_id: u64, circuit_id: &str) -> Result<String, AgentError> {
        Ok(format!("0x{chain_id:x}{circuit_id}"))
    }
}

fn test_config(payment_mode: zka_config::PaymentMode) -> zka_config::Config {
    zka_config::Config {
        payment_mode,
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

fn test_deps(payment_mode: zka_config::PaymentMode) -> Deps {
    let kv: Arc<dyn zka_kv::KvStore> = Arc::new(MemoryKvStore::new());
    Deps {
        kv: Arc::clone(&kv),
        tasks: Arc::new(TaskStore::new(Arc::clone(&kv))),
        flows: Arc::new(FlowOrchestrator::new(Arc::clone(&kv), Duration::from_secs(300))),
        bus: Arc::new(zka_bus::EventBus::new()),
        config: Arc::new(test_config(payment_mode)),
        clock: Arc::new(FixedClock(now())),
        tee: Arc::new(StubTee),
        chain_verifier: Arc::new(StubChainVerifier),
        reputation: Arc::new(NoopReputationHook),
        attestation: Arc::new(NoopAttestationBackend),
        llm_router: None,
    }
}

/// Build a full router with payments disabled, over a fresh in-memory
/// `Deps` bundle and a real `Skills` dispatcher.
pub fn app() -> Router {
    let deps = test_deps(zka_config::PaymentMode::Disabled);
    let pool = Arc::new(WorkerPool::new(deps.clone(), Arc::new(Skills)));
    let state = Arc::new(AppState::new(deps, pool));
    build_app(state)
}

/// Same as [`app`] but with `testnet` payment enforcement, for exercising
/// the 402 challenge path on `generate_proof`.
pub fn app_payments_enabled() -> Router {
    let deps = test_deps(zka_config::PaymentMode::Testnet);
    let pool = Arc::new(WorkerPool::new(deps.clone(), Arc::new(Skills)));
    let state = Arc::new(AppState::new(deps, pool));
    build_app(state)
}
