// SPDX-License-Identifier: MIT OR Apache-2.0
//! TEE provider abstraction (C7): a uniform `prove`/`health_check`/
//! `get_attestation`/`generate_attestation` interface over `disabled`,
//! `local`, and `nitro` backends.

#![deny(unsafe_code)]

mod nitro;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use zka_error::AgentError;

pub use nitro::NitroTee;

/// Outcome of one `prove` call, mirroring the enclave's own tagged result
/// shape rather than a `Result` so a TEE-side error is indistinguishable from
/// a local one at the call site.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProveResult {
    /// Proof generation succeeded.
    Proof {
        /// Hex-encoded proof bytes.
        proof: String,
        /// Hex-encoded public inputs.
        public_inputs: String,
        /// Base64 COSE_Sign1 attestation document, present only for `nitro`.
        attestation_document: Option<String>,
    },
    /// Proof generation failed.
    Error {
        /// Human-readable failure reason.
        error: String,
    },
}

/// One enclave attestation, bound to a specific proof by its hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttestationReport {
    /// Base64 COSE_Sign1 attestation document.
    pub document: String,
    /// The backend that produced it (`"local"` or `"nitro"`).
    pub mode: String,
    /// Hex hash of the proof this attestation covers.
    pub proof_hash: String,
    /// When the attestation was produced.
    pub timestamp: DateTime<Utc>,
}

/// Uniform interface over the three TEE backends.
#[async_trait]
pub trait TeeProvider: Send + Sync {
    /// Generate a proof for `circuit_id` given `inputs`.
    async fn prove(&self, circuit_id: &str, inputs: &Value, request_id: &str) -> ProveResult;

    /// Lightweight reachability probe, used to resolve `teeMode=auto`.
    async fn health_check(&self) -> bool;

    /// Fetch the backend's current attestation document, if it has one at rest.
    async fn get_attestation(&self) -> Option<String>;

    /// Ask the backend to attest to a specific proof by hash.
    async fn generate_attestation(&self, proof_hash: &str) -> Option<AttestationReport>;
}

/// Abstraction over the in-process ZK prover subprocess driver (C9), the
/// delegate `LocalTee` calls into. Kept as a local trait so this crate never
/// depends on the prover driver's process-management internals.
#[async_trait]
pub trait ProverDriver: Send + Sync {
    /// Run the prover for `circuit_id` given `inputs`, returning hex-encoded
    /// proof and public-inputs strings.
    async fn prove(&self, circuit_id: &str, inputs: &Value) -> Result<(String, String), AgentError>;
}

/// `disabled` TEE backend: every `prove` call fails, nothing else is available.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledTee;

#[async_trait]
impl TeeProvider for DisabledTee {
    async fn prove(&self, _circuit_id: &str, _inputs: &Value, _request_id: &str) -> ProveResult {
        ProveResult::Error { error: "TEE provider is disabled".to_string() }
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

/// `local` TEE backend: proves in-process via a [`ProverDriver`], yields no
/// attestation (there is no enclave to attest to).
pub struct LocalTee {
    driver: Box<dyn ProverDriver>,
}

impl LocalTee {
    /// Wrap a concrete prover driver.
    #[must_use]
    pub fn new(driver: Box<dyn ProverDriver>) -> Self {
        Self { driver }
    }
}

#[async_trait]
impl TeeProvider for LocalTee {
    async fn prove(&self, circuit_id: &str, inputs: &Value, _request_id: &str) -> ProveResult {
        match self.driver.prove(circuit_id, inputs).await {
            Ok((proof, public_inputs)) => ProveResult::Proof { proof, public_inputs, attestation_document: None },
            Err(e) => ProveResult::Error { error: e.message },
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

#[cfg(test)]
mod tests {
    use super::*;

    struct StubDriver {
        fail: bool,
    }

    #[async_trait]
    impl ProverDriver for StubDriver {
        async fn prove(&self, _circuit_id: &str, _inputs: &Value) -> Result<(String, String), AgentError> {
            if self.fail {
                Err(AgentError::permanent(zka_error::ErrorCode::ProverFailed, "boom"))
            } else {
                Ok(("deadbeef".to_string(), "cafebabe".to_string()))
            }
        }
    }

    #[tokio::test]
    async fn disabled_tee_errors_on_every_prove() {
        let tee = DisabledTee;
        assert!(!tee.health_check().await);
        let result = tee.prove("coinbase_attestation", &Value::Null, "req-1").await;
        assert!(matches!(result, ProveResult::Error { .. }));
    }

    #[tokio::test]
    async fn local_tee_delegates_to_prover_driver() {
        let tee = LocalTee::new(Box::new(StubDriver { fail: false }));
        assert!(tee.health_check().await);
        assert!(tee.get_attestation().await.is_none());
        let result = tee.prove("coinbase_attestation", &Value::Null, "req-1").await;
        match result {
            ProveResult::Proof { proof, public_inputs, attestation_document } => {
                assert_eq!(proof, "deadbeef");
                assert_eq!(public_inputs, "cafebabe");
                assert!(attestation_document.is_none());
            }
            ProveResult::Error { .. } => panic!("expected success"),
        }
    }

    #[tokio::test]
    async fn local_tee_surfaces_driver_failure_as_error_variant() {
        let tee = LocalTee::new(Box::new(StubDriver { fail: true }));
        let result = tee.prove("coinbase_attestation", &Value::Null, "req-1").await;
        assert!(matches!(result, ProveResult::Error { .. }));
    }
}
