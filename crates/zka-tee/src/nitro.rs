// SPDX-License-Identifier: MIT OR Apache-2.0
//! `nitro` TEE backend: delegates proof generation to an AWS-Nitro-style
//! enclave over a CBOR-framed vsock connection.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_vsock::{VsockAddr, VsockStream};
use tracing::warn;

use crate::{AttestationReport, ProveResult, TeeProvider};

/// Default timeout for the vsock round trip.
const VSOCK_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum EnclaveRequest<'a> {
    Prove { circuit_id: &'a str, inputs: &'a Value, request_id: &'a str },
    HealthCheck,
    GetAttestation,
    GenerateAttestation { proof_hash: &'a str },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum EnclaveResponse {
    Proof { proof: String, public_inputs: String, attestation_document: Option<String> },
    Error { error: String },
    Health { ok: bool },
    Attestation { document: Option<String> },
    AttestationReport { report: Option<AttestationReport> },
}

/// Delegates to an enclave reachable at `(cid, port)` over vsock.
pub struct NitroTee {
    cid: u32,
    port: u32,
}

impl NitroTee {
    /// Construct a backend targeting `cid`/`port`. Does not connect eagerly.
    #[must_use]
    pub fn new(cid: u32, port: u32) -> Self {
        Self { cid, port }
    }

    async fn roundtrip(&self, request: &EnclaveRequest<'_>) -> Result<EnclaveResponse, String> {
        let fut = async {
            let mut stream = VsockStream::connect(VsockAddr::new(self.cid, self.port))
                .await
                .map_err(|e| format!("vsock connect failed: {e}"))?;

            let mut buf = Vec::new();
            ciborium::into_writer(request, &mut buf).map_err(|e| format!("encode request: {e}"))?;
            let len = u32::try_from(buf.len()).map_err(|_| "request too large".to_string())?;
            stream.write_all(&len.to_be_bytes()).await.map_err(|e| format!("write frame len: {e}"))?;
            stream.write_all(&buf).await.map_err(|e| format!("write frame body: {e}"))?;

            let mut len_buf = [0u8; 4];
            stream.read_exact(&mut len_buf).await.map_err(|e| format!("read frame len: {e}"))?;
            let resp_len = u32::from_be_bytes(len_buf) as usize;
            let mut resp_buf = vec![0u8; resp_len];
            stream.read_exact(&mut resp_buf).await.map_err(|e| format!("read frame body: {e}"))?;

            ciborium::from_reader(resp_buf.as_slice()).map_err(|e| format!("decode response: {e}"))
        };

        match tokio::time::timeout(VSOCK_TIMEOUT, fut).await {
            Ok(result) => result,
            Err(_) => Err("vsock round trip timed out".to_string()),
        }
    }
}

#[async_trait]
impl TeeProvider for NitroTee {
    async fn prove(&self, circuit_id: &str, inputs: &Value, request_id: &str) -> ProveResult {
        let request = EnclaveRequest::Prove { circuit_id, inputs, request_id };
        match self.roundtrip(&request).await {
            Ok(EnclaveResponse::Proof { proof, public_inputs, attestation_document }) => {
                ProveResult::Proof { proof, public_inputs, attestation_document }
            }
            Ok(EnclaveResponse::Error { error }) => ProveResult::Error { error },
            Ok(_) => ProveResult::Error { error: "unexpected enclave response shape".to_string() },
            Err(error) => {
                warn!(error = %error, "nitro prove failed");
                ProveResult::Error { error }
            }
        }
    }

    async fn health_check(&self) -> bool {
        matches!(self.roundtrip(&EnclaveRequest::HealthCheck).await, Ok(EnclaveResponse::Health { ok: true }))
    }

    async fn get_attestation(&self) -> Option<String> {
        match self.roundtrip(&EnclaveRequest::GetAttestation).await {
            Ok(EnclaveResponse::Attestation { document }) => document,
            _ => None,
        }
    }

    async fn generate_attestation(&self, proof_hash: &str) -> Option<AttestationReport> {
        match self.roundtrip(&EnclaveRequest::GenerateAttestation { proof_hash }).await {
            Ok(EnclaveResponse::AttestationReport { report }) => report,
            _ => None,
        }
    }
}
