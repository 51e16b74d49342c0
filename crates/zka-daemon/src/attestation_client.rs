// SPDX-License-Identifier: MIT OR Apache-2.0
//! HTTP-backed [`AttestationBackend`] querying the configured attestation
//! endpoint for a scope's most recent Coinbase-issued EAS attestation.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use zka_error::{AgentError, ErrorCode};
use zka_runtime::deps::AttestationBackend;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Queries a GraphQL-style attestation endpoint by HTTP POST, treating any
/// transport failure or non-success status as [`ErrorCode::Transient`].
pub struct HttpAttestationBackend {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpAttestationBackend {
    /// Build a client against `endpoint`, or fail if the HTTP client cannot
    /// be constructed (e.g. an invalid TLS configuration).
    pub fn new(endpoint: impl Into<String>) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AgentError::permanent(ErrorCode::InvalidConfig, format!("build attestation http client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl AttestationBackend for HttpAttestationBackend {
    async fn fetch(&self, scope: &str) -> Result<Option<Value>, AgentError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("content-type", "application/json")
            .json(&serde_json::json!({ "scope": scope }))
            .send()
            .await
            .map_err(|e| AgentError::transient(ErrorCode::AttestationInvalid, format!("attestation endpoint request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AgentError::transient(
                ErrorCode::AttestationInvalid,
                format!("attestation endpoint returned {}", response.status()),
            ));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AgentError::transient(ErrorCode::AttestationInvalid, format!("decode attestation response: {e}")))?;

        if body.is_null() {
            return Ok(None);
        }
        Ok(Some(body))
    }
}
