// SPDX-License-Identifier: MIT OR Apache-2.0
//! Full attestation verification: signature, certificate chain, PCRs, and
//! timestamp freshness.

use chrono::{DateTime, Utc};
use p384::ecdsa::signature::Verifier;
use p384::ecdsa::{Signature, VerifyingKey};
use std::collections::BTreeMap;
use std::time::Duration;
use zka_error::{AgentError, ErrorCode};

use crate::cose::{decode_envelope, sig_structure, verify_alg_is_es384};
use crate::document::AttestationDocument;

/// Default maximum age of an attestation document's timestamp.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(5);

/// Per-dimension verification outcome, plus the overall verdict.
#[derive(Debug, Clone)]
pub struct VerificationResult {
    /// Overall pass/fail, true only if every dimension below passed.
    pub is_valid: bool,
    /// The ES384 signature verified against the leaf certificate's public key.
    pub signature_valid: bool,
    /// The certificate chain verified from the leaf up to the bundle's root.
    pub chain_valid: bool,
    /// Every expected PCR matched exactly.
    pub pcrs_valid: bool,
    /// The document's timestamp was within `maxAge` of `now`.
    pub timestamp_valid: bool,
    /// The first failure encountered, short-circuiting later dimensions.
    pub error: Option<String>,
    /// The parsed document, present once the payload CBOR itself decoded
    /// successfully (even if a later dimension failed).
    pub document: Option<AttestationDocument>,
}

impl VerificationResult {
    fn failure(error: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            signature_valid: false,
            chain_valid: false,
            pcrs_valid: false,
            timestamp_valid: false,
            error: Some(error.into()),
            document: None,
        }
    }
}

/// Verify a base64 COSE_Sign1 attestation document against `expected_pcrs`
/// (exact match required for every listed index), treating it stale if its
/// `timestamp` is older than `max_age` relative to `now`.
#[must_use]
pub fn verify(
    encoded: &str,
    expected_pcrs: &BTreeMap<i64, Vec<u8>>,
    now: DateTime<Utc>,
    max_age: Duration,
) -> VerificationResult {
    let envelope = match decode_envelope(encoded) {
        Ok(e) => e,
        Err(e) => return VerificationResult::failure(e.message),
    };

    if let Err(e) = verify_alg_is_es384(&envelope.protected) {
        return VerificationResult::failure(e.message);
    }

    let payload_value: ciborium::Value = match ciborium::from_reader(envelope.payload.as_slice()) {
        Ok(v) => v,
        Err(e) => return VerificationResult::failure(format!("invalid payload CBOR: {e}")),
    };
    let document = match AttestationDocument::from_cbor_value(&payload_value) {
        Ok(d) => d,
        Err(e) => return VerificationResult::failure(e.message),
    };

    if document.cabundle.is_empty() {
        let mut result = VerificationResult::failure("empty cabundle");
        result.document = Some(document);
        return result;
    }

    let age = now.timestamp_millis().saturating_sub(document.timestamp as i64);
    let timestamp_valid = age >= 0 && (age as u64) <= max_age.as_millis() as u64;
    if !timestamp_valid {
        let mut result = VerificationResult::failure("attestation timestamp is stale");
        result.document = Some(document);
        return result;
    }

    for (index, expected) in expected_pcrs {
        match document.pcrs.get(index) {
            Some(actual) if actual == expected => {}
            _ => {
                let mut result = VerificationResult::failure(format!("PCR{index} mismatch"));
                result.timestamp_valid = true;
                result.document = Some(document);
                return result;
            }
        }
    }

    let signature_valid = match verify_signature(&envelope.protected, &envelope.payload, &envelope.signature, &document.certificate) {
        Ok(()) => true,
        Err(e) => {
            let mut result = VerificationResult::failure(e.message);
            result.timestamp_valid = true;
            result.pcrs_valid = true;
            result.document = Some(document);
            return result;
        }
    };

    let chain_valid = match verify_chain(&document.certificate, &document.cabundle) {
        Ok(()) => true,
        Err(e) => {
            return VerificationResult {
                is_valid: false,
                signature_valid,
                chain_valid: false,
                pcrs_valid: true,
                timestamp_valid: true,
                error: Some(e.message),
                document: Some(document),
            };
        }
    };

    VerificationResult {
        is_valid: signature_valid && chain_valid,
        signature_valid,
        chain_valid,
        pcrs_valid: true,
        timestamp_valid: true,
        error: None,
        document: Some(document),
    }
}

fn verify_signature(protected: &[u8], payload: &[u8], signature: &[u8], certificate_der: &[u8]) -> Result<(), AgentError> {
    if signature.len() != 96 {
        return Err(AgentError::permanent(ErrorCode::AttestationInvalid, "ES384 signature must be 96 raw bytes"));
    }
    let message = sig_structure(protected, payload)?;
    let (_, cert) = x509_parser::parse_x509_certificate(certificate_der)
        .map_err(|e| AgentError::permanent(ErrorCode::AttestationInvalid, format!("invalid leaf certificate: {e}")))?;
    let pubkey_bytes = cert.tbs_certificate.subject_pki.subject_public_key.as_ref();
    let verifying_key = VerifyingKey::from_sec1_bytes(pubkey_bytes)
        .map_err(|e| AgentError::permanent(ErrorCode::AttestationInvalid, format!("invalid leaf public key: {e}")))?;
    let sig = Signature::from_slice(signature)
        .map_err(|e| AgentError::permanent(ErrorCode::AttestationInvalid, format!("invalid raw R||S signature: {e}")))?;
    verifying_key
        .verify(&message, &sig)
        .map_err(|_| AgentError::permanent(ErrorCode::AttestationInvalid, "signature verification failed"))
}

/// Walk the chain `cabundle[0] (root) -> ... -> cabundle[last] -> certificate (leaf)`,
/// verifying each link's DER ECDSA signature against its issuer's public key.
fn verify_chain(certificate: &[u8], cabundle: &[Vec<u8>]) -> Result<(), AgentError> {
    let mut chain: Vec<&[u8]> = cabundle.iter().map(Vec::as_slice).collect();
    chain.push(certificate);
    for pair in chain.windows(2) {
        verify_link(pair[1], pair[0])?;
    }
    Ok(())
}

fn verify_link(subject_der: &[u8], issuer_der: &[u8]) -> Result<(), AgentError> {
    let (_, issuer) = x509_parser::parse_x509_certificate(issuer_der)
        .map_err(|e| AgentError::permanent(ErrorCode::AttestationInvalid, format!("invalid issuer certificate: {e}")))?;
    let (_, subject) = x509_parser::parse_x509_certificate(subject_der)
        .map_err(|e| AgentError::permanent(ErrorCode::AttestationInvalid, format!("invalid chain certificate: {e}")))?;

    let issuer_pubkey = issuer.tbs_certificate.subject_pki.subject_public_key.as_ref();
    let verifying_key = VerifyingKey::from_sec1_bytes(issuer_pubkey)
        .map_err(|e| AgentError::permanent(ErrorCode::AttestationInvalid, format!("invalid issuer public key: {e}")))?;
    let sig = Signature::from_der(subject.signature_value.as_ref())
        .map_err(|e| AgentError::permanent(ErrorCode::AttestationInvalid, format!("invalid chain signature encoding: {e}")))?;

    verifying_key
        .verify(subject.tbs_certificate.as_ref(), &sig)
        .map_err(|_| AgentError::permanent(ErrorCode::AttestationInvalid, "certificate chain signature verification failed"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_input_fails_at_envelope_decode() {
        let result = verify("not-base64!!", &BTreeMap::new(), Utc::now(), DEFAULT_MAX_AGE);
        assert!(!result.is_valid);
        assert!(result.document.is_none());
        assert!(result.error.is_some());
    }
}
