// SPDX-License-Identifier: MIT OR Apache-2.0
//! COSE_Sign1 envelope parsing and the ES384 `Sig_structure` it wraps.

use base64::Engine;
use ciborium::Value;
use zka_error::{AgentError, ErrorCode};

/// COSE algorithm identifier for ECDSA with SHA-384, the only algorithm this
/// verifier accepts.
const COSE_ALG_ES384: i128 = -35;

/// The four-element COSE_Sign1 structure, still CBOR-encoded at the
/// `protected`/`payload` field level.
pub struct CoseSign1 {
    /// Raw bytes of the protected header (itself a CBOR map).
    pub protected: Vec<u8>,
    /// Raw bytes of the signed payload (the attestation document's CBOR map).
    pub payload: Vec<u8>,
    /// The raw R||S signature bytes (96 bytes for P-384).
    pub signature: Vec<u8>,
}

/// Decode a base64-encoded COSE_Sign1 envelope.
pub fn decode_envelope(encoded: &str) -> Result<CoseSign1, AgentError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| AgentError::permanent(ErrorCode::AttestationInvalid, format!("invalid base64: {e}")))?;
    let value: Value = ciborium::from_reader(bytes.as_slice())
        .map_err(|e| AgentError::permanent(ErrorCode::AttestationInvalid, format!("invalid CBOR envelope: {e}")))?;
    let Value::Array(items) = value else {
        return Err(AgentError::permanent(ErrorCode::AttestationInvalid, "COSE_Sign1 envelope is not an array"));
    };
    let [protected, _unprotected, payload, signature] = <[Value; 4]>::try_from(items)
        .map_err(|_| AgentError::permanent(ErrorCode::AttestationInvalid, "COSE_Sign1 envelope does not have 4 elements"))?;

    let protected = protected
        .as_bytes()
        .ok_or_else(|| AgentError::permanent(ErrorCode::AttestationInvalid, "protected header is not a byte string"))?
        .to_vec();
    let payload = payload
        .as_bytes()
        .ok_or_else(|| AgentError::permanent(ErrorCode::AttestationInvalid, "payload is not a byte string"))?
        .to_vec();
    let signature = signature
        .as_bytes()
        .ok_or_else(|| AgentError::permanent(ErrorCode::AttestationInvalid, "signature is not a byte string"))?
        .to_vec();

    Ok(CoseSign1 { protected, payload, signature })
}

/// Verify the protected header asserts COSE algorithm ES384 (`-35`).
pub fn verify_alg_is_es384(protected: &[u8]) -> Result<(), AgentError> {
    let value: Value = ciborium::from_reader(protected)
        .map_err(|e| AgentError::permanent(ErrorCode::AttestationInvalid, format!("invalid protected header CBOR: {e}")))?;
    let Value::Map(entries) = value else {
        return Err(AgentError::permanent(ErrorCode::AttestationInvalid, "protected header is not a CBOR map"));
    };
    let alg = entries
        .iter()
        .find_map(|(k, v)| (k.as_integer().map(i128::from) == Some(1)).then(|| v.as_integer()))
        .flatten()
        .ok_or_else(|| AgentError::permanent(ErrorCode::AttestationInvalid, "protected header missing alg"))?;
    if i128::from(alg) == COSE_ALG_ES384 {
        Ok(())
    } else {
        Err(AgentError::permanent(ErrorCode::AttestationInvalid, "Unsupported COSE algorithm"))
    }
}

/// Build the COSE `Sig_structure` for a `Signature1` context, the exact byte
/// sequence the signature is computed over.
pub fn sig_structure(protected: &[u8], payload: &[u8]) -> Result<Vec<u8>, AgentError> {
    let value = Value::Array(vec![
        Value::Text("Signature1".to_string()),
        Value::Bytes(protected.to_vec()),
        Value::Bytes(Vec::new()),
        Value::Bytes(payload.to_vec()),
    ]);
    let mut buf = Vec::new();
    ciborium::into_writer(&value, &mut buf)
        .map_err(|e| AgentError::permanent(ErrorCode::Internal, format!("failed to encode Sig_structure: {e}")))?;
    Ok(buf)
}
