// SPDX-License-Identifier: MIT OR Apache-2.0
//! `verify_proof`: re-run the on-chain verifier call for a previously issued
//! proof. Always free — this skill only ever reads chain state.

use serde_json::{json, Value};
use zka_core::circuit;
use zka_error::{AgentError, ErrorCode};
use zka_runtime::deps::Deps;

use crate::circuits::DEFAULT_CHAIN_ID;

fn required_str<'a>(params: &'a Value, field: &str) -> Result<&'a str, AgentError> {
    params
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AgentError::validation(ErrorCode::MissingParam, format!("missing required param: {field}")))
}

fn required_string_array(params: &Value, field: &str) -> Result<Vec<String>, AgentError> {
    let arr = params
        .get(field)
        .and_then(Value::as_array)
        .ok_or_else(|| AgentError::validation(ErrorCode::MissingParam, format!("missing required param: {field}")))?;
    arr.iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| AgentError::validation(ErrorCode::InvalidParam, format!("{field} entries must be strings")))
        })
        .collect()
}

/// `{circuitId, proof, publicInputs:string[], chainId?}` -> `{valid, circuitId, verifierAddress, chainId}`.
pub async fn verify_proof(deps: &Deps, params: &Value) -> Result<Value, AgentError> {
    let circuit_id = required_str(params, "circuitId")?;
    circuit::lookup(circuit_id)?;
    let proof = required_str(params, "proof")?;
    let public_inputs = required_string_array(params, "publicInputs")?;
    let chain_id = params.get("chainId").and_then(Value::as_u64).unwrap_or(DEFAULT_CHAIN_ID);

    let verifier_address = deps.chain_verifier.verifier_address(chain_id, circuit_id)?;
    let valid = deps.chain_verifier.verify(chain_id, circuit_id, proof, &public_inputs).await?;

    Ok(json!({
        "valid": valid,
        "circuitId": circuit_id,
        "verifierAddress": verifier_address,
        "chainId": chain_id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::{test_deps, StubChainVerifier};

    #[tokio::test]
    async fn reports_validity_from_the_chain_verifier() {
        let deps = test_deps();
        let out = verify_proof(
            &deps,
            &json!({"circuitId": "coinbase_attestation", "proof": "0xaa", "publicInputs": ["0xbb"]}),
        )
        .await
        .unwrap();
        assert_eq!(out["valid"], true);
        assert_eq!(out["circuitId"], "coinbase_attestation");
    }

    #[tokio::test]
    async fn surfaces_an_invalid_proof_without_erroring() {
        let mut deps = test_deps();
        deps.chain_verifier = std::sync::Arc::new(StubChainVerifier { valid: false });
        let out = verify_proof(
            &deps,
            &json!({"circuitId": "coinbase_attestation", "proof": "0xaa", "publicInputs": ["0xbb"]}),
        )
        .await
        .unwrap();
        assert_eq!(out["valid"], false);
    }

    #[tokio::test]
    async fn unknown_circuit_is_rejected_before_any_chain_call() {
        let deps = test_deps();
        let err = verify_proof(&deps, &json!({"circuitId": "not_a_circuit", "proof": "0xaa", "publicInputs": []}))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownCircuit);
    }

    #[tokio::test]
    async fn missing_proof_is_a_validation_error() {
        let deps = test_deps();
        let err = verify_proof(&deps, &json!({"circuitId": "coinbase_attestation", "publicInputs": []}))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingParam);
    }
}
