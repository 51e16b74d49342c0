// SPDX-License-Identifier: MIT OR Apache-2.0
//! `get_supported_circuits`: list the static circuit registry, annotated
//! with the verifier address deployed on the requested chain.

use serde_json::{json, Value};
use zka_core::circuit::CIRCUITS;
use zka_error::AgentError;
use zka_runtime::deps::Deps;

/// Chain id used when the caller omits `chainId` — Base Sepolia, the only
/// testnet this agent's verifier table has entries for today.
pub const DEFAULT_CHAIN_ID: u64 = 84_532;

/// `{chainId?}` -> `{circuits:[{id,displayName,description,verifierAddress,requiredInputs}], chainId}`.
///
/// Always free: no payment or signing prerequisite.
pub async fn get_supported_circuits(deps: &Deps, params: &Value) -> Result<Value, AgentError> {
    let chain_id = params.get("chainId").and_then(Value::as_u64).unwrap_or(DEFAULT_CHAIN_ID);

    let circuits: Vec<Value> = CIRCUITS
        .iter()
        .map(|c| {
            let verifier_address = deps.chain_verifier.verifier_address(chain_id, c.id).ok();
            json!({
                "id": c.id,
                "displayName": c.display_name,
                "description": c.description,
                "verifierAddress": verifier_address,
                "requiredInputs": c.required_inputs,
            })
        })
        .collect();

    Ok(json!({ "circuits": circuits, "chainId": chain_id }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::test_deps;

    #[tokio::test]
    async fn lists_every_registered_circuit() {
        let deps = test_deps();
        let out = get_supported_circuits(&deps, &json!({})).await.unwrap();
        let circuits = out["circuits"].as_array().unwrap();
        assert_eq!(circuits.len(), CIRCUITS.len());
        assert_eq!(out["chainId"], DEFAULT_CHAIN_ID);
    }

    #[tokio::test]
    async fn honors_an_explicit_chain_id() {
        let deps = test_deps();
        let out = get_supported_circuits(&deps, &json!({"chainId": 8453})).await.unwrap();
        assert_eq!(out["chainId"], 8453);
    }
}
