// SPDX-License-Identifier: MIT OR Apache-2.0
//! `generate_proof`: the one protected, task-based skill. Falls back to a
//! signing session when the caller hasn't authenticated yet, consults the
//! proof cache before ever invoking the TEE, and records a reputation credit
//! on every success (cache hit or fresh proof alike).

use serde_json::{json, Value};
use tracing::warn;
use zka_bus::TaskEvent;
use zka_cache::{CachedProof, ProofCache};
use zka_core::request::{RequestId, SigningStatus};
use zka_core::{circuit, proof_cache_key, Artifact, CacheKeyInputs, Task};
use zka_error::{AgentError, ErrorCode};
use zka_runtime::deps::Deps;
use zka_runtime::pool::SkillOutcome;
use zka_tee::ProveResult;

use crate::derive::{nullifier_for, signal_hash_for};
use crate::signing::signing_url;

/// How long a generated proof stays cached once produced.
const PROOF_CACHE_TTL: std::time::Duration = std::time::Duration::from_secs(3600);

struct Authenticated {
    address: String,
    signature: String,
    signal_hash: Option<String>,
}

fn required_str<'a>(params: &'a Value, field: &str) -> Result<&'a str, AgentError> {
    params
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AgentError::validation(ErrorCode::MissingParam, format!("missing required param: {field}")))
}

fn optional_string_array(params: &Value, field: &str) -> Option<Vec<String>> {
    params
        .get(field)
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
}

/// Resolve whether this call is already authenticated: either `address` and
/// `signature` were passed directly, or `requestId` names a request whose
/// signing sub-flow has completed.
async fn resolve_authentication(deps: &Deps, params: &Value) -> Result<Option<Authenticated>, AgentError> {
    if let (Some(address), Some(signature)) = (params.get("address").and_then(Value::as_str), params.get("signature").and_then(Value::as_str)) {
        return Ok(Some(Authenticated {
            address: address.to_string(),
            signature: signature.to_string(),
            signal_hash: None,
        }));
    }

    if let Some(raw_request_id) = params.get("requestId").and_then(Value::as_str) {
        let request_id: RequestId = raw_request_id
            .parse()
            .map_err(|_| AgentError::validation(ErrorCode::InvalidParam, "requestId is not a valid id"))?;
        let request = deps.flows.require_request(request_id).await?;
        if request.signing.status == Some(SigningStatus::Completed) {
            return Ok(Some(Authenticated {
                address: request.signing.address.unwrap_or_default(),
                signature: request.signing.signature.unwrap_or_default(),
                signal_hash: request.signing.signal_hash,
            }));
        }
    }

    Ok(None)
}

/// Attach a signing-session artifact to `task` directly (bypassing the
/// worker pool's own completion path) and suspend as `input-required`.
async fn needs_signing(task: &Task, deps: &Deps, circuit_id: &str, scope: &str) -> SkillOutcome {
    let signing = match deps.flows.create_request(circuit_id, scope, None, None, deps.now()).await {
        Ok(r) => r,
        Err(e) => return SkillOutcome::from_error(&e),
    };

    let artifact = Artifact::json(
        "application/json",
        json!({
            "requestId": signing.request_id.to_string(),
            "signingUrl": signing_url(deps, signing.request_id),
            "expiresAt": signing.expires_at,
            "circuitId": circuit_id,
            "scope": scope,
        }),
    );

    match deps.tasks.add_artifact(task.clone(), artifact.clone(), deps.now()).await {
        Ok(_) => deps.bus.publish(TaskEvent::ArtifactUpdate { task_id: task.id, artifact, last_chunk: true }),
        Err(e) => warn!(task_id = %task.id, error = %e, "failed to attach signing artifact before suspending task"),
    }

    SkillOutcome::InputRequired
}

fn proof_artifact(cached: &CachedProof, from_cache: bool) -> Value {
    json!({
        "proof": cached.proof,
        "publicInputs": cached.public_inputs,
        "proofWithInputs": cached.proof_with_inputs,
        "nullifier": cached.nullifier,
        "signalHash": cached.signal_hash,
        "cached": from_cache,
    })
}

/// Execute `generate_proof` for a dispatched task. See the module docs for
/// the fallback/caching rules.
pub async fn generate_proof(task: &Task, deps: &Deps) -> SkillOutcome {
    let params = &task.params;

    let circuit_id = match required_str(params, "circuitId") {
        Ok(id) => id,
        Err(e) => return SkillOutcome::from_error(&e),
    };
    if let Err(e) = circuit::lookup(circuit_id) {
        return SkillOutcome::from_error(&e);
    }
    let scope = match required_str(params, "scope") {
        Ok(s) => s,
        Err(e) => return SkillOutcome::from_error(&e),
    };
    let country_list = optional_string_array(params, "countryList");
    let is_included = params.get("isIncluded").and_then(Value::as_bool);

    let auth = match resolve_authentication(deps, params).await {
        Ok(auth) => auth,
        Err(e) => return SkillOutcome::from_error(&e),
    };
    let Some(auth) = auth else {
        return needs_signing(task, deps, circuit_id, scope).await;
    };

    let cache_key = proof_cache_key(&CacheKeyInputs {
        circuit_id,
        address: &auth.address,
        scope,
        country_list: country_list.as_deref(),
        is_included,
    });
    let cache = ProofCache::new(deps.kv.as_ref(), PROOF_CACHE_TTL);

    match cache.get(&cache_key).await {
        Ok(Some(cached)) => {
            deps.reputation.record_success();
            return SkillOutcome::Completed { artifacts: vec![Artifact::json("application/json", proof_artifact(&cached, true))] };
        }
        Ok(None) => {}
        Err(e) => return SkillOutcome::from_error(&e),
    }

    let inputs = json!({
        "address": auth.address,
        "signature": auth.signature,
        "scope": scope,
        "countryList": country_list,
        "isIncluded": is_included,
    });

    let prove_result = deps.tee.prove(circuit_id, &inputs, &task.id.to_string()).await;
    let (proof, public_inputs) = match prove_result {
        ProveResult::Proof { proof, public_inputs, .. } => (proof, public_inputs),
        ProveResult::Error { error } => {
            return SkillOutcome::from_error(&AgentError::transient(ErrorCode::ProverFailed, error));
        }
    };

    let signal_hash = auth.signal_hash.unwrap_or_else(|| signal_hash_for(scope));
    let nullifier = nullifier_for(circuit_id, &auth.address, scope);
    let proof_with_inputs = format!("0x{}{}", proof.trim_start_matches("0x"), public_inputs.trim_start_matches("0x"));

    let cached = CachedProof {
        proof,
        public_inputs,
        proof_with_inputs,
        nullifier,
        signal_hash,
    };

    if let Err(e) = cache.set(&cache_key, &cached).await {
        warn!(task_id = %task.id, error = %e, "failed to populate proof cache after a successful prove");
    }

    deps.reputation.record_success();

    let mut artifact_value = proof_artifact(&cached, false);
    artifact_value["proofId"] = Value::String(cache_key.clone());
    artifact_value["verifyUrl"] =
        Value::String(format!("{}/api/v1/proofs/verify", deps.config.public_base_url.trim_end_matches('/')));

    SkillOutcome::Completed { artifacts: vec![Artifact::json("application/json", artifact_value)] }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::{test_deps, FailingTee};
    use zka_core::request::SigningStatus;

    fn task_with(params: Value) -> Task {
        Task::new("ctx-1", "generate_proof", params, crate::tests_support::now())
    }

    #[tokio::test]
    async fn falls_back_to_signing_when_unauthenticated() {
        let deps = test_deps();
        let task = task_with(json!({"circuitId": "coinbase_attestation", "scope": "app.example"}));
        let outcome = generate_proof(&task, &deps).await;
        assert!(matches!(outcome, SkillOutcome::InputRequired));

        let reloaded = deps.tasks.require_task(task.id).await.unwrap();
        assert_eq!(reloaded.artifacts.len(), 1);
        assert!(reloaded.artifacts[0].as_json().unwrap()["signingUrl"].as_str().unwrap().starts_with("https://"));
    }

    #[tokio::test]
    async fn generates_a_proof_when_address_and_signature_are_given() {
        let deps = test_deps();
        let task = task_with(json!({
            "circuitId": "coinbase_attestation",
            "scope": "app.example",
            "address": "0xabc",
            "signature": "0xsig",
        }));
        let outcome = generate_proof(&task, &deps).await;
        match outcome {
            SkillOutcome::Completed { artifacts } => {
                let data = artifacts[0].as_json().unwrap();
                assert_eq!(data["proof"], "deadbeef");
                assert_eq!(data["cached"], false);
                assert!(data["proofId"].as_str().unwrap().starts_with("proof:"));
            }
            _ => panic!("expected a completed outcome"),
        }
    }

    #[tokio::test]
    async fn second_call_with_identical_inputs_hits_the_cache() {
        let deps = test_deps();
        let params = json!({
            "circuitId": "coinbase_attestation",
            "scope": "app.example",
            "address": "0xabc",
            "signature": "0xsig",
        });
        let first = generate_proof(&task_with(params.clone()), &deps).await;
        let second = generate_proof(&task_with(params), &deps).await;

        let SkillOutcome::Completed { artifacts: first_artifacts } = first else { panic!("expected completed") };
        let SkillOutcome::Completed { artifacts: second_artifacts } = second else { panic!("expected completed") };

        assert_eq!(first_artifacts[0].as_json().unwrap()["cached"], false);
        assert_eq!(second_artifacts[0].as_json().unwrap()["cached"], true);
        assert_eq!(
            first_artifacts[0].as_json().unwrap()["proof"],
            second_artifacts[0].as_json().unwrap()["proof"]
        );
    }

    #[tokio::test]
    async fn uses_a_completed_signing_request_as_authentication() {
        let deps = test_deps();
        let request = deps.flows.create_request("coinbase_attestation", "app.example", None, None, deps.now()).await.unwrap();
        let mut request = deps.flows.require_request(request.request_id).await.unwrap();
        request.signing.status = Some(SigningStatus::Completed);
        request.signing.address = Some("0xabc".to_string());
        request.signing.signature = Some("0xsig".to_string());
        deps.flows.update_request(request.clone(), false, deps.now()).await.unwrap();

        let task = task_with(json!({
            "circuitId": "coinbase_attestation",
            "scope": "app.example",
            "requestId": request.request_id.to_string(),
        }));
        let outcome = generate_proof(&task, &deps).await;
        assert!(matches!(outcome, SkillOutcome::Completed { .. }));
    }

    #[tokio::test]
    async fn missing_circuit_id_fails_without_touching_the_tee() {
        let deps = test_deps();
        let task = task_with(json!({"scope": "app.example", "address": "0xabc", "signature": "0xsig"}));
        let outcome = generate_proof(&task, &deps).await;
        assert!(matches!(outcome, SkillOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn prover_failure_surfaces_as_a_failed_outcome() {
        let mut deps = test_deps();
        deps.tee = std::sync::Arc::new(FailingTee);
        let task = task_with(json!({
            "circuitId": "coinbase_attestation",
            "scope": "app.example",
            "address": "0xabc",
            "signature": "0xsig",
        }));
        let outcome = generate_proof(&task, &deps).await;
        assert!(matches!(outcome, SkillOutcome::Failed { .. }));
    }
}
