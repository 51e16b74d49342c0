// SPDX-License-Identifier: MIT OR Apache-2.0
//! `check_status`: report a signing/payment request's current phase.

use serde_json::{json, Value};
use zka_core::request::RequestId;
use zka_error::{AgentError, ErrorCode};
use zka_runtime::deps::Deps;

fn required_request_id(params: &Value) -> Result<RequestId, AgentError> {
    params
        .get("requestId")
        .and_then(Value::as_str)
        .ok_or_else(|| AgentError::validation(ErrorCode::MissingParam, "missing required param: requestId"))?
        .parse()
        .map_err(|_| AgentError::validation(ErrorCode::InvalidParam, "requestId is not a valid id"))
}

/// `{requestId}` (auto-filled by the frontend from context) -> `{requestId, phase, signing, payment}`.
pub async fn check_status(deps: &Deps, params: &Value) -> Result<Value, AgentError> {
    let request_id = required_request_id(params)?;
    let request = deps.flows.require_request(request_id).await?;

    Ok(json!({
        "requestId": request.request_id.to_string(),
        "phase": request.phase,
        "signing": {
            "status": request.signing.status,
            "address": request.signing.address,
            "signalHash": request.signing.signal_hash,
        },
        "payment": {
            "status": request.payment.status,
            "paymentUrl": request.payment.payment_url,
            "txHash": request.payment.tx_hash,
            "amount": request.payment.amount,
            "currency": request.payment.currency,
            "network": request.payment.network,
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::test_deps;

    #[tokio::test]
    async fn reports_the_signing_phase_for_a_fresh_request() {
        let deps = test_deps();
        let request = deps.flows.create_request("coinbase_attestation", "s", None, None, deps.now()).await.unwrap();
        let out = check_status(&deps, &json!({"requestId": request.request_id.to_string()})).await.unwrap();
        assert_eq!(out["phase"], "signing");
        assert!(out["signing"]["address"].is_null());
    }

    #[tokio::test]
    async fn unknown_request_id_is_not_found() {
        let deps = test_deps();
        let err = check_status(&deps, &json!({"requestId": zka_core::request::RequestId::new().to_string()}))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::RequestNotFound);
    }

    #[tokio::test]
    async fn missing_request_id_is_a_validation_error() {
        let deps = test_deps();
        let err = check_status(&deps, &json!({})).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingParam);
    }
}
