// SPDX-License-Identifier: MIT OR Apache-2.0
//! `request_payment`: issue (or re-issue, idempotently) a hosted payment
//! link for a request that has finished signing.

use serde_json::{json, Value};
use zka_core::payment::parse_usdc_amount;
use zka_core::request::{Phase, PaymentSubStatus, RequestId};
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

fn payment_url(deps: &Deps, request_id: impl std::fmt::Display) -> String {
    format!("{}/pay/{}", deps.config.public_base_url.trim_end_matches('/'), request_id)
}

/// `{requestId}` (auto-filled) -> `{requestId, paymentUrl, amount, currency, network}`.
///
/// Rejects before signing completes and after payment has already settled;
/// re-requesting while a payment link is outstanding is idempotent.
pub async fn request_payment(deps: &Deps, params: &Value) -> Result<Value, AgentError> {
    let request_id = required_request_id(params)?;
    let mut request = deps.flows.require_request(request_id).await?;

    if request.phase != Phase::Payment {
        return Err(AgentError::invalid_state(
            ErrorCode::RequestPhaseInvalid,
            format!("request {request_id} is in phase {} and cannot request payment", request.phase),
        ));
    }

    if request.payment.status.is_none() {
        let amount = parse_usdc_amount(&deps.config.proof_price)?;
        request.payment.status = Some(PaymentSubStatus::Pending);
        request.payment.payment_url = Some(payment_url(deps, request_id));
        request.payment.amount = Some((amount as f64 / 1_000_000.0).to_string());
        request.payment.currency = Some("USDC".to_string());
        request.payment.network = Some("eip155:84532".to_string());
        request = deps.flows.update_request(request, deps.config.payment_mode.requires_payment(), deps.now()).await?;
    }

    Ok(json!({
        "requestId": request.request_id.to_string(),
        "paymentUrl": request.payment.payment_url,
        "amount": request.payment.amount,
        "currency": request.payment.currency,
        "network": request.payment.network,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::{test_deps, test_deps_payments_enabled};
    use zka_core::request::SigningStatus;

    async fn request_past_signing(deps: &Deps, payments_enabled: bool) -> zka_core::request::Request {
        let request = deps.flows.create_request("coinbase_attestation", "s", None, None, deps.now()).await.unwrap();
        let mut request = deps.flows.require_request(request.request_id).await.unwrap();
        request.signing.status = Some(SigningStatus::Completed);
        deps.flows.update_request(request, payments_enabled, deps.now()).await.unwrap()
    }

    #[tokio::test]
    async fn issues_a_payment_link_once_signing_is_complete() {
        let deps = test_deps_payments_enabled();
        let request = request_past_signing(&deps, true).await;
        assert_eq!(request.phase, Phase::Payment);

        let out = request_payment(&deps, &json!({"requestId": request.request_id.to_string()})).await.unwrap();
        assert_eq!(out["currency"], "USDC");
        assert_eq!(out["amount"], "0.1");
        assert!(out["paymentUrl"].as_str().unwrap().contains(&request.request_id.to_string()));
    }

    #[tokio::test]
    async fn is_idempotent_on_re_request() {
        let deps = test_deps_payments_enabled();
        let request = request_past_signing(&deps, true).await;
        let first = request_payment(&deps, &json!({"requestId": request.request_id.to_string()})).await.unwrap();
        let second = request_payment(&deps, &json!({"requestId": request.request_id.to_string()})).await.unwrap();
        assert_eq!(first["paymentUrl"], second["paymentUrl"]);
    }

    #[tokio::test]
    async fn rejects_before_signing_completes() {
        let deps = test_deps();
        let request = deps.flows.create_request("coinbase_attestation", "s", None, None, deps.now()).await.unwrap();
        let err = request_payment(&deps, &json!({"requestId": request.request_id.to_string()})).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::RequestPhaseInvalid);
    }

    #[tokio::test]
    async fn rejects_once_already_past_the_payment_phase() {
        let deps = test_deps();
        // payments disabled: signing-complete requests sail straight through
        // payment to ready on the very next auto-advancing read.
        let request = request_past_signing(&deps, false).await;
        assert_eq!(request.phase, Phase::Ready);
        let err = request_payment(&deps, &json!({"requestId": request.request_id.to_string()})).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::RequestPhaseInvalid);
    }
}
