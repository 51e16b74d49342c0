// SPDX-License-Identifier: MIT OR Apache-2.0
//! x402 payment-gate middleware (C6): challenges requests on protected routes
//! that lack a well-formed `x-payment` header with a CBOR-encoded `402`
//! challenge, and lets everything else through untouched.

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use zka_config::PaymentMode;

const PAYMENT_HEADER: &str = "x-payment";
const CHALLENGE_HEADER: &str = "payment-required";

/// One scheme this agent accepts payment under, surfaced in the 402 challenge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct X402Accept {
    /// Payment scheme, e.g. `"exact"`.
    pub scheme: String,
    /// CAIP-2 network identifier, e.g. `"eip155:84532"`.
    pub network: String,
    /// Integer USDC amount (6 decimals) required.
    pub max_amount_required: u64,
    /// The resource path this requirement gates.
    pub resource: String,
    /// Address payment must settle to.
    pub pay_to: String,
    /// ERC-20 asset contract address (USDC).
    pub asset: String,
    /// Human-readable description of what is being purchased.
    pub description: String,
    /// Upper bound, in seconds, the caller has to complete payment.
    pub max_timeout_seconds: u32,
}

/// The full `402` challenge body, matching the x402 wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct X402Challenge {
    /// Protocol version, currently `2`.
    pub x402_version: u32,
    /// The accepted payment options, usually a single entry.
    pub accepts: Vec<X402Accept>,
}

impl X402Challenge {
    /// Build a single-scheme challenge for one protected resource.
    #[must_use]
    pub fn single(accept: X402Accept) -> Self {
        Self { x402_version: 2, accepts: vec![accept] }
    }

    /// Base64-encode the CBOR serialization of this challenge for the
    /// `payment-required` response header.
    pub fn encode(&self) -> Result<String, String> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).map_err(|e| e.to_string())?;
        Ok(base64::engine::general_purpose::STANDARD.encode(buf))
    }
}

/// A payment claim decoded from the `x-payment` request header. Fields beyond
/// what the gate itself validates are opaque and left to the facilitator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedPayment {
    /// Payer's on-chain address.
    pub payer_address: String,
    /// Integer USDC amount (6 decimals) the header claims to pay.
    pub amount: u64,
    /// CAIP-2 network identifier the header claims to pay on.
    pub network: String,
}

/// Best-effort decode of an `x-payment` header value. Returns `None` on any
/// malformed input — base64, CBOR, or shape — rather than erroring, per the
/// gate's contract that a bad header behaves exactly like a missing one.
#[must_use]
pub fn decode_payment_header(value: &str) -> Option<DecodedPayment> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(value.trim()).ok()?;
    ciborium::from_reader(bytes.as_slice()).ok()
}

/// Requirements a protected route's 402 challenge is built from.
#[derive(Debug, Clone)]
pub struct PaymentRequirements {
    /// CAIP-2 network identifier.
    pub network: String,
    /// Integer USDC amount (6 decimals) required.
    pub amount: u64,
    /// Address payment must settle to.
    pub pay_to: String,
    /// ERC-20 asset contract address (USDC).
    pub asset: String,
    /// The resource path this gate protects.
    pub resource: String,
    /// Human-readable description surfaced in the challenge.
    pub description: String,
}

/// Stateless x402 payment gate: decides pass-through vs. 402 challenge for
/// every request through the layer it produces.
#[derive(Clone)]
pub struct PaymentGate {
    mode: PaymentMode,
    requirements: PaymentRequirements,
}

impl PaymentGate {
    /// Construct a gate enforcing `requirements` under `mode`. In
    /// [`PaymentMode::Disabled`] every request passes through with a
    /// [`GateOutcome::Skipped`] extension.
    #[must_use]
    pub fn new(mode: PaymentMode, requirements: PaymentRequirements) -> Self {
        Self { mode, requirements }
    }

    /// Whether this gate's mode requires a settled payment at all.
    #[must_use]
    pub fn requires_payment(&self) -> bool {
        self.mode.requires_payment()
    }

    /// Build the x402 challenge this gate would respond with, for frontends
    /// (A2A, MCP) that need to surface it outside the `tower` middleware path.
    #[must_use]
    pub fn challenge(&self) -> X402Challenge {
        X402Challenge::single(X402Accept {
            scheme: "exact".to_string(),
            network: self.requirements.network.clone(),
            max_amount_required: self.requirements.amount,
            resource: self.requirements.resource.clone(),
            pay_to: self.requirements.pay_to.clone(),
            asset: self.requirements.asset.clone(),
            description: self.requirements.description.clone(),
            max_timeout_seconds: 60,
        })
    }

    fn challenge_response(&self) -> Response {
        let challenge = self.challenge();
        let body = serde_json::to_string(&challenge).unwrap_or_default();
        let mut resp = (StatusCode::PAYMENT_REQUIRED, body).into_response();
        if let Ok(encoded) = challenge.encode() {
            if let Ok(value) = HeaderValue::from_str(&encoded) {
                resp.headers_mut().insert(CHALLENGE_HEADER, value);
            }
        }
        resp
    }

    /// Construct the [`tower::Layer`] wrapping services with this gate.
    #[must_use]
    pub fn into_layer(self) -> PaymentGateLayer {
        PaymentGateLayer(self)
    }
}

/// Result of evaluating the gate for one request, available downstream as a
/// request extension regardless of outcome.
#[derive(Debug, Clone)]
pub enum GateOutcome {
    /// The gate is disabled; the request was admitted unconditionally.
    Skipped,
    /// A well-formed `x-payment` header was present and decoded.
    Admitted(DecodedPayment),
}

/// Tower [`tower::Layer`] wrapping services with [`PaymentGate`] enforcement.
#[derive(Clone)]
pub struct PaymentGateLayer(PaymentGate);

impl<S: Clone> tower::Layer<S> for PaymentGateLayer {
    type Service = PaymentGateService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        PaymentGateService { gate: self.0.clone(), inner }
    }
}

/// Tower [`tower::Service`] that challenges unpaid requests before forwarding
/// to the inner service.
#[derive(Clone)]
pub struct PaymentGateService<S> {
    gate: PaymentGate,
    inner: S,
}

impl<S> tower::Service<Request<Body>> for PaymentGateService<S>
where
    S: tower::Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: IntoResponse,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut std::task::Context<'_>) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let gate = self.gate.clone();
        let mut inner = self.inner.clone();
        Box::pin(async move {
            if !gate.mode.requires_payment() {
                req.extensions_mut().insert(GateOutcome::Skipped);
                return inner.call(req).await;
            }

            let header = req.headers().get(PAYMENT_HEADER).and_then(|v| v.to_str().ok());

            match header {
                None => Ok(gate.challenge_response()),
                Some(raw) => match decode_payment_header(raw) {
                    Some(payment) => {
                        req.extensions_mut().insert(GateOutcome::Admitted(payment));
                        inner.call(req).await
                    }
                    None => {
                        tracing::warn!("x-payment header present but could not be decoded; passing through for downstream verification");
                        inner.call(req).await
                    }
                },
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requirements() -> PaymentRequirements {
        PaymentRequirements {
            network: "eip155:84532".to_string(),
            amount: 100_000,
            pay_to: "0xpayee".to_string(),
            asset: "0xusdc".to_string(),
            resource: "/v1/tasks".to_string(),
            description: "one zero-knowledge proof".to_string(),
        }
    }

    #[test]
    fn disabled_mode_requires_no_payment() {
        let gate = PaymentGate::new(PaymentMode::Disabled, requirements());
        assert!(!gate.mode.requires_payment());
    }

    #[test]
    fn challenge_round_trips_through_base64_cbor() {
        let gate = PaymentGate::new(PaymentMode::Testnet, requirements());
        let challenge = gate.challenge();
        let encoded = challenge.encode().unwrap();
        let bytes = base64::engine::general_purpose::STANDARD.decode(encoded).unwrap();
        let decoded: X402Challenge = ciborium::from_reader(bytes.as_slice()).unwrap();
        assert_eq!(decoded.accepts[0].max_amount_required, 100_000);
        assert_eq!(decoded.accepts[0].network, "eip155:84532");
    }

    #[test]
    fn decode_payment_header_rejects_malformed_base64() {
        assert!(decode_payment_header("not valid base64!!").is_none());
    }

    #[test]
    fn decode_payment_header_round_trips_a_valid_claim() {
        let payment = DecodedPayment {
            payer_address: "0xpayer".to_string(),
            amount: 100_000,
            network: "eip155:84532".to_string(),
        };
        let mut buf = Vec::new();
        ciborium::into_writer(&payment, &mut buf).unwrap();
        let encoded = base64::engine::general_purpose::STANDARD.encode(buf);

        let decoded = decode_payment_header(&encoded).unwrap();
        assert_eq!(decoded.payer_address, "0xpayer");
        assert_eq!(decoded.amount, 100_000);
    }

    #[derive(Clone)]
    struct EchoService;

    impl tower::Service<Request<Body>> for EchoService {
        type Response = Response;
        type Error = std::convert::Infallible;
        type Future = std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, Self::Error>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut std::task::Context<'_>) -> std::task::Poll<Result<(), Self::Error>> {
            std::task::Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: Request<Body>) -> Self::Future {
            Box::pin(async move {
                let outcome = req.extensions().get::<GateOutcome>().cloned();
                let body = match outcome {
                    Some(GateOutcome::Admitted(_)) => "admitted",
                    Some(GateOutcome::Skipped) => "skipped",
                    None => "passthrough",
                };
                Ok((StatusCode::OK, body).into_response())
            })
        }
    }

    fn gated_service() -> PaymentGateService<EchoService> {
        PaymentGateService { gate: PaymentGate::new(PaymentMode::Testnet, requirements()), inner: EchoService }
    }

    async fn body_string(resp: Response) -> String {
        use http_body_util::BodyExt;
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn missing_header_is_challenged() {
        let req = Request::builder().uri("/v1/tasks").body(Body::empty()).unwrap();
        let resp = tower::Service::call(&mut gated_service(), req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::PAYMENT_REQUIRED);
        assert!(resp.headers().contains_key(CHALLENGE_HEADER));
    }

    #[tokio::test]
    async fn malformed_header_passes_through_without_challenge() {
        let req = Request::builder()
            .uri("/v1/tasks")
            .header(PAYMENT_HEADER, "not valid base64!!")
            .body(Body::empty())
            .unwrap();
        let resp = tower::Service::call(&mut gated_service(), req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_string(resp).await, "passthrough");
    }

    #[tokio::test]
    async fn valid_header_is_admitted() {
        let payment = DecodedPayment { payer_address: "0xpayer".to_string(), amount: 100_000, network: "eip155:84532".to_string() };
        let mut buf = Vec::new();
        ciborium::into_writer(&payment, &mut buf).unwrap();
        let encoded = base64::engine::general_purpose::STANDARD.encode(buf);

        let req = Request::builder().uri("/v1/tasks").header(PAYMENT_HEADER, encoded).body(Body::empty()).unwrap();
        let resp = tower::Service::call(&mut gated_service(), req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_string(resp).await, "admitted");
    }
}
