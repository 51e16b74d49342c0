// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
//! Multi-protocol daemon (C18): REST, A2A, and MCP frontends over one
//! shared [`Deps`] bundle and [`WorkerPool`]. Every frontend normalizes its
//! own wire format down to `(skill, params, contextId)` and either
//! dispatches synchronously through [`WorkerPool::run_task_now`] or streams
//! the task's lifecycle events off the shared [`zka_bus::EventBus`].

pub mod a2a;
pub mod api;
pub mod attestation_client;
pub mod chain_adapters;
pub mod discovery;
pub mod error;
pub mod mcp;
pub mod middleware;
pub mod render;
pub mod wiring;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use zka_payments::{PaymentGate, PaymentRequirements};
use zka_runtime::deps::Deps;
use zka_runtime::pool::WorkerPool;

use crate::middleware::GlobalRateLimit;

/// Global per-process request budget, ahead of any per-route logic. Keyed
/// by caller (see [`middleware::rate_limit_middleware`]), independent of
/// the payment gate.
const GLOBAL_RATE_LIMIT_MAX: u32 = 120;
const GLOBAL_RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// CAIP-2 network this agent's payment gate and flow defaults quote —
/// Base Sepolia, the only testnet the verifier table covers today.
pub(crate) const DEFAULT_NETWORK: &str = "eip155:84532";

/// Everything a request handler needs: the shared `Deps` bundle, the
/// worker pool frontends dispatch `generate_proof` tasks through directly,
/// and the payment gate A2A/MCP consult by hand (REST wears it as `tower`
/// route middleware instead, since a shared JSON-RPC route can't otherwise
/// gate by resolved skill name).
pub struct AppState {
    /// Shared dependency bundle.
    pub deps: Deps,
    /// The worker pool backing every synchronous and flow-triggered dispatch.
    pub pool: Arc<WorkerPool>,
    /// x402 payment gate, shared between REST's route middleware and the
    /// manual checks A2A/MCP perform before invoking `generate_proof`.
    pub payment_gate: PaymentGate,
}

impl AppState {
    /// Build application state over `deps` and `pool`, deriving the payment
    /// gate's requirements from configuration.
    #[must_use]
    pub fn new(deps: Deps, pool: Arc<WorkerPool>) -> Self {
        let config = &deps.config;
        let amount = zka_core::parse_usdc_amount(&config.proof_price).unwrap_or(100_000);
        let requirements = PaymentRequirements {
            network: DEFAULT_NETWORK.to_string(),
            amount,
            pay_to: config.payment_pay_to.clone().unwrap_or_default(),
            asset: config.settlement_usdc_address.clone().unwrap_or_default(),
            resource: "/api/v1/proofs".to_string(),
            description: "one zero-knowledge proof".to_string(),
        };
        let payment_gate = PaymentGate::new(config.payment_mode, requirements);
        Self { deps, pool, payment_gate }
    }
}

/// Assemble the full router: the payment-gated proof-creation route, every
/// other REST route, discovery documents, the A2A and MCP endpoints, and
/// the global middleware stack (request id, structured logging, rate
/// limit).
pub fn build_app(state: Arc<AppState>) -> Router {
    let gated = Router::new()
        .route("/api/v1/proofs", post(api::create_proof))
        .layer(state.payment_gate.clone().into_layer())
        .with_state(Arc::clone(&state));

    let rest = Router::new()
        .route("/health", get(api::health))
        .route("/payment/status", get(api::payment_status))
        .route("/tee/status", get(api::tee_status))
        .route("/api/v1/circuits", get(api::list_circuits))
        .route("/api/v1/proofs/{task_id}", get(api::get_proof))
        .route("/api/v1/proofs/verify", post(api::verify_proof))
        .route("/api/v1/signing", post(api::request_signing))
        .route("/api/v1/signing/{request_id}/status", get(api::signing_status))
        .route("/api/v1/signing/{request_id}/payment", post(api::request_payment))
        .route("/api/v1/flow", post(api::create_flow))
        .route("/api/v1/flow/{flow_id}", get(api::get_flow))
        .route("/api/v1/flow/{flow_id}/events", get(api::flow_events))
        .route("/api/v1/chat", post(api::chat_gone))
        .route("/.well-known/agent-card.json", get(discovery::agent_card))
        .route("/.well-known/agent.json", get(discovery::agent_descriptor))
        .route("/.well-known/mcp.json", get(discovery::mcp_manifest))
        .route("/a2a", post(a2a::handle))
        .route("/mcp", post(mcp::handle))
        .with_state(Arc::clone(&state));

    let rate_limit = GlobalRateLimit::new(Arc::clone(&state.deps.kv), GLOBAL_RATE_LIMIT_MAX, GLOBAL_RATE_LIMIT_WINDOW);

    Router::new()
        .merge(gated)
        .merge(rest)
        .layer(axum::middleware::from_fn(crate::middleware::request_logger_middleware))
        .layer(axum::middleware::from_fn(crate::middleware::request_id_middleware))
        .layer(axum::middleware::from_fn_with_state(rate_limit, crate::middleware::rate_limit_middleware))
        .layer(TraceLayer::new_for_http())
}
