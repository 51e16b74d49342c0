// SPDX-License-Identifier: MIT OR Apache-2.0
//! Flow orchestrator (C17): an auto-advancing projection over a [`Request`],
//! plus the KV persistence for both `Request` and `Flow` records and the
//! `context -> request` mapping frontends consult for `ContextFlow` auto-fill.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use zka_core::{Flow, FlowId, Phase, Request, RequestId, TaskId};
use zka_error::{AgentError, ErrorCode};
use zka_kv::KvStore;

fn request_key(id: RequestId) -> String {
    format!("request:{id}")
}

fn flow_key(id: FlowId) -> String {
    format!("flow:{id}")
}

fn to_value<T: serde::Serialize>(v: &T) -> Result<Value, AgentError> {
    serde_json::to_value(v).map_err(|e| AgentError::permanent(ErrorCode::Internal, format!("serialize: {e}")))
}

fn from_value<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, AgentError> {
    serde_json::from_value(value).map_err(|e| AgentError::permanent(ErrorCode::Internal, format!("corrupt record: {e}")))
}

/// Persists [`Request`]/[`Flow`] records and drives the flow's auto-advance
/// logic described in §4.17: a single read performs any phase transition
/// possible without further user input.
pub struct FlowOrchestrator {
    kv: Arc<dyn KvStore>,
    signing_ttl: Duration,
}

impl FlowOrchestrator {
    /// Construct an orchestrator persisting records with `signing_ttl`,
    /// refreshed on every phase advance per §3.
    pub fn new(kv: Arc<dyn KvStore>, signing_ttl: Duration) -> Self {
        Self { kv, signing_ttl }
    }

    fn chrono_ttl(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.signing_ttl).unwrap_or_else(|_| chrono::Duration::seconds(300))
    }

    /// Create a new signing-phase request and persist it.
    pub async fn create_request(
        &self,
        circuit_id: impl Into<String>,
        scope: impl Into<String>,
        country_list: Option<Vec<String>>,
        is_included: Option<bool>,
        now: DateTime<Utc>,
    ) -> Result<Request, AgentError> {
        let request = Request::new(circuit_id, scope, country_list, is_included, now, self.chrono_ttl());
        self.save_request(&request).await?;
        Ok(request)
    }

    async fn save_request(&self, request: &Request) -> Result<(), AgentError> {
        self.kv.set(&request_key(request.request_id), to_value(request)?, Some(self.signing_ttl)).await
    }

    /// Load a request by id, or `None` if absent/expired.
    pub async fn get_request(&self, id: RequestId) -> Result<Option<Request>, AgentError> {
        match self.kv.get(&request_key(id)).await? {
            Some(v) => Ok(Some(from_value(v)?)),
            None => Ok(None),
        }
    }

    /// Load a request by id, failing with `RequestNotFound` if absent.
    pub async fn require_request(&self, id: RequestId) -> Result<Request, AgentError> {
        self.get_request(id)
            .await?
            .ok_or_else(|| AgentError::not_found(ErrorCode::RequestNotFound, format!("request {id} not found")))
    }

    /// Persist an externally mutated request (e.g. after recording a
    /// signature or payment settlement) and re-run auto-advance.
    pub async fn update_request(&self, mut request: Request, payments_enabled: bool, now: DateTime<Utc>) -> Result<Request, AgentError> {
        self.auto_advance_request(&mut request, payments_enabled, now);
        self.save_request(&request).await?;
        Ok(request)
    }

    fn auto_advance_request(&self, request: &mut Request, payments_enabled: bool, now: DateTime<Utc>) {
        let ttl = self.chrono_ttl();
        if request.phase == Phase::Signing && request.signing_complete() {
            let _ = request.advance_to_payment(now, ttl);
        }
        if request.phase == Phase::Payment && request.payment_satisfied(payments_enabled) {
            let _ = request.advance_to_ready(payments_enabled, now, ttl);
        }
    }

    /// Create a new flow wrapping `request_id` and persist it.
    pub async fn create_flow(&self, request_id: RequestId) -> Result<Flow, AgentError> {
        let flow = Flow::new(request_id);
        self.save_flow(&flow).await?;
        Ok(flow)
    }

    async fn save_flow(&self, flow: &Flow) -> Result<(), AgentError> {
        self.kv.set(&flow_key(flow.flow_id), to_value(flow)?, Some(self.signing_ttl)).await
    }

    async fn get_flow(&self, id: FlowId) -> Result<Option<Flow>, AgentError> {
        match self.kv.get(&flow_key(id)).await? {
            Some(v) => Ok(Some(from_value(v)?)),
            None => Ok(None),
        }
    }

    /// The auto-advancing read at the heart of C17: reload the flow's
    /// underlying request, advance it as far as `(signing, payment)` state
    /// allows, and — the first time the flow observes `ready` — mint a
    /// `TaskId` for `generate_proof` and flip the flow to `generating`.
    ///
    /// Returns the refreshed flow plus `Some(TaskId)` exactly once: the
    /// call that first transitions `ready -> generating`. Callers enqueue
    /// the `generate_proof` task using that id.
    pub async fn advance(
        &self,
        flow_id: FlowId,
        payments_enabled: bool,
        now: DateTime<Utc>,
    ) -> Result<(Flow, Option<TaskId>), AgentError> {
        let mut flow = self
            .get_flow(flow_id)
            .await?
            .ok_or_else(|| AgentError::not_found(ErrorCode::FlowNotFound, format!("flow {flow_id} not found")))?;

        let mut request = self.require_request(flow.request_id).await?;
        self.auto_advance_request(&mut request, payments_enabled, now);
        self.save_request(&request).await?;

        let mut minted = None;
        match request.phase {
            Phase::Ready if flow.phase != Phase::Generating => {
                let task_id = TaskId::new();
                flow.proof_task_id = Some(task_id);
                flow.phase = Phase::Generating;
                minted = Some(task_id);
            }
            Phase::Completed | Phase::Failed => {
                flow.phase = request.phase;
            }
            other if flow.phase != Phase::Generating => {
                flow.phase = other;
            }
            _ => {}
        }

        self.save_flow(&flow).await?;
        Ok((flow, minted))
    }

    /// Mark a generating flow's terminal outcome once its proof task finishes.
    pub async fn mark_flow_terminal(&self, flow_id: FlowId, phase: Phase) -> Result<Flow, AgentError> {
        let mut flow = self
            .get_flow(flow_id)
            .await?
            .ok_or_else(|| AgentError::not_found(ErrorCode::FlowNotFound, format!("flow {flow_id} not found")))?;
        flow.phase = phase;
        self.save_flow(&flow).await?;
        Ok(flow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zka_core::request::{PaymentSubStatus, SigningStatus};
    use zka_kv::MemoryKvStore;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc)
    }

    fn orchestrator() -> FlowOrchestrator {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        FlowOrchestrator::new(kv, Duration::from_secs(300))
    }

    #[tokio::test]
    async fn flow_stays_in_signing_until_signature_recorded() {
        let orch = orchestrator();
        let request = orch.create_request("coinbase_attestation", "scope-1", None, None, now()).await.unwrap();
        let flow = orch.create_flow(request.request_id).await.unwrap();

        let (advanced, minted) = orch.advance(flow.flow_id, false, now()).await.unwrap();
        assert_eq!(advanced.phase, Phase::Signing);
        assert!(minted.is_none());
    }

    #[tokio::test]
    async fn flow_auto_advances_to_ready_and_mints_a_task_once() {
        let orch = orchestrator();
        let request = orch.create_request("coinbase_attestation", "scope-1", None, None, now()).await.unwrap();
        let flow = orch.create_flow(request.request_id).await.unwrap();

        let mut request = orch.require_request(request.request_id).await.unwrap();
        request.signing.status = Some(SigningStatus::Completed);
        orch.update_request(request, false, now()).await.unwrap();

        let (advanced, minted) = orch.advance(flow.flow_id, false, now()).await.unwrap();
        assert_eq!(advanced.phase, Phase::Generating);
        assert!(minted.is_some());
        assert_eq!(advanced.proof_task_id, minted);

        // A second read must not mint a second task.
        let (advanced_again, minted_again) = orch.advance(flow.flow_id, false, now()).await.unwrap();
        assert_eq!(advanced_again.phase, Phase::Generating);
        assert!(minted_again.is_none());
        assert_eq!(advanced_again.proof_task_id, minted);
    }

    #[tokio::test]
    async fn flow_waits_on_payment_when_payments_enabled() {
        let orch = orchestrator();
        let request = orch.create_request("coinbase_attestation", "scope-1", None, None, now()).await.unwrap();
        let flow = orch.create_flow(request.request_id).await.unwrap();

        let mut request = orch.require_request(request.request_id).await.unwrap();
        request.signing.status = Some(SigningStatus::Completed);
        orch.update_request(request, true, now()).await.unwrap();

        let (advanced, minted) = orch.advance(flow.flow_id, true, now()).await.unwrap();
        assert_eq!(advanced.phase, Phase::Payment);
        assert!(minted.is_none());

        let mut request = orch.require_request(flow.request_id).await.unwrap();
        request.payment.status = Some(PaymentSubStatus::Completed);
        orch.update_request(request, true, now()).await.unwrap();

        let (advanced, minted) = orch.advance(flow.flow_id, true, now()).await.unwrap();
        assert_eq!(advanced.phase, Phase::Generating);
        assert!(minted.is_some());
    }

    #[tokio::test]
    async fn unknown_flow_id_is_not_found() {
        let orch = orchestrator();
        let err = orch.advance(FlowId::new(), false, now()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::FlowNotFound);
    }
}
