// SPDX-License-Identifier: MIT OR Apache-2.0
//! The signing → payment → ready lifecycle for a single end-user credential
//! flow, and the higher-level auto-advancing [`Flow`] projection over it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a [`Request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

impl RequestId {
    /// Generate a fresh, random request id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::str::FromStr for RequestId {
    type Err = uuid::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Status of the wallet-signing sub-flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SigningStatus {
    /// Waiting on the user to sign.
    Pending,
    /// Signature received and accepted.
    Completed,
    /// Signing window elapsed or was rejected.
    Failed,
}

/// State of the wallet-signing sub-flow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SigningState {
    /// Current signing status, if signing has started.
    pub status: Option<SigningStatus>,
    /// Signer address, once known.
    pub address: Option<String>,
    /// Hex-encoded signature, once known.
    pub signature: Option<String>,
    /// Hash of the signal bound into the proof.
    pub signal_hash: Option<String>,
}

/// Status of the payment sub-flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentSubStatus {
    /// Payment link issued, awaiting settlement.
    Pending,
    /// Payment confirmed.
    Completed,
    /// Payment mode is disabled; this sub-flow is vacuously satisfied.
    Skipped,
}

/// State of the payment sub-flow within a [`Request`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentState {
    /// Current payment sub-status, if payment has been requested.
    pub status: Option<PaymentSubStatus>,
    /// Hosted payment page URL.
    pub payment_url: Option<String>,
    /// On-chain transaction hash, once settled.
    pub tx_hash: Option<String>,
    /// USD-denominated decimal amount string (e.g. `"0.10"`).
    pub amount: Option<String>,
    /// Currency code, e.g. `"USDC"`.
    pub currency: Option<String>,
    /// Chain identifier, e.g. `"eip155:84532"`.
    pub network: Option<String>,
}

/// Overall phase of a [`Request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Waiting on wallet signature.
    Signing,
    /// Waiting on payment settlement.
    Payment,
    /// Both prerequisites satisfied; a proof task may be enqueued.
    Ready,
    /// A `generate_proof` task has been enqueued and is running.
    Generating,
    /// The proof task completed successfully.
    Completed,
    /// The proof task failed.
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Signing => "signing",
            Self::Payment => "payment",
            Self::Ready => "ready",
            Self::Generating => "generating",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Tracks the signing → payment → ready lifecycle for one end-user credential flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Unique identifier.
    pub request_id: RequestId,
    /// Target circuit.
    pub circuit_id: String,
    /// Nullifier-isolating scope string.
    pub scope: String,
    /// Optional country-list membership inputs (coinbase_country_attestation).
    pub country_list: Option<Vec<String>>,
    /// Whether membership in `country_list` must hold (`true`) or must not (`false`).
    pub is_included: Option<bool>,
    /// Signing sub-state.
    pub signing: SigningState,
    /// Payment sub-state.
    pub payment: PaymentState,
    /// Overall phase.
    pub phase: Phase,
    /// When the request was created.
    pub created_at: DateTime<Utc>,
    /// When the request (and its TTL) expires.
    pub expires_at: DateTime<Utc>,
}

impl Request {
    /// Construct a new request in the `signing` phase.
    pub fn new(
        circuit_id: impl Into<String>,
        scope: impl Into<String>,
        country_list: Option<Vec<String>>,
        is_included: Option<bool>,
        now: DateTime<Utc>,
        ttl: chrono::Duration,
    ) -> Self {
        Self {
            request_id: RequestId::new(),
            circuit_id: circuit_id.into(),
            scope: scope.into(),
            country_list,
            is_included,
            signing: SigningState::default(),
            payment: PaymentState::default(),
            phase: Phase::Signing,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    /// Whether the request may enter the `payment` phase.
    #[must_use]
    pub fn signing_complete(&self) -> bool {
        self.signing.status == Some(SigningStatus::Completed)
    }

    /// Whether the request may enter the `ready` phase, given whether payments
    /// are enabled system-wide.
    #[must_use]
    pub fn payment_satisfied(&self, payments_enabled: bool) -> bool {
        if !payments_enabled {
            return true;
        }
        self.payment.status == Some(PaymentSubStatus::Completed)
    }

    /// Advance `signing -> payment` if signing just completed. No-op otherwise.
    /// Extends `expires_at` by `ttl` on every phase advance.
    pub fn advance_to_payment(&mut self, now: DateTime<Utc>, ttl: chrono::Duration) -> Result<(), zka_error::AgentError> {
        if self.phase != Phase::Signing {
            return Err(zka_error::AgentError::invalid_state(
                zka_error::ErrorCode::RequestPhaseInvalid,
                format!("cannot enter payment phase from {}", self.phase),
            ));
        }
        if !self.signing_complete() {
            return Err(zka_error::AgentError::invalid_state(
                zka_error::ErrorCode::RequestPhaseInvalid,
                "signing must complete before payment",
            ));
        }
        self.phase = Phase::Payment;
        self.expires_at = now + ttl;
        Ok(())
    }

    /// Advance `payment -> ready` if payment just completed (or is disabled).
    pub fn advance_to_ready(
        &mut self,
        payments_enabled: bool,
        now: DateTime<Utc>,
        ttl: chrono::Duration,
    ) -> Result<(), zka_error::AgentError> {
        if self.phase != Phase::Payment {
            return Err(zka_error::AgentError::invalid_state(
                zka_error::ErrorCode::RequestPhaseInvalid,
                format!("cannot enter ready phase from {}", self.phase),
            ));
        }
        if !self.payment_satisfied(payments_enabled) {
            return Err(zka_error::AgentError::invalid_state(
                zka_error::ErrorCode::RequestPhaseInvalid,
                "payment must complete before ready",
            ));
        }
        self.phase = Phase::Ready;
        self.expires_at = now + ttl;
        Ok(())
    }
}

/// A higher-level orchestrated projection over a [`Request`] that
/// auto-advances on each read (see `zka-runtime::flow`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowId(pub Uuid);

impl FlowId {
    /// Generate a fresh, random flow id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FlowId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::str::FromStr for FlowId {
    type Err = uuid::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Persisted flow state: a thin wrapper binding a [`FlowId`] to a [`RequestId`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flow {
    /// Unique identifier.
    pub flow_id: FlowId,
    /// The underlying request this flow orchestrates.
    pub request_id: RequestId,
    /// Last-observed phase (refreshed on each auto-advancing read).
    pub phase: Phase,
    /// Proof task enqueued once the flow reaches `generating`, if any.
    pub proof_task_id: Option<crate::task::TaskId>,
}

impl Flow {
    /// Construct a new flow wrapping `request_id`, starting in `signing`.
    pub fn new(request_id: RequestId) -> Self {
        Self {
            flow_id: FlowId::new(),
            request_id,
            phase: Phase::Signing,
            proof_task_id: None,
        }
    }
}
