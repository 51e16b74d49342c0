// SPDX-License-Identifier: MIT OR Apache-2.0
//! Unified error taxonomy with stable error codes for the proof agent.
//!
//! Every error surfaced across protocol frontends, skill handlers, and
//! background workers carries a [`ErrorKind`] (the broad family from
//! §7 of the design), a machine-readable [`ErrorCode`], a human-readable
//! message, and arbitrary key-value context. This lets every frontend
//! (REST, A2A, MCP) map the same underlying failure to its own wire
//! shape without re-deriving the classification.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Broad error family, used to decide retry policy and HTTP/JSON-RPC status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing or malformed params. Never retried.
    Validation,
    /// Unknown task/request/flow/payment.
    NotFound,
    /// Caller lacks a valid payment claim for a gated route.
    PaymentRequired,
    /// An entity transitioned from a state that does not permit the requested change.
    InvalidState,
    /// RPC, key-value store, or subprocess failure that may succeed on retry.
    Transient,
    /// Cryptographic verification failure or contract revert; never retried.
    Permanent,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::PaymentRequired => "payment_required",
            Self::InvalidState => "invalid_state",
            Self::Transient => "transient",
            Self::Permanent => "permanent",
        };
        f.write_str(s)
    }
}

impl ErrorKind {
    /// Whether a caller may usefully retry an operation that failed with this kind.
    #[must_use]
    pub fn retryable(self) -> bool {
        matches!(self, Self::Transient)
    }
}

/// Machine-readable, stable error code. Serializes to `SCREAMING_SNAKE_CASE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// A required parameter was missing.
    MissingParam,
    /// A parameter failed schema or semantic validation.
    InvalidParam,
    /// Referenced circuit id is not in the static registry.
    UnknownCircuit,
    /// Task id does not exist or has expired.
    TaskNotFound,
    /// Request (signing session) id does not exist or has expired.
    RequestNotFound,
    /// Flow id does not exist or has expired.
    FlowNotFound,
    /// Payment record id does not exist.
    PaymentNotFound,
    /// `x-payment` header absent on a gated route.
    PaymentMissing,
    /// Payment record is not in the source state the transition requires.
    PaymentInvalidTransition,
    /// Task is in a terminal state and cannot be transitioned again.
    TaskTerminal,
    /// Request phase does not allow the requested advance.
    RequestPhaseInvalid,
    /// Key-value store call failed transiently (timeout, connection reset).
    StoreTransient,
    /// Key-value store rejected the operation permanently (e.g. bad key shape).
    StorePermanent,
    /// The ZK prover subprocess failed or timed out.
    ProverFailed,
    /// The TEE provider returned an error or could not be reached.
    TeeUnavailable,
    /// Attestation document failed signature, PCR, or chain verification.
    AttestationInvalid,
    /// On-chain verifier call failed or reverted.
    ChainVerificationFailed,
    /// Rate limit exceeded for the given key.
    RateLimited,
    /// A configuration value was missing or failed validation at process start.
    InvalidConfig,
    /// Unclassified internal failure.
    Internal,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A classified error carrying a [`ErrorKind`], [`ErrorCode`], message, and context.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("{code} ({kind}): {message}")]
pub struct AgentError {
    /// Broad retry/response family.
    pub kind: ErrorKind,
    /// Stable machine-readable code.
    pub code: ErrorCode,
    /// Human-readable message. Never contains a stack trace.
    pub message: String,
    /// Arbitrary structured context (field names, ids, etc.).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, serde_json::Value>,
}

impl AgentError {
    /// Construct a new error with no context.
    pub fn new(kind: ErrorKind, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
            context: BTreeMap::new(),
        }
    }

    /// Attach a context key-value pair, returning `self` for chaining.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Shorthand for a [`ErrorKind::Validation`] error.
    pub fn validation(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, code, message)
    }

    /// Shorthand for a [`ErrorKind::NotFound`] error.
    pub fn not_found(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, code, message)
    }

    /// Shorthand for a [`ErrorKind::InvalidState`] error.
    pub fn invalid_state(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidState, code, message)
    }

    /// Shorthand for a [`ErrorKind::Transient`] error.
    pub fn transient(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, code, message)
    }

    /// Shorthand for a [`ErrorKind::Permanent`] error.
    pub fn permanent(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Permanent, code, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code_kind_and_message() {
        let err = AgentError::not_found(ErrorCode::TaskNotFound, "no such task");
        let s = err.to_string();
        assert!(s.contains("TASK_NOT_FOUND"));
        assert!(s.contains("not_found"));
        assert!(s.contains("no such task"));
    }

    #[test]
    fn context_round_trips_through_json() {
        let err = AgentError::validation(ErrorCode::MissingParam, "missing scope")
            .with_context("field", "scope");
        let json = serde_json::to_string(&err).unwrap();
        let back: AgentError = serde_json::from_str(&json).unwrap();
        assert_eq!(back.context.get("field").unwrap(), "scope");
    }

    #[test]
    fn only_transient_is_retryable() {
        assert!(ErrorKind::Transient.retryable());
        assert!(!ErrorKind::Validation.retryable());
        assert!(!ErrorKind::Permanent.retryable());
        assert!(!ErrorKind::NotFound.retryable());
        assert!(!ErrorKind::InvalidState.retryable());
        assert!(!ErrorKind::PaymentRequired.retryable());
    }
}
