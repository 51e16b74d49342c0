// SPDX-License-Identifier: MIT OR Apache-2.0
//! Payment record types shared between the facilitator, settlement worker,
//! and payment gate middleware.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use zka_error::{AgentError, ErrorCode};

/// Unique identifier for a [`PaymentRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentId(pub Uuid);

impl PaymentId {
    /// Generate a fresh, random payment id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PaymentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::str::FromStr for PaymentId {
    type Err = uuid::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Lifecycle state of a [`PaymentRecord`].
///
/// Transitions: `pending -> settled` and `pending -> refunded` only. A
/// payment transitions at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Recorded, awaiting settlement.
    Pending,
    /// On-chain transfer confirmed.
    Settled,
    /// Payment could not be settled and was reversed.
    Refunded,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Settled => "settled",
            Self::Refunded => "refunded",
        };
        f.write_str(s)
    }
}

/// A recorded payment claim, indexed by task and by status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    /// Unique identifier.
    pub id: PaymentId,
    /// The task this payment is gating.
    pub task_id: crate::task::TaskId,
    /// Payer's address as decoded from the `x-payment` header.
    pub payer_address: String,
    /// USD-denominated decimal string, e.g. `"0.10"`.
    pub amount: String,
    /// Chain identifier, e.g. `"eip155:84532"`.
    pub network: String,
    /// Current lifecycle state.
    pub status: PaymentStatus,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// Last time the record was mutated.
    pub updated_at: DateTime<Utc>,
}

impl PaymentRecord {
    /// Construct a new payment record in the `pending` state.
    pub fn new(
        task_id: crate::task::TaskId,
        payer_address: impl Into<String>,
        amount: impl Into<String>,
        network: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: PaymentId::new(),
            task_id,
            payer_address: payer_address.into(),
            amount: amount.into(),
            network: network.into(),
            status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Transition `pending -> settled`. Fails with [`ErrorCode::PaymentInvalidTransition`]
    /// unless the current status is `pending`.
    pub fn settle(&mut self, now: DateTime<Utc>) -> Result<(), AgentError> {
        self.transition(PaymentStatus::Settled, now)
    }

    /// Transition `pending -> refunded`. Fails with [`ErrorCode::PaymentInvalidTransition`]
    /// unless the current status is `pending`.
    pub fn refund(&mut self, now: DateTime<Utc>) -> Result<(), AgentError> {
        self.transition(PaymentStatus::Refunded, now)
    }

    fn transition(&mut self, next: PaymentStatus, now: DateTime<Utc>) -> Result<(), AgentError> {
        if self.status != PaymentStatus::Pending {
            return Err(AgentError::invalid_state(
                ErrorCode::PaymentInvalidTransition,
                format!("payment {} is {} and cannot move to {next}", self.id, self.status),
            ));
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }
}

/// Parse a USD decimal string (optionally `$`-prefixed) into an integer USDC
/// amount (6 decimals): `parse_usdc_amount("$0.10") == 100_000`.
///
/// # Errors
///
/// Returns an error on empty or non-numeric input.
pub fn parse_usdc_amount(input: &str) -> Result<u64, AgentError> {
    let trimmed = input.trim().trim_start_matches('$');
    if trimmed.is_empty() {
        return Err(AgentError::validation(ErrorCode::InvalidParam, "empty USDC amount"));
    }
    let decimal: rust_decimal::Decimal = trimmed.parse().map_err(|_| {
        AgentError::validation(ErrorCode::InvalidParam, format!("non-numeric USDC amount: {input}"))
    })?;
    let scaled = decimal * rust_decimal::Decimal::from(1_000_000u64);
    let micros = scaled
        .round()
        .to_string()
        .parse::<i64>()
        .map_err(|_| AgentError::validation(ErrorCode::InvalidParam, "amount overflow"))?;
    if micros < 0 {
        return Err(AgentError::validation(ErrorCode::InvalidParam, "negative USDC amount"));
    }
    Ok(micros as u64)
}
