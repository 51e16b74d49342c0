// SPDX-License-Identifier: MIT OR Apache-2.0
//! Settlement worker (C5): sweeps pending payments and confirms or refunds
//! them against an on-chain USDC transfer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use zka_core::{PaymentId, PaymentRecord, PaymentStatus};
use zka_error::AgentError;

use crate::facilitator::PaymentFacilitator;

/// Maximum number of settlement attempts before a payment is abandoned
/// (left `pending` forever, surfaced via metrics/logs rather than refunded —
/// refunding would require the original payer signature, which the agent
/// does not hold).
pub const MAX_SETTLEMENT_ATTEMPTS: u32 = 3;

/// Abstraction over the on-chain USDC transfer the settlement worker
/// confirms. Implemented against an EVM RPC client elsewhere in the agent;
/// kept as a local trait so this crate never depends on a chain client.
#[async_trait]
pub trait UsdcTransferer: Send + Sync {
    /// Returns `Ok(true)` if the named payer's transfer to the agent's
    /// receiving address has confirmed on-chain, `Ok(false)` if it has not
    /// yet (retry later), or `Err` on a transient RPC failure.
    async fn is_confirmed(&self, record: &PaymentRecord) -> Result<bool, AgentError>;
}

/// Sweeps `pending` payments, confirming or giving up on each according to
/// [`MAX_SETTLEMENT_ATTEMPTS`]. Retry counters are in-memory only: a daemon
/// restart resets every payment's attempt count to zero, per §9.
pub struct SettlementWorker<'a> {
    facilitator: PaymentFacilitator<'a>,
    transferer: &'a dyn UsdcTransferer,
    attempts: Mutex<HashMap<PaymentId, u32>>,
    abandoned: Mutex<HashSet<PaymentId>>,
}

/// Outcome of sweeping a single pending payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    /// The transfer confirmed; the record moved to `settled`.
    Settled,
    /// The transfer has not confirmed yet and the retry budget remains.
    StillPending,
    /// The retry budget was exhausted; the record stays `pending` and is
    /// skipped on future sweeps.
    Abandoned,
}

impl<'a> SettlementWorker<'a> {
    /// Construct a worker over `facilitator`'s store, confirming transfers
    /// via `transferer`.
    pub fn new(facilitator: PaymentFacilitator<'a>, transferer: &'a dyn UsdcTransferer) -> Self {
        Self {
            facilitator,
            transferer,
            attempts: Mutex::new(HashMap::new()),
            abandoned: Mutex::new(HashSet::new()),
        }
    }

    fn lock_attempts(&self) -> std::sync::MutexGuard<'_, HashMap<PaymentId, u32>> {
        self.attempts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_abandoned(&self) -> std::sync::MutexGuard<'_, HashSet<PaymentId>> {
        self.abandoned.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Sweep every currently `pending` payment once, returning the outcome
    /// per payment id.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> Result<Vec<(PaymentId, SweepOutcome)>, AgentError> {
        let pending = self.facilitator.list(Some(PaymentStatus::Pending)).await?;
        let mut outcomes = Vec::with_capacity(pending.len());
        for record in pending {
            if self.lock_abandoned().contains(&record.id) {
                continue;
            }
            outcomes.push((record.id, self.sweep_one(&record, now).await?));
        }
        Ok(outcomes)
    }

    async fn sweep_one(&self, record: &PaymentRecord, now: DateTime<Utc>) -> Result<SweepOutcome, AgentError> {
        match self.transferer.is_confirmed(record).await {
            Ok(true) => {
                self.facilitator.settle(record.id, now).await?;
                self.lock_attempts().remove(&record.id);
                Ok(SweepOutcome::Settled)
            }
            Ok(false) | Err(_) => {
                let mut attempts = self.lock_attempts();
                let count = attempts.entry(record.id).or_insert(0);
                *count += 1;
                if *count >= MAX_SETTLEMENT_ATTEMPTS {
                    drop(attempts);
                    self.lock_abandoned().insert(record.id);
                    Ok(SweepOutcome::Abandoned)
                } else {
                    Ok(SweepOutcome::StillPending)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use zka_kv::MemoryKvStore;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc)
    }

    struct NeverConfirms;

    #[async_trait]
    impl UsdcTransferer for NeverConfirms {
        async fn is_confirmed(&self, _record: &PaymentRecord) -> Result<bool, AgentError> {
            Ok(false)
        }
    }

    struct ConfirmsAfter {
        remaining_misses: AtomicUsize,
    }

    #[async_trait]
    impl UsdcTransferer for ConfirmsAfter {
        async fn is_confirmed(&self, _record: &PaymentRecord) -> Result<bool, AgentError> {
            if self.remaining_misses.fetch_sub(1, Ordering::SeqCst) == 0 {
                Ok(true)
            } else {
                Ok(false)
            }
        }
    }

    #[tokio::test]
    async fn confirmed_transfer_settles_the_payment() {
        let store = MemoryKvStore::new();
        let facilitator = PaymentFacilitator::new(&store, std::time::Duration::from_secs(300));
        let record = facilitator
            .record(zka_core::TaskId::new(), "0xpayer", "0.10", "eip155:84532", now())
            .await
            .unwrap();

        let transferer = ConfirmsAfter { remaining_misses: AtomicUsize::new(0) };
        let worker = SettlementWorker::new(facilitator, &transferer);
        let outcomes = worker.sweep_once(now()).await.unwrap();
        assert_eq!(outcomes, vec![(record.id, SweepOutcome::Settled)]);
    }

    #[tokio::test]
    async fn unconfirmed_transfer_is_abandoned_after_max_attempts() {
        let store = MemoryKvStore::new();
        let facilitator = PaymentFacilitator::new(&store, std::time::Duration::from_secs(300));
        let record = facilitator
            .record(zka_core::TaskId::new(), "0xpayer", "0.10", "eip155:84532", now())
            .await
            .unwrap();

        let transferer = NeverConfirms;
        let worker = SettlementWorker::new(facilitator, &transferer);

        let mut last = None;
        for _ in 0..MAX_SETTLEMENT_ATTEMPTS {
            let outcomes = worker.sweep_once(now()).await.unwrap();
            last = outcomes.into_iter().find(|(id, _)| *id == record.id).map(|(_, o)| o);
        }
        assert_eq!(last, Some(SweepOutcome::Abandoned));

        // A further sweep skips the abandoned payment entirely.
        let outcomes = worker.sweep_once(now()).await.unwrap();
        assert!(outcomes.is_empty());

        // The record itself is still pending, never force-refunded.
        let reloaded = worker.facilitator.get(record.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, PaymentStatus::Pending);
    }
}
