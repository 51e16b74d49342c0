// SPDX-License-Identifier: MIT OR Apache-2.0
//! Payment facilitator (C4): record, index, and transition payment lifecycle states.

use chrono::{DateTime, Utc};
use std::time::Duration;
use zka_core::{PaymentId, PaymentRecord, PaymentStatus, TaskId};
use zka_error::{AgentError, ErrorCode};
use zka_kv::KvStore;

fn record_key(id: PaymentId) -> String {
    format!("payment:{id}")
}

fn task_index_key(task_id: TaskId) -> String {
    format!("payment:task:{task_id}")
}

fn status_set_key(status: PaymentStatus) -> String {
    format!("payment:status:{status}")
}

fn to_value(record: &PaymentRecord) -> Result<serde_json::Value, AgentError> {
    serde_json::to_value(record).map_err(|e| AgentError::permanent(ErrorCode::Internal, format!("serialize payment record: {e}")))
}

fn from_value(value: serde_json::Value) -> Result<PaymentRecord, AgentError> {
    serde_json::from_value(value).map_err(|e| AgentError::permanent(ErrorCode::Internal, format!("corrupt payment record: {e}")))
}

/// Records, indexes, and transitions [`PaymentRecord`]s over a [`KvStore`].
pub struct PaymentFacilitator<'a> {
    store: &'a dyn KvStore,
    ttl: Duration,
}

impl<'a> PaymentFacilitator<'a> {
    /// Construct a facilitator persisting records (and their indexes) with `ttl`.
    pub fn new(store: &'a dyn KvStore, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    async fn persist(&self, record: &PaymentRecord) -> Result<(), AgentError> {
        self.store.set(&record_key(record.id), to_value(record)?, Some(self.ttl)).await
    }

    /// Create a new `pending` payment record for `task_id`, writing the
    /// record, its task index, and its status-set membership.
    pub async fn record(
        &self,
        task_id: TaskId,
        payer_address: impl Into<String>,
        amount: impl Into<String>,
        network: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<PaymentRecord, AgentError> {
        let record = PaymentRecord::new(task_id, payer_address, amount, network, now);
        self.persist(&record).await?;
        self.store
            .set(&task_index_key(task_id), serde_json::Value::from(record.id.to_string()), Some(self.ttl))
            .await?;
        self.store.set_add(&status_set_key(PaymentStatus::Pending), &record.id.to_string()).await?;
        Ok(record)
    }

    /// Load a payment record by id.
    pub async fn get(&self, id: PaymentId) -> Result<Option<PaymentRecord>, AgentError> {
        match self.store.get(&record_key(id)).await? {
            Some(v) => Ok(Some(from_value(v)?)),
            None => Ok(None),
        }
    }

    /// Load a payment record by its originating task.
    pub async fn get_by_task(&self, task_id: TaskId) -> Result<Option<PaymentRecord>, AgentError> {
        match self.store.get(&task_index_key(task_id)).await? {
            Some(serde_json::Value::String(id_str)) => {
                let id: PaymentId = id_str
                    .parse()
                    .map_err(|_| AgentError::permanent(ErrorCode::Internal, "corrupt payment task index"))?;
                self.get(id).await
            }
            Some(_) | None => Ok(None),
        }
    }

    async fn transition(&self, id: PaymentId, to: PaymentStatus, now: DateTime<Utc>) -> Result<PaymentRecord, AgentError> {
        let mut record = self
            .get(id)
            .await?
            .ok_or_else(|| AgentError::not_found(ErrorCode::PaymentNotFound, format!("payment {id} not found")))?;
        let from = record.status;
        match to {
            PaymentStatus::Settled => record.settle(now)?,
            PaymentStatus::Refunded => record.refund(now)?,
            PaymentStatus::Pending => {
                return Err(AgentError::invalid_state(
                    ErrorCode::PaymentInvalidTransition,
                    "cannot transition a payment back to pending",
                ));
            }
        }
        self.persist(&record).await?;
        self.store.set_remove(&status_set_key(from), &id.to_string()).await?;
        self.store.set_add(&status_set_key(to), &id.to_string()).await?;
        Ok(record)
    }

    /// Transition `pending -> settled`.
    pub async fn settle(&self, id: PaymentId, now: DateTime<Utc>) -> Result<PaymentRecord, AgentError> {
        self.transition(id, PaymentStatus::Settled, now).await
    }

    /// Transition `pending -> refunded`.
    pub async fn refund(&self, id: PaymentId, now: DateTime<Utc>) -> Result<PaymentRecord, AgentError> {
        self.transition(id, PaymentStatus::Refunded, now).await
    }

    /// List payment records, optionally filtered to one status. Unfiltered,
    /// unions all three status sets.
    pub async fn list(&self, status: Option<PaymentStatus>) -> Result<Vec<PaymentRecord>, AgentError> {
        let statuses = match status {
            Some(s) => vec![s],
            None => vec![PaymentStatus::Pending, PaymentStatus::Settled, PaymentStatus::Refunded],
        };
        let mut out = Vec::new();
        for s in statuses {
            for id_str in self.store.set_members(&status_set_key(s)).await? {
                let Ok(id) = id_str.parse::<PaymentId>() else { continue };
                if let Some(record) = self.get(id).await? {
                    out.push(record);
                }
            }
        }
        Ok(out)
    }
}
