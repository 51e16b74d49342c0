// SPDX-License-Identifier: MIT OR Apache-2.0
//! Typed key-value store gateway.
//!
//! [`KvStore`] is the minimal semantic surface every stateful component
//! (task store, proof cache, rate limiter, payment facilitator) builds on.
//! All operations are atomic per key. Implementations must normalize their
//! backing store's error taxonomy to [`zka_error::ErrorCode::StoreTransient`]
//! / [`zka_error::ErrorCode::StorePermanent`] — callers never see a
//! backend-specific error type.

#![deny(unsafe_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use zka_error::{AgentError, ErrorCode};

mod redis_store;
pub use redis_store::RedisKvStore;

/// Minimal atomic-per-key surface over a shared ordered/set/list backing store.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Fetch a scalar value, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Value>, AgentError>;

    /// Set a scalar value, optionally with a TTL.
    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), AgentError>;

    /// Remove a key unconditionally.
    async fn delete(&self, key: &str) -> Result<(), AgentError>;

    /// Push a value onto the left (head) of a list, creating it if absent.
    async fn list_push_left(&self, key: &str, value: Value) -> Result<(), AgentError>;

    /// Pop a value from the right (tail) of a list, or `None` if empty/absent.
    async fn list_pop_right(&self, key: &str) -> Result<Option<Value>, AgentError>;

    /// Add a member to a set, creating it if absent.
    async fn set_add(&self, key: &str, member: &str) -> Result<(), AgentError>;

    /// Remove a member from a set. No-op if absent.
    async fn set_remove(&self, key: &str, member: &str) -> Result<(), AgentError>;

    /// List all members of a set, in unspecified order.
    async fn set_members(&self, key: &str) -> Result<Vec<String>, AgentError>;

    /// Atomically increment an integer counter (creating it at 0 if absent) and return the new value.
    async fn incr(&self, key: &str) -> Result<i64, AgentError>;

    /// Set or refresh a key's TTL.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), AgentError>;

    /// Remaining TTL in seconds, or `None` if the key has no TTL or does not exist.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, AgentError>;
}

#[derive(Debug, Clone)]
enum Entry {
    Scalar(Value),
    List(VecDeque<Value>),
    Set(HashSet<String>),
}

impl Entry {
    fn kind(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::List(_) => "list",
            Self::Set(_) => "set",
        }
    }
}

#[derive(Debug, Clone)]
struct Record {
    entry: Entry,
    expires_at: Option<Instant>,
}

fn type_mismatch(key: &str, found: &Entry, wanted: &str) -> AgentError {
    AgentError::permanent(
        ErrorCode::StorePermanent,
        format!("key {key} holds a {} value, expected {wanted}", found.kind()),
    )
}

/// In-process `KvStore` backed by a sharded-free `HashMap` guarded by a
/// single mutex, with lazy per-key TTL expiry. Used in tests and single-node
/// deployments; [`RedisKvStore`] lives behind the same trait for multi-node
/// deployments and is selected by `Config::kv_store_url` at startup.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, Record>>,
}

impl MemoryKvStore {
    /// Construct an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Record>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_live(record: &Record, now: Instant) -> bool {
        record.expires_at.is_none_or(|at| at > now)
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, AgentError> {
        let now = Instant::now();
        let mut map = self.lock();
        match map.get(key) {
            Some(record) if Self::is_live(record, now) => match &record.entry {
                Entry::Scalar(v) => Ok(Some(v.clone())),
                other => Err(type_mismatch(key, other, "scalar")),
            },
            Some(_) => {
                map.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), AgentError> {
        let mut map = self.lock();
        map.insert(
            key.to_string(),
            Record {
                entry: Entry::Scalar(value),
                expires_at: ttl.map(|d| Instant::now() + d),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AgentError> {
        self.lock().remove(key);
        Ok(())
    }

    async fn list_push_left(&self, key: &str, value: Value) -> Result<(), AgentError> {
        let mut map = self.lock();
        match map.get_mut(key) {
            Some(record) => match &mut record.entry {
                Entry::List(list) => {
                    list.push_front(value);
                    Ok(())
                }
                other => Err(type_mismatch(key, other, "list")),
            },
            None => {
                let mut list = VecDeque::new();
                list.push_front(value);
                map.insert(
                    key.to_string(),
                    Record {
                        entry: Entry::List(list),
                        expires_at: None,
                    },
                );
                Ok(())
            }
        }
    }

    async fn list_pop_right(&self, key: &str) -> Result<Option<Value>, AgentError> {
        let mut map = self.lock();
        match map.get_mut(key) {
            Some(record) => match &mut record.entry {
                Entry::List(list) => Ok(list.pop_back()),
                other => Err(type_mismatch(key, other, "list")),
            },
            None => Ok(None),
        }
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<(), AgentError> {
        let mut map = self.lock();
        match map.get_mut(key) {
            Some(record) => match &mut record.entry {
                Entry::Set(set) => {
                    set.insert(member.to_string());
                    Ok(())
                }
                other => Err(type_mismatch(key, other, "set")),
            },
            None => {
                let mut set = HashSet::new();
                set.insert(member.to_string());
                map.insert(
                    key.to_string(),
                    Record {
                        entry: Entry::Set(set),
                        expires_at: None,
                    },
                );
                Ok(())
            }
        }
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<(), AgentError> {
        let mut map = self.lock();
        if let Some(record) = map.get_mut(key) {
            match &mut record.entry {
                Entry::Set(set) => {
                    set.remove(member);
                }
                other => return Err(type_mismatch(key, other, "set")),
            }
        }
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, AgentError> {
        let map = self.lock();
        match map.get(key) {
            Some(record) => match &record.entry {
                Entry::Set(set) => Ok(set.iter().cloned().collect()),
                other => Err(type_mismatch(key, other, "set")),
            },
            None => Ok(Vec::new()),
        }
    }

    async fn incr(&self, key: &str) -> Result<i64, AgentError> {
        let mut map = self.lock();
        match map.get_mut(key) {
            Some(record) => match &mut record.entry {
                Entry::Scalar(Value::Number(n)) => {
                    let current = n.as_i64().ok_or_else(|| {
                        AgentError::permanent(ErrorCode::StorePermanent, format!("key {key} is not an integer counter"))
                    })?;
                    let next = current + 1;
                    record.entry = Entry::Scalar(Value::from(next));
                    Ok(next)
                }
                other => Err(type_mismatch(key, other, "integer counter")),
            },
            None => {
                map.insert(
                    key.to_string(),
                    Record {
                        entry: Entry::Scalar(Value::from(1i64)),
                        expires_at: None,
                    },
                );
                Ok(1)
            }
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), AgentError> {
        let mut map = self.lock();
        if let Some(record) = map.get_mut(key) {
            record.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, AgentError> {
        let now = Instant::now();
        let map = self.lock();
        Ok(map.get(key).and_then(|record| record.expires_at).map(|at| at.saturating_duration_since(now)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = MemoryKvStore::new();
        store.set("k", Value::from("v"), None).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(Value::from("v")));
    }

    #[tokio::test]
    async fn get_on_absent_key_is_none() {
        let store = MemoryKvStore::new();
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn ttl_expiry_makes_the_key_absent() {
        let store = MemoryKvStore::new();
        store.set("k", Value::from(1), Some(Duration::from_secs(1))).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(Value::from(1)));
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_push_left_pop_right_is_fifo() {
        let store = MemoryKvStore::new();
        store.list_push_left("q", Value::from("a")).await.unwrap();
        store.list_push_left("q", Value::from("b")).await.unwrap();
        // push_left(a) then push_left(b) => [b, a]; pop_right drains oldest-first.
        assert_eq!(store.list_pop_right("q").await.unwrap(), Some(Value::from("a")));
        assert_eq!(store.list_pop_right("q").await.unwrap(), Some(Value::from("b")));
        assert_eq!(store.list_pop_right("q").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_add_remove_and_members() {
        let store = MemoryKvStore::new();
        store.set_add("s", "x").await.unwrap();
        store.set_add("s", "y").await.unwrap();
        let mut members = store.set_members("s").await.unwrap();
        members.sort();
        assert_eq!(members, vec!["x".to_string(), "y".to_string()]);
        store.set_remove("s", "x").await.unwrap();
        assert_eq!(store.set_members("s").await.unwrap(), vec!["y".to_string()]);
    }

    #[tokio::test]
    async fn incr_starts_at_one_and_is_monotonic() {
        let store = MemoryKvStore::new();
        assert_eq!(store.incr("c").await.unwrap(), 1);
        assert_eq!(store.incr("c").await.unwrap(), 2);
        assert_eq!(store.incr("c").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn type_mismatch_between_list_and_scalar_is_permanent_error() {
        let store = MemoryKvStore::new();
        store.set("k", Value::from(1), None).await.unwrap();
        let err = store.list_push_left("k", Value::from(2)).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::StorePermanent);
    }

    #[tokio::test(start_paused = true)]
    async fn expire_sets_ttl_on_existing_key() {
        let store = MemoryKvStore::new();
        store.set("k", Value::from(1), None).await.unwrap();
        assert_eq!(store.ttl("k").await.unwrap(), None);
        store.expire("k", Duration::from_secs(10)).await.unwrap();
        let remaining = store.ttl("k").await.unwrap().unwrap();
        assert!(remaining <= Duration::from_secs(10) && remaining > Duration::from_secs(9));
    }
}
