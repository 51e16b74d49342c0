// SPDX-License-Identifier: MIT OR Apache-2.0
//! Redis-backed [`KvStore`], for multi-node deployments where task, cache,
//! and rate-limit state must be shared across daemon processes.

use async_trait::async_trait;
use redis::AsyncCommands;
use serde_json::Value;
use std::time::Duration;
use zka_error::{AgentError, ErrorCode};

use crate::KvStore;

fn transient(context: &str, err: redis::RedisError) -> AgentError {
    AgentError::transient(ErrorCode::StoreTransient, format!("{context}: {err}"))
}

fn permanent(context: &str, err: redis::RedisError) -> AgentError {
    AgentError::permanent(ErrorCode::StorePermanent, format!("{context}: {err}"))
}

/// Maps a Redis error to our taxonomy: a `WRONGTYPE` reply (the caller used
/// a key with the wrong command family) is permanent, everything else
/// (connection reset, timeout, cluster redirect mid-flight) is transient.
fn classify(context: &str, err: redis::RedisError) -> AgentError {
    if err.kind() == redis::ErrorKind::TypeError || err.code() == Some("WRONGTYPE") {
        permanent(context, err)
    } else {
        transient(context, err)
    }
}

/// `KvStore` over a remote Redis (or Redis-compatible) server, selected by
/// `Config::kv_store_url` at startup. Holds a [`redis::Client`] and opens a
/// fresh multiplexed connection per call, the way the rest of this agent's
/// outbound clients (chain RPC, attestation HTTP) are stateless per-request.
pub struct RedisKvStore {
    client: redis::Client,
}

impl RedisKvStore {
    /// Parse `url` (`redis://` or `rediss://`) and construct a store over it.
    /// Does not connect eagerly; the first call opens the connection.
    pub fn new(url: &str) -> Result<Self, AgentError> {
        let client = redis::Client::open(url)
            .map_err(|e| AgentError::permanent(ErrorCode::InvalidConfig, format!("invalid redis url: {e}")))?;
        Ok(Self { client })
    }

    async fn conn(&self) -> Result<redis::aio::MultiplexedConnection, AgentError> {
        self.client.get_multiplexed_tokio_connection().await.map_err(|e| transient("connect", e))
    }
}

#[async_trait]
impl KvStore for RedisKvStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, AgentError> {
        let mut conn = self.conn().await?;
        let raw: Option<String> = conn.get(key).await.map_err(|e| classify("get", e))?;
        raw.map(|s| serde_json::from_str(&s).map_err(|e| AgentError::permanent(ErrorCode::StorePermanent, format!("get: corrupt value at {key}: {e}"))))
            .transpose()
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), AgentError> {
        let mut conn = self.conn().await?;
        let json = serde_json::to_string(&value)
            .map_err(|e| AgentError::permanent(ErrorCode::StorePermanent, format!("set: value does not serialize: {e}")))?;
        match ttl {
            Some(d) => conn.set_ex::<_, _, ()>(key, json, d.as_secs().max(1)).await.map_err(|e| classify("set", e))?,
            None => conn.set::<_, _, ()>(key, json).await.map_err(|e| classify("set", e))?,
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AgentError> {
        let mut conn = self.conn().await?;
        conn.del::<_, ()>(key).await.map_err(|e| classify("delete", e))
    }

    async fn list_push_left(&self, key: &str, value: Value) -> Result<(), AgentError> {
        let mut conn = self.conn().await?;
        let json = serde_json::to_string(&value)
            .map_err(|e| AgentError::permanent(ErrorCode::StorePermanent, format!("list_push_left: value does not serialize: {e}")))?;
        conn.lpush::<_, _, ()>(key, json).await.map_err(|e| classify("list_push_left", e))
    }

    async fn list_pop_right(&self, key: &str) -> Result<Option<Value>, AgentError> {
        let mut conn = self.conn().await?;
        let raw: Option<String> = conn.rpop(key, None).await.map_err(|e| classify("list_pop_right", e))?;
        raw.map(|s| {
            serde_json::from_str(&s).map_err(|e| AgentError::permanent(ErrorCode::StorePermanent, format!("list_pop_right: corrupt entry at {key}: {e}")))
        })
        .transpose()
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<(), AgentError> {
        let mut conn = self.conn().await?;
        conn.sadd::<_, _, ()>(key, member).await.map_err(|e| classify("set_add", e))
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<(), AgentError> {
        let mut conn = self.conn().await?;
        conn.srem::<_, _, ()>(key, member).await.map_err(|e| classify("set_remove", e))
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, AgentError> {
        let mut conn = self.conn().await?;
        conn.smembers(key).await.map_err(|e| classify("set_members", e))
    }

    async fn incr(&self, key: &str) -> Result<i64, AgentError> {
        let mut conn = self.conn().await?;
        conn.incr(key, 1).await.map_err(|e| classify("incr", e))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), AgentError> {
        let mut conn = self.conn().await?;
        conn.expire::<_, ()>(key, ttl.as_secs().max(1) as i64).await.map_err(|e| classify("expire", e))
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, AgentError> {
        let mut conn = self.conn().await?;
        let seconds: i64 = conn.ttl(key).await.map_err(|e| classify("ttl", e))?;
        // Redis TTL: -2 key does not exist, -1 exists with no expiry, >=0 seconds remaining.
        Ok(if seconds < 0 { None } else { Some(Duration::from_secs(seconds as u64)) })
    }
}
