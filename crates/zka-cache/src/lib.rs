// SPDX-License-Identifier: MIT OR Apache-2.0
//! Deterministic-fingerprint proof cache.
//!
//! Keys are produced by [`zka_core::proof_cache_key`], already prefixed with
//! `proof:`, so this crate's job is purely the `Get`/`Set`/`Invalidate`
//! surface and the cached payload shape — fingerprinting lives in `zka-core`
//! because the worker pool also needs it to decide whether to skip the
//! prover entirely (§4.16 of the design).

#![deny(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::time::Duration;
use zka_error::AgentError;
use zka_kv::KvStore;

/// The artifact payload produced by a successful `generate_proof` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedProof {
    /// Hex-encoded proof bytes.
    pub proof: String,
    /// Hex-encoded public inputs.
    pub public_inputs: String,
    /// Hex-encoded proof concatenated with its public inputs.
    pub proof_with_inputs: String,
    /// Hex-encoded nullifier.
    pub nullifier: String,
    /// Hex-encoded signal hash.
    pub signal_hash: String,
}

/// Proof cache over a [`KvStore`].
pub struct ProofCache<'a> {
    store: &'a dyn KvStore,
    ttl: Duration,
}

impl<'a> ProofCache<'a> {
    /// Construct a cache storing entries for `ttl`.
    pub fn new(store: &'a dyn KvStore, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Look up a previously cached proof by its fingerprint key.
    ///
    /// # Errors
    ///
    /// Propagates [`KvStore`] failures. A malformed stored value is reported
    /// as a permanent cache corruption error rather than panicking.
    pub async fn get(&self, key: &str) -> Result<Option<CachedProof>, AgentError> {
        match self.store.get(key).await? {
            Some(value) => {
                let cached: CachedProof = serde_json::from_value(value).map_err(|e| {
                    AgentError::permanent(
                        zka_error::ErrorCode::Internal,
                        format!("corrupt proof cache entry {key}: {e}"),
                    )
                })?;
                Ok(Some(cached))
            }
            None => Ok(None),
        }
    }

    /// Store a proof under its fingerprint key with the cache's configured TTL.
    pub async fn set(&self, key: &str, proof: &CachedProof) -> Result<(), AgentError> {
        let value = serde_json::to_value(proof)
            .map_err(|e| AgentError::permanent(zka_error::ErrorCode::Internal, format!("serialize proof: {e}")))?;
        self.store.set(key, value, Some(self.ttl)).await
    }

    /// Evict a cached proof, if present.
    pub async fn invalidate(&self, key: &str) -> Result<(), AgentError> {
        self.store.delete(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zka_core::{proof_cache_key, CacheKeyInputs};
    use zka_kv::MemoryKvStore;

    fn sample() -> CachedProof {
        CachedProof {
            proof: "0xaa".into(),
            public_inputs: "0xbb".into(),
            proof_with_inputs: "0xaabb".into(),
            nullifier: "0xcc".into(),
            signal_hash: "0xdd".into(),
        }
    }

    #[tokio::test]
    async fn miss_then_hit_round_trips() {
        let store = MemoryKvStore::new();
        let cache = ProofCache::new(&store, Duration::from_secs(3600));
        let key = proof_cache_key(&CacheKeyInputs {
            circuit_id: "coinbase_attestation",
            address: "0xabc",
            scope: "test",
            country_list: None,
            is_included: None,
        });

        assert_eq!(cache.get(&key).await.unwrap(), None);
        cache.set(&key, &sample()).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap(), Some(sample()));
    }

    #[tokio::test]
    async fn invalidate_removes_entry() {
        let store = MemoryKvStore::new();
        let cache = ProofCache::new(&store, Duration::from_secs(3600));
        cache.set("proof:abc", &sample()).await.unwrap();
        cache.invalidate("proof:abc").await.unwrap();
        assert_eq!(cache.get("proof:abc").await.unwrap(), None);
    }
}
