// SPDX-License-Identifier: MIT OR Apache-2.0
//! Canonical-JSON fingerprinting used to key the proof cache.
//!
//! Canonical JSON requires sorted object keys and preserves array order, so
//! that semantically identical inputs hash identically regardless of the
//! order fields were inserted in.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Fields bound into a proof cache key.
#[derive(Debug, Clone, Serialize)]
pub struct CacheKeyInputs<'a> {
    /// Target circuit id.
    pub circuit_id: &'a str,
    /// Signer address.
    pub address: &'a str,
    /// Nullifier-isolating scope.
    pub scope: &'a str,
    /// Optional country list (coinbase_country_attestation only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_list: Option<&'a [String]>,
    /// Optional inclusion flag (coinbase_country_attestation only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_included: Option<bool>,
}

/// Recursively sort all object keys in a [`Value`], leaving array element
/// order untouched.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted: Vec<_> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            let mut out = serde_json::Map::new();
            for (k, v) in sorted {
                out.insert(k.clone(), canonicalize(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Compute the stable `proof:<sha256>` cache key for a set of generate_proof inputs.
///
/// Equal inputs (as JSON values, independent of field insertion order) yield
/// equal keys.
#[must_use]
pub fn proof_cache_key(inputs: &CacheKeyInputs<'_>) -> String {
    let value = serde_json::to_value(inputs).expect("CacheKeyInputs always serializes");
    let canonical = canonicalize(&value);
    let bytes = serde_json::to_vec(&canonical).expect("canonical value always serializes");
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    format!("proof:{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_inputs_yield_identical_keys() {
        let a = CacheKeyInputs {
            circuit_id: "coinbase_attestation",
            address: "0x5555555555555555555555555555555555555555",
            scope: "test",
            country_list: None,
            is_included: None,
        };
        let b = CacheKeyInputs {
            circuit_id: "coinbase_attestation",
            address: "0x5555555555555555555555555555555555555555",
            scope: "test",
            country_list: None,
            is_included: None,
        };
        assert_eq!(proof_cache_key(&a), proof_cache_key(&b));
    }

    #[test]
    fn different_scope_yields_different_key() {
        let a = CacheKeyInputs {
            circuit_id: "coinbase_attestation",
            address: "0xabc",
            scope: "appone.example",
            country_list: None,
            is_included: None,
        };
        let b = CacheKeyInputs {
            circuit_id: "coinbase_attestation",
            address: "0xabc",
            scope: "apptwo.example",
            country_list: None,
            is_included: None,
        };
        assert_ne!(proof_cache_key(&a), proof_cache_key(&b));
    }

    #[test]
    fn key_is_prefixed_and_stable_length() {
        let k = proof_cache_key(&CacheKeyInputs {
            circuit_id: "coinbase_attestation",
            address: "0xabc",
            scope: "test",
            country_list: None,
            is_included: None,
        });
        assert!(k.starts_with("proof:"));
        assert_eq!(k.len(), "proof:".len() + 64);
    }

    #[test]
    fn object_key_order_does_not_affect_canonicalization() {
        let v1: Value = serde_json::json!({"b": 1, "a": 2});
        let v2: Value = serde_json::json!({"a": 2, "b": 1});
        assert_eq!(canonicalize(&v1), canonicalize(&v2));
        assert_eq!(
            serde_json::to_vec(&canonicalize(&v1)).unwrap(),
            serde_json::to_vec(&canonicalize(&v2)).unwrap()
        );
    }
}
