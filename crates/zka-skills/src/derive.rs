// SPDX-License-Identifier: MIT OR Apache-2.0
//! Nullifier and signal-hash derivation.
//!
//! Circuit internals are out of scope (§1 Non-goals): the real prover binary
//! owns the actual nullifier/signal computation over witness data this crate
//! never sees. What `generate_proof` needs is a *stable, deterministic*
//! value to bind into the cached artifact and the response shape, so this
//! module derives one as `sha256(circuitId || 0x00 || address || 0x00 ||
//! scope)` for the nullifier and `sha256(scope)` for the signal hash. Both
//! are invented bookkeeping, not cryptographic claims about the circuit.

use sha2::{Digest, Sha256};

/// Derive a stable hex-encoded nullifier for `(circuit_id, address, scope)`.
#[must_use]
pub fn nullifier_for(circuit_id: &str, address: &str, scope: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(circuit_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(address.as_bytes());
    hasher.update([0u8]);
    hasher.update(scope.as_bytes());
    format!("0x{:x}", hasher.finalize())
}

/// Derive a stable hex-encoded signal hash for `scope`, used when no signing
/// session has already produced one.
#[must_use]
pub fn signal_hash_for(scope: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(scope.as_bytes());
    format!("0x{:x}", hasher.finalize())
}
