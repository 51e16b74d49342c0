// SPDX-License-Identifier: MIT OR Apache-2.0
//! Static registry of supported ZK circuits.

use serde::{Deserialize, Serialize};
use zka_error::{AgentError, ErrorCode};

/// Describes one ZK circuit supported by this agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitDescriptor {
    /// Stable circuit identifier, e.g. `"coinbase_attestation"`.
    pub id: &'static str,
    /// Human-friendly name.
    pub display_name: &'static str,
    /// Short description.
    pub description: &'static str,
    /// EAS schema id this circuit consumes attestations from.
    pub eas_schema_id: &'static str,
    /// 4-byte function selector of the on-chain verifier entrypoint.
    pub function_selector: &'static str,
    /// Names of the inputs the prover driver expects in `circuitParams`.
    pub required_inputs: &'static [&'static str],
}

/// The static registry, populated at build time.
pub const CIRCUITS: &[CircuitDescriptor] = &[
    CircuitDescriptor {
        id: "coinbase_attestation",
        display_name: "Coinbase Verified Account",
        description: "Proves the prover holds a Coinbase-attested account without revealing its address",
        eas_schema_id: "0xf8b05c5f50b6a53c0a4c80ba5a3ea7a59c79b6a1b3e0d3a19aae5cc09e9a1f9e",
        function_selector: "0x1a2b3c4d",
        required_inputs: &["raw_transaction", "signature", "merkle_proof", "address", "scope"],
    },
    CircuitDescriptor {
        id: "coinbase_country_attestation",
        display_name: "Coinbase Country Attestation",
        description: "Proves country-list membership (inclusion or exclusion) of a Coinbase-attested account",
        eas_schema_id: "0x2c1b9e9a1d7a4f0e83a8dcf6e6eac2be7a0be3d1e2b6f9c0a4f5b3c7d8e9f0a1",
        function_selector: "0x5e6f7a8b",
        required_inputs: &[
            "raw_transaction",
            "signature",
            "merkle_proof",
            "address",
            "scope",
            "country_list",
            "is_included",
        ],
    },
];

/// Look up a [`CircuitDescriptor`] by id.
///
/// # Errors
///
/// Returns [`ErrorCode::UnknownCircuit`] if `id` is not in the static registry.
pub fn lookup(id: &str) -> Result<&'static CircuitDescriptor, AgentError> {
    CIRCUITS
        .iter()
        .find(|c| c.id == id)
        .ok_or_else(|| AgentError::validation(ErrorCode::UnknownCircuit, format!("unknown circuit: {id}")))
}

/// Return all registered circuit ids.
#[must_use]
pub fn all_ids() -> Vec<&'static str> {
    CIRCUITS.iter().map(|c| c.id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_finds_known_circuit() {
        let c = lookup("coinbase_attestation").unwrap();
        assert_eq!(c.display_name, "Coinbase Verified Account");
    }

    #[test]
    fn lookup_rejects_unknown_circuit() {
        let err = lookup("not_a_circuit").unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownCircuit);
    }

    #[test]
    fn registry_contains_both_spec_circuits() {
        let ids = all_ids();
        assert!(ids.contains(&"coinbase_attestation"));
        assert!(ids.contains(&"coinbase_country_attestation"));
    }
}
