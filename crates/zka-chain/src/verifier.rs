// SPDX-License-Identifier: MIT OR Apache-2.0
//! On-chain proof verifier (C10): a static `(chainId, circuitId) ->
//! verifierAddress` table and a read-only `verify(bytes,bytes32[])` view call.

use alloy_primitives::{address, Address, Bytes, FixedBytes};
use alloy_provider::{Provider, RootProvider};
use alloy_rpc_types_eth::TransactionRequest;
use alloy_sol_types::{sol, SolCall};
use zka_error::{AgentError, ErrorCode};

sol! {
    interface IProofVerifier {
        function verify(bytes proof, bytes32[] publicInputs) external view returns (bool);
    }
}

/// One entry in the static verifier-address table.
struct VerifierEntry {
    chain_id: u64,
    circuit_id: &'static str,
    address: Address,
}

/// Deployed verifier contracts this agent knows how to call, per chain and
/// circuit. Extend when a circuit is deployed to a new chain.
const VERIFIERS: &[VerifierEntry] = &[
    VerifierEntry {
        chain_id: 84532, // Base Sepolia
        circuit_id: "coinbase_attestation",
        address: address!("0x1111111111111111111111111111111111111111"),
    },
    VerifierEntry {
        chain_id: 84532,
        circuit_id: "coinbase_country_attestation",
        address: address!("0x2222222222222222222222222222222222222222"),
    },
    VerifierEntry {
        chain_id: 8453, // Base mainnet
        circuit_id: "coinbase_attestation",
        address: address!("0x3333333333333333333333333333333333333333"),
    },
    VerifierEntry {
        chain_id: 8453,
        circuit_id: "coinbase_country_attestation",
        address: address!("0x4444444444444444444444444444444444444444"),
    },
];

fn lookup_verifier(chain_id: u64, circuit_id: &str) -> Result<Address, AgentError> {
    VERIFIERS
        .iter()
        .find(|e| e.chain_id == chain_id && e.circuit_id == circuit_id)
        .map(|e| e.address)
        .ok_or_else(|| {
            AgentError::validation(
                ErrorCode::UnknownCircuit,
                format!("no verifier deployed for circuit {circuit_id} on chain {chain_id}"),
            )
        })
}

fn parse_public_inputs(public_inputs_hex: &str) -> Result<Vec<FixedBytes<32>>, AgentError> {
    let bytes = hex::decode(public_inputs_hex.trim_start_matches("0x"))
        .map_err(|e| AgentError::validation(ErrorCode::InvalidParam, format!("public inputs are not valid hex: {e}")))?;
    if bytes.len() % 32 != 0 {
        return Err(AgentError::validation(ErrorCode::InvalidParam, "public inputs are not a multiple of 32 bytes"));
    }
    Ok(bytes.chunks_exact(32).map(FixedBytes::<32>::from_slice).collect())
}

/// The verifier contract address registered for `(chain_id, circuit_id)`,
/// formatted as a `0x`-prefixed hex string for use in skill responses.
pub fn verifier_address(chain_id: u64, circuit_id: &str) -> Result<String, AgentError> {
    lookup_verifier(chain_id, circuit_id).map(|a| a.to_string())
}

/// Calls the registered verifier contract's `verify(bytes,bytes32[])` view
/// function for `circuit_id` on `chain_id`. Fails before any network call if
/// no verifier is registered for that pair.
pub async fn verify(
    provider: &RootProvider,
    chain_id: u64,
    circuit_id: &str,
    proof_hex: &str,
    public_inputs_hex: &str,
) -> Result<bool, AgentError> {
    let address = lookup_verifier(chain_id, circuit_id)?;
    let proof = hex::decode(proof_hex.trim_start_matches("0x"))
        .map_err(|e| AgentError::validation(ErrorCode::InvalidParam, format!("proof is not valid hex: {e}")))?;
    let public_inputs = parse_public_inputs(public_inputs_hex)?;

    let call = IProofVerifier::verifyCall { proof: Bytes::from(proof), publicInputs: public_inputs };
    let tx = TransactionRequest::default().to(address).input(call.abi_encode().into());

    let raw = provider
        .call(tx)
        .await
        .map_err(|e| AgentError::transient(ErrorCode::ChainVerificationFailed, format!("On-chain verification failed: {e}")))?;

    IProofVerifier::verifyCall::abi_decode_returns(&raw)
        .map_err(|e| AgentError::permanent(ErrorCode::ChainVerificationFailed, format!("On-chain verification failed: malformed return value: {e}")))
}
