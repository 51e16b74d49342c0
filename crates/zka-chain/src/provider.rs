// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared read/write EVM provider construction.

use alloy_network::EthereumWallet;
use alloy_primitives::Address;
use alloy_provider::{Provider, ProviderBuilder, RootProvider};
use alloy_signer_local::PrivateKeySigner;
use zka_error::{AgentError, ErrorCode};

/// Connect a plain HTTP JSON-RPC provider. No wallet filler is attached: use
/// [`connect_signing`] for calls that submit transactions.
pub fn connect(rpc_url: &str) -> Result<RootProvider, AgentError> {
    let url = rpc_url
        .parse()
        .map_err(|e| AgentError::validation(ErrorCode::InvalidConfig, format!("invalid chain RPC URL: {e}")))?;
    Ok(ProviderBuilder::new().connect_http(url))
}

/// Construct the agent's signer from its configured private key (hex,
/// optionally `0x`-prefixed), returning the signer's address alongside it.
pub fn signer_from_private_key(private_key: &str) -> Result<(PrivateKeySigner, Address), AgentError> {
    let signer: PrivateKeySigner = private_key
        .trim_start_matches("0x")
        .parse()
        .map_err(|e| AgentError::validation(ErrorCode::InvalidConfig, format!("invalid prover private key: {e}")))?;
    let address = signer.address();
    Ok((signer, address))
}

/// Connect a provider with a wallet filler attached, able to submit signed
/// transactions (identity registration, reputation increments).
pub fn connect_signing(rpc_url: &str, private_key: &str) -> Result<(impl Provider, Address), AgentError> {
    let (signer, address) = signer_from_private_key(private_key)?;
    let wallet = EthereumWallet::from(signer);
    let url = rpc_url
        .parse()
        .map_err(|e| AgentError::validation(ErrorCode::InvalidConfig, format!("invalid chain RPC URL: {e}")))?;
    let provider = ProviderBuilder::new().wallet(wallet).connect_http(url);
    Ok((provider, address))
}

/// Resolve the connected chain's numeric id, used to key the static verifier
/// table.
pub async fn chain_id(provider: &impl Provider) -> Result<u64, AgentError> {
    provider
        .get_chain_id()
        .await
        .map_err(|e| AgentError::transient(ErrorCode::ChainVerificationFailed, format!("failed to read chain id: {e}")))
}
