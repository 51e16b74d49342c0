// SPDX-License-Identifier: MIT OR Apache-2.0
//! Binds `zka_chain`'s free functions to the `zka_runtime::deps` trait
//! objects (`ChainVerifier`, `ReputationHook`) the rest of the daemon
//! depends on.

use alloy_primitives::Address;
use alloy_provider::{Provider, RootProvider};
use async_trait::async_trait;
use zka_error::AgentError;
use zka_runtime::deps::{ChainVerifier, ReputationHook};

/// On-chain proof verifier backed by a read-only RPC provider.
///
/// `zka_chain::verify` takes a single joined hex string for the public
/// inputs; [`ChainVerifier::verify`] takes one hex string per input, so this
/// adapter strips each entry's `0x` prefix and concatenates them before
/// delegating.
pub struct EvmChainVerifier {
    provider: RootProvider,
}

impl EvmChainVerifier {
    /// Wrap a read-only provider.
    pub fn new(provider: RootProvider) -> Self {
        Self { provider }
    }
}

fn join_public_inputs(public_inputs_hex: &[String]) -> String {
    let joined: String = public_inputs_hex
        .iter()
        .map(|s| s.trim_start_matches("0x"))
        .collect();
    format!("0x{joined}")
}

#[async_trait]
impl ChainVerifier for EvmChainVerifier {
    async fn verify(
        &self,
        chain_id: u64,
        circuit_id: &str,
        proof_hex: &str,
        public_inputs_hex: &[String],
    ) -> Result<bool, AgentError> {
        let joined = join_public_inputs(public_inputs_hex);
        zka_chain::verify(&self.provider, chain_id, circuit_id, proof_hex, &joined).await
    }

    fn verifier_address(&self, chain_id: u64, circuit_id: &str) -> Result<String, AgentError> {
        zka_chain::verifier_address(chain_id, circuit_id)
    }
}

/// Fire-and-forget reputation increments, submitted by a wallet-attached
/// provider. Generic over the concrete (opaque) provider type returned by
/// [`zka_chain::connect_signing`], which cannot be named directly.
pub struct ChainReputationHook<P> {
    provider: P,
    registry_address: Address,
    agent_address: Address,
}

impl<P> ChainReputationHook<P>
where
    P: Provider + Clone + Send + Sync + 'static,
{
    /// Build a hook that increments `agent_address`'s score on the given
    /// registry whenever [`ReputationHook::record_success`] fires.
    pub fn new(provider: P, registry_address: Address, agent_address: Address) -> Self {
        Self {
            provider,
            registry_address,
            agent_address,
        }
    }
}

impl<P> ReputationHook for ChainReputationHook<P>
where
    P: Provider + Clone + Send + Sync + 'static,
{
    fn record_success(&self) {
        zka_chain::record_success(self.provider.clone(), self.registry_address, self.agent_address);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_and_reprefixes_public_inputs() {
        let inputs = vec!["0xaa".to_string(), "0xbb".to_string(), "cc".to_string()];
        assert_eq!(join_public_inputs(&inputs), "0xaabbcc");
    }

    #[test]
    fn empty_public_inputs_join_to_bare_prefix() {
        let inputs: Vec<String> = vec![];
        assert_eq!(join_public_inputs(&inputs), "0x");
    }
}
