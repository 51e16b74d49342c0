// SPDX-License-Identifier: MIT OR Apache-2.0
//! Reputation hook (C12): best-effort increment of the agent's on-chain
//! reputation score after a successful `generate_proof`.

use alloy_primitives::Address;
use alloy_provider::Provider;
use alloy_rpc_types_eth::TransactionRequest;
use alloy_sol_types::{sol, SolCall};
use tracing::warn;

sol! {
    interface IReputationRegistry {
        function incrementScore(address agent) external;
    }
}

/// Submit an `incrementScore` transaction and spawn it as fire-and-forget:
/// the caller does not await on-chain confirmation, and any failure here is
/// logged only — it never affects the proof task's completion status.
pub fn record_success<P>(provider: P, registry_address: Address, agent_address: Address)
where
    P: Provider + Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let call = IReputationRegistry::incrementScoreCall { agent: agent_address };
        let tx = TransactionRequest::default().to(registry_address).input(call.abi_encode().into());
        match provider.send_transaction(tx).await {
            Ok(pending) => {
                if let Err(e) = pending.get_receipt().await {
                    warn!(error = %e, "reputation increment transaction did not confirm");
                }
            }
            Err(e) => warn!(error = %e, "reputation increment transaction failed to submit"),
        }
    });
}
