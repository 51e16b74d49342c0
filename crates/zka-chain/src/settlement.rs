// SPDX-License-Identifier: MIT OR Apache-2.0
//! [`zka_payments::UsdcTransferer`] implementation: confirms a pending
//! payment by scanning the configured USDC contract for a matching ERC-20
//! `Transfer` event from the payer to the operator's settlement address.

use alloy_primitives::{Address, U256};
use alloy_provider::Provider;
use alloy_rpc_types_eth::Filter;
use alloy_sol_types::{sol, SolEvent};
use async_trait::async_trait;
use zka_core::{parse_usdc_amount, PaymentRecord};
use zka_error::{AgentError, ErrorCode};
use zka_payments::UsdcTransferer;

sol! {
    interface IERC20 {
        event Transfer(address indexed from, address indexed to, uint256 value);
    }
}

/// How many recent blocks to scan on each confirmation check. A fresh
/// payment can only have settled after it was recorded, so an unbounded
/// scan back to genesis is both wasteful and unnecessary.
const SCAN_WINDOW_BLOCKS: u64 = 5_000;

pub struct EvmUsdcTransferer<P> {
    provider: P,
    usdc_address: Address,
    operator_address: Address,
}

impl<P: Provider> EvmUsdcTransferer<P> {
    pub fn new(provider: P, usdc_address: Address, operator_address: Address) -> Self {
        Self { provider, usdc_address, operator_address }
    }
}

#[async_trait]
impl<P: Provider + Send + Sync> UsdcTransferer for EvmUsdcTransferer<P> {
    async fn is_confirmed(&self, record: &PaymentRecord) -> Result<bool, AgentError> {
        let payer: Address = record
            .payer_address
            .parse()
            .map_err(|e| AgentError::validation(ErrorCode::InvalidParam, format!("payer address is not a valid address: {e}")))?;
        let required = parse_usdc_amount(&record.amount)?;

        let latest = self
            .provider
            .get_block_number()
            .await
            .map_err(|e| AgentError::transient(ErrorCode::ChainVerificationFailed, format!("failed to read latest block: {e}")))?;
        let from_block = latest.saturating_sub(SCAN_WINDOW_BLOCKS);

        let filter = Filter::new()
            .address(self.usdc_address)
            .event_signature(IERC20::Transfer::SIGNATURE_HASH)
            .topic1(payer.into_word())
            .topic2(self.operator_address.into_word())
            .from_block(from_block)
            .to_block(latest);

        let logs = self
            .provider
            .get_logs(&filter)
            .await
            .map_err(|e| AgentError::transient(ErrorCode::ChainVerificationFailed, format!("failed to scan USDC transfer logs: {e}")))?;

        for log in logs {
            let Ok(decoded) = log.log_decode::<IERC20::Transfer>() else { continue };
            if decoded.inner.value >= U256::from(required) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_amount_parses_from_the_record() {
        assert_eq!(parse_usdc_amount("$0.10").unwrap(), 100_000);
    }
}
