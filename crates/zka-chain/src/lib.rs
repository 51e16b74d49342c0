// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
//! On-chain surface of the proof-generation agent: read-only proof
//! verification, identity auto-registration, a fire-and-forget reputation
//! hook, and USDC settlement confirmation, all over an `alloy` EVM RPC
//! connection.

pub mod identity;
pub mod provider;
pub mod reputation;
pub mod settlement;
pub mod verifier;

pub use identity::register_if_needed;
pub use provider::{chain_id, connect, connect_signing, signer_from_private_key};
pub use reputation::record_success;
pub use settlement::EvmUsdcTransferer;
pub use verifier::{verifier_address, verify};
