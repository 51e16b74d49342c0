// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
//! Subprocess-backed ZK prover: fixed-width input serialization plus the
//! witness-gen/prove invocation pipeline behind [`zka_tee::ProverDriver`].

mod driver;
mod toml_input;

pub use driver::{ProverBinaries, SubprocessProverDriver, STAGE_TIMEOUT};
pub use toml_input::{to_circuit_toml, COUNTRY_LIST_LEN, MERKLE_PROOF_DEPTH, RAW_TRANSACTION_LEN, SIGNATURE_LEN};
