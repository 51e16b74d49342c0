// SPDX-License-Identifier: MIT OR Apache-2.0
//! Attestation document codec and verifier (C8).

#![deny(unsafe_code)]

pub mod cose;
pub mod document;
pub mod verify;

pub use cose::{decode_envelope, sig_structure, verify_alg_is_es384, CoseSign1};
pub use document::AttestationDocument;
pub use verify::{verify, VerificationResult, DEFAULT_MAX_AGE};
