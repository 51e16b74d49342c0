// SPDX-License-Identifier: MIT OR Apache-2.0
//! Payment facilitator, settlement worker, and x402 payment-gate middleware.

#![deny(unsafe_code)]

pub mod facilitator;
pub mod gate;
pub mod settlement;

pub use facilitator::PaymentFacilitator;
pub use gate::{
    decode_payment_header, DecodedPayment, GateOutcome, PaymentGate, PaymentGateLayer, PaymentGateService,
    PaymentRequirements, X402Accept, X402Challenge,
};
pub use settlement::{SettlementWorker, SweepOutcome, UsdcTransferer, MAX_SETTLEMENT_ATTEMPTS};
