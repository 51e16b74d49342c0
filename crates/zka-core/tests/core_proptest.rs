// SPDX-License-Identifier: MIT OR Apache-2.0
//! Property-based tests for USDC amount parsing and proof cache fingerprinting.

use proptest::prelude::*;
use zka_core::fingerprint::{proof_cache_key, CacheKeyInputs};
use zka_core::payment::parse_usdc_amount;

// ── 1. Well-formed decimal strings → deterministic, non-negative micros ────

proptest! {
    #[test]
    fn parse_usdc_amount_is_deterministic(cents in 0u64..100_000_000u64) {
        let amount = format!("{}.{:02}", cents / 100, cents % 100);
        let a = parse_usdc_amount(&amount).unwrap();
        let b = parse_usdc_amount(&amount).unwrap();
        prop_assert_eq!(a, b);
        prop_assert_eq!(a, cents * 10_000);
    }
}

// ── 2. A leading `$` never changes the parsed amount ────────────────────────

proptest! {
    #[test]
    fn parse_usdc_amount_ignores_leading_dollar_sign(cents in 0u64..100_000_000u64) {
        let amount = format!("{}.{:02}", cents / 100, cents % 100);
        let dollar_amount = format!("${amount}");
        prop_assert_eq!(parse_usdc_amount(&amount).unwrap(), parse_usdc_amount(&dollar_amount).unwrap());
    }
}

// ── 3. Surrounding whitespace never changes the parsed amount ───────────────

proptest! {
    #[test]
    fn parse_usdc_amount_trims_whitespace(cents in 0u64..100_000_000u64, pad in "[ \t]{0,4}") {
        let amount = format!("{}.{:02}", cents / 100, cents % 100);
        let padded = format!("{pad}{amount}{pad}");
        prop_assert_eq!(parse_usdc_amount(&amount).unwrap(), parse_usdc_amount(&padded).unwrap());
    }
}

// ── 4. Non-numeric input is always rejected ─────────────────────────────────

proptest! {
    #[test]
    fn parse_usdc_amount_rejects_non_numeric(s in "[a-zA-Z]{1,16}") {
        prop_assert!(parse_usdc_amount(&s).is_err());
    }
}

// ── 5. Cache key inputs → round-trip key equality for identical fields ──────

proptest! {
    #[test]
    fn proof_cache_key_is_deterministic(
        circuit_id in "[a-z_]{1,24}",
        address in "0x[0-9a-f]{4,40}",
        scope in "[a-z.]{1,24}",
    ) {
        let a = CacheKeyInputs {
            circuit_id: &circuit_id,
            address: &address,
            scope: &scope,
            country_list: None,
            is_included: None,
        };
        let b = CacheKeyInputs {
            circuit_id: &circuit_id,
            address: &address,
            scope: &scope,
            country_list: None,
            is_included: None,
        };
        let key_a = proof_cache_key(&a);
        let key_b = proof_cache_key(&b);
        prop_assert_eq!(key_a.clone(), key_b);
        prop_assert!(key_a.starts_with("proof:"));
        prop_assert_eq!(key_a.len(), "proof:".len() + 64);
    }
}

// ── 6. Changing the scope always changes the cache key ──────────────────────

proptest! {
    #[test]
    fn proof_cache_key_distinguishes_scope(
        circuit_id in "[a-z_]{1,24}",
        address in "0x[0-9a-f]{4,40}",
        scope_a in "[a-z.]{1,24}",
        scope_b in "[a-z.]{1,24}",
    ) {
        prop_assume!(scope_a != scope_b);
        let a = CacheKeyInputs {
            circuit_id: &circuit_id,
            address: &address,
            scope: &scope_a,
            country_list: None,
            is_included: None,
        };
        let b = CacheKeyInputs {
            circuit_id: &circuit_id,
            address: &address,
            scope: &scope_b,
            country_list: None,
            is_included: None,
        };
        prop_assert_ne!(proof_cache_key(&a), proof_cache_key(&b));
    }
}
