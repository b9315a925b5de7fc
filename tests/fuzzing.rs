//! Property suite for the sale engine
//!
//! Run with: cargo test --features fuzz
//! Increase cases: PROPTEST_CASES=1000 cargo test --features fuzz
//!
//! Drives random purchase sequences through a small sale and checks after
//! every step:
//! - bucket conservation (sold covers every earmarked bucket)
//! - no stage sells past its cap, season never decreases
//! - referral payouts plus escrow equal the 35% share, up to rounding
//! - a failed purchase leaves the state untouched

#![cfg(feature = "fuzz")]

use proptest::prelude::*;
use sale_model::math::percent_of;
use sale_model::REFERRAL_PERCENT_TOTAL;
use stagesale::*;

// ============================================================================
// Helpers
// ============================================================================

const OWNER: u8 = 1;
const TEAM: u8 = 2;
const AUDITOR: u8 = 3;

fn addr(n: u8) -> Address {
    Address::with_last_byte(n)
}

fn engine(stage_max: u16, rate: u64) -> SaleEngine {
    let mut config = SaleConfig::default();
    config.curve.stage_max = stage_max;
    config.curve.season_stage_width = 4;
    let mut engine = SaleEngine::new(config, addr(OWNER), addr(TEAM)).unwrap();
    let gov = engine.governance_mut();
    gov.add_auditor(addr(OWNER), addr(AUDITOR)).unwrap();
    gov.set_exchange_rate(addr(AUDITOR), U256::from(rate)).unwrap();
    engine
}

/// Chain 10 <- 11 <- ... <- 29, odd accounts whitelisted
fn host() -> MemoryHost {
    let mut host = MemoryHost::new();
    for n in 11..30u8 {
        host.register(addr(n), addr(n - 1));
        if n % 2 == 1 {
            host.whitelist(addr(n));
        }
    }
    host
}

#[derive(Clone, Debug)]
struct Purchase {
    buyer: u8,
    /// Tenths of a currency unit
    tenths: u64,
    budget: u32,
}

fn purchase_strategy() -> impl Strategy<Value = Purchase> {
    (11u8..30, 1u64..=1_000, 1u32..8).prop_map(|(buyer, tenths, budget)| Purchase { buyer, tenths, budget })
}

fn tenths(n: u64) -> U256 {
    U256::from(n) * U256::from(CURRENCY_UNIT / 10)
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn fuzz_purchase_sequence_keeps_invariants(
        rate in 1_000_000u64..2_000_000_000,
        purchases in prop::collection::vec(purchase_strategy(), 1..40),
    ) {
        let mut engine = engine(40, rate);
        let mut host = host();
        let curve = engine.config().curve;

        for p in purchases {
            let before = engine.state().clone();
            let value = tenths(p.tenths);
            let result = engine.purchase_with_budget(&mut host, addr(p.buyer), value, 0, p.budget);

            match result {
                Ok(receipt) => {
                    prop_assert!(receipt.dollars_used <= receipt.dollars);
                    prop_assert_eq!(receipt.currency_used + receipt.refund, value);
                    prop_assert!(receipt.steps <= p.budget);

                    // Units never pay for more than the dollars used
                    let paid = engine.state().stages.iter().map(|(stage, record)| {
                        record.asset_issued * curve.stage_price(*stage).unwrap() / curve.units_per_dollar
                    });
                    let total_paid = paid.fold(U256::ZERO, |acc, x| acc + x);
                    prop_assert!(total_paid <= engine.state().stages.values().fold(U256::ZERO, |acc, r| acc + r.dollars_sold));

                    let referral: U256 = receipt.referral_payouts.iter().fold(U256::ZERO, |acc, (_, a)| acc + *a);
                    let share = percent_of(receipt.currency_used, REFERRAL_PERCENT_TOTAL).unwrap();
                    prop_assert!(referral + receipt.pending_added <= share);
                    if !receipt.whitelist_bonus.is_zero() {
                        // One floor per paid level plus the escrow floor
                        let slack = U256::from(receipt.referral_payouts.len() + 1);
                        prop_assert!(share - referral - receipt.pending_added <= slack);
                    }

                    prop_assert!(engine.state().season >= before.season);
                    prop_assert!(engine.state().stage >= before.stage);
                }
                Err(err) => {
                    prop_assert!(matches!(err, SaleError::SaleNotOpen(NotOpenReason::Closed)));
                    prop_assert_eq!(engine.state(), &before);
                }
            }
            prop_assert!(engine.state().check_invariants(&curve));
        }
    }

    #[test]
    fn fuzz_rejected_batch_is_noop(tenths_paid in 1u64..=1_000, reject in 12u8..30) {
        let mut engine = engine(40, 200_000_000);
        let mut host = host();
        host.reject_transfers_to(addr(reject));
        let before = engine.state().clone();

        // Odd buyer 29 pays referrers down the chain
        match engine.purchase(&mut host, addr(29), tenths(tenths_paid), 0) {
            Ok(_) => {}
            Err(SaleError::TransferRejected(to)) => {
                prop_assert_eq!(to, addr(reject));
                prop_assert_eq!(engine.state(), &before);
                prop_assert!(host.history().is_empty());
            }
            Err(other) => prop_assert!(false, "unexpected error {:?}", other),
        }
    }

    #[test]
    fn fuzz_views_idempotent(purchases in prop::collection::vec(purchase_strategy(), 0..10)) {
        let mut engine = engine(40, 200_000_000);
        let mut host = host();
        for p in purchases {
            let _ = engine.purchase_with_budget(&mut host, addr(p.buyer), tenths(p.tenths), 0, p.budget);
        }
        prop_assert_eq!(engine.status(), engine.status());
        prop_assert_eq!(engine.fund_summary().unwrap(), engine.fund_summary().unwrap());
        for season in 1..=engine.config().curve.season_count().unwrap() {
            prop_assert_eq!(engine.season_status(season).unwrap(), engine.season_status(season).unwrap());
        }
    }
}
