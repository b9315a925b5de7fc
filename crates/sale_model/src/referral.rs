//! Fifteen-level referral walk
//!
//! Walks up the referral graph from a buyer and decides, level by level, which
//! referrers earn a share of the purchase. A referrer at level `i` (0-based)
//! qualifies when it has more than `i` direct referees. Unqualified levels are
//! skipped, not paid, and the walk keeps climbing through them; their
//! percentages are summed into one residual that the caller escrows.

use alloy_primitives::{Address, U256};
use arrayvec::ArrayVec;
use serde::{Deserialize, Serialize};

use crate::math::{percent_of, sub, MathError};

/// Number of referral levels
pub const REFERRAL_LEVELS: usize = 15;

/// Percentage paid at each level
pub const REFERRAL_PERCENTAGES: [u8; REFERRAL_LEVELS] = [6, 6, 5, 4, 3, 2, 1, 1, 1, 1, 1, 1, 1, 1, 1];

/// Sum of REFERRAL_PERCENTAGES
pub const REFERRAL_PERCENT_TOTAL: u8 = 35;

/// Read-only view of who referred whom
pub trait ReferralGraph {
    /// Referrer of `account`. An account without a referrer maps to itself.
    fn referrer_of(&self, account: &Address) -> Address;

    /// Direct referees of `account` that count toward qualification
    fn qualifying_referral_count(&self, account: &Address) -> u32;
}

/// One paid level of a walk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelReward {
    /// 0-based level
    pub level: u8,
    pub referrer: Address,
    pub percent: u8,
}

/// Outcome of a walk: ordered qualifying referrers plus unassigned percent
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReferralWalk {
    pub rewards: ArrayVec<LevelReward, REFERRAL_LEVELS>,
    pub residual_percent: u8,
}

impl ReferralWalk {
    /// Percent assigned to qualifying referrers
    pub fn assigned_percent(&self) -> u8 {
        REFERRAL_PERCENT_TOTAL - self.residual_percent
    }

    /// Currency owed to each referrer for `amount`, in walk order
    pub fn payouts(&self, amount: U256) -> Result<ArrayVec<(Address, U256), REFERRAL_LEVELS>, MathError> {
        let mut out = ArrayVec::new();
        for reward in &self.rewards {
            out.push((reward.referrer, percent_of(amount, reward.percent)?));
        }
        Ok(out)
    }

    /// Currency escrowed to the pending bucket for `amount`
    pub fn residual_amount(&self, amount: U256) -> Result<U256, MathError> {
        percent_of(amount, self.residual_percent)
    }
}

/// Walk up to REFERRAL_LEVELS referrers above `buyer`.
///
/// Stops early when an account refers to itself (no referrer) or to the zero
/// address.
pub fn walk<G: ReferralGraph + ?Sized>(graph: &G, buyer: &Address) -> Result<ReferralWalk, MathError> {
    let mut rewards = ArrayVec::new();
    let mut residual = REFERRAL_PERCENT_TOTAL;
    let mut cursor = *buyer;

    for (level, percent) in REFERRAL_PERCENTAGES.iter().copied().enumerate() {
        let referrer = graph.referrer_of(&cursor);
        if referrer == cursor || referrer == Address::ZERO {
            break;
        }

        if graph.qualifying_referral_count(&referrer) > level as u32 {
            rewards.push(LevelReward {
                level: level as u8,
                referrer,
                percent,
            });
            residual = sub(residual, percent)?;
        }

        cursor = referrer;
    }

    Ok(ReferralWalk {
        rewards,
        residual_percent: residual,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MockGraph {
        referrer: HashMap<Address, Address>,
        referees: HashMap<Address, u32>,
    }

    impl MockGraph {
        fn link(&mut self, account: Address, referrer: Address) {
            self.referrer.insert(account, referrer);
            *self.referees.entry(referrer).or_default() += 1;
        }

        fn set_count(&mut self, account: Address, count: u32) {
            self.referees.insert(account, count);
        }
    }

    impl ReferralGraph for MockGraph {
        fn referrer_of(&self, account: &Address) -> Address {
            self.referrer.get(account).copied().unwrap_or(*account)
        }

        fn qualifying_referral_count(&self, account: &Address) -> u32 {
            self.referees.get(account).copied().unwrap_or(0)
        }
    }

    fn addr(n: u8) -> Address {
        Address::with_last_byte(n)
    }

    #[test]
    fn test_three_qualified_levels() {
        let mut graph = MockGraph::default();
        let (buyer, l1, l2, l3) = (addr(1), addr(2), addr(3), addr(4));
        graph.link(buyer, l1);
        graph.link(l1, l2);
        graph.link(l2, l3);
        graph.set_count(l1, 1);
        graph.set_count(l2, 2);
        graph.set_count(l3, 3);

        let result = walk(&graph, &buyer).unwrap();
        let paid: Vec<_> = result.rewards.iter().map(|r| (r.referrer, r.percent)).collect();
        assert_eq!(paid, vec![(l1, 6), (l2, 6), (l3, 5)]);
        assert_eq!(result.residual_percent, 18);
        assert_eq!(result.assigned_percent(), 17);
    }

    #[test]
    fn test_unqualified_level_is_skipped_but_walk_continues() {
        let mut graph = MockGraph::default();
        let (buyer, l1, l2, l3) = (addr(1), addr(2), addr(3), addr(4));
        graph.link(buyer, l1);
        graph.link(l1, l2);
        graph.link(l2, l3);
        // l2 sits at level 1 and needs 2 referees; it only has 1
        graph.set_count(l2, 1);
        graph.set_count(l3, 3);

        let result = walk(&graph, &buyer).unwrap();
        let levels: Vec<_> = result.rewards.iter().map(|r| (r.level, r.referrer)).collect();
        assert_eq!(levels, vec![(0, l1), (2, l3)]);
        assert_eq!(result.residual_percent, 35 - 6 - 5);
    }

    #[test]
    fn test_self_referral_terminates() {
        let graph = MockGraph::default();
        let result = walk(&graph, &addr(9)).unwrap();
        assert!(result.rewards.is_empty());
        assert_eq!(result.residual_percent, REFERRAL_PERCENT_TOTAL);
    }

    #[test]
    fn test_zero_referrer_terminates() {
        let mut graph = MockGraph::default();
        graph.referrer.insert(addr(1), Address::ZERO);
        let result = walk(&graph, &addr(1)).unwrap();
        assert!(result.rewards.is_empty());
        assert_eq!(result.residual_percent, 35);
    }

    #[test]
    fn test_full_chain_pays_everything() {
        let mut graph = MockGraph::default();
        for n in 1..=16u8 {
            graph.link(addr(n), addr(n + 1));
            graph.set_count(addr(n + 1), 15);
        }
        let result = walk(&graph, &addr(1)).unwrap();
        assert_eq!(result.rewards.len(), REFERRAL_LEVELS);
        assert_eq!(result.residual_percent, 0);
        let sum: u32 = result.rewards.iter().map(|r| r.percent as u32).sum();
        assert_eq!(sum, REFERRAL_PERCENT_TOTAL as u32);
    }

    #[test]
    fn test_payouts_round_down_per_referrer() {
        let mut graph = MockGraph::default();
        graph.link(addr(1), addr(2));
        let result = walk(&graph, &addr(1)).unwrap();

        let amount = U256::from(999u32);
        let payouts = result.payouts(amount).unwrap();
        assert_eq!(payouts.as_slice(), &[(addr(2), U256::from(59u32))]);
        assert_eq!(result.residual_amount(amount).unwrap(), U256::from(289u32));
    }

    #[test]
    fn test_table_sums_to_total() {
        let sum: u32 = REFERRAL_PERCENTAGES.iter().map(|p| *p as u32).sum();
        assert_eq!(sum, REFERRAL_PERCENT_TOTAL as u32);
    }
}
