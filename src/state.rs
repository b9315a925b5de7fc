//! Sale state aggregate and its keyed records

use std::collections::BTreeMap;

use alloy_primitives::{Address, U256};
use sale_model::{math::sub, CurveParams};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Sale phase derived from the active stage
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Active stage ≤ stage_max
    Open,
    /// Final stage's cap reached
    Closed,
}

/// Cumulative sale counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    /// Purchases that used currency
    pub tx_count: u64,
    pub asset_issued: U256,
    pub bonus_issued: U256,
    pub whitelist_issued: U256,

    // ========================================
    // Currency buckets
    // ========================================
    /// Currency kept from purchases (refunds excluded)
    pub currency_sold: U256,
    /// Paid to referrers at purchase time
    pub referral_paid: U256,
    /// Earmarked for seasonal top-sales pools
    pub top_sales: U256,
    /// Swept or withdrawn to the team
    pub team_paid: U256,
    /// Escrowed unassigned referral share
    pub pending: U256,
    /// Withdrawn out of the pending escrow
    pub pending_paid: U256,
}

impl Counters {
    /// `currency_sold - referral_paid - top_sales - pending - team_paid`
    ///
    /// Fails with `Underflow` if the buckets were ever over-allocated.
    pub fn unaccounted(&self) -> Result<U256> {
        let mut rest = sub(self.currency_sold, self.referral_paid)?;
        rest = sub(rest, self.top_sales)?;
        rest = sub(rest, self.pending)?;
        rest = sub(rest, self.team_paid)?;
        Ok(rest)
    }

    /// Escrowed referral share not yet withdrawn
    pub fn pending_remaining(&self) -> Result<U256> {
        Ok(sub(self.pending, self.pending_paid)?)
    }
}

/// Per-stage totals, created on the stage's first sale
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    pub dollars_sold: U256,
    pub asset_issued: U256,
}

/// Per-season totals
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonRecord {
    pub dollars_sold: U256,
    pub currency_sold: U256,
    /// Top-sales pool contributed by this season's purchases
    pub top_sales: U256,
    /// Already withdrawn out of `top_sales`
    pub top_sales_withdrawn: U256,
}

/// Per-account totals (buyers and referrers)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub asset_issued: U256,
    pub bonus: U256,
    pub whitelist_bonus: U256,
    pub currency_spent: U256,
    pub dollars_spent: U256,
    pub referral_earned: U256,
}

/// Season-scoped buyer and referrer volume
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonAccounts {
    /// Referrers credited this season, in first-credit order, no duplicates
    pub referrers: Vec<Address>,
    /// Dollar volume attributed to each referrer
    pub referred: BTreeMap<Address, U256>,
    /// Dollar volume bought by each account
    pub purchased: BTreeMap<Address, U256>,
}

/// Complete sale state; only the settlement path writes to it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleState {
    pub stage: u16,
    pub season: u16,
    /// Price of the active stage
    pub price: U256,
    /// Top-sales ratio of the active stage
    pub top_sales_ratio: U256,
    pub counters: Counters,
    pub stages: BTreeMap<u16, StageRecord>,
    pub seasons: BTreeMap<u16, SeasonRecord>,
    pub accounts: BTreeMap<Address, AccountRecord>,
    pub season_accounts: BTreeMap<u16, SeasonAccounts>,
}

impl SaleState {
    /// Fresh state at stage 0
    pub fn new(curve: &CurveParams) -> Result<Self> {
        Ok(Self {
            stage: 0,
            season: curve.season_of(0)?,
            price: curve.stage_price(0)?,
            top_sales_ratio: curve.top_sales_ratio(0)?,
            counters: Counters::default(),
            stages: BTreeMap::new(),
            seasons: BTreeMap::new(),
            accounts: BTreeMap::new(),
            season_accounts: BTreeMap::new(),
        })
    }

    pub fn phase(&self, curve: &CurveParams) -> Phase {
        if self.stage > curve.stage_max {
            Phase::Closed
        } else {
            Phase::Open
        }
    }

    pub fn stage_record(&self, stage: u16) -> StageRecord {
        self.stages.get(&stage).copied().unwrap_or_default()
    }

    pub fn season_record(&self, season: u16) -> SeasonRecord {
        self.seasons.get(&season).copied().unwrap_or_default()
    }

    pub fn account(&self, account: &Address) -> AccountRecord {
        self.accounts.get(account).copied().unwrap_or_default()
    }

    /// Check the bookkeeping invariants
    ///
    /// - buckets never exceed currency sold
    /// - pending payouts never exceed pending escrow
    /// - no stage sells past its dollar cap
    /// - no season withdraws more top-sales than it contributed
    pub fn check_invariants(&self, curve: &CurveParams) -> bool {
        if self.counters.unaccounted().is_err() || self.counters.pending_remaining().is_err() {
            return false;
        }
        let stages_ok = self.stages.iter().all(|(stage, record)| {
            curve
                .stage_dollar_cap(*stage)
                .map(|cap| record.dollars_sold <= cap)
                .unwrap_or(false)
        });
        let seasons_ok = self
            .seasons
            .values()
            .all(|record| record.top_sales_withdrawn <= record.top_sales);
        stages_ok && seasons_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unaccounted_subtracts_every_bucket() {
        let counters = Counters {
            currency_sold: U256::from(1_000u32),
            referral_paid: U256::from(170u32),
            top_sales: U256::from(150u32),
            pending: U256::from(180u32),
            team_paid: U256::from(400u32),
            ..Counters::default()
        };
        assert_eq!(counters.unaccounted().unwrap(), U256::from(100u32));
    }

    #[test]
    fn test_over_allocation_detected() {
        let counters = Counters {
            currency_sold: U256::from(100u32),
            team_paid: U256::from(101u32),
            ..Counters::default()
        };
        assert!(counters.unaccounted().is_err());
    }

    #[test]
    fn test_new_state_starts_at_stage_zero() {
        let curve = CurveParams::default();
        let state = SaleState::new(&curve).unwrap();
        assert_eq!(state.stage, 0);
        assert_eq!(state.season, 1);
        assert_eq!(state.price, U256::from(1_000u32));
        assert_eq!(state.phase(&curve), Phase::Open);
        assert!(state.check_invariants(&curve));
    }

    #[test]
    fn test_stage_over_cap_breaks_invariants() {
        let curve = CurveParams::default();
        let mut state = SaleState::new(&curve).unwrap();
        state.stages.insert(
            0,
            StageRecord {
                dollars_sold: U256::from(100_000_001u64),
                asset_issued: U256::ZERO,
            },
        );
        assert!(!state.check_invariants(&curve));
    }
}
