//! Read-only projections over the sale state

use alloy_primitives::{Address, U256};
use sale_model::math::sub;
use serde::Serialize;

use crate::engine::SaleEngine;
use crate::error::{Result, SaleError};
use crate::state::{AccountRecord, Counters, Phase};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SaleStatus {
    pub stage: u16,
    pub season: u16,
    pub phase: Phase,
    pub price: U256,
    pub top_sales_ratio: U256,
    pub exchange_rate: U256,
    pub paused: bool,
    pub start_time: u64,
    pub owner: Address,
    pub auditors: Vec<Address>,
    pub counters: Counters,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StageStatus {
    pub stage: u16,
    pub season: u16,
    pub price: U256,
    pub top_sales_ratio: U256,
    pub dollar_cap: U256,
    pub asset_cap: U256,
    pub dollars_sold: U256,
    pub asset_issued: U256,
    pub dollars_remaining: U256,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SeasonStatus {
    pub season: u16,
    pub first_stage: u16,
    pub last_stage: u16,
    pub dollars_sold: U256,
    pub currency_sold: U256,
    pub top_sales: U256,
    pub top_sales_withdrawn: U256,
    pub top_sales_remaining: U256,
    pub referrer_count: usize,
}

/// Dollar volume of one account in one season
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SeasonAccount {
    pub season: u16,
    pub account: Address,
    pub purchased: U256,
    pub referred: U256,
}

impl SaleEngine {
    pub fn status(&self) -> SaleStatus {
        SaleStatus {
            stage: self.state.stage,
            season: self.state.season,
            phase: self.phase(),
            price: self.state.price,
            top_sales_ratio: self.state.top_sales_ratio,
            exchange_rate: self.governance.exchange_rate(),
            paused: self.governance.is_paused(),
            start_time: self.governance.start_time(),
            owner: self.governance.owner(),
            auditors: self.governance.auditors().iter().copied().collect(),
            counters: self.state.counters,
        }
    }

    pub fn stage_status(&self, stage: u16) -> Result<StageStatus> {
        let curve = &self.config.curve;
        if stage > curve.stage_max {
            return Err(SaleError::UnknownStage(stage));
        }
        let record = self.state.stage_record(stage);
        let dollar_cap = curve.stage_dollar_cap(stage)?;
        Ok(StageStatus {
            stage,
            season: curve.season_of(stage)?,
            price: curve.stage_price(stage)?,
            top_sales_ratio: curve.top_sales_ratio(stage)?,
            dollar_cap,
            asset_cap: curve.stage_asset_cap(stage)?,
            dollars_sold: record.dollars_sold,
            asset_issued: record.asset_issued,
            dollars_remaining: sub(dollar_cap, record.dollars_sold)?,
        })
    }

    pub fn season_status(&self, season: u16) -> Result<SeasonStatus> {
        self.check_season(season)?;
        let curve = &self.config.curve;
        let record = self.state.season_record(season);
        Ok(SeasonStatus {
            season,
            first_stage: curve.season_first_stage(season)?,
            last_stage: curve.season_last_stage(season)?,
            dollars_sold: record.dollars_sold,
            currency_sold: record.currency_sold,
            top_sales: record.top_sales,
            top_sales_withdrawn: record.top_sales_withdrawn,
            top_sales_remaining: sub(record.top_sales, record.top_sales_withdrawn)?,
            referrer_count: self
                .state
                .season_accounts
                .get(&season)
                .map(|s| s.referrers.len())
                .unwrap_or(0),
        })
    }

    pub fn account(&self, account: &Address) -> AccountRecord {
        self.state.account(account)
    }

    /// Referrers credited in `season`, in first-credit order
    pub fn season_referrers(&self, season: u16) -> Result<&[Address]> {
        self.check_season(season)?;
        Ok(self
            .state
            .season_accounts
            .get(&season)
            .map(|s| s.referrers.as_slice())
            .unwrap_or(&[]))
    }

    pub fn season_account(&self, season: u16, account: &Address) -> Result<SeasonAccount> {
        self.check_season(season)?;
        let (purchased, referred) = match self.state.season_accounts.get(&season) {
            Some(s) => (
                s.purchased.get(account).copied().unwrap_or_default(),
                s.referred.get(account).copied().unwrap_or_default(),
            ),
            None => (U256::ZERO, U256::ZERO),
        };
        Ok(SeasonAccount {
            season,
            account: *account,
            purchased,
            referred,
        })
    }
}
