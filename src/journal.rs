//! Write overlay for one settlement
//!
//! A purchase reads through the journal and writes into it; the base state is
//! untouched until [`SaleState::apply`] commits the collected writes. Dropping
//! the journal discards the purchase.

use std::collections::BTreeMap;

use alloy_primitives::{Address, U256};
use sale_model::math::add;

use crate::error::Result;
use crate::state::{AccountRecord, Counters, SaleState, SeasonRecord, StageRecord};

/// Owned writes produced by a journal
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteSet {
    stage: u16,
    season: u16,
    price: U256,
    top_sales_ratio: U256,
    counters: Counters,
    stages: BTreeMap<u16, StageRecord>,
    seasons: BTreeMap<u16, SeasonRecord>,
    accounts: BTreeMap<Address, AccountRecord>,
    new_referrers: Vec<(u16, Address)>,
    referred: BTreeMap<(u16, Address), U256>,
    purchased: BTreeMap<(u16, Address), U256>,
}

pub struct Journal<'a> {
    base: &'a SaleState,
    pub stage: u16,
    pub season: u16,
    pub price: U256,
    pub top_sales_ratio: U256,
    pub counters: Counters,
    stages: BTreeMap<u16, StageRecord>,
    seasons: BTreeMap<u16, SeasonRecord>,
    accounts: BTreeMap<Address, AccountRecord>,
    new_referrers: Vec<(u16, Address)>,
    referred: BTreeMap<(u16, Address), U256>,
    purchased: BTreeMap<(u16, Address), U256>,
}

impl<'a> Journal<'a> {
    pub fn new(base: &'a SaleState) -> Self {
        Self {
            base,
            stage: base.stage,
            season: base.season,
            price: base.price,
            top_sales_ratio: base.top_sales_ratio,
            counters: base.counters,
            stages: BTreeMap::new(),
            seasons: BTreeMap::new(),
            accounts: BTreeMap::new(),
            new_referrers: Vec::new(),
            referred: BTreeMap::new(),
            purchased: BTreeMap::new(),
        }
    }

    pub fn stage_record(&self, stage: u16) -> StageRecord {
        match self.stages.get(&stage) {
            Some(record) => *record,
            None => self.base.stage_record(stage),
        }
    }

    pub fn stage_record_mut(&mut self, stage: u16) -> &mut StageRecord {
        let base = self.base;
        self.stages
            .entry(stage)
            .or_insert_with(|| base.stage_record(stage))
    }

    pub fn season_record_mut(&mut self, season: u16) -> &mut SeasonRecord {
        let base = self.base;
        self.seasons
            .entry(season)
            .or_insert_with(|| base.season_record(season))
    }

    pub fn account_mut(&mut self, account: Address) -> &mut AccountRecord {
        let base = self.base;
        self.accounts
            .entry(account)
            .or_insert_with(|| base.account(&account))
    }

    /// Add buyer dollar volume for a season
    pub fn add_purchased(&mut self, season: u16, buyer: Address, dollars: U256) -> Result<()> {
        let base = self.base;
        let slot = self.purchased.entry((season, buyer)).or_insert_with(|| {
            base.season_accounts
                .get(&season)
                .and_then(|s| s.purchased.get(&buyer).copied())
                .unwrap_or_default()
        });
        *slot = add(*slot, dollars)?;
        Ok(())
    }

    /// Add referred dollar volume for a season, enrolling the referrer in the
    /// season's referrer list on first credit
    pub fn add_referred(&mut self, season: u16, referrer: Address, dollars: U256) -> Result<()> {
        let base = self.base;
        let known = base
            .season_accounts
            .get(&season)
            .map(|s| s.referred.contains_key(&referrer))
            .unwrap_or(false);
        if !known && !self.referred.contains_key(&(season, referrer)) {
            self.new_referrers.push((season, referrer));
        }

        let slot = self.referred.entry((season, referrer)).or_insert_with(|| {
            base.season_accounts
                .get(&season)
                .and_then(|s| s.referred.get(&referrer).copied())
                .unwrap_or_default()
        });
        *slot = add(*slot, dollars)?;
        Ok(())
    }

    /// Release the base borrow, keeping only the writes
    pub fn into_writes(self) -> WriteSet {
        WriteSet {
            stage: self.stage,
            season: self.season,
            price: self.price,
            top_sales_ratio: self.top_sales_ratio,
            counters: self.counters,
            stages: self.stages,
            seasons: self.seasons,
            accounts: self.accounts,
            new_referrers: self.new_referrers,
            referred: self.referred,
            purchased: self.purchased,
        }
    }
}

impl SaleState {
    /// Commit a journal's writes. Infallible: all arithmetic happened while
    /// the journal was built.
    pub fn apply(&mut self, writes: WriteSet) {
        self.stage = writes.stage;
        self.season = writes.season;
        self.price = writes.price;
        self.top_sales_ratio = writes.top_sales_ratio;
        self.counters = writes.counters;
        self.stages.extend(writes.stages);
        self.seasons.extend(writes.seasons);
        self.accounts.extend(writes.accounts);

        for (season, referrer) in writes.new_referrers {
            self.season_accounts.entry(season).or_default().referrers.push(referrer);
        }
        for ((season, referrer), volume) in writes.referred {
            self.season_accounts
                .entry(season)
                .or_default()
                .referred
                .insert(referrer, volume);
        }
        for ((season, buyer), volume) in writes.purchased {
            self.season_accounts
                .entry(season)
                .or_default()
                .purchased
                .insert(buyer, volume);
        }
    }
}
