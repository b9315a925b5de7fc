//! Fund buckets and owner withdrawals
//!
//! Currency sold is split into referral, top-sales, pending and team buckets.
//! A withdrawal goes to the host as a one-effect batch and marks its bucket
//! only after the host accepted it, so a refused transfer leaves no trace.

use alloy_primitives::{Address, U256};
use log::{info, warn};
use sale_model::math::{add, sub};
use serde::Serialize;

use crate::engine::SaleEngine;
use crate::error::{Result, SaleError};
use crate::host::{Effect, Host, Payout, TokenTransfer};

/// Read-only totals of every currency bucket
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct FundSummary {
    pub currency_sold: U256,
    pub referral_paid: U256,
    pub top_sales: U256,
    pub top_sales_withdrawn: U256,
    pub team_paid: U256,
    pub pending: U256,
    pub pending_paid: U256,
    pub pending_remaining: U256,
    /// Sold currency not yet assigned to any bucket
    pub unaccounted: U256,
}

fn check_withdrawal(to: Address, amount: U256, available: U256) -> Result<()> {
    if to == Address::ZERO {
        return Err(SaleError::InvalidRecipient);
    }
    if amount.is_zero() {
        return Err(SaleError::InvalidAmount(amount));
    }
    if amount > available {
        return Err(SaleError::ExceedsAvailable {
            requested: amount,
            available,
        });
    }
    Ok(())
}

fn pay_out<H: Host + ?Sized>(host: &mut H, to: Address, amount: U256, reason: Payout) -> Result<()> {
    let effect = Effect::Pay { to, amount, reason };
    host.execute(&[effect]).map_err(|err| {
        warn!("{:?} withdrawal of {} to {} failed: {}", reason, amount, to, err);
        err
    })
}

impl SaleEngine {
    pub fn fund_summary(&self) -> Result<FundSummary> {
        let counters = &self.state.counters;
        let mut top_sales_withdrawn = U256::ZERO;
        for record in self.state.seasons.values() {
            top_sales_withdrawn = add(top_sales_withdrawn, record.top_sales_withdrawn)?;
        }
        Ok(FundSummary {
            currency_sold: counters.currency_sold,
            referral_paid: counters.referral_paid,
            top_sales: counters.top_sales,
            top_sales_withdrawn,
            team_paid: counters.team_paid,
            pending: counters.pending,
            pending_paid: counters.pending_paid,
            pending_remaining: counters.pending_remaining()?,
            unaccounted: counters.unaccounted()?,
        })
    }

    pub(crate) fn check_season(&self, season: u16) -> Result<()> {
        if season == 0 || season > self.config.curve.season_count()? {
            return Err(SaleError::UnknownSeason(season));
        }
        Ok(())
    }

    /// Withdraw part of a season's top-sales pool
    pub fn withdraw_top_sales<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        caller: Address,
        season: u16,
        to: Address,
        amount: U256,
    ) -> Result<()> {
        self.governance.ensure_owner(caller)?;
        self.check_season(season)?;
        let mut record = self.state.season_record(season);
        let available = sub(record.top_sales, record.top_sales_withdrawn)?;
        check_withdrawal(to, amount, available)?;
        record.top_sales_withdrawn = add(record.top_sales_withdrawn, amount)?;

        pay_out(host, to, amount, Payout::TopSales { season })?;
        self.state.seasons.insert(season, record);
        info!("withdrew {} of season {} top sales to {}", amount, season, to);
        Ok(())
    }

    /// Withdraw escrowed referral share
    pub fn withdraw_pending<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        caller: Address,
        to: Address,
        amount: U256,
    ) -> Result<()> {
        self.governance.ensure_owner(caller)?;
        let available = self.state.counters.pending_remaining()?;
        check_withdrawal(to, amount, available)?;
        let paid = add(self.state.counters.pending_paid, amount)?;

        pay_out(host, to, amount, Payout::Pending)?;
        self.state.counters.pending_paid = paid;
        info!("withdrew {} of pending escrow to {}", amount, to);
        Ok(())
    }

    /// Withdraw the unswept team remainder
    pub fn withdraw_team<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        caller: Address,
        to: Address,
        amount: U256,
    ) -> Result<()> {
        self.governance.ensure_owner(caller)?;
        let available = self.state.counters.unaccounted()?;
        check_withdrawal(to, amount, available)?;
        let paid = add(self.state.counters.team_paid, amount)?;

        pay_out(host, to, amount, Payout::Team)?;
        self.state.counters.team_paid = paid;
        info!("withdrew {} of team remainder to {}", amount, to);
        Ok(())
    }

    /// Send out tokens that reached the sale by mistake
    pub fn rescue_tokens<T: TokenTransfer + ?Sized>(
        &self,
        token: &mut T,
        caller: Address,
        to: Address,
        amount: U256,
    ) -> Result<()> {
        self.governance.ensure_owner(caller)?;
        if to == Address::ZERO {
            return Err(SaleError::InvalidRecipient);
        }
        if amount.is_zero() {
            return Err(SaleError::InvalidAmount(amount));
        }
        token.transfer(to, amount)?;
        info!("rescued {} tokens to {}", amount, to);
        Ok(())
    }
}
