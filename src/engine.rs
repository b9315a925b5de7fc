//! Purchase settlement
//!
//! A purchase walks the price curve stage by stage until the payment is
//! consumed, the sale closes or the step budget runs out. Every write goes into
//! a [`Journal`]; value movements are collected as [`Effect`]s and handed to the
//! host in one batch. State is committed only after the host accepted the
//! whole batch, so a purchase either fully commits or leaves no trace.
//!
//! # Bookkeeping
//! - currency used is split over the stages it bought in; each stage's share
//!   feeds its season's top-sales pool at that stage's ratio
//! - referral shares are paid immediately; the unassigned share is escrowed
//! - whatever is left unearmarked is swept to the team, rounded down to the
//!   sweep granularity while the sale is open

use alloy_primitives::{Address, U256};
use log::{debug, info, warn};
use sale_model::math::{add, floor_to, mul_div, percent_of, sub};
use sale_model::{walk, CurveParams, RATIO_SCALE};

use crate::config::SaleConfig;
use crate::error::{NotOpenReason, Result, SaleError};
use crate::events::{PurchaseReceipt, SaleEvent};
use crate::governance::Governance;
use crate::host::{Allocation, Effect, Host, Payout};
use crate::journal::Journal;
use crate::state::{Phase, SaleState};

/// Dollars one purchase consumed in one stage
#[derive(Clone, Copy, Debug)]
struct StageChunk {
    stage: u16,
    season: u16,
    dollars: U256,
}

/// Sale engine: configuration, administrative state and sale state
#[derive(Clone, Debug)]
pub struct SaleEngine {
    pub(crate) config: SaleConfig,
    pub(crate) governance: Governance,
    pub(crate) state: SaleState,
}

impl SaleEngine {
    pub fn new(config: SaleConfig, owner: Address, team_recipient: Address) -> Result<Self> {
        config.validate()?;
        let state = SaleState::new(&config.curve)?;
        let governance = Governance::new(owner, team_recipient)?;
        Ok(Self {
            config,
            governance,
            state,
        })
    }

    pub fn config(&self) -> &SaleConfig {
        &self.config
    }

    pub fn governance(&self) -> &Governance {
        &self.governance
    }

    /// Administrative surface; every mutator checks its caller
    pub fn governance_mut(&mut self) -> &mut Governance {
        &mut self.governance
    }

    pub fn state(&self) -> &SaleState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase(&self.config.curve)
    }

    /// Fails with `SaleNotOpen` when paused, before the start time, or after
    /// the final stage
    pub fn ensure_open(&self, now: u64) -> Result<()> {
        if self.governance.is_paused() {
            return Err(SaleError::SaleNotOpen(NotOpenReason::Paused));
        }
        if now < self.governance.start_time() {
            return Err(SaleError::SaleNotOpen(NotOpenReason::NotStarted));
        }
        if self.phase() == Phase::Closed {
            return Err(SaleError::SaleNotOpen(NotOpenReason::Closed));
        }
        Ok(())
    }

    /// Settle a payment of `value` currency units from `buyer` at time `now`
    pub fn purchase<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        buyer: Address,
        value: U256,
        now: u64,
    ) -> Result<PurchaseReceipt> {
        let budget = self.config.max_stage_steps;
        self.purchase_with_budget(host, buyer, value, now, budget)
    }

    /// [`purchase`](Self::purchase) with an explicit stage step budget.
    ///
    /// Dollars left when the budget runs out are refunded; the purchase still
    /// commits for the stages it processed.
    pub fn purchase_with_budget<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        buyer: Address,
        value: U256,
        now: u64,
        budget: u32,
    ) -> Result<PurchaseReceipt> {
        self.ensure_open(now)?;
        let rate = self.governance.exchange_rate();
        if rate.is_zero() {
            return Err(SaleError::RateNotSet);
        }
        if value < self.config.min_purchase || value > self.config.max_purchase {
            return Err(SaleError::InvalidAmount(value));
        }
        if buyer == Address::ZERO {
            return Err(SaleError::InvalidRecipient);
        }
        if budget == 0 {
            return Err(SaleError::InsufficientBudget);
        }

        let config = &self.config;
        let curve = &config.curve;
        let mut journal = Journal::new(&self.state);
        let mut receipt = PurchaseReceipt::default();
        let mut effects = Vec::new();

        // ========================================
        // Stage loop
        // ========================================

        receipt.dollars = mul_div(value, rate, config.currency_unit)?;
        let mut remaining = receipt.dollars;
        let mut chunks: Vec<StageChunk> = Vec::new();

        while !remaining.is_zero() && journal.stage <= curve.stage_max {
            if receipt.steps >= budget {
                receipt.budget_exhausted = true;
                warn!(
                    "step budget {} exhausted at stage {}, refunding {} micro-dollars",
                    budget, journal.stage, remaining
                );
                break;
            }
            receipt.steps = add(receipt.steps, 1)?;

            let stage = journal.stage;
            let season = journal.season;
            let cap = curve.stage_dollar_cap(stage)?;
            let sold = journal.stage_record(stage).dollars_sold;
            let take = remaining.min(sub(cap, sold)?);

            if !take.is_zero() {
                let units = curve.dollars_to_units(take, stage)?;

                let record = journal.stage_record_mut(stage);
                record.dollars_sold = add(record.dollars_sold, take)?;
                record.asset_issued = add(record.asset_issued, units)?;

                let season_record = journal.season_record_mut(season);
                season_record.dollars_sold = add(season_record.dollars_sold, take)?;
                journal.add_purchased(season, buyer, take)?;

                remaining = sub(remaining, take)?;
                receipt.issued = add(receipt.issued, units)?;
                chunks.push(StageChunk {
                    stage,
                    season,
                    dollars: take,
                });
                debug!("stage {}: {} micro-dollars -> {} units", stage, take, units);
            }

            if add(sold, take)? == cap {
                close_stage(curve, &mut journal, &mut receipt.events)?;
            }
        }

        // ========================================
        // Refund
        // ========================================

        receipt.dollars_used = sub(receipt.dollars, remaining)?;
        if receipt.dollars_used.is_zero() {
            receipt.refund = value;
        } else if !remaining.is_zero() {
            receipt.refund = mul_div(remaining, config.currency_unit, rate)?;
        }
        receipt.currency_used = sub(value, receipt.refund)?;

        if !receipt.currency_used.is_zero() {
            // Season currency and top-sales pool, per stage chunk
            let mut allocated = U256::ZERO;
            for (index, chunk) in chunks.iter().enumerate() {
                let currency = if index + 1 == chunks.len() {
                    sub(receipt.currency_used, allocated)?
                } else {
                    mul_div(receipt.currency_used, chunk.dollars, receipt.dollars_used)?
                };
                allocated = add(allocated, currency)?;

                let ratio = curve.top_sales_ratio(chunk.stage)?;
                let top = mul_div(currency, ratio, U256::from(RATIO_SCALE))?;
                let season_record = journal.season_record_mut(chunk.season);
                season_record.currency_sold = add(season_record.currency_sold, currency)?;
                season_record.top_sales = add(season_record.top_sales, top)?;
                receipt.top_sales_added = add(receipt.top_sales_added, top)?;
            }

            // ========================================
            // Bonus and whitelist allocation
            // ========================================

            if value >= config.bonus_threshold && !receipt.issued.is_zero() {
                receipt.bonus = percent_of(receipt.issued, config.bonus_percent)?;
            }
            let whitelisted = host.is_whitelisted(&buyer) && !receipt.issued.is_zero();
            if whitelisted {
                receipt.whitelist_bonus = add(receipt.issued, receipt.bonus)?;
            }

            for (amount, kind) in [
                (receipt.issued, Allocation::Purchase),
                (receipt.bonus, Allocation::Bonus),
                (receipt.whitelist_bonus, Allocation::Whitelist),
            ] {
                if !amount.is_zero() {
                    effects.push(Effect::Mint { to: buyer, amount, kind });
                }
            }
            if !receipt.bonus.is_zero() {
                receipt.events.push(SaleEvent::BonusIssued { to: buyer, amount: receipt.bonus });
            }
            if !receipt.whitelist_bonus.is_zero() {
                receipt.events.push(SaleEvent::WhitelistIssued {
                    to: buyer,
                    amount: receipt.whitelist_bonus,
                });
            }

            // ========================================
            // Referral walk
            // ========================================

            if whitelisted {
                let referral = walk(&*host, &buyer)?;
                let payouts = referral.payouts(receipt.currency_used)?;

                for (reward, (referrer, amount)) in referral.rewards.iter().zip(payouts.iter()) {
                    for chunk in &chunks {
                        journal.add_referred(chunk.season, *referrer, chunk.dollars)?;
                    }
                    if amount.is_zero() {
                        continue;
                    }
                    let account = journal.account_mut(*referrer);
                    account.referral_earned = add(account.referral_earned, *amount)?;
                    journal.counters.referral_paid = add(journal.counters.referral_paid, *amount)?;

                    effects.push(Effect::Pay {
                        to: *referrer,
                        amount: *amount,
                        reason: Payout::Referral { level: reward.level },
                    });
                    receipt.events.push(SaleEvent::ReferralPaid {
                        level: reward.level,
                        referrer: *referrer,
                        amount: *amount,
                    });
                }

                receipt.pending_added = referral.residual_amount(receipt.currency_used)?;
                if !receipt.pending_added.is_zero() {
                    journal.counters.pending = add(journal.counters.pending, receipt.pending_added)?;
                    receipt.events.push(SaleEvent::PendingEscrowed {
                        amount: receipt.pending_added,
                    });
                }
                receipt.referral_payouts = payouts;
            }

            // ========================================
            // Counters
            // ========================================

            let account = journal.account_mut(buyer);
            account.asset_issued = add(account.asset_issued, receipt.issued)?;
            account.bonus = add(account.bonus, receipt.bonus)?;
            account.whitelist_bonus = add(account.whitelist_bonus, receipt.whitelist_bonus)?;
            account.currency_spent = add(account.currency_spent, receipt.currency_used)?;
            account.dollars_spent = add(account.dollars_spent, receipt.dollars_used)?;

            let counters = &mut journal.counters;
            counters.tx_count = add(counters.tx_count, 1)?;
            counters.asset_issued = add(counters.asset_issued, receipt.issued)?;
            counters.bonus_issued = add(counters.bonus_issued, receipt.bonus)?;
            counters.whitelist_issued = add(counters.whitelist_issued, receipt.whitelist_bonus)?;
            counters.currency_sold = add(counters.currency_sold, receipt.currency_used)?;
            counters.top_sales = add(counters.top_sales, receipt.top_sales_added)?;
        }

        if !receipt.refund.is_zero() {
            effects.push(Effect::Pay {
                to: buyer,
                amount: receipt.refund,
                reason: Payout::Refund,
            });
            receipt.events.push(SaleEvent::Refunded {
                to: buyer,
                amount: receipt.refund,
            });
        }

        // ========================================
        // Team sweep
        // ========================================

        let unaccounted = journal.counters.unaccounted()?;
        let still_open = journal.stage <= curve.stage_max;
        receipt.team_swept = if still_open && !config.team_sweep_granularity.is_zero() {
            floor_to(unaccounted, config.team_sweep_granularity)?
        } else {
            unaccounted
        };
        if !receipt.team_swept.is_zero() {
            let team = self.governance.team_recipient();
            journal.counters.team_paid = add(journal.counters.team_paid, receipt.team_swept)?;
            effects.push(Effect::Pay {
                to: team,
                amount: receipt.team_swept,
                reason: Payout::Team,
            });
            receipt.events.push(SaleEvent::TeamSwept {
                to: team,
                amount: receipt.team_swept,
            });
        }

        if let Err(err) = host.execute(&effects) {
            warn!("purchase by {} rolled back: {}", buyer, err);
            return Err(err);
        }

        let writes = journal.into_writes();
        self.state.apply(writes);

        info!(
            "purchase by {}: {} units for {} wei (refund {}, {} stages)",
            buyer, receipt.issued, receipt.currency_used, receipt.refund, receipt.steps
        );
        Ok(receipt)
    }
}

/// Advance past a filled stage, moving the season on when the boundary is
/// crossed. Past stage_max the sale closes and price/ratio keep their last
/// values.
fn close_stage(curve: &CurveParams, journal: &mut Journal<'_>, events: &mut Vec<SaleEvent>) -> Result<()> {
    let closed = journal.stage;
    events.push(SaleEvent::StageClosed { stage: closed });
    journal.stage = add(closed, 1)?;

    if journal.stage > curve.stage_max {
        info!("final stage {} filled, sale closed", closed);
        events.push(SaleEvent::SaleClosed { final_stage: closed });
        return Ok(());
    }

    journal.price = curve.stage_price(journal.stage)?;
    journal.top_sales_ratio = curve.top_sales_ratio(journal.stage)?;
    info!("stage {} closed, stage {} opens at price {}", closed, journal.stage, journal.price);

    let season = curve.season_of(journal.stage)?;
    if season > journal.season {
        info!("season {} closed", journal.season);
        events.push(SaleEvent::SeasonClosed { season: journal.season });
        journal.season = season;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;

    fn addr(n: u8) -> Address {
        Address::with_last_byte(n)
    }

    fn engine() -> SaleEngine {
        let mut engine = SaleEngine::new(SaleConfig::default(), addr(1), addr(2)).unwrap();
        let gov = engine.governance_mut();
        gov.add_auditor(addr(1), addr(3)).unwrap();
        gov.set_exchange_rate(addr(3), U256::from(200_000_000u64)).unwrap();
        engine
    }

    #[test]
    fn test_close_stage_crosses_season() {
        let curve = CurveParams {
            season_stage_width: 2,
            ..CurveParams::default()
        };
        let state = SaleState::new(&curve).unwrap();
        let mut journal = Journal::new(&state);
        let mut events = Vec::new();

        close_stage(&curve, &mut journal, &mut events).unwrap();
        close_stage(&curve, &mut journal, &mut events).unwrap();
        assert_eq!(journal.season, 1);
        close_stage(&curve, &mut journal, &mut events).unwrap();

        assert_eq!(journal.stage, 3);
        assert_eq!(journal.season, 2);
        assert_eq!(journal.price, U256::from(1_030u32));
        assert_eq!(events.last(), Some(&SaleEvent::SeasonClosed { season: 1 }));
    }

    #[test]
    fn test_zero_dollar_purchase_refunds_everything() {
        let mut engine = engine();
        // 1 micro-dollar per whole unit: 0.1 unit converts to 0 dollars
        engine.governance.set_exchange_rate(addr(3), U256::from(1u8)).unwrap();
        let mut host = MemoryHost::new();
        let value = engine.config.min_purchase;

        let receipt = engine.purchase(&mut host, addr(9), value, 0).unwrap();
        assert_eq!(receipt.refund, value);
        assert_eq!(receipt.currency_used, U256::ZERO);
        assert_eq!(engine.state.counters.tx_count, 0);
        assert_eq!(host.native_balance(&addr(9)), value);
    }

    #[test]
    fn test_zero_budget_rejected_up_front() {
        let mut engine = engine();
        let mut host = MemoryHost::new();
        let value = engine.config.min_purchase;
        assert_eq!(
            engine.purchase_with_budget(&mut host, addr(9), value, 0, 0),
            Err(SaleError::InsufficientBudget)
        );
    }
}
