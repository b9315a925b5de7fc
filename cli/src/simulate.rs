//! Scenario replay against the in-memory host

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, warn};
use serde::Serialize;
use stagesale::{
    AccountRecord, Address, FundSummary, MemoryHost, PurchaseReceipt, SaleConfig, SaleEngine, SaleStatus,
    SeasonStatus, U256,
};
use std::collections::BTreeSet;

use crate::config::{parse_currency, parse_timestamp, Scenario};

/// Above this many purchases a progress bar is drawn
const PROGRESS_THRESHOLD: usize = 50;

#[derive(Debug, Serialize)]
pub struct PurchaseOutcome {
    pub index: usize,
    pub buyer: Address,
    pub value: U256,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<PurchaseReceipt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AccountReport {
    pub address: Address,
    pub record: AccountRecord,
    pub asset_balance: U256,
    pub native_balance: U256,
}

#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub outcomes: Vec<PurchaseOutcome>,
    pub status: SaleStatus,
    pub funds: FundSummary,
    pub seasons: Vec<SeasonStatus>,
    pub accounts: Vec<AccountReport>,
    pub invariants_hold: bool,
}

impl SimulationReport {
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.error.is_some()).count()
    }
}

pub fn run(config: SaleConfig, scenario: &Scenario, show_progress: bool) -> Result<SimulationReport> {
    let unit = config.currency_unit;
    let mut engine = SaleEngine::new(config, scenario.owner, scenario.team).context("Failed to create sale engine")?;

    let start = match &scenario.start {
        Some(text) => parse_timestamp(text)?,
        None => 0,
    };
    let auditor = scenario.auditor.unwrap_or(scenario.owner);
    let gov = engine.governance_mut();
    gov.add_auditor(scenario.owner, auditor)?;
    gov.set_exchange_rate(auditor, scenario.exchange_rate)
        .context("Scenario exchange rate rejected")?;
    gov.set_start_time(scenario.owner, start)?;

    let mut host = MemoryHost::new();
    for account in &scenario.accounts {
        if let Some(referrer) = account.referrer {
            if !host.register(account.address, referrer) {
                warn!("referrer {} of {} not registered", referrer, account.address);
            }
        }
        if account.whitelisted {
            host.whitelist(account.address);
        }
    }
    // Overrides win over counts derived from registration
    for account in &scenario.accounts {
        if let Some(count) = account.referral_count {
            host.set_referral_count(account.address, count);
        }
    }

    let mut plan = Vec::new();
    for spec in &scenario.purchases {
        let value = parse_currency(&spec.amount, unit)
            .with_context(|| format!("Invalid purchase amount: {}", spec.amount))?;
        let at = match &spec.at {
            Some(text) => parse_timestamp(text)?,
            None => start,
        };
        for _ in 0..spec.repeat.unwrap_or(1) {
            plan.push((spec.buyer, value, at));
        }
    }

    let progress = if show_progress && plan.len() > PROGRESS_THRESHOLD {
        let bar = ProgressBar::new(plan.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")?.progress_chars("##-"),
        );
        bar
    } else {
        ProgressBar::hidden()
    };

    let mut outcomes = Vec::with_capacity(plan.len());
    let mut touched: BTreeSet<Address> = scenario.accounts.iter().map(|a| a.address).collect();
    touched.insert(scenario.team);

    for (index, (buyer, value, at)) in plan.into_iter().enumerate() {
        touched.insert(buyer);
        let outcome = match engine.purchase(&mut host, buyer, value, at) {
            Ok(receipt) => {
                for (referrer, _) in &receipt.referral_payouts {
                    touched.insert(*referrer);
                }
                PurchaseOutcome {
                    index,
                    buyer,
                    value,
                    receipt: Some(receipt),
                    error: None,
                }
            }
            Err(err) => {
                debug!("purchase {} by {} failed: {}", index, buyer, err);
                PurchaseOutcome {
                    index,
                    buyer,
                    value,
                    receipt: None,
                    error: Some(err.to_string()),
                }
            }
        };
        outcomes.push(outcome);
        progress.set_message(format!("stage {}", engine.state().stage));
        progress.inc(1);
    }
    progress.finish_and_clear();

    let mut seasons = Vec::new();
    for season in engine.state().seasons.keys() {
        seasons.push(engine.season_status(*season)?);
    }

    let accounts = touched
        .into_iter()
        .map(|address| AccountReport {
            address,
            record: engine.account(&address),
            asset_balance: host.asset_balance(&address),
            native_balance: host.native_balance(&address),
        })
        .collect();

    Ok(SimulationReport {
        outcomes,
        status: engine.status(),
        funds: engine.fund_summary()?,
        seasons,
        accounts,
        invariants_hold: engine.state().check_invariants(&engine.config().curve),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"
owner = "0x0000000000000000000000000000000000000001"
team = "0x0000000000000000000000000000000000000002"
exchange_rate = 200000000
start = "2024-01-01T00:00:00Z"

[[account]]
address = "0x000000000000000000000000000000000000000a"
referrer = "0x000000000000000000000000000000000000000b"
whitelisted = true

[[purchase]]
buyer = "0x000000000000000000000000000000000000000a"
amount = "0.5"
repeat = 2

[[purchase]]
buyer = "0x000000000000000000000000000000000000000c"
amount = "0.5"
at = "2023-12-31T23:59:59Z"
"#;

    #[test]
    fn test_scenario_replay() {
        let scenario: Scenario = toml::from_str(SCENARIO).unwrap();
        let report = run(SaleConfig::default(), &scenario, false).unwrap();

        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.failed(), 1);
        assert!(report.outcomes[2].error.as_deref().unwrap_or("").contains("not open"));
        assert_eq!(report.status.stage, 1);
        assert_eq!(report.status.counters.tx_count, 2);
        assert!(report.invariants_hold);

        let referrer = Address::with_last_byte(0x0b);
        let row = report.accounts.iter().find(|a| a.address == referrer).unwrap();
        // 6% of 0.5 unit, twice
        assert_eq!(row.native_balance, U256::from(60_000_000_000_000_000u64));
    }

    #[test]
    fn test_bad_amount_is_reported() {
        let mut scenario: Scenario = toml::from_str(SCENARIO).unwrap();
        scenario.purchases[0].amount = "half".into();
        let err = run(SaleConfig::default(), &scenario, false).unwrap_err();
        assert!(err.to_string().contains("Invalid purchase amount"));
    }
}
