//! Human-readable and JSON output

use anyhow::Result;
use colored::Colorize;
use sale_model::math::{add, mul_div};
use serde::Serialize;
use stagesale::{SaleConfig, U256};

use crate::simulate::SimulationReport;

/// Micro-dollars per dollar
const MICRO: u64 = 1_000_000;

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// `amount / unit` with up to six decimals, trailing zeros trimmed
pub fn format_scaled(amount: U256, unit: U256) -> String {
    if unit.is_zero() {
        return amount.to_string();
    }
    let whole = amount / unit;
    let micro = mul_div(amount % unit, U256::from(MICRO), unit).unwrap_or_default();
    if micro.is_zero() {
        return whole.to_string();
    }
    let fraction = format!("{:06}", u64::try_from(micro).unwrap_or_default());
    format!("{}.{}", whole, fraction.trim_end_matches('0'))
}

pub fn dollars(micro: U256) -> String {
    format!("${}", format_scaled(micro, U256::from(MICRO)))
}

pub fn percent(ratio: U256) -> String {
    // RATIO_SCALE is 100% at 8 decimals
    format!("{}%", format_scaled(ratio, U256::from(sale_model::RATIO_SCALE / 100)))
}

// ============================================================================
// Commands
// ============================================================================

pub fn print_check(config: &SaleConfig) -> Result<()> {
    let curve = &config.curve;
    let unit = config.currency_unit;
    let last = curve.stage_max;

    println!("{}", "=== Sale Config ===".bright_green().bold());
    println!("{} {}", "Stages:".bright_cyan(), u32::from(last) + 1);
    println!(
        "{} {} ({} stages each)",
        "Seasons:".bright_cyan(),
        curve.season_count()?,
        curve.season_stage_width
    );
    println!(
        "{} {} -> {}",
        "Price:".bright_cyan(),
        dollars(curve.stage_price(0)?),
        dollars(curve.stage_price(last)?)
    );
    println!(
        "{} {} -> {} (max {})",
        "Stage cap:".bright_cyan(),
        dollars(curve.stage_dollar_cap(0)?),
        dollars(curve.stage_dollar_cap(last)?),
        dollars(curve.cap_max)
    );
    println!(
        "{} {} -> {}",
        "Top-sales ratio:".bright_cyan(),
        percent(curve.top_sales_ratio(0)?),
        percent(curve.top_sales_ratio(last)?)
    );
    println!(
        "{} {} .. {}",
        "Purchase bounds:".bright_cyan(),
        format_scaled(config.min_purchase, unit),
        format_scaled(config.max_purchase, unit)
    );
    println!(
        "{} {}% at {} or more",
        "Volume bonus:".bright_cyan(),
        config.bonus_percent,
        format_scaled(config.bonus_threshold, unit)
    );
    println!(
        "{} {} units",
        "Team sweep granularity:".bright_cyan(),
        format_scaled(config.team_sweep_granularity, unit)
    );
    println!("{} {}", "Stage steps per purchase:".bright_cyan(), config.max_stage_steps);
    println!("\n{}", "Config is valid".bright_green());
    Ok(())
}

#[derive(Serialize)]
struct CurveRow {
    stage: u16,
    season: u16,
    price: U256,
    dollar_cap: U256,
    asset_cap: U256,
    top_sales_ratio: U256,
}

/// Rows for `count` stages starting at `from`, clipped to stage_max
fn curve_rows(config: &SaleConfig, from: u16, count: u16) -> Result<Vec<CurveRow>> {
    let curve = &config.curve;
    let end = u32::from(from)
        .saturating_add(u32::from(count))
        .min(u32::from(curve.stage_max) + 1);

    let mut rows = Vec::new();
    for stage in u32::from(from)..end {
        let stage = u16::try_from(stage)?;
        rows.push(CurveRow {
            stage,
            season: curve.season_of(stage)?,
            price: curve.stage_price(stage)?,
            dollar_cap: curve.stage_dollar_cap(stage)?,
            asset_cap: curve.stage_asset_cap(stage)?,
            top_sales_ratio: curve.top_sales_ratio(stage)?,
        });
    }
    Ok(rows)
}

pub fn print_curve(config: &SaleConfig, from: u16, count: u16, json: bool) -> Result<()> {
    let curve = &config.curve;
    let rows = curve_rows(config, from, count)?;

    if json {
        return print_json(&rows);
    }

    println!("{}", "=== Price / Cap Curve ===".bright_green().bold());
    println!(
        "{:>7} {:>7} {:>14} {:>14} {:>20} {:>12}",
        "stage".bold(),
        "season".bold(),
        "price".bold(),
        "cap".bold(),
        "units".bold(),
        "top sales".bold()
    );
    for row in &rows {
        println!(
            "{:>7} {:>7} {:>14} {:>14} {:>20} {:>12}",
            row.stage,
            row.season,
            dollars(row.price),
            dollars(row.dollar_cap),
            format_scaled(row.asset_cap, curve.units_per_dollar),
            percent(row.top_sales_ratio)
        );
    }
    if rows.is_empty() {
        println!("{}", "No stages in range".dimmed());
    }
    Ok(())
}

pub fn print_season(config: &SaleConfig, season: u16, json: bool) -> Result<()> {
    let curve = &config.curve;
    if season == 0 || season > curve.season_count()? {
        anyhow::bail!("Season {} outside 1..={}", season, curve.season_count()?);
    }
    let first = curve.season_first_stage(season)?;
    let last = curve.season_last_stage(season)?;

    let mut dollar_cap = U256::ZERO;
    let mut asset_cap = U256::ZERO;
    for stage in first..=last {
        dollar_cap = add(dollar_cap, curve.stage_dollar_cap(stage)?)?;
        asset_cap = add(asset_cap, curve.stage_asset_cap(stage)?)?;
    }

    if json {
        return print_json(&serde_json::json!({
            "season": season,
            "first_stage": first,
            "last_stage": last,
            "dollar_cap": dollar_cap,
            "asset_cap": asset_cap,
        }));
    }

    println!("{}", format!("=== Season {} ===", season).bright_green().bold());
    println!("{} {} ..= {}", "Stages:".bright_cyan(), first, last);
    println!(
        "{} {} -> {}",
        "Price:".bright_cyan(),
        dollars(curve.stage_price(first)?),
        dollars(curve.stage_price(last)?)
    );
    println!("{} {}", "Dollar cap:".bright_cyan(), dollars(dollar_cap));
    println!(
        "{} {}",
        "Asset units:".bright_cyan(),
        format_scaled(asset_cap, curve.units_per_dollar)
    );
    Ok(())
}

pub fn print_simulation(report: &SimulationReport, config: &SaleConfig, json: bool) -> Result<()> {
    if json {
        return print_json(report);
    }
    let unit = config.currency_unit;
    let units = config.curve.units_per_dollar;

    println!("{}", "=== Purchases ===".bright_green().bold());
    for outcome in &report.outcomes {
        let value = format_scaled(outcome.value, unit);
        match (&outcome.receipt, &outcome.error) {
            (Some(receipt), _) => {
                let mut line = format!(
                    "#{:<4} {} paid {} -> {} units",
                    outcome.index,
                    outcome.buyer,
                    value,
                    format_scaled(receipt.issued, units)
                );
                if !receipt.bonus.is_zero() {
                    line.push_str(&format!(" +{} bonus", format_scaled(receipt.bonus, units)));
                }
                if !receipt.whitelist_bonus.is_zero() {
                    line.push_str(&format!(" +{} whitelist", format_scaled(receipt.whitelist_bonus, units)));
                }
                if !receipt.refund.is_zero() {
                    line.push_str(&format!(", refund {}", format_scaled(receipt.refund, unit)));
                }
                println!("{}", line);
            }
            (None, Some(error)) => {
                println!(
                    "#{:<4} {} paid {} -> {}",
                    outcome.index,
                    outcome.buyer,
                    value,
                    error.red()
                );
            }
            (None, None) => {}
        }
    }

    let status = &report.status;
    println!("\n{}", "=== Sale Status ===".bright_green().bold());
    println!("{} {:?}", "Phase:".bright_cyan(), status.phase);
    println!("{} {} (season {})", "Stage:".bright_cyan(), status.stage, status.season);
    println!("{} {}", "Price:".bright_cyan(), dollars(status.price));
    println!("{} {}", "Owner:".bright_cyan(), status.owner);
    let auditors: Vec<String> = status.auditors.iter().map(ToString::to_string).collect();
    println!("{} {}", "Auditors:".bright_cyan(), auditors.join(", "));
    println!("{} {}", "Sales:".bright_cyan(), status.counters.tx_count);
    println!(
        "{} {}",
        "Units issued:".bright_cyan(),
        format_scaled(status.counters.asset_issued, units)
    );

    let funds = &report.funds;
    println!("\n{}", "=== Funds ===".bright_green().bold());
    for (label, amount) in [
        ("Sold:", funds.currency_sold),
        ("Referral paid:", funds.referral_paid),
        ("Top sales:", funds.top_sales),
        ("Pending:", funds.pending),
        ("Team paid:", funds.team_paid),
        ("Unaccounted:", funds.unaccounted),
    ] {
        println!("{:<16} {}", label.bright_cyan(), format_scaled(amount, unit));
    }

    if !report.seasons.is_empty() {
        println!("\n{}", "=== Seasons ===".bright_green().bold());
        for season in &report.seasons {
            println!(
                "{:>4}  sold {:>16}  top sales {:>12}  referrers {}",
                season.season,
                dollars(season.dollars_sold),
                format_scaled(season.top_sales, unit),
                season.referrer_count
            );
        }
    }

    println!("\n{}", "=== Accounts ===".bright_green().bold());
    for row in &report.accounts {
        println!(
            "{}  units {:>16}  currency {:>12}",
            row.address,
            format_scaled(row.asset_balance, units),
            format_scaled(row.native_balance, unit)
        );
    }

    println!();
    if report.invariants_hold {
        println!("{}", "Bookkeeping invariants hold".bright_green());
    } else {
        println!("{}", "Bookkeeping invariants violated".red().bold());
    }
    if report.failed() > 0 {
        println!("{}", format!("{} purchase(s) rejected", report.failed()).yellow());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_scaled() {
        let unit = U256::from(1_000_000u64);
        assert_eq!(format_scaled(U256::from(1_500_000u64), unit), "1.5");
        assert_eq!(format_scaled(U256::from(2_000_000u64), unit), "2");
        assert_eq!(format_scaled(U256::from(1_010u64), unit), "0.00101");
        assert_eq!(dollars(U256::from(100_000_000u64)), "$100");
        assert_eq!(percent(U256::from(15_000_000u64)), "15%");
        assert_eq!(percent(U256::from(15_000_833u64)), "15.000833%");
    }

    #[test]
    fn test_curve_rows_range() {
        let config = SaleConfig::default();
        assert!(curve_rows(&config, 0, 0).unwrap().is_empty());

        let rows = curve_rows(&config, 5, 3).unwrap();
        let stages: Vec<u16> = rows.iter().map(|r| r.stage).collect();
        assert_eq!(stages, vec![5, 6, 7]);

        // Clipped at stage_max
        let last = config.curve.stage_max;
        let rows = curve_rows(&config, last - 1, 10).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(curve_rows(&config, last, u16::MAX).unwrap().len(), 1);
    }
}
