//! Sale config and scenario files

use anyhow::{bail, Context, Result};
use chrono::DateTime;
use sale_model::math::{add, div, mul, rem};
use serde::Deserialize;
use stagesale::{Address, SaleConfig, U256};
use std::fs;
use std::path::{Path, PathBuf};

/// A replayable sequence of purchases against a fresh sale
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub owner: Address,
    pub team: Address,

    /// Sets the exchange rate; defaults to the owner
    #[serde(default)]
    pub auditor: Option<Address>,

    /// Micro-dollars per whole currency unit
    #[serde(with = "sale_model::decimal")]
    pub exchange_rate: U256,

    /// RFC 3339 sale start
    #[serde(default)]
    pub start: Option<String>,

    #[serde(default, rename = "account")]
    pub accounts: Vec<AccountSpec>,

    #[serde(default, rename = "purchase")]
    pub purchases: Vec<PurchaseSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccountSpec {
    pub address: Address,
    #[serde(default)]
    pub referrer: Option<Address>,
    #[serde(default)]
    pub whitelisted: bool,
    /// Overrides the referee count derived from registrations
    #[serde(default)]
    pub referral_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PurchaseSpec {
    pub buyer: Address,
    /// Whole currency units, e.g. "0.5"
    pub amount: String,
    /// RFC 3339 purchase time; defaults to the sale start
    #[serde(default)]
    pub at: Option<String>,
    #[serde(default)]
    pub repeat: Option<u32>,
}

/// Expand `~` and environment variables in a path
pub fn expand_path(path: &Path) -> Result<PathBuf> {
    let text = path.to_str().context("Path is not valid UTF-8")?;
    let expanded = shellexpand::full(text).with_context(|| format!("Failed to expand path: {}", text))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

/// Load the sale config, or the built-in defaults when no path is given
pub fn load_sale_config(path: Option<&Path>) -> Result<SaleConfig> {
    let Some(path) = path else {
        return Ok(SaleConfig::default());
    };
    let path = expand_path(path)?;
    let text = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    SaleConfig::from_toml_str(&text).with_context(|| format!("Invalid sale config: {}", path.display()))
}

pub fn load_scenario(path: &Path) -> Result<Scenario> {
    let path = expand_path(path)?;
    let text = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read scenario file: {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("Failed to parse scenario: {}", path.display()))
}

/// RFC 3339 timestamp to unix seconds
pub fn parse_timestamp(text: &str) -> Result<u64> {
    let parsed = DateTime::parse_from_rfc3339(text)
        .with_context(|| format!("Invalid RFC 3339 timestamp: {}", text))?;
    let seconds = parsed.timestamp();
    if seconds < 0 {
        bail!("Timestamp before 1970: {}", text);
    }
    Ok(seconds as u64)
}

/// Decimal currency amount ("1.25") to smallest units
pub fn parse_currency(text: &str, unit: U256) -> Result<U256> {
    let text = text.trim();
    let (whole, fraction) = text.split_once('.').unwrap_or((text, ""));
    let whole = if whole.is_empty() { "0" } else { whole };
    let whole = sale_model::decimal::parse(whole).map_err(anyhow::Error::msg)?;
    let mut amount = mul(whole, unit)?;

    if !fraction.is_empty() {
        let digits = sale_model::decimal::parse(fraction).map_err(anyhow::Error::msg)?;
        let exponent = u32::try_from(fraction.len()).context("Fraction too long")?;
        let scale = U256::from(10u8)
            .checked_pow(U256::from(exponent))
            .context("Fraction too long")?;
        let scaled = mul(digits, unit)?;
        if !rem(scaled, scale)?.is_zero() {
            bail!("Amount {} is finer than one currency unit allows", text);
        }
        amount = add(amount, div(scaled, scale)?)?;
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn unit() -> U256 {
        U256::from(stagesale::CURRENCY_UNIT)
    }

    #[test]
    fn test_parse_currency() {
        assert_eq!(parse_currency("0.5", unit()).unwrap(), unit() / U256::from(2u8));
        assert_eq!(parse_currency("12", unit()).unwrap(), unit() * U256::from(12u8));
        assert_eq!(parse_currency(".1", unit()).unwrap(), unit() / U256::from(10u8));
        assert!(parse_currency("1.5", U256::from(1u8)).is_err());
        assert!(parse_currency("abc", unit()).is_err());
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("1970-01-01T00:01:00Z").unwrap(), 60);
        assert_eq!(parse_timestamp("2024-01-01T02:00:00+02:00").unwrap(), 1_704_067_200);
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_load_sale_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bonus_percent = 5\n\n[curve]\nstage_max = 120").unwrap();

        let config = load_sale_config(Some(file.path())).unwrap();
        assert_eq!(config.bonus_percent, 5);
        assert_eq!(config.curve.stage_max, 120);

        assert_eq!(load_sale_config(None).unwrap(), SaleConfig::default());
    }

    #[test]
    fn test_invalid_config_file_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bonus_percent = 101").unwrap();

        let err = load_sale_config(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("Invalid sale config"));
    }

    #[test]
    fn test_load_scenario() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
owner = "0x0000000000000000000000000000000000000001"
team = "0x0000000000000000000000000000000000000002"
exchange_rate = 200000000

[[account]]
address = "0x000000000000000000000000000000000000000a"
referrer = "0x000000000000000000000000000000000000000b"
whitelisted = true

[[purchase]]
buyer = "0x000000000000000000000000000000000000000a"
amount = "0.5"
repeat = 3
"#
        )
        .unwrap();

        let scenario = load_scenario(file.path()).unwrap();
        assert_eq!(scenario.exchange_rate, U256::from(200_000_000u64));
        assert_eq!(scenario.accounts.len(), 1);
        assert!(scenario.accounts[0].whitelisted);
        assert_eq!(scenario.purchases[0].repeat, Some(3));
    }
}
