//! Sale configuration

use alloy_primitives::U256;
use sale_model::{CurveParams, RATIO_SCALE, REFERRAL_PERCENT_TOTAL};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SaleError};

/// Wei per whole native currency unit
pub const CURRENCY_UNIT: u128 = 1_000_000_000_000_000_000;

/// Sale parameters (immutable after engine creation)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaleConfig {
    /// Price / cap curve
    pub curve: CurveParams,

    /// Smallest currency units per whole currency unit; the exchange rate is
    /// micro-dollars per whole currency unit
    #[serde(with = "sale_model::decimal")]
    pub currency_unit: U256,

    /// Smallest accepted payment (inclusive)
    #[serde(with = "sale_model::decimal")]
    pub min_purchase: U256,

    /// Largest accepted payment (inclusive)
    #[serde(with = "sale_model::decimal")]
    pub max_purchase: U256,

    /// Payment at or above this earns the volume bonus
    #[serde(with = "sale_model::decimal")]
    pub bonus_threshold: U256,

    /// Volume bonus as a percent of issued units
    pub bonus_percent: u8,

    /// While the sale is open the team sweep is rounded down to this many
    /// currency units; zero sweeps the exact remainder
    #[serde(with = "sale_model::decimal")]
    pub team_sweep_granularity: U256,

    /// Stage iterations one purchase may run before refunding the rest
    pub max_stage_steps: u32,
}

impl Default for SaleConfig {
    fn default() -> Self {
        let unit = U256::from(CURRENCY_UNIT);
        Self {
            curve: CurveParams::default(),
            currency_unit: unit,
            min_purchase: unit / U256::from(10u8),  // 0.1
            max_purchase: unit * U256::from(100u8), // 100
            bonus_threshold: unit * U256::from(10u8),
            bonus_percent: 10,
            team_sweep_granularity: unit,
            max_stage_steps: 64,
        }
    }
}

impl SaleConfig {
    /// Parse from TOML text and validate
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: SaleConfig = toml_from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject parameter sets that could break the settlement invariants
    pub fn validate(&self) -> Result<()> {
        self.curve.validate()?;

        if self.currency_unit.is_zero() {
            return Err(SaleError::InvalidConfig("currency_unit must be positive".into()));
        }
        if self.min_purchase.is_zero() || self.min_purchase > self.max_purchase {
            return Err(SaleError::InvalidConfig(
                "min_purchase must be positive and not above max_purchase".into(),
            ));
        }
        if self.bonus_percent > 100 {
            return Err(SaleError::InvalidConfig("bonus_percent above 100".into()));
        }
        if self.max_stage_steps == 0 {
            return Err(SaleError::InvalidConfig("max_stage_steps must be positive".into()));
        }

        // Top-sales share at the last stage plus the full referral share must
        // fit inside the currency sold.
        let referral_share = U256::from(REFERRAL_PERCENT_TOTAL) * U256::from(RATIO_SCALE / 100);
        let worst_case = self.curve.ratio_start + self.curve.ratio_range + referral_share;
        if worst_case > U256::from(RATIO_SCALE) {
            return Err(SaleError::InvalidConfig(
                "top-sales ratio plus referral share exceeds 100%".into(),
            ));
        }
        Ok(())
    }
}

fn toml_from_str(text: &str) -> Result<SaleConfig> {
    toml::from_str(text).map_err(|e| SaleError::InvalidConfig(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(SaleConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_min_above_max_rejected() {
        let config = SaleConfig {
            min_purchase: U256::from(10u8),
            max_purchase: U256::from(5u8),
            ..SaleConfig::default()
        };
        assert!(matches!(config.validate(), Err(SaleError::InvalidConfig(_))));
    }

    #[test]
    fn test_ratio_plus_referral_over_100_rejected() {
        let mut config = SaleConfig::default();
        // 15% + 51% + 35% = 101%
        config.curve.ratio_range = U256::from(51_000_000u64);
        assert!(matches!(config.validate(), Err(SaleError::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_step_budget_rejected() {
        let config = SaleConfig {
            max_stage_steps: 0,
            ..SaleConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let text = r#"
            min_purchase = "500000000000000000"
            max_stage_steps = 8

            [curve]
            price_start = 1000
            price_step = 10
            cap_start = 100000000
            cap_step = 1000000
            cap_max = "15100000000"
            units_per_dollar = 1000000
            ratio_start = 15000000
            ratio_range = 50000000
            stage_max = 1200
            season_stage_width = 600
        "#;
        let config = SaleConfig::from_toml_str(text).unwrap();
        assert_eq!(config.min_purchase, U256::from(500_000_000_000_000_000u64));
        assert_eq!(config.max_stage_steps, 8);
        assert_eq!(config.curve.stage_max, 1_200);
        assert_eq!(config.bonus_percent, 10);
    }

    #[test]
    fn test_garbage_toml_is_config_error() {
        let err = SaleConfig::from_toml_str("min_purchase = [1, 2]").unwrap_err();
        assert!(matches!(err, SaleError::InvalidConfig(_)));
    }
}
