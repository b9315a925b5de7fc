//! Stage price / cap curve
//!
//! Dollar amounts and prices are 6-decimal fixed point (micro-dollars); a
//! stage price is micro-dollars per whole asset unit. Every division truncates,
//! so a stage never issues more than its dollar cap pays for.
//!
//! # Properties
//! - `stage_price` strictly increasing when `price_step > 0`
//! - `stage_dollar_cap` never exceeds `cap_max`
//! - `season_of` non-decreasing, every stage in exactly one season

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::math::{add, div, mul, mul_div, rem, sub, MathError};

/// Top-sales ratio scale (8 decimals, 100%)
pub const RATIO_SCALE: u64 = 100_000_000;

/// Curve parameter validation failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CurveError {
    #[error("stage 0 price must be positive")]
    ZeroPrice,
    #[error("stage 0 dollar cap must be positive")]
    ZeroCap,
    #[error("units per dollar must be positive")]
    ZeroUnits,
    #[error("stage_max must be in 1..u16::MAX")]
    StageMaxOutOfRange,
    #[error("season width must be positive")]
    ZeroSeasonWidth,
    #[error("top-sales ratio ramp exceeds 100%")]
    RatioAboveScale,
    #[error("curve arithmetic overflows within stage_max")]
    Overflow,
}

/// Parameters of the price/cap curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveParams {
    /// Stage 0 price, micro-dollars per whole asset unit
    #[serde(with = "crate::decimal")]
    pub price_start: U256,
    /// Price increment per stage
    #[serde(with = "crate::decimal")]
    pub price_step: U256,
    /// Stage 0 dollar cap (micro-dollars)
    #[serde(with = "crate::decimal")]
    pub cap_start: U256,
    /// Dollar cap increment per stage
    #[serde(with = "crate::decimal")]
    pub cap_step: U256,
    /// Upper bound on any stage's dollar cap
    #[serde(with = "crate::decimal")]
    pub cap_max: U256,
    /// Asset base units per whole asset unit (10^decimals)
    #[serde(with = "crate::decimal")]
    pub units_per_dollar: U256,
    /// Top-sales ratio at stage 0 (RATIO_SCALE = 100%)
    #[serde(with = "crate::decimal")]
    pub ratio_start: U256,
    /// Ratio added linearly by the time stage_max is reached
    #[serde(with = "crate::decimal")]
    pub ratio_range: U256,
    /// Last stage index; the sale closes after it
    pub stage_max: u16,
    /// Stages per season
    pub season_stage_width: u16,
}

impl Default for CurveParams {
    fn default() -> Self {
        Self {
            price_start: U256::from(1_000u64),         // $0.00100
            price_step: U256::from(10u64),             // +$0.00001
            cap_start: U256::from(100_000_000u64),     // $100
            cap_step: U256::from(1_000_000u64),        // +$1
            cap_max: U256::from(15_100_000_000u64),    // $15,100
            units_per_dollar: U256::from(1_000_000u64),
            ratio_start: U256::from(15_000_000u64),    // 15%
            ratio_range: U256::from(50_000_000u64),    // +50%
            stage_max: 60_000,
            season_stage_width: 600,
        }
    }
}

impl CurveParams {
    /// `price_start + price_step × stage`
    pub fn stage_price(&self, stage: u16) -> Result<U256, MathError> {
        add(self.price_start, mul(self.price_step, U256::from(stage))?)
    }

    /// `min(cap_max, cap_start + cap_step × stage)`
    pub fn stage_dollar_cap(&self, stage: u16) -> Result<U256, MathError> {
        let linear = add(self.cap_start, mul(self.cap_step, U256::from(stage))?)?;
        Ok(linear.min(self.cap_max))
    }

    /// Asset base units the stage's whole dollar cap buys at its own price
    pub fn stage_asset_cap(&self, stage: u16) -> Result<U256, MathError> {
        self.dollars_to_units(self.stage_dollar_cap(stage)?, stage)
    }

    /// Asset base units `dollars` buys at `stage`'s price, rounded down
    pub fn dollars_to_units(&self, dollars: U256, stage: u16) -> Result<U256, MathError> {
        mul_div(dollars, self.units_per_dollar, self.stage_price(stage)?)
    }

    /// `ratio_start + ratio_range × stage / stage_max`
    pub fn top_sales_ratio(&self, stage: u16) -> Result<U256, MathError> {
        let ramp = mul_div(self.ratio_range, U256::from(stage), U256::from(self.stage_max))?;
        add(self.ratio_start, ramp)
    }

    /// Season a stage belongs to; stage 0 is in season 1
    pub fn season_of(&self, stage: u16) -> Result<u16, MathError> {
        if stage == 0 {
            return Ok(1);
        }
        let whole = div(stage, self.season_stage_width)?;
        if rem(stage, self.season_stage_width)? > 0 {
            add(whole, 1)
        } else {
            Ok(whole)
        }
    }

    /// First stage of `season` (season 1 also owns stage 0)
    pub fn season_first_stage(&self, season: u16) -> Result<u16, MathError> {
        if season <= 1 {
            return Ok(0);
        }
        add(mul(sub(season, 1)?, self.season_stage_width)?, 1)
    }

    /// Last stage of `season`, clamped to stage_max
    pub fn season_last_stage(&self, season: u16) -> Result<u16, MathError> {
        let last = u32::from(season) * u32::from(self.season_stage_width);
        Ok(last.min(u32::from(self.stage_max)) as u16)
    }

    /// Number of seasons the sale spans
    pub fn season_count(&self) -> Result<u16, MathError> {
        self.season_of(self.stage_max)
    }

    /// Check the parameters describe a usable curve
    pub fn validate(&self) -> Result<(), CurveError> {
        if self.price_start.is_zero() {
            return Err(CurveError::ZeroPrice);
        }
        if self.cap_start.is_zero() || self.cap_max.is_zero() {
            return Err(CurveError::ZeroCap);
        }
        if self.units_per_dollar.is_zero() {
            return Err(CurveError::ZeroUnits);
        }
        if self.stage_max == 0 || self.stage_max == u16::MAX {
            return Err(CurveError::StageMaxOutOfRange);
        }
        if self.season_stage_width == 0 {
            return Err(CurveError::ZeroSeasonWidth);
        }
        let ratio_end = add(self.ratio_start, self.ratio_range).map_err(|_| CurveError::Overflow)?;
        if ratio_end > U256::from(RATIO_SCALE) {
            return Err(CurveError::RatioAboveScale);
        }
        // Highest stage bounds every intermediate product
        self.stage_asset_cap(self.stage_max).map_err(|_| CurveError::Overflow)?;
        self.top_sales_ratio(self.stage_max).map_err(|_| CurveError::Overflow)?;
        Ok(())
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn season_of_is_monotonic(stage in 0u16..60_000) {
            let curve = CurveParams::default();
            let here = curve.season_of(stage).unwrap();
            let next = curve.season_of(stage + 1).unwrap();
            prop_assert!(next >= here);
            prop_assert!(next - here <= 1);
        }

        #[test]
        fn stage_cap_never_over_allocates(stage in 0u16..=60_000) {
            let curve = CurveParams::default();
            let units = curve.stage_asset_cap(stage).unwrap();
            let price = curve.stage_price(stage).unwrap();
            let paid = units * price / curve.units_per_dollar;
            prop_assert!(paid <= curve.stage_dollar_cap(stage).unwrap());
        }
    }
}
