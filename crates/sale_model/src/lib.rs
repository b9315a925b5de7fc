//! Pure Rust model of the staged sale
//! No I/O, no unwrap/panic on the settlement path, all arithmetic checked
//!
//! The engine crate imports these functions directly; nothing here owns state.

#![forbid(unsafe_code)]

#[cfg(kani)]
extern crate kani;

pub mod curve;
pub mod decimal;
pub mod math;
pub mod referral;

// Re-export commonly used types
pub use alloy_primitives::{Address, U256};
pub use curve::{CurveError, CurveParams, RATIO_SCALE};
pub use math::{Guarded, MathError};
pub use referral::{
    walk, LevelReward, ReferralGraph, ReferralWalk, REFERRAL_LEVELS, REFERRAL_PERCENTAGES,
    REFERRAL_PERCENT_TOTAL,
};
