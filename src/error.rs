//! Sale error taxonomy

use alloy_primitives::{Address, U256};
use sale_model::{CurveError, MathError};
use serde::Serialize;
use thiserror::Error;

/// Why the sale is not accepting purchases
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum NotOpenReason {
    NotStarted,
    Paused,
    Closed,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SaleError {
    /// Payment outside the configured min/max bounds, or a zero amount
    #[error("amount {0} outside accepted bounds")]
    InvalidAmount(U256),

    /// Sale not started, paused, or past its final stage
    #[error("sale not open: {0:?}")]
    SaleNotOpen(NotOpenReason),

    /// Exchange rate unset or zero
    #[error("exchange rate not set")]
    RateNotSet,

    /// Caller lacks the owner or auditor role
    #[error("caller {0} is not authorized")]
    Unauthorized(Address),

    #[error("arithmetic overflow")]
    Overflow,

    #[error("arithmetic underflow")]
    Underflow,

    #[error("division by zero")]
    DivideByZero,

    /// Step budget too small to process any stage
    #[error("insufficient step budget")]
    InsufficientBudget,

    /// A value transfer was refused by its recipient
    #[error("transfer to {0} rejected")]
    TransferRejected(Address),

    /// Destination is the zero address
    #[error("invalid recipient")]
    InvalidRecipient,

    /// Withdrawal larger than the bucket balance
    #[error("requested {requested} exceeds available {available}")]
    ExceedsAvailable { requested: U256, available: U256 },

    /// Stage beyond stage_max
    #[error("unknown stage {0}")]
    UnknownStage(u16),

    /// Season outside the sale's season range
    #[error("unknown season {0}")]
    UnknownSeason(u16),

    /// accept_ownership called with no proposal outstanding
    #[error("no pending owner")]
    NoPendingOwner,

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl From<MathError> for SaleError {
    fn from(err: MathError) -> Self {
        match err {
            MathError::Overflow => SaleError::Overflow,
            MathError::Underflow => SaleError::Underflow,
            MathError::DivideByZero => SaleError::DivideByZero,
        }
    }
}

impl From<CurveError> for SaleError {
    fn from(err: CurveError) -> Self {
        SaleError::InvalidConfig(err.to_string())
    }
}

pub type Result<T> = core::result::Result<T, SaleError>;
