//! Settlement notifications and the per-purchase receipt

use alloy_primitives::{Address, U256};
use arrayvec::ArrayVec;
use sale_model::REFERRAL_LEVELS;
use serde::Serialize;

/// Something observable that happened during a purchase
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum SaleEvent {
    StageClosed { stage: u16 },
    SeasonClosed { season: u16 },
    /// The final stage filled; no further purchases are accepted
    SaleClosed { final_stage: u16 },
    Refunded { to: Address, amount: U256 },
    BonusIssued { to: Address, amount: U256 },
    WhitelistIssued { to: Address, amount: U256 },
    ReferralPaid { level: u8, referrer: Address, amount: U256 },
    PendingEscrowed { amount: U256 },
    TeamSwept { to: Address, amount: U256 },
}

/// What one committed purchase did
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PurchaseReceipt {
    /// Dollar value of the payment at the current exchange rate
    pub dollars: U256,
    /// Dollars converted into asset units
    pub dollars_used: U256,
    pub currency_used: U256,
    pub refund: U256,
    pub issued: U256,
    pub bonus: U256,
    pub whitelist_bonus: U256,
    pub referral_payouts: ArrayVec<(Address, U256), REFERRAL_LEVELS>,
    pub pending_added: U256,
    pub top_sales_added: U256,
    pub team_swept: U256,
    /// Stages processed
    pub steps: u32,
    /// Step budget ran out before the payment was consumed
    pub budget_exhausted: bool,
    pub events: Vec<SaleEvent>,
}

impl PurchaseReceipt {
    /// Total asset units the buyer received
    pub fn total_units(&self) -> Option<U256> {
        self.issued
            .checked_add(self.bonus)?
            .checked_add(self.whitelist_bonus)
    }
}
