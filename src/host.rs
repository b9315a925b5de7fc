//! Collaborator interfaces and the in-memory host
//!
//! The engine never moves value itself. A purchase describes its value
//! movements as a batch of [`Effect`]s and hands them to [`Host::execute`],
//! which must apply all of them or none.

use std::collections::{HashMap, HashSet};

use alloy_primitives::{Address, U256};
use sale_model::math::add;
use sale_model::ReferralGraph;
use serde::Serialize;

use crate::error::{Result, SaleError};

// ============================================================================
// Effects
// ============================================================================

/// Kind of asset issued to an account
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Allocation {
    Purchase,
    Bonus,
    Whitelist,
}

/// Reason native currency leaves the sale
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Payout {
    Refund,
    Referral { level: u8 },
    Team,
    TopSales { season: u16 },
    Pending,
}

/// One value movement of a settlement
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Effect {
    /// Issue asset units
    Mint { to: Address, amount: U256, kind: Allocation },
    /// Send native currency
    Pay { to: Address, amount: U256, reason: Payout },
}

// ============================================================================
// Collaborator Traits
// ============================================================================

/// Token balance held by the sale that can be sent out
pub trait TokenTransfer {
    fn transfer(&mut self, to: Address, amount: U256) -> Result<()>;
}

/// Issued-asset ledger: balances, whitelist flag, referral graph
pub trait AssetLedger: ReferralGraph + TokenTransfer {
    fn is_whitelisted(&self, account: &Address) -> bool;

    fn mint(&mut self, to: Address, amount: U256) -> Result<()>;
}

/// Native-currency movements out of the sale
pub trait NativeBank {
    /// Fails with `TransferRejected` when the recipient refuses the value
    fn transfer_native(&mut self, to: Address, amount: U256) -> Result<()>;
}

/// Everything a purchase needs from its environment
pub trait Host: AssetLedger + NativeBank {
    /// Apply a batch of effects atomically.
    ///
    /// On `Err` no effect of the batch may be observable.
    fn execute(&mut self, effects: &[Effect]) -> Result<()>;
}

// ============================================================================
// In-memory Host
// ============================================================================

/// Host keeping every ledger in memory
#[derive(Clone, Debug, Default)]
pub struct MemoryHost {
    referrers: HashMap<Address, Address>,
    referees: HashMap<Address, u32>,
    whitelisted: HashSet<Address>,
    rejecting: HashSet<Address>,
    asset_balances: HashMap<Address, U256>,
    native_balances: HashMap<Address, U256>,
    /// Tokens sitting in the sale's own account
    held_tokens: U256,
    history: Vec<Effect>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `referrer` as the referrer of `account`.
    ///
    /// Returns false when `account` already has one, when it would refer to
    /// itself, or when `referrer` is the zero address.
    pub fn register(&mut self, account: Address, referrer: Address) -> bool {
        if account == referrer || referrer == Address::ZERO || self.referrers.contains_key(&account) {
            return false;
        }
        self.referrers.insert(account, referrer);
        *self.referees.entry(referrer).or_default() += 1;
        true
    }

    /// Override the qualifying referee count of an account
    pub fn set_referral_count(&mut self, account: Address, count: u32) {
        self.referees.insert(account, count);
    }

    pub fn whitelist(&mut self, account: Address) {
        self.whitelisted.insert(account);
    }

    /// Make every future transfer to `account` fail
    pub fn reject_transfers_to(&mut self, account: Address) {
        self.rejecting.insert(account);
    }

    pub fn accept_transfers_to(&mut self, account: Address) {
        self.rejecting.remove(&account);
    }

    /// Tokens credited to the sale's own account (e.g. sent by mistake)
    pub fn deposit_held_tokens(&mut self, amount: U256) -> Result<()> {
        self.held_tokens = add(self.held_tokens, amount)?;
        Ok(())
    }

    pub fn held_tokens(&self) -> U256 {
        self.held_tokens
    }

    pub fn asset_balance(&self, account: &Address) -> U256 {
        self.asset_balances.get(account).copied().unwrap_or_default()
    }

    pub fn native_balance(&self, account: &Address) -> U256 {
        self.native_balances.get(account).copied().unwrap_or_default()
    }

    /// Every effect applied so far, in order
    pub fn history(&self) -> &[Effect] {
        &self.history
    }

    fn accepts(&self, to: &Address) -> Result<()> {
        if *to == Address::ZERO || self.rejecting.contains(to) {
            return Err(SaleError::TransferRejected(*to));
        }
        Ok(())
    }

    fn credit(balances: &mut HashMap<Address, U256>, to: Address, amount: U256) -> Result<()> {
        let slot = balances.entry(to).or_default();
        *slot = add(*slot, amount)?;
        Ok(())
    }
}

impl ReferralGraph for MemoryHost {
    fn referrer_of(&self, account: &Address) -> Address {
        self.referrers.get(account).copied().unwrap_or(*account)
    }

    fn qualifying_referral_count(&self, account: &Address) -> u32 {
        self.referees.get(account).copied().unwrap_or(0)
    }
}

impl TokenTransfer for MemoryHost {
    fn transfer(&mut self, to: Address, amount: U256) -> Result<()> {
        self.accepts(&to)?;
        if amount > self.held_tokens {
            return Err(SaleError::ExceedsAvailable {
                requested: amount,
                available: self.held_tokens,
            });
        }
        Self::credit(&mut self.asset_balances, to, amount)?;
        self.held_tokens -= amount;
        Ok(())
    }
}

impl AssetLedger for MemoryHost {
    fn is_whitelisted(&self, account: &Address) -> bool {
        self.whitelisted.contains(account)
    }

    fn mint(&mut self, to: Address, amount: U256) -> Result<()> {
        self.accepts(&to)?;
        Self::credit(&mut self.asset_balances, to, amount)
    }
}

impl NativeBank for MemoryHost {
    fn transfer_native(&mut self, to: Address, amount: U256) -> Result<()> {
        self.accepts(&to)?;
        Self::credit(&mut self.native_balances, to, amount)
    }
}

impl Host for MemoryHost {
    /// Replays the batch through `mint` and `transfer_native` on a copy and
    /// keeps the copy only if every effect went through
    fn execute(&mut self, effects: &[Effect]) -> Result<()> {
        let mut staged = self.clone();
        for effect in effects {
            match *effect {
                Effect::Mint { to, amount, .. } => staged.mint(to, amount)?,
                Effect::Pay { to, amount, .. } => staged.transfer_native(to, amount)?,
            }
        }
        staged.history.extend_from_slice(effects);
        *self = staged;
        Ok(())
    }
}
