//! Owner, auditors, pause flag and sale parameters set at runtime

use std::collections::BTreeSet;

use alloy_primitives::{Address, U256};
use log::info;
use serde::Serialize;

use crate::error::{Result, SaleError};

/// Set of addresses holding a role
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RoleSet {
    members: BTreeSet<Address>,
}

impl RoleSet {
    /// Returns false if already a member
    pub fn add(&mut self, account: Address) -> bool {
        self.members.insert(account)
    }

    /// Returns false if not a member
    pub fn remove(&mut self, account: &Address) -> bool {
        self.members.remove(account)
    }

    pub fn has(&self, account: &Address) -> bool {
        self.members.contains(account)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Address> {
        self.members.iter()
    }
}

/// Administrative state. Every mutator checks its caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Governance {
    owner: Address,
    pending_owner: Option<Address>,
    auditors: RoleSet,
    paused: bool,
    /// Unix seconds; purchases before this are rejected
    start_time: u64,
    /// Micro-dollars per whole currency unit; zero means unset
    exchange_rate: U256,
    team_recipient: Address,
}

impl Governance {
    pub fn new(owner: Address, team_recipient: Address) -> Result<Self> {
        if owner == Address::ZERO || team_recipient == Address::ZERO {
            return Err(SaleError::InvalidRecipient);
        }
        Ok(Self {
            owner,
            pending_owner: None,
            auditors: RoleSet::default(),
            paused: false,
            start_time: 0,
            exchange_rate: U256::ZERO,
            team_recipient,
        })
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn pending_owner(&self) -> Option<Address> {
        self.pending_owner
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn start_time(&self) -> u64 {
        self.start_time
    }

    pub fn exchange_rate(&self) -> U256 {
        self.exchange_rate
    }

    pub fn team_recipient(&self) -> Address {
        self.team_recipient
    }

    pub fn auditors(&self) -> &RoleSet {
        &self.auditors
    }

    pub fn is_auditor(&self, account: &Address) -> bool {
        self.auditors.has(account)
    }

    pub fn ensure_owner(&self, caller: Address) -> Result<()> {
        if caller != self.owner {
            return Err(SaleError::Unauthorized(caller));
        }
        Ok(())
    }

    // ========================================
    // Ownership (two-phase)
    // ========================================

    /// Replaces any earlier proposal
    pub fn propose_owner(&mut self, caller: Address, candidate: Address) -> Result<()> {
        self.ensure_owner(caller)?;
        if candidate == Address::ZERO {
            return Err(SaleError::InvalidRecipient);
        }
        self.pending_owner = Some(candidate);
        info!("ownership proposed to {}", candidate);
        Ok(())
    }

    pub fn accept_ownership(&mut self, caller: Address) -> Result<()> {
        let pending = self.pending_owner.ok_or(SaleError::NoPendingOwner)?;
        if caller != pending {
            return Err(SaleError::Unauthorized(caller));
        }
        info!("ownership transferred from {} to {}", self.owner, pending);
        self.owner = pending;
        self.pending_owner = None;
        Ok(())
    }

    pub fn cancel_ownership_proposal(&mut self, caller: Address) -> Result<()> {
        self.ensure_owner(caller)?;
        if self.pending_owner.take().is_none() {
            return Err(SaleError::NoPendingOwner);
        }
        Ok(())
    }

    // ========================================
    // Auditors and exchange rate
    // ========================================

    pub fn add_auditor(&mut self, caller: Address, auditor: Address) -> Result<bool> {
        self.ensure_owner(caller)?;
        if auditor == Address::ZERO {
            return Err(SaleError::InvalidRecipient);
        }
        Ok(self.auditors.add(auditor))
    }

    pub fn remove_auditor(&mut self, caller: Address, auditor: &Address) -> Result<bool> {
        self.ensure_owner(caller)?;
        Ok(self.auditors.remove(auditor))
    }

    /// Auditor only; `rate` is micro-dollars per whole currency unit
    pub fn set_exchange_rate(&mut self, caller: Address, rate: U256) -> Result<()> {
        if !self.auditors.has(&caller) {
            return Err(SaleError::Unauthorized(caller));
        }
        if rate.is_zero() {
            return Err(SaleError::RateNotSet);
        }
        self.exchange_rate = rate;
        info!("exchange rate set to {} by {}", rate, caller);
        Ok(())
    }

    // ========================================
    // Sale switches
    // ========================================

    pub fn pause(&mut self, caller: Address) -> Result<()> {
        self.ensure_owner(caller)?;
        self.paused = true;
        info!("sale paused");
        Ok(())
    }

    pub fn unpause(&mut self, caller: Address) -> Result<()> {
        self.ensure_owner(caller)?;
        self.paused = false;
        info!("sale unpaused");
        Ok(())
    }

    pub fn set_start_time(&mut self, caller: Address, start_time: u64) -> Result<()> {
        self.ensure_owner(caller)?;
        self.start_time = start_time;
        Ok(())
    }

    pub fn set_team_recipient(&mut self, caller: Address, recipient: Address) -> Result<()> {
        self.ensure_owner(caller)?;
        if recipient == Address::ZERO {
            return Err(SaleError::InvalidRecipient);
        }
        self.team_recipient = recipient;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::with_last_byte(n)
    }

    fn governance() -> Governance {
        Governance::new(addr(1), addr(2)).unwrap()
    }

    #[test]
    fn test_two_phase_ownership() {
        let mut gov = governance();
        assert_eq!(gov.accept_ownership(addr(5)), Err(SaleError::NoPendingOwner));

        gov.propose_owner(addr(1), addr(5)).unwrap();
        assert_eq!(gov.owner(), addr(1));
        assert_eq!(gov.accept_ownership(addr(6)), Err(SaleError::Unauthorized(addr(6))));

        gov.accept_ownership(addr(5)).unwrap();
        assert_eq!(gov.owner(), addr(5));
        assert_eq!(gov.pending_owner(), None);
        assert_eq!(gov.pause(addr(1)), Err(SaleError::Unauthorized(addr(1))));
    }

    #[test]
    fn test_cancel_proposal() {
        let mut gov = governance();
        gov.propose_owner(addr(1), addr(5)).unwrap();
        gov.cancel_ownership_proposal(addr(1)).unwrap();
        assert_eq!(gov.accept_ownership(addr(5)), Err(SaleError::NoPendingOwner));
        assert_eq!(gov.cancel_ownership_proposal(addr(1)), Err(SaleError::NoPendingOwner));
    }

    #[test]
    fn test_only_auditors_set_rate() {
        let mut gov = governance();
        let rate = U256::from(200_000_000u64);
        assert_eq!(gov.set_exchange_rate(addr(1), rate), Err(SaleError::Unauthorized(addr(1))));

        assert!(gov.add_auditor(addr(1), addr(7)).unwrap());
        assert!(!gov.add_auditor(addr(1), addr(7)).unwrap());
        assert_eq!(gov.set_exchange_rate(addr(7), U256::ZERO), Err(SaleError::RateNotSet));
        gov.set_exchange_rate(addr(7), rate).unwrap();
        assert_eq!(gov.exchange_rate(), rate);

        assert!(gov.remove_auditor(addr(1), &addr(7)).unwrap());
        assert!(!gov.is_auditor(&addr(7)));
        assert!(gov.set_exchange_rate(addr(7), rate).is_err());
    }

    #[test]
    fn test_zero_addresses_rejected() {
        assert_eq!(Governance::new(Address::ZERO, addr(2)), Err(SaleError::InvalidRecipient));
        let mut gov = governance();
        assert_eq!(gov.set_team_recipient(addr(1), Address::ZERO), Err(SaleError::InvalidRecipient));
        assert_eq!(gov.propose_owner(addr(1), Address::ZERO), Err(SaleError::InvalidRecipient));
    }
}
