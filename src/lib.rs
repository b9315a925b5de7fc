//! Staged, capped sale settlement engine
//!
//! Converts native-currency payments into units of an issued asset at a price
//! that rises stage by stage. Each purchase may span several stages, pays a
//! volume bonus, mirrors the allocation for whitelisted buyers and pays a
//! fifteen-level referral commission, escrowing the share of unqualified
//! levels. Every currency unit sold ends up in exactly one bucket: referral,
//! top-sales, pending or team.
//!
//! The engine is a single-writer state machine: every mutating call takes
//! `&mut SaleEngine` and either commits completely or leaves the state as it
//! was.

#![forbid(unsafe_code)]

pub mod accounting;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod governance;
pub mod host;
pub mod journal;
pub mod state;
pub mod views;

pub use accounting::FundSummary;
pub use config::{SaleConfig, CURRENCY_UNIT};
pub use engine::SaleEngine;
pub use error::{NotOpenReason, Result, SaleError};
pub use events::{PurchaseReceipt, SaleEvent};
pub use governance::{Governance, RoleSet};
pub use host::{Allocation, AssetLedger, Effect, Host, MemoryHost, NativeBank, Payout, TokenTransfer};
pub use state::{AccountRecord, Counters, Phase, SaleState, SeasonAccounts, SeasonRecord, StageRecord};
pub use views::{SaleStatus, SeasonAccount, SeasonStatus, StageStatus};

pub use sale_model::{Address, CurveParams, ReferralGraph, U256};
