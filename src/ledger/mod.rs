//! Ledger store contract
//!
//! Every balance mutation in the system flows through ONE seam: the
//! [`LedgerStore`] trait. Components validate client-side for
//! responsiveness, but the store re-checks every invariant that touches
//! shared state inside its own transaction and is the final authority -
//! no component computes a balance locally and writes it back.
//!
//! Two implementations:
//! - [`pg::PgLedger`] - PostgreSQL via sqlx, row-serialized with
//!   `SELECT ... FOR UPDATE`.
//! - [`mem::MemLedger`] - in-process tables behind one mutex; the test
//!   and dev backend.

pub mod mem;
pub mod pg;
pub mod schema;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ads::types::{AdFilters, Advertisement, Direction};
use crate::core_types::{AdId, TradeId, TransferId, UserId};
use crate::money::CoinAmount;
use crate::rates::currency::CountryCode;
use crate::trade::types::Trade;

pub use mem::MemLedger;
pub use pg::PgLedger;

/// Typed failures from ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance {
        available: CoinAmount,
        requested: CoinAmount,
    },

    /// Precondition re-check failed at commit: the ad's remaining amount
    /// changed under the caller.
    #[error("requested {requested} exceeds remaining amount {remaining}")]
    InsufficientRemaining {
        remaining: CoinAmount,
        requested: CoinAmount,
    },

    #[error("mining cooldown active: {remaining_secs}s remaining")]
    CooldownActive { remaining_secs: i64 },

    #[error("advertisement {0} not found")]
    AdNotFound(AdId),

    #[error("advertisement {0} is no longer active")]
    AdNotActive(AdId),

    #[error("only the owner of advertisement {0} may modify it")]
    NotAdOwner(AdId),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("{0}")]
    Internal(String),
}

/// Which partition of a user's holdings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceContext {
    /// General holding (mining rewards, transfers land here).
    General,
    /// Marketplace escrow holding.
    Escrow,
}

impl BalanceContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            BalanceContext::General => "general",
            BalanceContext::Escrow => "escrow",
        }
    }
}

/// Available vs locked split of one balance context.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BalancePartition {
    pub available: CoinAmount,
    pub locked: CoinAmount,
}

/// Read-side view of a user's holdings across contexts.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BalanceOverview {
    pub general: BalancePartition,
    pub escrow: BalancePartition,
}

/// Per-user mining cooldown record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CooldownRecord {
    pub last_claim_at: DateTime<Utc>,
    pub next_eligible_at: DateTime<Utc>,
}

/// Mutable reward configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RewardConfig {
    pub reward_amount: CoinAmount,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            reward_amount: crate::money::DEFAULT_MINING_REWARD,
        }
    }
}

/// Outcome of a successful mining claim.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClaimOutcome {
    pub amount: CoinAmount,
    pub next_eligible_at: DateTime<Utc>,
}

/// Aggregate trading statistics for one user, computed store-side.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TraderStats {
    pub total_trades: u32,
    pub completed_trades: u32,
    /// completed / total, in percent.
    pub completion_rate: f64,
    pub average_rating: f64,
    pub rating_count: u32,
}

/// Receipt for a completed user-to-user transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub id: TransferId,
    pub sender: UserId,
    pub recipient: UserId,
    pub amount: CoinAmount,
    pub created_at: DateTime<Utc>,
}

/// The transactional data-service contract.
///
/// Atomic operations serialize on the row they guard (the ad for trade
/// creation, the cooldown record for claims, the sender balance for
/// transfers) and re-validate their precondition inside the transaction.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    // ------------------------------------------------------------------
    // Atomic mutations
    // ------------------------------------------------------------------

    /// Re-validate the ad's remaining amount, decrement it, and create the
    /// trade in `pending` - all in one transaction serialized on the ad.
    /// Exhausts the ad when the remaining amount reaches zero.
    async fn create_trade_atomic(
        &self,
        ad_id: AdId,
        caller: UserId,
        amount: CoinAmount,
        now: DateTime<Utc>,
    ) -> Result<Trade, LedgerError>;

    /// Conditionally claim the mining reward: credit the configured
    /// amount and advance the cooldown, only if `now` has reached
    /// `next_eligible_at` (single check-and-set, no double claims).
    async fn claim_mining_reward_atomic(
        &self,
        user: UserId,
        now: DateTime<Utc>,
    ) -> Result<ClaimOutcome, LedgerError>;

    /// Debit sender, credit recipient, all-or-nothing. A repeated
    /// `token` returns the original receipt instead of re-applying.
    async fn transfer_balance_atomic(
        &self,
        sender: UserId,
        recipient: UserId,
        amount: CoinAmount,
        token: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<TransferReceipt, LedgerError>;

    /// Debit the ad-posting collateral from the user's general available
    /// balance.
    async fn deduct_ad_collateral_atomic(
        &self,
        user: UserId,
        amount: CoinAmount,
    ) -> Result<(), LedgerError>;

    /// Advisory global-supply bookkeeping; callers treat failures as
    /// log-and-continue.
    async fn decrement_global_supply(&self, amount: CoinAmount) -> Result<(), LedgerError>;

    // ------------------------------------------------------------------
    // Ad lifecycle writes
    // ------------------------------------------------------------------

    async fn insert_ad(&self, ad: &Advertisement) -> Result<(), LedgerError>;

    /// Remove an ad outright. Used only to roll back a created ad whose
    /// collateral debit failed.
    async fn delete_ad(&self, ad_id: AdId) -> Result<(), LedgerError>;

    /// Owner-only cancellation of an active ad.
    async fn cancel_ad(&self, ad_id: AdId, owner: UserId) -> Result<(), LedgerError>;

    /// Append a row to the persisted per-country rate table.
    async fn record_country_rate(
        &self,
        country: CountryCode,
        price: Decimal,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError>;

    // ------------------------------------------------------------------
    // Reads (eventually-consistent snapshots)
    // ------------------------------------------------------------------

    async fn get_ad(&self, ad_id: AdId) -> Result<Option<Advertisement>, LedgerError>;

    /// Active, unexpired ads for a direction, filtered, newest-first.
    async fn list_open_ads(
        &self,
        direction: Direction,
        filters: &AdFilters,
        now: DateTime<Utc>,
    ) -> Result<Vec<Advertisement>, LedgerError>;

    /// All of one owner's ads regardless of status, newest-first.
    async fn list_ads_by_owner(&self, owner: UserId) -> Result<Vec<Advertisement>, LedgerError>;

    /// Trades where the user is buyer or seller, newest-first.
    async fn list_trades_for_user(&self, user: UserId) -> Result<Vec<Trade>, LedgerError>;

    async fn get_trade(&self, trade_id: TradeId) -> Result<Option<Trade>, LedgerError>;

    async fn available_balance(
        &self,
        user: UserId,
        context: BalanceContext,
    ) -> Result<CoinAmount, LedgerError>;

    async fn balance_overview(&self, user: UserId) -> Result<BalanceOverview, LedgerError>;

    async fn cooldown_record(&self, user: UserId) -> Result<Option<CooldownRecord>, LedgerError>;

    async fn reward_config(&self) -> Result<RewardConfig, LedgerError>;

    /// Aggregate stats for a batch of users in ONE lookup.
    async fn trader_stats(
        &self,
        users: &[UserId],
    ) -> Result<HashMap<UserId, TraderStats>, LedgerError>;

    /// Authoritative completed-trade count (buyer or seller side).
    async fn completed_trade_count(&self, user: UserId) -> Result<u32, LedgerError>;

    /// Case-insensitive handle → user resolution.
    async fn resolve_handle(&self, handle: &str) -> Result<Option<UserId>, LedgerError>;

    /// Most recent persisted coin price for a country, if any.
    async fn latest_country_rate(
        &self,
        country: CountryCode,
    ) -> Result<Option<Decimal>, LedgerError>;

    async fn global_supply_remaining(&self) -> Result<CoinAmount, LedgerError>;
}
