//! In-memory ledger
//!
//! All tables live behind a single mutex, so every atomic operation is
//! trivially serialized - an in-process stand-in for the transactional
//! store. Used by the test suite and by the gateway in dev mode when no
//! PostgreSQL URL is configured.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::ads::types::{AdFilters, AdStatus, Advertisement, Direction};
use crate::core_types::{AdId, TradeId, TransferId, UserId};
use crate::mining;
use crate::money::{self, CoinAmount};
use crate::rates::currency::CountryCode;
use crate::trade::types::{Trade, TradeStatus};

use super::{
    BalanceContext, BalanceOverview, BalancePartition, ClaimOutcome, CooldownRecord, LedgerError,
    LedgerStore, RewardConfig, TraderStats, TransferReceipt,
};

/// Initial global remaining supply: one million coins.
const GENESIS_SUPPLY: CoinAmount = 1_000_000 * money::COIN_SCALE;

#[derive(Default)]
struct MemState {
    next_user_id: UserId,
    handles: HashMap<UserId, String>,
    balances: HashMap<(UserId, BalanceContext), BalancePartition>,
    ads: HashMap<AdId, Advertisement>,
    trades: BTreeMap<TradeId, Trade>,
    cooldowns: HashMap<UserId, CooldownRecord>,
    reward: Option<RewardConfig>,
    /// Seeded rating aggregates: (sum, count).
    ratings: HashMap<UserId, (f64, u32)>,
    country_rates: HashMap<CountryCode, Vec<(DateTime<Utc>, Decimal)>>,
    transfers: Vec<TransferReceipt>,
    transfers_by_token: HashMap<String, TransferId>,
    global_supply: CoinAmount,
}

pub struct MemLedger {
    state: Mutex<MemState>,
}

impl Default for MemLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemState {
                next_user_id: 1,
                global_supply: GENESIS_SUPPLY,
                ..MemState::default()
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemState> {
        self.state.lock().expect("mem ledger poisoned")
    }

    // ------------------------------------------------------------------
    // Seeding helpers (dev/test only - not part of the store contract)
    // ------------------------------------------------------------------

    pub fn register_user(&self, handle: &str) -> UserId {
        let mut s = self.lock();
        let id = s.next_user_id;
        s.next_user_id += 1;
        s.handles.insert(id, handle.to_string());
        id
    }

    pub fn seed_balance(&self, user: UserId, context: BalanceContext, available: CoinAmount) {
        let mut s = self.lock();
        s.balances.entry((user, context)).or_default().available = available;
    }

    pub fn set_reward_config(&self, config: RewardConfig) {
        self.lock().reward = Some(config);
    }

    /// Insert an already-completed trade between two users, for seeding
    /// trade-count aggregates.
    pub fn seed_completed_trade(&self, buyer: UserId, seller: UserId, now: DateTime<Utc>) {
        let mut s = self.lock();
        let trade = Trade {
            id: TradeId::new(),
            ad_id: uuid::Uuid::new_v4(),
            buyer,
            seller,
            amount: money::MIN_TRADE_AMOUNT,
            total_price: Decimal::ZERO,
            method: None,
            status: TradeStatus::Completed,
            created_at: now,
        };
        s.trades.insert(trade.id, trade);
    }

    pub fn seed_rating(&self, user: UserId, rating: f64) {
        let mut s = self.lock();
        let entry = s.ratings.entry(user).or_insert((0.0, 0));
        entry.0 += rating;
        entry.1 += 1;
    }
}

fn partition(s: &mut MemState, user: UserId, context: BalanceContext) -> &mut BalancePartition {
    s.balances.entry((user, context)).or_default()
}

#[async_trait]
impl LedgerStore for MemLedger {
    async fn create_trade_atomic(
        &self,
        ad_id: AdId,
        caller: UserId,
        amount: CoinAmount,
        now: DateTime<Utc>,
    ) -> Result<Trade, LedgerError> {
        let mut s = self.lock();
        let ad = s.ads.get_mut(&ad_id).ok_or(LedgerError::AdNotFound(ad_id))?;

        if !ad.is_open(now) {
            return Err(LedgerError::AdNotActive(ad_id));
        }
        if amount > ad.remaining_amount {
            return Err(LedgerError::InsufficientRemaining {
                remaining: ad.remaining_amount,
                requested: amount,
            });
        }

        ad.remaining_amount -= amount;
        if ad.remaining_amount == 0 {
            ad.status = AdStatus::Exhausted;
        }

        // For a sell ad the poster is the seller; for a buy ad the poster
        // is the buyer and the responding caller sells.
        let (buyer, seller) = match ad.direction {
            Direction::Sell => (caller, ad.owner),
            Direction::Buy => (ad.owner, caller),
        };

        let trade = Trade {
            id: TradeId::new(),
            ad_id,
            buyer,
            seller,
            amount,
            total_price: money::total_price(amount, ad.unit_price),
            method: None,
            status: TradeStatus::Pending,
            created_at: now,
        };
        s.trades.insert(trade.id, trade.clone());
        Ok(trade)
    }

    async fn claim_mining_reward_atomic(
        &self,
        user: UserId,
        now: DateTime<Utc>,
    ) -> Result<ClaimOutcome, LedgerError> {
        let mut s = self.lock();

        // Same pure rule the status check uses.
        let status = mining::eligibility(s.cooldowns.get(&user), now);
        if let mining::MiningStatus::Cooling { remaining_secs } = status {
            return Err(LedgerError::CooldownActive { remaining_secs });
        }

        let amount = s.reward.unwrap_or_default().reward_amount;
        let record = mining::cooldown_after_claim(now);
        s.cooldowns.insert(user, record);
        partition(&mut s, user, BalanceContext::General).available += amount;

        Ok(ClaimOutcome {
            amount,
            next_eligible_at: record.next_eligible_at,
        })
    }

    async fn transfer_balance_atomic(
        &self,
        sender: UserId,
        recipient: UserId,
        amount: CoinAmount,
        token: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<TransferReceipt, LedgerError> {
        let mut s = self.lock();

        if let Some(token) = token
            && let Some(id) = s.transfers_by_token.get(token).copied()
        {
            let existing = s
                .transfers
                .iter()
                .find(|r| r.id == id)
                .cloned()
                .ok_or_else(|| LedgerError::Internal("dangling transfer token".into()))?;
            return Ok(existing);
        }

        let sender_part = partition(&mut s, sender, BalanceContext::General);
        if sender_part.available < amount {
            return Err(LedgerError::InsufficientBalance {
                available: sender_part.available,
                requested: amount,
            });
        }
        sender_part.available -= amount;
        partition(&mut s, recipient, BalanceContext::General).available += amount;

        let receipt = TransferReceipt {
            id: TransferId::new(),
            sender,
            recipient,
            amount,
            created_at: now,
        };
        if let Some(token) = token {
            s.transfers_by_token.insert(token.to_string(), receipt.id);
        }
        s.transfers.push(receipt.clone());
        Ok(receipt)
    }

    async fn deduct_ad_collateral_atomic(
        &self,
        user: UserId,
        amount: CoinAmount,
    ) -> Result<(), LedgerError> {
        let mut s = self.lock();
        let general = partition(&mut s, user, BalanceContext::General);
        if general.available < amount {
            return Err(LedgerError::InsufficientBalance {
                available: general.available,
                requested: amount,
            });
        }
        general.available -= amount;
        // Collateral is held against the ad, not destroyed.
        partition(&mut s, user, BalanceContext::Escrow).locked += amount;
        Ok(())
    }

    async fn decrement_global_supply(&self, amount: CoinAmount) -> Result<(), LedgerError> {
        let mut s = self.lock();
        if s.global_supply < amount {
            return Err(LedgerError::Internal("global supply exhausted".into()));
        }
        s.global_supply -= amount;
        Ok(())
    }

    async fn insert_ad(&self, ad: &Advertisement) -> Result<(), LedgerError> {
        self.lock().ads.insert(ad.id, ad.clone());
        Ok(())
    }

    async fn delete_ad(&self, ad_id: AdId) -> Result<(), LedgerError> {
        self.lock().ads.remove(&ad_id);
        Ok(())
    }

    async fn cancel_ad(&self, ad_id: AdId, owner: UserId) -> Result<(), LedgerError> {
        let mut s = self.lock();
        let ad = s.ads.get_mut(&ad_id).ok_or(LedgerError::AdNotFound(ad_id))?;
        if ad.owner != owner {
            return Err(LedgerError::NotAdOwner(ad_id));
        }
        if ad.status != AdStatus::Active {
            return Err(LedgerError::AdNotActive(ad_id));
        }
        ad.status = AdStatus::Cancelled;
        Ok(())
    }

    async fn record_country_rate(
        &self,
        country: CountryCode,
        price: Decimal,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        self.lock()
            .country_rates
            .entry(country)
            .or_default()
            .push((now, price));
        Ok(())
    }

    async fn get_ad(&self, ad_id: AdId) -> Result<Option<Advertisement>, LedgerError> {
        Ok(self.lock().ads.get(&ad_id).cloned())
    }

    async fn list_open_ads(
        &self,
        direction: Direction,
        filters: &AdFilters,
        now: DateTime<Utc>,
    ) -> Result<Vec<Advertisement>, LedgerError> {
        let s = self.lock();
        let mut ads: Vec<Advertisement> = s
            .ads
            .values()
            .filter(|ad| ad.direction == direction && ad.is_open(now) && filters.matches(ad))
            .cloned()
            .collect();
        ads.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(ads)
    }

    async fn list_ads_by_owner(&self, owner: UserId) -> Result<Vec<Advertisement>, LedgerError> {
        let s = self.lock();
        let mut ads: Vec<Advertisement> = s
            .ads
            .values()
            .filter(|ad| ad.owner == owner)
            .cloned()
            .collect();
        ads.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(ads)
    }

    async fn list_trades_for_user(&self, user: UserId) -> Result<Vec<Trade>, LedgerError> {
        let s = self.lock();
        let mut trades: Vec<Trade> = s
            .trades
            .values()
            .filter(|t| t.buyer == user || t.seller == user)
            .cloned()
            .collect();
        trades.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(trades)
    }

    async fn get_trade(&self, trade_id: TradeId) -> Result<Option<Trade>, LedgerError> {
        Ok(self.lock().trades.get(&trade_id).cloned())
    }

    async fn available_balance(
        &self,
        user: UserId,
        context: BalanceContext,
    ) -> Result<CoinAmount, LedgerError> {
        Ok(self
            .lock()
            .balances
            .get(&(user, context))
            .map(|p| p.available)
            .unwrap_or(0))
    }

    async fn balance_overview(&self, user: UserId) -> Result<BalanceOverview, LedgerError> {
        let s = self.lock();
        Ok(BalanceOverview {
            general: s
                .balances
                .get(&(user, BalanceContext::General))
                .copied()
                .unwrap_or_default(),
            escrow: s
                .balances
                .get(&(user, BalanceContext::Escrow))
                .copied()
                .unwrap_or_default(),
        })
    }

    async fn cooldown_record(&self, user: UserId) -> Result<Option<CooldownRecord>, LedgerError> {
        Ok(self.lock().cooldowns.get(&user).copied())
    }

    async fn reward_config(&self) -> Result<RewardConfig, LedgerError> {
        Ok(self.lock().reward.unwrap_or_default())
    }

    async fn trader_stats(
        &self,
        users: &[UserId],
    ) -> Result<HashMap<UserId, TraderStats>, LedgerError> {
        let s = self.lock();
        let mut out = HashMap::with_capacity(users.len());
        for &user in users {
            let mut total = 0u32;
            let mut completed = 0u32;
            for t in s.trades.values() {
                if t.buyer == user || t.seller == user {
                    total += 1;
                    if t.status == TradeStatus::Completed {
                        completed += 1;
                    }
                }
            }
            let (rating_sum, rating_count) = s.ratings.get(&user).copied().unwrap_or((0.0, 0));
            out.insert(
                user,
                TraderStats {
                    total_trades: total,
                    completed_trades: completed,
                    completion_rate: if total > 0 {
                        completed as f64 / total as f64 * 100.0
                    } else {
                        0.0
                    },
                    average_rating: if rating_count > 0 {
                        rating_sum / rating_count as f64
                    } else {
                        0.0
                    },
                    rating_count,
                },
            );
        }
        Ok(out)
    }

    async fn completed_trade_count(&self, user: UserId) -> Result<u32, LedgerError> {
        let s = self.lock();
        Ok(s.trades
            .values()
            .filter(|t| {
                (t.buyer == user || t.seller == user) && t.status == TradeStatus::Completed
            })
            .count() as u32)
    }

    async fn resolve_handle(&self, handle: &str) -> Result<Option<UserId>, LedgerError> {
        let s = self.lock();
        Ok(s.handles
            .iter()
            .find(|(_, h)| h.eq_ignore_ascii_case(handle))
            .map(|(id, _)| *id))
    }

    async fn latest_country_rate(
        &self,
        country: CountryCode,
    ) -> Result<Option<Decimal>, LedgerError> {
        let s = self.lock();
        Ok(s.country_rates
            .get(&country)
            .and_then(|rows| rows.last())
            .map(|(_, price)| *price))
    }

    async fn global_supply_remaining(&self) -> Result<CoinAmount, LedgerError> {
        Ok(self.lock().global_supply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_transfer_is_all_or_nothing() {
        let ledger = MemLedger::new();
        let a = ledger.register_user("alice");
        let b = ledger.register_user("bob");
        ledger.seed_balance(a, BalanceContext::General, 500);

        let err = ledger
            .transfer_balance_atomic(a, b, 1000, None, now())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));

        // Nothing moved.
        assert_eq!(
            ledger.available_balance(a, BalanceContext::General).await.unwrap(),
            500
        );
        assert_eq!(
            ledger.available_balance(b, BalanceContext::General).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_transfer_token_is_idempotent() {
        let ledger = MemLedger::new();
        let a = ledger.register_user("alice");
        let b = ledger.register_user("bob");
        ledger.seed_balance(a, BalanceContext::General, 5000);

        let r1 = ledger
            .transfer_balance_atomic(a, b, 1000, Some("tok-1"), now())
            .await
            .unwrap();
        let r2 = ledger
            .transfer_balance_atomic(a, b, 1000, Some("tok-1"), now())
            .await
            .unwrap();

        assert_eq!(r1.id, r2.id);
        // Applied exactly once.
        assert_eq!(
            ledger.available_balance(a, BalanceContext::General).await.unwrap(),
            4000
        );
    }

    #[tokio::test]
    async fn test_collateral_moves_to_escrow_lock() {
        let ledger = MemLedger::new();
        let a = ledger.register_user("alice");
        ledger.seed_balance(a, BalanceContext::General, 2000);

        ledger.deduct_ad_collateral_atomic(a, 1000).await.unwrap();

        let overview = ledger.balance_overview(a).await.unwrap();
        assert_eq!(overview.general.available, 1000);
        assert_eq!(overview.escrow.locked, 1000);
    }

    #[tokio::test]
    async fn test_claim_respects_cooldown_cas() {
        let ledger = MemLedger::new();
        let a = ledger.register_user("alice");

        let first = ledger.claim_mining_reward_atomic(a, now()).await.unwrap();
        assert_eq!(first.amount, money::DEFAULT_MINING_REWARD);

        let err = ledger
            .claim_mining_reward_atomic(a, now())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::CooldownActive { .. }));
    }

    #[tokio::test]
    async fn test_resolve_handle_case_insensitive() {
        let ledger = MemLedger::new();
        let a = ledger.register_user("Alice");
        assert_eq!(ledger.resolve_handle("alice").await.unwrap(), Some(a));
        assert_eq!(ledger.resolve_handle("ALICE").await.unwrap(), Some(a));
        assert_eq!(ledger.resolve_handle("carol").await.unwrap(), None);
    }
}
