//! PostgreSQL ledger
//!
//! Atomic operations run inside a transaction and serialize on the row
//! they guard with `SELECT ... FOR UPDATE` (the advertisement for trade
//! creation, the sender balance for transfers). The mining claim uses a
//! conditional upsert so two concurrent claims cannot both pass the
//! cooldown gate.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};

use crate::ads::types::{AdFilters, AdStatus, Advertisement, Direction};
use crate::core_types::{AdId, TradeId, TransferId, UserId};
use crate::mining;
use crate::money::{self, CoinAmount};
use crate::rates::currency::CountryCode;
use crate::trade::types::{Trade, TradeStatus};

use super::schema;
use super::{
    BalanceContext, BalanceOverview, BalancePartition, ClaimOutcome, CooldownRecord, LedgerError,
    LedgerStore, RewardConfig, TraderStats, TransferReceipt,
};

pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    /// Connect, pool and bootstrap the schema.
    pub async fn connect(database_url: &str) -> Result<Self, LedgerError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;
        schema::ensure_schema(&pool).await?;
        tracing::info!("PostgreSQL ledger connected");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_ad(row: &PgRow) -> Result<Advertisement, LedgerError> {
        let direction = Direction::parse(row.get::<&str, _>("direction"))
            .ok_or_else(|| LedgerError::Internal("invalid ad direction".into()))?;
        let status = AdStatus::parse(row.get::<&str, _>("status"))
            .ok_or_else(|| LedgerError::Internal("invalid ad status".into()))?;
        let country: CountryCode = row
            .get::<&str, _>("country")
            .parse()
            .map_err(|_| LedgerError::Internal("invalid ad country".into()))?;
        let methods = serde_json::from_str(row.get::<&str, _>("methods"))
            .map_err(|e| LedgerError::Internal(format!("invalid methods payload: {e}")))?;

        Ok(Advertisement {
            id: row.get("id"),
            owner: row.get::<i64, _>("owner_id") as UserId,
            direction,
            country,
            total_amount: row.get::<i64, _>("total_amount") as CoinAmount,
            remaining_amount: row.get::<i64, _>("remaining_amount") as CoinAmount,
            min_amount: row.get::<i64, _>("min_amount") as CoinAmount,
            max_amount: row.get::<i64, _>("max_amount") as CoinAmount,
            unit_price: row.get("unit_price"),
            methods,
            terms: row.get("terms"),
            created_at: row.get("created_at"),
            expires_at: row.get("expires_at"),
            status,
        })
    }

    fn row_to_trade(row: &PgRow) -> Result<Trade, LedgerError> {
        let id: TradeId = row
            .get::<&str, _>("id")
            .parse()
            .map_err(|_| LedgerError::Internal("invalid trade id".into()))?;
        let status = TradeStatus::parse(row.get::<&str, _>("status"))
            .ok_or_else(|| LedgerError::Internal("invalid trade status".into()))?;
        let method = match row.get::<Option<&str>, _>("method") {
            Some(raw) => Some(
                serde_json::from_str(raw)
                    .map_err(|e| LedgerError::Internal(format!("invalid method payload: {e}")))?,
            ),
            None => None,
        };

        Ok(Trade {
            id,
            ad_id: row.get("ad_id"),
            buyer: row.get::<i64, _>("buyer_id") as UserId,
            seller: row.get::<i64, _>("seller_id") as UserId,
            amount: row.get::<i64, _>("amount") as CoinAmount,
            total_price: row.get("total_price"),
            method,
            status,
            created_at: row.get("created_at"),
        })
    }

    fn row_to_receipt(row: &PgRow) -> Result<TransferReceipt, LedgerError> {
        let id: TransferId = row
            .get::<&str, _>("id")
            .parse()
            .map_err(|_| LedgerError::Internal("invalid transfer id".into()))?;
        Ok(TransferReceipt {
            id,
            sender: row.get::<i64, _>("sender_id") as UserId,
            recipient: row.get::<i64, _>("recipient_id") as UserId,
            amount: row.get::<i64, _>("amount") as CoinAmount,
            created_at: row.get("created_at"),
        })
    }
}

#[async_trait]
impl LedgerStore for PgLedger {
    async fn create_trade_atomic(
        &self,
        ad_id: AdId,
        caller: UserId,
        amount: CoinAmount,
        now: DateTime<Utc>,
    ) -> Result<Trade, LedgerError> {
        let mut tx = self.pool.begin().await?;

        // Serialize on the advertisement row; this closes the window
        // between the caller's read and this commit.
        let row = sqlx::query("SELECT * FROM ads_tb WHERE id = $1 FOR UPDATE")
            .bind(ad_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(LedgerError::AdNotFound(ad_id))?;
        let ad = Self::row_to_ad(&row)?;

        if !ad.is_open(now) {
            return Err(LedgerError::AdNotActive(ad_id));
        }
        if amount > ad.remaining_amount {
            return Err(LedgerError::InsufficientRemaining {
                remaining: ad.remaining_amount,
                requested: amount,
            });
        }

        let remaining = ad.remaining_amount - amount;
        let status = if remaining == 0 {
            AdStatus::Exhausted
        } else {
            ad.status
        };
        sqlx::query("UPDATE ads_tb SET remaining_amount = $1, status = $2 WHERE id = $3")
            .bind(remaining as i64)
            .bind(status.as_str())
            .bind(ad_id)
            .execute(&mut *tx)
            .await?;

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

        sqlx::query(
            r#"
            INSERT INTO trades_tb (id, ad_id, buyer_id, seller_id, amount, total_price, method, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, NULL, $7, $8)
            "#,
        )
        .bind(trade.id.to_string())
        .bind(trade.ad_id)
        .bind(trade.buyer as i64)
        .bind(trade.seller as i64)
        .bind(trade.amount as i64)
        .bind(trade.total_price)
        .bind(trade.status.as_str())
        .bind(trade.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(trade)
    }

    async fn claim_mining_reward_atomic(
        &self,
        user: UserId,
        now: DateTime<Utc>,
    ) -> Result<ClaimOutcome, LedgerError> {
        let mut tx = self.pool.begin().await?;

        let record = mining::cooldown_after_claim(now);

        // Conditional check-and-set: the update only lands when the
        // stored next_eligible_at has been reached. rows_affected == 0
        // means another claim inside the window won the race (or the
        // cooldown simply has not elapsed).
        let result = sqlx::query(
            r#"
            INSERT INTO mining_cooldowns_tb (user_id, last_claim_at, next_eligible_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE
            SET last_claim_at = EXCLUDED.last_claim_at,
                next_eligible_at = EXCLUDED.next_eligible_at
            WHERE mining_cooldowns_tb.next_eligible_at <= EXCLUDED.last_claim_at
            "#,
        )
        .bind(user as i64)
        .bind(record.last_claim_at)
        .bind(record.next_eligible_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            let row = sqlx::query(
                "SELECT last_claim_at, next_eligible_at FROM mining_cooldowns_tb WHERE user_id = $1",
            )
            .bind(user as i64)
            .fetch_one(&mut *tx)
            .await?;
            let current = CooldownRecord {
                last_claim_at: row.get("last_claim_at"),
                next_eligible_at: row.get("next_eligible_at"),
            };
            return Err(LedgerError::CooldownActive {
                remaining_secs: mining::eligibility(Some(&current), now).remaining_secs(),
            });
        }

        let amount: CoinAmount =
            sqlx::query_scalar::<_, i64>("SELECT reward_amount FROM reward_config_tb WHERE id = 1")
                .fetch_optional(&mut *tx)
                .await?
                .map(|v| v as CoinAmount)
                .unwrap_or(money::DEFAULT_MINING_REWARD);

        sqlx::query(
            r#"
            INSERT INTO balances_tb (user_id, context, available, locked)
            VALUES ($1, $2, $3, 0)
            ON CONFLICT (user_id, context)
            DO UPDATE SET available = balances_tb.available + EXCLUDED.available
            "#,
        )
        .bind(user as i64)
        .bind(BalanceContext::General.as_str())
        .bind(amount as i64)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
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
        if let Some(token) = token {
            let existing = sqlx::query("SELECT * FROM transfers_tb WHERE token = $1")
                .bind(token)
                .fetch_optional(&self.pool)
                .await?;
            if let Some(row) = existing {
                return Self::row_to_receipt(&row);
            }
        }

        let mut tx = self.pool.begin().await?;

        let available: i64 = sqlx::query_scalar(
            r#"
            SELECT available FROM balances_tb
            WHERE user_id = $1 AND context = $2
            FOR UPDATE
            "#,
        )
        .bind(sender as i64)
        .bind(BalanceContext::General.as_str())
        .fetch_optional(&mut *tx)
        .await?
        .unwrap_or(0);

        if (available as CoinAmount) < amount {
            return Err(LedgerError::InsufficientBalance {
                available: available as CoinAmount,
                requested: amount,
            });
        }

        sqlx::query(
            "UPDATE balances_tb SET available = available - $1 WHERE user_id = $2 AND context = $3",
        )
        .bind(amount as i64)
        .bind(sender as i64)
        .bind(BalanceContext::General.as_str())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO balances_tb (user_id, context, available, locked)
            VALUES ($1, $2, $3, 0)
            ON CONFLICT (user_id, context)
            DO UPDATE SET available = balances_tb.available + EXCLUDED.available
            "#,
        )
        .bind(recipient as i64)
        .bind(BalanceContext::General.as_str())
        .bind(amount as i64)
        .execute(&mut *tx)
        .await?;

        let receipt = TransferReceipt {
            id: TransferId::new(),
            sender,
            recipient,
            amount,
            created_at: now,
        };
        sqlx::query(
            r#"
            INSERT INTO transfers_tb (id, token, sender_id, recipient_id, amount, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(receipt.id.to_string())
        .bind(token)
        .bind(receipt.sender as i64)
        .bind(receipt.recipient as i64)
        .bind(receipt.amount as i64)
        .bind(receipt.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(receipt)
    }

    async fn deduct_ad_collateral_atomic(
        &self,
        user: UserId,
        amount: CoinAmount,
    ) -> Result<(), LedgerError> {
        let mut tx = self.pool.begin().await?;

        let available: i64 = sqlx::query_scalar(
            r#"
            SELECT available FROM balances_tb
            WHERE user_id = $1 AND context = $2
            FOR UPDATE
            "#,
        )
        .bind(user as i64)
        .bind(BalanceContext::General.as_str())
        .fetch_optional(&mut *tx)
        .await?
        .unwrap_or(0);

        if (available as CoinAmount) < amount {
            return Err(LedgerError::InsufficientBalance {
                available: available as CoinAmount,
                requested: amount,
            });
        }

        sqlx::query(
            "UPDATE balances_tb SET available = available - $1 WHERE user_id = $2 AND context = $3",
        )
        .bind(amount as i64)
        .bind(user as i64)
        .bind(BalanceContext::General.as_str())
        .execute(&mut *tx)
        .await?;

        // Held against the ad in escrow, not destroyed.
        sqlx::query(
            r#"
            INSERT INTO balances_tb (user_id, context, available, locked)
            VALUES ($1, $2, 0, $3)
            ON CONFLICT (user_id, context)
            DO UPDATE SET locked = balances_tb.locked + EXCLUDED.locked
            "#,
        )
        .bind(user as i64)
        .bind(BalanceContext::Escrow.as_str())
        .bind(amount as i64)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn decrement_global_supply(&self, amount: CoinAmount) -> Result<(), LedgerError> {
        let result = sqlx::query("UPDATE supply_tb SET remaining = remaining - $1 WHERE id = 1 AND remaining >= $1")
            .bind(amount as i64)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(LedgerError::Internal("global supply row missing or exhausted".into()));
        }
        Ok(())
    }

    async fn insert_ad(&self, ad: &Advertisement) -> Result<(), LedgerError> {
        let methods = serde_json::to_string(&ad.methods)
            .map_err(|e| LedgerError::Internal(format!("serialize methods: {e}")))?;
        sqlx::query(
            r#"
            INSERT INTO ads_tb
                (id, owner_id, direction, country, total_amount, remaining_amount,
                 min_amount, max_amount, unit_price, methods, terms, created_at, expires_at, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(ad.id)
        .bind(ad.owner as i64)
        .bind(ad.direction.as_str())
        .bind(ad.country.as_str())
        .bind(ad.total_amount as i64)
        .bind(ad.remaining_amount as i64)
        .bind(ad.min_amount as i64)
        .bind(ad.max_amount as i64)
        .bind(ad.unit_price)
        .bind(methods)
        .bind(&ad.terms)
        .bind(ad.created_at)
        .bind(ad.expires_at)
        .bind(ad.status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_ad(&self, ad_id: AdId) -> Result<(), LedgerError> {
        sqlx::query("DELETE FROM ads_tb WHERE id = $1")
            .bind(ad_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn cancel_ad(&self, ad_id: AdId, owner: UserId) -> Result<(), LedgerError> {
        let result = sqlx::query(
            "UPDATE ads_tb SET status = 'cancelled' WHERE id = $1 AND owner_id = $2 AND status = 'active'",
        )
        .bind(ad_id)
        .bind(owner as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Distinguish the failure for a precise error message.
            let ad = self.get_ad(ad_id).await?.ok_or(LedgerError::AdNotFound(ad_id))?;
            if ad.owner != owner {
                return Err(LedgerError::NotAdOwner(ad_id));
            }
            return Err(LedgerError::AdNotActive(ad_id));
        }
        Ok(())
    }

    async fn record_country_rate(
        &self,
        country: CountryCode,
        price: Decimal,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        sqlx::query(
            "INSERT INTO country_rates_tb (country, currency, price, recorded_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(country.as_str())
        .bind(country.currency().as_str())
        .bind(price)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_ad(&self, ad_id: AdId) -> Result<Option<Advertisement>, LedgerError> {
        let row = sqlx::query("SELECT * FROM ads_tb WHERE id = $1")
            .bind(ad_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| Self::row_to_ad(&r)).transpose()
    }

    async fn list_open_ads(
        &self,
        direction: Direction,
        filters: &AdFilters,
        now: DateTime<Utc>,
    ) -> Result<Vec<Advertisement>, LedgerError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM ads_tb
            WHERE direction = $1 AND status = 'active' AND expires_at > $2 AND remaining_amount > 0
            ORDER BY created_at DESC
            "#,
        )
        .bind(direction.as_str())
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        let mut ads = Vec::with_capacity(rows.len());
        for row in rows {
            let ad = Self::row_to_ad(&row)?;
            if filters.matches(&ad) {
                ads.push(ad);
            }
        }
        Ok(ads)
    }

    async fn list_ads_by_owner(&self, owner: UserId) -> Result<Vec<Advertisement>, LedgerError> {
        let rows = sqlx::query("SELECT * FROM ads_tb WHERE owner_id = $1 ORDER BY created_at DESC")
            .bind(owner as i64)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_ad).collect()
    }

    async fn list_trades_for_user(&self, user: UserId) -> Result<Vec<Trade>, LedgerError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM trades_tb
            WHERE buyer_id = $1 OR seller_id = $1
            ORDER BY id DESC
            "#,
        )
        .bind(user as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_trade).collect()
    }

    async fn get_trade(&self, trade_id: TradeId) -> Result<Option<Trade>, LedgerError> {
        let row = sqlx::query("SELECT * FROM trades_tb WHERE id = $1")
            .bind(trade_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| Self::row_to_trade(&r)).transpose()
    }

    async fn available_balance(
        &self,
        user: UserId,
        context: BalanceContext,
    ) -> Result<CoinAmount, LedgerError> {
        let available: Option<i64> = sqlx::query_scalar(
            "SELECT available FROM balances_tb WHERE user_id = $1 AND context = $2",
        )
        .bind(user as i64)
        .bind(context.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(available.unwrap_or(0) as CoinAmount)
    }

    async fn balance_overview(&self, user: UserId) -> Result<BalanceOverview, LedgerError> {
        let rows = sqlx::query(
            "SELECT context, available, locked FROM balances_tb WHERE user_id = $1",
        )
        .bind(user as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut overview = BalanceOverview::default();
        for row in rows {
            let partition = BalancePartition {
                available: row.get::<i64, _>("available") as CoinAmount,
                locked: row.get::<i64, _>("locked") as CoinAmount,
            };
            match row.get::<&str, _>("context") {
                "general" => overview.general = partition,
                "escrow" => overview.escrow = partition,
                other => {
                    return Err(LedgerError::Internal(format!(
                        "unknown balance context: {other}"
                    )));
                }
            }
        }
        Ok(overview)
    }

    async fn cooldown_record(&self, user: UserId) -> Result<Option<CooldownRecord>, LedgerError> {
        let row = sqlx::query(
            "SELECT last_claim_at, next_eligible_at FROM mining_cooldowns_tb WHERE user_id = $1",
        )
        .bind(user as i64)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| CooldownRecord {
            last_claim_at: r.get("last_claim_at"),
            next_eligible_at: r.get("next_eligible_at"),
        }))
    }

    async fn reward_config(&self) -> Result<RewardConfig, LedgerError> {
        let amount: Option<i64> =
            sqlx::query_scalar("SELECT reward_amount FROM reward_config_tb WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;
        Ok(amount
            .map(|v| RewardConfig {
                reward_amount: v as CoinAmount,
            })
            .unwrap_or_default())
    }

    async fn trader_stats(
        &self,
        users: &[UserId],
    ) -> Result<HashMap<UserId, TraderStats>, LedgerError> {
        let ids: Vec<i64> = users.iter().map(|&u| u as i64).collect();
        let mut out: HashMap<UserId, TraderStats> =
            users.iter().map(|&u| (u, TraderStats::default())).collect();

        let trade_rows = sqlx::query(
            r#"
            SELECT buyer_id, seller_id, status FROM trades_tb
            WHERE buyer_id = ANY($1) OR seller_id = ANY($1)
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        for row in trade_rows {
            let completed = row.get::<&str, _>("status") == TradeStatus::Completed.as_str();
            for col in ["buyer_id", "seller_id"] {
                let party = row.get::<i64, _>(col) as UserId;
                if let Some(stats) = out.get_mut(&party) {
                    stats.total_trades += 1;
                    if completed {
                        stats.completed_trades += 1;
                    }
                }
            }
        }

        let rating_rows = sqlx::query(
            r#"
            SELECT rated_user_id, AVG(rating) AS avg_rating, COUNT(*) AS rating_count
            FROM ratings_tb
            WHERE rated_user_id = ANY($1)
            GROUP BY rated_user_id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        for row in rating_rows {
            let user = row.get::<i64, _>("rated_user_id") as UserId;
            if let Some(stats) = out.get_mut(&user) {
                stats.average_rating = row.get::<f64, _>("avg_rating");
                stats.rating_count = row.get::<i64, _>("rating_count") as u32;
            }
        }

        for stats in out.values_mut() {
            if stats.total_trades > 0 {
                stats.completion_rate =
                    stats.completed_trades as f64 / stats.total_trades as f64 * 100.0;
            }
        }
        Ok(out)
    }

    async fn completed_trade_count(&self, user: UserId) -> Result<u32, LedgerError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM trades_tb
            WHERE (buyer_id = $1 OR seller_id = $1) AND status = 'completed'
            "#,
        )
        .bind(user as i64)
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u32)
    }

    async fn resolve_handle(&self, handle: &str) -> Result<Option<UserId>, LedgerError> {
        let id: Option<i64> =
            sqlx::query_scalar("SELECT user_id FROM users_tb WHERE LOWER(handle) = LOWER($1)")
                .bind(handle)
                .fetch_optional(&self.pool)
                .await?;
        Ok(id.map(|v| v as UserId))
    }

    async fn latest_country_rate(
        &self,
        country: CountryCode,
    ) -> Result<Option<Decimal>, LedgerError> {
        let price: Option<Decimal> = sqlx::query_scalar(
            r#"
            SELECT price FROM country_rates_tb
            WHERE country = $1
            ORDER BY recorded_at DESC
            LIMIT 1
            "#,
        )
        .bind(country.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(price)
    }

    async fn global_supply_remaining(&self) -> Result<CoinAmount, LedgerError> {
        let remaining: Option<i64> =
            sqlx::query_scalar("SELECT remaining FROM supply_tb WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;
        Ok(remaining.unwrap_or(0) as CoinAmount)
    }
}
