//! Advertisement lifecycle
//!
//! Posting validation runs client-side for fast feedback, but the only
//! balance mutation (the sell-ad collateral) is delegated to the ledger
//! store after the ad row is durably created; a failed debit rolls the
//! ad back rather than leaving it orphaned.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::clock::SharedClock;
use crate::core_types::{AdId, UserId};
use crate::error::CoreError;
use crate::ledger::{BalanceContext, LedgerStore, TraderStats};
use crate::money::{self, format_coin};
use crate::rates::CountryRateCache;

use super::types::{AdFilters, AdSpec, Advertisement, Direction};

/// Listing entry: the ad plus its poster's aggregate trade statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdListing {
    pub ad: Advertisement,
    pub poster_stats: TraderStats,
}

pub struct AdInventoryManager {
    store: Arc<dyn LedgerStore>,
    rates: Arc<CountryRateCache>,
    clock: SharedClock,
}

impl AdInventoryManager {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        rates: Arc<CountryRateCache>,
        clock: SharedClock,
    ) -> Self {
        Self {
            store,
            rates,
            clock,
        }
    }

    /// Validate and persist a new ad.
    pub async fn post_ad(
        &self,
        owner: UserId,
        spec: AdSpec,
    ) -> Result<Advertisement, CoreError> {
        if spec.total_amount < money::MIN_AD_TOTAL {
            return Err(CoreError::validation(format!(
                "minimum total amount is {} coins",
                format_coin(money::MIN_AD_TOTAL)
            )));
        }
        if spec.min_amount < money::MIN_AD_PER_TRADE {
            return Err(CoreError::validation(format!(
                "per-trade minimum must be at least {} coin",
                format_coin(money::MIN_AD_PER_TRADE)
            )));
        }
        if spec.min_amount > spec.max_amount {
            return Err(CoreError::validation(
                "per-trade minimum cannot exceed the maximum",
            ));
        }
        if spec.max_amount > spec.total_amount {
            return Err(CoreError::validation(
                "per-trade maximum cannot exceed the total amount",
            ));
        }

        let band = self.rates.price_band(spec.country).await;
        if !band.contains(spec.unit_price) {
            return Err(CoreError::validation(format!(
                "price must be between {:.2} and {:.2} {}",
                band.min,
                band.max,
                spec.country.currency()
            )));
        }

        for method in &spec.methods {
            method.validate().map_err(CoreError::Validation)?;
        }
        if spec.direction == Direction::Sell {
            if spec.methods.is_empty() {
                return Err(CoreError::validation(
                    "a sell ad needs at least one settlement method",
                ));
            }

            let available = self
                .store
                .available_balance(owner, BalanceContext::General)
                .await?;
            if available < money::AD_POSTING_COLLATERAL {
                return Err(CoreError::validation(format!(
                    "posting a sell ad requires {} coins available, you have {}",
                    format_coin(money::AD_POSTING_COLLATERAL),
                    format_coin(available)
                )));
            }
        }

        let created_at = self.clock.now();
        let ad = Advertisement {
            id: uuid::Uuid::new_v4(),
            owner,
            direction: spec.direction,
            country: spec.country,
            total_amount: spec.total_amount,
            remaining_amount: spec.total_amount,
            min_amount: spec.min_amount,
            max_amount: spec.max_amount,
            unit_price: spec.unit_price,
            methods: spec.methods,
            terms: spec.terms.filter(|t| !t.trim().is_empty()),
            created_at,
            expires_at: Advertisement::expiry_for(created_at),
            status: super::types::AdStatus::Active,
        };

        self.store.insert_ad(&ad).await?;

        if ad.direction == Direction::Sell {
            if let Err(e) = self
                .store
                .deduct_ad_collateral_atomic(owner, money::AD_POSTING_COLLATERAL)
                .await
            {
                // The collateral debit is what guarantees the ad; without
                // it the ad must not stand.
                if let Err(del) = self.store.delete_ad(ad.id).await {
                    tracing::error!(ad_id = %ad.id, error = %del, "rollback of collateral-less ad failed");
                }
                return Err(e.into());
            }
        }

        tracing::info!(
            ad_id = %ad.id,
            owner,
            direction = ad.direction.as_str(),
            total = ad.total_amount,
            "ad posted"
        );
        Ok(ad)
    }

    /// Active, unexpired ads for a direction, newest-first, each
    /// annotated with its poster's stats from one batched lookup.
    pub async fn list_active(
        &self,
        direction: Direction,
        filters: &AdFilters,
    ) -> Result<Vec<AdListing>, CoreError> {
        let now = self.clock.now();
        let ads = self.store.list_open_ads(direction, filters, now).await?;

        let owners: Vec<UserId> = ads
            .iter()
            .map(|ad| ad.owner)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let stats = self.store.trader_stats(&owners).await?;

        Ok(ads
            .into_iter()
            .map(|ad| {
                let poster_stats = stats.get(&ad.owner).copied().unwrap_or_default();
                AdListing { ad, poster_stats }
            })
            .collect())
    }

    /// All of one owner's ads with their status as of now.
    pub async fn list_mine(&self, owner: UserId) -> Result<Vec<Advertisement>, CoreError> {
        let now = self.clock.now();
        let mut ads = self.store.list_ads_by_owner(owner).await?;
        for ad in &mut ads {
            ad.status = ad.status_at(now);
        }
        Ok(ads)
    }

    /// Owner cancellation of an active ad.
    pub async fn cancel(&self, owner: UserId, ad_id: AdId) -> Result<(), CoreError> {
        self.store.cancel_ad(ad_id, owner).await?;
        tracing::info!(ad_id = %ad_id, owner, "ad cancelled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::*;
    use crate::clock::Clock;
    use crate::ads::types::{AdStatus, SettlementMethod};
    use crate::clock::ManualClock;
    use crate::ledger::MemLedger;
    use crate::rates::{CountryCode, COUNTRY_TTL_SECS};

    struct Harness {
        ledger: Arc<MemLedger>,
        clock: Arc<ManualClock>,
        manager: AdInventoryManager,
    }

    fn harness() -> Harness {
        let ledger = Arc::new(MemLedger::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        ));
        let rates = Arc::new(CountryRateCache::new(
            ledger.clone(),
            COUNTRY_TTL_SECS,
            clock.clone(),
        ));
        let manager = AdInventoryManager::new(ledger.clone(), rates, clock.clone());
        Harness {
            ledger,
            clock,
            manager,
        }
    }

    fn sell_spec() -> AdSpec {
        AdSpec {
            direction: Direction::Sell,
            country: CountryCode::KE,
            total_amount: 1000, // 10 coins
            min_amount: 100,
            max_amount: 1000,
            // Static KE reference is 13.50; in band.
            unit_price: Decimal::new(1350, 2),
            methods: vec![SettlementMethod::Mpesa {
                phone: "0712000000".into(),
            }],
            terms: None,
        }
    }

    #[tokio::test]
    async fn test_post_sell_ad_debits_collateral() {
        let h = harness();
        let seller = h.ledger.register_user("alice");
        h.ledger
            .seed_balance(seller, BalanceContext::General, 5000);

        let ad = h.manager.post_ad(seller, sell_spec()).await.unwrap();
        assert_eq!(ad.status, AdStatus::Active);
        assert_eq!(ad.remaining_amount, ad.total_amount);

        let overview = h.ledger.balance_overview(seller).await.unwrap();
        assert_eq!(overview.general.available, 5000 - money::AD_POSTING_COLLATERAL);
        assert_eq!(overview.escrow.locked, money::AD_POSTING_COLLATERAL);
    }

    #[tokio::test]
    async fn test_post_ad_without_collateral_is_rejected_before_insert() {
        let h = harness();
        let seller = h.ledger.register_user("alice");
        h.ledger.seed_balance(seller, BalanceContext::General, 500);

        let err = h.manager.post_ad(seller, sell_spec()).await.unwrap_err();
        assert_eq!(err.category(), "validation");
        assert!(err.to_string().contains("10.00"));
        assert!(h.manager.list_mine(seller).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_price_outside_band_is_rejected_with_band_in_message() {
        let h = harness();
        let seller = h.ledger.register_user("alice");
        h.ledger
            .seed_balance(seller, BalanceContext::General, 5000);

        let mut spec = sell_spec();
        spec.unit_price = Decimal::new(1500, 2); // 15.00 vs band 12.96..14.04
        let err = h.manager.post_ad(seller, spec).await.unwrap_err();
        assert_eq!(err.category(), "validation");
        assert!(err.to_string().contains("KES"));
    }

    #[tokio::test]
    async fn test_bounds_validation_order() {
        let h = harness();
        let seller = h.ledger.register_user("alice");

        let mut spec = sell_spec();
        spec.total_amount = 400; // below the 5-coin floor
        let err = h.manager.post_ad(seller, spec).await.unwrap_err();
        assert!(err.to_string().contains("5.00"));

        let mut spec = sell_spec();
        spec.min_amount = 900;
        spec.max_amount = 500;
        let err = h.manager.post_ad(seller, spec).await.unwrap_err();
        assert!(err.to_string().contains("minimum cannot exceed"));

        let mut spec = sell_spec();
        spec.max_amount = 1200; // above total
        let err = h.manager.post_ad(seller, spec).await.unwrap_err();
        assert!(err.to_string().contains("total amount"));
    }

    #[tokio::test]
    async fn test_sell_ad_requires_settlement_method() {
        let h = harness();
        let seller = h.ledger.register_user("alice");
        h.ledger
            .seed_balance(seller, BalanceContext::General, 5000);

        let mut spec = sell_spec();
        spec.methods.clear();
        let err = h.manager.post_ad(seller, spec).await.unwrap_err();
        assert!(err.to_string().contains("settlement method"));

        let mut spec = sell_spec();
        spec.methods = vec![SettlementMethod::Mpesa { phone: "".into() }];
        let err = h.manager.post_ad(seller, spec).await.unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[tokio::test]
    async fn test_buy_ad_needs_no_collateral() {
        let h = harness();
        let buyer = h.ledger.register_user("bob");

        let mut spec = sell_spec();
        spec.direction = Direction::Buy;
        spec.methods.clear();
        let ad = h.manager.post_ad(buyer, spec).await.unwrap();
        assert_eq!(ad.direction, Direction::Buy);
    }

    #[tokio::test]
    async fn test_listing_annotates_stats_and_orders_newest_first() {
        let h = harness();
        let seller = h.ledger.register_user("alice");
        h.ledger
            .seed_balance(seller, BalanceContext::General, 10_000);
        let other = h.ledger.register_user("bob");
        let now = h.clock.now();
        h.ledger.seed_completed_trade(other, seller, now);
        h.ledger.seed_rating(seller, 5.0);
        h.ledger.seed_rating(seller, 4.0);

        let first = h.manager.post_ad(seller, sell_spec()).await.unwrap();
        h.clock.advance_secs(60);
        let second = h.manager.post_ad(seller, sell_spec()).await.unwrap();

        let listings = h
            .manager
            .list_active(Direction::Sell, &AdFilters::default())
            .await
            .unwrap();
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].ad.id, second.id);
        assert_eq!(listings[1].ad.id, first.id);
        assert_eq!(listings[0].poster_stats.completed_trades, 1);
        assert_eq!(listings[0].poster_stats.rating_count, 2);
        assert!((listings[0].poster_stats.average_rating - 4.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_expired_ads_drop_out_of_listing() {
        let h = harness();
        let seller = h.ledger.register_user("alice");
        h.ledger
            .seed_balance(seller, BalanceContext::General, 5000);
        h.manager.post_ad(seller, sell_spec()).await.unwrap();

        h.clock.advance_secs(31 * 24 * 3600);
        let listings = h
            .manager
            .list_active(Direction::Sell, &AdFilters::default())
            .await
            .unwrap();
        assert!(listings.is_empty());

        // Still visible to the owner, as expired.
        let mine = h.manager.list_mine(seller).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].status, AdStatus::Expired);
    }

    #[tokio::test]
    async fn test_cancel_is_owner_only() {
        let h = harness();
        let seller = h.ledger.register_user("alice");
        h.ledger
            .seed_balance(seller, BalanceContext::General, 5000);
        let stranger = h.ledger.register_user("bob");

        let ad = h.manager.post_ad(seller, sell_spec()).await.unwrap();

        let err = h.manager.cancel(stranger, ad.id).await.unwrap_err();
        assert_eq!(err.category(), "validation");

        h.manager.cancel(seller, ad.id).await.unwrap();
        let mine = h.manager.list_mine(seller).await.unwrap();
        assert_eq!(mine[0].status, AdStatus::Cancelled);
    }
}
