//! Trade initiation
//!
//! The validator's checks are a fast pre-flight; the ledger store repeats
//! the remaining-amount check inside its own transaction and is the sole
//! arbiter between concurrent initiations. Nothing is mutated locally, so
//! a store failure needs no compensation here.

use std::sync::Arc;

use crate::clock::SharedClock;
use crate::core_types::{AdId, UserId};
use crate::error::CoreError;
use crate::ledger::LedgerStore;
use crate::money::{self, CoinAmount, format_coin};

use super::types::Trade;

pub struct TradeInitiator {
    store: Arc<dyn LedgerStore>,
    clock: SharedClock,
}

impl TradeInitiator {
    pub fn new(store: Arc<dyn LedgerStore>, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    /// Initiate a trade against an ad. A missing or non-positive
    /// requested amount defaults to the ad's per-trade minimum.
    pub async fn initiate(
        &self,
        ad_id: AdId,
        caller: UserId,
        requested: Option<CoinAmount>,
    ) -> Result<Trade, CoreError> {
        let now = self.clock.now();
        let ad = self
            .store
            .get_ad(ad_id)
            .await?
            .ok_or_else(|| CoreError::validation(format!("advertisement {ad_id} not found")))?;

        if caller == ad.owner {
            return Err(CoreError::validation("you cannot trade with yourself"));
        }
        if !ad.is_open(now) {
            return Err(CoreError::validation(format!(
                "advertisement {ad_id} is no longer active"
            )));
        }

        let amount = match requested {
            Some(v) if v > 0 => v,
            _ => ad.min_amount,
        };

        if amount < money::MIN_TRADE_AMOUNT {
            return Err(CoreError::validation(format!(
                "minimum trade amount is {} coins",
                format_coin(money::MIN_TRADE_AMOUNT)
            )));
        }
        if amount > ad.remaining_amount {
            return Err(CoreError::validation(format!(
                "maximum available amount is {} coins",
                format_coin(ad.remaining_amount)
            )));
        }

        // The store re-validates against the row it locked; its verdict
        // supersedes the pre-flight read above.
        let trade = self
            .store
            .create_trade_atomic(ad_id, caller, amount, now)
            .await?;

        tracing::info!(
            trade_id = %trade.id,
            ad_id = %ad_id,
            buyer = trade.buyer,
            seller = trade.seller,
            amount = trade.amount,
            "trade initiated"
        );
        Ok(trade)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::*;
    use crate::ads::types::{AdSpec, Direction, SettlementMethod};
    use crate::ads::AdInventoryManager;
    use crate::clock::ManualClock;
    use crate::ledger::{BalanceContext, LedgerStore, MemLedger};
    use crate::rates::{CountryCode, CountryRateCache, COUNTRY_TTL_SECS};
    use crate::trade::types::TradeStatus;

    struct Harness {
        ledger: Arc<MemLedger>,
        initiator: TradeInitiator,
        seller: UserId,
        ad_id: AdId,
    }

    async fn harness() -> Harness {
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

        let seller = ledger.register_user("seller");
        ledger.seed_balance(seller, BalanceContext::General, 10_000);
        let ad = manager
            .post_ad(
                seller,
                AdSpec {
                    direction: Direction::Sell,
                    country: CountryCode::KE,
                    total_amount: 1000, // total=10
                    min_amount: 100,    // min=1
                    max_amount: 1000,   // max=10
                    unit_price: Decimal::new(1350, 2),
                    methods: vec![SettlementMethod::Mpesa {
                        phone: "0712000000".into(),
                    }],
                    terms: None,
                },
            )
            .await
            .unwrap();

        let initiator = TradeInitiator::new(ledger.clone(), clock);
        Harness {
            ledger,
            initiator,
            seller,
            ad_id: ad.id,
        }
    }

    #[tokio::test]
    async fn test_trade_decrements_remaining_and_is_pending() {
        let h = harness().await;
        let buyer = h.ledger.register_user("buyer");

        let trade = h
            .initiator
            .initiate(h.ad_id, buyer, Some(300))
            .await
            .unwrap();
        assert_eq!(trade.status, TradeStatus::Pending);
        assert_eq!(trade.buyer, buyer);
        assert_eq!(trade.seller, h.seller);
        // 3 coins at 13.50
        assert_eq!(trade.total_price, Decimal::new(4050, 2));

        let ad = h.ledger.get_ad(h.ad_id).await.unwrap().unwrap();
        assert_eq!(ad.remaining_amount, 700);
    }

    #[tokio::test]
    async fn test_second_trade_beyond_remaining_fails() {
        let h = harness().await;
        let buyer1 = h.ledger.register_user("buyer1");
        let buyer2 = h.ledger.register_user("buyer2");

        h.initiator
            .initiate(h.ad_id, buyer1, Some(300))
            .await
            .unwrap();
        let err = h
            .initiator
            .initiate(h.ad_id, buyer2, Some(800))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("7.00"));

        let ad = h.ledger.get_ad(h.ad_id).await.unwrap().unwrap();
        assert_eq!(ad.remaining_amount, 700);
    }

    #[tokio::test]
    async fn test_self_trade_rejected() {
        let h = harness().await;
        let err = h
            .initiator
            .initiate(h.ad_id, h.seller, Some(300))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("yourself"));
    }

    #[tokio::test]
    async fn test_amount_defaults_to_ad_minimum_and_floor_applies() {
        let h = harness().await;
        let buyer = h.ledger.register_user("buyer");

        // Ad minimum is 1.00, below the absolute floor of 2.00; the
        // defaulted amount must still be rejected.
        let err = h.initiator.initiate(h.ad_id, buyer, None).await.unwrap_err();
        assert!(err.to_string().contains("2.00"));

        let err = h
            .initiator
            .initiate(h.ad_id, buyer, Some(150))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("2.00"));
    }

    #[tokio::test]
    async fn test_exhausting_ad_flips_status() {
        let h = harness().await;
        let buyer = h.ledger.register_user("buyer");

        h.initiator
            .initiate(h.ad_id, buyer, Some(1000))
            .await
            .unwrap();

        let ad = h.ledger.get_ad(h.ad_id).await.unwrap().unwrap();
        assert_eq!(ad.remaining_amount, 0);
        assert_eq!(ad.status, crate::ads::AdStatus::Exhausted);

        let another = h.ledger.register_user("late");
        let err = h
            .initiator
            .initiate(h.ad_id, another, Some(200))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no longer active"));
    }
}
