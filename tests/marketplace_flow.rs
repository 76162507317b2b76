//! End-to-end marketplace flows over the in-memory ledger
//!
//! Drives the services exactly as the gateway wires them, with a manual
//! clock so cooldowns and expiry are exercised without wall time.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;

use sokoni::ads::types::{AdFilters, AdSpec, SettlementMethod};
use sokoni::ads::AdInventoryManager;
use sokoni::clock::{Clock, ManualClock};
use sokoni::ledger::{BalanceContext, LedgerStore, MemLedger};
use sokoni::mining::MiningService;
use sokoni::money;
use sokoni::rates::{CountryCode, CountryRateCache, COUNTRY_TTL_SECS};
use sokoni::trade::{TradeInitiator, TradeStatus};
use sokoni::transfer::TransferGate;
use sokoni::{Direction, UserId};

struct World {
    ledger: Arc<MemLedger>,
    clock: Arc<ManualClock>,
    ads: AdInventoryManager,
    trades: TradeInitiator,
    mining: MiningService,
    transfers: TransferGate,
}

fn world() -> World {
    let ledger = Arc::new(MemLedger::new());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(),
    ));
    let rates = Arc::new(CountryRateCache::new(
        ledger.clone(),
        COUNTRY_TTL_SECS,
        clock.clone(),
    ));
    World {
        ads: AdInventoryManager::new(ledger.clone(), rates, clock.clone()),
        trades: TradeInitiator::new(ledger.clone(), clock.clone()),
        mining: MiningService::new(ledger.clone(), clock.clone()),
        transfers: TransferGate::new(ledger.clone(), clock.clone()),
        ledger,
        clock,
    }
}

fn seller_with_funds(w: &World, handle: &str) -> UserId {
    let user = w.ledger.register_user(handle);
    w.ledger
        .seed_balance(user, BalanceContext::General, 100 * money::COIN_SCALE);
    user
}

fn standard_ad(total_coins: u64) -> AdSpec {
    AdSpec {
        direction: Direction::Sell,
        country: CountryCode::KE,
        total_amount: total_coins * money::COIN_SCALE,
        min_amount: money::COIN_SCALE,
        max_amount: total_coins * money::COIN_SCALE,
        unit_price: Decimal::new(1350, 2),
        methods: vec![SettlementMethod::Mpesa {
            phone: "0712000000".into(),
        }],
        terms: None,
    }
}

#[tokio::test]
async fn trade_reserves_inventory_and_over_asks_fail() {
    let w = world();
    let seller = seller_with_funds(&w, "amina");
    let buyer1 = w.ledger.register_user("brian");
    let buyer2 = w.ledger.register_user("carla");

    let ad = w.ads.post_ad(seller, standard_ad(10)).await.unwrap();

    let trade = w
        .trades
        .initiate(ad.id, buyer1, Some(3 * money::COIN_SCALE))
        .await
        .unwrap();
    assert_eq!(trade.status, TradeStatus::Pending);
    assert_eq!(trade.amount, 300);

    let after = w.ledger.get_ad(ad.id).await.unwrap().unwrap();
    assert_eq!(after.remaining_amount, 700);
    assert!(after.remaining_amount <= after.total_amount);

    // Second buyer asks for more than what remains.
    let err = w
        .trades
        .initiate(ad.id, buyer2, Some(8 * money::COIN_SCALE))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("7.00"));

    // Remaining amount is untouched by the failed initiation.
    let after = w.ledger.get_ad(ad.id).await.unwrap().unwrap();
    assert_eq!(after.remaining_amount, 700);
}

#[tokio::test]
async fn concurrent_initiations_cannot_oversell() {
    let w = world();
    let seller = seller_with_funds(&w, "amina");
    let buyer1 = w.ledger.register_user("brian");
    let buyer2 = w.ledger.register_user("carla");

    let ad = w.ads.post_ad(seller, standard_ad(10)).await.unwrap();

    // Both requests pass the pre-flight read (each fits in 10), but
    // together they exceed it. The store serializes and at most one
    // commits in full.
    let w = Arc::new(w);
    let (w1, w2) = (w.clone(), w.clone());
    let t1 = tokio::spawn(async move {
        w1.trades
            .initiate(ad.id, buyer1, Some(7 * money::COIN_SCALE))
            .await
    });
    let t2 = tokio::spawn(async move {
        w2.trades
            .initiate(ad.id, buyer2, Some(8 * money::COIN_SCALE))
            .await
    });

    let results = [t1.await.unwrap(), t2.await.unwrap()];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one of the racing trades may commit");

    let after = w.ledger.get_ad(ad.id).await.unwrap().unwrap();
    let committed: u64 = results
        .iter()
        .filter_map(|r| r.as_ref().ok())
        .map(|t| t.amount)
        .sum();
    assert_eq!(after.remaining_amount, 1000 - committed);
}

#[tokio::test]
async fn mining_claim_is_single_shot_per_window() {
    let w = world();
    let user = w.ledger.register_user("amina");

    // Fresh user claims immediately.
    let status = w.mining.check_status(user).await.unwrap();
    assert!(status.eligible);

    let outcome = w.mining.claim(user).await.unwrap();
    assert_eq!(outcome.amount, money::DEFAULT_MINING_REWARD);

    // A second attempt inside the window is rejected with the precise
    // remaining time.
    let err = w.mining.claim(user).await.unwrap_err();
    assert!(err.to_string().contains("14400"));

    w.clock.advance_secs(2 * 3600);
    let status = w.mining.check_status(user).await.unwrap();
    assert!(!status.eligible);
    assert_eq!(status.remaining_secs, 7200);

    // Past the boundary the claim succeeds exactly once and recomputes
    // the window from the new claim time.
    w.clock.advance_secs(2 * 3600);
    let second = w.mining.claim(user).await.unwrap();
    assert_eq!(
        second.next_eligible_at,
        w.clock.now() + chrono::Duration::hours(4)
    );

    let balance = w
        .ledger
        .available_balance(user, BalanceContext::General)
        .await
        .unwrap();
    assert_eq!(balance, 2 * money::DEFAULT_MINING_REWARD);
}

#[tokio::test]
async fn concurrent_mining_claims_credit_once() {
    let w = Arc::new(world());
    let user = w.ledger.register_user("amina");

    let (w1, w2) = (w.clone(), w.clone());
    let t1 = tokio::spawn(async move { w1.mining.claim(user).await });
    let t2 = tokio::spawn(async move { w2.mining.claim(user).await });

    let results = [t1.await.unwrap(), t2.await.unwrap()];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);

    let balance = w
        .ledger
        .available_balance(user, BalanceContext::General)
        .await
        .unwrap();
    assert_eq!(balance, money::DEFAULT_MINING_REWARD);
}

#[tokio::test]
async fn mining_claim_decrements_global_supply() {
    let w = world();
    let user = w.ledger.register_user("amina");

    let before = w.ledger.global_supply_remaining().await.unwrap();
    let outcome = w.mining.claim(user).await.unwrap();
    let after = w.ledger.global_supply_remaining().await.unwrap();
    assert_eq!(after, before - outcome.amount);
}

#[tokio::test]
async fn transfer_gate_requires_trading_history() {
    let w = world();
    let sender = w.ledger.register_user("amina");
    let recipient = w.ledger.register_user("brian");
    w.ledger
        .seed_balance(sender, BalanceContext::General, 100 * money::COIN_SCALE);

    // Below the threshold: always rejected, whatever the amount.
    for amount in [
        money::MIN_TRANSFER_AMOUNT,
        50 * money::COIN_SCALE,
    ] {
        let err = w
            .transfers
            .transfer(sender, "brian", amount, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("5 trades"));
    }

    for _ in 0..5 {
        w.ledger
            .seed_completed_trade(sender, recipient, w.clock.now());
    }
    let eligibility = w.transfers.check_eligibility(sender).await.unwrap();
    assert!(eligibility.eligible);
    assert_eq!(eligibility.completed_trades, 5);

    let receipt = w
        .transfers
        .transfer(sender, "BRIAN", 25 * money::COIN_SCALE, None)
        .await
        .unwrap();
    assert_eq!(receipt.recipient, recipient);

    assert_eq!(
        w.ledger
            .available_balance(sender, BalanceContext::General)
            .await
            .unwrap(),
        75 * money::COIN_SCALE
    );
    assert_eq!(
        w.ledger
            .available_balance(recipient, BalanceContext::General)
            .await
            .unwrap(),
        25 * money::COIN_SCALE
    );
}

#[tokio::test]
async fn posting_flow_holds_collateral_and_lists_with_stats() {
    let w = world();
    let seller = seller_with_funds(&w, "amina");
    let peer = w.ledger.register_user("brian");
    w.ledger.seed_completed_trade(seller, peer, w.clock.now());
    w.ledger.seed_rating(seller, 4.0);

    w.ads.post_ad(seller, standard_ad(10)).await.unwrap();

    let overview = w.ledger.balance_overview(seller).await.unwrap();
    assert_eq!(
        overview.general.available,
        100 * money::COIN_SCALE - money::AD_POSTING_COLLATERAL
    );
    assert_eq!(overview.escrow.locked, money::AD_POSTING_COLLATERAL);
    // Partitions still account for the full holding.
    assert_eq!(
        overview.general.available + overview.general.locked + overview.escrow.available
            + overview.escrow.locked,
        100 * money::COIN_SCALE
    );

    let listings = w
        .ads
        .list_active(Direction::Sell, &AdFilters::default())
        .await
        .unwrap();
    assert_eq!(listings.len(), 1);
    assert_eq!(listings[0].poster_stats.total_trades, 1);
    assert_eq!(listings[0].poster_stats.rating_count, 1);
}

#[tokio::test]
async fn trade_history_feeds_eligibility_count() {
    let w = world();
    let seller = seller_with_funds(&w, "amina");
    let buyer = w.ledger.register_user("brian");

    let ad = w.ads.post_ad(seller, standard_ad(10)).await.unwrap();
    w.trades
        .initiate(ad.id, buyer, Some(2 * money::COIN_SCALE))
        .await
        .unwrap();

    // Pending trades never count toward the threshold.
    let eligibility = w.transfers.check_eligibility(buyer).await.unwrap();
    assert_eq!(eligibility.completed_trades, 0);

    let trades = w.ledger.list_trades_for_user(buyer).await.unwrap();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].status, TradeStatus::Pending);
}
