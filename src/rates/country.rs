//! Per-country coin price cache
//!
//! Ad pricing needs one country's coin price, not the whole basket, and
//! it needs it fresher than the hourly snapshot - so this is a separate
//! 5-minute cache over the persisted rate table, falling back to the
//! static per-country constants. Recording a new rate invalidates the
//! affected entry immediately.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use crate::clock::SharedClock;
use crate::error::CoreError;
use crate::ledger::LedgerStore;
use crate::money::{self, CoinAmount};

use super::currency::CountryCode;

/// How long a per-country price stays fresh: 5 minutes.
pub const COUNTRY_TTL_SECS: i64 = 300;

/// Allowed deviation of a posted unit price from the reference: ±4%.
pub const PRICE_BAND_PERCENT: u32 = 4;

/// Inclusive price band around a reference price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceBand {
    pub min: Decimal,
    pub max: Decimal,
}

impl PriceBand {
    pub fn around(reference: Decimal, percent: u32) -> Self {
        let spread = reference * Decimal::from(percent) / Decimal::from(100);
        Self {
            min: reference - spread,
            max: reference + spread,
        }
    }

    pub fn contains(&self, price: Decimal) -> bool {
        price >= self.min && price <= self.max
    }
}

pub struct CountryRateCache {
    store: Arc<dyn LedgerStore>,
    cache: Mutex<HashMap<CountryCode, (DateTime<Utc>, Decimal)>>,
    ttl: Duration,
    clock: SharedClock,
}

impl CountryRateCache {
    pub fn new(store: Arc<dyn LedgerStore>, ttl_secs: i64, clock: SharedClock) -> Self {
        Self {
            store,
            cache: Mutex::new(HashMap::new()),
            ttl: Duration::seconds(ttl_secs),
            clock,
        }
    }

    /// Current coin price in the country's national currency. Never
    /// fails: a store error or missing row resolves to the static
    /// constant for the country.
    pub async fn price(&self, country: CountryCode) -> Decimal {
        let now = self.clock.now();

        {
            let cache = self.cache.lock().expect("country cache poisoned");
            if let Some((at, price)) = cache.get(&country)
                && now - *at < self.ttl
            {
                return *price;
            }
        }

        let price = match self.store.latest_country_rate(country).await {
            Ok(Some(price)) => price,
            Ok(None) => country.static_coin_price(),
            Err(e) => {
                tracing::warn!(country = %country, error = %e, "country rate lookup failed, using static price");
                country.static_coin_price()
            }
        };

        self.cache
            .lock()
            .expect("country cache poisoned")
            .insert(country, (now, price));
        price
    }

    /// Allowed posting band around the current reference price.
    pub async fn price_band(&self, country: CountryCode) -> PriceBand {
        PriceBand::around(self.price(country).await, PRICE_BAND_PERCENT)
    }

    /// Persist a new rate row and drop the cache entry so the next read
    /// sees it immediately.
    pub async fn record(&self, country: CountryCode, price: Decimal) -> Result<(), CoreError> {
        if price <= Decimal::ZERO {
            return Err(CoreError::validation("rate must be positive"));
        }
        let now = self.clock.now();
        self.store.record_country_rate(country, price, now).await?;
        self.cache
            .lock()
            .expect("country cache poisoned")
            .remove(&country);
        Ok(())
    }

    /// Local-currency value of a coin amount at the current country rate.
    pub async fn coin_to_local(&self, amount: CoinAmount, country: CountryCode) -> Decimal {
        money::total_price(amount, self.price(country).await)
    }

    /// Coin amount a local-currency sum buys at the current country rate,
    /// truncated to the coin's precision.
    pub async fn local_to_coin(
        &self,
        local: Decimal,
        country: CountryCode,
    ) -> Result<CoinAmount, CoreError> {
        let price = self.price(country).await;
        if price <= Decimal::ZERO {
            return Err(CoreError::validation("no usable rate for country"));
        }
        let coins = (local / price).round_dp(money::COIN_DECIMALS);
        money::decimal_to_coin(coins).map_err(|e| CoreError::validation(e.to_string()))
    }
}
