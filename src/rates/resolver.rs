//! Multi-source rate resolution with caching
//!
//! Sources are tried in order; the chain ends with the static table, so
//! resolution always produces a snapshot - callers never see an error,
//! only a provenance tag telling them how live the numbers are.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::clock::SharedClock;

use super::currency::CurrencyCode;
use super::sources::{HttpRateSource, Provenance, RateSource, StaticRateSource};

/// How long a multi-currency snapshot stays fresh: 1 hour.
pub const SNAPSHOT_TTL_SECS: i64 = 3600;

/// USD-based rates for every supported currency, with provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateSnapshot {
    pub rates: BTreeMap<CurrencyCode, Decimal>,
    pub provenance: Provenance,
    /// True when served from the in-process cache without a network attempt.
    pub cached: bool,
    pub fetched_at: DateTime<Utc>,
}

impl RateSnapshot {
    /// Rate for one currency. Construction guarantees every supported
    /// code is present.
    pub fn rate(&self, currency: CurrencyCode) -> Decimal {
        self.rates
            .get(&currency)
            .copied()
            .unwrap_or_else(|| currency.static_rate())
    }
}

pub struct RateResolver {
    sources: Vec<Box<dyn RateSource>>,
    cache: Mutex<Option<RateSnapshot>>,
    ttl: Duration,
    clock: SharedClock,
}

impl RateResolver {
    /// Build a resolver over an explicit source chain. The chain is tried
    /// in order; if every element fails the static table is used, so the
    /// chain does not need to include it to be total.
    pub fn new(sources: Vec<Box<dyn RateSource>>, ttl_secs: i64, clock: SharedClock) -> Self {
        Self {
            sources,
            cache: Mutex::new(None),
            ttl: Duration::seconds(ttl_secs),
            clock,
        }
    }

    /// The production chain: primary HTTP, backup HTTP, static table.
    pub fn with_default_chain(
        primary_url: &str,
        backup_url: &str,
        timeout: StdDuration,
        ttl_secs: i64,
        clock: SharedClock,
    ) -> Self {
        let sources: Vec<Box<dyn RateSource>> = vec![
            Box::new(HttpRateSource::new(
                "primary",
                primary_url,
                Provenance::Primary,
                timeout,
            )),
            Box::new(HttpRateSource::new(
                "backup",
                backup_url,
                Provenance::Backup,
                timeout,
            )),
            Box::new(StaticRateSource),
        ];
        Self::new(sources, ttl_secs, clock)
    }

    /// Resolve the current snapshot. Serves the cache inside the TTL
    /// window without any network attempt; otherwise walks the chain.
    pub async fn resolve(&self) -> RateSnapshot {
        let now = self.clock.now();

        if let Some(snapshot) = self.cached_snapshot(now) {
            return snapshot;
        }

        for source in &self.sources {
            match source.fetch().await {
                Ok(rates) => {
                    let snapshot = RateSnapshot {
                        rates: complete(rates),
                        provenance: source.provenance(),
                        cached: false,
                        fetched_at: now,
                    };
                    *self.cache.lock().expect("rate cache poisoned") = Some(snapshot.clone());
                    return snapshot;
                }
                Err(e) => {
                    tracing::warn!(source = source.name(), error = %e, "rate source failed");
                }
            }
        }

        // Reached only when the configured chain omits the static source
        // and every element failed.
        let snapshot = RateSnapshot {
            rates: complete(Default::default()),
            provenance: Provenance::Fallback,
            cached: false,
            fetched_at: now,
        };
        *self.cache.lock().expect("rate cache poisoned") = Some(snapshot.clone());
        snapshot
    }

    /// Drop the cached snapshot so the next call hits the chain.
    pub fn invalidate(&self) {
        *self.cache.lock().expect("rate cache poisoned") = None;
    }

    fn cached_snapshot(&self, now: DateTime<Utc>) -> Option<RateSnapshot> {
        let cache = self.cache.lock().expect("rate cache poisoned");
        cache.as_ref().and_then(|snap| {
            if now - snap.fetched_at < self.ttl {
                let mut hit = snap.clone();
                hit.cached = true;
                Some(hit)
            } else {
                None
            }
        })
    }
}

/// Fill gaps with static defaults so no supported currency is undefined.
fn complete(
    partial: std::collections::HashMap<CurrencyCode, Decimal>,
) -> BTreeMap<CurrencyCode, Decimal> {
    CurrencyCode::ALL
        .iter()
        .map(|&c| (c, partial.get(&c).copied().unwrap_or_else(|| c.static_rate())))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use chrono::TimeZone;

    use super::super::sources::SourceError;
    use super::*;
    use crate::clock::ManualClock;

    struct FailingSource(AtomicU32);

    #[async_trait]
    impl RateSource for FailingSource {
        fn name(&self) -> &str {
            "failing"
        }

        fn provenance(&self) -> Provenance {
            Provenance::Primary
        }

        async fn fetch(&self) -> Result<HashMap<CurrencyCode, Decimal>, SourceError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(SourceError::Status(500))
        }
    }

    struct PartialSource;

    #[async_trait]
    impl RateSource for PartialSource {
        fn name(&self) -> &str {
            "partial"
        }

        fn provenance(&self) -> Provenance {
            Provenance::Primary
        }

        async fn fetch(&self) -> Result<HashMap<CurrencyCode, Decimal>, SourceError> {
            Ok(HashMap::from([(CurrencyCode::KES, Decimal::new(1297, 1))]))
        }
    }

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        ))
    }

    #[tokio::test]
    async fn test_all_sources_failing_falls_back_to_static() {
        let clock = clock();
        let resolver = RateResolver::new(
            vec![
                Box::new(FailingSource(AtomicU32::new(0))),
                Box::new(FailingSource(AtomicU32::new(0))),
                Box::new(StaticRateSource),
            ],
            SNAPSHOT_TTL_SECS,
            clock,
        );

        let snap = resolver.resolve().await;
        assert_eq!(snap.provenance, Provenance::Fallback);
        assert!(!snap.cached);
        for c in CurrencyCode::ALL {
            assert_eq!(snap.rate(c), c.static_rate());
        }
    }

    #[tokio::test]
    async fn test_partial_body_fills_missing_currencies() {
        let clock = clock();
        let resolver =
            RateResolver::new(vec![Box::new(PartialSource)], SNAPSHOT_TTL_SECS, clock);

        let snap = resolver.resolve().await;
        assert_eq!(snap.provenance, Provenance::Primary);
        assert_eq!(snap.rate(CurrencyCode::KES), Decimal::new(1297, 1));
        // Not in the body, defaulted:
        assert_eq!(snap.rate(CurrencyCode::UGX), CurrencyCode::UGX.static_rate());
    }

    #[tokio::test]
    async fn test_cache_window_and_expiry() {
        let clock = clock();
        let failing = FailingSource(AtomicU32::new(0));
        let resolver = RateResolver::new(
            vec![Box::new(failing), Box::new(StaticRateSource)],
            SNAPSHOT_TTL_SECS,
            clock.clone(),
        );

        let first = resolver.resolve().await;
        assert!(!first.cached);

        // Inside the TTL: no new attempt, served from cache.
        clock.advance_secs(600);
        let second = resolver.resolve().await;
        assert!(second.cached);
        assert_eq!(second.fetched_at, first.fetched_at);

        // Past the TTL: the chain runs again.
        clock.advance_secs(SNAPSHOT_TTL_SECS);
        let third = resolver.resolve().await;
        assert!(!third.cached);
        assert!(third.fetched_at > first.fetched_at);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let clock = clock();
        let resolver =
            RateResolver::new(vec![Box::new(StaticRateSource)], SNAPSHOT_TTL_SECS, clock);

        assert!(!resolver.resolve().await.cached);
        assert!(resolver.resolve().await.cached);
        resolver.invalidate();
        assert!(!resolver.resolve().await.cached);
    }
}
