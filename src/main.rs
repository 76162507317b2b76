use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use sokoni::clock::{SharedClock, SystemClock};
use sokoni::config::AppConfig;
use sokoni::gateway::{self, AppState};
use sokoni::ledger::{LedgerStore, MemLedger, PgLedger};
use sokoni::logging::init_logging;
use sokoni::rates::{CountryRateCache, RateResolver};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = std::env::args().nth(1).unwrap_or_else(|| "dev".to_string());
    let config = AppConfig::load(&env);
    let _guard = init_logging(&config);

    tracing::info!(env, "starting sokoni gateway");

    let clock: SharedClock = Arc::new(SystemClock);

    let store: Arc<dyn LedgerStore> = match &config.postgres_url {
        Some(url) => {
            let pg = PgLedger::connect(url)
                .await
                .context("connecting PostgreSQL ledger")?;
            Arc::new(pg)
        }
        None => {
            tracing::warn!("no postgres_url configured, running on the in-memory ledger");
            Arc::new(MemLedger::new())
        }
    };

    let resolver = Arc::new(RateResolver::with_default_chain(
        &config.rates.primary_url,
        &config.rates.backup_url,
        Duration::from_secs(config.rates.timeout_secs),
        config.rates.snapshot_ttl_secs,
        clock.clone(),
    ));
    let country_rates = Arc::new(CountryRateCache::new(
        store.clone(),
        config.rates.country_ttl_secs,
        clock.clone(),
    ));

    let state = Arc::new(AppState::new(store, resolver, country_rates, clock));

    gateway::run_server(&config.gateway.host, config.gateway.port, state).await
}
