//! Shared gateway state

use std::sync::Arc;

use crate::ads::AdInventoryManager;
use crate::clock::SharedClock;
use crate::ledger::LedgerStore;
use crate::mining::MiningService;
use crate::rates::{CountryRateCache, RateResolver};
use crate::trade::TradeInitiator;
use crate::transfer::TransferGate;

pub struct AppState {
    pub store: Arc<dyn LedgerStore>,
    pub ads: AdInventoryManager,
    pub trades: TradeInitiator,
    pub mining: MiningService,
    pub transfers: TransferGate,
    pub resolver: Arc<RateResolver>,
    pub country_rates: Arc<CountryRateCache>,
    pub clock: SharedClock,
}

impl AppState {
    /// Wire every service over one store and one clock.
    pub fn new(
        store: Arc<dyn LedgerStore>,
        resolver: Arc<RateResolver>,
        country_rates: Arc<CountryRateCache>,
        clock: SharedClock,
    ) -> Self {
        Self {
            ads: AdInventoryManager::new(store.clone(), country_rates.clone(), clock.clone()),
            trades: TradeInitiator::new(store.clone(), clock.clone()),
            mining: MiningService::new(store.clone(), clock.clone()),
            transfers: TransferGate::new(store.clone(), clock.clone()),
            store,
            resolver,
            country_rates,
            clock,
        }
    }
}
