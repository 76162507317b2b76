//! Sokoni - Peer-to-Peer Coin Marketplace Core
//!
//! The exchange of a point-like digital asset ("the coin") for local
//! currency, plus two adjacent value-transfer mechanisms: a time-gated
//! mining claim and a trading-history-gated direct balance transfer.
//!
//! # Modules
//!
//! - [`core_types`] - Identifier types (UserId, AdId, TradeId, ...)
//! - [`money`] - Scaled coin amounts and marketplace thresholds
//! - [`clock`] - Injectable time source
//! - [`error`] - Outward error taxonomy
//! - [`ledger`] - The transactional store contract and its backends
//! - [`rates`] - Multi-source exchange rate resolution with fallback
//! - [`ads`] - Advertisement inventory lifecycle
//! - [`trade`] - Trade initiation validation
//! - [`mining`] - Cooldown-gated reward claims
//! - [`transfer`] - Eligibility-gated balance transfers
//! - [`gateway`] - Axum HTTP surface

pub mod ads;
pub mod clock;
pub mod config;
pub mod core_types;
pub mod error;
pub mod gateway;
pub mod ledger;
pub mod logging;
pub mod mining;
pub mod money;
pub mod rates;
pub mod trade;
pub mod transfer;

// Convenient re-exports at crate root
pub use ads::{AdInventoryManager, AdListing, AdSpec, Advertisement, Direction, SettlementMethod};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use core_types::{AdId, TradeId, TransferId, UserId};
pub use error::CoreError;
pub use ledger::{LedgerError, LedgerStore, MemLedger, PgLedger};
pub use mining::{MiningService, MiningStatus};
pub use money::CoinAmount;
pub use rates::{CountryRateCache, RateResolver, RateSnapshot};
pub use trade::{Trade, TradeInitiator, TradeStatus};
pub use transfer::{Eligibility, TransferGate};
