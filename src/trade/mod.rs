//! Trade initiation
//!
//! A trade is created once, in `pending`, by the ledger store's atomic
//! operation; all later status transitions belong to the external
//! settlement process.

pub mod initiate;
pub mod types;

pub use initiate::TradeInitiator;
pub use types::{Trade, TradeStatus};
